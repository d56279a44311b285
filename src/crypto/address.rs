//! Address format: `name:publicKeyWithChecksum`, where the public key is a
//! 45-character base58 string whose final character is a checksum digit
//! over the preceding 44 characters.

const BS58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// The default unit-of-account token: a name ending in `$`.
pub const BASE_TOKEN: &str = "COIN$";

/// The ecosystem-wide supply account, credited by `mintIssue` and debited by
/// `mintAirDrop`/`miningReward`/`miningFees`.
pub const MINT_ACCOUNT: &str = "_mint";

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("public key must be 45 base58 characters, got {0}")]
    WrongLength(usize),
    #[error("invalid base58 in public key: {0}")]
    InvalidBase58(#[from] bs58::decode::Error),
    #[error("checksum mismatch: expected '{expected}', got '{got}'")]
    BadChecksum { expected: char, got: char },
    #[error("address is missing a ':' separator between name and public key")]
    MissingSeparator,
}

/// System accounts are signing-exempt and do not track sequence numbers.
/// Matches names ending in `$` (e.g. `COIN$`) and names starting with `_`
/// (e.g. `_mint`, and the single-character admin sender `_`).
pub fn is_system_name(name: &str) -> bool {
    name.ends_with('$') || name.starts_with('_')
}

/// Computes the checksum character for a 44-character base58 public key:
/// the base58 digit for `(sum of decoded bytes) mod 58`.
fn checksum_char(pubkey44: &str) -> Result<char, AddressError> {
    let bytes = bs58::decode(pubkey44).into_vec()?;
    let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
    let idx = (sum % 58) as usize;
    Ok(BS58_ALPHABET[idx] as char)
}

/// Appends the checksum character to a 44-character base58 public key,
/// yielding the 45-character canonical form.
pub fn append_checksum(pubkey44: &str) -> Result<String, AddressError> {
    if pubkey44.chars().count() != 44 {
        return Err(AddressError::WrongLength(pubkey44.chars().count()));
    }
    let c = checksum_char(pubkey44)?;
    let mut out = String::with_capacity(45);
    out.push_str(pubkey44);
    out.push(c);
    Ok(out)
}

/// Validates that a 45-character public key carries a correct checksum.
pub fn verify_checksum(pubkey45: &str) -> Result<(), AddressError> {
    let chars: Vec<char> = pubkey45.chars().collect();
    if chars.len() != 45 {
        return Err(AddressError::WrongLength(chars.len()));
    }
    let (head, tail) = pubkey45.split_at(44);
    let got = tail.chars().next().expect("tail has exactly one char");
    let expected = checksum_char(head)?;
    if expected != got {
        return Err(AddressError::BadChecksum { expected, got });
    }
    Ok(())
}

/// Splits a canonical `name:publicKeyWithChecksum` address into its parts,
/// validating the embedded checksum.
pub fn parse_address(address: &str) -> Result<(String, String), AddressError> {
    let (name, pk) = address
        .split_once(':')
        .ok_or(AddressError::MissingSeparator)?;
    verify_checksum(pk)?;
    Ok((name.to_string(), pk.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn random_pk44() -> String {
        loop {
            let mut raw = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut raw);
            let encoded = bs58::encode(raw).into_string();
            if encoded.chars().count() == 44 {
                return encoded;
            }
        }
    }

    #[test]
    fn checksum_round_trips() {
        let pk44 = random_pk44();
        let pk45 = append_checksum(&pk44).unwrap();
        assert!(verify_checksum(&pk45).is_ok());
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let pk44 = random_pk44();
        let mut pk45 = append_checksum(&pk44).unwrap();
        let bad = if pk45.ends_with('1') { '2' } else { '1' };
        pk45.replace_range(44.., &bad.to_string());
        assert!(verify_checksum(&pk45).is_err());
    }

    #[test]
    fn system_names_are_recognized() {
        assert!(is_system_name("COIN$"));
        assert!(is_system_name("_mint"));
        assert!(is_system_name("_"));
        assert!(!is_system_name("fred"));
    }

    #[test]
    fn parse_address_splits_name_and_key() {
        let pk44 = random_pk44();
        let pk45 = append_checksum(&pk44).unwrap();
        let full = format!("alice:{}", pk45);
        let (name, pk) = parse_address(&full).unwrap();
        assert_eq!(name, "alice");
        assert_eq!(pk, pk45);
    }
}
