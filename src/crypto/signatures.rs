//! Ed25519 keypair generation, signing and verification. Public keys are
//! presented as base58 strings; `gen_keypair` retries generation until the
//! raw 32-byte public key encodes to exactly 44 base58 characters so that
//! `crypto::address::append_checksum` can append a single checksum digit
//! and still land on a 45-character address.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use zeroize::Zeroizing;

use super::address::AddressError;

#[derive(Debug, thiserror::Error)]
pub enum SignatureCryptoError {
    #[error("invalid base58 in key/signature: {0}")]
    InvalidBase58(#[from] bs58::decode::Error),
    #[error("wrong byte length for {0}: expected {1}, got {2}")]
    WrongLength(&'static str, usize, usize),
    #[error("signature does not verify")]
    VerificationFailed,
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// A generated keypair. `public_key44` is the raw, un-checksummed 44-char
/// base58 public key; callers append a checksum via `address::append_checksum`
/// to obtain the canonical 45-char form carried in addresses.
pub struct GeneratedKeyPair {
    pub public_key44: String,
    /// base58-encoded 32-byte seed. Wrapped so it is zeroized on drop.
    pub private_key: Zeroizing<String>,
}

/// Generates a new Ed25519 keypair, retrying until the public key encodes
/// to exactly 44 base58 characters.
pub fn gen_keypair() -> GeneratedKeyPair {
    loop {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_b58 = bs58::encode(signing_key.verifying_key().to_bytes()).into_string();
        if public_b58.chars().count() == 44 {
            let private_b58 = bs58::encode(signing_key.to_bytes()).into_string();
            return GeneratedKeyPair {
                public_key44: public_b58,
                private_key: Zeroizing::new(private_b58),
            };
        }
    }
}

fn decode_signing_key(private_key_b58: &str) -> Result<SigningKey, SignatureCryptoError> {
    let bytes = bs58::decode(private_key_b58).into_vec()?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| SignatureCryptoError::WrongLength("private key", 32, v.len()))?;
    Ok(SigningKey::from_bytes(&arr))
}

/// Decodes a 44-char (un-checksummed) or 45-char (checksummed) base58
/// public key into a `VerifyingKey`, stripping the checksum char if present.
fn decode_verifying_key(public_key: &str) -> Result<VerifyingKey, SignatureCryptoError> {
    let raw44 = match public_key.chars().count() {
        45 => &public_key[..44],
        44 => public_key,
        n => return Err(SignatureCryptoError::WrongLength("public key", 44, n)),
    };
    let bytes = bs58::decode(raw44).into_vec()?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| SignatureCryptoError::WrongLength("public key", 32, v.len()))?;
    VerifyingKey::from_bytes(&arr).map_err(|_| SignatureCryptoError::WrongLength("public key", 32, 0))
}

/// Signs `msg` (conventionally the transaction/block hash string's bytes)
/// with the base58-encoded private key, returning a base58 signature.
pub fn sign(private_key_b58: &str, msg: &[u8]) -> Result<String, SignatureCryptoError> {
    let signing_key = decode_signing_key(private_key_b58)?;
    let signature: Signature = signing_key.sign(msg);
    Ok(bs58::encode(signature.to_bytes()).into_string())
}

/// Verifies a base58 signature against a 44- or 45-char base58 public key.
pub fn verify(public_key: &str, signature_b58: &str, msg: &[u8]) -> Result<bool, SignatureCryptoError> {
    let verifying_key = decode_verifying_key(public_key)?;
    let sig_bytes = bs58::decode(signature_b58).into_vec()?;
    let arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|v: Vec<u8>| SignatureCryptoError::WrongLength("signature", 64, v.len()))?;
    let signature = Signature::from_bytes(&arr);
    Ok(verifying_key.verify(msg, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let kp = gen_keypair();
        let msg = b"hello ledger";
        let sig = sign(&kp.private_key, msg).unwrap();
        assert!(verify(&kp.public_key44, &sig, msg).unwrap());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let kp = gen_keypair();
        let sig = sign(&kp.private_key, b"original").unwrap();
        assert!(!verify(&kp.public_key44, &sig, b"tampered").unwrap());
    }

    #[test]
    fn verify_accepts_checksummed_or_bare_public_key() {
        let kp = gen_keypair();
        let checksummed = crate::crypto::address::append_checksum(&kp.public_key44).unwrap();
        let msg = b"payload";
        let sig = sign(&kp.private_key, msg).unwrap();
        assert!(verify(&checksummed, &sig, msg).unwrap());
        assert!(verify(&kp.public_key44, &sig, msg).unwrap());
    }
}
