//! Canonical hashing: SHA-256 over a deterministic JSON encoding, base58
//! presentation, and the order-insensitive pairwise join used by the Merkle
//! tree.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serializes `value` the same way on every node: `serde_json` already
/// preserves struct field declaration order for non-map types and emits no
/// insignificant whitespace, so this is the canonical form referenced
/// throughout the rest of the crate.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// SHA-256 of the canonical JSON encoding of `value`.
pub fn hash_raw<T: Serialize>(value: &T) -> Result<[u8; 32], serde_json::Error> {
    let json = canonical_json(value)?;
    Ok(hash_raw_bytes(json.as_bytes()))
}

/// SHA-256 of raw bytes (no JSON framing); used when the caller already has
/// a canonical byte string, e.g. when joining two Merkle node hashes.
pub fn hash_raw_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// base58(hash_raw(value)).
pub fn hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(bs58::encode(hash_raw(value)?).into_string())
}

/// base58(SHA-256_hex-style digest over raw bytes), used for hashing
/// already-canonical byte strings (block hashing, hash_join).
pub fn hash_bytes_b58(bytes: &[u8]) -> String {
    bs58::encode(hash_raw_bytes(bytes)).into_string()
}

/// SHA-256 hex digest, used for block hashes (`Block.hash` is hex, unlike
/// `Transaction.hash` which is base58).
pub fn hash_hex(bytes: &[u8]) -> String {
    hex::encode(hash_raw_bytes(bytes))
}

/// Concatenates the base58-decoded byte strings of `a` and `b` in
/// deterministic lexicographic order (lower byte string first) before
/// hashing, so a Merkle node's hash does not depend on sibling order.
pub fn hash_join(a: &str, b: &str) -> Result<String, bs58::decode::Error> {
    let a_bytes = bs58::decode(a).into_vec()?;
    let b_bytes = bs58::decode(b).into_vec()?;
    let (first, second) = if a_bytes <= b_bytes {
        (a_bytes, b_bytes)
    } else {
        (b_bytes, a_bytes)
    };
    let mut joined = first;
    joined.extend_from_slice(&second);
    Ok(hash_bytes_b58(&joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn hash_is_deterministic() {
        let s = Sample {
            a: 1,
            b: "x".into(),
        };
        assert_eq!(hash(&s).unwrap(), hash(&s).unwrap());
    }

    #[test]
    fn hash_join_is_order_independent() {
        let a = hash_bytes_b58(b"left");
        let b = hash_bytes_b58(b"right");
        assert_eq!(hash_join(&a, &b).unwrap(), hash_join(&b, &a).unwrap());
    }

    #[test]
    fn hash_join_differs_from_plain_concat_order() {
        let a = hash_bytes_b58(b"left");
        let b = hash_bytes_b58(b"right");
        let c = hash_bytes_b58(b"other");
        assert_ne!(hash_join(&a, &b).unwrap(), hash_join(&a, &c).unwrap());
    }
}
