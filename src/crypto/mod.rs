//! C1: SHA-256 hashing, base58 addressing, Ed25519 signatures and the
//! Merkle tree used to commit a block's transactions.

pub mod address;
pub mod hash;
pub mod merkle;
pub mod signatures;

pub use address::{is_system_name, AddressError, BASE_TOKEN, MINT_ACCOUNT};
pub use hash::{canonical_json, hash, hash_bytes_b58, hash_hex, hash_join, hash_raw, hash_raw_bytes};
pub use merkle::{merkle_build, merkle_proof, merkle_root, merkle_verify, MerkleError, MerkleProof};
pub use signatures::{gen_keypair, sign, verify, GeneratedKeyPair, SignatureCryptoError};
