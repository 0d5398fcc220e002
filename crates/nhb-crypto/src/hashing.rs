//! # Hashing
//!
//! One-shot hash helpers used across the core.
//!
//! ## Use Cases
//!
//! - Keccak-256: trie keys (domain-prefixed raw keys), voucher digests,
//!   address derivation, persistence-key labels
//! - SHA-256: canonical transaction hashes

use nhb_types::Hash;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// Keccak-256 of a byte slice.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Keccak-256 over multiple inputs, hashed in sequence.
pub fn keccak256_many(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize().into()
}

/// SHA-256 of a byte slice.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
