//! # nhb-crypto
//!
//! Cryptographic primitives for the NHB core.
//!
//! ## Contents
//!
//! - **Hashing**: Keccak-256 (trie keys, voucher digests, address
//!   derivation) and SHA-256 (canonical transaction hashes)
//! - **Signatures**: Ethereum-style recoverable secp256k1, 65-byte
//!   `r || s || v` with `v ∈ {27, 28}`

pub mod ecdsa;
pub mod errors;
pub mod hashing;

pub use ecdsa::*;
pub use errors::CryptoError;
pub use hashing::*;
