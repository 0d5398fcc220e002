//! # nhb-trie
//!
//! Authenticated key-value store for the NHB core.
//!
//! ## Role in System
//!
//! - **Single Source of Truth**: every ledger entity (accounts, indexes,
//!   counters, histories) lives here as a canonical record
//! - **Merkle Commitment**: the root after a fixed write set is bit-identical
//!   on all nodes; iteration order never affects it
//! - **Snapshot Semantics**: staged writes become visible atomically at
//!   `commit`; `reset` returns to any retained root
//!
//! ## Structure
//!
//! Keys are 32-byte Keccak-256 hashes of domain-prefixed raw keys (hashing is
//! the caller's concern); values are opaque canonical record bytes. The root
//! is computed over a Patricia trie with leaf / extension / branch nodes,
//! RLP-encoded and hashed with Keccak-256.

pub mod errors;
pub mod nibbles;
pub mod node;
pub mod store;

pub use errors::TrieError;
pub use nibbles::Nibbles;
pub use node::{TrieNode, EMPTY_ROOT};
pub use store::{Store, StoreCheckpoint, StoreConfig};
