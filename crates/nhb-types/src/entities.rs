//! # Core Ledger Entities
//!
//! Fundamental identifiers and denominations used across the engine crates.
//!
//! ## Type Decisions
//!
//! - `Address = [u8; 20]` - Ethereum-style account addresses derived from the
//!   Keccak-256 hash of the uncompressed secp256k1 public key.
//! - Balances, stake, and reward indices use `primitive_types::U256`. Reward
//!   math multiplies values at the `2^128` fixed-point scale, so 128-bit
//!   integers would overflow; U256 with U512 intermediates keeps every
//!   computation exact.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// A 32-byte hash (Keccak-256 or SHA-256 depending on context).
pub type Hash = [u8; 32];

/// A 20-byte account address.
pub type Address = [u8; 20];

/// Canonical chain identifier: the 24-bit value spelling ASCII "NHB".
pub const CHAIN_ID: u64 = 0x4E4842;

/// Canonical empty code hash for accounts without contract code.
pub const EMPTY_CODE_HASH: Hash = [0u8; 32];

/// Canonical empty storage root for accounts without contract storage.
pub const EMPTY_STORAGE_ROOT: Hash = [0u8; 32];

/// Minimum stake required for validator eligibility, in ZNHB wei.
pub const MINIMUM_STAKE: u64 = 1_000;

/// Fixed-point scale for the global stake reward index: 2^128.
pub fn index_unit() -> U256 {
    U256::one() << 128
}

/// Token denominations carried by the native ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    /// The primary settlement token.
    NHB,
    /// The staking and rewards token.
    ZNHB,
}

impl Token {
    /// Parse a token symbol, accepting any casing and surrounding whitespace.
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim().to_ascii_uppercase().as_str() {
            "NHB" => Some(Token::NHB),
            "ZNHB" => Some(Token::ZNHB),
            _ => None,
        }
    }

    /// Canonical uppercase symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Token::NHB => "NHB",
            Token::ZNHB => "ZNHB",
        }
    }
}

/// Render an address as a 0x-prefixed lowercase hex string.
///
/// Used wherever addresses appear in event attributes, so that every node
/// emits byte-identical attribute maps.
pub fn address_hex(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr))
}

/// Render a hash as a 0x-prefixed lowercase hex string.
pub fn hash_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}
