//! # Persistence Keys
//!
//! Every record in the authenticated store is addressed by the Keccak-256
//! hash of a domain-prefixed raw key. Fixed singleton records (validator
//! sets, indexes, histories) hash a bare ASCII label; per-entity records
//! hash a prefix plus length-prefixed key parts so that no two raw keys can
//! collide by concatenation.

use nhb_crypto::keccak256;
use nhb_types::{Address, Hash};

// Singleton record labels. These spellings are part of the external
// interface; the hashed keys identify the same records on every node.
pub const VALIDATOR_SET_LABEL: &str = "validator-set";
pub const VALIDATOR_ELIGIBLE_SET_LABEL: &str = "validator-eligible-set";
pub const USERNAME_INDEX_LABEL: &str = "username-index";
pub const EPOCH_HISTORY_LABEL: &str = "epoch-history";
pub const STAKE_REWARD_STATE_LABEL: &str = "stake-reward-state";
pub const REWARD_HISTORY_LABEL: &str = "reward-history";

/// Trie key of a singleton record.
pub fn label_key(label: &str) -> Hash {
    keccak256(label.as_bytes())
}

/// Trie key of a per-entity record: `keccak256(prefix || len(part) || part ...)`.
pub fn record_key(prefix: &str, parts: &[&[u8]]) -> Hash {
    let mut raw = Vec::with_capacity(prefix.len() + parts.iter().map(|p| p.len() + 4).sum::<usize>());
    raw.extend_from_slice(prefix.as_bytes());
    for part in parts {
        raw.extend_from_slice(&(part.len() as u32).to_le_bytes());
        raw.extend_from_slice(part);
    }
    keccak256(&raw)
}

/// Account state record key.
pub fn account_state_key(address: &Address) -> Hash {
    record_key("acct-state:", &[address])
}

/// Account metadata record key.
pub fn account_meta_key(address: &Address) -> Hash {
    record_key("acct-meta:", &[address])
}
