//! # State Access Port
//!
//! The minimal capability surface the engine crates accept. Engines never
//! import the dispatcher; they are handed something implementing
//! `StateAccess` and operate on locally owned `Account` values.

use crate::{Account, StateError};
use nhb_types::{Address, Event, Hash};

/// Capability interface over the staged ledger state.
pub trait StateAccess {
    /// Load an account, migrating a legacy encoding into the staged write
    /// set if one is found. Missing accounts decode as zero-valued.
    fn get_account(&mut self, address: &Address) -> Result<Account, StateError>;

    /// Persist an account (both records), re-indexing the username map
    /// atomically with the write.
    fn put_account(&mut self, address: &Address, account: &Account) -> Result<(), StateError>;

    /// Read a raw record by trie key.
    fn get_record(&self, key: &Hash) -> Option<Vec<u8>>;

    /// Stage a raw record write.
    fn put_record(&mut self, key: Hash, value: Vec<u8>);

    /// Stage a raw record deletion.
    fn remove_record(&mut self, key: &Hash);

    /// Append an event to the per-block log.
    fn emit(&mut self, event: Event);
}
