//! # State Backend
//!
//! Typed accessors over the authenticated store plus the per-block event
//! log. This is the single concrete implementation of the `StateAccess`
//! port; the dispatcher owns one and hands it to the engines.
//!
//! ## Account Encoding
//!
//! Accounts live as two records (state + metadata) written together by
//! `put_account`. A version-1 combined record is the legacy encoding:
//! `get_account` migrates it to the split layout inside the current staged
//! write set, `peek_account` decodes it without writing.

use crate::accounts::Account;
use crate::codec::{
    decode_address_list, decode_legacy_record, decode_meta_record, decode_state_record,
    decode_username_index, encode_address_list, encode_meta_record, encode_state_record,
    encode_username_index, CodecError, ACCOUNT_STATE_VERSION, LEGACY_ACCOUNT_VERSION,
};
use crate::keys::{
    account_meta_key, account_state_key, label_key, USERNAME_INDEX_LABEL,
    VALIDATOR_ELIGIBLE_SET_LABEL, VALIDATOR_SET_LABEL,
};
use crate::{StateAccess, StateError};
use nhb_trie::{Store, StoreCheckpoint};
use nhb_types::{Address, Event, Hash};
use std::collections::BTreeMap;
use tracing::debug;

/// Checkpoint spanning the store overlay and the event log.
pub struct BackendCheckpoint {
    store: StoreCheckpoint,
    events_len: usize,
}

/// Staged ledger state: authenticated store + per-block event log.
#[derive(Default)]
pub struct StateBackend {
    store: Store,
    events: Vec<Event>,
}

impl StateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Store) -> Self {
        Self {
            store,
            events: Vec::new(),
        }
    }

    // =========================================================================
    // COMMITMENT
    // =========================================================================

    /// Root of the merged (staged) view.
    pub fn pending_root(&self) -> Hash {
        self.store.hash()
    }

    /// Root of the last committed state.
    pub fn committed_root(&self) -> Hash {
        self.store.committed_root()
    }

    /// Freeze staged writes into a new committed root.
    pub fn commit(&mut self, parent: Hash, block_number: u64) -> Hash {
        self.store.commit(parent, block_number)
    }

    /// Discard staged writes; restore a retained root.
    pub fn reset(&mut self, root: Hash) -> Result<(), StateError> {
        self.store.reset(root)?;
        Ok(())
    }

    /// Immutable snapshot over the committed state, for read-only queries.
    pub fn copy_committed(&self) -> StateBackend {
        StateBackend {
            store: self.store.copy(),
            events: Vec::new(),
        }
    }

    /// Capture the overlay and event log for a per-transaction revert.
    pub fn checkpoint(&self) -> BackendCheckpoint {
        BackendCheckpoint {
            store: self.store.checkpoint(),
            events_len: self.events.len(),
        }
    }

    /// Revert to a checkpoint taken before a failed transaction.
    pub fn revert(&mut self, checkpoint: BackendCheckpoint) {
        self.store.revert(checkpoint.store);
        self.events.truncate(checkpoint.events_len);
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    /// Decode an account without staging a migration (pure query path).
    pub fn peek_account(&self, address: &Address) -> Result<Account, StateError> {
        match self.store.get(&account_state_key(address)) {
            None => Ok(Account::default()),
            Some(bytes) if bytes.first() == Some(&LEGACY_ACCOUNT_VERSION) => {
                Ok(decode_legacy_record(&bytes)?)
            }
            Some(bytes) => {
                let mut account = Account::default();
                decode_state_record(&bytes, &mut account)?;
                if let Some(meta) = self.store.get(&account_meta_key(address)) {
                    decode_meta_record(&meta, &mut account)?;
                }
                Ok(account)
            }
        }
    }

    /// Current username index (decoded copy).
    pub fn username_index(&self) -> Result<BTreeMap<String, Address>, StateError> {
        match self.store.get(&label_key(USERNAME_INDEX_LABEL)) {
            None => Ok(BTreeMap::new()),
            Some(bytes) => Ok(decode_username_index(&bytes)?),
        }
    }

    /// Address bound to a username, if any.
    pub fn username_owner(&self, username: &str) -> Result<Option<Address>, StateError> {
        Ok(self.username_index()?.get(username).copied())
    }

    fn stored_username(&self, address: &Address) -> Result<String, StateError> {
        Ok(self.peek_account(address)?.username)
    }

    // =========================================================================
    // VALIDATOR SETS
    // =========================================================================

    /// Active validator set, address-sorted.
    pub fn validator_set(&self) -> Result<Vec<Address>, StateError> {
        self.address_list(VALIDATOR_SET_LABEL)
    }

    /// Replace the active validator set. Stored sorted for canonical bytes.
    pub fn set_validator_set(&mut self, mut validators: Vec<Address>) {
        validators.sort();
        validators.dedup();
        self.store
            .update(label_key(VALIDATOR_SET_LABEL), encode_address_list(&validators));
    }

    /// Eligible validator set (stake >= minimum), address-sorted.
    pub fn eligible_validators(&self) -> Result<Vec<Address>, StateError> {
        self.address_list(VALIDATOR_ELIGIBLE_SET_LABEL)
    }

    /// Replace the eligible validator set.
    pub fn set_eligible_validators(&mut self, mut validators: Vec<Address>) {
        validators.sort();
        validators.dedup();
        self.store.update(
            label_key(VALIDATOR_ELIGIBLE_SET_LABEL),
            encode_address_list(&validators),
        );
    }

    fn address_list(&self, label: &str) -> Result<Vec<Address>, StateError> {
        match self.store.get(&label_key(label)) {
            None => Ok(Vec::new()),
            Some(bytes) => Ok(decode_address_list(&bytes)?),
        }
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Deep copy of the per-block event log.
    pub fn events(&self) -> Vec<Event> {
        self.events.clone()
    }

    /// Clear the event log at a block boundary.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl StateAccess for StateBackend {
    fn get_account(&mut self, address: &Address) -> Result<Account, StateError> {
        let state_key = account_state_key(address);
        let Some(bytes) = self.store.get(&state_key) else {
            return Ok(Account::default());
        };

        match bytes.first() {
            Some(&LEGACY_ACCOUNT_VERSION) => {
                // Legacy combined record: rewrite as the split encoding
                // within the current staged write set.
                let account = decode_legacy_record(&bytes)?;
                self.store.update(state_key, encode_state_record(&account));
                self.store
                    .update(account_meta_key(address), encode_meta_record(&account));
                debug!(address = %nhb_types::address_hex(address), "migrated legacy account record");
                Ok(account)
            }
            Some(&ACCOUNT_STATE_VERSION) => {
                let mut account = Account::default();
                decode_state_record(&bytes, &mut account)?;
                if let Some(meta) = self.store.get(&account_meta_key(address)) {
                    decode_meta_record(&meta, &mut account)?;
                }
                Ok(account)
            }
            Some(&other) => Err(CodecError::UnsupportedVersion(other).into()),
            None => Err(CodecError::Truncated(0).into()),
        }
    }

    fn put_account(&mut self, address: &Address, account: &Account) -> Result<(), StateError> {
        let old_username = self.stored_username(address)?;
        if old_username != account.username {
            let mut index = self.username_index()?;
            if !account.username.is_empty() {
                if let Some(owner) = index.get(&account.username) {
                    if owner != address {
                        return Err(StateError::UsernameTaken);
                    }
                }
            }
            if !old_username.is_empty() && index.get(&old_username) == Some(address) {
                index.remove(&old_username);
            }
            if !account.username.is_empty() {
                index.insert(account.username.clone(), *address);
            }
            self.store
                .update(label_key(USERNAME_INDEX_LABEL), encode_username_index(&index));
        }

        self.store
            .update(account_state_key(address), encode_state_record(account));
        self.store
            .update(account_meta_key(address), encode_meta_record(account));
        Ok(())
    }

    fn get_record(&self, key: &Hash) -> Option<Vec<u8>> {
        self.store.get(key)
    }

    fn put_record(&mut self, key: Hash, value: Vec<u8>) {
        self.store.update(key, value);
    }

    fn remove_record(&mut self, key: &Hash) {
        self.store.remove(key);
    }

    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}
