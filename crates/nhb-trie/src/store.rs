//! # Authenticated Store
//!
//! Staged-write key-value store with Merkle commitment.
//!
//! ## Write Model
//!
//! Mutations land in an overlay (`staged`) over the committed record map.
//! `hash()` computes the root of the merged view without folding; `commit`
//! folds the overlay down atomically, records a snapshot, and advances the
//! committed root. `reset` discards the overlay and can restore any retained
//! snapshot root. `checkpoint`/`revert` bracket a single transaction so a
//! failed handler leaves no trace in the overlay.
//!
//! ## Determinism
//!
//! The root is rebuilt from the sorted key list, so insertion order never
//! affects it (INVARIANT: same records = same root).

use crate::node::{TrieNode, EMPTY_ROOT};
use crate::{Nibbles, TrieError};
use nhb_types::Hash;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Number of committed snapshots retained for `reset`. Older roots are
    /// pruned and can no longer be restored.
    pub snapshot_retention: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_retention: 128,
        }
    }
}

/// A retained committed state, addressable by root.
#[derive(Clone, Debug)]
struct Snapshot {
    root: Hash,
    parent: Hash,
    block_number: u64,
    records: BTreeMap<Hash, Vec<u8>>,
}

/// Opaque overlay checkpoint for per-transaction atomicity.
pub struct StoreCheckpoint {
    staged: BTreeMap<Hash, Option<Vec<u8>>>,
}

/// Merkle-committed key-value store.
#[derive(Clone, Debug)]
pub struct Store {
    /// Records visible at `committed_root`.
    committed: BTreeMap<Hash, Vec<u8>>,
    /// Staged writes; `None` marks a staged deletion.
    staged: BTreeMap<Hash, Option<Vec<u8>>>,
    /// Root of the committed record map.
    committed_root: Hash,
    /// Retained history for `reset`, newest at the back.
    snapshots: VecDeque<Snapshot>,
    config: StoreConfig,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store with default retention.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with custom configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            committed: BTreeMap::new(),
            staged: BTreeMap::new(),
            committed_root: EMPTY_ROOT,
            snapshots: VecDeque::new(),
            config,
        }
    }

    /// Read a record from the merged (staged-over-committed) view.
    pub fn get(&self, key: &Hash) -> Option<Vec<u8>> {
        match self.staged.get(key) {
            Some(Some(value)) => Some(value.clone()),
            Some(None) => None,
            None => self.committed.get(key).cloned(),
        }
    }

    /// Stage a record write.
    pub fn update(&mut self, key: Hash, value: Vec<u8>) {
        self.staged.insert(key, Some(value));
    }

    /// Stage a record deletion.
    pub fn remove(&mut self, key: &Hash) {
        if self.committed.contains_key(key) {
            self.staged.insert(*key, None);
        } else {
            self.staged.remove(key);
        }
    }

    /// Whether uncommitted writes are staged.
    pub fn is_dirty(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Root of the last committed state.
    pub fn committed_root(&self) -> Hash {
        self.committed_root
    }

    /// Compute the root of the merged view without committing.
    pub fn hash(&self) -> Hash {
        if self.staged.is_empty() {
            return self.committed_root;
        }
        Self::compute_root_of(self.merged())
    }

    /// Fold staged writes into the committed map, record a snapshot, and
    /// return the new committed root.
    pub fn commit(&mut self, parent: Hash, block_number: u64) -> Hash {
        for (key, value) in std::mem::take(&mut self.staged) {
            match value {
                Some(bytes) => {
                    self.committed.insert(key, bytes);
                }
                None => {
                    self.committed.remove(&key);
                }
            }
        }

        self.committed_root = Self::compute_root_of(self.committed.clone());
        self.snapshots.push_back(Snapshot {
            root: self.committed_root,
            parent,
            block_number,
            records: self.committed.clone(),
        });
        while self.snapshots.len() > self.config.snapshot_retention {
            self.snapshots.pop_front();
        }

        debug!(
            block_number,
            root = %hex::encode(self.committed_root),
            records = self.committed.len(),
            "store committed"
        );
        self.committed_root
    }

    /// Discard staged writes; for a historical root, restore its snapshot.
    pub fn reset(&mut self, root: Hash) -> Result<(), TrieError> {
        self.staged.clear();
        if root == self.committed_root {
            return Ok(());
        }
        if root == EMPTY_ROOT {
            self.committed.clear();
            self.committed_root = EMPTY_ROOT;
            return Ok(());
        }
        let snapshot = self
            .snapshots
            .iter()
            .rev()
            .find(|s| s.root == root)
            .cloned()
            .ok_or(TrieError::UnknownRoot(root))?;
        self.committed = snapshot.records;
        self.committed_root = snapshot.root;
        Ok(())
    }

    /// Fresh instance over the committed state, without staged writes or
    /// history. Serves concurrent read-only queries.
    pub fn copy(&self) -> Store {
        Store {
            committed: self.committed.clone(),
            staged: BTreeMap::new(),
            committed_root: self.committed_root,
            snapshots: VecDeque::new(),
            config: self.config.clone(),
        }
    }

    /// Parent root and block number recorded for a retained root.
    pub fn snapshot_meta(&self, root: &Hash) -> Option<(Hash, u64)> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.root == *root)
            .map(|s| (s.parent, s.block_number))
    }

    /// Capture the overlay for later `revert`.
    pub fn checkpoint(&self) -> StoreCheckpoint {
        StoreCheckpoint {
            staged: self.staged.clone(),
        }
    }

    /// Restore the overlay captured by `checkpoint`.
    pub fn revert(&mut self, checkpoint: StoreCheckpoint) {
        self.staged = checkpoint.staged;
    }

    fn merged(&self) -> BTreeMap<Hash, Vec<u8>> {
        let mut merged = self.committed.clone();
        for (key, value) in &self.staged {
            match value {
                Some(bytes) => {
                    merged.insert(*key, bytes.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged
    }

    /// Build the Patricia root from a record map. `BTreeMap` iteration is
    /// key-ordered, which fixes the item order the recursion sees.
    fn compute_root_of(records: BTreeMap<Hash, Vec<u8>>) -> Hash {
        if records.is_empty() {
            return EMPTY_ROOT;
        }
        let items: Vec<(Nibbles, Vec<u8>)> = records
            .into_iter()
            .map(|(key, value)| (Nibbles::from_bytes(&key), value))
            .collect();
        Self::build_node(&items, 0)
    }

    /// Recursively build trie nodes, returning the subtree hash.
    fn build_node(items: &[(Nibbles, Vec<u8>)], depth: usize) -> Hash {
        if items.is_empty() {
            return EMPTY_ROOT;
        }

        if items.len() == 1 {
            let (key, value) = &items[0];
            return TrieNode::Leaf {
                path: key.slice(depth),
                value: value.clone(),
            }
            .hash();
        }

        // Check for a common prefix below the current depth.
        let first_key = &items[0].0;
        let common_len = items
            .iter()
            .skip(1)
            .map(|(k, _)| k.slice(depth).common_prefix_len(&first_key.slice(depth)))
            .min()
            .unwrap_or(0);

        if common_len > 0 {
            let prefix = first_key.slice_range(depth, depth + common_len);
            let child = Self::build_node(items, depth + common_len);
            return TrieNode::Extension {
                path: prefix,
                child,
            }
            .hash();
        }

        let mut children: [Option<Hash>; 16] = [None; 16];
        let mut branch_value: Option<Vec<u8>> = None;

        for nibble in 0..16u8 {
            let group: Vec<_> = items
                .iter()
                .filter(|(k, _)| k.len() > depth && k.at(depth) == nibble)
                .cloned()
                .collect();
            if !group.is_empty() {
                children[nibble as usize] = Some(Self::build_node(&group, depth + 1));
            }
        }

        for (key, value) in items {
            if key.len() == depth {
                branch_value = Some(value.clone());
                break;
            }
        }

        TrieNode::Branch {
            children: Box::new(children),
            value: branch_value,
        }
        .hash()
    }
}
