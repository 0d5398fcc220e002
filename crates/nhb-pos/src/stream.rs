//! # Finality Stream
//!
//! Ring-buffered update history plus per-subscriber bounded channels.

use nhb_types::Hash;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Updates retained for cursor replay.
pub const HISTORY_CAPACITY: usize = 2048;

/// Per-subscriber live channel depth.
const CHANNEL_CAPACITY: usize = 64;

/// Intent finality states surfaced to POS terminals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalityStatus {
    /// The intent's transaction entered a block.
    Pending,
    /// The block is final.
    Finalized,
}

impl FinalityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalityStatus::Pending => "pending",
            FinalityStatus::Finalized => "finalized",
        }
    }
}

/// One finality update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalityUpdate {
    /// Monotonic stream sequence (also the replay cursor).
    pub sequence: u64,
    /// Opaque cursor string, `height:sequence`.
    pub cursor: String,
    /// The off-chain payment intent reference.
    pub intent_ref: Vec<u8>,
    /// Transaction that consumed the intent.
    pub tx_hash: Hash,
    pub status: FinalityStatus,
    pub block_hash: Hash,
    pub height: u64,
    pub timestamp: u64,
}

/// A live subscription: retained history after the cursor, then the
/// bounded live channel.
pub struct Subscription {
    /// Subscriber id, for `unsubscribe`.
    pub id: u64,
    /// History replay, oldest first.
    pub replay: Vec<FinalityUpdate>,
    /// Live updates; dropped entries are recoverable via cursor replay.
    pub receiver: mpsc::Receiver<FinalityUpdate>,
}

struct Inner {
    history: VecDeque<FinalityUpdate>,
    next_sequence: u64,
    subscribers: HashMap<u64, mpsc::Sender<FinalityUpdate>>,
    next_subscriber: u64,
}

/// POS finality stream store and fan-out.
#[derive(Clone)]
pub struct PosStream {
    inner: Arc<Mutex<Inner>>,
}

impl Default for PosStream {
    fn default() -> Self {
        Self::new()
    }
}

impl PosStream {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                history: VecDeque::with_capacity(HISTORY_CAPACITY),
                next_sequence: 1,
                subscribers: HashMap::new(),
                next_subscriber: 1,
            })),
        }
    }

    /// Publish an update. Assigns the sequence under the lock, broadcasts
    /// after releasing it; a full subscriber channel drops the update.
    pub fn publish(
        &self,
        intent_ref: Vec<u8>,
        tx_hash: Hash,
        status: FinalityStatus,
        block_hash: Hash,
        height: u64,
        timestamp: u64,
    ) -> FinalityUpdate {
        let (update, senders) = {
            let mut inner = self.inner.lock();
            let sequence = inner.next_sequence;
            inner.next_sequence += 1;

            let update = FinalityUpdate {
                sequence,
                cursor: format!("{height}:{sequence}"),
                intent_ref,
                tx_hash,
                status,
                block_hash,
                height,
                timestamp,
            };

            inner.history.push_back(update.clone());
            while inner.history.len() > HISTORY_CAPACITY {
                inner.history.pop_front();
            }

            let senders: Vec<mpsc::Sender<FinalityUpdate>> =
                inner.subscribers.values().cloned().collect();
            (update, senders)
        };

        for sender in senders {
            // Non-blocking: slow consumers lose live updates and recover
            // through cursor replay.
            let _ = sender.try_send(update.clone());
        }
        update
    }

    /// Subscribe with a replay of history after `after_sequence`
    /// (0 replays everything retained).
    pub fn subscribe(&self, after_sequence: u64) -> Subscription {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let mut inner = self.inner.lock();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.insert(id, sender);

        let replay: Vec<FinalityUpdate> = inner
            .history
            .iter()
            .filter(|u| u.sequence > after_sequence)
            .cloned()
            .collect();
        debug!(id, replayed = replay.len(), "pos subscriber attached");
        Subscription {
            id,
            replay,
            receiver,
        }
    }

    /// Cancel a subscription. Idempotent.
    pub fn unsubscribe(&self, id: u64) {
        self.inner.lock().subscribers.remove(&id);
    }

    /// Number of retained updates.
    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }
}
