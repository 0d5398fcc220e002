//! # nhb-pos
//!
//! POS intent finality stream.
//!
//! ## Model
//!
//! The core publishes `FinalityUpdate`s as intents enter blocks and reach
//! finality. Subscribers get a replay of retained history after their
//! cursor plus a bounded live channel. Publishing never blocks: a full
//! subscriber channel drops the update, and the subscriber recovers the
//! gap by re-subscribing from its last cursor (the store keeps the last
//! 2048 updates).
//!
//! This is the only multi-producer/consumer surface of the core. The
//! subscriber map lock covers set mutation and sequence assignment only;
//! fan-out happens after the lock is released.

pub mod stream;

pub use stream::{FinalityStatus, FinalityUpdate, PosStream, Subscription};
