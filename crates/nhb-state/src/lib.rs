//! # nhb-state
//!
//! Account model and state backend for the NHB core.
//!
//! ## Role in System
//!
//! - **Account Model**: dual-balance accounts with stake, unbonding queue,
//!   engagement counters, and identity, split into a state record and a
//!   metadata record for legacy-migration support
//! - **Canonical Codec**: length-prefixed binary record encoding; record
//!   bytes feed the authenticated root, so the codec must be canonical
//! - **State Backend**: typed accessors over the authenticated store plus
//!   the per-block event log and the username index
//! - **Capability Port**: `StateAccess` is the minimal surface the engine
//!   crates accept; they never see the dispatcher

pub mod accounts;
pub mod backend;
pub mod codec;
pub mod errors;
pub mod keys;
pub mod ports;

pub use accounts::{Account, EngagementMeta, Unbond};
pub use backend::StateBackend;
pub use codec::{Cursor, Writer};
pub use errors::StateError;
pub use ports::StateAccess;
