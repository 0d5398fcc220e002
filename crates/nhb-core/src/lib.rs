//! # nhb-core
//!
//! The deterministic state-transition processor of the NHB chain.
//!
//! ## Role in System
//!
//! - **Dispatcher**: validates envelopes (chain id, pause view, quota,
//!   intent registry, signatures, nonces) and routes them to the engine
//!   crates; every transaction executes against a checkpoint and a failed
//!   handler leaves no trace
//! - **Block Lifecycle**: `begin_block` seeds timing,
//!   `process_block_lifecycle` drives quota pruning, reward accrual,
//!   loyalty settlement, and epoch finalization, `commit` freezes the root,
//!   `reset_to_root` discards staged state
//! - **Fee Routing**: merchant-domain policies debit the configured payer
//!   and credit the owner wallet atomically with the transaction

pub mod config;
pub mod engagement;
pub mod errors;
pub mod fees;
pub mod intents;
pub mod payloads;
pub mod processor;
pub mod quota;

pub use config::{CoreConfig, FeePayer, FeePolicy, HeartbeatConfig, PauseView, QuotaLimits};
pub use errors::CoreError;
pub use processor::Processor;
