//! # nhb-escrow
//!
//! Escrow state machines and atomic trade settlement.
//!
//! ## Lifecycles
//!
//! Two shapes coexist:
//!
//! - **Legacy**: `Open → InProgress → {Released | Refunded | Disputed →
//!   {Released | Refunded}}`. Only the buyer releases, only the seller
//!   refunds, only the buyer disputes, only the configured arbitrator
//!   arbitrates.
//! - **Modern**: `Init → Funded → {Released | Refunded | Expired}`, plus a
//!   trade engine tying two funded escrows into an all-or-nothing
//!   settlement.
//!
//! Legacy records are stored in the old encoding and migrate to the modern
//! encoding on first touch, inside the same staged write set.

pub mod engine;
pub mod errors;
pub mod types;

pub use engine::{ArbitrationOutcome, EscrowConfig, EscrowEngine};
pub use errors::EscrowError;
pub use types::{EscrowKind, EscrowRecord, EscrowStatus, TradeRecord};
