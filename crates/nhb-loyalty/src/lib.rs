//! # nhb-loyalty
//!
//! Loyalty reward fabric: per-transaction accrual with caps, settled at
//! block close with budget pro-ration.
//!
//! ## Flow
//!
//! Transaction handlers queue `PendingReward` entries (sender base rewards,
//! merchant program rewards); caps are enforced at queue time. At
//! `end_block_rewards` the whole queue settles against the day's budget:
//! when the budget falls short and pro-ration is enabled, every payout is
//! scaled by `budget / demand` in `10^18` fixed point and exactly one
//! `loyalty.budget_prorated` event is emitted. Unpaid demand never carries
//! over.
//!
//! ## Scale Note
//!
//! The pro-rate ratio keeps the `10^18` wire scale; the `2^128` scale
//! belongs to the staking index and never appears here.

pub mod engine;
pub mod errors;
pub mod state;

pub use engine::{LoyaltyConfig, LoyaltyEngine};
pub use errors::LoyaltyError;
pub use state::{LoyaltyState, PendingReward};
