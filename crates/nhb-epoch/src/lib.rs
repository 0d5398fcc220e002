//! # nhb-epoch
//!
//! Epoch engine: validator ranking, rotation, and reward settlement.
//!
//! ## Finalization Flow
//!
//! An epoch closes when `height > 0 && height % epoch_length == 0`:
//!
//! 1. Rank eligible validators by composite weight
//!    (`stake_weight * stake + engagement_weight * score`), descending,
//!    ties broken by ascending address bytes
//! 2. With rotation enabled, replace the active set with the top
//!    `max_validators`
//! 3. Split the per-epoch emission across three lanes (validators equally,
//!    stakers pro-rata by stake, engagement pro-rata by score), remainders
//!    by largest remainder then address order
//! 4. Credit payouts, append the snapshot and settlement to bounded
//!    histories, emit the epoch event suite

pub mod engine;
pub mod errors;
pub mod types;

pub use engine::{EpochConfig, EpochEngine};
pub use errors::EpochError;
pub use types::{EpochSnapshot, RewardPayout, RewardSettlement, WeightEntry};
