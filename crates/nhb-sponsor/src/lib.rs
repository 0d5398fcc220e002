//! # nhb-sponsor
//!
//! Paymaster sponsorship evaluation and throttling.
//!
//! ## Flow
//!
//! A transaction naming a paymaster is assessed before execution:
//! module gate, co-signature recovery, sponsor balance, then the three
//! throttle tiers in order merchant → device → global. The first tier whose
//! daily counter the transaction's gas budget would exceed throttles the
//! sponsorship. Counters are keyed by UTC day, so day rollover zeroes them
//! implicitly via lookup.

pub mod counters;
pub mod engine;

pub use counters::SponsorCounter;
pub use engine::{
    SponsorConfig, SponsorEngine, SponsorshipAssessment, SponsorshipStatus, ThrottleScope,
    TierLimits,
};
