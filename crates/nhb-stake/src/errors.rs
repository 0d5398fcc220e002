//! Staking error types.

use nhb_state::StateError;
use thiserror::Error;

/// Staking engine errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StakeError {
    /// Delegated or claimed amount must be positive.
    #[error("stake: amount must be positive")]
    NonPositiveAmount,

    /// Spendable ZNHB balance too low for the delegation.
    #[error("stake: insufficient balance")]
    InsufficientBalance,

    /// Switching validators while stake is still locked.
    #[error("stake: undelegate before switching validators")]
    ValidatorSwitchBlocked,

    /// Undelegate/claim without an active delegation.
    #[error("stake: no active delegation")]
    NoActiveDelegation,

    /// Undelegated amount exceeds the locked stake.
    #[error("stake: amount exceeds locked stake")]
    ExceedsLocked,

    /// No pending unbond with the requested id.
    #[error("stake: unknown unbond id {0}")]
    UnknownUnbond(u64),

    /// The unbonding period has not elapsed.
    #[error("stake: unbond not claimable until {release_time}")]
    NotClaimable { release_time: u64 },

    /// A module-attested mint would exceed the annual emission cap.
    #[error("stake: emission cap exceeded")]
    EmissionCapExceeded,

    /// State backend failure.
    #[error(transparent)]
    State(#[from] StateError),
}
