//! Processor error types.
//!
//! Validation, policy, and state errors surface to the caller without
//! mutating state; the dispatcher reverts to its per-transaction
//! checkpoint. Integrity errors (`is_integrity`) mean the applier must
//! `reset_to_root` and retry at a higher level.

use nhb_epoch::EpochError;
use nhb_escrow::EscrowError;
use nhb_loyalty::LoyaltyError;
use nhb_stake::StakeError;
use nhb_state::StateError;
use nhb_tx::{TxError, VoucherError};
use thiserror::Error;

/// Processor errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Transaction bound to a different chain.
    #[error("tx: invalid chain id {0}")]
    InvalidChainId(u64),

    /// Sender nonce does not match the account.
    #[error("tx: invalid nonce, expected {expected} got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    /// Transfer amount must be positive.
    #[error("tx: amount must be positive")]
    NonPositiveAmount,

    /// Transfer requires a non-zero recipient.
    #[error("tx: invalid recipient")]
    InvalidRecipient,

    /// Sender balance too low for the transfer.
    #[error("tx: insufficient balance")]
    InsufficientBalance,

    /// The transaction payload failed to parse.
    #[error("tx: invalid payload: {0}")]
    InvalidPayload(String),

    /// The module handling this transaction type is paused.
    #[error("pause: module {0} paused")]
    ModulePaused(String),

    /// A quota limit was exceeded.
    #[error("quota: {0}")]
    QuotaExceeded(String),

    /// The intent reference was already consumed.
    #[error("intent: already consumed")]
    IntentConsumed,

    /// The intent reference expired.
    #[error("intent: expired")]
    IntentExpired,

    /// Paymaster sponsorship was declined.
    #[error("paymaster: {0}")]
    SponsorshipDeclined(String),

    /// Fee routing could not debit the configured payer.
    #[error("fees: insufficient balance for merchant fee")]
    FeeInsufficientBalance,

    /// Heartbeat timestamp not after the device's last heartbeat.
    #[error("heartbeat: stale timestamp")]
    StaleHeartbeat,

    /// Heartbeat arrived before the minimum interval elapsed.
    #[error("heartbeat: below minimum interval")]
    HeartbeatTooSoon,

    /// Envelope-level failure.
    #[error(transparent)]
    Tx(#[from] TxError),

    /// Voucher/receipt failure.
    #[error(transparent)]
    Voucher(#[from] VoucherError),

    /// Staking engine failure.
    #[error(transparent)]
    Stake(#[from] StakeError),

    /// Escrow engine failure.
    #[error(transparent)]
    Escrow(#[from] EscrowError),

    /// Epoch engine failure.
    #[error(transparent)]
    Epoch(#[from] EpochError),

    /// Loyalty engine failure.
    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),

    /// State backend failure.
    #[error(transparent)]
    State(#[from] StateError),
}

impl CoreError {
    /// Whether this error signals storage/decoding corruption. The applier
    /// must `reset_to_root` rather than continue.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            CoreError::State(StateError::Store(_) | StateError::Codec(_))
                | CoreError::Stake(StakeError::State(
                    StateError::Store(_) | StateError::Codec(_)
                ))
                | CoreError::Escrow(EscrowError::State(
                    StateError::Store(_) | StateError::Codec(_)
                ))
                | CoreError::Epoch(EpochError::State(
                    StateError::Store(_) | StateError::Codec(_)
                ))
                | CoreError::Loyalty(LoyaltyError::State(
                    StateError::Store(_) | StateError::Codec(_)
                ))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nhb_state::codec::CodecError;

    #[test]
    fn integrity_classification() {
        assert!(CoreError::State(StateError::Codec(CodecError::Truncated(0))).is_integrity());
        assert!(!CoreError::InvalidRecipient.is_integrity());
        assert!(!CoreError::State(StateError::UsernameTaken).is_integrity());
    }

    #[test]
    fn errors_carry_stable_prefixes() {
        assert!(CoreError::QuotaExceeded("requests".into())
            .to_string()
            .starts_with("quota:"));
        assert!(CoreError::FeeInsufficientBalance.to_string().starts_with("fees:"));
        assert!(CoreError::InvalidChainId(5).to_string().starts_with("tx:"));
    }
}
