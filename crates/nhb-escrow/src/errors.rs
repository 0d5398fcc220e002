//! Escrow error types.

use nhb_state::StateError;
use thiserror::Error;

/// Escrow engine errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EscrowError {
    /// No escrow under the given id.
    #[error("escrow: not found")]
    NotFound,

    /// An escrow already exists under the given id.
    #[error("escrow: id already in use")]
    AlreadyExists,

    /// The escrow is not in the status the operation requires.
    #[error("escrow: invalid status for operation")]
    InvalidStatus,

    /// The caller is not the party allowed to perform the operation.
    #[error("escrow: unauthorized caller")]
    Unauthorized,

    /// Escrowed amount must be positive.
    #[error("escrow: amount must be positive")]
    NonPositiveAmount,

    /// The funding party cannot cover the escrowed amount.
    #[error("escrow: insufficient balance")]
    InsufficientBalance,

    /// Expiry requested before the deadline.
    #[error("escrow: deadline not reached")]
    NotExpired,

    /// No trade under the given id.
    #[error("escrow: trade not found")]
    TradeNotFound,

    /// A trade leg is not in the Funded status.
    #[error("escrow: trade leg not funded")]
    TradeLegNotFunded,

    /// The trade has already settled.
    #[error("escrow: trade already settled")]
    TradeSettled,

    /// State backend failure.
    #[error(transparent)]
    State(#[from] StateError),
}
