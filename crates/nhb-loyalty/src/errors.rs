//! Loyalty error types.

use nhb_state::StateError;
use thiserror::Error;

/// Loyalty engine errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoyaltyError {
    /// State backend failure.
    #[error(transparent)]
    State(#[from] StateError),
}
