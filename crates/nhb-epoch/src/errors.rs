//! Epoch engine error types.

use nhb_state::StateError;
use thiserror::Error;

/// Epoch engine errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EpochError {
    /// State backend failure.
    #[error(transparent)]
    State(#[from] StateError),
}
