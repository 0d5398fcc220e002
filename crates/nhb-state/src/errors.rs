//! State backend error types.

use crate::codec::CodecError;
use nhb_trie::TrieError;
use thiserror::Error;

/// State backend errors.
///
/// `Store` and `Codec` are integrity errors: the applier should
/// `reset_to_root` rather than continue. The rest are validation errors and
/// never mutate state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// Username already bound to a different address (INVARIANT-4).
    #[error("identity: username already taken")]
    UsernameTaken,

    /// Username fails the 3-20 character constraint.
    #[error("identity: invalid username")]
    InvalidUsername,

    /// Account already holds a username.
    #[error("identity: account already registered")]
    AlreadyRegistered,

    /// Authenticated store failure.
    #[error("state: {0}")]
    Store(#[from] TrieError),

    /// Record decoding failure.
    #[error("state: {0}")]
    Codec(#[from] CodecError),
}
