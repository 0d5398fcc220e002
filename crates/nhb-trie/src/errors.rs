//! Store error types.
//!
//! Store errors are integrity errors in the sense of the core's error
//! policy: the applier is expected to `reset_to_root` and retry at a higher
//! level rather than continue on a possibly-inconsistent view.

use nhb_types::Hash;
use thiserror::Error;

/// Authenticated store errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrieError {
    /// The requested root is not in the retained snapshot history.
    #[error("store: unknown root {}", hex::encode(.0))]
    UnknownRoot(Hash),

    /// A record failed to decode. Indicates corruption or a version
    /// mismatch; never produced by well-formed commits.
    #[error("store: corrupt record under {}", hex::encode(.0))]
    CorruptRecord(Hash),
}
