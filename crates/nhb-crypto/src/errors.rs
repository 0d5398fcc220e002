//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature bytes are malformed (wrong length, invalid `v`, out-of-range
    /// scalars).
    #[error("crypto: invalid signature format")]
    InvalidSignatureFormat,

    /// Signature is well-formed but recovery failed.
    #[error("crypto: signature recovery failed")]
    RecoveryFailed,

    /// Secret key bytes do not encode a valid scalar.
    #[error("crypto: invalid private key")]
    InvalidPrivateKey,

    /// Public key bytes do not encode a valid curve point.
    #[error("crypto: invalid public key")]
    InvalidPublicKey,
}
