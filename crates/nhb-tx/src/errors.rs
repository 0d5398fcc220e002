//! Transaction and voucher error types.

use thiserror::Error;

/// Envelope-level errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxError {
    /// Transaction bound to a different chain.
    #[error("tx: invalid chain id {0}")]
    InvalidChainId(u64),

    /// A required signature is absent.
    #[error("tx: signature missing")]
    SignatureMissing,

    /// Signature bytes are malformed or recovery failed.
    #[error("tx: signature invalid")]
    SignatureInvalid,

    /// The recovered sponsor does not match the declared paymaster.
    #[error("tx: paymaster signature mismatch")]
    SponsorMismatch,

    /// Canonical serialization failed.
    #[error("tx: serialization failed")]
    Serialization,
}

/// Mint voucher / swap payout receipt errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoucherError {
    /// The voucher signer is not the configured authority.
    #[error("mint: invalid signer")]
    InvalidSigner,

    /// The invoice id has already been settled.
    #[error("mint: invoice already used")]
    InvoiceUsed,

    /// The voucher expired before the block time.
    #[error("mint: voucher expired")]
    Expired,

    /// Voucher bound to a different chain.
    #[error("mint: invalid chain id {0}")]
    InvalidChainId(u64),

    /// Minting would exceed the annual emission cap.
    #[error("mint: emission cap exceeded")]
    EmissionCapExceeded,

    /// Unknown token symbol.
    #[error("mint: invalid token")]
    InvalidToken,

    /// Amount failed decimal big-int parsing.
    #[error("mint: invalid amount")]
    InvalidAmount,
}
