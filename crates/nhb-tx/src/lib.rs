//! # nhb-tx
//!
//! Typed transaction envelopes for the NHB core.
//!
//! ## Wire Format
//!
//! Transactions travel as JSON with a fixed field order; the canonical hash
//! is the SHA-256 of that serialization with the signature fields omitted.
//! Signatures are Ethereum-style 65-byte recoverable secp256k1; a second
//! signature authorizes paymaster sponsorship. Module-attested types (mint,
//! swap payout receipt) carry no sender signature: their authority is the
//! embedded voucher/receipt signature.

pub mod envelope;
pub mod errors;
pub mod voucher;
pub mod wire;

pub use envelope::{Transaction, TxType};
pub use errors::{TxError, VoucherError};
pub use voucher::{MintVoucher, SwapPayoutReceipt};
