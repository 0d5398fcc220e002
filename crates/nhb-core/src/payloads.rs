//! # Transaction Payloads
//!
//! JSON payload shapes carried in the envelope `data` field. Parsing
//! failures surface as `CoreError::InvalidPayload` before any state is
//! touched.

use crate::errors::CoreError;
use nhb_tx::{wire, MintVoucher, SwapPayoutReceipt};
use nhb_types::{Hash, Token};
use serde::Deserialize;

/// `register_identity` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterIdentityPayload {
    pub username: String,
}

/// `stake_claim` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeClaimPayload {
    pub unbond_id: u64,
}

/// Escrow creation payload (`escrow_open` / `escrow_create`). The seller
/// comes from the envelope `to` field and the amount from `value`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowCreatePayload {
    pub token: String,
    #[serde(default)]
    pub deadline: u64,
}

impl EscrowCreatePayload {
    pub fn token(&self) -> Result<Token, CoreError> {
        Token::parse(&self.token)
            .ok_or_else(|| CoreError::InvalidPayload(format!("unknown token {}", self.token)))
    }
}

/// Payload naming an existing escrow (`escrow_accept`, `escrow_release`,
/// `escrow_refund`, `escrow_dispute`, `escrow_fund`, `escrow_expire`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowRefPayload {
    #[serde(with = "wire::opt_array_hex")]
    pub escrow_id: Option<Hash>,
}

impl EscrowRefPayload {
    pub fn id(&self) -> Result<Hash, CoreError> {
        self.escrow_id
            .ok_or_else(|| CoreError::InvalidPayload("missing escrowId".to_string()))
    }
}

/// `escrow_arbitrate` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowArbitratePayload {
    #[serde(with = "wire::opt_array_hex")]
    pub escrow_id: Option<Hash>,
    pub outcome: String,
}

/// `trade_create` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeCreatePayload {
    #[serde(with = "wire::opt_array_hex")]
    pub leg_a: Option<Hash>,
    #[serde(with = "wire::opt_array_hex")]
    pub leg_b: Option<Hash>,
}

/// `trade_settle` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSettlePayload {
    #[serde(with = "wire::opt_array_hex")]
    pub trade_id: Option<Hash>,
}

/// `mint` payload: the voucher plus the authority signature over its
/// canonical digest.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintPayload {
    pub voucher: MintVoucher,
    #[serde(with = "wire::opt_bytes_hex")]
    pub signature: Option<Vec<u8>>,
}

/// `swap_payout_receipt` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapPayoutPayload {
    pub receipt: SwapPayoutReceipt,
    #[serde(with = "wire::opt_bytes_hex")]
    pub signature: Option<Vec<u8>>,
}

/// Parse a JSON payload, mapping failures to `InvalidPayload`.
pub fn parse<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T, CoreError> {
    serde_json::from_slice(data).map_err(|e| CoreError::InvalidPayload(e.to_string()))
}
