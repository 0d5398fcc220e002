//! # Transaction Envelope
//!
//! Typed transactions with canonical hashing and dual recoverable
//! signatures.
//!
//! ## Canonical Hash
//!
//! The hash preimage is the serde_json serialization of the envelope body
//! (declaration-ordered fields, signatures excluded), digested with
//! SHA-256. Optional fields serialize as `null`, so two envelopes with the
//! same field values always hash identically.

use crate::errors::TxError;
use crate::wire;
use nhb_crypto::{recover_address, sha256, Keypair, RecoverableSig};
use nhb_types::{Address, Hash, CHAIN_ID};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Transaction types routed by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    /// Native NHB transfer.
    TransferNhb,
    /// Native ZNHB transfer.
    TransferZnhb,
    /// Bind a globally unique username to the sender.
    RegisterIdentity,
    /// Delegate ZNHB to a validator.
    Stake,
    /// Undelegate ZNHB into the unbonding queue.
    Unstake,
    /// Claim a matured unbond by id.
    StakeClaim,
    /// Claim accrued staking rewards.
    ClaimRewards,
    /// Per-device engagement heartbeat.
    Heartbeat,
    /// Module-attested mint against a signed voucher.
    Mint,
    /// Module-attested swap payout receipt.
    SwapPayoutReceipt,
    /// Legacy escrow: buyer opens and funds.
    EscrowOpen,
    /// Legacy escrow: seller accepts (InProgress).
    EscrowAccept,
    /// Release escrowed funds to the seller.
    EscrowRelease,
    /// Refund escrowed funds to the buyer.
    EscrowRefund,
    /// Legacy escrow: buyer raises a dispute.
    EscrowDispute,
    /// Legacy escrow: arbitrator resolves a dispute.
    EscrowArbitrate,
    /// Modern escrow: create (Init).
    EscrowCreate,
    /// Modern escrow: buyer funds (Funded).
    EscrowFund,
    /// Modern escrow: expire after the deadline.
    EscrowExpire,
    /// Tie two funded escrows into an atomic trade.
    TradeCreate,
    /// Atomically settle a trade: both legs release or neither.
    TradeSettle,
}

impl TxType {
    /// Module-attested types carry no sender signature; their authority is
    /// the voucher/receipt signature embedded in `data`.
    pub fn requires_sender_signature(&self) -> bool {
        !matches!(self, TxType::Mint | TxType::SwapPayoutReceipt)
    }
}

/// A signed transaction envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub chain_id: u64,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub nonce: u64,
    #[serde(with = "wire::opt_array_hex")]
    pub to: Option<Address>,
    #[serde(with = "wire::u256_dec")]
    pub value: U256,
    #[serde(with = "wire::bytes_hex")]
    pub data: Vec<u8>,
    pub gas_limit: u64,
    #[serde(with = "wire::u256_dec")]
    pub gas_price: U256,
    #[serde(with = "wire::opt_array_hex")]
    pub paymaster: Option<Address>,
    #[serde(with = "wire::opt_bytes_hex")]
    pub intent_ref: Option<Vec<u8>>,
    pub intent_expiry: Option<u64>,
    #[serde(with = "wire::opt_array_hex")]
    pub merchant_address: Option<Address>,
    pub device_id: Option<String>,
    #[serde(with = "wire::opt_array_hex")]
    pub refund_of: Option<Hash>,
    #[serde(with = "wire::opt_sig")]
    pub signature: Option<RecoverableSig>,
    #[serde(with = "wire::opt_sig")]
    pub paymaster_signature: Option<RecoverableSig>,
}

impl Transaction {
    /// A minimal unsigned envelope of the given type.
    pub fn new(tx_type: TxType, nonce: u64) -> Self {
        Self {
            chain_id: CHAIN_ID,
            tx_type,
            nonce,
            to: None,
            value: U256::zero(),
            data: Vec::new(),
            gas_limit: 0,
            gas_price: U256::zero(),
            paymaster: None,
            intent_ref: None,
            intent_expiry: None,
            merchant_address: None,
            device_id: None,
            refund_of: None,
            signature: None,
            paymaster_signature: None,
        }
    }

    /// Canonical transaction hash: SHA-256 of the declaration-ordered JSON
    /// body with signatures excluded.
    pub fn hash(&self) -> Result<Hash, TxError> {
        let body = SigningBody::from(self);
        let bytes = serde_json::to_vec(&body).map_err(|_| TxError::Serialization)?;
        Ok(sha256(&bytes))
    }

    /// Sign as the sender.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), TxError> {
        let digest = self.hash()?;
        self.signature = Some(keypair.sign(&digest));
        Ok(())
    }

    /// Co-sign as the paymaster sponsor.
    pub fn sign_paymaster(&mut self, keypair: &Keypair) -> Result<(), TxError> {
        let digest = self.hash()?;
        self.paymaster_signature = Some(keypair.sign(&digest));
        Ok(())
    }

    /// Recover the sender address from the sender signature.
    ///
    /// Module-attested types have no sender; callers route them before
    /// asking for one.
    pub fn from(&self) -> Result<Address, TxError> {
        let signature = self.signature.as_ref().ok_or(TxError::SignatureMissing)?;
        let digest = self.hash()?;
        recover_address(&digest, signature).map_err(|_| TxError::SignatureInvalid)
    }

    /// Recover and validate the paymaster sponsor.
    ///
    /// Returns `None` when the envelope names no paymaster. When one is
    /// named, the co-signature must be present, valid, and recover to the
    /// named address.
    pub fn paymaster_sponsor(&self) -> Result<Option<Address>, TxError> {
        let Some(declared) = self.paymaster else {
            return Ok(None);
        };
        let signature = self
            .paymaster_signature
            .as_ref()
            .ok_or(TxError::SignatureMissing)?;
        let digest = self.hash()?;
        let recovered =
            recover_address(&digest, signature).map_err(|_| TxError::SignatureInvalid)?;
        if recovered != declared {
            return Err(TxError::SponsorMismatch);
        }
        Ok(Some(declared))
    }
}

/// Hash preimage view: every envelope field except the signatures, in
/// declaration order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigningBody<'a> {
    chain_id: u64,
    #[serde(rename = "type")]
    tx_type: TxType,
    nonce: u64,
    #[serde(with = "wire::opt_array_hex")]
    to: Option<Address>,
    #[serde(with = "wire::u256_dec")]
    value: U256,
    #[serde(with = "wire::bytes_hex")]
    data: Vec<u8>,
    gas_limit: u64,
    #[serde(with = "wire::u256_dec")]
    gas_price: U256,
    #[serde(with = "wire::opt_array_hex")]
    paymaster: Option<Address>,
    #[serde(with = "wire::opt_bytes_hex")]
    intent_ref: Option<Vec<u8>>,
    intent_expiry: Option<u64>,
    #[serde(with = "wire::opt_array_hex")]
    merchant_address: Option<Address>,
    device_id: Option<&'a str>,
    #[serde(with = "wire::opt_array_hex")]
    refund_of: Option<Hash>,
}

impl<'a> From<&'a Transaction> for SigningBody<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self {
            chain_id: tx.chain_id,
            tx_type: tx.tx_type,
            nonce: tx.nonce,
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            gas_limit: tx.gas_limit,
            gas_price: tx.gas_price,
            paymaster: tx.paymaster,
            intent_ref: tx.intent_ref.clone(),
            intent_expiry: tx.intent_expiry,
            merchant_address: tx.merchant_address,
            device_id: tx.device_id.as_deref(),
            refund_of: tx.refund_of,
        }
    }
}
