//! # Mint Vouchers & Swap Payout Receipts
//!
//! Off-chain-signed authorizations settled on-chain by module-attested
//! transactions. The digest is the Keccak-256 of the canonical JSON form:
//! trimmed whitespace, uppercased token symbol, amount re-serialized as a
//! decimal big-int, declaration-ordered fields.

use crate::errors::VoucherError;
use crate::wire;
use nhb_crypto::{keccak256, recover_address, RecoverableSig};
use nhb_types::{Address, Hash, Token, CHAIN_ID};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// An authority-signed mint authorization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintVoucher {
    /// Unique invoice identifier; enforced single-use on-chain.
    pub invoice_id: String,
    /// Recipient of the minted funds.
    #[serde(with = "wire::opt_array_hex")]
    pub recipient: Option<Address>,
    /// Token symbol, canonically uppercase.
    pub token: String,
    /// Amount as a decimal string.
    #[serde(with = "wire::u256_dec")]
    pub amount: U256,
    /// Chain binding.
    pub chain_id: u64,
    /// Unix expiry in seconds.
    pub expiry: u64,
}

impl MintVoucher {
    /// Normalize to the canonical form: trimmed invoice id, uppercase
    /// token. Amount and recipient are already canonical by type.
    pub fn canonicalize(mut self) -> Result<Self, VoucherError> {
        self.invoice_id = self.invoice_id.trim().to_string();
        let token = Token::parse(&self.token).ok_or(VoucherError::InvalidToken)?;
        self.token = token.symbol().to_string();
        Ok(self)
    }

    /// Parsed token denomination.
    pub fn token(&self) -> Result<Token, VoucherError> {
        Token::parse(&self.token).ok_or(VoucherError::InvalidToken)
    }

    /// Canonical JSON bytes (the digest preimage).
    pub fn canonical_json(&self) -> Result<Vec<u8>, VoucherError> {
        serde_json::to_vec(self).map_err(|_| VoucherError::InvalidAmount)
    }

    /// Keccak-256 digest of the canonical JSON.
    pub fn digest(&self) -> Result<Hash, VoucherError> {
        Ok(keccak256(&self.canonical_json()?))
    }

    /// Structural checks that need no state: chain binding and expiry.
    pub fn validate(&self, now: u64) -> Result<(), VoucherError> {
        if self.chain_id != CHAIN_ID {
            return Err(VoucherError::InvalidChainId(self.chain_id));
        }
        if now > self.expiry {
            return Err(VoucherError::Expired);
        }
        if self.invoice_id.is_empty() {
            return Err(VoucherError::InvalidAmount);
        }
        Ok(())
    }

    /// Verify the authority signature over the canonical digest.
    pub fn verify_signer(
        &self,
        signature: &RecoverableSig,
        authority: &Address,
    ) -> Result<(), VoucherError> {
        let digest = self.digest()?;
        let recovered =
            recover_address(&digest, signature).map_err(|_| VoucherError::InvalidSigner)?;
        if recovered != *authority {
            return Err(VoucherError::InvalidSigner);
        }
        Ok(())
    }
}

/// An authority-signed swap payout receipt.
///
/// Same canonical-form rules as the mint voucher; settled by the
/// `swap_payout_receipt` transaction type with its own single-use id space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapPayoutReceipt {
    /// Unique receipt identifier.
    pub receipt_id: String,
    #[serde(with = "wire::opt_array_hex")]
    pub recipient: Option<Address>,
    pub token: String,
    #[serde(with = "wire::u256_dec")]
    pub amount: U256,
    pub chain_id: u64,
    pub expiry: u64,
}

impl SwapPayoutReceipt {
    pub fn canonicalize(mut self) -> Result<Self, VoucherError> {
        self.receipt_id = self.receipt_id.trim().to_string();
        let token = Token::parse(&self.token).ok_or(VoucherError::InvalidToken)?;
        self.token = token.symbol().to_string();
        Ok(self)
    }

    pub fn token(&self) -> Result<Token, VoucherError> {
        Token::parse(&self.token).ok_or(VoucherError::InvalidToken)
    }

    pub fn digest(&self) -> Result<Hash, VoucherError> {
        let bytes = serde_json::to_vec(self).map_err(|_| VoucherError::InvalidAmount)?;
        Ok(keccak256(&bytes))
    }

    pub fn validate(&self, now: u64) -> Result<(), VoucherError> {
        if self.chain_id != CHAIN_ID {
            return Err(VoucherError::InvalidChainId(self.chain_id));
        }
        if now > self.expiry {
            return Err(VoucherError::Expired);
        }
        if self.receipt_id.is_empty() {
            return Err(VoucherError::InvalidAmount);
        }
        Ok(())
    }

    pub fn verify_signer(
        &self,
        signature: &RecoverableSig,
        authority: &Address,
    ) -> Result<(), VoucherError> {
        let digest = self.digest()?;
        let recovered =
            recover_address(&digest, signature).map_err(|_| VoucherError::InvalidSigner)?;
        if recovered != *authority {
            return Err(VoucherError::InvalidSigner);
        }
        Ok(())
    }
}
