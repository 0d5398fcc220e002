//! # Canonical Record Codec
//!
//! Length-prefixed binary encoding for every record stored in the
//! authenticated store. Record bytes feed the Merkle root, so the encoding
//! must be canonical: fixed field order, fixed-width integers (little-endian
//! lengths, big-endian U256), no optional framing.
//!
//! ## Record Versions
//!
//! - Account state record: version `2`
//! - Account metadata record: version `1`
//! - Legacy combined account record: version `1` under the state key;
//!   rewritten as the split encoding on first mutable read

use crate::accounts::{Account, EngagementMeta, Unbond};
use nhb_types::{Address, Hash};
use primitive_types::U256;
use std::collections::BTreeMap;
use thiserror::Error;

/// Version tag of the split account state record.
pub const ACCOUNT_STATE_VERSION: u8 = 2;
/// Version tag of the account metadata record.
pub const ACCOUNT_META_VERSION: u8 = 1;
/// Version tag of the legacy combined account record.
pub const LEGACY_ACCOUNT_VERSION: u8 = 1;

/// Codec errors. Always integrity errors: well-formed commits never produce
/// undecodable records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Record ended before the expected field.
    #[error("codec: truncated record at offset {0}")]
    Truncated(usize),

    /// Unknown record version tag.
    #[error("codec: unsupported record version {0}")]
    UnsupportedVersion(u8),

    /// A string field held invalid UTF-8.
    #[error("codec: invalid utf-8 in string field")]
    InvalidUtf8,
}

// =============================================================================
// WRITER / CURSOR
// =============================================================================

/// Append-only canonical writer.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.buf.push(u8::from(value));
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// U256 as fixed 32-byte big-endian.
    pub fn u256(&mut self, value: &U256) -> &mut Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        self.buf.extend_from_slice(&bytes);
        self
    }

    pub fn address(&mut self, value: &Address) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn hash(&mut self, value: &Hash) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    /// Length-prefixed (u32 LE) byte string.
    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.u32(value.len() as u32);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Forward-only canonical reader.
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.pos + len > self.data.len() {
            return Err(CodecError::Truncated(self.pos));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.u8()? != 0)
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        let bytes = self.take(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(out))
    }

    pub fn u256(&mut self) -> Result<U256, CodecError> {
        Ok(U256::from_big_endian(self.take(32)?))
    }

    pub fn address(&mut self) -> Result<Address, CodecError> {
        let bytes = self.take(20)?;
        let mut out = [0u8; 20];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn hash(&mut self) -> Result<Hash, CodecError> {
        let bytes = self.take(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    pub fn str(&mut self) -> Result<String, CodecError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Whether every byte has been consumed.
    pub fn exhausted(&self) -> bool {
        self.pos == self.data.len()
    }
}

// =============================================================================
// ACCOUNT RECORDS
// =============================================================================

/// Encode the account state record (balances, nonce, storage/code hashes).
pub fn encode_state_record(account: &Account) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(ACCOUNT_STATE_VERSION)
        .u256(&account.balance_nhb)
        .u256(&account.balance_znhb)
        .u64(account.nonce)
        .hash(&account.storage_root)
        .hash(&account.code_hash);
    w.finish()
}

/// Encode the account metadata record (stake, identity, engagement).
pub fn encode_meta_record(account: &Account) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(ACCOUNT_META_VERSION)
        .u256(&account.stake)
        .u256(&account.locked_znhb)
        .str(&account.username);

    match &account.delegated_validator {
        Some(validator) => {
            w.bool(true).address(validator);
        }
        None => {
            w.bool(false);
        }
    }

    w.u32(account.pending_unbonds.len() as u32);
    for unbond in &account.pending_unbonds {
        w.u64(unbond.id)
            .address(&unbond.validator)
            .u256(&unbond.amount)
            .u64(unbond.release_time);
    }

    w.u64(account.next_unbonding_id)
        .u256(&account.stake_shares)
        .u256(&account.stake_last_index)
        .u64(account.stake_last_payout_ts);

    let e = &account.engagement;
    w.str(&e.day)
        .u64(e.minutes)
        .u64(e.tx_count)
        .u64(e.escrow_count)
        .u64(e.gov_count)
        .u64(e.score)
        .u64(e.last_heartbeat);

    w.finish()
}

/// Decode a version-2 state record into `account`.
pub fn decode_state_record(data: &[u8], account: &mut Account) -> Result<(), CodecError> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    if version != ACCOUNT_STATE_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    account.balance_nhb = c.u256()?;
    account.balance_znhb = c.u256()?;
    account.nonce = c.u64()?;
    account.storage_root = c.hash()?;
    account.code_hash = c.hash()?;
    Ok(())
}

/// Decode a metadata record into `account`.
pub fn decode_meta_record(data: &[u8], account: &mut Account) -> Result<(), CodecError> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    if version != ACCOUNT_META_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    account.stake = c.u256()?;
    account.locked_znhb = c.u256()?;
    account.username = c.str()?;

    account.delegated_validator = if c.bool()? { Some(c.address()?) } else { None };

    let unbond_count = c.u32()? as usize;
    let mut unbonds = Vec::with_capacity(unbond_count);
    for _ in 0..unbond_count {
        unbonds.push(Unbond {
            id: c.u64()?,
            validator: c.address()?,
            amount: c.u256()?,
            release_time: c.u64()?,
        });
    }
    account.pending_unbonds = unbonds;

    account.next_unbonding_id = c.u64()?;
    account.stake_shares = c.u256()?;
    account.stake_last_index = c.u256()?;
    account.stake_last_payout_ts = c.u64()?;

    account.engagement = EngagementMeta {
        day: c.str()?,
        minutes: c.u64()?,
        tx_count: c.u64()?,
        escrow_count: c.u64()?,
        gov_count: c.u64()?,
        score: c.u64()?,
        last_heartbeat: c.u64()?,
    };
    Ok(())
}

/// Decode a legacy combined record (version 1 under the state key).
///
/// The legacy layout predates engagement tracking and reward accrual:
/// balances, nonce, stake, and locked stake in one record.
pub fn decode_legacy_record(data: &[u8]) -> Result<Account, CodecError> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    if version != LEGACY_ACCOUNT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let mut account = Account {
        balance_nhb: c.u256()?,
        balance_znhb: c.u256()?,
        nonce: c.u64()?,
        stake: c.u256()?,
        locked_znhb: c.u256()?,
        ..Default::default()
    };
    account.storage_root = c.hash()?;
    account.code_hash = c.hash()?;
    account.username = c.str()?;
    Ok(account)
}

/// Encode a legacy combined record. Only used by tests and migration
/// fixtures; live writes always use the split encoding.
pub fn encode_legacy_record(account: &Account) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(LEGACY_ACCOUNT_VERSION)
        .u256(&account.balance_nhb)
        .u256(&account.balance_znhb)
        .u64(account.nonce)
        .u256(&account.stake)
        .u256(&account.locked_znhb)
        .hash(&account.storage_root)
        .hash(&account.code_hash)
        .str(&account.username);
    w.finish()
}

// =============================================================================
// INDEX RECORDS
// =============================================================================

/// Encode an address list (validator sets). The caller sorts; the codec
/// preserves order.
pub fn encode_address_list(addresses: &[Address]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(addresses.len() as u32);
    for address in addresses {
        w.address(address);
    }
    w.finish()
}

/// Decode an address list.
pub fn decode_address_list(data: &[u8]) -> Result<Vec<Address>, CodecError> {
    let mut c = Cursor::new(data);
    let count = c.u32()? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(c.address()?);
    }
    Ok(out)
}

/// Encode the username index. `BTreeMap` iteration is key-sorted, which
/// makes the record canonical.
pub fn encode_username_index(index: &BTreeMap<String, Address>) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(index.len() as u32);
    for (username, address) in index {
        w.str(username).address(address);
    }
    w.finish()
}

/// Decode the username index.
pub fn decode_username_index(data: &[u8]) -> Result<BTreeMap<String, Address>, CodecError> {
    let mut c = Cursor::new(data);
    let count = c.u32()? as usize;
    let mut index = BTreeMap::new();
    for _ in 0..count {
        let username = c.str()?;
        let address = c.address()?;
        index.insert(username, address);
    }
    Ok(index)
}
