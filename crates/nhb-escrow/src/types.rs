//! # Escrow Records
//!
//! Record shapes and codecs. The modern encoding (version 2) covers both
//! lifecycles; version-1 records are the legacy shape and are rewritten as
//! version 2 on first touch.

use nhb_state::codec::{CodecError, Cursor, Writer};
use nhb_state::keys::record_key;
use nhb_types::{Address, Hash, Token};
use primitive_types::U256;

pub const LEGACY_ESCROW_VERSION: u8 = 1;
pub const MODERN_ESCROW_VERSION: u8 = 2;
const TRADE_VERSION: u8 = 1;

/// Which lifecycle governs an escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscrowKind {
    Legacy,
    Modern,
}

/// Escrow lifecycle states across both shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscrowStatus {
    /// Modern: created, not yet funded.
    Init,
    /// Modern: buyer funds held.
    Funded,
    /// Legacy: seller accepted, funds held.
    InProgress,
    /// Terminal: funds paid to the seller.
    Released,
    /// Terminal: funds returned to the buyer.
    Refunded,
    /// Legacy: buyer raised a dispute; awaiting arbitration.
    Disputed,
    /// Terminal (modern): deadline passed, funds returned to the buyer.
    Expired,
}

impl EscrowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EscrowStatus::Released | EscrowStatus::Refunded | EscrowStatus::Expired
        )
    }

    fn to_byte(self) -> u8 {
        match self {
            EscrowStatus::Init => 0,
            EscrowStatus::Funded => 1,
            EscrowStatus::InProgress => 2,
            EscrowStatus::Released => 3,
            EscrowStatus::Refunded => 4,
            EscrowStatus::Disputed => 5,
            EscrowStatus::Expired => 6,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, CodecError> {
        Ok(match byte {
            0 => EscrowStatus::Init,
            1 => EscrowStatus::Funded,
            2 => EscrowStatus::InProgress,
            3 => EscrowStatus::Released,
            4 => EscrowStatus::Refunded,
            5 => EscrowStatus::Disputed,
            6 => EscrowStatus::Expired,
            other => return Err(CodecError::UnsupportedVersion(other)),
        })
    }
}

/// One escrow, either shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscrowRecord {
    pub kind: EscrowKind,
    pub buyer: Address,
    pub seller: Address,
    pub token: Token,
    pub amount: U256,
    pub status: EscrowStatus,
    /// Modern expiry deadline; zero for legacy escrows.
    pub deadline: u64,
    pub created_at: u64,
}

impl EscrowRecord {
    /// Trie key of an escrow record.
    pub fn key(id: &Hash) -> Hash {
        record_key("escrow:", &[id])
    }

    /// Modern (version 2) encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(MODERN_ESCROW_VERSION)
            .u8(match self.kind {
                EscrowKind::Legacy => 0,
                EscrowKind::Modern => 1,
            })
            .address(&self.buyer)
            .address(&self.seller)
            .u8(match self.token {
                Token::NHB => 0,
                Token::ZNHB => 1,
            })
            .u256(&self.amount)
            .u8(self.status.to_byte())
            .u64(self.deadline)
            .u64(self.created_at);
        w.finish()
    }

    /// Decode either encoding; reports whether it was the legacy one so the
    /// caller can stage the rewrite.
    pub fn decode(data: &[u8]) -> Result<(Self, bool), CodecError> {
        let mut c = Cursor::new(data);
        match c.u8()? {
            MODERN_ESCROW_VERSION => {
                let kind = if c.u8()? == 0 {
                    EscrowKind::Legacy
                } else {
                    EscrowKind::Modern
                };
                let buyer = c.address()?;
                let seller = c.address()?;
                let token = if c.u8()? == 0 { Token::NHB } else { Token::ZNHB };
                let amount = c.u256()?;
                let status = EscrowStatus::from_byte(c.u8()?)?;
                let deadline = c.u64()?;
                let created_at = c.u64()?;
                Ok((
                    Self {
                        kind,
                        buyer,
                        seller,
                        token,
                        amount,
                        status,
                        deadline,
                        created_at,
                    },
                    false,
                ))
            }
            LEGACY_ESCROW_VERSION => {
                // Old layout: buyer, seller, NHB amount, status, created_at.
                let buyer = c.address()?;
                let seller = c.address()?;
                let amount = c.u256()?;
                let status = EscrowStatus::from_byte(c.u8()?)?;
                let created_at = c.u64()?;
                Ok((
                    Self {
                        kind: EscrowKind::Legacy,
                        buyer,
                        seller,
                        token: Token::NHB,
                        amount,
                        status,
                        deadline: 0,
                        created_at,
                    },
                    true,
                ))
            }
            other => Err(CodecError::UnsupportedVersion(other)),
        }
    }

    /// Legacy (version 1) encoding; migration fixtures and tests only.
    pub fn encode_legacy(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(LEGACY_ESCROW_VERSION)
            .address(&self.buyer)
            .address(&self.seller)
            .u256(&self.amount)
            .u8(self.status.to_byte())
            .u64(self.created_at);
        w.finish()
    }
}

/// A trade tying two funded escrows into one atomic settlement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeRecord {
    pub leg_a: Hash,
    pub leg_b: Hash,
    pub settled: bool,
}

impl TradeRecord {
    /// Trie key of a trade record.
    pub fn key(id: &Hash) -> Hash {
        record_key("trade:", &[id])
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(TRADE_VERSION)
            .hash(&self.leg_a)
            .hash(&self.leg_b)
            .bool(self.settled);
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if version != TRADE_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        Ok(Self {
            leg_a: c.hash()?,
            leg_b: c.hash()?,
            settled: c.bool()?,
        })
    }
}
