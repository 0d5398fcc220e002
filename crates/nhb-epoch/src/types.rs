//! # Epoch Records
//!
//! Snapshots and reward settlements persisted to the bounded history
//! records (`epoch-history`, `reward-history`).

use nhb_state::codec::{CodecError, Cursor, Writer};
use nhb_types::Address;
use primitive_types::U256;

const SNAPSHOT_VERSION: u8 = 1;
const SETTLEMENT_VERSION: u8 = 1;

/// One validator's ranking entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightEntry {
    pub address: Address,
    pub stake: U256,
    pub engagement: u64,
    /// `stake_weight * stake + engagement_weight * engagement`.
    pub composite: U256,
}

/// Point-in-time view of one epoch's ranking and selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpochSnapshot {
    pub epoch: u64,
    pub height: u64,
    pub finalized_at: u64,
    pub total_weight: U256,
    /// Sorted by composite descending, ties by ascending address.
    pub weights: Vec<WeightEntry>,
    /// Active set after finalization, in ranking order.
    pub selected: Vec<Address>,
}

/// Per-account payout breakdown across the three lanes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewardPayout {
    pub address: Address,
    pub validators: U256,
    pub stakers: U256,
    pub engagement: U256,
}

impl RewardPayout {
    pub fn total(&self) -> U256 {
        self.validators + self.stakers + self.engagement
    }
}

/// Per-epoch record of planned vs paid amounts per lane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardSettlement {
    pub epoch: u64,
    pub planned_validators: U256,
    pub planned_stakers: U256,
    pub planned_engagement: U256,
    pub paid_validators: U256,
    pub paid_stakers: U256,
    pub paid_engagement: U256,
    /// Address-sorted payout breakdown.
    pub payouts: Vec<RewardPayout>,
}

impl RewardSettlement {
    pub fn paid_total(&self) -> U256 {
        self.paid_validators + self.paid_stakers + self.paid_engagement
    }
}

// =============================================================================
// CODEC
// =============================================================================

impl EpochSnapshot {
    pub fn encode_into(&self, w: &mut Writer) {
        w.u64(self.epoch)
            .u64(self.height)
            .u64(self.finalized_at)
            .u256(&self.total_weight);
        w.u32(self.weights.len() as u32);
        for entry in &self.weights {
            w.address(&entry.address)
                .u256(&entry.stake)
                .u64(entry.engagement)
                .u256(&entry.composite);
        }
        w.u32(self.selected.len() as u32);
        for address in &self.selected {
            w.address(address);
        }
    }

    pub fn decode_from(c: &mut Cursor) -> Result<Self, CodecError> {
        let epoch = c.u64()?;
        let height = c.u64()?;
        let finalized_at = c.u64()?;
        let total_weight = c.u256()?;

        let weight_count = c.u32()? as usize;
        let mut weights = Vec::with_capacity(weight_count);
        for _ in 0..weight_count {
            weights.push(WeightEntry {
                address: c.address()?,
                stake: c.u256()?,
                engagement: c.u64()?,
                composite: c.u256()?,
            });
        }

        let selected_count = c.u32()? as usize;
        let mut selected = Vec::with_capacity(selected_count);
        for _ in 0..selected_count {
            selected.push(c.address()?);
        }

        Ok(Self {
            epoch,
            height,
            finalized_at,
            total_weight,
            weights,
            selected,
        })
    }
}

/// Encode a snapshot history, newest last.
pub fn encode_snapshot_history(history: &[EpochSnapshot]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(SNAPSHOT_VERSION).u32(history.len() as u32);
    for snapshot in history {
        snapshot.encode_into(&mut w);
    }
    w.finish()
}

/// Decode a snapshot history.
pub fn decode_snapshot_history(data: &[u8]) -> Result<Vec<EpochSnapshot>, CodecError> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    if version != SNAPSHOT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let count = c.u32()? as usize;
    let mut history = Vec::with_capacity(count);
    for _ in 0..count {
        history.push(EpochSnapshot::decode_from(&mut c)?);
    }
    Ok(history)
}

impl RewardSettlement {
    pub fn encode_into(&self, w: &mut Writer) {
        w.u64(self.epoch)
            .u256(&self.planned_validators)
            .u256(&self.planned_stakers)
            .u256(&self.planned_engagement)
            .u256(&self.paid_validators)
            .u256(&self.paid_stakers)
            .u256(&self.paid_engagement);
        w.u32(self.payouts.len() as u32);
        for payout in &self.payouts {
            w.address(&payout.address)
                .u256(&payout.validators)
                .u256(&payout.stakers)
                .u256(&payout.engagement);
        }
    }

    pub fn decode_from(c: &mut Cursor) -> Result<Self, CodecError> {
        let epoch = c.u64()?;
        let planned_validators = c.u256()?;
        let planned_stakers = c.u256()?;
        let planned_engagement = c.u256()?;
        let paid_validators = c.u256()?;
        let paid_stakers = c.u256()?;
        let paid_engagement = c.u256()?;

        let payout_count = c.u32()? as usize;
        let mut payouts = Vec::with_capacity(payout_count);
        for _ in 0..payout_count {
            payouts.push(RewardPayout {
                address: c.address()?,
                validators: c.u256()?,
                stakers: c.u256()?,
                engagement: c.u256()?,
            });
        }

        Ok(Self {
            epoch,
            planned_validators,
            planned_stakers,
            planned_engagement,
            paid_validators,
            paid_stakers,
            paid_engagement,
            payouts,
        })
    }
}

/// Encode a settlement history, newest last.
pub fn encode_settlement_history(history: &[RewardSettlement]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(SETTLEMENT_VERSION).u32(history.len() as u32);
    for settlement in history {
        settlement.encode_into(&mut w);
    }
    w.finish()
}

/// Decode a settlement history.
pub fn decode_settlement_history(data: &[u8]) -> Result<Vec<RewardSettlement>, CodecError> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    if version != SETTLEMENT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let count = c.u32()? as usize;
    let mut history = Vec::with_capacity(count);
    for _ in 0..count {
        history.push(RewardSettlement::decode_from(&mut c)?);
    }
    Ok(history)
}
