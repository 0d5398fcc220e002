//! # Loyalty State Record
//!
//! The persisted loyalty ledger: the pending reward queue for the current
//! block, day-bucketed accrual totals, and the rolling 7-day fee window
//! that feeds the dynamic daily budget.

use nhb_state::codec::{CodecError, Cursor, Writer};
use nhb_state::keys::label_key;
use nhb_state::StateAccess;
use nhb_types::{Address, Hash};
use primitive_types::U256;
use std::collections::BTreeMap;

const LOYALTY_STATE_VERSION: u8 = 1;
const LOYALTY_STATE_LABEL: &str = "loyalty-state";

/// Days tracked in the rolling fee window.
pub const FEE_WINDOW_DAYS: usize = 7;

/// A queued reward awaiting block-close settlement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReward {
    /// Credited account.
    pub recipient: Address,
    /// Amount in ZNHB wei (pre-pro-ration).
    pub amount_znhb: U256,
    /// Program id for program rewards; empty for base rewards.
    pub program: String,
}

/// Persisted loyalty ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoyaltyState {
    /// Rewards queued in the current block, in execution order.
    pub pending: Vec<PendingReward>,
    /// UTC day of the daily buckets.
    pub day: String,
    /// ZNHB paid out of the treasury today.
    pub paid_today: U256,
    /// Per-user accrual today (cap enforcement at queue time).
    pub user_day_totals: BTreeMap<Address, U256>,
    /// Per-program accrual today.
    pub program_day_totals: BTreeMap<String, U256>,
    /// Fee totals per day, oldest first, at most `FEE_WINDOW_DAYS` entries.
    pub fee_days: Vec<(String, U256)>,
}

impl LoyaltyState {
    pub fn key() -> Hash {
        label_key(LOYALTY_STATE_LABEL)
    }

    /// Reset the daily buckets when the UTC day changes. Unpaid pending
    /// demand is per-block and never carries anywhere.
    pub fn roll_day(&mut self, day: &str) {
        if self.day != day {
            self.day = day.to_string();
            self.paid_today = U256::zero();
            self.user_day_totals.clear();
            self.program_day_totals.clear();
        }
    }

    /// Record routed fees into the rolling window.
    pub fn record_fee(&mut self, day: &str, amount: U256) {
        match self.fee_days.last_mut() {
            Some((last_day, total)) if last_day == day => {
                *total = *total + amount;
            }
            _ => {
                self.fee_days.push((day.to_string(), amount));
                let overflow = self.fee_days.len().saturating_sub(FEE_WINDOW_DAYS);
                self.fee_days.drain(..overflow);
            }
        }
    }

    /// Sum of the rolling fee window.
    pub fn rolling_7d_fees(&self) -> U256 {
        self.fee_days
            .iter()
            .fold(U256::zero(), |acc, (_, amount)| acc + *amount)
    }

    /// Total queued demand.
    pub fn demand(&self) -> U256 {
        self.pending
            .iter()
            .fold(U256::zero(), |acc, reward| acc + reward.amount_znhb)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(LOYALTY_STATE_VERSION);

        w.u32(self.pending.len() as u32);
        for reward in &self.pending {
            w.address(&reward.recipient)
                .u256(&reward.amount_znhb)
                .str(&reward.program);
        }

        w.str(&self.day).u256(&self.paid_today);

        w.u32(self.user_day_totals.len() as u32);
        for (address, total) in &self.user_day_totals {
            w.address(address).u256(total);
        }

        w.u32(self.program_day_totals.len() as u32);
        for (program, total) in &self.program_day_totals {
            w.str(program).u256(total);
        }

        w.u32(self.fee_days.len() as u32);
        for (day, total) in &self.fee_days {
            w.str(day).u256(total);
        }

        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if version != LOYALTY_STATE_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let pending_count = c.u32()? as usize;
        let mut pending = Vec::with_capacity(pending_count);
        for _ in 0..pending_count {
            pending.push(PendingReward {
                recipient: c.address()?,
                amount_znhb: c.u256()?,
                program: c.str()?,
            });
        }

        let day = c.str()?;
        let paid_today = c.u256()?;

        let user_count = c.u32()? as usize;
        let mut user_day_totals = BTreeMap::new();
        for _ in 0..user_count {
            let address = c.address()?;
            user_day_totals.insert(address, c.u256()?);
        }

        let program_count = c.u32()? as usize;
        let mut program_day_totals = BTreeMap::new();
        for _ in 0..program_count {
            let program = c.str()?;
            program_day_totals.insert(program, c.u256()?);
        }

        let fee_count = c.u32()? as usize;
        let mut fee_days = Vec::with_capacity(fee_count);
        for _ in 0..fee_count {
            let day = c.str()?;
            fee_days.push((day, c.u256()?));
        }

        Ok(Self {
            pending,
            day,
            paid_today,
            user_day_totals,
            program_day_totals,
            fee_days,
        })
    }

    pub fn load<S: StateAccess>(state: &S) -> Result<Self, CodecError> {
        match state.get_record(&Self::key()) {
            None => Ok(Self::default()),
            Some(bytes) => Self::decode(&bytes),
        }
    }

    pub fn save<S: StateAccess>(&self, state: &mut S) {
        state.put_record(Self::key(), self.encode());
    }
}
