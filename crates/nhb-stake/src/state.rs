//! # Global Reward State
//!
//! The persisted staking reward record: the global index, the timestamp and
//! rate of its last roll, and the annual emission bucket. Lives in the
//! authenticated store under the `stake-reward-state` label.

use crate::index::integrate_index;
use nhb_state::codec::{CodecError, Cursor, Writer};
use nhb_state::keys::{label_key, STAKE_REWARD_STATE_LABEL};
use nhb_state::StateAccess;
use nhb_types::Hash;
use primitive_types::U256;

const REWARD_STATE_VERSION: u8 = 1;

/// Global staking reward state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewardState {
    /// Global reward index at `2^128` scale.
    pub index: U256,
    /// Timestamp of the last index roll.
    pub last_update_ts: u64,
    /// APR (basis points) in effect since `last_update_ts`.
    pub apr_bps: u64,
    /// ZNHB minted so far in `emission_year`.
    pub emission_ytd: U256,
    /// UTC year the `emission_ytd` bucket belongs to.
    pub emission_year: i32,
}

impl RewardState {
    /// Trie key of the reward state record.
    pub fn key() -> Hash {
        label_key(STAKE_REWARD_STATE_LABEL)
    }

    /// Roll the index forward to `now`, then apply `apr_bps`.
    ///
    /// An APR change integrates the old rate up to the change timestamp
    /// first, so historical accrual is never re-rated. The default state
    /// carries a zero rate, so the first roll only advances the clock.
    pub fn update_global_index(&mut self, now: u64, apr_bps: u64) {
        if now > self.last_update_ts {
            let elapsed = now - self.last_update_ts;
            self.index = self.index + integrate_index(self.apr_bps, elapsed);
            self.last_update_ts = now;
        }
        self.apr_bps = apr_bps;
    }

    /// Reset the emission bucket when the UTC year changes.
    pub fn roll_emission_year(&mut self, year: i32) {
        if year != self.emission_year {
            self.emission_year = year;
            self.emission_ytd = U256::zero();
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(REWARD_STATE_VERSION)
            .u256(&self.index)
            .u64(self.last_update_ts)
            .u64(self.apr_bps)
            .u256(&self.emission_ytd)
            .u64(self.emission_year as u64);
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if version != REWARD_STATE_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        Ok(Self {
            index: c.u256()?,
            last_update_ts: c.u64()?,
            apr_bps: c.u64()?,
            emission_ytd: c.u256()?,
            emission_year: c.u64()? as i32,
        })
    }

    /// Load from the store, defaulting when absent.
    pub fn load<S: StateAccess>(state: &S) -> Result<Self, CodecError> {
        match state.get_record(&Self::key()) {
            None => Ok(Self::default()),
            Some(bytes) => Self::decode(&bytes),
        }
    }

    /// Persist to the store.
    pub fn save<S: StateAccess>(&self, state: &mut S) {
        state.put_record(Self::key(), self.encode());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nhb_types::{index_unit, SECONDS_PER_YEAR};

    #[test]
    fn roundtrip() {
        let state = RewardState {
            index: index_unit() * 3 / 2,
            last_update_ts: 1_700_000_000,
            apr_bps: 1_200,
            emission_ytd: U256::from(5_000u64),
            emission_year: 2024,
        };
        assert_eq!(RewardState::decode(&state.encode()).unwrap(), state);
    }

    #[test]
    fn first_update_only_seeds_clock() {
        // The default state has a zero rate, so the first roll accrues
        // nothing regardless of how far the clock jumps.
        let mut state = RewardState::default();
        state.update_global_index(1_700_000_000, 1_200);
        assert!(state.index.is_zero());
        assert_eq!(state.last_update_ts, 1_700_000_000);
        assert_eq!(state.apr_bps, 1_200);
    }

    #[test]
    fn apr_change_rolls_index_first() {
        let mut state = RewardState::default();
        state.update_global_index(1_000, 1_200);

        // Half a year at 12%, then the rate doubles.
        state.update_global_index(1_000 + SECONDS_PER_YEAR / 2, 2_400);
        let after_roll = state.index;
        assert_eq!(after_roll, index_unit() * 6 / 100);
        assert_eq!(state.apr_bps, 2_400);

        // Another half year accrues at the new rate.
        state.update_global_index(1_000 + SECONDS_PER_YEAR, 2_400);
        assert_eq!(state.index - after_roll, index_unit() * 12 / 100);
    }

    #[test]
    fn emission_year_rollover_clears_bucket() {
        let mut state = RewardState {
            emission_ytd: U256::from(77u64),
            emission_year: 2023,
            ..Default::default()
        };
        state.roll_emission_year(2023);
        assert_eq!(state.emission_ytd, U256::from(77u64));
        state.roll_emission_year(2024);
        assert!(state.emission_ytd.is_zero());
    }
}
