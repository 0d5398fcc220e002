//! # Sponsorship Counters
//!
//! Daily usage counters per `(day, scope, id)` bucket. The day is part of
//! the key, so a new UTC day reads fresh zeroes without an explicit reset.

use nhb_state::codec::{CodecError, Cursor, Writer};
use nhb_state::keys::record_key;
use nhb_state::StateAccess;
use nhb_types::Hash;
use primitive_types::U256;

const COUNTER_VERSION: u8 = 1;

/// One day's sponsorship usage for a throttle bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SponsorCounter {
    /// Sponsored transactions today.
    pub tx_count: u64,
    /// Gas budget reserved today, in wei.
    pub budget_wei: U256,
    /// Gas actually charged today, in wei.
    pub charged_wei: U256,
}

impl SponsorCounter {
    /// Counter key for a `(day, scope tag, id)` bucket.
    pub fn key(day: &str, scope: &str, id: &[u8]) -> Hash {
        record_key("paymaster:", &[day.as_bytes(), scope.as_bytes(), id])
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(COUNTER_VERSION)
            .u64(self.tx_count)
            .u256(&self.budget_wei)
            .u256(&self.charged_wei);
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if version != COUNTER_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        Ok(Self {
            tx_count: c.u64()?,
            budget_wei: c.u256()?,
            charged_wei: c.u256()?,
        })
    }

    pub fn load<S: StateAccess>(state: &S, key: &Hash) -> Result<Self, CodecError> {
        match state.get_record(key) {
            None => Ok(Self::default()),
            Some(bytes) => Self::decode(&bytes),
        }
    }

    pub fn save<S: StateAccess>(&self, state: &mut S, key: Hash) {
        state.put_record(key, self.encode());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let counter = SponsorCounter {
            tx_count: 3,
            budget_wei: U256::from(30_000u64),
            charged_wei: U256::from(29_000u64),
        };
        assert_eq!(SponsorCounter::decode(&counter.encode()).unwrap(), counter);
    }

    #[test]
    fn keys_partition_by_day_scope_and_id() {
        let a = SponsorCounter::key("2024-01-01", "merchant", &[1u8; 20]);
        assert_ne!(a, SponsorCounter::key("2024-01-02", "merchant", &[1u8; 20]));
        assert_ne!(a, SponsorCounter::key("2024-01-01", "device", &[1u8; 20]));
        assert_ne!(a, SponsorCounter::key("2024-01-01", "merchant", &[2u8; 20]));
    }
}
