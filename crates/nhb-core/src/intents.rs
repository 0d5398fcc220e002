//! # Intent Registry
//!
//! Off-chain payment intents are enforced single-use on-chain. Consuming a
//! reference records `{expiry, consumed, tx_hash}`; a second consumption or
//! an expired reference is rejected before the handler runs.

use crate::errors::CoreError;
use nhb_state::codec::{CodecError, Cursor, Writer};
use nhb_state::keys::record_key;
use nhb_state::{StateAccess, StateError};
use nhb_types::events::names;
use nhb_types::{hash_hex, Event, Hash};

const INTENT_VERSION: u8 = 1;

/// Default and maximum intent lifetime: 24 hours.
pub const INTENT_TTL_SECS: u64 = 24 * 3_600;

/// A consumed (or registered) intent reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentRecord {
    pub expiry: u64,
    pub consumed: bool,
    pub tx_hash: Hash,
}

impl IntentRecord {
    pub fn key(intent_ref: &[u8]) -> Hash {
        record_key("intent:", &[intent_ref])
    }

    fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(INTENT_VERSION)
            .u64(self.expiry)
            .bool(self.consumed)
            .hash(&self.tx_hash);
        w.finish()
    }

    fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if version != INTENT_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        Ok(Self {
            expiry: c.u64()?,
            consumed: c.bool()?,
            tx_hash: c.hash()?,
        })
    }
}

/// Intent registry over the state backend.
pub struct IntentRegistry;

impl IntentRegistry {
    /// Consume an intent reference for `tx_hash`.
    ///
    /// The declared expiry is capped to `now + 24h` on acceptance; an
    /// absent declaration defaults to the full TTL. Replay and expiry are
    /// rejected with typed errors and no writes.
    pub fn consume<S: StateAccess>(
        state: &mut S,
        intent_ref: &[u8],
        declared_expiry: Option<u64>,
        tx_hash: Hash,
        now: u64,
    ) -> Result<(), CoreError> {
        let key = IntentRecord::key(intent_ref);
        if let Some(bytes) = state.get_record(&key) {
            let existing = IntentRecord::decode(&bytes).map_err(StateError::from)?;
            if existing.consumed {
                return Err(CoreError::IntentConsumed);
            }
        }

        let ceiling = now + INTENT_TTL_SECS;
        let expiry = declared_expiry.unwrap_or(ceiling).min(ceiling);
        if now > expiry {
            return Err(CoreError::IntentExpired);
        }

        let record = IntentRecord {
            expiry,
            consumed: true,
            tx_hash,
        };
        state.put_record(key, record.encode());
        state.emit(
            Event::new(names::INTENT_CONSUMED)
                .attr("intent_ref", format!("0x{}", hex::encode(intent_ref)))
                .attr("tx_hash", hash_hex(&tx_hash)),
        );
        Ok(())
    }

    /// Look up an intent reference.
    pub fn get<S: StateAccess>(
        state: &S,
        intent_ref: &[u8],
    ) -> Result<Option<IntentRecord>, CoreError> {
        match state.get_record(&IntentRecord::key(intent_ref)) {
            None => Ok(None),
            Some(bytes) => Ok(Some(IntentRecord::decode(&bytes).map_err(StateError::from)?)),
        }
    }
}
