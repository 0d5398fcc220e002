//! # Quota Gate
//!
//! Per-module, per-sender request and NHB-value counters bucketed by epoch.
//! Each epoch's counters live in one record keyed by the epoch number, with
//! a small meta record listing the epochs present so the lifecycle can
//! prune everything older than the current epoch.

use crate::config::QuotaLimits;
use crate::errors::CoreError;
use nhb_state::codec::{CodecError, Cursor, Writer};
use nhb_state::keys::{label_key, record_key};
use nhb_state::{StateAccess, StateError};
use nhb_types::events::names;
use nhb_types::{address_hex, Address, Event, Hash};
use primitive_types::U256;
use std::collections::BTreeMap;
use tracing::debug;

const QUOTA_EPOCH_VERSION: u8 = 1;
const QUOTA_META_LABEL: &str = "quota-epochs";

/// Usage per `(module, sender)` inside one epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuotaCounter {
    pub requests: u64,
    pub nhb_value: U256,
}

/// One epoch's quota counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuotaEpoch {
    pub counters: BTreeMap<(String, Address), QuotaCounter>,
}

impl QuotaEpoch {
    fn key(epoch: u64) -> Hash {
        record_key("quota:", &[&epoch.to_le_bytes()])
    }

    fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(QUOTA_EPOCH_VERSION).u32(self.counters.len() as u32);
        for ((module, sender), counter) in &self.counters {
            w.str(module)
                .address(sender)
                .u64(counter.requests)
                .u256(&counter.nhb_value);
        }
        w.finish()
    }

    fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if version != QUOTA_EPOCH_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let count = c.u32()? as usize;
        let mut counters = BTreeMap::new();
        for _ in 0..count {
            let module = c.str()?;
            let sender = c.address()?;
            counters.insert(
                (module, sender),
                QuotaCounter {
                    requests: c.u64()?,
                    nhb_value: c.u256()?,
                },
            );
        }
        Ok(Self { counters })
    }
}

/// Quota gate over the state backend.
pub struct QuotaGate;

impl QuotaGate {
    /// Count a request against `(module, epoch, sender)` and fail with a
    /// typed error when a limit would be exceeded. The caller reverts the
    /// increment and re-emits the `QuotaExceeded` event outside the
    /// transaction checkpoint.
    pub fn note<S: StateAccess>(
        state: &mut S,
        limits: &QuotaLimits,
        module: &str,
        epoch: u64,
        sender: &Address,
        nhb_value: U256,
    ) -> Result<(), CoreError> {
        let key = QuotaEpoch::key(epoch);
        let mut bucket = match state.get_record(&key) {
            None => QuotaEpoch::default(),
            Some(bytes) => QuotaEpoch::decode(&bytes).map_err(StateError::from)?,
        };

        let counter = bucket
            .counters
            .entry((module.to_string(), *sender))
            .or_default();
        counter.requests += 1;
        counter.nhb_value = counter.nhb_value + nhb_value;

        if limits.max_requests_per_epoch > 0 && counter.requests > limits.max_requests_per_epoch {
            return Err(CoreError::QuotaExceeded(format!(
                "{module} requests over limit"
            )));
        }
        if !limits.max_nhb_per_epoch.is_zero() && counter.nhb_value > limits.max_nhb_per_epoch {
            return Err(CoreError::QuotaExceeded(format!(
                "{module} nhb value over limit"
            )));
        }

        state.put_record(key, bucket.encode());
        Self::track_epoch(state, epoch)?;
        Ok(())
    }

    /// Emit the `QuotaExceeded` event that accompanies a gate rejection.
    pub fn emit_exceeded<S: StateAccess>(state: &mut S, sender: &Address, reason: &str) {
        state.emit(
            Event::new(names::QUOTA_EXCEEDED)
                .attr("sender", address_hex(sender))
                .attr("reason", reason.to_string()),
        );
    }

    /// Drop every counter bucket with `epoch < current_epoch`.
    pub fn prune<S: StateAccess>(state: &mut S, current_epoch: u64) -> Result<(), CoreError> {
        let meta_key = label_key(QUOTA_META_LABEL);
        let epochs = match state.get_record(&meta_key) {
            None => return Ok(()),
            Some(bytes) => decode_epoch_list(&bytes).map_err(StateError::from)?,
        };

        let (stale, live): (Vec<u64>, Vec<u64>) =
            epochs.into_iter().partition(|e| *e < current_epoch);
        if stale.is_empty() {
            return Ok(());
        }
        for epoch in &stale {
            state.remove_record(&QuotaEpoch::key(*epoch));
        }
        state.put_record(meta_key, encode_epoch_list(&live));
        debug!(pruned = stale.len(), current_epoch, "quota counters pruned");
        Ok(())
    }

    /// Current usage for `(module, epoch, sender)`.
    pub fn usage<S: StateAccess>(
        state: &S,
        module: &str,
        epoch: u64,
        sender: &Address,
    ) -> Result<QuotaCounter, CoreError> {
        let bucket = match state.get_record(&QuotaEpoch::key(epoch)) {
            None => return Ok(QuotaCounter::default()),
            Some(bytes) => QuotaEpoch::decode(&bytes).map_err(StateError::from)?,
        };
        Ok(bucket
            .counters
            .get(&(module.to_string(), *sender))
            .cloned()
            .unwrap_or_default())
    }

    /// Whether any counters exist for `epoch`.
    pub fn has_epoch<S: StateAccess>(state: &S, epoch: u64) -> bool {
        state.get_record(&QuotaEpoch::key(epoch)).is_some()
    }

    fn track_epoch<S: StateAccess>(state: &mut S, epoch: u64) -> Result<(), CoreError> {
        let meta_key = label_key(QUOTA_META_LABEL);
        let mut epochs = match state.get_record(&meta_key) {
            None => Vec::new(),
            Some(bytes) => decode_epoch_list(&bytes).map_err(StateError::from)?,
        };
        if !epochs.contains(&epoch) {
            epochs.push(epoch);
            epochs.sort_unstable();
            state.put_record(meta_key, encode_epoch_list(&epochs));
        }
        Ok(())
    }
}

fn encode_epoch_list(epochs: &[u64]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(epochs.len() as u32);
    for epoch in epochs {
        w.u64(*epoch);
    }
    w.finish()
}

fn decode_epoch_list(data: &[u8]) -> Result<Vec<u64>, CodecError> {
    let mut c = Cursor::new(data);
    let count = c.u32()? as usize;
    let mut epochs = Vec::with_capacity(count);
    for _ in 0..count {
        epochs.push(c.u64()?);
    }
    Ok(epochs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nhb_state::StateBackend;

    const SENDER: Address = [0x01; 20];

    fn limits(requests: u64, nhb: u64) -> QuotaLimits {
        QuotaLimits {
            max_requests_per_epoch: requests,
            max_nhb_per_epoch: U256::from(nhb),
        }
    }

    #[test]
    fn requests_count_and_limit() {
        let mut state = StateBackend::new();
        let l = limits(2, 0);

        QuotaGate::note(&mut state, &l, "transfer", 1, &SENDER, U256::zero()).unwrap();
        QuotaGate::note(&mut state, &l, "transfer", 1, &SENDER, U256::zero()).unwrap();
        let err =
            QuotaGate::note(&mut state, &l, "transfer", 1, &SENDER, U256::zero()).unwrap_err();
        assert!(matches!(err, CoreError::QuotaExceeded(_)));

        let usage = QuotaGate::usage(&state, "transfer", 1, &SENDER).unwrap();
        assert_eq!(usage.requests, 2);
    }

    #[test]
    fn nhb_value_limit() {
        let mut state = StateBackend::new();
        let l = limits(0, 100);

        QuotaGate::note(&mut state, &l, "transfer", 1, &SENDER, U256::from(60u64)).unwrap();
        let err = QuotaGate::note(&mut state, &l, "transfer", 1, &SENDER, U256::from(41u64))
            .unwrap_err();
        assert!(matches!(err, CoreError::QuotaExceeded(_)));
    }

    #[test]
    fn zero_limits_are_unlimited() {
        let mut state = StateBackend::new();
        let l = limits(0, 0);
        for _ in 0..1_000 {
            QuotaGate::note(&mut state, &l, "transfer", 1, &SENDER, U256::from(1u64)).unwrap();
        }
    }

    #[test]
    fn modules_and_epochs_are_isolated() {
        let mut state = StateBackend::new();
        let l = limits(1, 0);

        QuotaGate::note(&mut state, &l, "transfer", 1, &SENDER, U256::zero()).unwrap();
        QuotaGate::note(&mut state, &l, "escrow", 1, &SENDER, U256::zero()).unwrap();
        QuotaGate::note(&mut state, &l, "transfer", 2, &SENDER, U256::zero()).unwrap();
    }

    #[test]
    fn prune_removes_only_stale_epochs() {
        let mut state = StateBackend::new();
        let l = limits(0, 0);

        QuotaGate::note(&mut state, &l, "transfer", 1, &SENDER, U256::zero()).unwrap();
        QuotaGate::note(&mut state, &l, "transfer", 2, &SENDER, U256::zero()).unwrap();
        QuotaGate::note(&mut state, &l, "transfer", 3, &SENDER, U256::zero()).unwrap();

        QuotaGate::prune(&mut state, 3).unwrap();
        assert!(!QuotaGate::has_epoch(&state, 1));
        assert!(!QuotaGate::has_epoch(&state, 2));
        assert!(QuotaGate::has_epoch(&state, 3));

        // Idempotent.
        QuotaGate::prune(&mut state, 3).unwrap();
        assert!(QuotaGate::has_epoch(&state, 3));
    }
}
