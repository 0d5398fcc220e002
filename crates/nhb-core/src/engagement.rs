//! # Engagement Accounting
//!
//! Day-bucketed raw counters fold into an EMA score on day rollover.
//! Heartbeats are per-device monotonic with a minimum interval; credited
//! minutes are clamped per heartbeat.

use nhb_state::codec::{CodecError, Cursor, Writer};
use nhb_state::keys::record_key;
use nhb_state::{EngagementMeta, StateAccess};
use nhb_types::{Address, Hash};

/// EMA smoothing: `score' = (score * KEEP + daily_raw) / (KEEP + 1)`.
const EMA_KEEP: u64 = 3;

/// Raw activity weights folded into the daily score.
const TX_WEIGHT: u64 = 10;
const ESCROW_WEIGHT: u64 = 20;
const GOV_WEIGHT: u64 = 30;

fn daily_raw(meta: &EngagementMeta) -> u64 {
    meta.minutes
        .saturating_add(meta.tx_count.saturating_mul(TX_WEIGHT))
        .saturating_add(meta.escrow_count.saturating_mul(ESCROW_WEIGHT))
        .saturating_add(meta.gov_count.saturating_mul(GOV_WEIGHT))
}

/// Roll the day bucket: fold yesterday's raw activity into the EMA and
/// reset the counters. A bucket that never saw a day keeps a zero score.
pub fn touch_day(meta: &mut EngagementMeta, day: &str) {
    if meta.day == day {
        return;
    }
    if !meta.day.is_empty() {
        meta.score = (meta.score.saturating_mul(EMA_KEEP) + daily_raw(meta)) / (EMA_KEEP + 1);
    }
    meta.day = day.to_string();
    meta.minutes = 0;
    meta.tx_count = 0;
    meta.escrow_count = 0;
    meta.gov_count = 0;
}

/// Count a sent transaction for today.
pub fn note_tx(meta: &mut EngagementMeta, day: &str) {
    touch_day(meta, day);
    meta.tx_count += 1;
}

/// Count an escrow interaction for today.
pub fn note_escrow(meta: &mut EngagementMeta, day: &str) {
    touch_day(meta, day);
    meta.escrow_count += 1;
}

/// Credit heartbeat minutes for today.
pub fn note_minutes(meta: &mut EngagementMeta, day: &str, minutes: u64, timestamp: u64) {
    touch_day(meta, day);
    meta.minutes += minutes;
    meta.last_heartbeat = timestamp;
}

/// Per-device last-heartbeat record.
pub struct DeviceClock;

impl DeviceClock {
    pub fn key(account: &Address, device: &str) -> Hash {
        record_key("heartbeat:", &[account, device.as_bytes()])
    }

    pub fn load<S: StateAccess>(
        state: &S,
        account: &Address,
        device: &str,
    ) -> Result<u64, CodecError> {
        match state.get_record(&Self::key(account, device)) {
            None => Ok(0),
            Some(bytes) => Cursor::new(&bytes).u64(),
        }
    }

    pub fn save<S: StateAccess>(state: &mut S, account: &Address, device: &str, timestamp: u64) {
        let mut w = Writer::new();
        w.u64(timestamp);
        state.put_record(Self::key(account, device), w.finish());
    }
}
