//! # UTC Bucketing Helpers
//!
//! The paymaster throttles per UTC day, the loyalty engine resets its paid
//! totals per UTC day, and the staking emission cap resets per UTC year.
//! All three derive their bucket keys from the block timestamp with the
//! helpers here so the bucket boundaries are identical on every node.

use chrono::{DateTime, Datelike, Utc};

/// Seconds in a (non-leap-adjusted) year, used by APR integration.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// UTC calendar day of a unix timestamp, formatted `YYYY-MM-DD`.
///
/// Timestamps beyond chrono's representable range clamp to the epoch day;
/// block timestamps are producer-controlled 64-bit seconds and never reach
/// that range in practice.
pub fn utc_day(timestamp: u64) -> String {
    let dt = DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    dt.format("%Y-%m-%d").to_string()
}

/// UTC calendar year of a unix timestamp.
pub fn utc_year(timestamp: u64) -> i32 {
    let dt = DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    dt.year()
}
