//! # Fixed-Point Index Math
//!
//! The global reward index accumulates `apr · Δt / (10_000 · year)` at the
//! `2^128` scale. All arithmetic is exact rational (multiply first, divide
//! once, truncate toward zero); intermediate products use U512 so no input
//! in the representable range can overflow.

use nhb_types::{index_unit, SECONDS_PER_YEAR};
use primitive_types::{U256, U512};

/// Basis-point denominator.
pub const BASIS_POINTS: u64 = 10_000;

/// Index growth for `apr_bps` held over `elapsed` seconds, in index units.
pub fn integrate_index(apr_bps: u64, elapsed: u64) -> U256 {
    if apr_bps == 0 || elapsed == 0 {
        return U256::zero();
    }
    let numerator = U512::from(apr_bps) * U512::from(elapsed) * U512::from(index_unit());
    let denominator = U512::from(BASIS_POINTS) * U512::from(SECONDS_PER_YEAR);
    let quotient = numerator / denominator;
    // apr_bps and elapsed are u64-bounded, so the quotient fits in U256.
    U256::try_from(quotient).unwrap_or_else(|_| U256::MAX)
}

/// `value · numer / denom` with U512 intermediates, truncated toward zero.
pub fn mul_div(value: U256, numer: U256, denom: U256) -> U256 {
    if denom.is_zero() {
        return U256::zero();
    }
    let product = U512::from(value) * U512::from(numer);
    let quotient = product / U512::from(denom);
    U256::try_from(quotient).unwrap_or_else(|_| U256::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_inputs_yield_zero() {
        assert!(integrate_index(0, 100).is_zero());
        assert!(integrate_index(1200, 0).is_zero());
    }

    #[test]
    fn one_year_at_full_rate_is_one_unit() {
        // 100% APR over exactly one year accrues exactly one index unit.
        assert_eq!(integrate_index(BASIS_POINTS, SECONDS_PER_YEAR), index_unit());
    }

    #[test]
    fn twelve_percent_over_a_year() {
        let grown = integrate_index(1_200, SECONDS_PER_YEAR);
        assert_eq!(grown, index_unit() * 12 / 100);
    }

    #[test]
    fn integration_is_additive_up_to_truncation() {
        let whole = integrate_index(1_200, 1_000_000);
        let split = integrate_index(1_200, 400_000) + integrate_index(1_200, 600_000);
        // Each division truncates, so the split sum can be at most 2 low.
        assert!(whole >= split);
        assert!(whole - split <= U256::from(2u64));
    }

    #[test]
    fn mul_div_truncates_toward_zero() {
        assert_eq!(
            mul_div(U256::from(10u64), U256::from(1u64), U256::from(3u64)),
            U256::from(3u64)
        );
        assert_eq!(mul_div(U256::from(10u64), U256::from(1u64), U256::zero()), U256::zero());
    }

    #[test]
    fn mul_div_survives_index_scale_products() {
        let value = nhb_types::index_unit(); // 2^128
        let out = mul_div(value, value, value);
        assert_eq!(out, value);
    }
}
