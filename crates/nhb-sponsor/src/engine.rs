//! # Sponsorship Engine
//!
//! `evaluate_sponsorship` is the gate the dispatcher consults before
//! executing a paymaster-carrying transaction; `record_usage` accumulates
//! the counters and charges the sponsor once the transaction lands.

use crate::counters::SponsorCounter;
use nhb_state::{StateAccess, StateError};
use nhb_tx::{Transaction, TxError};
use nhb_types::events::names;
use nhb_types::{address_hex, utc_day, Address, Event};
use primitive_types::U256;
use tracing::debug;

/// Outcome of a sponsorship evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SponsorshipStatus {
    /// The transaction names no paymaster.
    None,
    /// The paymaster module is disabled.
    ModuleDisabled,
    /// The co-signature is absent.
    SignatureMissing,
    /// The co-signature is malformed or recovers the wrong sponsor.
    SignatureInvalid,
    /// The sponsor cannot cover the gas budget.
    InsufficientBalance,
    /// A throttle tier would be exceeded.
    Throttled,
    /// Sponsorship can proceed.
    Ready,
}

/// Throttle tiers, checked in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleScope {
    Merchant,
    Device,
    Global,
}

impl ThrottleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleScope::Merchant => "merchant",
            ThrottleScope::Device => "device",
            ThrottleScope::Global => "global",
        }
    }
}

/// Full evaluation result handed back to the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SponsorshipAssessment {
    pub status: SponsorshipStatus,
    pub reason: String,
    pub sponsor: Option<Address>,
    pub gas_cost: U256,
    pub gas_price: U256,
    pub throttle: Option<ThrottleScope>,
}

impl SponsorshipAssessment {
    fn simple(status: SponsorshipStatus, reason: &str) -> Self {
        Self {
            status,
            reason: reason.to_string(),
            sponsor: None,
            gas_cost: U256::zero(),
            gas_price: U256::zero(),
            throttle: None,
        }
    }
}

/// Per-tier daily limits.
#[derive(Clone, Debug)]
pub struct TierLimits {
    pub daily_tx_limit: u64,
    pub daily_budget_wei: U256,
}

/// Paymaster configuration.
#[derive(Clone, Debug)]
pub struct SponsorConfig {
    pub enabled: bool,
    pub merchant: TierLimits,
    pub device: TierLimits,
    pub global: TierLimits,
}

impl Default for SponsorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            merchant: TierLimits {
                daily_tx_limit: 1_000,
                daily_budget_wei: U256::from(1_000_000_000u64),
            },
            device: TierLimits {
                daily_tx_limit: 100,
                daily_budget_wei: U256::from(100_000_000u64),
            },
            global: TierLimits {
                daily_tx_limit: 100_000,
                daily_budget_wei: U256::from(100_000_000_000u64),
            },
        }
    }
}

/// Paymaster sponsorship engine.
pub struct SponsorEngine {
    config: SponsorConfig,
}

impl SponsorEngine {
    pub fn new(config: SponsorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SponsorConfig {
        &self.config
    }

    /// Assess a transaction's sponsorship. Emits `paymaster.throttled`
    /// when a tier rejects it.
    pub fn evaluate_sponsorship<S: StateAccess>(
        &self,
        state: &mut S,
        tx: &Transaction,
        now: u64,
    ) -> Result<SponsorshipAssessment, StateError> {
        if tx.paymaster.is_none() {
            return Ok(SponsorshipAssessment::simple(SponsorshipStatus::None, ""));
        }
        if !self.config.enabled {
            return Ok(SponsorshipAssessment::simple(
                SponsorshipStatus::ModuleDisabled,
                "paymaster module disabled",
            ));
        }

        let sponsor = match tx.paymaster_sponsor() {
            Ok(Some(sponsor)) => sponsor,
            // Presence was checked above; treat a disagreeing envelope as
            // unsponsored rather than panicking.
            Ok(None) => {
                return Ok(SponsorshipAssessment::simple(SponsorshipStatus::None, ""));
            }
            Err(TxError::SignatureMissing) => {
                return Ok(SponsorshipAssessment::simple(
                    SponsorshipStatus::SignatureMissing,
                    "paymaster signature missing",
                ));
            }
            Err(_) => {
                return Ok(SponsorshipAssessment::simple(
                    SponsorshipStatus::SignatureInvalid,
                    "paymaster signature invalid",
                ));
            }
        };

        let gas_price = tx.gas_price;
        let gas_cost = gas_price * U256::from(tx.gas_limit);

        let sponsor_account = state.get_account(&sponsor)?;
        if sponsor_account.balance_nhb < gas_cost {
            return Ok(SponsorshipAssessment {
                status: SponsorshipStatus::InsufficientBalance,
                reason: "sponsor balance below gas budget".to_string(),
                sponsor: Some(sponsor),
                gas_cost,
                gas_price,
                throttle: None,
            });
        }

        if let Some(scope) = self.first_exceeded_tier(state, tx, gas_cost, now)? {
            state.emit(
                Event::new(names::PAYMASTER_THROTTLED)
                    .attr("sponsor", address_hex(&sponsor))
                    .attr("scope", scope.as_str()),
            );
            debug!(scope = scope.as_str(), "sponsorship throttled");
            return Ok(SponsorshipAssessment {
                status: SponsorshipStatus::Throttled,
                reason: format!("{} throttle exceeded", scope.as_str()),
                sponsor: Some(sponsor),
                gas_cost,
                gas_price,
                throttle: Some(scope),
            });
        }

        Ok(SponsorshipAssessment {
            status: SponsorshipStatus::Ready,
            reason: String::new(),
            sponsor: Some(sponsor),
            gas_cost,
            gas_price,
            throttle: None,
        })
    }

    /// Accumulate counters and charge the sponsor after a sponsored
    /// transaction executes.
    pub fn record_usage<S: StateAccess>(
        &self,
        state: &mut S,
        tx: &Transaction,
        sponsor: &Address,
        gas_cost: U256,
        now: u64,
    ) -> Result<(), StateError> {
        let day = utc_day(now);
        for (scope, id) in Self::buckets(tx) {
            let key = SponsorCounter::key(&day, scope.as_str(), &id);
            let mut counter = SponsorCounter::load(state, &key)?;
            counter.tx_count += 1;
            counter.budget_wei = counter.budget_wei + gas_cost;
            counter.charged_wei = counter.charged_wei + gas_cost;
            counter.save(state, key);
        }

        let mut account = state.get_account(sponsor)?;
        account.balance_nhb = account.balance_nhb.saturating_sub(gas_cost);
        state.put_account(sponsor, &account)?;
        Ok(())
    }

    /// First tier (merchant → device → global) whose daily counter this
    /// budget would push past its limit.
    fn first_exceeded_tier<S: StateAccess>(
        &self,
        state: &S,
        tx: &Transaction,
        gas_cost: U256,
        now: u64,
    ) -> Result<Option<ThrottleScope>, StateError> {
        let day = utc_day(now);
        for (scope, id) in Self::buckets(tx) {
            let limits = match scope {
                ThrottleScope::Merchant => &self.config.merchant,
                ThrottleScope::Device => &self.config.device,
                ThrottleScope::Global => &self.config.global,
            };
            let key = SponsorCounter::key(&day, scope.as_str(), &id);
            let counter = SponsorCounter::load(state, &key)?;
            if counter.tx_count + 1 > limits.daily_tx_limit
                || counter.budget_wei + gas_cost > limits.daily_budget_wei
            {
                return Ok(Some(scope));
            }
        }
        Ok(None)
    }

    /// The throttle buckets a transaction touches, in check order.
    fn buckets(tx: &Transaction) -> Vec<(ThrottleScope, Vec<u8>)> {
        let mut buckets = Vec::with_capacity(3);
        if let Some(merchant) = tx.merchant_address {
            buckets.push((ThrottleScope::Merchant, merchant.to_vec()));
        }
        if let Some(device) = &tx.device_id {
            buckets.push((ThrottleScope::Device, device.as_bytes().to_vec()));
        }
        buckets.push((ThrottleScope::Global, Vec::new()));
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nhb_crypto::Keypair;
    use nhb_state::StateBackend;
    use nhb_tx::TxType;

    fn sponsored_tx(sponsor: &Keypair, gas_limit: u64, gas_price: u64) -> Transaction {
        let sender = Keypair::from_bytes([0x42; 32]).unwrap();
        let mut tx = Transaction::new(TxType::TransferNhb, 0);
        tx.to = Some([0xBB; 20]);
        tx.value = U256::from(1u64);
        tx.gas_limit = gas_limit;
        tx.gas_price = U256::from(gas_price);
        tx.paymaster = Some(sponsor.address());
        tx.sign(&sender).unwrap();
        tx.sign_paymaster(sponsor).unwrap();
        tx
    }

    fn fund_nhb(state: &mut StateBackend, address: Address, amount: u64) {
        let mut account = state.get_account(&address).unwrap();
        account.balance_nhb = U256::from(amount);
        state.put_account(&address, &account).unwrap();
    }

    fn engine_with_global(limit_tx: u64, budget: u64) -> SponsorEngine {
        SponsorEngine::new(SponsorConfig {
            global: TierLimits {
                daily_tx_limit: limit_tx,
                daily_budget_wei: U256::from(budget),
            },
            ..SponsorConfig::default()
        })
    }

    #[test]
    fn no_paymaster_is_status_none() {
        let mut state = StateBackend::new();
        let tx = Transaction::new(TxType::TransferNhb, 0);
        let assessment = engine_with_global(10, 1_000_000)
            .evaluate_sponsorship(&mut state, &tx, 0)
            .unwrap();
        assert_eq!(assessment.status, SponsorshipStatus::None);
    }

    #[test]
    fn disabled_module_reported() {
        let mut state = StateBackend::new();
        let sponsor = Keypair::from_bytes([0x01; 32]).unwrap();
        let tx = sponsored_tx(&sponsor, 10, 10);
        let engine = SponsorEngine::new(SponsorConfig {
            enabled: false,
            ..SponsorConfig::default()
        });
        let assessment = engine.evaluate_sponsorship(&mut state, &tx, 0).unwrap();
        assert_eq!(assessment.status, SponsorshipStatus::ModuleDisabled);
    }

    #[test]
    fn missing_cosignature_reported() {
        let mut state = StateBackend::new();
        let sponsor = Keypair::from_bytes([0x01; 32]).unwrap();
        let mut tx = sponsored_tx(&sponsor, 10, 10);
        tx.paymaster_signature = None;
        let assessment = engine_with_global(10, 1_000_000)
            .evaluate_sponsorship(&mut state, &tx, 0)
            .unwrap();
        assert_eq!(assessment.status, SponsorshipStatus::SignatureMissing);
    }

    #[test]
    fn wrong_cosigner_reported_invalid() {
        let mut state = StateBackend::new();
        let sponsor = Keypair::from_bytes([0x01; 32]).unwrap();
        let imposter = Keypair::from_bytes([0x02; 32]).unwrap();
        let mut tx = sponsored_tx(&sponsor, 10, 10);
        tx.sign_paymaster(&imposter).unwrap();
        let assessment = engine_with_global(10, 1_000_000)
            .evaluate_sponsorship(&mut state, &tx, 0)
            .unwrap();
        assert_eq!(assessment.status, SponsorshipStatus::SignatureInvalid);
    }

    #[test]
    fn underfunded_sponsor_reported() {
        let mut state = StateBackend::new();
        let sponsor = Keypair::from_bytes([0x01; 32]).unwrap();
        let tx = sponsored_tx(&sponsor, 100, 100);
        fund_nhb(&mut state, sponsor.address(), 9_999);

        let assessment = engine_with_global(10, 1_000_000)
            .evaluate_sponsorship(&mut state, &tx, 0)
            .unwrap();
        assert_eq!(assessment.status, SponsorshipStatus::InsufficientBalance);
        assert_eq!(assessment.gas_cost, U256::from(10_000u64));
    }

    #[test]
    fn global_cap_below_budget_throttles_with_event() {
        let mut state = StateBackend::new();
        let sponsor = Keypair::from_bytes([0x01; 32]).unwrap();
        let tx = sponsored_tx(&sponsor, 100, 100);
        fund_nhb(&mut state, sponsor.address(), 1_000_000);

        let assessment = engine_with_global(10, 9_999)
            .evaluate_sponsorship(&mut state, &tx, 0)
            .unwrap();
        assert_eq!(assessment.status, SponsorshipStatus::Throttled);
        assert_eq!(assessment.throttle, Some(ThrottleScope::Global));
        assert_eq!(
            state
                .events()
                .iter()
                .filter(|e| e.event_type == names::PAYMASTER_THROTTLED)
                .count(),
            1
        );
    }

    #[test]
    fn merchant_tier_checked_before_global() {
        let mut state = StateBackend::new();
        let sponsor = Keypair::from_bytes([0x01; 32]).unwrap();
        let sender = Keypair::from_bytes([0x42; 32]).unwrap();
        let mut tx = Transaction::new(TxType::TransferNhb, 0);
        tx.to = Some([0xBB; 20]);
        tx.gas_limit = 100;
        tx.gas_price = U256::from(100u64);
        tx.merchant_address = Some([0xAD; 20]);
        tx.paymaster = Some(sponsor.address());
        tx.sign(&sender).unwrap();
        tx.sign_paymaster(&sponsor).unwrap();
        fund_nhb(&mut state, sponsor.address(), 1_000_000);

        let engine = SponsorEngine::new(SponsorConfig {
            merchant: TierLimits {
                daily_tx_limit: 0,
                daily_budget_wei: U256::from(u64::MAX),
            },
            ..SponsorConfig::default()
        });
        let assessment = engine.evaluate_sponsorship(&mut state, &tx, 0).unwrap();
        assert_eq!(assessment.throttle, Some(ThrottleScope::Merchant));
    }

    #[test]
    fn usage_accumulates_and_day_rollover_resets() {
        let mut state = StateBackend::new();
        let sponsor = Keypair::from_bytes([0x01; 32]).unwrap();
        let tx = sponsored_tx(&sponsor, 100, 100);
        fund_nhb(&mut state, sponsor.address(), 1_000_000);
        let engine = engine_with_global(1, 1_000_000);

        let assessment = engine.evaluate_sponsorship(&mut state, &tx, 0).unwrap();
        assert_eq!(assessment.status, SponsorshipStatus::Ready);
        engine
            .record_usage(&mut state, &tx, &sponsor.address(), assessment.gas_cost, 0)
            .unwrap();

        // Sponsor was charged.
        assert_eq!(
            state.get_account(&sponsor.address()).unwrap().balance_nhb,
            U256::from(990_000u64)
        );

        // Second transaction the same day exceeds the tx limit.
        let again = engine.evaluate_sponsorship(&mut state, &tx, 0).unwrap();
        assert_eq!(again.status, SponsorshipStatus::Throttled);

        // Next UTC day: counters read fresh.
        let tomorrow = engine
            .evaluate_sponsorship(&mut state, &tx, 86_400)
            .unwrap();
        assert_eq!(tomorrow.status, SponsorshipStatus::Ready);
    }
}
