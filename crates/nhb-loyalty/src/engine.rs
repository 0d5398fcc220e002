//! # Loyalty Engine
//!
//! Accrual during transaction execution, settlement at block close.

use crate::errors::LoyaltyError;
use crate::state::{LoyaltyState, PendingReward};
use nhb_state::{StateAccess, StateError};
use nhb_types::events::names;
use nhb_types::{address_hex, utc_day, Address, Event};
use primitive_types::{U256, U512};
use tracing::debug;

/// `10^18`, the fixed-point scale of the emitted pro-rate ratio.
fn ratio_unit() -> U256 {
    U256::from(10u64).pow(U256::from(18u64))
}

/// Loyalty engine configuration.
#[derive(Clone, Debug)]
pub struct LoyaltyConfig {
    /// Treasury account debited at settlement.
    pub treasury: Address,
    /// Base reward rate in basis points of transferred value.
    pub base_reward_bps: u64,
    /// Per-transaction reward cap.
    pub per_tx_cap: U256,
    /// Per-user daily accrual cap.
    pub per_user_daily_cap: U256,
    /// Per-program daily accrual cap.
    pub program_daily_cap: U256,
    /// Whether settlement scales payouts to the daily budget.
    pub pro_rate_enabled: bool,
    /// Daily budget as basis points of the rolling 7-day fee total.
    pub daily_cap_pct_of_7d_fees_bps: u64,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            treasury: [0u8; 20],
            base_reward_bps: 50,
            per_tx_cap: U256::from(1_000_000_000u64),
            per_user_daily_cap: U256::from(10_000_000_000u64),
            program_daily_cap: U256::from(100_000_000_000u64),
            pro_rate_enabled: true,
            daily_cap_pct_of_7d_fees_bps: 500,
        }
    }
}

/// Loyalty reward engine.
pub struct LoyaltyEngine {
    config: LoyaltyConfig,
}

impl LoyaltyEngine {
    pub fn new(config: LoyaltyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoyaltyConfig {
        &self.config
    }

    // =========================================================================
    // ACCRUAL (caps enforced at queue time)
    // =========================================================================

    /// Queue the sender-credited base reward for a transfer of `value`.
    /// Returns the queued amount after caps (zero when fully capped).
    pub fn accrue_base<S: StateAccess>(
        &self,
        state: &mut S,
        sender: &Address,
        value: U256,
        now: u64,
    ) -> Result<U256, LoyaltyError> {
        if self.config.base_reward_bps == 0 || value.is_zero() {
            return Ok(U256::zero());
        }
        let reward = value * U256::from(self.config.base_reward_bps) / U256::from(10_000u64);
        let queued = self.queue(state, sender, reward, "", now)?;
        if !queued.is_zero() {
            state.emit(
                Event::new(names::LOYALTY_BASE_ACCRUED)
                    .attr("account", address_hex(sender))
                    .attr("amount", queued.to_string()),
            );
        }
        Ok(queued)
    }

    /// Queue a merchant program reward.
    pub fn accrue_program<S: StateAccess>(
        &self,
        state: &mut S,
        program: &str,
        recipient: &Address,
        amount: U256,
        now: u64,
    ) -> Result<U256, LoyaltyError> {
        let mut loyalty = LoyaltyState::load(state).map_err(StateError::from)?;
        loyalty.roll_day(&utc_day(now));

        // Program daily cap clamps before the shared user/tx caps.
        let program_used = loyalty
            .program_day_totals
            .get(program)
            .copied()
            .unwrap_or_default();
        let program_headroom = self.config.program_daily_cap.saturating_sub(program_used);
        let amount = amount.min(program_headroom);
        loyalty.save(state);
        if amount.is_zero() {
            return Ok(U256::zero());
        }

        let queued = self.queue(state, recipient, amount, program, now)?;
        if !queued.is_zero() {
            let mut loyalty = LoyaltyState::load(state).map_err(StateError::from)?;
            let entry = loyalty
                .program_day_totals
                .entry(program.to_string())
                .or_default();
            *entry = *entry + queued;
            loyalty.save(state);

            state.emit(
                Event::new(names::LOYALTY_PROGRAM_ACCRUED)
                    .attr("program", program.to_string())
                    .attr("account", address_hex(recipient))
                    .attr("amount", queued.to_string()),
            );
        }
        Ok(queued)
    }

    /// Feed the rolling 7-day fee window (called by fee routing).
    pub fn record_fee<S: StateAccess>(
        &self,
        state: &mut S,
        amount: U256,
        now: u64,
    ) -> Result<(), LoyaltyError> {
        let mut loyalty = LoyaltyState::load(state).map_err(StateError::from)?;
        loyalty.record_fee(&utc_day(now), amount);
        loyalty.save(state);
        Ok(())
    }

    fn queue<S: StateAccess>(
        &self,
        state: &mut S,
        recipient: &Address,
        amount: U256,
        program: &str,
        now: u64,
    ) -> Result<U256, LoyaltyError> {
        let mut loyalty = LoyaltyState::load(state).map_err(StateError::from)?;
        loyalty.roll_day(&utc_day(now));

        let capped = amount.min(self.config.per_tx_cap);
        let used_today = loyalty
            .user_day_totals
            .get(recipient)
            .copied()
            .unwrap_or_default();
        let user_headroom = self.config.per_user_daily_cap.saturating_sub(used_today);
        let queued = capped.min(user_headroom);
        if queued.is_zero() {
            loyalty.save(state);
            return Ok(U256::zero());
        }

        loyalty.pending.push(PendingReward {
            recipient: *recipient,
            amount_znhb: queued,
            program: program.to_string(),
        });
        let entry = loyalty.user_day_totals.entry(*recipient).or_default();
        *entry = *entry + queued;
        loyalty.save(state);

        state.emit(
            Event::new(names::LOYALTY_REWARD_PROPOSED)
                .attr("account", address_hex(recipient))
                .attr("amount", queued.to_string()),
        );
        Ok(queued)
    }

    // =========================================================================
    // SETTLEMENT
    // =========================================================================

    /// Settle the pending queue at block close. Returns the total paid.
    pub fn end_block_rewards<S: StateAccess>(
        &self,
        state: &mut S,
        now: u64,
    ) -> Result<U256, LoyaltyError> {
        let mut loyalty = LoyaltyState::load(state).map_err(StateError::from)?;
        let day = utc_day(now);
        loyalty.roll_day(&day);

        let demand = loyalty.demand();
        if demand.is_zero() {
            loyalty.save(state);
            return Ok(U256::zero());
        }

        let treasury_account = state.get_account(&self.config.treasury)?;
        let budget = if self.config.pro_rate_enabled {
            let fee_cap = loyalty.rolling_7d_fees()
                * U256::from(self.config.daily_cap_pct_of_7d_fees_bps)
                / U256::from(10_000u64);
            let treasury_headroom = treasury_account
                .balance_znhb
                .saturating_sub(loyalty.paid_today);
            fee_cap.min(treasury_headroom)
        } else {
            demand
        };
        // The treasury can never go negative regardless of configuration.
        let budget = budget.min(treasury_account.balance_znhb);

        let prorated = budget < demand;
        let payouts: Vec<(Address, U256)> = if prorated {
            let ratio_fp = mul_div(budget, ratio_unit(), demand);
            // Exactly one pro-rate event per block. With pro-ration
            // disabled the only way here is an underfunded treasury, which
            // scales silently.
            if self.config.pro_rate_enabled {
                state.emit(
                    Event::new(names::LOYALTY_BUDGET_PRORATED)
                        .attr("ratio_fp", ratio_fp.to_string())
                        .attr("budget_zn", budget.to_string())
                        .attr("demand_zn", demand.to_string())
                        .attr("day", day.clone()),
                );
            }
            debug!(%budget, %demand, "loyalty payouts prorated");
            loyalty
                .pending
                .iter()
                .map(|reward| {
                    (
                        reward.recipient,
                        mul_div(reward.amount_znhb, ratio_fp, ratio_unit()),
                    )
                })
                .collect()
        } else {
            loyalty
                .pending
                .iter()
                .map(|reward| (reward.recipient, reward.amount_znhb))
                .collect()
        };

        let mut paid = U256::zero();
        for (recipient, amount) in payouts {
            if amount.is_zero() {
                continue;
            }
            let mut account = state.get_account(&recipient)?;
            account.balance_znhb = account.balance_znhb + amount;
            state.put_account(&recipient, &account)?;
            paid = paid + amount;
        }

        if !paid.is_zero() {
            let mut treasury = state.get_account(&self.config.treasury)?;
            treasury.balance_znhb = treasury.balance_znhb.saturating_sub(paid);
            state.put_account(&self.config.treasury, &treasury)?;
        }

        loyalty.paid_today = loyalty.paid_today + paid;
        loyalty.pending.clear();
        loyalty.save(state);
        Ok(paid)
    }
}

/// `value · numer / denom`, U512 intermediates, truncated toward zero.
fn mul_div(value: U256, numer: U256, denom: U256) -> U256 {
    if denom.is_zero() {
        return U256::zero();
    }
    let product = U512::from(value) * U512::from(numer);
    U256::try_from(product / U512::from(denom)).unwrap_or_else(|_| U256::MAX)
}
