//! # Staking Engine
//!
//! Delegation, unbonding, and reward claims over the `StateAccess` port.
//! The engine owns no state of its own: every operation loads accounts and
//! the global reward record, computes on locally owned values, and persists
//! explicit writes.

use crate::errors::StakeError;
use crate::index::mul_div;
use crate::state::RewardState;
use nhb_state::codec::{decode_address_list, encode_address_list};
use nhb_state::keys::{label_key, VALIDATOR_ELIGIBLE_SET_LABEL, VALIDATOR_SET_LABEL};
use nhb_state::{StateAccess, StateError};
use nhb_types::events::names;
use nhb_types::{address_hex, index_unit, utc_year, Address, Event, SECONDS_PER_YEAR};
use primitive_types::U256;
use tracing::debug;

/// Staking engine configuration.
#[derive(Clone, Debug)]
pub struct StakeConfig {
    /// Current APR in basis points.
    pub apr_bps: u64,
    /// Reward payout granularity; claims mint only whole elapsed periods.
    pub payout_period_secs: u64,
    /// Delay between undelegation and claimability.
    pub unbonding_period_secs: u64,
    /// Maximum ZNHB minted per UTC calendar year.
    pub emission_cap_year: U256,
    /// Stake threshold for validator eligibility.
    pub minimum_stake: U256,
    /// Whether epoch rotation owns the active validator set. When false the
    /// active set mirrors eligibility on every stake change.
    pub rotation_enabled: bool,
}

impl Default for StakeConfig {
    fn default() -> Self {
        Self {
            apr_bps: 1_200,
            payout_period_secs: SECONDS_PER_YEAR / 12,
            unbonding_period_secs: 72 * 3_600,
            emission_cap_year: U256::from(u64::MAX),
            minimum_stake: U256::from(nhb_types::MINIMUM_STAKE),
            rotation_enabled: false,
        }
    }
}

/// Staking and reward engine.
pub struct StakeEngine {
    config: StakeConfig,
}

impl StakeEngine {
    pub fn new(config: StakeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StakeConfig {
        &self.config
    }

    // =========================================================================
    // DELEGATION
    // =========================================================================

    /// Move spendable ZNHB into locked stake credited to `validator`.
    pub fn delegate<S: StateAccess>(
        &self,
        state: &mut S,
        delegator: &Address,
        validator: &Address,
        amount: U256,
        now: u64,
    ) -> Result<(), StakeError> {
        if amount.is_zero() {
            return Err(StakeError::NonPositiveAmount);
        }

        let mut reward = RewardState::load(state).map_err(StateError::from)?;
        reward.update_global_index(now, self.config.apr_bps);

        let mut account = state.get_account(delegator)?;
        if account.balance_znhb < amount {
            return Err(StakeError::InsufficientBalance);
        }
        if !account.locked_znhb.is_zero() && account.delegated_validator != Some(*validator) {
            return Err(StakeError::ValidatorSwitchBlocked);
        }

        account.balance_znhb = account.balance_znhb - amount;
        account.locked_znhb = account.locked_znhb + amount;
        account.delegated_validator = Some(*validator);

        if account.stake_shares.is_zero() {
            // First delegation: one share per locked wei, index snapshot at
            // the current global value, payout clock starts now.
            account.stake_shares = account.locked_znhb;
            account.stake_last_index = reward.index;
            account.stake_last_payout_ts = now;
        } else {
            account.stake_shares = account.stake_shares + amount;
        }

        let validator_stake = if validator == delegator {
            account.stake = account.stake + amount;
            let stake = account.stake;
            state.put_account(delegator, &account)?;
            stake
        } else {
            state.put_account(delegator, &account)?;
            let mut validator_account = state.get_account(validator)?;
            validator_account.stake = validator_account.stake + amount;
            let stake = validator_account.stake;
            state.put_account(validator, &validator_account)?;
            stake
        };

        self.update_eligibility(state, validator, validator_stake)?;
        reward.save(state);

        state.emit(
            Event::new(names::STAKE_DELEGATED)
                .attr("delegator", address_hex(delegator))
                .attr("validator", address_hex(validator))
                .attr("amount", amount.to_string()),
        );
        Ok(())
    }

    /// Move locked stake into the unbonding queue; validator stake drops
    /// immediately. Returns the new unbond id.
    pub fn undelegate<S: StateAccess>(
        &self,
        state: &mut S,
        delegator: &Address,
        amount: U256,
        now: u64,
    ) -> Result<u64, StakeError> {
        if amount.is_zero() {
            return Err(StakeError::NonPositiveAmount);
        }

        let mut account = state.get_account(delegator)?;
        if account.locked_znhb.is_zero() {
            return Err(StakeError::NoActiveDelegation);
        }
        let validator = account
            .delegated_validator
            .ok_or(StakeError::NoActiveDelegation)?;
        if amount > account.locked_znhb {
            return Err(StakeError::ExceedsLocked);
        }

        account.locked_znhb = account.locked_znhb - amount;
        account.stake_shares = account.stake_shares.saturating_sub(amount);
        let release_time = now + self.config.unbonding_period_secs;
        let unbond_id = account.push_unbond(validator, amount, release_time);
        account.clear_delegation_if_unlocked();

        let validator_stake = if validator == *delegator {
            account.stake = account.stake.saturating_sub(amount);
            let stake = account.stake;
            state.put_account(delegator, &account)?;
            stake
        } else {
            state.put_account(delegator, &account)?;
            let mut validator_account = state.get_account(&validator)?;
            validator_account.stake = validator_account.stake.saturating_sub(amount);
            let stake = validator_account.stake;
            state.put_account(&validator, &validator_account)?;
            stake
        };

        self.update_eligibility(state, &validator, validator_stake)?;

        state.emit(
            Event::new(names::STAKE_UNDELEGATED)
                .attr("delegator", address_hex(delegator))
                .attr("validator", address_hex(&validator))
                .attr("amount", amount.to_string())
                .attr("unbond_id", unbond_id.to_string())
                .attr("release_time", release_time.to_string()),
        );
        Ok(unbond_id)
    }

    /// Claim a matured unbond back into the spendable balance.
    pub fn claim_unbond<S: StateAccess>(
        &self,
        state: &mut S,
        delegator: &Address,
        unbond_id: u64,
        now: u64,
    ) -> Result<U256, StakeError> {
        let mut account = state.get_account(delegator)?;
        let unbond = account
            .take_unbond(unbond_id)
            .ok_or(StakeError::UnknownUnbond(unbond_id))?;
        if now < unbond.release_time {
            return Err(StakeError::NotClaimable {
                release_time: unbond.release_time,
            });
        }

        account.balance_znhb = account.balance_znhb + unbond.amount;
        state.put_account(delegator, &account)?;

        state.emit(
            Event::new(names::STAKE_CLAIMED)
                .attr("delegator", address_hex(delegator))
                .attr("amount", unbond.amount.to_string())
                .attr("unbond_id", unbond_id.to_string()),
        );
        Ok(unbond.amount)
    }

    // =========================================================================
    // REWARDS
    // =========================================================================

    /// Mint accrued rewards for whole elapsed payout periods, clamped by
    /// the annual emission cap. Returns the minted amount (possibly zero).
    pub fn claim_rewards<S: StateAccess>(
        &self,
        state: &mut S,
        delegator: &Address,
        now: u64,
    ) -> Result<U256, StakeError> {
        let mut reward = RewardState::load(state).map_err(StateError::from)?;
        reward.update_global_index(now, self.config.apr_bps);

        let mut account = state.get_account(delegator)?;
        if account.stake_shares.is_zero() || now <= account.stake_last_payout_ts {
            reward.save(state);
            return Ok(U256::zero());
        }

        let elapsed = now - account.stake_last_payout_ts;
        let periods = elapsed / self.config.payout_period_secs;
        if periods == 0 {
            reward.save(state);
            return Ok(U256::zero());
        }

        let delta_index = reward.index.saturating_sub(account.stake_last_index);
        let covered = periods * self.config.payout_period_secs;
        let effective_delta = mul_div(delta_index, U256::from(covered), U256::from(elapsed));
        let raw_mint = mul_div(effective_delta, account.stake_shares, index_unit());

        reward.roll_emission_year(utc_year(now));
        let headroom = self
            .config
            .emission_cap_year
            .saturating_sub(reward.emission_ytd);
        let minted = raw_mint.min(headroom);

        if minted < raw_mint {
            state.emit(
                Event::new(names::STAKE_EMISSION_CAP_HIT)
                    .attr("attempted", raw_mint.to_string())
                    .attr("ytd", reward.emission_ytd.to_string())
                    .attr("cap", self.config.emission_cap_year.to_string()),
            );
            debug!(
                attempted = %raw_mint,
                ytd = %reward.emission_ytd,
                "emission cap clamped reward mint"
            );
        }

        // Advance the account index only for what was actually paid, so the
        // clamped remainder stays claimable once the cap resets.
        let clamped_delta = if minted == raw_mint || raw_mint.is_zero() {
            effective_delta
        } else {
            mul_div(effective_delta, minted, raw_mint)
        };
        account.stake_last_index = account.stake_last_index + clamped_delta;
        account.stake_last_payout_ts = now;
        account.balance_znhb = account.balance_znhb + minted;
        reward.emission_ytd = reward.emission_ytd + minted;

        state.put_account(delegator, &account)?;
        reward.save(state);

        state.emit(
            Event::new(names::STAKE_REWARDS_CLAIMED)
                .attr("delegator", address_hex(delegator))
                .attr("amount", minted.to_string())
                .attr("periods", periods.to_string()),
        );
        Ok(minted)
    }

    /// Per-block accrual: roll the global index to the block time.
    pub fn accrue<S: StateAccess>(&self, state: &mut S, now: u64) -> Result<(), StakeError> {
        let mut reward = RewardState::load(state).map_err(StateError::from)?;
        reward.update_global_index(now, self.config.apr_bps);
        reward.save(state);
        Ok(())
    }

    /// Reserve emission-cap headroom for a module-attested ZNHB mint.
    ///
    /// Unlike reward claims, voucher mints are all-or-nothing.
    pub fn reserve_emission<S: StateAccess>(
        &self,
        state: &mut S,
        amount: U256,
        now: u64,
    ) -> Result<(), StakeError> {
        let mut reward = RewardState::load(state).map_err(StateError::from)?;
        reward.roll_emission_year(utc_year(now));
        if reward.emission_ytd + amount > self.config.emission_cap_year {
            return Err(StakeError::EmissionCapExceeded);
        }
        reward.emission_ytd = reward.emission_ytd + amount;
        reward.save(state);
        Ok(())
    }

    // =========================================================================
    // ELIGIBILITY
    // =========================================================================

    /// Keep the eligible set consistent with `stake >= minimum_stake`; in
    /// no-rotation mode the active set mirrors it.
    fn update_eligibility<S: StateAccess>(
        &self,
        state: &mut S,
        validator: &Address,
        stake: U256,
    ) -> Result<(), StakeError> {
        let key = label_key(VALIDATOR_ELIGIBLE_SET_LABEL);
        let mut eligible = match state.get_record(&key) {
            None => Vec::new(),
            Some(bytes) => decode_address_list(&bytes).map_err(StateError::from)?,
        };

        let present = eligible.contains(validator);
        let qualifies = stake >= self.config.minimum_stake;
        if qualifies && !present {
            eligible.push(*validator);
            eligible.sort();
        } else if !qualifies && present {
            eligible.retain(|a| a != validator);
        } else {
            return Ok(());
        }

        state.put_record(key, encode_address_list(&eligible));
        if !self.config.rotation_enabled {
            state.put_record(label_key(VALIDATOR_SET_LABEL), encode_address_list(&eligible));
        }
        Ok(())
    }
}
