//! # Merchant Fee Routing
//!
//! After a successful handler, a transaction carrying a merchant with a
//! configured domain policy routes a fee: the configured payer is debited
//! and the owner wallet credited. Routing failures fail the whole
//! transaction; the dispatcher's checkpoint makes that atomic.

use crate::config::{FeePayer, FeePolicy};
use crate::errors::CoreError;
use nhb_loyalty::LoyaltyEngine;
use nhb_state::StateAccess;
use nhb_tx::{Transaction, TxType};
use nhb_types::events::names;
use nhb_types::{address_hex, Address, Event, Token};
use primitive_types::U256;

/// Token a transaction's value (and therefore its fee) denominates.
fn value_token(tx_type: TxType) -> Token {
    match tx_type {
        TxType::TransferZnhb => Token::ZNHB,
        _ => Token::NHB,
    }
}

/// Route the merchant fee for a successful transaction. Returns the fee
/// amount (zero when no policy applies).
pub fn route_merchant_fee<S: StateAccess>(
    state: &mut S,
    loyalty: &LoyaltyEngine,
    tx: &Transaction,
    policy: &FeePolicy,
    sender: &Address,
    now: u64,
) -> Result<U256, CoreError> {
    if policy.fee_bps == 0 || tx.value.is_zero() {
        return Ok(U256::zero());
    }
    let fee = tx.value * U256::from(policy.fee_bps) / U256::from(10_000u64);
    if fee.is_zero() {
        return Ok(U256::zero());
    }

    let payer = match policy.fee_payer {
        FeePayer::Sender => *sender,
        FeePayer::Recipient => tx.to.ok_or(CoreError::InvalidRecipient)?,
    };
    let token = value_token(tx.tx_type);

    let mut payer_account = state.get_account(&payer)?;
    let balance = match token {
        Token::NHB => &mut payer_account.balance_nhb,
        Token::ZNHB => &mut payer_account.balance_znhb,
    };
    if *balance < fee {
        return Err(CoreError::FeeInsufficientBalance);
    }
    *balance = *balance - fee;
    state.put_account(&payer, &payer_account)?;

    let mut owner_account = state.get_account(&policy.owner_wallet)?;
    match token {
        Token::NHB => owner_account.balance_nhb = owner_account.balance_nhb + fee,
        Token::ZNHB => owner_account.balance_znhb = owner_account.balance_znhb + fee,
    }
    state.put_account(&policy.owner_wallet, &owner_account)?;

    // Routed fees feed the loyalty engine's rolling 7-day window.
    loyalty.record_fee(state, fee, now).map_err(|e| match e {
        nhb_loyalty::LoyaltyError::State(inner) => CoreError::State(inner),
    })?;

    state.emit(
        Event::new(names::FEE_ROUTED)
            .attr("payer", address_hex(&payer))
            .attr("owner", address_hex(&policy.owner_wallet))
            .attr("amount", fee.to_string())
            .attr("token", token.symbol()),
    );
    Ok(fee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nhb_loyalty::LoyaltyConfig;
    use nhb_state::StateBackend;

    const SENDER: Address = [0x01; 20];
    const RECIPIENT: Address = [0x02; 20];
    const OWNER: Address = [0x0F; 20];

    fn fund_nhb(state: &mut StateBackend, address: Address, amount: u64) {
        let mut account = state.get_account(&address).unwrap();
        account.balance_nhb = U256::from(amount);
        state.put_account(&address, &account).unwrap();
    }

    fn transfer(value: u64) -> Transaction {
        let mut tx = Transaction::new(TxType::TransferNhb, 0);
        tx.to = Some(RECIPIENT);
        tx.value = U256::from(value);
        tx.merchant_address = Some([0xAD; 20]);
        tx
    }

    fn policy(payer: FeePayer) -> FeePolicy {
        FeePolicy {
            fee_bps: 100,
            fee_payer: payer,
            owner_wallet: OWNER,
        }
    }

    fn loyalty() -> LoyaltyEngine {
        LoyaltyEngine::new(LoyaltyConfig::default())
    }

    #[test]
    fn sender_pays_fee_to_owner() {
        let mut state = StateBackend::new();
        fund_nhb(&mut state, SENDER, 1_000);

        let fee = route_merchant_fee(
            &mut state,
            &loyalty(),
            &transfer(10_000),
            &policy(FeePayer::Sender),
            &SENDER,
            0,
        )
        .unwrap();
        assert_eq!(fee, U256::from(100u64));
        assert_eq!(
            state.get_account(&SENDER).unwrap().balance_nhb,
            U256::from(900u64)
        );
        assert_eq!(
            state.get_account(&OWNER).unwrap().balance_nhb,
            U256::from(100u64)
        );
    }

    #[test]
    fn recipient_payer_debits_recipient() {
        let mut state = StateBackend::new();
        fund_nhb(&mut state, RECIPIENT, 1_000);

        route_merchant_fee(
            &mut state,
            &loyalty(),
            &transfer(10_000),
            &policy(FeePayer::Recipient),
            &SENDER,
            0,
        )
        .unwrap();
        assert_eq!(
            state.get_account(&RECIPIENT).unwrap().balance_nhb,
            U256::from(900u64)
        );
    }

    #[test]
    fn underfunded_payer_fails() {
        let mut state = StateBackend::new();
        fund_nhb(&mut state, SENDER, 50);

        let err = route_merchant_fee(
            &mut state,
            &loyalty(),
            &transfer(10_000),
            &policy(FeePayer::Sender),
            &SENDER,
            0,
        )
        .unwrap_err();
        assert_eq!(err, CoreError::FeeInsufficientBalance);
    }

    #[test]
    fn zero_value_routes_nothing() {
        let mut state = StateBackend::new();
        let fee = route_merchant_fee(
            &mut state,
            &loyalty(),
            &transfer(0),
            &policy(FeePayer::Sender),
            &SENDER,
            0,
        )
        .unwrap();
        assert!(fee.is_zero());
    }
}
