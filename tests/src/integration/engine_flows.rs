//! # Engine Flow Tests
//!
//! End-to-end block processing through the `Processor`: transactions in,
//! lifecycle, commit, and the observable event/root surface out.

#[cfg(test)]
mod tests {
    use crate::support::*;
    use nhb_core::{CoreConfig, CoreError, Processor};
    use nhb_sponsor::TierLimits;
    use nhb_state::StateAccess;
    use nhb_tx::{Transaction, TxType};
    use nhb_types::events::names;
    use nhb_types::{Address, CHAIN_ID, SECONDS_PER_YEAR};
    use primitive_types::U256;

    fn seed_ranked_validator(p: &mut Processor, address: Address, stake: u64, score: u64) {
        let mut account = p.state_mut().get_account(&address).unwrap();
        account.stake = U256::from(stake);
        account.engagement.score = score;
        p.state_mut().put_account(&address, &account).unwrap();

        let mut eligible = p.state().eligible_validators().unwrap();
        eligible.push(address);
        p.state_mut().set_eligible_validators(eligible.clone());
        p.state_mut().set_validator_set(eligible);
    }

    #[test]
    fn epoch_snapshot_ranks_by_composite() {
        // Validators (stake, engagement) = A:(2000,10) B:(3000,5) C:(2500,12)
        // with unit weights close in the order B, C, A.
        let mut config = CoreConfig::default();
        config.epoch.epoch_length = 10;
        let mut p = Processor::new(config);
        p.begin_block(10, 1_000);

        let a = [0xAA; 20];
        let b = [0xBB; 20];
        let c = [0xCC; 20];
        seed_ranked_validator(&mut p, a, 2_000, 10);
        seed_ranked_validator(&mut p, b, 3_000, 5);
        seed_ranked_validator(&mut p, c, 2_500, 12);

        let snapshot = p.process_block_lifecycle().unwrap().unwrap();
        let order: Vec<Address> = snapshot.weights.iter().map(|w| w.address).collect();
        assert_eq!(order, vec![b, c, a]);
    }

    #[test]
    fn equal_composites_rank_by_address() {
        let mut config = CoreConfig::default();
        config.epoch.epoch_length = 10;
        config.epoch.stake_weight = 1;
        config.epoch.engagement_weight = 0;
        let mut p = Processor::new(config);
        p.begin_block(10, 1_000);

        let high = [0x09; 20];
        let low = [0x01; 20];
        seed_ranked_validator(&mut p, high, 2_000, 0);
        seed_ranked_validator(&mut p, low, 2_000, 0);

        let snapshot = p.process_block_lifecycle().unwrap().unwrap();
        let order: Vec<Address> = snapshot.weights.iter().map(|w| w.address).collect();
        assert_eq!(order, vec![low, high]);
    }

    #[test]
    fn stake_then_claim_two_periods_through_dispatch() {
        let mut p = processor();
        let delegator = keypair();
        fund_znhb(&mut p, delegator.address(), 2_000);

        p.apply_transaction(&stake(&delegator, [0x02; 20], 2_000, 0))
            .unwrap();
        p.process_block_lifecycle().unwrap();
        p.commit();

        // Two full payout periods later: 12% APR on 2000 for 2/12 year.
        let two_periods = 1_700_000_000 + 2 * SECONDS_PER_YEAR / 12;
        p.begin_block(2, two_periods);
        let mut claim = Transaction::new(TxType::ClaimRewards, 1);
        claim.sign(&delegator).unwrap();
        p.apply_transaction(&claim).unwrap();

        let account = p.state().peek_account(&delegator.address()).unwrap();
        let minted = account.balance_znhb;
        assert!(
            minted == U256::from(39u64) || minted == U256::from(40u64),
            "expected ~40, got {minted}"
        );
        assert_eq!(
            p.events()
                .iter()
                .filter(|e| e.event_type == names::STAKE_REWARDS_CLAIMED)
                .count(),
            1
        );
    }

    #[test]
    fn loyalty_rewards_settle_from_treasury_at_block_close() {
        let treasury = [0xEE; 20];
        let merchant = [0xAD; 20];
        let owner = [0x0F; 20];
        let mut config = CoreConfig::default();
        config.loyalty.treasury = treasury;
        config.loyalty.base_reward_bps = 100;
        config.loyalty.daily_cap_pct_of_7d_fees_bps = 10_000;
        config.fee_policies.insert(
            merchant,
            nhb_core::FeePolicy {
                fee_bps: 1_000,
                fee_payer: nhb_core::FeePayer::Sender,
                owner_wallet: owner,
            },
        );
        let mut p = Processor::new(config);
        p.begin_block(1, 1_700_000_000);

        let sender = keypair();
        fund_nhb(&mut p, sender.address(), 100_000);
        fund_znhb(&mut p, treasury, 1_000_000);

        // A merchant transfer: routes a fee (feeding the 7d window) and
        // queues a 1% base reward for the sender.
        let mut tx = transfer(&sender, [0xBB; 20], 10_000, 0);
        tx.merchant_address = Some(merchant);
        tx.sign(&sender).unwrap();
        p.apply_transaction(&tx).unwrap();

        p.process_block_lifecycle().unwrap();

        // Base reward = 100 ZNHB; fee window holds 1000, pct cap 100%.
        let account = p.state().peek_account(&sender.address()).unwrap();
        assert_eq!(account.balance_znhb, U256::from(100u64));
        let treasury_account = p.state().peek_account(&treasury).unwrap();
        assert_eq!(treasury_account.balance_znhb, U256::from(999_900u64));
    }

    #[test]
    fn sponsorship_throttles_at_global_tier() {
        let sponsor = fixed_keypair(0x31);
        let mut config = CoreConfig::default();
        config.sponsor.global = TierLimits {
            daily_tx_limit: 100,
            daily_budget_wei: U256::from(9_999u64),
        };
        let mut p = Processor::new(config);
        p.begin_block(1, 1_700_000_000);

        let sender = keypair();
        fund_nhb(&mut p, sender.address(), 100_000);
        fund_nhb(&mut p, sponsor.address(), 100_000);

        let mut tx = transfer(&sender, [0xBB; 20], 100, 0);
        tx.gas_limit = 100;
        tx.gas_price = U256::from(100u64);
        tx.paymaster = Some(sponsor.address());
        tx.sign(&sender).unwrap();
        tx.sign_paymaster(&sponsor).unwrap();

        let err = p.apply_transaction(&tx).unwrap_err();
        assert!(matches!(err, CoreError::SponsorshipDeclined(_)));
        assert_eq!(
            p.events()
                .iter()
                .filter(|e| e.event_type == names::PAYMASTER_THROTTLED)
                .count(),
            1
        );
        // The throttled transaction did not execute.
        assert_eq!(
            p.state().peek_account(&sender.address()).unwrap().nonce,
            0
        );
    }

    #[test]
    fn sponsored_transfer_charges_the_sponsor() {
        let sponsor = fixed_keypair(0x32);
        let mut p = processor();
        let sender = keypair();
        fund_nhb(&mut p, sender.address(), 10_000);
        fund_nhb(&mut p, sponsor.address(), 50_000);

        let mut tx = transfer(&sender, [0xBB; 20], 100, 0);
        tx.gas_limit = 100;
        tx.gas_price = U256::from(10u64);
        tx.paymaster = Some(sponsor.address());
        tx.sign(&sender).unwrap();
        tx.sign_paymaster(&sponsor).unwrap();
        p.apply_transaction(&tx).unwrap();

        assert_eq!(
            p.state().peek_account(&sponsor.address()).unwrap().balance_nhb,
            U256::from(49_000u64)
        );
        // The sender paid only the transferred value.
        assert_eq!(
            p.state().peek_account(&sender.address()).unwrap().balance_nhb,
            U256::from(9_900u64)
        );
    }

    #[test]
    fn mint_funds_a_full_trading_journey() {
        let authority = fixed_keypair(0x33);
        let mut config = CoreConfig::default();
        config.mint_authority = authority.address();
        let mut p = Processor::new(config);
        p.begin_block(1, 1_700_000_000);

        let buyer = keypair();
        let seller = keypair();

        // Mint working capital for the buyer.
        let voucher = nhb_tx::MintVoucher {
            invoice_id: "inv-journey".to_string(),
            recipient: Some(buyer.address()),
            token: "NHB".to_string(),
            amount: U256::from(5_000u64),
            chain_id: CHAIN_ID,
            expiry: 1_800_000_000,
        };
        let signature = authority.sign(&voucher.digest().unwrap());
        let mut mint = Transaction::new(TxType::Mint, 0);
        mint.data = format!(
            r#"{{"voucher":{},"signature":"0x{}"}}"#,
            serde_json::to_string(&voucher).unwrap(),
            hex::encode(signature.as_bytes()),
        )
        .into_bytes();
        p.apply_transaction(&mint).unwrap();

        // Open, accept, release an escrow against the minted funds.
        let mut open = Transaction::new(TxType::EscrowOpen, 0);
        open.to = Some(seller.address());
        open.value = U256::from(3_000u64);
        open.data = br#"{"token":"NHB"}"#.to_vec();
        open.sign(&buyer).unwrap();
        let escrow_id = p.apply_transaction(&open).unwrap();

        let ref_payload = format!(r#"{{"escrowId":"0x{}"}}"#, hex::encode(escrow_id));
        let mut accept = Transaction::new(TxType::EscrowAccept, 0);
        accept.data = ref_payload.clone().into_bytes();
        accept.sign(&seller).unwrap();
        p.apply_transaction(&accept).unwrap();

        let mut release = Transaction::new(TxType::EscrowRelease, 1);
        release.data = ref_payload.into_bytes();
        release.sign(&buyer).unwrap();
        p.apply_transaction(&release).unwrap();

        p.process_block_lifecycle().unwrap();
        let root = p.commit();
        assert_ne!(root, nhb_trie::EMPTY_ROOT);

        assert_eq!(
            p.account(&buyer.address()).unwrap().balance_nhb,
            U256::from(2_000u64)
        );
        assert_eq!(
            p.account(&seller.address()).unwrap().balance_nhb,
            U256::from(3_000u64)
        );
    }

    #[test]
    fn trade_settles_both_escrow_legs_atomically() {
        use nhb_escrow::{EscrowEngine, EscrowStatus};

        let mut p = processor();
        let maker = keypair();
        let taker = keypair();
        fund_nhb(&mut p, maker.address(), 10_000);
        fund_nhb(&mut p, taker.address(), 10_000);

        // Each party escrows toward the other, then funds.
        let mut create_a = Transaction::new(TxType::EscrowCreate, 0);
        create_a.to = Some(taker.address());
        create_a.value = U256::from(4_000u64);
        create_a.data = br#"{"token":"NHB","deadline":9999999999}"#.to_vec();
        create_a.sign(&maker).unwrap();
        let leg_a = p.apply_transaction(&create_a).unwrap();

        let mut create_b = Transaction::new(TxType::EscrowCreate, 0);
        create_b.to = Some(maker.address());
        create_b.value = U256::from(2_500u64);
        create_b.data = br#"{"token":"NHB","deadline":9999999999}"#.to_vec();
        create_b.sign(&taker).unwrap();
        let leg_b = p.apply_transaction(&create_b).unwrap();

        for (leg, party, nonce) in [(leg_a, &maker, 1u64), (leg_b, &taker, 1)] {
            let mut fund = Transaction::new(TxType::EscrowFund, nonce);
            fund.data = format!(r#"{{"escrowId":"0x{}"}}"#, hex::encode(leg)).into_bytes();
            fund.sign(party).unwrap();
            p.apply_transaction(&fund).unwrap();
        }

        let mut create_trade = Transaction::new(TxType::TradeCreate, 2);
        create_trade.data = format!(
            r#"{{"legA":"0x{}","legB":"0x{}"}}"#,
            hex::encode(leg_a),
            hex::encode(leg_b)
        )
        .into_bytes();
        create_trade.sign(&maker).unwrap();
        let trade_id = p.apply_transaction(&create_trade).unwrap();

        let mut settle = Transaction::new(TxType::TradeSettle, 2);
        settle.data =
            format!(r#"{{"tradeId":"0x{}"}}"#, hex::encode(trade_id)).into_bytes();
        settle.sign(&taker).unwrap();
        p.apply_transaction(&settle).unwrap();

        // Both legs released: each party paid the other.
        assert_eq!(
            EscrowEngine::peek(p.state(), &leg_a).unwrap().status,
            EscrowStatus::Released
        );
        assert_eq!(
            EscrowEngine::peek(p.state(), &leg_b).unwrap().status,
            EscrowStatus::Released
        );
        assert_eq!(
            p.state().peek_account(&maker.address()).unwrap().balance_nhb,
            U256::from(8_500u64)
        );
        assert_eq!(
            p.state().peek_account(&taker.address()).unwrap().balance_nhb,
            U256::from(11_500u64)
        );
    }

    #[test]
    fn identical_input_blocks_replay_to_identical_roots() {
        let run = || {
            let mut p = processor();
            let alice = fixed_keypair(0x41);
            let bob = fixed_keypair(0x42);
            fund_nhb(&mut p, alice.address(), 50_000);
            fund_znhb(&mut p, bob.address(), 20_000);

            p.apply_transaction(&transfer(&alice, bob.address(), 1_234, 0))
                .unwrap();
            p.apply_transaction(&stake(&bob, bob.address(), 20_000, 0))
                .unwrap();
            p.apply_transaction(&transfer(&alice, [0xB7; 20], 99, 1))
                .unwrap();
            p.process_block_lifecycle().unwrap();
            (p.commit(), p.events())
        };

        let (root1, events1) = run();
        let (root2, events2) = run();
        assert_eq!(root1, root2);
        assert_eq!(events1, events2);
    }

    #[test]
    fn rejected_transactions_do_not_reach_the_root() {
        let mut p = processor();
        let sender = keypair();
        fund_nhb(&mut p, sender.address(), 100);
        let before = p.pending_root();

        // Overdraft, bad nonce, zero recipient: all rejected.
        assert!(p
            .apply_transaction(&transfer(&sender, [0xBB; 20], 1_000, 0))
            .is_err());
        assert!(p
            .apply_transaction(&transfer(&sender, [0xBB; 20], 10, 7))
            .is_err());
        let mut zero_to = Transaction::new(TxType::TransferNhb, 0);
        zero_to.to = Some([0u8; 20]);
        zero_to.value = U256::from(1u64);
        zero_to.sign(&sender).unwrap();
        assert!(p.apply_transaction(&zero_to).is_err());

        assert_eq!(p.pending_root(), before);
    }
}
