//! # Processor
//!
//! The single-threaded state-transition core. The owner (block producer or
//! applier) serializes `begin_block` → `apply_transaction`* →
//! `process_block_lifecycle` → `commit`; read-only queries are served from
//! committed-state copies.
//!
//! ## Transaction Pipeline
//!
//! 1. chain-id check
//! 2. pause view (emits `*.paused` before failing)
//! 3. sender + sponsorship recovery (signature work, no writes)
//! 4. checkpoint
//! 5. quota gate → nonce check → intent registry → typed handler →
//!    merchant fee routing → nonce/engagement bump → sponsorship charge
//! 6. on any error: revert to the checkpoint (quota re-emits its event
//!    outside the checkpoint so the rejection stays observable)

use crate::config::CoreConfig;
use crate::engagement::{self, DeviceClock};
use crate::errors::CoreError;
use crate::fees;
use crate::intents::IntentRegistry;
use crate::payloads::{
    self, EscrowArbitratePayload, EscrowCreatePayload, EscrowRefPayload, MintPayload,
    RegisterIdentityPayload, StakeClaimPayload, SwapPayoutPayload, TradeCreatePayload,
    TradeSettlePayload,
};
use crate::quota::QuotaGate;
use nhb_crypto::RecoverableSig;
use nhb_epoch::{EpochEngine, EpochSnapshot};
use nhb_escrow::{ArbitrationOutcome, EscrowEngine};
use nhb_loyalty::LoyaltyEngine;
use nhb_pos::{FinalityStatus, PosStream};
use nhb_sponsor::{SponsorEngine, SponsorshipStatus};
use nhb_stake::{StakeEngine, StakeError};
use nhb_state::keys::record_key;
use nhb_state::{Account, StateAccess, StateBackend, StateError};
use nhb_trie::Store;
use nhb_tx::{Transaction, TxType, VoucherError};
use nhb_types::events::names;
use nhb_types::{address_hex, utc_day, Address, Event, Hash, Token, CHAIN_ID};
use primitive_types::U256;
use tracing::{debug, info};

/// The deterministic state-transition processor.
pub struct Processor {
    state: StateBackend,
    config: CoreConfig,
    stake: StakeEngine,
    epoch: EpochEngine,
    loyalty: LoyaltyEngine,
    sponsor: SponsorEngine,
    escrow: EscrowEngine,
    pos: PosStream,
    height: u64,
    block_time: u64,
    /// Intents consumed in the current block, published as finalized at
    /// commit.
    consumed_intents: Vec<(Vec<u8>, Hash)>,
}

impl Processor {
    pub fn new(config: CoreConfig) -> Self {
        Self::with_store(config, Store::new())
    }

    /// Build over an existing store (e.g. one restored from disk).
    pub fn with_store(mut config: CoreConfig, store: Store) -> Self {
        // The stake engine mirrors the active set in no-rotation mode; the
        // two engines must agree on which mode is in force.
        config.stake.rotation_enabled = config.epoch.rotation_enabled;

        let stake = StakeEngine::new(config.stake.clone());
        let epoch = EpochEngine::new(config.epoch.clone());
        let loyalty = LoyaltyEngine::new(config.loyalty.clone());
        let sponsor = SponsorEngine::new(config.sponsor.clone());
        let escrow = EscrowEngine::new(config.escrow.clone());

        Self {
            state: StateBackend::with_store(store),
            config,
            stake,
            epoch,
            loyalty,
            sponsor,
            escrow,
            pos: PosStream::new(),
            height: 0,
            block_time: 0,
            consumed_intents: Vec::new(),
        }
    }

    // =========================================================================
    // BLOCK LIFECYCLE
    // =========================================================================

    /// Seed block timing and clear the event log.
    pub fn begin_block(&mut self, height: u64, timestamp: u64) {
        self.height = height;
        self.block_time = timestamp;
        self.state.clear_events();
        self.consumed_intents.clear();
        debug!(height, timestamp, "block started");
    }

    /// Quota pruning, reward accrual, loyalty settlement, epoch
    /// finalization. Runs after the block's transactions, before `commit`.
    pub fn process_block_lifecycle(&mut self) -> Result<Option<EpochSnapshot>, CoreError> {
        let current_epoch = self.current_epoch();
        QuotaGate::prune(&mut self.state, current_epoch)?;
        self.stake.accrue(&mut self.state, self.block_time)?;
        self.loyalty.end_block_rewards(&mut self.state, self.block_time)?;
        let snapshot = self
            .epoch
            .maybe_finalize(&mut self.state, self.height, self.block_time)?;
        Ok(snapshot)
    }

    /// Freeze staged writes into a committed root and publish finality for
    /// the block's consumed intents.
    pub fn commit(&mut self) -> Hash {
        let parent = self.state.committed_root();
        let root = self.state.commit(parent, self.height);
        for (intent_ref, tx_hash) in std::mem::take(&mut self.consumed_intents) {
            self.pos.publish(
                intent_ref,
                tx_hash,
                FinalityStatus::Finalized,
                root,
                self.height,
                self.block_time,
            );
        }
        info!(height = self.height, root = %nhb_types::hash_hex(&root), "block committed");
        root
    }

    /// Discard staged state and return to a retained root.
    pub fn reset_to_root(&mut self, root: Hash) -> Result<(), CoreError> {
        self.state.reset(root)?;
        self.consumed_intents.clear();
        Ok(())
    }

    fn current_epoch(&self) -> u64 {
        self.height / self.epoch.config().epoch_length
    }

    // =========================================================================
    // TRANSACTION DISPATCH
    // =========================================================================

    /// Apply one transaction. Returns the canonical transaction hash.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<Hash, CoreError> {
        if tx.chain_id != CHAIN_ID {
            return Err(CoreError::InvalidChainId(tx.chain_id));
        }
        let tx_hash = tx.hash()?;

        let module = module_of(tx.tx_type);
        if self.config.pause.is_paused(module) {
            self.state
                .emit(Event::new(pause_event_name(module)).attr("module", module));
            return Err(CoreError::ModulePaused(module.to_string()));
        }

        // Signature recovery touches no state.
        let sender = if tx.tx_type.requires_sender_signature() {
            Some(tx.from()?)
        } else {
            None
        };

        // Sponsorship assessment; its throttle event must survive a
        // failing transaction, so it runs before the checkpoint.
        let assessment = if tx.paymaster.is_some() {
            let assessment = self
                .sponsor
                .evaluate_sponsorship(&mut self.state, tx, self.block_time)?;
            if assessment.status != SponsorshipStatus::Ready {
                return Err(CoreError::SponsorshipDeclined(assessment.reason));
            }
            Some(assessment)
        } else {
            None
        };

        let checkpoint = self.state.checkpoint();
        match self.execute(tx, tx_hash, sender, assessment.as_ref()) {
            Ok(()) => {
                if let Some(intent_ref) = &tx.intent_ref {
                    self.consumed_intents.push((intent_ref.clone(), tx_hash));
                    self.pos.publish(
                        intent_ref.clone(),
                        tx_hash,
                        FinalityStatus::Pending,
                        [0u8; 32],
                        self.height,
                        self.block_time,
                    );
                }
                Ok(tx_hash)
            }
            Err(error) => {
                self.state.revert(checkpoint);
                if let (CoreError::QuotaExceeded(reason), Some(sender)) = (&error, &sender) {
                    QuotaGate::emit_exceeded(&mut self.state, sender, reason);
                }
                debug!(%error, "transaction rejected");
                Err(error)
            }
        }
    }

    fn execute(
        &mut self,
        tx: &Transaction,
        tx_hash: Hash,
        sender: Option<Address>,
        assessment: Option<&nhb_sponsor::SponsorshipAssessment>,
    ) -> Result<(), CoreError> {
        let module = module_of(tx.tx_type);

        if let Some(sender) = &sender {
            let limits = self
                .config
                .quota_limits
                .get(module)
                .copied()
                .unwrap_or_default();
            let nhb_value = if tx.tx_type == TxType::TransferNhb {
                tx.value
            } else {
                U256::zero()
            };
            let current_epoch = self.current_epoch();
            QuotaGate::note(
                &mut self.state,
                &limits,
                module,
                current_epoch,
                sender,
                nhb_value,
            )?;

            let account = self.state.get_account(sender)?;
            if account.nonce != tx.nonce {
                return Err(CoreError::InvalidNonce {
                    expected: account.nonce,
                    got: tx.nonce,
                });
            }
        }

        if let Some(intent_ref) = &tx.intent_ref {
            IntentRegistry::consume(
                &mut self.state,
                intent_ref,
                tx.intent_expiry,
                tx_hash,
                self.block_time,
            )?;
        }

        self.dispatch(tx, tx_hash, sender)?;

        if let (Some(merchant), Some(sender)) = (tx.merchant_address, &sender) {
            if let Some(policy) = self.config.fee_policies.get(&merchant).cloned() {
                fees::route_merchant_fee(
                    &mut self.state,
                    &self.loyalty,
                    tx,
                    &policy,
                    sender,
                    self.block_time,
                )?;
            }
        }

        if let Some(sender) = &sender {
            let day = utc_day(self.block_time);
            let mut account = self.state.get_account(sender)?;
            account.nonce += 1;
            engagement::note_tx(&mut account.engagement, &day);
            if matches!(module, "escrow" | "trade") {
                engagement::note_escrow(&mut account.engagement, &day);
            }
            self.state.put_account(sender, &account)?;
        }

        if let Some(assessment) = assessment {
            let sponsor = assessment
                .sponsor
                .expect("ready assessment always carries a sponsor");
            self.sponsor.record_usage(
                &mut self.state,
                tx,
                &sponsor,
                assessment.gas_cost,
                self.block_time,
            )?;
        }

        Ok(())
    }

    fn dispatch(
        &mut self,
        tx: &Transaction,
        tx_hash: Hash,
        sender: Option<Address>,
    ) -> Result<(), CoreError> {
        match tx.tx_type {
            TxType::TransferNhb => self.handle_transfer(tx, required(sender)?, Token::NHB),
            TxType::TransferZnhb => self.handle_transfer(tx, required(sender)?, Token::ZNHB),
            TxType::RegisterIdentity => self.handle_register(tx, required(sender)?),
            TxType::Stake => {
                let validator = tx.to.ok_or(CoreError::InvalidRecipient)?;
                self.stake.delegate(
                    &mut self.state,
                    &required(sender)?,
                    &validator,
                    tx.value,
                    self.block_time,
                )?;
                Ok(())
            }
            TxType::Unstake => {
                self.stake.undelegate(
                    &mut self.state,
                    &required(sender)?,
                    tx.value,
                    self.block_time,
                )?;
                Ok(())
            }
            TxType::StakeClaim => {
                let payload: StakeClaimPayload = payloads::parse(&tx.data)?;
                self.stake.claim_unbond(
                    &mut self.state,
                    &required(sender)?,
                    payload.unbond_id,
                    self.block_time,
                )?;
                Ok(())
            }
            TxType::ClaimRewards => {
                self.stake
                    .claim_rewards(&mut self.state, &required(sender)?, self.block_time)?;
                Ok(())
            }
            TxType::Heartbeat => self.handle_heartbeat(tx, required(sender)?),
            TxType::Mint => self.handle_mint(tx, tx_hash),
            TxType::SwapPayoutReceipt => self.handle_swap_payout(tx, tx_hash),
            TxType::EscrowOpen => {
                let payload: EscrowCreatePayload = payloads::parse(&tx.data)?;
                let seller = tx.to.ok_or(CoreError::InvalidRecipient)?;
                self.escrow.legacy_open(
                    &mut self.state,
                    &tx_hash,
                    &required(sender)?,
                    &seller,
                    payload.token()?,
                    tx.value,
                    self.block_time,
                )?;
                Ok(())
            }
            TxType::EscrowAccept => {
                let payload: EscrowRefPayload = payloads::parse(&tx.data)?;
                self.escrow
                    .legacy_accept(&mut self.state, &payload.id()?, &required(sender)?)?;
                Ok(())
            }
            TxType::EscrowRelease => {
                let payload: EscrowRefPayload = payloads::parse(&tx.data)?;
                self.escrow
                    .release(&mut self.state, &payload.id()?, &required(sender)?)?;
                Ok(())
            }
            TxType::EscrowRefund => {
                let payload: EscrowRefPayload = payloads::parse(&tx.data)?;
                self.escrow
                    .refund(&mut self.state, &payload.id()?, &required(sender)?)?;
                Ok(())
            }
            TxType::EscrowDispute => {
                let payload: EscrowRefPayload = payloads::parse(&tx.data)?;
                self.escrow
                    .dispute(&mut self.state, &payload.id()?, &required(sender)?)?;
                Ok(())
            }
            TxType::EscrowArbitrate => {
                let payload: EscrowArbitratePayload = payloads::parse(&tx.data)?;
                let id = payload
                    .escrow_id
                    .ok_or_else(|| CoreError::InvalidPayload("missing escrowId".to_string()))?;
                let outcome = match payload.outcome.as_str() {
                    "release" => ArbitrationOutcome::Release,
                    "refund" => ArbitrationOutcome::Refund,
                    other => {
                        return Err(CoreError::InvalidPayload(format!(
                            "unknown outcome {other}"
                        )))
                    }
                };
                self.escrow
                    .arbitrate(&mut self.state, &id, &required(sender)?, outcome)?;
                Ok(())
            }
            TxType::EscrowCreate => {
                let payload: EscrowCreatePayload = payloads::parse(&tx.data)?;
                let seller = tx.to.ok_or(CoreError::InvalidRecipient)?;
                self.escrow.create(
                    &mut self.state,
                    &tx_hash,
                    &required(sender)?,
                    &seller,
                    payload.token()?,
                    tx.value,
                    payload.deadline,
                    self.block_time,
                )?;
                Ok(())
            }
            TxType::EscrowFund => {
                let payload: EscrowRefPayload = payloads::parse(&tx.data)?;
                self.escrow
                    .fund(&mut self.state, &payload.id()?, &required(sender)?)?;
                Ok(())
            }
            TxType::EscrowExpire => {
                let payload: EscrowRefPayload = payloads::parse(&tx.data)?;
                self.escrow
                    .expire(&mut self.state, &payload.id()?, self.block_time)?;
                Ok(())
            }
            TxType::TradeCreate => {
                let payload: TradeCreatePayload = payloads::parse(&tx.data)?;
                let leg_a = payload
                    .leg_a
                    .ok_or_else(|| CoreError::InvalidPayload("missing legA".to_string()))?;
                let leg_b = payload
                    .leg_b
                    .ok_or_else(|| CoreError::InvalidPayload("missing legB".to_string()))?;
                self.escrow
                    .trade_create(&mut self.state, &tx_hash, &leg_a, &leg_b)?;
                Ok(())
            }
            TxType::TradeSettle => {
                let payload: TradeSettlePayload = payloads::parse(&tx.data)?;
                let id = payload
                    .trade_id
                    .ok_or_else(|| CoreError::InvalidPayload("missing tradeId".to_string()))?;
                self.escrow.settle_atomic(&mut self.state, &id)?;
                Ok(())
            }
        }
    }

    // =========================================================================
    // HANDLERS
    // =========================================================================

    fn handle_transfer(
        &mut self,
        tx: &Transaction,
        sender: Address,
        token: Token,
    ) -> Result<(), CoreError> {
        let recipient = tx.to.ok_or(CoreError::InvalidRecipient)?;
        if recipient == [0u8; 20] {
            return Err(CoreError::InvalidRecipient);
        }
        if tx.value.is_zero() {
            return Err(CoreError::NonPositiveAmount);
        }

        if sender != recipient {
            let mut from_account = self.state.get_account(&sender)?;
            let balance = match token {
                Token::NHB => &mut from_account.balance_nhb,
                Token::ZNHB => &mut from_account.balance_znhb,
            };
            if *balance < tx.value {
                return Err(CoreError::InsufficientBalance);
            }
            *balance = *balance - tx.value;
            self.state.put_account(&sender, &from_account)?;

            let mut to_account = self.state.get_account(&recipient)?;
            match token {
                Token::NHB => to_account.balance_nhb = to_account.balance_nhb + tx.value,
                Token::ZNHB => to_account.balance_znhb = to_account.balance_znhb + tx.value,
            }
            self.state.put_account(&recipient, &to_account)?;

            self.loyalty
                .accrue_base(&mut self.state, &sender, tx.value, self.block_time)?;
        }

        self.state.emit(
            Event::new(names::TRANSFER_NATIVE)
                .attr("token", token.symbol())
                .attr("from", address_hex(&sender))
                .attr("to", address_hex(&recipient))
                .attr("amount", tx.value.to_string()),
        );
        Ok(())
    }

    fn handle_register(&mut self, tx: &Transaction, sender: Address) -> Result<(), CoreError> {
        let payload: RegisterIdentityPayload = payloads::parse(&tx.data)?;
        if !nhb_state::accounts::valid_username(&payload.username) {
            return Err(CoreError::State(StateError::InvalidUsername));
        }
        let mut account = self.state.get_account(&sender)?;
        if !account.username.is_empty() {
            return Err(CoreError::State(StateError::AlreadyRegistered));
        }
        account.username = payload.username.clone();
        self.state.put_account(&sender, &account)?;
        self.state.emit(
            Event::new(names::IDENTITY_REGISTERED)
                .attr("account", address_hex(&sender))
                .attr("username", payload.username),
        );
        Ok(())
    }

    fn handle_heartbeat(&mut self, tx: &Transaction, sender: Address) -> Result<(), CoreError> {
        let device = tx
            .device_id
            .as_deref()
            .ok_or_else(|| CoreError::InvalidPayload("missing deviceId".to_string()))?;
        let now = self.block_time;

        let last = DeviceClock::load(&self.state, &sender, device).map_err(StateError::from)?;
        if now <= last {
            return Err(CoreError::StaleHeartbeat);
        }
        if last != 0 && now - last < self.config.heartbeat.min_interval_secs {
            return Err(CoreError::HeartbeatTooSoon);
        }

        let minutes =
            ((now - last) / 60).min(self.config.heartbeat.max_minutes_per_heartbeat);
        DeviceClock::save(&mut self.state, &sender, device, now);

        let mut account = self.state.get_account(&sender)?;
        engagement::note_minutes(&mut account.engagement, &utc_day(now), minutes, now);
        self.state.put_account(&sender, &account)?;

        self.state.emit(
            Event::new(names::HEARTBEAT)
                .attr("account", address_hex(&sender))
                .attr("device", device)
                .attr("minutes", minutes.to_string()),
        );
        Ok(())
    }

    fn handle_mint(&mut self, tx: &Transaction, tx_hash: Hash) -> Result<(), CoreError> {
        let payload: MintPayload = payloads::parse(&tx.data)?;
        let voucher = payload.voucher.canonicalize()?;
        voucher.validate(self.block_time)?;

        let signature_bytes = payload
            .signature
            .ok_or(CoreError::Voucher(VoucherError::InvalidSigner))?;
        let signature = RecoverableSig::from_bytes(&signature_bytes)
            .map_err(|_| CoreError::Voucher(VoucherError::InvalidSigner))?;
        voucher.verify_signer(&signature, &self.config.mint_authority)?;

        let invoice_key = record_key("mint-invoice:", &[voucher.invoice_id.as_bytes()]);
        if self.state.get_record(&invoice_key).is_some() {
            return Err(CoreError::Voucher(VoucherError::InvoiceUsed));
        }

        let recipient = voucher
            .recipient
            .ok_or_else(|| CoreError::InvalidPayload("missing recipient".to_string()))?;
        let token = voucher.token()?;

        // ZNHB mints draw down the same annual emission bucket as staking
        // rewards, but all-or-nothing.
        if token == Token::ZNHB {
            match self
                .stake
                .reserve_emission(&mut self.state, voucher.amount, self.block_time)
            {
                Ok(()) => {}
                Err(StakeError::EmissionCapExceeded) => {
                    return Err(CoreError::Voucher(VoucherError::EmissionCapExceeded));
                }
                Err(other) => return Err(other.into()),
            }
        }

        let mut account = self.state.get_account(&recipient)?;
        match token {
            Token::NHB => account.balance_nhb = account.balance_nhb + voucher.amount,
            Token::ZNHB => account.balance_znhb = account.balance_znhb + voucher.amount,
        }
        self.state.put_account(&recipient, &account)?;
        self.state.put_record(invoice_key, tx_hash.to_vec());

        self.state.emit(
            Event::new(names::MINT_SETTLED)
                .attr("invoice", voucher.invoice_id.clone())
                .attr("recipient", address_hex(&recipient))
                .attr("token", token.symbol())
                .attr("amount", voucher.amount.to_string()),
        );
        Ok(())
    }

    fn handle_swap_payout(&mut self, tx: &Transaction, tx_hash: Hash) -> Result<(), CoreError> {
        let payload: SwapPayoutPayload = payloads::parse(&tx.data)?;
        let receipt = payload.receipt.canonicalize()?;
        receipt.validate(self.block_time)?;

        let signature_bytes = payload
            .signature
            .ok_or(CoreError::Voucher(VoucherError::InvalidSigner))?;
        let signature = RecoverableSig::from_bytes(&signature_bytes)
            .map_err(|_| CoreError::Voucher(VoucherError::InvalidSigner))?;
        receipt.verify_signer(&signature, &self.config.swap_authority)?;

        let receipt_key = record_key("swap-receipt:", &[receipt.receipt_id.as_bytes()]);
        if self.state.get_record(&receipt_key).is_some() {
            return Err(CoreError::Voucher(VoucherError::InvoiceUsed));
        }

        let recipient = receipt
            .recipient
            .ok_or_else(|| CoreError::InvalidPayload("missing recipient".to_string()))?;
        let token = receipt.token()?;

        let mut account = self.state.get_account(&recipient)?;
        match token {
            Token::NHB => account.balance_nhb = account.balance_nhb + receipt.amount,
            Token::ZNHB => account.balance_znhb = account.balance_znhb + receipt.amount,
        }
        self.state.put_account(&recipient, &account)?;
        self.state.put_record(receipt_key, tx_hash.to_vec());

        self.state.emit(
            Event::new(names::SWAP_PAYOUT_SETTLED)
                .attr("receipt", receipt.receipt_id.clone())
                .attr("recipient", address_hex(&recipient))
                .attr("token", token.symbol())
                .attr("amount", receipt.amount.to_string()),
        );
        Ok(())
    }

    // =========================================================================
    // QUERIES (served against immutable views)
    // =========================================================================

    /// Committed-state view of an account.
    pub fn account(&self, address: &Address) -> Result<Account, CoreError> {
        Ok(self.state.copy_committed().peek_account(address)?)
    }

    /// Deep copy of the current block's events.
    pub fn events(&self) -> Vec<Event> {
        self.state.events()
    }

    /// The POS finality stream handle.
    pub fn pos(&self) -> PosStream {
        self.pos.clone()
    }

    /// Retained epoch snapshots, oldest first.
    pub fn epoch_history(&self) -> Result<Vec<EpochSnapshot>, CoreError> {
        Ok(self.epoch.snapshot_history(&self.state)?)
    }

    pub fn committed_root(&self) -> Hash {
        self.state.committed_root()
    }

    pub fn pending_root(&self) -> Hash {
        self.state.pending_root()
    }

    /// Mutable staged-state handle for genesis seeding and tests.
    pub fn state_mut(&mut self) -> &mut StateBackend {
        &mut self.state
    }

    pub fn state(&self) -> &StateBackend {
        &self.state
    }
}

fn required(sender: Option<Address>) -> Result<Address, CoreError> {
    sender.ok_or(nhb_tx::TxError::SignatureMissing.into())
}

/// Module a transaction type belongs to, for pause and quota gating.
pub fn module_of(tx_type: TxType) -> &'static str {
    match tx_type {
        TxType::TransferNhb | TxType::TransferZnhb => "transfer",
        TxType::RegisterIdentity => "identity",
        TxType::Stake | TxType::Unstake | TxType::StakeClaim | TxType::ClaimRewards => "staking",
        TxType::Heartbeat => "heartbeat",
        TxType::Mint => "mint",
        TxType::SwapPayoutReceipt => "swap",
        TxType::EscrowOpen
        | TxType::EscrowAccept
        | TxType::EscrowRelease
        | TxType::EscrowRefund
        | TxType::EscrowDispute
        | TxType::EscrowArbitrate
        | TxType::EscrowCreate
        | TxType::EscrowFund
        | TxType::EscrowExpire => "escrow",
        TxType::TradeCreate | TxType::TradeSettle => "trade",
    }
}

fn pause_event_name(module: &str) -> String {
    match module {
        "staking" => names::STAKE_PAUSED.to_string(),
        other => format!("{other}.paused"),
    }
}
