//! # Escrow Engine
//!
//! Lifecycle transitions with strict party checks. Funds are debited into
//! the record at funding time and credited out on the terminal transition,
//! so a record in a held status always accounts for exactly its amount.

use crate::errors::EscrowError;
use crate::types::{EscrowKind, EscrowRecord, EscrowStatus, TradeRecord};
use nhb_state::StateAccess;
use nhb_types::events::names;
use nhb_types::{address_hex, hash_hex, Address, Event, Hash, Token};
use primitive_types::U256;
use tracing::debug;

/// How an arbitrator resolves a disputed legacy escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArbitrationOutcome {
    Release,
    Refund,
}

/// Escrow engine configuration.
#[derive(Clone, Debug, Default)]
pub struct EscrowConfig {
    /// The only address allowed to arbitrate disputes.
    pub arbitrator: Address,
}

/// Escrow and trade engine.
pub struct EscrowEngine {
    config: EscrowConfig,
}

impl EscrowEngine {
    pub fn new(config: EscrowConfig) -> Self {
        Self { config }
    }

    // =========================================================================
    // RECORD ACCESS (legacy migration on first touch)
    // =========================================================================

    fn load<S: StateAccess>(state: &mut S, id: &Hash) -> Result<EscrowRecord, EscrowError> {
        let key = EscrowRecord::key(id);
        let bytes = state.get_record(&key).ok_or(EscrowError::NotFound)?;
        let (record, needs_migration) =
            EscrowRecord::decode(&bytes).map_err(nhb_state::StateError::from)?;
        if needs_migration {
            state.put_record(key, record.encode());
            debug!(id = %hash_hex(id), "migrated legacy escrow record");
        }
        Ok(record)
    }

    fn store<S: StateAccess>(state: &mut S, id: &Hash, record: &EscrowRecord) {
        state.put_record(EscrowRecord::key(id), record.encode());
    }

    // =========================================================================
    // FUND MOVEMENT
    // =========================================================================

    fn debit<S: StateAccess>(
        state: &mut S,
        party: &Address,
        token: Token,
        amount: U256,
    ) -> Result<(), EscrowError> {
        let mut account = state.get_account(party)?;
        let balance = match token {
            Token::NHB => &mut account.balance_nhb,
            Token::ZNHB => &mut account.balance_znhb,
        };
        if *balance < amount {
            return Err(EscrowError::InsufficientBalance);
        }
        *balance = *balance - amount;
        state.put_account(party, &account)?;
        Ok(())
    }

    fn credit<S: StateAccess>(
        state: &mut S,
        party: &Address,
        token: Token,
        amount: U256,
    ) -> Result<(), EscrowError> {
        let mut account = state.get_account(party)?;
        match token {
            Token::NHB => account.balance_nhb = account.balance_nhb + amount,
            Token::ZNHB => account.balance_znhb = account.balance_znhb + amount,
        }
        state.put_account(party, &account)?;
        Ok(())
    }

    // =========================================================================
    // LEGACY LIFECYCLE
    // =========================================================================

    /// Legacy open: the buyer creates and funds in one step.
    pub fn legacy_open<S: StateAccess>(
        &self,
        state: &mut S,
        id: &Hash,
        buyer: &Address,
        seller: &Address,
        token: Token,
        amount: U256,
        now: u64,
    ) -> Result<(), EscrowError> {
        if amount.is_zero() {
            return Err(EscrowError::NonPositiveAmount);
        }
        if state.get_record(&EscrowRecord::key(id)).is_some() {
            return Err(EscrowError::AlreadyExists);
        }
        Self::debit(state, buyer, token, amount)?;
        let record = EscrowRecord {
            kind: EscrowKind::Legacy,
            buyer: *buyer,
            seller: *seller,
            token,
            amount,
            status: EscrowStatus::Init,
            deadline: 0,
            created_at: now,
        };
        Self::store(state, id, &record);
        state.emit(
            Event::new(names::ESCROW_CREATED)
                .attr("id", hash_hex(id))
                .attr("buyer", address_hex(buyer))
                .attr("seller", address_hex(seller))
                .attr("amount", amount.to_string()),
        );
        Ok(())
    }

    /// Legacy accept: the seller moves the escrow to InProgress.
    pub fn legacy_accept<S: StateAccess>(
        &self,
        state: &mut S,
        id: &Hash,
        caller: &Address,
    ) -> Result<(), EscrowError> {
        let mut record = Self::load(state, id)?;
        if record.kind != EscrowKind::Legacy || record.status != EscrowStatus::Init {
            return Err(EscrowError::InvalidStatus);
        }
        if caller != &record.seller {
            return Err(EscrowError::Unauthorized);
        }
        record.status = EscrowStatus::InProgress;
        Self::store(state, id, &record);
        Ok(())
    }

    /// Legacy dispute: buyer-only, from InProgress.
    pub fn dispute<S: StateAccess>(
        &self,
        state: &mut S,
        id: &Hash,
        caller: &Address,
    ) -> Result<(), EscrowError> {
        let mut record = Self::load(state, id)?;
        if record.kind != EscrowKind::Legacy || record.status != EscrowStatus::InProgress {
            return Err(EscrowError::InvalidStatus);
        }
        if caller != &record.buyer {
            return Err(EscrowError::Unauthorized);
        }
        record.status = EscrowStatus::Disputed;
        Self::store(state, id, &record);
        state.emit(
            Event::new(names::ESCROW_DISPUTED)
                .attr("id", hash_hex(id))
                .attr("buyer", address_hex(caller)),
        );
        Ok(())
    }

    /// Arbitrate a disputed legacy escrow; configured arbitrator only.
    pub fn arbitrate<S: StateAccess>(
        &self,
        state: &mut S,
        id: &Hash,
        caller: &Address,
        outcome: ArbitrationOutcome,
    ) -> Result<(), EscrowError> {
        if caller != &self.config.arbitrator {
            return Err(EscrowError::Unauthorized);
        }
        let mut record = Self::load(state, id)?;
        if record.status != EscrowStatus::Disputed {
            return Err(EscrowError::InvalidStatus);
        }
        match outcome {
            ArbitrationOutcome::Release => {
                Self::credit(state, &record.seller, record.token, record.amount)?;
                record.status = EscrowStatus::Released;
                Self::store(state, id, &record);
                state.emit(
                    Event::new(names::ESCROW_RELEASED)
                        .attr("id", hash_hex(id))
                        .attr("arbitrated", "true"),
                );
            }
            ArbitrationOutcome::Refund => {
                Self::credit(state, &record.buyer, record.token, record.amount)?;
                record.status = EscrowStatus::Refunded;
                Self::store(state, id, &record);
                state.emit(
                    Event::new(names::ESCROW_REFUNDED)
                        .attr("id", hash_hex(id))
                        .attr("arbitrated", "true"),
                );
            }
        }
        Ok(())
    }

    // =========================================================================
    // SHARED TERMINAL TRANSITIONS
    // =========================================================================

    /// Release to the seller: buyer-only. Legacy escrows release from
    /// InProgress, modern from Funded.
    pub fn release<S: StateAccess>(
        &self,
        state: &mut S,
        id: &Hash,
        caller: &Address,
    ) -> Result<(), EscrowError> {
        let mut record = Self::load(state, id)?;
        let releasable = match record.kind {
            EscrowKind::Legacy => record.status == EscrowStatus::InProgress,
            EscrowKind::Modern => record.status == EscrowStatus::Funded,
        };
        if !releasable {
            return Err(EscrowError::InvalidStatus);
        }
        if caller != &record.buyer {
            return Err(EscrowError::Unauthorized);
        }
        Self::credit(state, &record.seller, record.token, record.amount)?;
        record.status = EscrowStatus::Released;
        Self::store(state, id, &record);
        state.emit(
            Event::new(names::ESCROW_RELEASED)
                .attr("id", hash_hex(id))
                .attr("seller", address_hex(&record.seller))
                .attr("amount", record.amount.to_string()),
        );
        Ok(())
    }

    /// Refund to the buyer: seller-only, from the held status.
    pub fn refund<S: StateAccess>(
        &self,
        state: &mut S,
        id: &Hash,
        caller: &Address,
    ) -> Result<(), EscrowError> {
        let mut record = Self::load(state, id)?;
        let refundable = match record.kind {
            EscrowKind::Legacy => record.status == EscrowStatus::InProgress,
            EscrowKind::Modern => record.status == EscrowStatus::Funded,
        };
        if !refundable {
            return Err(EscrowError::InvalidStatus);
        }
        if caller != &record.seller {
            return Err(EscrowError::Unauthorized);
        }
        Self::credit(state, &record.buyer, record.token, record.amount)?;
        record.status = EscrowStatus::Refunded;
        Self::store(state, id, &record);
        state.emit(
            Event::new(names::ESCROW_REFUNDED)
                .attr("id", hash_hex(id))
                .attr("buyer", address_hex(&record.buyer))
                .attr("amount", record.amount.to_string()),
        );
        Ok(())
    }

    // =========================================================================
    // MODERN LIFECYCLE
    // =========================================================================

    /// Modern create: record only, no funds yet.
    pub fn create<S: StateAccess>(
        &self,
        state: &mut S,
        id: &Hash,
        buyer: &Address,
        seller: &Address,
        token: Token,
        amount: U256,
        deadline: u64,
        now: u64,
    ) -> Result<(), EscrowError> {
        if amount.is_zero() {
            return Err(EscrowError::NonPositiveAmount);
        }
        if state.get_record(&EscrowRecord::key(id)).is_some() {
            return Err(EscrowError::AlreadyExists);
        }
        let record = EscrowRecord {
            kind: EscrowKind::Modern,
            buyer: *buyer,
            seller: *seller,
            token,
            amount,
            status: EscrowStatus::Init,
            deadline,
            created_at: now,
        };
        Self::store(state, id, &record);
        state.emit(
            Event::new(names::ESCROW_CREATED)
                .attr("id", hash_hex(id))
                .attr("buyer", address_hex(buyer))
                .attr("seller", address_hex(seller))
                .attr("amount", amount.to_string()),
        );
        Ok(())
    }

    /// Modern fund: buyer-only, Init → Funded.
    pub fn fund<S: StateAccess>(
        &self,
        state: &mut S,
        id: &Hash,
        caller: &Address,
    ) -> Result<(), EscrowError> {
        let mut record = Self::load(state, id)?;
        if record.kind != EscrowKind::Modern || record.status != EscrowStatus::Init {
            return Err(EscrowError::InvalidStatus);
        }
        if caller != &record.buyer {
            return Err(EscrowError::Unauthorized);
        }
        Self::debit(state, caller, record.token, record.amount)?;
        record.status = EscrowStatus::Funded;
        Self::store(state, id, &record);
        Ok(())
    }

    /// Modern expire: anyone, after the deadline, Funded → Expired with
    /// funds back to the buyer.
    pub fn expire<S: StateAccess>(
        &self,
        state: &mut S,
        id: &Hash,
        now: u64,
    ) -> Result<(), EscrowError> {
        let mut record = Self::load(state, id)?;
        if record.kind != EscrowKind::Modern || record.status != EscrowStatus::Funded {
            return Err(EscrowError::InvalidStatus);
        }
        if now <= record.deadline {
            return Err(EscrowError::NotExpired);
        }
        Self::credit(state, &record.buyer, record.token, record.amount)?;
        record.status = EscrowStatus::Expired;
        Self::store(state, id, &record);
        state.emit(
            Event::new(names::ESCROW_EXPIRED)
                .attr("id", hash_hex(id))
                .attr("amount", record.amount.to_string()),
        );
        Ok(())
    }

    // =========================================================================
    // TRADE ENGINE
    // =========================================================================

    /// Tie two funded escrows into an atomic trade.
    pub fn trade_create<S: StateAccess>(
        &self,
        state: &mut S,
        trade_id: &Hash,
        leg_a: &Hash,
        leg_b: &Hash,
    ) -> Result<(), EscrowError> {
        if state.get_record(&TradeRecord::key(trade_id)).is_some() {
            return Err(EscrowError::AlreadyExists);
        }
        for leg in [leg_a, leg_b] {
            let record = Self::load(state, leg)?;
            if record.status != EscrowStatus::Funded {
                return Err(EscrowError::TradeLegNotFunded);
            }
        }
        let trade = TradeRecord {
            leg_a: *leg_a,
            leg_b: *leg_b,
            settled: false,
        };
        state.put_record(TradeRecord::key(trade_id), trade.encode());
        Ok(())
    }

    /// Release both legs or neither. Every check runs before the first
    /// write, so a failing leg aborts with no partial settlement.
    pub fn settle_atomic<S: StateAccess>(
        &self,
        state: &mut S,
        trade_id: &Hash,
    ) -> Result<(), EscrowError> {
        let trade_key = TradeRecord::key(trade_id);
        let bytes = state.get_record(&trade_key).ok_or(EscrowError::TradeNotFound)?;
        let mut trade = TradeRecord::decode(&bytes).map_err(nhb_state::StateError::from)?;
        if trade.settled {
            return Err(EscrowError::TradeSettled);
        }

        let leg_a = Self::load(state, &trade.leg_a)?;
        let leg_b = Self::load(state, &trade.leg_b)?;
        if leg_a.status != EscrowStatus::Funded || leg_b.status != EscrowStatus::Funded {
            return Err(EscrowError::TradeLegNotFunded);
        }

        for (id, mut record) in [(trade.leg_a, leg_a), (trade.leg_b, leg_b)] {
            Self::credit(state, &record.seller, record.token, record.amount)?;
            record.status = EscrowStatus::Released;
            Self::store(state, &id, &record);
            state.emit(
                Event::new(names::ESCROW_RELEASED)
                    .attr("id", hash_hex(&id))
                    .attr("trade", hash_hex(trade_id))
                    .attr("amount", record.amount.to_string()),
            );
        }

        trade.settled = true;
        state.put_record(trade_key, trade.encode());
        state.emit(Event::new(names::TRADE_SETTLED).attr("id", hash_hex(trade_id)));
        Ok(())
    }

    /// Read an escrow without staging a migration.
    pub fn peek<S: StateAccess>(state: &S, id: &Hash) -> Result<EscrowRecord, EscrowError> {
        let bytes = state
            .get_record(&EscrowRecord::key(id))
            .ok_or(EscrowError::NotFound)?;
        let (record, _) = EscrowRecord::decode(&bytes).map_err(nhb_state::StateError::from)?;
        Ok(record)
    }
}
