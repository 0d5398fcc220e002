//! # Account Model
//!
//! Dual-balance accounts with stake, locked stake, an unbonding queue,
//! reward-accrual state, engagement counters, and identity.
//!
//! ## Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | ZNHB conservation across stake paths | `nhb-stake` engine |
//! | INVARIANT-2 | `locked_znhb == 0 ⇒ delegated_validator == None` | `clear_delegation_if_unlocked` |
//! | INVARIANT-3 | eligibility tracks `stake >= MINIMUM_STAKE` | backend write path |
//! | INVARIANT-4 | username index bijection | backend write path |
//! | INVARIANT-5 | unbond ids unique and strictly increasing | `push_unbond` |

use nhb_types::{Address, Hash, EMPTY_CODE_HASH, EMPTY_STORAGE_ROOT};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// A queued undelegation awaiting its release time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unbond {
    /// Per-account monotonic identifier; never zero once assigned.
    pub id: u64,
    /// Validator the stake was delegated to.
    pub validator: Address,
    /// Amount in ZNHB wei.
    pub amount: U256,
    /// Unix time at which `claim` becomes possible.
    pub release_time: u64,
}

/// Day-bucketed engagement counters with an EMA score.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMeta {
    /// UTC day (`YYYY-MM-DD`) the raw counters belong to.
    pub day: String,
    /// Heartbeat minutes accrued today.
    pub minutes: u64,
    /// Transactions sent today.
    pub tx_count: u64,
    /// Escrow interactions today.
    pub escrow_count: u64,
    /// Governance interactions today.
    pub gov_count: u64,
    /// Exponential moving average over daily activity.
    pub score: u64,
    /// Timestamp of the last accepted heartbeat.
    pub last_heartbeat: u64,
}

/// A ledger account: state record + metadata record, handled as one value.
///
/// Engines operate on locally owned `Account` values obtained from
/// `get_account` and persist them with `put_account`; there is no shared
/// mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    // --- state record ---
    /// NHB balance in wei.
    pub balance_nhb: U256,
    /// ZNHB balance in wei.
    pub balance_znhb: U256,
    /// Transaction nonce; increments by exactly one per accepted transaction.
    pub nonce: u64,
    /// Contract storage root; canonical empty constant when absent.
    pub storage_root: Hash,
    /// Contract code hash; canonical empty constant when absent.
    pub code_hash: Hash,

    // --- metadata record ---
    /// Validator stake credited by delegators (self included).
    pub stake: U256,
    /// ZNHB locked behind a delegation.
    pub locked_znhb: U256,
    /// Globally unique username, empty when unset.
    pub username: String,
    /// Target of the active delegation; set iff `locked_znhb > 0`.
    pub delegated_validator: Option<Address>,
    /// Pending undelegations ordered by creation.
    pub pending_unbonds: Vec<Unbond>,
    /// Next unbond id to assign; starts at 1.
    pub next_unbonding_id: u64,
    /// Reward-accrual shares (seeded at first delegation).
    pub stake_shares: U256,
    /// Global reward index at the last payout.
    pub stake_last_index: U256,
    /// Timestamp of the last reward payout.
    pub stake_last_payout_ts: u64,
    /// Engagement counters.
    pub engagement: EngagementMeta,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            balance_nhb: U256::zero(),
            balance_znhb: U256::zero(),
            nonce: 0,
            storage_root: EMPTY_STORAGE_ROOT,
            code_hash: EMPTY_CODE_HASH,
            stake: U256::zero(),
            locked_znhb: U256::zero(),
            username: String::new(),
            delegated_validator: None,
            pending_unbonds: Vec::new(),
            next_unbonding_id: 1,
            stake_shares: U256::zero(),
            stake_last_index: U256::zero(),
            stake_last_payout_ts: 0,
            engagement: EngagementMeta::default(),
        }
    }
}

impl Account {
    /// Append a pending unbond, assigning the next monotonic id.
    pub fn push_unbond(&mut self, validator: Address, amount: U256, release_time: u64) -> u64 {
        let id = self.next_unbonding_id;
        self.next_unbonding_id += 1;
        self.pending_unbonds.push(Unbond {
            id,
            validator,
            amount,
            release_time,
        });
        id
    }

    /// Remove and return a pending unbond by id.
    pub fn take_unbond(&mut self, id: u64) -> Option<Unbond> {
        let position = self.pending_unbonds.iter().position(|u| u.id == id)?;
        Some(self.pending_unbonds.remove(position))
    }

    /// INVARIANT-2: drop the delegation pointer once nothing is locked.
    pub fn clear_delegation_if_unlocked(&mut self) {
        if self.locked_znhb.is_zero() {
            self.delegated_validator = None;
        }
    }

    /// Total ZNHB attributable to this account across spendable, locked,
    /// and unbonding buckets. Conserved across stake paths (rewards aside).
    pub fn znhb_total(&self) -> U256 {
        let pending: U256 = self
            .pending_unbonds
            .iter()
            .fold(U256::zero(), |acc, u| acc + u.amount);
        self.balance_znhb + self.locked_znhb + pending
    }
}

/// Username constraints: 3-20 characters, alphanumeric plus `_` and `-`.
pub fn valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (3..=20).contains(&len)
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbond_ids_are_monotonic_and_never_reused() {
        let mut account = Account::default();
        let a = account.push_unbond([1u8; 20], U256::from(10), 100);
        let b = account.push_unbond([1u8; 20], U256::from(20), 200);
        assert_eq!((a, b), (1, 2));

        account.take_unbond(a).unwrap();
        let c = account.push_unbond([1u8; 20], U256::from(30), 300);
        assert_eq!(c, 3);
    }

    #[test]
    fn take_unknown_unbond_is_none() {
        let mut account = Account::default();
        assert!(account.take_unbond(7).is_none());
    }

    #[test]
    fn delegation_cleared_only_when_unlocked() {
        let mut account = Account {
            locked_znhb: U256::from(5),
            delegated_validator: Some([2u8; 20]),
            ..Default::default()
        };
        account.clear_delegation_if_unlocked();
        assert!(account.delegated_validator.is_some());

        account.locked_znhb = U256::zero();
        account.clear_delegation_if_unlocked();
        assert!(account.delegated_validator.is_none());
    }

    #[test]
    fn znhb_total_sums_all_buckets() {
        let mut account = Account {
            balance_znhb: U256::from(100),
            locked_znhb: U256::from(50),
            ..Default::default()
        };
        account.push_unbond([1u8; 20], U256::from(25), 10);
        assert_eq!(account.znhb_total(), U256::from(175));
    }

    #[test]
    fn username_rules() {
        assert!(valid_username("ab-c"));
        assert!(valid_username("user_20_chars_xxxxxx"));
        assert!(!valid_username("ab"));
        assert!(!valid_username("this-name-is-way-too-long"));
        assert!(!valid_username("bad name"));
    }
}
