//! # Ledger Events
//!
//! Per-block typed events: the sole observable side-channel of the core.
//! Attribute maps use `BTreeMap` so serialized events are byte-identical
//! across nodes regardless of insertion order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single ledger event appended during block execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stable event name, e.g. `transfer.native`.
    pub event_type: String,
    /// String-keyed attributes in sorted order.
    pub attributes: BTreeMap<String, String>,
}

impl Event {
    /// Start an event with the given type and no attributes.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder method to attach an attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Stable event names emitted by the core.
///
/// These strings are part of the external interface; RPC layers match on
/// them verbatim.
pub mod names {
    pub const TRANSFER_NATIVE: &str = "transfer.native";
    pub const STAKE_DELEGATED: &str = "stake.delegated";
    pub const STAKE_UNDELEGATED: &str = "stake.undelegated";
    pub const STAKE_CLAIMED: &str = "stake.claimed";
    pub const STAKE_REWARDS_CLAIMED: &str = "stake.rewards_claimed";
    pub const STAKE_PAUSED: &str = "stake.paused";
    pub const STAKE_EMISSION_CAP_HIT: &str = "stake.emission_cap_hit";
    pub const REWARDS_EPOCH_CLOSED: &str = "rewards.epoch_closed";
    pub const REWARDS_PAID: &str = "rewards.paid";
    pub const EPOCH_FINALIZED: &str = "epoch.finalized";
    pub const VALIDATORS_ROTATED: &str = "validators.rotated";
    pub const LOYALTY_REWARD_PROPOSED: &str = "loyalty.reward_proposed";
    pub const LOYALTY_BASE_ACCRUED: &str = "loyalty.base.accrued";
    pub const LOYALTY_PROGRAM_ACCRUED: &str = "loyalty.program.accrued";
    pub const LOYALTY_BUDGET_PRORATED: &str = "loyalty.budget_prorated";
    pub const POTSO_REWARD_EPOCH: &str = "potso.reward.epoch";
    pub const POTSO_REWARD_PAID: &str = "potso.reward.paid";
    pub const POTSO_REWARD_READY: &str = "potso.reward.ready";
    pub const PAYMASTER_THROTTLED: &str = "paymaster.throttled";
    pub const QUOTA_EXCEEDED: &str = "QuotaExceeded";
    pub const INTENT_CONSUMED: &str = "payments.intent_consumed";
    pub const IDENTITY_REGISTERED: &str = "identity.registered";
    pub const HEARTBEAT: &str = "engagement.heartbeat";
    pub const MINT_SETTLED: &str = "mint.settled";
    pub const SWAP_PAYOUT_SETTLED: &str = "swap.payout_settled";
    pub const ESCROW_CREATED: &str = "escrow.created";
    pub const ESCROW_RELEASED: &str = "escrow.released";
    pub const ESCROW_REFUNDED: &str = "escrow.refunded";
    pub const ESCROW_DISPUTED: &str = "escrow.disputed";
    pub const ESCROW_EXPIRED: &str = "escrow.expired";
    pub const TRADE_SETTLED: &str = "trade.settled";
    pub const FEE_ROUTED: &str = "fees.routed";
}
