//! # Core Configuration
//!
//! The processor's configuration aggregates the engine configs plus the
//! dispatcher-level policy surfaces: the pause view, quota limits, merchant
//! fee policies, heartbeat constraints, and the module-attestation
//! authorities.

use nhb_epoch::EpochConfig;
use nhb_escrow::EscrowConfig;
use nhb_loyalty::LoyaltyConfig;
use nhb_sponsor::SponsorConfig;
use nhb_stake::StakeConfig;
use nhb_types::Address;
use primitive_types::U256;
use std::collections::{BTreeMap, BTreeSet};

/// Which party a merchant fee is debited from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeePayer {
    Sender,
    Recipient,
}

/// Merchant-domain fee policy.
#[derive(Clone, Debug)]
pub struct FeePolicy {
    /// Fee rate in basis points of the transferred value.
    pub fee_bps: u64,
    /// Party the fee is debited from.
    pub fee_payer: FeePayer,
    /// Wallet credited with routed fees.
    pub owner_wallet: Address,
}

/// Per-module quota limits; zero means unlimited.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuotaLimits {
    /// Requests per sender per epoch.
    pub max_requests_per_epoch: u64,
    /// NHB value per sender per epoch.
    pub max_nhb_per_epoch: U256,
}

/// Module pause switches consulted before dispatch.
#[derive(Clone, Debug, Default)]
pub struct PauseView {
    paused: BTreeSet<String>,
}

impl PauseView {
    pub fn pause(&mut self, module: &str) {
        self.paused.insert(module.to_string());
    }

    pub fn resume(&mut self, module: &str) {
        self.paused.remove(module);
    }

    pub fn is_paused(&self, module: &str) -> bool {
        self.paused.contains(module)
    }
}

/// Heartbeat acceptance constraints.
#[derive(Clone, Debug)]
pub struct HeartbeatConfig {
    /// Minimum seconds between heartbeats per device.
    pub min_interval_secs: u64,
    /// Engagement minutes creditable per heartbeat.
    pub max_minutes_per_heartbeat: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 60,
            max_minutes_per_heartbeat: 60,
        }
    }
}

/// Full processor configuration.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    pub stake: StakeConfig,
    pub epoch: EpochConfig,
    pub loyalty: LoyaltyConfig,
    pub sponsor: SponsorConfig,
    pub escrow: EscrowConfig,
    pub heartbeat: HeartbeatConfig,
    /// Authority allowed to sign mint vouchers.
    pub mint_authority: Address,
    /// Authority allowed to sign swap payout receipts.
    pub swap_authority: Address,
    /// Merchant fee policies keyed by merchant address.
    pub fee_policies: BTreeMap<Address, FeePolicy>,
    /// Quota limits keyed by module name.
    pub quota_limits: BTreeMap<String, QuotaLimits>,
    /// Module pause switches.
    pub pause: PauseView,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            stake: StakeConfig::default(),
            epoch: EpochConfig::default(),
            loyalty: LoyaltyConfig::default(),
            sponsor: SponsorConfig::default(),
            escrow: EscrowConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            mint_authority: [0u8; 20],
            swap_authority: [0u8; 20],
            fee_policies: BTreeMap::new(),
            quota_limits: BTreeMap::new(),
            pause: PauseView::default(),
        }
    }
}
