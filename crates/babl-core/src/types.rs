//! Core protocol types: addresses, strategy state, reward vectors.
//!
//! Amounts and percentages are wad-scaled `u128` (see [`crate::constants::WAD`]).
//! Timestamps are Unix seconds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte account or contract identifier.
///
/// Contributors are identified by the BLAKE3 hash of their Ed25519 public key
/// (see [`crate::crypto::PublicKey::address`]); gardens, strategies and assets
/// use arbitrary ids. Serialized as a 64-character hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The zero address. Used as "no strategy" in supply-only mining checks.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::str::FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim_start_matches("0x"), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle snapshot of a strategy, as reported by the strategy itself.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StrategyState {
    pub active: bool,
    pub data_set: bool,
    pub finalized: bool,
    /// Time capital was first deployed. Zero if never executed.
    pub executed_at: u64,
    /// Time the strategy exited. Zero while running.
    pub exited_at: u64,
    pub updated_at: u64,
}

impl StrategyState {
    /// End of the strategy's active window as seen at `now`.
    pub fn window_end(&self, now: u64) -> u64 {
        if self.exited_at > 0 { self.exited_at } else { now }
    }
}

/// How realized profit (in the garden's reserve asset) is shared between roles.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfitSharing {
    pub strategist: u128,
    pub steward: u128,
    pub lp: u128,
}

/// NFT stake attributes for a contributor in a garden.
///
/// Each percentage is an additional multiplier on that role's reward
/// (`0.1e18` = +10%).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StakedBonus {
    pub strategist: u128,
    pub steward: u128,
    pub lp: u128,
    pub creator: u128,
    pub staked_at: u64,
}

/// The per-contributor reward vector for one or more strategies.
///
/// BABL components are in reward-token units, profit components in the
/// garden's reserve asset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RewardsSplit {
    pub strategist_babl: u128,
    pub strategist_profit: u128,
    pub steward_babl: u128,
    pub steward_profit: u128,
    pub lp_babl: u128,
    pub lp_profit: u128,
    pub creator_bonus: u128,
    pub total_babl: u128,
}

impl RewardsSplit {
    /// Sum of all profit components.
    pub fn total_profit(&self) -> u128 {
        self.strategist_profit
            .saturating_add(self.steward_profit)
            .saturating_add(self.lp_profit)
    }

    pub fn is_zero(&self) -> bool {
        self.total_babl == 0 && self.total_profit() == 0
    }

    /// Recompute `total_babl` from the role components.
    pub fn with_total(mut self) -> Self {
        self.total_babl = self
            .strategist_babl
            .saturating_add(self.steward_babl)
            .saturating_add(self.lp_babl)
            .saturating_add(self.creator_bonus);
        self
    }

    /// Component-wise saturating sum.
    pub fn accumulate(&mut self, other: &RewardsSplit) {
        self.strategist_babl = self.strategist_babl.saturating_add(other.strategist_babl);
        self.strategist_profit = self.strategist_profit.saturating_add(other.strategist_profit);
        self.steward_babl = self.steward_babl.saturating_add(other.steward_babl);
        self.steward_profit = self.steward_profit.saturating_add(other.steward_profit);
        self.lp_babl = self.lp_babl.saturating_add(other.lp_babl);
        self.lp_profit = self.lp_profit.saturating_add(other.lp_profit);
        self.creator_bonus = self.creator_bonus.saturating_add(other.creator_bonus);
        self.total_babl = self.total_babl.saturating_add(other.total_babl);
    }
}
