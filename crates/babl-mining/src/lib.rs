//! # babl-mining: time-weighted mining ledgers and the BABL reward formula.
//!
//! All calculations use integer fixed-point arithmetic for determinism.
//!
//! - **Power ledgers**: append-only principal checkpoints with exact
//!   principal × time integrals, protocol-wide and per strategy, split at
//!   quarter boundaries.
//! - **Contributor shares**: per-garden balance checkpoints with a strict
//!   "before this timestamp" lookup that defeats same-block flash deposits.
//! - **Reward formula**: per-quarter power ratios against the decaying supply,
//!   benchmark multipliers on the profit ratio, and the role split.

pub mod calculator;
pub mod engine;
pub mod ledger;
pub mod protocol;
pub mod shares;
pub mod strategy;

pub use calculator::{
    baseline_reward, estimate_strategy_rewards, final_reward, nft_overlap, slippage_discount, split_rewards,
    strategy_rewards, voting_power, Baseline, ContributorPowers, QuarterReward, RewardBasis, StrategyOutcome,
};
pub use engine::MiningEngine;
pub use ledger::{Checkpoint, PowerLedger, QuarterClock, QuarterRecord};
pub use protocol::{CapitalChange, ProtocolCheckpoint, ProtocolLedger, QuarterView};
pub use shares::{BalanceCheckpoint, ContributorShareLedger, ShareChange};
pub use strategy::{MiningSnapshot, StrategyMiningLedger, StrategyMiningRecord};
