//! Scenario files and their replay.
//!
//! A scenario declares gardens, strategies and oracle prices, then lists the
//! ordered protocol events. Strategy doubles follow the events: allocations
//! execute them and finalization exits them with the declared `returned`
//! amount, setting any profit aside in the garden.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use babl_core::config::EngineConfig;
use babl_core::memory::{FixedPriceOracle, MemoryGarden, MemoryNftRegistry, MemoryRewardToken, MemoryStrategy};
use babl_core::traits::Strategy;
use babl_core::types::{Address, ProfitSharing, RewardsSplit, StakedBonus};
use babl_distributor::{Collaborators, ProtocolEvent, RewardsDistributor};
use babl_mining::ProtocolCheckpoint;

#[derive(Deserialize, Debug, Clone)]
pub struct GardenSpec {
    pub id: Address,
    pub creator: Address,
    /// Defaults to the engine's reference asset.
    #[serde(default)]
    pub reserve_asset: Option<Address>,
    #[serde(default)]
    pub profit_sharing: Option<ProfitSharing>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StrategySpec {
    pub id: Address,
    pub garden: Address,
    pub strategist: Address,
    pub duration: u64,
    /// Capital handed back at finalization.
    #[serde(default)]
    pub returned: Option<u128>,
    /// Net asset value for estimates of a running strategy.
    #[serde(default)]
    pub nav: Option<u128>,
    #[serde(default)]
    pub max_trade_slippage: Option<u128>,
    /// Signed vote weight per voter.
    #[serde(default)]
    pub votes: BTreeMap<Address, i128>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct PriceSpec {
    pub asset_in: Address,
    pub asset_out: Address,
    pub price: u128,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct StakeSpec {
    pub contributor: Address,
    pub garden: Address,
    pub bonus: StakedBonus,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct ContributorRef {
    pub garden: Address,
    pub contributor: Address,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ReportSpec {
    /// Defaults to the last event's timestamp.
    #[serde(default)]
    pub at: Option<u64>,
    #[serde(default)]
    pub contributors: Vec<ContributorRef>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Scenario {
    #[serde(default)]
    pub gardens: Vec<GardenSpec>,
    #[serde(default)]
    pub strategies: Vec<StrategySpec>,
    #[serde(default)]
    pub prices: Vec<PriceSpec>,
    #[serde(default)]
    pub nft_stakes: Vec<StakeSpec>,
    #[serde(default)]
    pub events: Vec<ProtocolEvent>,
    #[serde(default)]
    pub report: ReportSpec,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("malformed scenario {}", path.display()))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StrategyReport {
    pub id: Address,
    pub garden: Address,
    pub settled: bool,
    /// Settled reward, or the running estimate.
    pub reward: u128,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ContributorReport {
    pub garden: Address,
    pub contributor: Address,
    pub balance: u128,
    pub nonce: u64,
    pub pending: Option<RewardsSplit>,
    /// Why `pending` could not be computed.
    pub error: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub at: u64,
    pub events: usize,
    pub protocol: ProtocolCheckpoint,
    pub minted: u128,
    pub strategies: Vec<StrategyReport>,
    pub contributors: Vec<ContributorReport>,
}

/// Replay `scenario` against a fresh distributor and report at the end.
pub fn replay(engine: EngineConfig, scenario: &Scenario) -> Result<Report> {
    let token = Arc::new(MemoryRewardToken::new());
    let oracle = Arc::new(FixedPriceOracle::new());
    let nft = Arc::new(MemoryNftRegistry::new());
    let reference = engine.reference_asset;

    for p in &scenario.prices {
        oracle.set_price(p.asset_in, p.asset_out, p.price);
    }
    for s in &scenario.nft_stakes {
        nft.stake(s.contributor, s.garden, s.bonus);
    }

    let mut dist = RewardsDistributor::new(
        engine,
        Collaborators { oracle: oracle.clone(), token: token.clone(), nft: nft.clone() },
    )
    .context("failed to build distributor")?;

    let mut gardens = HashMap::new();
    for g in &scenario.gardens {
        let mut garden = MemoryGarden::new(g.id, g.creator, g.reserve_asset.unwrap_or(reference));
        if let Some(sharing) = g.profit_sharing {
            garden = garden.with_profit_sharing(sharing);
        }
        let garden = Arc::new(garden);
        dist.register_garden(garden.clone());
        gardens.insert(g.id, garden);
    }

    let mut strategies = HashMap::new();
    for s in &scenario.strategies {
        let strategy = Arc::new(MemoryStrategy::new(s.id, s.garden, s.strategist, s.duration));
        if let Some(slippage) = s.max_trade_slippage {
            strategy.set_max_trade_slippage(slippage);
        }
        for (voter, weight) in &s.votes {
            strategy.vote(*voter, *weight);
        }
        dist.register_strategy(strategy.clone())
            .with_context(|| format!("cannot register strategy {}", s.id))?;
        strategies.insert(s.id, (strategy, s));
    }

    let mut last = 0u64;
    for (i, event) in scenario.events.iter().enumerate() {
        let ts = event.timestamp();
        if ts < last {
            bail!("event {i} ({}) at {ts} is earlier than the previous event at {last}", event.kind());
        }
        last = ts;

        match *event {
            ProtocolEvent::CapitalAllocated { strategy, timestamp, amount } => {
                let (double, _) = strategies
                    .get(&strategy)
                    .ok_or_else(|| anyhow!("event {i}: unknown strategy {strategy}"))?;
                double.execute(timestamp, amount);
            }
            ProtocolEvent::StrategyFinalized { strategy, timestamp } => {
                let (double, s) = strategies
                    .get(&strategy)
                    .ok_or_else(|| anyhow!("event {i}: unknown strategy {strategy}"))?;
                let returned = s
                    .returned
                    .ok_or_else(|| anyhow!("strategy {strategy} is finalized but declares no `returned`"))?;
                let profit = returned.saturating_sub(double.capital_allocated());
                double.exit(timestamp, returned);
                if let Some(garden) = gardens.get(&s.garden) {
                    garden.set_aside(profit);
                }
            }
            _ => {}
        }

        dist.apply(*event)
            .with_context(|| format!("event {i} ({}) at {ts} rejected", event.kind()))?;
        debug!(index = i, kind = event.kind(), timestamp = ts, "applied");
    }

    // Running strategies are estimated at their declared NAV.
    for (double, s) in strategies.values() {
        if let Some(nav) = s.nav {
            if dist.settled(&s.id).is_none() {
                double.set_nav(nav);
            }
        }
    }

    let at = scenario.report.at.unwrap_or(last);
    let mut strategy_reports = Vec::with_capacity(scenario.strategies.len());
    for s in &scenario.strategies {
        let report = match dist.settled(&s.id) {
            Some(settled) => StrategyReport { id: s.id, garden: s.garden, settled: true, reward: settled.reward },
            None => StrategyReport {
                id: s.id,
                garden: s.garden,
                settled: false,
                reward: dist.estimate_strategy_rewards(&s.id, at)?,
            },
        };
        strategy_reports.push(report);
    }

    let mut contributors = Vec::with_capacity(scenario.report.contributors.len());
    for c in &scenario.report.contributors {
        let ids: Vec<Address> = scenario
            .strategies
            .iter()
            .filter(|s| s.garden == c.garden)
            .map(|s| s.id)
            .collect();
        let (pending, error) = match dist.get_rewards(&c.garden, &c.contributor, &ids) {
            Ok(split) => (Some(split), None),
            Err(e) => {
                warn!(garden = %c.garden.short(), contributor = %c.contributor.short(), "no rewards: {e}");
                (None, Some(e.to_string()))
            }
        };
        contributors.push(ContributorReport {
            garden: c.garden,
            contributor: c.contributor,
            balance: dist.get_current_balance(&c.garden, &c.contributor),
            nonce: dist.nonce(&c.garden, &c.contributor),
            pending,
            error,
        });
    }

    info!(events = scenario.events.len(), at, "replay complete");
    Ok(Report {
        at,
        events: scenario.events.len(),
        protocol: dist.check_protocol(at),
        minted: token.total_supply(),
        strategies: strategy_reports,
        contributors,
    })
}

impl Report {
    /// Human-readable rendering.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "at {} (quarter {}), {} events, protocol principal {}, power {}\n",
            self.at, self.protocol.quarter, self.events, self.protocol.principal, self.protocol.power
        ));
        for s in &self.strategies {
            let status = if s.settled { "settled" } else { "estimate" };
            out.push_str(&format!("strategy {} [{status}] {} BABL\n", s.id.short(), s.reward));
        }
        for c in &self.contributors {
            out.push_str(&format!(
                "contributor {} in {}: balance {} nonce {}",
                c.contributor.short(),
                c.garden.short(),
                c.balance,
                c.nonce
            ));
            match (&c.pending, &c.error) {
                (Some(p), _) => out.push_str(&format!(
                    " pending {} BABL {} profit\n",
                    p.total_babl,
                    p.total_profit()
                )),
                (None, Some(e)) => out.push_str(&format!(" ({e})\n")),
                (None, None) => out.push('\n'),
            }
        }
        out
    }
}
