//! The rewards distributor.
//!
//! [`RewardsDistributor`] owns the mining ledgers, the contributor share
//! ledger, the claim records and the governance store, and talks to the
//! outside world through the collaborator traits. It is a single-writer
//! state machine: mutations take `&mut self` and are applied in the order
//! the host delivers them. Wrap it in a lock to share across threads.
//!
//! Every mutating call validates all of its preconditions before it changes
//! anything, so an error leaves the distributor exactly as it was.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use babl_core::config::EngineConfig;
use babl_core::crypto::{ClaimAndStakeMessage, ClaimRewardsMessage, ClaimSignature};
use babl_core::error::{CollaboratorError, MathError, RewardsError};
use babl_core::math::wad_div;
use babl_core::params::MiningParameters;
use babl_core::traits::{Garden, NftBonusRegistry, PriceOracle, RewardToken, Strategy};
use babl_core::types::{Address, RewardsSplit};
use babl_mining::{
    estimate_strategy_rewards, nft_overlap, split_rewards, strategy_rewards, voting_power,
    ContributorPowers, ContributorShareLedger, MiningEngine, MiningSnapshot, ProtocolCheckpoint,
    QuarterClock, QuarterView, RewardBasis, ShareChange, StrategyOutcome,
};

use crate::claims::{ClaimProcessor, ClaimRecord};
use crate::event::{CallContext, ProtocolEvent};
use crate::governance::GovernanceParameterStore;

/// External services the distributor depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn PriceOracle>,
    pub token: Arc<dyn RewardToken>,
    pub nft: Arc<dyn NftBonusRegistry>,
}

/// A strategy's reward, frozen at finalization.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettledStrategy {
    pub reward: u128,
    pub outcome: StrategyOutcome,
    /// Parameters in force at finalization; role splits use these.
    pub params: MiningParameters,
}

/// Outcome of a successful claim.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub garden: Address,
    pub contributor: Address,
    pub strategies: Vec<Address>,
    /// BABL received by the contributor (or staked on their behalf).
    pub babl: u128,
    pub profit: u128,
    pub fee: u128,
    /// Garden shares minted by a claim-and-stake.
    pub staked_shares: u128,
    pub nonce: u64,
}

/// A distributor shared between threads.
pub type SharedDistributor = Arc<RwLock<RewardsDistributor>>;

pub struct RewardsDistributor {
    config: EngineConfig,
    governance: GovernanceParameterStore,
    engine: MiningEngine,
    shares: ContributorShareLedger,
    claims: ClaimProcessor,
    gardens: HashMap<Address, Arc<dyn Garden>>,
    strategies: HashMap<Address, Arc<dyn Strategy>>,
    settled: HashMap<Address, SettledStrategy>,
    collaborators: Collaborators,
}

impl RewardsDistributor {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, RewardsError> {
        config.validate()?;
        let governance = GovernanceParameterStore::new(
            config.governance,
            config.mining,
            config.keepers.iter().copied(),
        )?;
        let engine = MiningEngine::new(QuarterClock::from(&config));
        Ok(Self {
            config,
            governance,
            engine,
            shares: ContributorShareLedger::new(),
            claims: ClaimProcessor::new(),
            gardens: HashMap::new(),
            strategies: HashMap::new(),
            settled: HashMap::new(),
            collaborators,
        })
    }

    pub fn into_shared(self) -> SharedDistributor {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &MiningEngine {
        &self.engine
    }

    pub fn shares(&self) -> &ContributorShareLedger {
        &self.shares
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub fn register_garden(&mut self, garden: Arc<dyn Garden>) {
        let id = garden.id();
        debug!(garden = %id.short(), "garden registered");
        self.gardens.insert(id, garden);
    }

    /// The strategy's garden must already be registered.
    pub fn register_strategy(&mut self, strategy: Arc<dyn Strategy>) -> Result<(), RewardsError> {
        let garden = strategy.garden();
        if !self.gardens.contains_key(&garden) {
            return Err(RewardsError::UnknownGarden(garden.to_string()));
        }
        let id = strategy.id();
        debug!(strategy = %id.short(), garden = %garden.short(), "strategy registered");
        self.strategies.insert(id, strategy);
        Ok(())
    }

    fn garden(&self, id: &Address) -> Result<&Arc<dyn Garden>, RewardsError> {
        self.gardens
            .get(id)
            .ok_or_else(|| RewardsError::UnknownGarden(id.to_string()))
    }

    fn strategy(&self, id: &Address) -> Result<&Arc<dyn Strategy>, RewardsError> {
        self.strategies
            .get(id)
            .ok_or_else(|| RewardsError::UnknownStrategy(id.to_string()))
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Apply one ordered protocol event.
    pub fn apply(&mut self, event: ProtocolEvent) -> Result<(), RewardsError> {
        match event {
            ProtocolEvent::CapitalAllocated { strategy, timestamp, amount } => {
                self.capital_allocated(&strategy, timestamp, amount).map(|_| ())
            }
            ProtocolEvent::CapitalUnwound { strategy, timestamp, amount } => {
                self.capital_unwound(&strategy, timestamp, amount).map(|_| ())
            }
            ProtocolEvent::StrategyFinalized { strategy, timestamp } => {
                self.strategy_finalized(&strategy, timestamp).map(|_| ())
            }
            ProtocolEvent::Deposit { garden, contributor, block, timestamp, shares } => {
                self.deposit(garden, contributor, block, timestamp, shares).map(|_| ())
            }
            ProtocolEvent::Withdraw { garden, contributor, block, timestamp, shares } => {
                self.withdraw(garden, contributor, block, timestamp, shares).map(|_| ())
            }
            ProtocolEvent::Burn { garden, contributor, block, timestamp, shares } => {
                self.burn(garden, contributor, block, timestamp, shares).map(|_| ())
            }
        }
    }

    fn ensure_open(&self, strategy: &Address) -> Result<(), RewardsError> {
        if self.settled.contains_key(strategy) {
            return Err(RewardsError::AlreadyFinalized(strategy.to_string()));
        }
        Ok(())
    }

    /// Capital deployed into a strategy. `amount` is in the garden's reserve
    /// asset and is normalized at the current oracle price. Returns the
    /// reference-asset principal added.
    pub fn capital_allocated(
        &mut self,
        strategy: &Address,
        timestamp: u64,
        amount: u128,
    ) -> Result<u128, RewardsError> {
        self.ensure_open(strategy)?;
        let garden_id = self.strategy(strategy)?.garden();
        let reserve = self.garden(&garden_id)?.reserve_asset();
        let price = self
            .collaborators
            .oracle
            .get_price(&reserve, &self.config.reference_asset)?;
        let benchmark = self.governance.params().benchmark;
        let added = self
            .engine
            .allocate(*strategy, garden_id, timestamp, amount, price, benchmark)?;
        info!(
            strategy = %strategy.short(),
            timestamp,
            amount,
            principal = added,
            protocol_principal = self.engine.protocol().principal(),
            "capital allocated"
        );
        Ok(added)
    }

    /// Capital returned from a strategy before it finalizes. Returns the
    /// reference-asset principal removed.
    pub fn capital_unwound(
        &mut self,
        strategy: &Address,
        timestamp: u64,
        amount: u128,
    ) -> Result<u128, RewardsError> {
        self.ensure_open(strategy)?;
        self.strategy(strategy)?;
        let removed = self.engine.unwind(strategy, timestamp, amount)?;
        info!(
            strategy = %strategy.short(),
            timestamp,
            amount,
            principal = removed,
            protocol_principal = self.engine.protocol().principal(),
            "capital unwound"
        );
        Ok(removed)
    }

    /// Settle a strategy: unwind what is left, compute the reward without
    /// slippage discount and freeze it.
    pub fn strategy_finalized(
        &mut self,
        strategy: &Address,
        timestamp: u64,
    ) -> Result<u128, RewardsError> {
        self.ensure_open(strategy)?;
        let handle = Arc::clone(self.strategy(strategy)?);
        let outcome = StrategyOutcome {
            executed_at: self.executed_at(strategy, handle.as_ref(), timestamp),
            end: timestamp,
            capital_allocated: handle.capital_allocated(),
            capital_returned: handle.capital_returned(),
        };
        let params = *self.governance.params();
        let reward = match self.engine.strategies().record(strategy) {
            Some(rec) => strategy_rewards(&self.engine, strategy, &outcome, &rec.benchmark, &params)?,
            None => 0,
        };

        self.engine.finalize(strategy, timestamp)?;
        self.settled.insert(*strategy, SettledStrategy { reward, outcome, params });
        info!(
            strategy = %strategy.short(),
            timestamp,
            reward,
            allocated = outcome.capital_allocated,
            returned = outcome.capital_returned,
            "strategy rewards settled"
        );
        Ok(reward)
    }

    /// When the strategy started earning: its reported execution time, else
    /// its first mining checkpoint, else `fallback`.
    fn executed_at(&self, id: &Address, strategy: &dyn Strategy, fallback: u64) -> u64 {
        let reported = strategy.state().executed_at;
        if reported > 0 {
            return reported;
        }
        self.engine
            .strategies()
            .record(id)
            .and_then(|r| r.ledger().first().map(|c| c.timestamp))
            .unwrap_or(fallback)
    }

    pub fn deposit(
        &mut self,
        garden: Address,
        contributor: Address,
        block: u64,
        timestamp: u64,
        shares: u128,
    ) -> Result<u128, RewardsError> {
        self.change_shares(garden, contributor, block, timestamp, ShareChange::Deposit(shares))
    }

    pub fn withdraw(
        &mut self,
        garden: Address,
        contributor: Address,
        block: u64,
        timestamp: u64,
        shares: u128,
    ) -> Result<u128, RewardsError> {
        self.change_shares(garden, contributor, block, timestamp, ShareChange::Withdraw(shares))
    }

    pub fn burn(
        &mut self,
        garden: Address,
        contributor: Address,
        block: u64,
        timestamp: u64,
        shares: u128,
    ) -> Result<u128, RewardsError> {
        self.change_shares(garden, contributor, block, timestamp, ShareChange::Burn(shares))
    }

    fn change_shares(
        &mut self,
        garden: Address,
        contributor: Address,
        block: u64,
        timestamp: u64,
        change: ShareChange,
    ) -> Result<u128, RewardsError> {
        self.garden(&garden)?;
        let balance = self.shares.apply(garden, contributor, block, timestamp, change)?;
        if !matches!(change, ShareChange::Burn(_)) {
            self.claims.bump_nonce(garden, contributor);
        }
        Ok(balance)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn check_protocol(&self, timestamp: u64) -> ProtocolCheckpoint {
        self.engine.check_protocol(timestamp)
    }

    pub fn check_quarter(&self, quarter: u64) -> QuarterView {
        self.engine.check_quarter(quarter)
    }

    pub fn check_mining(&self, quarter: u64, strategy: &Address) -> MiningSnapshot {
        self.engine.check_mining(quarter, strategy)
    }

    pub fn get_mining_parameters(&self) -> MiningParameters {
        *self.governance.params()
    }

    pub fn get_prior_balance(&self, garden: &Address, contributor: &Address, timestamp: u64) -> u128 {
        self.shares.get_prior_balance(garden, contributor, timestamp)
    }

    /// Balance held at the end of the block before `block`.
    pub fn get_prior_balance_at_block(&self, garden: &Address, contributor: &Address, block: u64) -> u128 {
        self.shares.get_prior_balance_at_block(garden, contributor, block)
    }

    pub fn get_current_balance(&self, garden: &Address, contributor: &Address) -> u128 {
        self.shares.get_current_balance(garden, contributor)
    }

    pub fn nonce(&self, garden: &Address, contributor: &Address) -> u64 {
        self.claims.nonce(garden, contributor)
    }

    pub fn claim_record(&self, garden: &Address, contributor: &Address) -> Option<&ClaimRecord> {
        self.claims.record(garden, contributor)
    }

    /// Settled reward of a finalized strategy; zero before finalization.
    pub fn strategy_rewards(&self, strategy: &Address) -> u128 {
        self.settled.get(strategy).map_or(0, |s| s.reward)
    }

    pub fn settled(&self, strategy: &Address) -> Option<&SettledStrategy> {
        self.settled.get(strategy)
    }

    /// Discounted reward estimate for a running strategy at `now`.
    ///
    /// Zero once the strategy is finalized (the settled value is in
    /// [`strategy_rewards`](Self::strategy_rewards)) and for strategies that
    /// never received capital.
    pub fn estimate_strategy_rewards(&self, strategy: &Address, now: u64) -> Result<u128, RewardsError> {
        let handle = self.strategy(strategy)?;
        if self.settled.contains_key(strategy) {
            return Ok(0);
        }
        let Some(rec) = self.engine.strategies().record(strategy) else {
            return Ok(0);
        };
        let outcome = self.running_outcome(strategy, handle.as_ref(), now);
        let estimate = estimate_strategy_rewards(
            &self.engine,
            strategy,
            &outcome,
            &rec.benchmark,
            self.governance.params(),
            handle.max_trade_slippage_percentage(),
            handle.duration(),
        )?;
        debug!(strategy = %strategy.short(), now, estimate, "strategy estimate");
        Ok(estimate)
    }

    /// Outcome of a strategy that has not been finalized, as seen at `now`.
    /// NAV stands in for returned capital until the strategy exits.
    fn running_outcome(&self, id: &Address, strategy: &dyn Strategy, now: u64) -> StrategyOutcome {
        let state = strategy.state();
        let executed_at = self.executed_at(id, strategy, now);
        let capital_returned = if state.exited_at > 0 {
            strategy.capital_returned()
        } else {
            strategy.net_asset_value()
        };
        StrategyOutcome {
            executed_at,
            end: state.window_end(now).max(executed_at),
            capital_allocated: strategy.capital_allocated(),
            capital_returned,
        }
    }

    /// What `contributor` earns from `strategy`: the settled split once
    /// finalized (claimed or not), otherwise an estimate at `now`.
    pub fn estimate_user_rewards(
        &self,
        strategy: &Address,
        contributor: &Address,
        now: u64,
    ) -> Result<RewardsSplit, RewardsError> {
        let handle = self.strategy(strategy)?;
        if let Some(settled) = self.settled.get(strategy) {
            return self.split_for(handle.as_ref(), contributor, settled);
        }
        let reward = self.estimate_strategy_rewards(strategy, now)?;
        let outcome = self.running_outcome(strategy, handle.as_ref(), now);
        let basis = RewardBasis {
            reward,
            profit: outcome.profit(),
            profit_ratio: outcome.profit_ratio()?,
        };
        let garden = self.garden(&handle.garden())?;
        let powers = self.contributor_powers(handle.as_ref(), garden.as_ref(), contributor, &outcome)?;
        Ok(split_rewards(&basis, self.governance.params(), &garden.profit_sharing(), &powers)?)
    }

    /// Time-weighted share of the garden `contributor` held over the
    /// strategy's active window (up to `now` while it runs).
    pub fn get_safe_user_share_per_strategy(
        &self,
        garden: &Address,
        contributor: &Address,
        strategy: &Address,
        now: u64,
    ) -> Result<u128, RewardsError> {
        let handle = self.strategy(strategy)?;
        if handle.garden() != *garden {
            return Err(RewardsError::CrossFundClaim);
        }
        let outcome = match self.settled.get(strategy) {
            Some(s) => s.outcome,
            None => self.running_outcome(strategy, handle.as_ref(), now),
        };
        Ok(self
            .shares
            .get_safe_user_share(garden, contributor, outcome.executed_at, outcome.end)?)
    }

    fn contributor_powers(
        &self,
        strategy: &dyn Strategy,
        garden: &dyn Garden,
        contributor: &Address,
        outcome: &StrategyOutcome,
    ) -> Result<ContributorPowers, MathError> {
        let garden_id = garden.id();
        let capital_power =
            self.shares
                .get_safe_user_share(&garden_id, contributor, outcome.executed_at, outcome.end)?;
        let voting = voting_power(
            strategy.votes(contributor),
            strategy.total_votes(),
            outcome.is_profitable(),
        )?;
        let staked = self.collaborators.nft.get_staked_bonus(contributor, &garden_id);
        let (bonus, bonus_overlap) = match staked {
            Some(b) => (b, nft_overlap(b.staked_at, outcome.executed_at, outcome.end)?),
            None => (Default::default(), 0),
        };
        Ok(ContributorPowers {
            is_strategist: strategy.strategist() == *contributor,
            is_creator: garden.creator() == *contributor,
            voting_power: voting,
            capital_power,
            bonus,
            bonus_overlap,
        })
    }

    fn split_for(
        &self,
        strategy: &dyn Strategy,
        contributor: &Address,
        settled: &SettledStrategy,
    ) -> Result<RewardsSplit, RewardsError> {
        let garden = self.garden(&strategy.garden())?;
        let basis = RewardBasis {
            reward: settled.reward,
            profit: settled.outcome.profit(),
            profit_ratio: settled.outcome.profit_ratio()?,
        };
        let powers = self.contributor_powers(strategy, garden.as_ref(), contributor, &settled.outcome)?;
        Ok(split_rewards(&basis, &settled.params, &garden.profit_sharing(), &powers)?)
    }

    /// Unclaimed rewards of `contributor` for `strategies` in `garden`.
    ///
    /// Claimed and unfinalized strategies contribute nothing. Every strategy
    /// must belong to `garden`.
    pub fn get_rewards(
        &self,
        garden: &Address,
        contributor: &Address,
        strategies: &[Address],
    ) -> Result<RewardsSplit, RewardsError> {
        self.pending(garden, contributor, strategies).map(|(split, _)| split)
    }

    /// Unclaimed rewards plus the strategies that carry them.
    fn pending(
        &self,
        garden: &Address,
        contributor: &Address,
        strategies: &[Address],
    ) -> Result<(RewardsSplit, Vec<Address>), RewardsError> {
        self.garden(garden)?;
        let mut unique = BTreeSet::new();
        for id in strategies {
            if self.strategy(id)?.garden() != *garden {
                return Err(RewardsError::CrossFundClaim);
            }
            unique.insert(*id);
        }
        if !self.shares.is_contributor(garden, contributor) {
            return Err(RewardsError::NotAContributor);
        }

        let mut total = RewardsSplit::default();
        let mut carrying = Vec::new();
        for id in unique {
            if self.claims.is_claimed(garden, contributor, &id) {
                continue;
            }
            let Some(settled) = self.settled.get(&id) else {
                continue;
            };
            let split = self.split_for(self.strategy(&id)?.as_ref(), contributor, settled)?;
            if !split.is_zero() {
                total.accumulate(&split);
                carrying.push(id);
            }
        }
        Ok((total, carrying))
    }

    /// Every strategy of `garden` with something unclaimed for `contributor`.
    fn pending_in_garden(
        &self,
        garden: &Address,
        contributor: &Address,
    ) -> Result<(RewardsSplit, Vec<Address>), RewardsError> {
        let ids: Vec<Address> = self
            .strategies
            .iter()
            .filter(|(_, s)| s.garden() == *garden)
            .map(|(id, _)| *id)
            .collect();
        self.pending(garden, contributor, &ids)
    }

    // ------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------

    /// Pay the caller everything unclaimed in `strategies`, all of which must
    /// belong to one garden.
    pub fn claim_returns(
        &mut self,
        ctx: &CallContext,
        strategies: &[Address],
    ) -> Result<ClaimReceipt, RewardsError> {
        let result = self.try_claim_returns(ctx, strategies);
        if let Err(e) = &result {
            warn!(contributor = %ctx.caller.short(), "claim rejected: {e}");
        }
        result
    }

    fn try_claim_returns(
        &mut self,
        ctx: &CallContext,
        strategies: &[Address],
    ) -> Result<ClaimReceipt, RewardsError> {
        let first = strategies.first().ok_or(RewardsError::AlreadyClaimed)?;
        let garden = self.strategy(first)?.garden();
        let (split, carrying) = self.pending(&garden, &ctx.caller, strategies)?;
        if split.is_zero() {
            return Err(RewardsError::AlreadyClaimed);
        }
        let profit = split.total_profit();
        self.check_reserve(&garden, profit)?;

        self.pay_out(&garden, &ctx.caller, profit, &[(ctx.caller, split.total_babl)])?;
        let nonce = self
            .claims
            .settle(garden, ctx.caller, &carrying, ctx.timestamp, split.total_babl, profit);
        info!(
            garden = %garden.short(),
            contributor = %ctx.caller.short(),
            strategies = carrying.len(),
            babl = split.total_babl,
            profit,
            "rewards claimed"
        );
        Ok(ClaimReceipt {
            garden,
            contributor: ctx.caller,
            strategies: carrying,
            babl: split.total_babl,
            profit,
            fee: 0,
            staked_shares: 0,
            nonce,
        })
    }

    /// Relayed claim authorized by the contributor's signature over `msg`.
    /// The relayer (a keeper) receives `fee` out of the BABL amount.
    pub fn claim_rewards_by_sig(
        &mut self,
        ctx: &CallContext,
        msg: &ClaimRewardsMessage,
        fee: u128,
        signature: &ClaimSignature,
    ) -> Result<ClaimReceipt, RewardsError> {
        let result = self.try_claim_rewards_by_sig(ctx, msg, fee, signature);
        if let Err(e) = &result {
            warn!(
                keeper = %ctx.caller.short(),
                contributor = %msg.contributor.short(),
                nonce = msg.nonce,
                "signed claim rejected: {e}"
            );
        }
        result
    }

    fn try_claim_rewards_by_sig(
        &mut self,
        ctx: &CallContext,
        msg: &ClaimRewardsMessage,
        fee: u128,
        signature: &ClaimSignature,
    ) -> Result<ClaimReceipt, RewardsError> {
        if !self.governance.is_keeper(&ctx.caller) {
            return Err(RewardsError::Unauthorized);
        }
        self.garden(&msg.garden)?;
        signature.verify(&msg.digest(), &msg.contributor)?;
        self.claims.check_nonce(&msg.garden, &msg.contributor, msg.nonce)?;
        check_fee(fee, msg.max_fee, msg.babl)?;
        let carrying = self.check_signed_amounts(&msg.garden, &msg.contributor, msg.babl, msg.profit)?;
        self.check_reserve(&msg.garden, msg.profit)?;

        let net = msg.babl - fee;
        self.pay_out(&msg.garden, &msg.contributor, msg.profit, &[(msg.contributor, net), (ctx.caller, fee)])?;
        let nonce = self
            .claims
            .settle(msg.garden, msg.contributor, &carrying, ctx.timestamp, msg.babl, msg.profit);
        info!(
            garden = %msg.garden.short(),
            contributor = %msg.contributor.short(),
            keeper = %ctx.caller.short(),
            babl = msg.babl,
            profit = msg.profit,
            fee,
            "signed rewards claimed"
        );
        Ok(ClaimReceipt {
            garden: msg.garden,
            contributor: msg.contributor,
            strategies: carrying,
            babl: net,
            profit: msg.profit,
            fee,
            staked_shares: 0,
            nonce,
        })
    }

    /// Relayed claim whose BABL is deposited straight into the staking
    /// garden at `price_per_share` instead of being paid out.
    pub fn claim_and_stake_rewards_by_sig(
        &mut self,
        ctx: &CallContext,
        msg: &ClaimAndStakeMessage,
        fee: u128,
        signature: &ClaimSignature,
    ) -> Result<ClaimReceipt, RewardsError> {
        let result = self.try_claim_and_stake(ctx, msg, fee, signature);
        if let Err(e) = &result {
            warn!(
                keeper = %ctx.caller.short(),
                contributor = %msg.contributor.short(),
                nonce = msg.nonce,
                nonce_heart = msg.nonce_heart,
                "signed claim-and-stake rejected: {e}"
            );
        }
        result
    }

    fn try_claim_and_stake(
        &mut self,
        ctx: &CallContext,
        msg: &ClaimAndStakeMessage,
        fee: u128,
        signature: &ClaimSignature,
    ) -> Result<ClaimReceipt, RewardsError> {
        if !self.governance.is_keeper(&ctx.caller) {
            return Err(RewardsError::Unauthorized);
        }
        if self.config.heart_garden != Some(msg.stake_garden) {
            return Err(RewardsError::UnknownGarden(msg.stake_garden.to_string()));
        }
        self.garden(&msg.garden)?;
        self.garden(&msg.stake_garden)?;
        signature.verify(&msg.digest(), &msg.contributor)?;
        self.claims.check_nonce(&msg.garden, &msg.contributor, msg.nonce)?;
        let heart_expected = self.claims.nonce(&msg.stake_garden, &msg.contributor);
        if msg.nonce_heart != heart_expected {
            return Err(RewardsError::InvalidNonce { expected: heart_expected, got: msg.nonce_heart });
        }
        check_fee(fee, msg.max_fee, msg.babl)?;
        let carrying = self.check_signed_amounts(&msg.garden, &msg.contributor, msg.babl, msg.profit)?;

        let staked = msg.babl - fee;
        let shares_out = wad_div(staked, msg.price_per_share)?;
        if shares_out < msg.min_amount_out {
            return Err(RewardsError::SlippageExceeded { min_out: msg.min_amount_out, got: shares_out });
        }
        self.check_reserve(&msg.garden, msg.profit)?;
        let deposit = ShareChange::Deposit(shares_out);
        self.shares
            .preview(&msg.stake_garden, &msg.contributor, ctx.timestamp, deposit)?;

        self.pay_out(&msg.garden, &msg.contributor, msg.profit, &[(msg.stake_garden, staked), (ctx.caller, fee)])?;
        let nonce = self
            .claims
            .settle(msg.garden, msg.contributor, &carrying, ctx.timestamp, msg.babl, msg.profit);
        self.shares
            .deposit(msg.stake_garden, msg.contributor, ctx.block, ctx.timestamp, shares_out)?;
        self.claims.bump_nonce(msg.stake_garden, msg.contributor);
        info!(
            garden = %msg.garden.short(),
            stake_garden = %msg.stake_garden.short(),
            contributor = %msg.contributor.short(),
            babl = staked,
            shares = shares_out,
            profit = msg.profit,
            fee,
            "rewards claimed and staked"
        );
        Ok(ClaimReceipt {
            garden: msg.garden,
            contributor: msg.contributor,
            strategies: carrying,
            babl: staked,
            profit: msg.profit,
            fee,
            staked_shares: shares_out,
            nonce,
        })
    }

    /// Signed amounts may not exceed what is pending across the garden.
    /// Returns the strategies the claim settles.
    fn check_signed_amounts(
        &self,
        garden: &Address,
        contributor: &Address,
        babl: u128,
        profit: u128,
    ) -> Result<Vec<Address>, RewardsError> {
        let (pending, carrying) = self.pending_in_garden(garden, contributor)?;
        if pending.is_zero() {
            return Err(RewardsError::AlreadyClaimed);
        }
        if babl > pending.total_babl || profit > pending.total_profit() {
            return Err(RewardsError::ClaimExceedsPending);
        }
        Ok(carrying)
    }

    fn check_reserve(&self, garden: &Address, profit: u128) -> Result<(), RewardsError> {
        let available = self.garden(garden)?.reserve_asset_rewards_set_aside();
        if profit > available {
            return Err(CollaboratorError::InsufficientBalance { have: available, need: profit }.into());
        }
        Ok(())
    }

    /// Mint every `(recipient, amount)` in `mints`, then pay `profit` out of
    /// the garden's reserve. If any step fails the BABL minted so far is
    /// burned again, so a failed claim leaves no tokens behind.
    fn pay_out(
        &self,
        garden: &Address,
        to: &Address,
        profit: u128,
        mints: &[(Address, u128)],
    ) -> Result<(), RewardsError> {
        let garden = self.garden(garden)?;
        let mut minted = Vec::with_capacity(mints.len());
        for (recipient, amount) in mints.iter().filter(|(_, amount)| *amount > 0) {
            if let Err(e) = self.collaborators.token.mint(recipient, *amount) {
                self.unwind_mints(&minted);
                return Err(e.into());
            }
            minted.push((*recipient, *amount));
        }
        if profit > 0 {
            if let Err(e) = garden.send_reserve_rewards(to, profit) {
                self.unwind_mints(&minted);
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn unwind_mints(&self, minted: &[(Address, u128)]) {
        for (recipient, amount) in minted.iter().rev() {
            if let Err(e) = self.collaborators.token.burn(recipient, *amount) {
                error!(recipient = %recipient.short(), amount, "failed to burn back minted BABL: {e}");
            }
        }
    }

    // ------------------------------------------------------------------
    // Governance
    // ------------------------------------------------------------------

    pub fn set_mining_parameters(
        &mut self,
        ctx: &CallContext,
        params: MiningParameters,
    ) -> Result<(), RewardsError> {
        self.governance.set_mining_parameters(&ctx.caller, params)
    }

    pub fn add_keeper(&mut self, ctx: &CallContext, keeper: Address) -> Result<bool, RewardsError> {
        self.governance.add_keeper(&ctx.caller, keeper)
    }

    pub fn remove_keeper(&mut self, ctx: &CallContext, keeper: &Address) -> Result<bool, RewardsError> {
        self.governance.remove_keeper(&ctx.caller, keeper)
    }

    pub fn is_keeper(&self, who: &Address) -> bool {
        self.governance.is_keeper(who)
    }
}

fn check_fee(fee: u128, max_fee: u128, babl: u128) -> Result<(), RewardsError> {
    let cap = max_fee.min(babl);
    if fee > cap {
        return Err(RewardsError::FeeTooHigh { fee, max_fee: cap });
    }
    Ok(())
}
