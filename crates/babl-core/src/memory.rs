//! In-memory collaborator implementations.
//!
//! Backed by `HashMap`s behind `parking_lot` locks so they can be shared as
//! `Arc<dyn Trait>` and mutated by tests or replay tooling while the engine
//! holds them. No persistence.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::constants::WAD;
use crate::error::CollaboratorError;
use crate::traits::{Garden, NftBonusRegistry, PriceOracle, RewardToken, Strategy};
use crate::types::{Address, ProfitSharing, StakedBonus, StrategyState};

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Oracle with fixed quotes. Same-asset prices are always `WAD`.
#[derive(Debug, Default)]
pub struct FixedPriceOracle {
    prices: RwLock<HashMap<(Address, Address), u128>>,
}

impl FixedPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote `asset_in` → `asset_out` at `price`; the inverse is derived.
    pub fn set_price(&self, asset_in: Address, asset_out: Address, price: u128) {
        let mut prices = self.prices.write();
        prices.insert((asset_in, asset_out), price);
        if price > 0 {
            prices.insert((asset_out, asset_in), WAD * WAD / price);
        }
    }
}

impl PriceOracle for FixedPriceOracle {
    fn get_price(&self, asset_in: &Address, asset_out: &Address) -> Result<u128, CollaboratorError> {
        if asset_in == asset_out {
            return Ok(WAD);
        }
        self.prices
            .read()
            .get(&(*asset_in, *asset_out))
            .copied()
            .ok_or_else(|| CollaboratorError::MissingPrice(format!("{}/{}", asset_in.short(), asset_out.short())))
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct StrategyData {
    capital_allocated: u128,
    capital_returned: u128,
    nav: u128,
    state: StrategyState,
    max_trade_slippage: u128,
    votes: HashMap<Address, i128>,
}

/// A strategy whose figures are set by hand.
#[derive(Debug)]
pub struct MemoryStrategy {
    id: Address,
    garden: Address,
    strategist: Address,
    duration: u64,
    data: RwLock<StrategyData>,
}

impl MemoryStrategy {
    pub fn new(id: Address, garden: Address, strategist: Address, duration: u64) -> Self {
        Self {
            id,
            garden,
            strategist,
            duration,
            data: RwLock::new(StrategyData {
                max_trade_slippage: WAD / 20,
                ..Default::default()
            }),
        }
    }

    /// Record a vote. Replaces any earlier vote by the same voter.
    pub fn vote(&self, voter: Address, weight: i128) {
        self.data.write().votes.insert(voter, weight);
    }

    /// Mark the strategy executed at `at` with `capital` deployed.
    pub fn execute(&self, at: u64, capital: u128) {
        let mut d = self.data.write();
        d.capital_allocated = d.capital_allocated.saturating_add(capital);
        d.nav = d.nav.saturating_add(capital);
        d.state.active = true;
        d.state.data_set = true;
        if d.state.executed_at == 0 {
            d.state.executed_at = at;
        }
        d.state.updated_at = at;
    }

    /// Exit at `at`, returning `returned` to the garden.
    pub fn exit(&self, at: u64, returned: u128) {
        let mut d = self.data.write();
        d.capital_returned = returned;
        d.nav = 0;
        d.state.active = false;
        d.state.finalized = true;
        d.state.exited_at = at;
        d.state.updated_at = at;
    }

    pub fn set_nav(&self, nav: u128) {
        self.data.write().nav = nav;
    }

    pub fn set_max_trade_slippage(&self, slippage: u128) {
        self.data.write().max_trade_slippage = slippage;
    }

    pub fn set_state(&self, state: StrategyState) {
        self.data.write().state = state;
    }
}

impl Strategy for MemoryStrategy {
    fn id(&self) -> Address {
        self.id
    }

    fn garden(&self) -> Address {
        self.garden
    }

    fn strategist(&self) -> Address {
        self.strategist
    }

    fn capital_allocated(&self) -> u128 {
        self.data.read().capital_allocated
    }

    fn capital_returned(&self) -> u128 {
        self.data.read().capital_returned
    }

    fn net_asset_value(&self) -> u128 {
        self.data.read().nav
    }

    fn state(&self) -> StrategyState {
        self.data.read().state
    }

    fn max_trade_slippage_percentage(&self) -> u128 {
        self.data.read().max_trade_slippage
    }

    fn duration(&self) -> u64 {
        self.duration
    }

    fn votes(&self, voter: &Address) -> i128 {
        self.data.read().votes.get(voter).copied().unwrap_or(0)
    }

    fn total_votes(&self) -> u128 {
        self.data
            .read()
            .votes
            .values()
            .map(|v| v.unsigned_abs())
            .fold(0u128, u128::saturating_add)
    }
}

// ---------------------------------------------------------------------------
// Garden
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct GardenData {
    set_aside: u128,
    paid: HashMap<Address, u128>,
}

/// A garden holding a pot of set-aside reserve profits.
#[derive(Debug)]
pub struct MemoryGarden {
    id: Address,
    creator: Address,
    reserve_asset: Address,
    profit_sharing: ProfitSharing,
    data: RwLock<GardenData>,
}

impl MemoryGarden {
    pub fn new(id: Address, creator: Address, reserve_asset: Address) -> Self {
        Self {
            id,
            creator,
            reserve_asset,
            profit_sharing: ProfitSharing::standard(),
            data: RwLock::new(GardenData::default()),
        }
    }

    pub fn with_profit_sharing(mut self, sharing: ProfitSharing) -> Self {
        self.profit_sharing = sharing;
        self
    }

    /// Add realized profit to the set-aside pot.
    pub fn set_aside(&self, amount: u128) {
        let mut d = self.data.write();
        d.set_aside = d.set_aside.saturating_add(amount);
    }

    /// Reserve profit paid to `who` so far.
    pub fn paid_to(&self, who: &Address) -> u128 {
        self.data.read().paid.get(who).copied().unwrap_or(0)
    }
}

impl Garden for MemoryGarden {
    fn id(&self) -> Address {
        self.id
    }

    fn creator(&self) -> Address {
        self.creator
    }

    fn reserve_asset(&self) -> Address {
        self.reserve_asset
    }

    fn reserve_asset_rewards_set_aside(&self) -> u128 {
        self.data.read().set_aside
    }

    fn profit_sharing(&self) -> ProfitSharing {
        self.profit_sharing
    }

    fn send_reserve_rewards(&self, to: &Address, amount: u128) -> Result<(), CollaboratorError> {
        let mut d = self.data.write();
        if d.set_aside < amount {
            return Err(CollaboratorError::InsufficientBalance {
                have: d.set_aside,
                need: amount,
            });
        }
        d.set_aside -= amount;
        let entry = d.paid.entry(*to).or_insert(0);
        *entry = entry.saturating_add(amount);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reward token
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TokenData {
    balances: HashMap<Address, u128>,
    total_supply: u128,
}

/// BABL ledger with unrestricted minting.
#[derive(Debug, Default)]
pub struct MemoryRewardToken {
    data: RwLock<TokenData>,
}

impl MemoryRewardToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> u128 {
        self.data.read().total_supply
    }
}

impl RewardToken for MemoryRewardToken {
    fn mint(&self, to: &Address, amount: u128) -> Result<(), CollaboratorError> {
        let mut d = self.data.write();
        d.total_supply = d
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| CollaboratorError::Rejected("supply overflow".into()))?;
        let bal = d.balances.entry(*to).or_insert(0);
        *bal = bal.saturating_add(amount);
        Ok(())
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), CollaboratorError> {
        let mut d = self.data.write();
        let have = d.balances.get(from).copied().unwrap_or(0);
        if have < amount {
            return Err(CollaboratorError::InsufficientBalance { have, need: amount });
        }
        d.balances.insert(*from, have - amount);
        let bal = d.balances.entry(*to).or_insert(0);
        *bal = bal.saturating_add(amount);
        Ok(())
    }

    fn burn(&self, from: &Address, amount: u128) -> Result<(), CollaboratorError> {
        let mut d = self.data.write();
        let have = d.balances.get(from).copied().unwrap_or(0);
        if have < amount {
            return Err(CollaboratorError::InsufficientBalance { have, need: amount });
        }
        d.balances.insert(*from, have - amount);
        d.total_supply = d.total_supply.saturating_sub(amount);
        Ok(())
    }

    fn balance_of(&self, who: &Address) -> u128 {
        self.data.read().balances.get(who).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// NFT registry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryNftRegistry {
    stakes: RwLock<HashMap<(Address, Address), StakedBonus>>,
}

impl MemoryNftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stake(&self, contributor: Address, garden: Address, bonus: StakedBonus) {
        self.stakes.write().insert((contributor, garden), bonus);
    }

    pub fn unstake(&self, contributor: &Address, garden: &Address) {
        self.stakes.write().remove(&(*contributor, *garden));
    }
}

impl NftBonusRegistry for MemoryNftRegistry {
    fn get_staked_bonus(&self, contributor: &Address, garden: &Address) -> Option<StakedBonus> {
        self.stakes.read().get(&(*contributor, *garden)).copied()
    }
}
