//! Shared fixtures for integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use babl_core::config::EngineConfig;
use babl_core::constants::{BLOCK_TIME_SECS, START_TIME};
use babl_core::crypto::KeyPair;
use babl_core::memory::{FixedPriceOracle, MemoryGarden, MemoryNftRegistry, MemoryRewardToken, MemoryStrategy};
use babl_core::traits::Strategy;
use babl_core::types::Address;
use babl_distributor::{CallContext, Collaborators, RewardsDistributor};

pub const GOVERNANCE: Address = Address([0xEE; 32]);
pub const KEEPER: Address = Address([0xCC; 32]);
pub const HEART_GARDEN: Address = Address([0xAA; 32]);
pub const RESERVE: Address = Address([0x01; 32]);

/// Address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address([seed; 32])
}

/// Deterministic keypair from a seed byte.
pub fn keypair(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes([seed; 32])
}

/// Block number for a timestamp, at the protocol's block time.
pub fn block_at(timestamp: u64) -> u64 {
    timestamp.saturating_sub(START_TIME) / BLOCK_TIME_SECS + 1
}

pub fn ctx(caller: Address, timestamp: u64) -> CallContext {
    CallContext::new(caller, block_at(timestamp), timestamp)
}

/// A distributor over in-memory collaborators, with handles to each.
pub struct World {
    pub dist: RewardsDistributor,
    pub token: Arc<MemoryRewardToken>,
    pub oracle: Arc<FixedPriceOracle>,
    pub nft: Arc<MemoryNftRegistry>,
    pub gardens: HashMap<Address, Arc<MemoryGarden>>,
    pub strategies: HashMap<Address, Arc<MemoryStrategy>>,
}

impl World {
    /// Reference asset is [`RESERVE`], so allocations are priced at 1:1.
    /// The heart garden is registered up front.
    pub fn new() -> Self {
        Self::with_config(EngineConfig {
            reference_asset: RESERVE,
            governance: GOVERNANCE,
            keepers: vec![KEEPER],
            heart_garden: Some(HEART_GARDEN),
            ..Default::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let token = Arc::new(MemoryRewardToken::new());
        let oracle = Arc::new(FixedPriceOracle::new());
        let nft = Arc::new(MemoryNftRegistry::new());
        let collaborators = Collaborators {
            oracle: oracle.clone(),
            token: token.clone(),
            nft: nft.clone(),
        };
        let dist = RewardsDistributor::new(config, collaborators).unwrap();
        let mut world = Self {
            dist,
            token,
            oracle,
            nft,
            gardens: HashMap::new(),
            strategies: HashMap::new(),
        };
        world.add_garden(HEART_GARDEN, GOVERNANCE);
        world
    }

    pub fn add_garden(&mut self, id: Address, creator: Address) -> Arc<MemoryGarden> {
        let garden = Arc::new(MemoryGarden::new(id, creator, RESERVE));
        self.dist.register_garden(garden.clone());
        self.gardens.insert(id, garden.clone());
        garden
    }

    pub fn add_strategy(
        &mut self,
        id: Address,
        garden: Address,
        strategist: Address,
        duration: u64,
    ) -> Arc<MemoryStrategy> {
        let strategy = Arc::new(MemoryStrategy::new(id, garden, strategist, duration));
        self.dist.register_strategy(strategy.clone()).unwrap();
        self.strategies.insert(id, strategy.clone());
        strategy
    }

    pub fn deposit(&mut self, garden: Address, who: Address, timestamp: u64, shares: u128) {
        self.dist
            .deposit(garden, who, block_at(timestamp), timestamp, shares)
            .unwrap();
    }

    pub fn withdraw(&mut self, garden: Address, who: Address, timestamp: u64, shares: u128) {
        self.dist
            .withdraw(garden, who, block_at(timestamp), timestamp, shares)
            .unwrap();
    }

    /// Deploy `amount` into `strategy`, both on the strategy and in the
    /// distributor's ledgers.
    pub fn execute(&mut self, strategy: Address, timestamp: u64, amount: u128) {
        self.strategies[&strategy].execute(timestamp, amount);
        self.dist.capital_allocated(&strategy, timestamp, amount).unwrap();
    }

    /// Exit `strategy` returning `returned`, set the profit aside in its
    /// garden and settle it. Returns the settled reward.
    pub fn finish(&mut self, strategy: Address, timestamp: u64, returned: u128) -> u128 {
        let s = &self.strategies[&strategy];
        let profit = returned.saturating_sub(s.capital_allocated());
        s.exit(timestamp, returned);
        self.gardens[&s.garden()].set_aside(profit);
        self.dist.strategy_finalized(&strategy, timestamp).unwrap()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
