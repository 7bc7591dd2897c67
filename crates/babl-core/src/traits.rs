//! Collaborator interfaces consumed by the mining engine.
//!
//! The engine never trades, prices, or moves tokens on its own. These traits
//! define the contracts it relies on:
//! - [`PriceOracle`]: asset conversion at event time
//! - [`Strategy`]: capital, lifecycle and votes of one strategy
//! - [`Garden`]: the fund a strategy belongs to, and its reserve payouts
//! - [`RewardToken`]: BABL minting, burning and transfers
//! - [`NftBonusRegistry`]: staked NFT bonus factors
//!
//! In-memory implementations live in [`crate::memory`].

use crate::error::CollaboratorError;
use crate::types::{Address, ProfitSharing, StakedBonus, StrategyState};

/// Converts between assets.
pub trait PriceOracle: Send + Sync {
    /// Price of one unit of `asset_in` in `asset_out`, as a wad.
    fn get_price(&self, asset_in: &Address, asset_out: &Address) -> Result<u128, CollaboratorError>;
}

/// Read-only view of a strategy.
pub trait Strategy: Send + Sync {
    fn id(&self) -> Address;

    /// The garden that owns this strategy.
    fn garden(&self) -> Address;

    /// The contributor who proposed the strategy.
    fn strategist(&self) -> Address;

    /// Total capital ever allocated, in the garden's reserve asset.
    fn capital_allocated(&self) -> u128;

    /// Capital returned on exit. Zero until the strategy unwinds.
    fn capital_returned(&self) -> u128;

    /// Current net asset value in the reserve asset. Used for estimates
    /// before the strategy has exited.
    fn net_asset_value(&self) -> u128;

    fn state(&self) -> StrategyState;

    /// Max slippage the strategy tolerates per trade (wad).
    fn max_trade_slippage_percentage(&self) -> u128;

    /// Planned duration in seconds.
    fn duration(&self) -> u64;

    /// Signed vote weight of `voter` (positive = for, negative = against).
    fn votes(&self, voter: &Address) -> i128;

    /// Sum of absolute vote weights.
    fn total_votes(&self) -> u128;
}

/// A fund of pooled capital.
///
/// Share balances and supply are tracked by the engine's contributor ledger
/// from deposit and withdrawal events, not read from the garden.
pub trait Garden: Send + Sync {
    fn id(&self) -> Address;

    /// Receives the creator bonus.
    fn creator(&self) -> Address;

    fn reserve_asset(&self) -> Address;

    /// Reserve-asset profits currently set aside for strategist/steward/LP payouts.
    fn reserve_asset_rewards_set_aside(&self) -> u128;

    fn profit_sharing(&self) -> ProfitSharing;

    /// Pay `amount` of set-aside reserve profit to `to`.
    fn send_reserve_rewards(&self, to: &Address, amount: u128) -> Result<(), CollaboratorError>;
}

/// The BABL token.
pub trait RewardToken: Send + Sync {
    fn mint(&self, to: &Address, amount: u128) -> Result<(), CollaboratorError>;

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), CollaboratorError>;

    /// Destroy `amount` held by `from`. Used to undo a mint when a claim
    /// fails part way.
    fn burn(&self, from: &Address, amount: u128) -> Result<(), CollaboratorError>;

    fn balance_of(&self, who: &Address) -> u128;
}

/// Source of staked NFT bonuses.
pub trait NftBonusRegistry: Send + Sync {
    /// Bonus attributes for `contributor` in `garden`, if an NFT is staked.
    fn get_staked_bonus(&self, contributor: &Address, garden: &Address) -> Option<StakedBonus>;
}
