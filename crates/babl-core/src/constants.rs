//! Protocol constants. All token amounts, prices and percentages are `u128`
//! values scaled by [`WAD`] (1 BABL = 10^18 units, 100% = 10^18).

/// 18-decimal fixed-point unit.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Higher-precision unit used where a wad would underflow (decay curve).
pub const RAY36: u128 = WAD * WAD;

/// One percent in wad units.
pub const PERCENT: u128 = WAD / 100;

/// Length of a mining quarter in seconds (90 days).
pub const EPOCH_DURATION: u64 = 90 * 24 * 60 * 60;

/// Default protocol start time (Unix seconds). Quarter 1 begins here.
pub const START_TIME: u64 = 1_614_618_000;

/// Nominal spacing of host-ledger blocks, used by tests and replay tooling.
pub const BLOCK_TIME_SECS: u64 = 12;

/// BABL emitted during quarter 1: 53,571.4285714286 BABL.
pub const FIRST_QUARTER_SUPPLY: u128 = 53_571_428_571_428_600_000_000;

/// Per-quarter decay of the emission, as a wad (12%).
pub const DECAY_RATE: u128 = 12 * PERCENT;

/// Quarters at or beyond this index emit nothing.
///
/// The curve already truncates to zero at quarter 463; the explicit cutoff
/// keeps every later quarter away from the power computation entirely.
pub const SUPPLY_CUTOFF_QUARTER: u64 = 513;

/// Share of the strategy's max trade slippage applied to pre-finalization
/// estimates once the strategy has run its full planned duration.
pub const ESTIMATE_SLIPPAGE_FACTOR: u128 = 70 * PERCENT;

/// Strategist reward multiplier when the strategy returned at least its capital.
pub const STRATEGIST_PROFIT_BONUS: u128 = 2 * WAD;

/// Domain tag for signed reward claims.
pub const CLAIM_REWARDS_TYPEHASH: &[u8] = b"BABL::ClaimRewards(garden,contributor,babl,profit,nonce,maxFee)";

/// Domain tag for signed claim-and-stake requests.
pub const CLAIM_AND_STAKE_TYPEHASH: &[u8] = b"BABL::ClaimAndStake(garden,stakeGarden,contributor,babl,profit,minAmountOut,nonce,nonceHeart,maxFee,pricePerShare)";
