//! BABL reward formula and role split.
//!
//! For a strategy active over `[executed_at, end]`:
//!
//! 1. Per quarter `i` touched by the window, the strategy earns
//!    `supply(i) × strategy_power(i) / protocol_power(i) × time_percent(i)`,
//!    where `time_percent` is 1 except in the last quarter, where it is the
//!    elapsed fraction of that quarter. The sum is the *baseline*.
//! 2. `profit_ratio = returned / allocated` selects a benchmark multiplier.
//! 3. `reward = baseline × principal_weight
//!             + baseline × profit_weight × multiplier × profit_ratio`.
//! 4. Estimates before finalization are discounted by a slippage factor
//!    ramping to `0.7 × max_trade_slippage` over the planned duration.
//!
//! The reward is then split between strategist, stewards and LPs by
//! [`split_rewards`]. A garden creator additionally earns a bonus on top of
//! their own role rewards.

use serde::{Deserialize, Serialize};

use babl_core::constants::{ESTIMATE_SLIPPAGE_FACTOR, STRATEGIST_PROFIT_BONUS, WAD};
use babl_core::error::{LedgerError, MathError};
use babl_core::math::{clamp_unit, mul_div, ratio_or_zero, wad_mul};
use babl_core::params::{Benchmark, MiningParameters};
use babl_core::supply::supply_for_quarter;
use babl_core::types::{Address, ProfitSharing, RewardsSplit, StakedBonus};

use crate::engine::MiningEngine;

/// One quarter's contribution to a baseline.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuarterReward {
    pub quarter: u64,
    pub power_ratio: u128,
    pub supply: u128,
    pub time_percent: u128,
    pub reward: u128,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Baseline {
    pub total: u128,
    pub quarters: Vec<QuarterReward>,
}

/// Capital figures of a strategy at evaluation time.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrategyOutcome {
    pub executed_at: u64,
    /// Exit time, or the evaluation time while still running.
    pub end: u64,
    pub capital_allocated: u128,
    /// Capital returned on exit, or current NAV for estimates.
    pub capital_returned: u128,
}

impl StrategyOutcome {
    pub fn profit_ratio(&self) -> Result<u128, MathError> {
        ratio_or_zero(self.capital_returned, self.capital_allocated)
    }

    /// Realized profit in the reserve asset. Zero for losses.
    pub fn profit(&self) -> u128 {
        self.capital_returned.saturating_sub(self.capital_allocated)
    }

    /// Returned at least what was allocated.
    pub fn is_profitable(&self) -> bool {
        self.capital_returned >= self.capital_allocated
    }
}

/// Σ over quarters of `supply × power_ratio × time_percent`.
pub fn baseline_reward(
    engine: &MiningEngine,
    strategy: &Address,
    executed_at: u64,
    end: u64,
) -> Result<Baseline, LedgerError> {
    let clock = engine.clock();
    let end = end.max(executed_at);
    let q_start = clock.quarter_of(executed_at)?;
    let q_end = clock.quarter_of(end)?;

    let mut baseline = Baseline::default();
    for quarter in q_start..=q_end {
        let supply = supply_for_quarter(quarter);
        if supply == 0 {
            break;
        }
        let strategy_power = engine.strategies().power_in_quarter(strategy, quarter, end)?;
        let protocol_power = engine.protocol().power_in_quarter(quarter, end)?;
        // A strategy's power is part of the protocol's; clamp rounding.
        let strategy_power = strategy_power.min(protocol_power);
        let power_ratio = clamp_unit(ratio_or_zero(strategy_power, protocol_power)?);

        let time_percent = if quarter == q_end {
            let elapsed = end.saturating_sub(clock.quarter_start(quarter));
            clamp_unit(mul_div(elapsed as u128, WAD, clock.epoch as u128)?)
        } else {
            WAD
        };

        let share = if protocol_power == 0 {
            0
        } else {
            mul_div(supply, strategy_power, protocol_power)?
        };
        let reward = wad_mul(share, time_percent)?;
        baseline.total = baseline.total.checked_add(reward).ok_or(MathError::Overflow)?;
        baseline.quarters.push(QuarterReward { quarter, power_ratio, supply, time_percent, reward });
    }
    Ok(baseline)
}

/// Apply the benchmark and the principal/profit weights to a baseline.
pub fn final_reward(
    baseline: u128,
    profit_ratio: u128,
    benchmark: &Benchmark,
    params: &MiningParameters,
) -> Result<u128, MathError> {
    let multiplier = benchmark.multiplier(profit_ratio);
    let principal_part = wad_mul(baseline, params.principal_weight)?;
    let profit_part = mul_div(
        wad_mul(baseline, params.profit_weight)?,
        wad_mul(multiplier, profit_ratio)?,
        WAD,
    )?;
    principal_part.checked_add(profit_part).ok_or(MathError::Overflow)
}

/// Settled reward of a strategy.
pub fn strategy_rewards(
    engine: &MiningEngine,
    strategy: &Address,
    outcome: &StrategyOutcome,
    benchmark: &Benchmark,
    params: &MiningParameters,
) -> Result<u128, LedgerError> {
    let baseline = baseline_reward(engine, strategy, outcome.executed_at, outcome.end)?;
    Ok(final_reward(baseline.total, outcome.profit_ratio()?, benchmark, params)?)
}

/// Discount applied to estimates: ramps linearly from 0 to
/// `ESTIMATE_SLIPPAGE_FACTOR × max_slippage` over `duration` seconds.
pub fn slippage_discount(max_slippage: u128, elapsed: u64, duration: u64) -> Result<u128, MathError> {
    let full = wad_mul(ESTIMATE_SLIPPAGE_FACTOR, max_slippage)?;
    if duration == 0 {
        return Ok(clamp_unit(full));
    }
    let ramp = mul_div(full, elapsed.min(duration) as u128, duration as u128)?;
    Ok(clamp_unit(ramp))
}

/// Reward estimate for a running strategy, evaluated at `outcome.end`.
pub fn estimate_strategy_rewards(
    engine: &MiningEngine,
    strategy: &Address,
    outcome: &StrategyOutcome,
    benchmark: &Benchmark,
    params: &MiningParameters,
    max_slippage: u128,
    duration: u64,
) -> Result<u128, LedgerError> {
    let reward = strategy_rewards(engine, strategy, outcome, benchmark, params)?;
    let elapsed = outcome.end.saturating_sub(outcome.executed_at);
    let discount = slippage_discount(max_slippage, elapsed, duration)?;
    Ok(wad_mul(reward, WAD - discount)?)
}

/// Steward voting power: `|votes| / total_votes` when the vote agrees with
/// the outcome, zero otherwise.
pub fn voting_power(votes: i128, total_votes: u128, profitable: bool) -> Result<u128, MathError> {
    let agrees = (votes > 0 && profitable) || (votes < 0 && !profitable);
    if !agrees {
        return Ok(0);
    }
    Ok(clamp_unit(ratio_or_zero(votes.unsigned_abs(), total_votes)?))
}

/// Fraction of `[executed_at, end]` during which an NFT staked at
/// `staked_at` was held.
pub fn nft_overlap(staked_at: u64, executed_at: u64, end: u64) -> Result<u128, MathError> {
    if staked_at <= executed_at {
        return Ok(WAD);
    }
    if staked_at >= end {
        return Ok(0);
    }
    mul_div((end - staked_at) as u128, WAD, (end - executed_at) as u128)
}

/// What a contributor is entitled to in each role.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ContributorPowers {
    pub is_strategist: bool,
    pub is_creator: bool,
    /// Steward voting power (wad).
    pub voting_power: u128,
    /// Time-weighted share of the garden supply (wad).
    pub capital_power: u128,
    pub bonus: StakedBonus,
    /// Fraction of the window the bonus applies to (wad).
    pub bonus_overlap: u128,
}

impl ContributorPowers {
    fn boost(&self, bonus: u128) -> Result<u128, MathError> {
        WAD.checked_add(wad_mul(bonus, self.bonus_overlap)?).ok_or(MathError::Overflow)
    }
}

/// Reward and profit a strategy distributes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RewardBasis {
    pub reward: u128,
    pub profit: u128,
    pub profit_ratio: u128,
}

/// Split a strategy's reward and profit for one contributor.
///
/// NFT bonuses scale the BABL components only; profit is paid out of the
/// garden's set-aside reserve and is never boosted. The creator bonus is
/// `creator_bonus` of the contributor's own strategist, steward and LP BABL.
pub fn split_rewards(
    basis: &RewardBasis,
    params: &MiningParameters,
    sharing: &ProfitSharing,
    powers: &ContributorPowers,
) -> Result<RewardsSplit, MathError> {
    let mut split = RewardsSplit::default();

    if powers.is_strategist {
        let mut babl = wad_mul(basis.reward, params.strategist_share)?;
        if basis.profit_ratio >= WAD {
            babl = wad_mul(babl, STRATEGIST_PROFIT_BONUS)?;
        }
        split.strategist_babl = wad_mul(babl, powers.boost(powers.bonus.strategist)?)?;
        split.strategist_profit = wad_mul(basis.profit, sharing.strategist)?;
    }

    if powers.voting_power > 0 {
        let babl = wad_mul(wad_mul(basis.reward, params.steward_share)?, powers.voting_power)?;
        split.steward_babl = wad_mul(babl, powers.boost(powers.bonus.steward)?)?;
        split.steward_profit = wad_mul(wad_mul(basis.profit, sharing.steward)?, powers.voting_power)?;
    }

    if powers.capital_power > 0 {
        let babl = wad_mul(wad_mul(basis.reward, params.lp_share)?, powers.capital_power)?;
        split.lp_babl = wad_mul(babl, powers.boost(powers.bonus.lp)?)?;
        split.lp_profit = wad_mul(wad_mul(basis.profit, sharing.lp)?, powers.capital_power)?;
    }

    if powers.is_creator {
        let roles = split
            .strategist_babl
            .checked_add(split.steward_babl)
            .and_then(|v| v.checked_add(split.lp_babl))
            .ok_or(MathError::Overflow)?;
        let babl = wad_mul(roles, params.creator_bonus)?;
        split.creator_bonus = wad_mul(babl, powers.boost(powers.bonus.creator)?)?;
    }

    Ok(split.with_total())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::QuarterClock;
    use babl_core::constants::{EPOCH_DURATION, PERCENT, START_TIME};
    use proptest::prelude::*;

    fn addr(b: u8) -> Address {
        Address([b; 32])
    }

    fn engine() -> MiningEngine {
        MiningEngine::new(QuarterClock::new(START_TIME, EPOCH_DURATION))
    }

    // ------------------------------------------------------------------
    // baseline
    // ------------------------------------------------------------------

    #[test]
    fn sole_strategy_for_one_quarter_earns_the_quarter() {
        let mut e = engine();
        e.allocate(addr(1), addr(9), START_TIME, WAD, WAD, Benchmark::default()).unwrap();
        let end = START_TIME + EPOCH_DURATION;
        e.finalize(&addr(1), end).unwrap();
        let b = baseline_reward(&e, &addr(1), START_TIME, end).unwrap();
        assert_eq!(b.total, supply_for_quarter(1));
        assert_eq!(b.quarters[0].power_ratio, WAD);
        assert_eq!(b.quarters[1].time_percent, 0);
    }

    #[test]
    fn two_equal_strategies_split_the_quarter() {
        let mut e = engine();
        e.allocate(addr(1), addr(9), START_TIME, WAD, WAD, Benchmark::default()).unwrap();
        e.allocate(addr(2), addr(9), START_TIME, WAD, WAD, Benchmark::default()).unwrap();
        let end = START_TIME + EPOCH_DURATION;
        let a = baseline_reward(&e, &addr(1), START_TIME, end).unwrap();
        let b = baseline_reward(&e, &addr(2), START_TIME, end).unwrap();
        assert_eq!(a.total, supply_for_quarter(1) / 2);
        assert_eq!(a.total, b.total);
    }

    #[test]
    fn partial_last_quarter_scales_by_elapsed_time() {
        let mut e = engine();
        e.allocate(addr(1), addr(9), START_TIME, WAD, WAD, Benchmark::default()).unwrap();
        let end = START_TIME + EPOCH_DURATION + EPOCH_DURATION / 2;
        let b = baseline_reward(&e, &addr(1), START_TIME, end).unwrap();
        assert_eq!(b.quarters.len(), 2);
        assert_eq!(b.quarters[1].time_percent, WAD / 2);
        assert_eq!(b.total, supply_for_quarter(1) + supply_for_quarter(2) / 2);
    }

    #[test]
    fn baseline_stops_at_supply_exhaustion() {
        let mut e = engine();
        e.allocate(addr(1), addr(9), START_TIME, 1, WAD, Benchmark::default()).unwrap();
        let far = START_TIME + 700 * EPOCH_DURATION;
        let b = baseline_reward(&e, &addr(1), START_TIME, far).unwrap();
        assert!(b.quarters.len() < 513);
        assert!(b.total <= babl_core::supply::cumulative_supply(512));
    }

    #[test]
    fn unknown_strategy_earns_nothing() {
        let mut e = engine();
        e.allocate(addr(1), addr(9), START_TIME, WAD, WAD, Benchmark::default()).unwrap();
        let b = baseline_reward(&e, &addr(7), START_TIME, START_TIME + 100).unwrap();
        assert_eq!(b.total, 0);
    }

    // ------------------------------------------------------------------
    // final reward
    // ------------------------------------------------------------------

    #[test]
    fn break_even_reward_equals_baseline() {
        let p = MiningParameters::default();
        let r = final_reward(1_000 * WAD, WAD, &Benchmark::default(), &p).unwrap();
        assert_eq!(r, 1_000 * WAD);
    }

    #[test]
    fn loss_is_penalized() {
        let p = MiningParameters::default();
        // ratio 0.5 → seg1 0.5: 0.35 + 0.65 * 0.5 * 0.5 = 0.5125
        let r = final_reward(1_000 * WAD, WAD / 2, &Benchmark::default(), &p).unwrap();
        assert_eq!(r, 5125 * WAD / 10);
    }

    #[test]
    fn profit_is_boosted() {
        let p = MiningParameters::default();
        // ratio 1.1 → seg3 1.2: 0.35 + 0.65 * 1.2 * 1.1 = 1.208
        let r = final_reward(1_000 * WAD, 110 * PERCENT, &Benchmark::default(), &p).unwrap();
        assert_eq!(r, 1_208 * WAD);
    }

    #[test]
    fn small_baseline_does_not_truncate_to_zero() {
        let p = MiningParameters::default();
        assert!(final_reward(100, WAD, &Benchmark::default(), &p).unwrap() > 0);
    }

    // ------------------------------------------------------------------
    // slippage
    // ------------------------------------------------------------------

    #[test]
    fn slippage_ramps_to_seventy_percent() {
        let max = 5 * PERCENT;
        assert_eq!(slippage_discount(max, 0, 100).unwrap(), 0);
        assert_eq!(slippage_discount(max, 50, 100).unwrap(), 175 * PERCENT / 100);
        assert_eq!(slippage_discount(max, 100, 100).unwrap(), 35 * PERCENT / 10);
        assert_eq!(slippage_discount(max, 1_000, 100).unwrap(), 35 * PERCENT / 10);
    }

    #[test]
    fn estimate_never_exceeds_undiscounted() {
        let mut e = engine();
        e.allocate(addr(1), addr(9), START_TIME, WAD, WAD, Benchmark::default()).unwrap();
        let outcome = StrategyOutcome {
            executed_at: START_TIME,
            end: START_TIME + 30 * 86_400,
            capital_allocated: WAD,
            capital_returned: WAD,
        };
        let p = MiningParameters::default();
        let full = strategy_rewards(&e, &addr(1), &outcome, &Benchmark::default(), &p).unwrap();
        let est = estimate_strategy_rewards(&e, &addr(1), &outcome, &Benchmark::default(), &p, 5 * PERCENT, 60 * 86_400)
            .unwrap();
        assert!(est < full);
        assert!(est > 0);
    }

    // ------------------------------------------------------------------
    // role split
    // ------------------------------------------------------------------

    #[test]
    fn voting_power_requires_agreement() {
        assert_eq!(voting_power(50, 100, true).unwrap(), WAD / 2);
        assert_eq!(voting_power(50, 100, false).unwrap(), 0);
        assert_eq!(voting_power(-25, 100, false).unwrap(), WAD / 4);
        assert_eq!(voting_power(-25, 100, true).unwrap(), 0);
        assert_eq!(voting_power(0, 100, true).unwrap(), 0);
    }

    #[test]
    fn nft_overlap_cases() {
        assert_eq!(nft_overlap(50, 100, 200).unwrap(), WAD);
        assert_eq!(nft_overlap(100, 100, 200).unwrap(), WAD);
        assert_eq!(nft_overlap(150, 100, 200).unwrap(), WAD / 2);
        assert_eq!(nft_overlap(200, 100, 200).unwrap(), 0);
        assert_eq!(nft_overlap(300, 100, 200).unwrap(), 0);
    }

    fn basis(profit_ratio: u128) -> RewardBasis {
        RewardBasis { reward: 1_000 * WAD, profit: 100 * WAD, profit_ratio }
    }

    #[test]
    fn strategist_doubles_on_profit() {
        let p = MiningParameters::default();
        let s = ProfitSharing::standard();
        let powers = ContributorPowers { is_strategist: true, ..Default::default() };
        let win = split_rewards(&basis(WAD), &p, &s, &powers).unwrap();
        let loss = split_rewards(&basis(WAD - 1), &p, &s, &powers).unwrap();
        assert_eq!(win.strategist_babl, 200 * WAD);
        assert_eq!(loss.strategist_babl, 100 * WAD);
        assert_eq!(win.strategist_profit, 10 * WAD);
    }

    #[test]
    fn lp_and_steward_scale_by_power() {
        let p = MiningParameters::default();
        let s = ProfitSharing::standard();
        let powers = ContributorPowers { voting_power: WAD / 2, capital_power: WAD / 4, ..Default::default() };
        let split = split_rewards(&basis(WAD), &p, &s, &powers).unwrap();
        assert_eq!(split.steward_babl, 50 * WAD);
        assert_eq!(split.lp_babl, 175 * WAD);
        assert_eq!(split.steward_profit, 25 * WAD / 10);
        assert_eq!(split.lp_profit, 20 * WAD);
        assert_eq!(split.total_babl, 225 * WAD);
        assert_eq!(split.strategist_babl, 0);
        assert_eq!(split.creator_bonus, 0);
    }

    #[test]
    fn creator_without_a_role_gets_no_bonus() {
        let p = MiningParameters::default();
        let s = ProfitSharing::standard();
        let creator = ContributorPowers { is_creator: true, ..Default::default() };
        let split = split_rewards(&basis(WAD), &p, &s, &creator).unwrap();
        assert_eq!(split.creator_bonus, 0);
        assert!(split.is_zero());
    }

    #[test]
    fn creator_bonus_is_a_tenth_of_own_role_rewards() {
        let p = MiningParameters::default();
        let s = ProfitSharing::standard();
        let creator = ContributorPowers { is_creator: true, capital_power: WAD / 4, ..Default::default() };
        let split = split_rewards(&basis(WAD), &p, &s, &creator).unwrap();
        assert_eq!(split.lp_babl, 175 * WAD);
        assert_eq!(split.creator_bonus, 175 * WAD / 10);
        assert_eq!(split.total_babl, 175 * WAD + 175 * WAD / 10);

        // Only the creator earns it.
        let lp = ContributorPowers { capital_power: WAD / 4, ..Default::default() };
        assert_eq!(split_rewards(&basis(WAD), &p, &s, &lp).unwrap().creator_bonus, 0);
    }

    #[test]
    fn creator_bonus_covers_every_role() {
        let p = MiningParameters::default();
        let s = ProfitSharing::standard();
        let creator = ContributorPowers {
            is_creator: true,
            is_strategist: true,
            voting_power: WAD / 2,
            capital_power: WAD / 4,
            ..Default::default()
        };
        let split = split_rewards(&basis(WAD), &p, &s, &creator).unwrap();
        // 200 strategist (doubled) + 50 steward + 175 LP.
        assert_eq!(split.creator_bonus, 425 * WAD / 10);
    }

    #[test]
    fn nft_bonus_scales_babl_by_overlap() {
        let p = MiningParameters::default();
        let s = ProfitSharing::standard();
        let powers = ContributorPowers {
            capital_power: WAD,
            bonus: StakedBonus { lp: 10 * PERCENT, ..Default::default() },
            bonus_overlap: WAD / 2,
            ..Default::default()
        };
        let split = split_rewards(&basis(WAD), &p, &s, &powers).unwrap();
        // 700 * (1 + 0.1 * 0.5)
        assert_eq!(split.lp_babl, 735 * WAD);
        assert_eq!(split.lp_profit, 80 * WAD);
    }

    proptest! {
        #[test]
        fn lp_shares_never_exceed_lp_pool(power in 0u128..=WAD, reward in 0u128..1_000_000 * WAD) {
            let p = MiningParameters::default();
            let s = ProfitSharing::standard();
            let b = RewardBasis { reward, profit: 0, profit_ratio: WAD };
            let powers = ContributorPowers { capital_power: power, ..Default::default() };
            let split = split_rewards(&b, &p, &s, &powers).unwrap();
            prop_assert!(split.lp_babl <= wad_mul(reward, p.lp_share).unwrap());
        }

        #[test]
        fn final_reward_monotonic_in_baseline(
            a in 0u128..1_000_000 * WAD,
            b in 0u128..1_000_000 * WAD,
            ratio in 0u128..3 * WAD,
        ) {
            let p = MiningParameters::default();
            let bm = Benchmark::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(final_reward(lo, ratio, &bm, &p).unwrap() <= final_reward(hi, ratio, &bm, &p).unwrap());
        }
    }
}
