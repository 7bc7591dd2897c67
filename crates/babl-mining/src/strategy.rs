//! Per-strategy mining ledger.
//!
//! Each strategy keeps its own principal log in the reference asset plus the
//! bookkeeping needed to unwind it symmetrically: the reserve-asset capital
//! still deployed and the weighted-average entry price it was converted at.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use babl_core::constants::WAD;
use babl_core::error::{LedgerError, MathError};
use babl_core::math::{mul_div, wad_mul};
use babl_core::params::Benchmark;
use babl_core::supply::supply_for_quarter;
use babl_core::types::Address;

use crate::ledger::{PowerLedger, QuarterClock};

/// Mining state of one strategy.
#[derive(Clone, Debug)]
pub struct StrategyMiningRecord {
    pub garden: Address,
    ledger: PowerLedger,
    /// Reference units per reserve unit, averaged over allocations.
    pub entry_price: u128,
    /// Reserve-asset capital still deployed.
    pub pre_allocated: u128,
    /// Benchmark in force when the strategy first received capital.
    pub benchmark: Benchmark,
    pub finalized: bool,
}

impl StrategyMiningRecord {
    pub fn ledger(&self) -> &PowerLedger {
        &self.ledger
    }

    pub fn principal(&self) -> u128 {
        self.ledger.principal()
    }
}

/// Result of [`StrategyMiningLedger::check_mining`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MiningSnapshot {
    pub quarter: u64,
    /// Strategy principal at the end of the quarter (or now, if open).
    pub principal: u128,
    pub supply: u128,
    pub entry_price: u128,
    pub pre_allocated: u128,
    /// `(low, high, seg1, seg2, seg3)`.
    pub benchmark: [u128; 5],
}

#[derive(Clone, Debug)]
pub struct StrategyMiningLedger {
    clock: QuarterClock,
    records: HashMap<Address, StrategyMiningRecord>,
}

impl StrategyMiningLedger {
    pub fn new(clock: QuarterClock) -> Self {
        Self { clock, records: HashMap::new() }
    }

    pub fn record(&self, strategy: &Address) -> Option<&StrategyMiningRecord> {
        self.records.get(strategy)
    }

    pub fn contains(&self, strategy: &Address) -> bool {
        self.records.contains_key(strategy)
    }

    /// Deploy `amount` of reserve capital converted at `price` (reference
    /// units per reserve unit). Creates the record on first allocation.
    ///
    /// Returns the principal added, in the reference asset.
    pub fn allocate(
        &mut self,
        strategy: Address,
        garden: Address,
        timestamp: u64,
        amount: u128,
        price: u128,
        benchmark: Benchmark,
    ) -> Result<u128, LedgerError> {
        let added = wad_mul(amount, price)?;
        match self.records.get_mut(&strategy) {
            Some(rec) => {
                if rec.finalized {
                    return Err(LedgerError::Finalized);
                }
                let pre = rec.pre_allocated.checked_add(amount).ok_or(MathError::Overflow)?;
                // Weighted average of the old and new conversion prices.
                let value = wad_mul(rec.pre_allocated, rec.entry_price)?
                    .checked_add(added)
                    .ok_or(MathError::Overflow)?;
                let entry = if pre == 0 { price } else { mul_div(value, WAD, pre)? };
                let principal = rec.principal().checked_add(added).ok_or(MathError::Overflow)?;
                rec.ledger.record(timestamp, principal)?;
                rec.pre_allocated = pre;
                rec.entry_price = entry;
            }
            None => {
                let mut ledger = PowerLedger::new(self.clock);
                ledger.record(timestamp, added)?;
                self.records.insert(
                    strategy,
                    StrategyMiningRecord {
                        garden,
                        ledger,
                        entry_price: price,
                        pre_allocated: amount,
                        benchmark,
                        finalized: false,
                    },
                );
            }
        }
        debug!(strategy = %strategy.short(), timestamp, amount, added, "capital allocated");
        Ok(added)
    }

    /// Return `amount` of reserve capital. Principal leaves at the entry
    /// price; unwinding everything that is deployed clears the principal
    /// exactly.
    ///
    /// Returns the principal removed, in the reference asset.
    pub fn unwind(&mut self, strategy: &Address, timestamp: u64, amount: u128) -> Result<u128, LedgerError> {
        let rec = self
            .records
            .get(strategy)
            .ok_or(LedgerError::PrincipalUnderflow { have: 0, remove: amount })?;
        if rec.finalized {
            return Err(LedgerError::Finalized);
        }
        if amount > rec.pre_allocated {
            return Err(LedgerError::PrincipalUnderflow { have: rec.pre_allocated, remove: amount });
        }
        let principal = rec.principal();
        let removed = if amount == rec.pre_allocated {
            principal
        } else {
            wad_mul(amount, rec.entry_price)?.min(principal)
        };
        let pre_allocated = rec.pre_allocated - amount;
        let entry_price = rec.entry_price;
        self.update_strategy_checkpoint(strategy, timestamp, principal - removed, entry_price)?;
        if let Some(rec) = self.records.get_mut(strategy) {
            rec.pre_allocated = pre_allocated;
        }
        Ok(removed)
    }

    /// Write a raw checkpoint for an existing strategy.
    pub fn update_strategy_checkpoint(
        &mut self,
        strategy: &Address,
        timestamp: u64,
        principal: u128,
        entry_price: u128,
    ) -> Result<(), LedgerError> {
        let rec = self
            .records
            .get_mut(strategy)
            .ok_or(LedgerError::PrincipalUnderflow { have: 0, remove: principal })?;
        if rec.finalized {
            return Err(LedgerError::Finalized);
        }
        let cp = rec.ledger.record(timestamp, principal)?;
        rec.entry_price = entry_price;
        debug!(
            strategy = %strategy.short(),
            timestamp,
            quarter = cp.quarter,
            principal,
            "strategy checkpoint"
        );
        Ok(())
    }

    /// Freeze the record. Further writes fail with [`LedgerError::Finalized`].
    pub fn finalize(&mut self, strategy: &Address) -> Result<(), LedgerError> {
        match self.records.get_mut(strategy) {
            Some(rec) if rec.finalized => Err(LedgerError::Finalized),
            Some(rec) => {
                rec.finalized = true;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Mining view of `strategy` in `quarter`.
    ///
    /// For the zero address or an unknown strategy only `quarter` and
    /// `supply` are filled in.
    pub fn check_mining(&self, quarter: u64, strategy: &Address) -> MiningSnapshot {
        let supply = supply_for_quarter(quarter);
        let rec = match self.records.get(strategy) {
            Some(rec) if !strategy.is_zero() => rec,
            _ => return MiningSnapshot { quarter, supply, ..Default::default() },
        };
        let quarter_last_second = self.clock.quarter_end(quarter).saturating_sub(1);
        MiningSnapshot {
            quarter,
            principal: rec.ledger.principal_at(quarter_last_second),
            supply,
            entry_price: rec.entry_price,
            pre_allocated: rec.pre_allocated,
            benchmark: rec.benchmark.to_array(),
        }
    }

    /// Strategy power inside `quarter`, up to `until`. Zero for unknown strategies.
    pub fn power_in_quarter(&self, strategy: &Address, quarter: u64, until: u64) -> Result<u128, MathError> {
        match self.records.get(strategy) {
            Some(rec) => rec.ledger.power_in_quarter(quarter, until),
            None => Ok(0),
        }
    }
}
