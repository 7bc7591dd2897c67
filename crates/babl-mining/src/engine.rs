//! Mining engine: keeps the protocol ledger and the strategy ledgers in step.
//!
//! Every capital change is written to the strategy's own ledger and, with
//! the same reference-asset amount, to the protocol ledger. Preconditions
//! for both writes are checked before either happens, so a rejected change
//! leaves both ledgers untouched.

use babl_core::error::LedgerError;
use babl_core::params::Benchmark;
use babl_core::types::Address;

use crate::ledger::QuarterClock;
use crate::protocol::{CapitalChange, ProtocolCheckpoint, ProtocolLedger, QuarterView};
use crate::strategy::{MiningSnapshot, StrategyMiningLedger};

#[derive(Clone, Debug)]
pub struct MiningEngine {
    clock: QuarterClock,
    protocol: ProtocolLedger,
    strategies: StrategyMiningLedger,
}

impl MiningEngine {
    pub fn new(clock: QuarterClock) -> Self {
        Self {
            clock,
            protocol: ProtocolLedger::new(clock),
            strategies: StrategyMiningLedger::new(clock),
        }
    }

    pub fn clock(&self) -> QuarterClock {
        self.clock
    }

    pub fn protocol(&self) -> &ProtocolLedger {
        &self.protocol
    }

    pub fn strategies(&self) -> &StrategyMiningLedger {
        &self.strategies
    }

    /// Fail unless the protocol ledger would accept a checkpoint at
    /// `timestamp` applying `change`.
    fn precheck(&self, timestamp: u64, change: CapitalChange) -> Result<(), LedgerError> {
        self.clock.quarter_of(timestamp)?;
        let ledger = self.protocol.ledger();
        if let Some(last) = ledger.last() {
            if timestamp < last.timestamp {
                return Err(LedgerError::OutOfOrder { last: last.timestamp, got: timestamp });
            }
        }
        change.apply_to(self.protocol.principal())?;
        ledger.power_at(timestamp)?;
        Ok(())
    }

    /// Deploy `amount` reserve units into `strategy` at `price`.
    /// Returns the reference-asset principal added.
    pub fn allocate(
        &mut self,
        strategy: Address,
        garden: Address,
        timestamp: u64,
        amount: u128,
        price: u128,
        benchmark: Benchmark,
    ) -> Result<u128, LedgerError> {
        let added = babl_core::math::wad_mul(amount, price)?;
        self.precheck(timestamp, CapitalChange::Allocated(added))?;
        let added = self.strategies.allocate(strategy, garden, timestamp, amount, price, benchmark)?;
        self.protocol.record_capital_change(timestamp, CapitalChange::Allocated(added))?;
        Ok(added)
    }

    /// Return `amount` reserve units from `strategy`.
    /// Returns the reference-asset principal removed.
    pub fn unwind(&mut self, strategy: &Address, timestamp: u64, amount: u128) -> Result<u128, LedgerError> {
        // Strategy principal is always covered by protocol principal, so the
        // protocol subtraction cannot underflow once the strategy accepts.
        self.precheck(timestamp, CapitalChange::Unwound(0))?;
        let removed = self.strategies.unwind(strategy, timestamp, amount)?;
        self.protocol.record_capital_change(timestamp, CapitalChange::Unwound(removed))?;
        Ok(removed)
    }

    /// Unwind whatever `strategy` still has deployed and freeze its ledger.
    /// Returns the principal removed.
    pub fn finalize(&mut self, strategy: &Address, timestamp: u64) -> Result<u128, LedgerError> {
        let outstanding = match self.strategies.record(strategy) {
            Some(rec) if rec.finalized => return Err(LedgerError::Finalized),
            Some(rec) => rec.pre_allocated,
            None => 0,
        };
        let removed = if outstanding > 0 {
            self.unwind(strategy, timestamp, outstanding)?
        } else {
            0
        };
        self.strategies.finalize(strategy)?;
        Ok(removed)
    }

    pub fn check_protocol(&self, timestamp: u64) -> ProtocolCheckpoint {
        self.protocol.check_protocol(timestamp)
    }

    pub fn check_quarter(&self, quarter: u64) -> QuarterView {
        self.protocol.check_quarter(quarter)
    }

    pub fn check_mining(&self, quarter: u64, strategy: &Address) -> MiningSnapshot {
        self.strategies.check_mining(quarter, strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babl_core::constants::WAD;

    fn addr(b: u8) -> Address {
        Address([b; 32])
    }

    fn engine() -> MiningEngine {
        MiningEngine::new(QuarterClock::new(1_000, 10_000))
    }

    #[test]
    fn allocation_reaches_both_ledgers() {
        let mut e = engine();
        e.allocate(addr(1), addr(9), 1_000, 2 * WAD, WAD, Benchmark::default()).unwrap();
        e.allocate(addr(2), addr(9), 1_100, 3 * WAD, 2 * WAD, Benchmark::default()).unwrap();
        assert_eq!(e.protocol().principal(), 8 * WAD);
        assert_eq!(e.strategies().record(&addr(2)).unwrap().principal(), 6 * WAD);
    }

    #[test]
    fn out_of_order_touches_nothing() {
        let mut e = engine();
        e.allocate(addr(1), addr(9), 2_000, WAD, WAD, Benchmark::default()).unwrap();
        let err = e.allocate(addr(2), addr(9), 1_500, WAD, WAD, Benchmark::default());
        assert_eq!(err, Err(LedgerError::OutOfOrder { last: 2_000, got: 1_500 }));
        assert!(e.strategies().record(&addr(2)).is_none());
        assert_eq!(e.protocol().ledger().len(), 1);
    }

    #[test]
    fn finalize_unwinds_remaining_principal() {
        let mut e = engine();
        e.allocate(addr(1), addr(9), 1_000, 5 * WAD, WAD / 3, Benchmark::default()).unwrap();
        e.unwind(&addr(1), 1_500, 2 * WAD).unwrap();
        e.finalize(&addr(1), 2_000).unwrap();
        assert_eq!(e.protocol().principal(), 0);
        assert_eq!(e.strategies().record(&addr(1)).unwrap().principal(), 0);
        assert_eq!(e.finalize(&addr(1), 2_100), Err(LedgerError::Finalized));
    }

    #[test]
    fn three_strategies_converge_to_zero() {
        let mut e = engine();
        let prices = [WAD, 3 * WAD / 7, 11 * WAD / 13];
        for (i, price) in prices.iter().enumerate() {
            e.allocate(addr(i as u8 + 1), addr(9), 1_000 + i as u64, 10 * WAD, *price, Benchmark::default())
                .unwrap();
        }
        for i in 0..3u8 {
            e.finalize(&addr(i + 1), 5_000 + i as u64).unwrap();
        }
        assert_eq!(e.protocol().principal(), 0);
    }
}
