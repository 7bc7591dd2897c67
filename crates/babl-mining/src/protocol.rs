//! Protocol-wide principal ledger and quarter aggregates.
//!
//! Every capital change of every strategy lands here as one checkpoint, so
//! the protocol power of a quarter is the denominator of each strategy's
//! power ratio.

use serde::{Deserialize, Serialize};
use tracing::debug;

use babl_core::error::{LedgerError, MathError};
use babl_core::supply::supply_for_quarter;

use crate::ledger::{PowerLedger, QuarterClock};

/// Direction and size of a principal change, in the reference asset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapitalChange {
    Allocated(u128),
    Unwound(u128),
}

impl CapitalChange {
    /// Principal after applying this change to `current`.
    pub fn apply_to(self, current: u128) -> Result<u128, LedgerError> {
        match self {
            CapitalChange::Allocated(amount) => {
                Ok(current.checked_add(amount).ok_or(MathError::Overflow)?)
            }
            CapitalChange::Unwound(amount) => current
                .checked_sub(amount)
                .ok_or(LedgerError::PrincipalUnderflow { have: current, remove: amount }),
        }
    }
}

/// Result of [`ProtocolLedger::check_protocol`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ProtocolCheckpoint {
    pub principal: u128,
    pub time: u64,
    pub quarter: u64,
    pub pointer: u64,
    pub power: u128,
}

/// Result of [`ProtocolLedger::check_quarter`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct QuarterView {
    pub quarter: u64,
    pub supply: u128,
    pub power: u128,
    pub pointer_count: u64,
}

#[derive(Clone, Debug)]
pub struct ProtocolLedger {
    ledger: PowerLedger,
}

impl ProtocolLedger {
    pub fn new(clock: QuarterClock) -> Self {
        Self { ledger: PowerLedger::new(clock) }
    }

    /// Apply a principal change at `timestamp` and return the new aggregate.
    pub fn record_capital_change(&mut self, timestamp: u64, change: CapitalChange) -> Result<u128, LedgerError> {
        let principal = change.apply_to(self.ledger.principal())?;
        let cp = self.ledger.record(timestamp, principal)?;
        debug!(
            timestamp,
            quarter = cp.quarter,
            pointer = cp.pointer,
            principal,
            "protocol checkpoint"
        );
        Ok(principal)
    }

    /// The checkpoint recorded at `timestamp`, or the most recent one before.
    /// All zero if nothing was recorded yet.
    pub fn check_protocol(&self, timestamp: u64) -> ProtocolCheckpoint {
        self.ledger
            .checkpoint_at(timestamp)
            .map(|cp| ProtocolCheckpoint {
                principal: cp.principal,
                time: cp.timestamp,
                quarter: cp.quarter,
                pointer: cp.pointer,
                power: cp.power,
            })
            .unwrap_or_default()
    }

    pub fn check_quarter(&self, quarter: u64) -> QuarterView {
        let rec = self.ledger.quarter(quarter);
        QuarterView {
            quarter,
            supply: supply_for_quarter(quarter),
            power: rec.power,
            pointer_count: rec.pointer_count,
        }
    }

    /// Protocol power inside `quarter`, up to `until`.
    pub fn power_in_quarter(&self, quarter: u64, until: u64) -> Result<u128, MathError> {
        self.ledger.power_in_quarter(quarter, until)
    }

    pub fn principal(&self) -> u128 {
        self.ledger.principal()
    }

    pub fn ledger(&self) -> &PowerLedger {
        &self.ledger
    }
}
