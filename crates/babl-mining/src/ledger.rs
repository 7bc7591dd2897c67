//! Time-weighted principal ledger.
//!
//! [`PowerLedger`] is an append-only log of principal checkpoints. Between two
//! checkpoints the principal is constant, so the principal × time integral
//! ("power") up to any instant is exact:
//!
//! `power(t) = cp.power + cp.principal * (t - cp.timestamp)` for the last
//! checkpoint `cp` at or before `t`.
//!
//! The same structure backs the protocol-wide ledger and every per-strategy
//! ledger. Power accrued inside each quarter is additionally aggregated in a
//! [`QuarterRecord`], split at quarter boundaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use babl_core::config::EngineConfig;
use babl_core::constants::{EPOCH_DURATION, START_TIME};
use babl_core::error::{LedgerError, MathError, QuarterError};
use babl_core::supply;

/// Maps timestamps to quarter indices.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuarterClock {
    pub start: u64,
    pub epoch: u64,
}

impl QuarterClock {
    pub fn new(start: u64, epoch: u64) -> Self {
        Self { start, epoch }
    }

    pub fn quarter_of(&self, timestamp: u64) -> Result<u64, QuarterError> {
        supply::quarter_for_timestamp(self.start, self.epoch, timestamp)
    }

    pub fn quarter_start(&self, quarter: u64) -> u64 {
        supply::quarter_start(self.start, self.epoch, quarter)
    }

    pub fn quarter_end(&self, quarter: u64) -> u64 {
        supply::quarter_end(self.start, self.epoch, quarter)
    }
}

impl Default for QuarterClock {
    fn default() -> Self {
        Self::new(START_TIME, EPOCH_DURATION)
    }
}

impl From<&EngineConfig> for QuarterClock {
    fn from(cfg: &EngineConfig) -> Self {
        Self::new(cfg.start_time, cfg.epoch_duration)
    }
}

/// One principal change.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Checkpoint {
    pub timestamp: u64,
    /// Principal in force from `timestamp` on.
    pub principal: u128,
    pub quarter: u64,
    /// Position in the log.
    pub pointer: u64,
    /// Power accumulated from the first checkpoint up to `timestamp`.
    pub power: u128,
}

/// Aggregate of one quarter.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct QuarterRecord {
    /// Power accrued inside the quarter, up to the latest checkpoint.
    pub power: u128,
    /// Checkpoints recorded in the quarter.
    pub pointer_count: u64,
}

/// Append-only principal log with exact power integrals.
#[derive(Clone, Debug)]
pub struct PowerLedger {
    clock: QuarterClock,
    checkpoints: Vec<Checkpoint>,
    quarters: BTreeMap<u64, QuarterRecord>,
}

impl PowerLedger {
    pub fn new(clock: QuarterClock) -> Self {
        Self {
            clock,
            checkpoints: Vec::new(),
            quarters: BTreeMap::new(),
        }
    }

    pub fn clock(&self) -> QuarterClock {
        self.clock
    }

    /// Append a checkpoint setting the principal to `principal` at `timestamp`.
    ///
    /// Several checkpoints may share a timestamp; the last one wins for
    /// lookups at that instant.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::OutOfOrder`] if `timestamp` precedes the last checkpoint
    /// - [`LedgerError::Quarter`] if `timestamp` precedes the clock start
    /// - [`LedgerError::Math`] if the power integral overflows
    pub fn record(&mut self, timestamp: u64, principal: u128) -> Result<Checkpoint, LedgerError> {
        let quarter = self.clock.quarter_of(timestamp)?;
        let pointer = self.checkpoints.len() as u64;

        let (power, accrued) = match self.checkpoints.last() {
            Some(last) => {
                if timestamp < last.timestamp {
                    return Err(LedgerError::OutOfOrder { last: last.timestamp, got: timestamp });
                }
                if quarter < last.quarter {
                    return Err(LedgerError::CorruptQuarterOrder(quarter));
                }
                let accrued = self.split_by_quarter(last.timestamp, timestamp, last.principal)?;
                let span = accrue(last.principal, timestamp - last.timestamp)?;
                let power = last.power.checked_add(span).ok_or(MathError::Overflow)?;
                (power, accrued)
            }
            None => (0, Vec::new()),
        };

        // Validated; commit.
        for (q, p) in accrued {
            let rec = self.quarters.entry(q).or_default();
            rec.power = rec.power.saturating_add(p);
        }
        self.quarters.entry(quarter).or_default().pointer_count += 1;

        let cp = Checkpoint { timestamp, principal, quarter, pointer, power };
        self.checkpoints.push(cp);
        Ok(cp)
    }

    /// Power contributed by `principal` held over `[from, to)`, per quarter.
    fn split_by_quarter(&self, from: u64, to: u64, principal: u128) -> Result<Vec<(u64, u128)>, LedgerError> {
        let mut out = Vec::new();
        if principal == 0 || to <= from {
            return Ok(out);
        }
        let mut q = self.clock.quarter_of(from)?;
        let mut cursor = from;
        while cursor < to {
            let seg_end = self.clock.quarter_end(q).min(to);
            out.push((q, accrue(principal, seg_end - cursor)?));
            cursor = seg_end;
            q += 1;
        }
        Ok(out)
    }

    /// Current principal.
    pub fn principal(&self) -> u128 {
        self.checkpoints.last().map_or(0, |c| c.principal)
    }

    pub fn last(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    pub fn first(&self) -> Option<&Checkpoint> {
        self.checkpoints.first()
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// The last checkpoint at or before `timestamp`.
    pub fn checkpoint_at(&self, timestamp: u64) -> Option<&Checkpoint> {
        let idx = self.checkpoints.partition_point(|c| c.timestamp <= timestamp);
        idx.checked_sub(1).map(|i| &self.checkpoints[i])
    }

    /// Principal in force at `timestamp`.
    pub fn principal_at(&self, timestamp: u64) -> u128 {
        self.checkpoint_at(timestamp).map_or(0, |c| c.principal)
    }

    /// Power accumulated up to `timestamp`.
    pub fn power_at(&self, timestamp: u64) -> Result<u128, MathError> {
        match self.checkpoint_at(timestamp) {
            Some(cp) => {
                let tail = accrue(cp.principal, timestamp - cp.timestamp)?;
                cp.power.checked_add(tail).ok_or(MathError::Overflow)
            }
            None => Ok(0),
        }
    }

    /// Power accumulated over `[from, to)`.
    pub fn power_between(&self, from: u64, to: u64) -> Result<u128, MathError> {
        if to <= from {
            return Ok(0);
        }
        Ok(self.power_at(to)?.saturating_sub(self.power_at(from)?))
    }

    /// Power accumulated inside `quarter`, counting nothing after `until`.
    pub fn power_in_quarter(&self, quarter: u64, until: u64) -> Result<u128, MathError> {
        let start = self.clock.quarter_start(quarter);
        let end = self.clock.quarter_end(quarter).min(until);
        self.power_between(start, end)
    }

    /// Recorded aggregate for `quarter`.
    pub fn quarter(&self, quarter: u64) -> QuarterRecord {
        self.quarters.get(&quarter).copied().unwrap_or_default()
    }

    /// Quarters with at least one checkpoint or accrued power.
    pub fn quarters(&self) -> impl Iterator<Item = (u64, &QuarterRecord)> {
        self.quarters.iter().map(|(q, r)| (*q, r))
    }
}

fn accrue(principal: u128, seconds: u64) -> Result<u128, MathError> {
    principal.checked_mul(seconds as u128).ok_or(MathError::Overflow)
}
