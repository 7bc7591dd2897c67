//! Contributor share ledger.
//!
//! Append-only balance checkpoints per (garden, contributor) plus the
//! garden's total supply, recorded from deposit, withdrawal and burn events.
//!
//! # Flash-deposit guard
//!
//! [`ContributorShareLedger::get_prior_balance`] only sees checkpoints
//! strictly before the queried timestamp. A deposit can never vouch for a
//! balance at its own timestamp; one block later it counts.
//!
//! # Share over a window
//!
//! [`ContributorShareLedger::get_safe_user_share`] integrates
//! `balance / supply` over the window and divides by its length. The result
//! is recomputed from checkpoints on every call and nothing is cached, so a
//! burn or withdrawal after the window cannot change it. At the window's
//! opening instant a balance counts at the lower of its value before and
//! after that timestamp: a same-second deposit earns nothing and a
//! same-second withdrawal keeps nothing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use babl_core::constants::WAD;
use babl_core::error::{LedgerError, MathError};
use babl_core::math::{clamp_unit, ratio_or_zero};
use babl_core::types::Address;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BalanceCheckpoint {
    pub block: u64,
    pub timestamp: u64,
    pub balance: u128,
}

/// How a share balance changes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareChange {
    Deposit(u128),
    Withdraw(u128),
    /// Penalty burn. Not a contributor action.
    Burn(u128),
}

impl ShareChange {
    fn apply_to(self, current: u128) -> Result<u128, LedgerError> {
        match self {
            ShareChange::Deposit(n) => Ok(current.checked_add(n).ok_or(MathError::Overflow)?),
            ShareChange::Withdraw(n) | ShareChange::Burn(n) => current
                .checked_sub(n)
                .ok_or(LedgerError::BalanceUnderflow { have: current, remove: n }),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct BalanceLog {
    checkpoints: Vec<BalanceCheckpoint>,
}

impl BalanceLog {
    fn current(&self) -> u128 {
        self.checkpoints.last().map_or(0, |c| c.balance)
    }

    fn check_order(&self, timestamp: u64) -> Result<(), LedgerError> {
        match self.checkpoints.last() {
            Some(last) if timestamp < last.timestamp => {
                Err(LedgerError::OutOfOrder { last: last.timestamp, got: timestamp })
            }
            _ => Ok(()),
        }
    }

    /// Balance of the last checkpoint strictly before `timestamp`.
    fn prior(&self, timestamp: u64) -> u128 {
        let idx = self.checkpoints.partition_point(|c| c.timestamp < timestamp);
        idx.checked_sub(1).map_or(0, |i| self.checkpoints[i].balance)
    }

    /// Balance of the last checkpoint at or before `timestamp`.
    fn at(&self, timestamp: u64) -> u128 {
        let idx = self.checkpoints.partition_point(|c| c.timestamp <= timestamp);
        idx.checked_sub(1).map_or(0, |i| self.checkpoints[i].balance)
    }

    /// Balance of the last checkpoint in a block strictly before `block`.
    fn prior_block(&self, block: u64) -> u128 {
        let idx = self.checkpoints.partition_point(|c| c.block < block);
        idx.checked_sub(1).map_or(0, |i| self.checkpoints[i].balance)
    }

    /// Lower of the balance before and at `timestamp`.
    fn opening(&self, timestamp: u64) -> u128 {
        self.prior(timestamp).min(self.at(timestamp))
    }

    /// Checkpoint timestamps strictly inside `(from, to)`.
    fn timestamps_inside(&self, from: u64, to: u64) -> impl Iterator<Item = u64> + '_ {
        let lo = self.checkpoints.partition_point(|c| c.timestamp <= from);
        let hi = self.checkpoints.partition_point(|c| c.timestamp < to);
        self.checkpoints[lo..hi.max(lo)].iter().map(|c| c.timestamp)
    }
}

#[derive(Clone, Debug, Default)]
struct GardenShares {
    supply: BalanceLog,
    contributors: HashMap<Address, BalanceLog>,
}

#[derive(Clone, Debug, Default)]
pub struct ContributorShareLedger {
    gardens: HashMap<Address, GardenShares>,
}

impl ContributorShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// New `(balance, supply)` if `change` were applied, or why it cannot be.
    pub fn preview(
        &self,
        garden: &Address,
        contributor: &Address,
        timestamp: u64,
        change: ShareChange,
    ) -> Result<(u128, u128), LedgerError> {
        let shares = self.gardens.get(garden);
        let empty = BalanceLog::default();
        let supply_log = shares.map_or(&empty, |g| &g.supply);
        let user_log = shares.and_then(|g| g.contributors.get(contributor)).unwrap_or(&empty);
        supply_log.check_order(timestamp)?;
        user_log.check_order(timestamp)?;
        Ok((change.apply_to(user_log.current())?, change.apply_to(supply_log.current())?))
    }

    /// Apply a balance change, checkpointing both the contributor and the
    /// garden supply. Returns the contributor's new balance.
    pub fn apply(
        &mut self,
        garden: Address,
        contributor: Address,
        block: u64,
        timestamp: u64,
        change: ShareChange,
    ) -> Result<u128, LedgerError> {
        let (balance, supply) = self.preview(&garden, &contributor, timestamp, change)?;

        let shares = self.gardens.entry(garden).or_default();
        shares.supply.checkpoints.push(BalanceCheckpoint { block, timestamp, balance: supply });
        shares
            .contributors
            .entry(contributor)
            .or_default()
            .checkpoints
            .push(BalanceCheckpoint { block, timestamp, balance });
        debug!(
            garden = %garden.short(),
            contributor = %contributor.short(),
            block,
            timestamp,
            ?change,
            balance,
            supply,
            "balance checkpoint"
        );
        Ok(balance)
    }

    pub fn deposit(
        &mut self,
        garden: Address,
        contributor: Address,
        block: u64,
        timestamp: u64,
        shares: u128,
    ) -> Result<u128, LedgerError> {
        self.apply(garden, contributor, block, timestamp, ShareChange::Deposit(shares))
    }

    pub fn withdraw(
        &mut self,
        garden: Address,
        contributor: Address,
        block: u64,
        timestamp: u64,
        shares: u128,
    ) -> Result<u128, LedgerError> {
        self.apply(garden, contributor, block, timestamp, ShareChange::Withdraw(shares))
    }

    pub fn burn(
        &mut self,
        garden: Address,
        contributor: Address,
        block: u64,
        timestamp: u64,
        shares: u128,
    ) -> Result<u128, LedgerError> {
        self.apply(garden, contributor, block, timestamp, ShareChange::Burn(shares))
    }

    fn log(&self, garden: &Address, contributor: &Address) -> Option<&BalanceLog> {
        self.gardens.get(garden).and_then(|g| g.contributors.get(contributor))
    }

    /// Balance held strictly before `timestamp`.
    pub fn get_prior_balance(&self, garden: &Address, contributor: &Address, timestamp: u64) -> u128 {
        self.log(garden, contributor).map_or(0, |l| l.prior(timestamp))
    }

    /// Balance held at the end of the block before `block`.
    pub fn get_prior_balance_at_block(&self, garden: &Address, contributor: &Address, block: u64) -> u128 {
        self.log(garden, contributor).map_or(0, |l| l.prior_block(block))
    }

    pub fn get_current_balance(&self, garden: &Address, contributor: &Address) -> u128 {
        self.log(garden, contributor).map_or(0, |l| l.current())
    }

    pub fn total_supply(&self, garden: &Address) -> u128 {
        self.gardens.get(garden).map_or(0, |g| g.supply.current())
    }

    /// Whether `contributor` ever held a position in `garden`.
    pub fn is_contributor(&self, garden: &Address, contributor: &Address) -> bool {
        self.log(garden, contributor).is_some_and(|l| !l.checkpoints.is_empty())
    }

    pub fn checkpoints(&self, garden: &Address, contributor: &Address) -> &[BalanceCheckpoint] {
        self.log(garden, contributor).map_or(&[], |l| &l.checkpoints)
    }

    /// Time-weighted share of the garden supply held over `[from, to)`, as a
    /// wad in `[0, 1]`.
    ///
    /// The first segment uses the opening balances at `from`, the lower of
    /// the balance before and at `from`, for the contributor and the supply
    /// alike. Later segments start at checkpoint timestamps and use the last
    /// checkpoint at that instant. Segments with zero supply count as zero.
    /// An empty window returns the opening share at `from`.
    pub fn get_safe_user_share(
        &self,
        garden: &Address,
        contributor: &Address,
        from: u64,
        to: u64,
    ) -> Result<u128, MathError> {
        let Some(shares) = self.gardens.get(garden) else {
            return Ok(0);
        };
        let Some(user) = shares.contributors.get(contributor) else {
            return Ok(0);
        };
        let supply = &shares.supply;

        if to <= from {
            return Ok(clamp_unit(ratio_or_zero(user.opening(from), supply.opening(from))?));
        }

        let mut points: Vec<u64> = user
            .timestamps_inside(from, to)
            .chain(supply.timestamps_inside(from, to))
            .collect();
        points.sort_unstable();
        points.dedup();

        let mut acc: u128 = 0;
        let mut cursor = from;
        let mut first = true;
        for next in points.into_iter().chain(std::iter::once(to)) {
            let (bal, sup) = if first {
                (user.opening(cursor), supply.opening(cursor))
            } else {
                (user.at(cursor), supply.at(cursor))
            };
            let share = clamp_unit(ratio_or_zero(bal, sup)?);
            let weighted = share.checked_mul((next - cursor) as u128).ok_or(MathError::Overflow)?;
            acc = acc.checked_add(weighted).ok_or(MathError::Overflow)?;
            cursor = next;
            first = false;
        }
        Ok((acc / (to - from) as u128).min(WAD))
    }
}
