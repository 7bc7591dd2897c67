//! Claim bookkeeping: nonces and per-strategy claimed-at markers.
//!
//! One [`ClaimRecord`] per (garden, contributor). A strategy marked claimed
//! never pays that contributor again. The nonce moves forward on every
//! successful claim and every deposit or withdrawal, so a signed payload is
//! usable at most once and only until the contributor's position changes.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use babl_core::error::RewardsError;
use babl_core::types::Address;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimRecord {
    pub nonce: u64,
    /// Strategy → timestamp it was claimed at.
    pub claimed_at: BTreeMap<Address, u64>,
    pub total_babl_claimed: u128,
    pub total_profit_claimed: u128,
}

#[derive(Clone, Debug, Default)]
pub struct ClaimProcessor {
    records: HashMap<(Address, Address), ClaimRecord>,
}

impl ClaimProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, garden: &Address, contributor: &Address) -> Option<&ClaimRecord> {
        self.records.get(&(*garden, *contributor))
    }

    /// The nonce the next signed payload must carry.
    pub fn nonce(&self, garden: &Address, contributor: &Address) -> u64 {
        self.record(garden, contributor).map_or(0, |r| r.nonce)
    }

    pub fn check_nonce(&self, garden: &Address, contributor: &Address, got: u64) -> Result<(), RewardsError> {
        let expected = self.nonce(garden, contributor);
        if got != expected {
            return Err(RewardsError::InvalidNonce { expected, got });
        }
        Ok(())
    }

    /// Advance the nonce. Returns the new value.
    pub fn bump_nonce(&mut self, garden: Address, contributor: Address) -> u64 {
        let rec = self.records.entry((garden, contributor)).or_default();
        rec.nonce += 1;
        rec.nonce
    }

    pub fn claimed_at(&self, garden: &Address, contributor: &Address, strategy: &Address) -> Option<u64> {
        self.record(garden, contributor)
            .and_then(|r| r.claimed_at.get(strategy).copied())
    }

    pub fn is_claimed(&self, garden: &Address, contributor: &Address, strategy: &Address) -> bool {
        self.claimed_at(garden, contributor, strategy).is_some()
    }

    /// Mark `strategies` claimed at `timestamp`, add the paid totals and
    /// advance the nonce.
    pub fn settle(
        &mut self,
        garden: Address,
        contributor: Address,
        strategies: &[Address],
        timestamp: u64,
        babl: u128,
        profit: u128,
    ) -> u64 {
        let rec = self.records.entry((garden, contributor)).or_default();
        for s in strategies {
            rec.claimed_at.entry(*s).or_insert(timestamp);
        }
        rec.total_babl_claimed = rec.total_babl_claimed.saturating_add(babl);
        rec.total_profit_claimed = rec.total_profit_claimed.saturating_add(profit);
        rec.nonce += 1;
        rec.nonce
    }
}
