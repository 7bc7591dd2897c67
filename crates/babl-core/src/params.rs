//! Governance-controlled mining parameters.
//!
//! Pure data plus validation. Writes go through
//! [`MiningParameters::validate`] before they can reach the distributor, so
//! an invalid set is never observable.

use serde::{Deserialize, Serialize};

use crate::constants::{PERCENT, WAD};
use crate::error::ParameterError;
use crate::types::ProfitSharing;

/// Profit-ratio bands and the multipliers applied in each.
///
/// | Profit ratio              | Multiplier |
/// |---------------------------|------------|
/// | `< low_threshold`         | `penalty_seg1` |
/// | `< high_threshold`        | `penalty_seg2` |
/// | otherwise                 | `boost_seg3`   |
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Benchmark {
    pub low_threshold: u128,
    pub high_threshold: u128,
    pub penalty_seg1: u128,
    pub penalty_seg2: u128,
    pub boost_seg3: u128,
}

impl Benchmark {
    /// Build from the governance 5-tuple
    /// `(lowThreshold, highThreshold, penaltySeg1, penaltySeg2, boostSeg3)`.
    pub fn from_array(values: [u128; 5]) -> Self {
        Self {
            low_threshold: values[0],
            high_threshold: values[1],
            penalty_seg1: values[2],
            penalty_seg2: values[3],
            boost_seg3: values[4],
        }
    }

    pub fn to_array(&self) -> [u128; 5] {
        [
            self.low_threshold,
            self.high_threshold,
            self.penalty_seg1,
            self.penalty_seg2,
            self.boost_seg3,
        ]
    }

    /// Multiplier for a given profit ratio (wad).
    pub fn multiplier(&self, profit_ratio: u128) -> u128 {
        if profit_ratio < self.low_threshold {
            self.penalty_seg1
        } else if profit_ratio < self.high_threshold {
            self.penalty_seg2
        } else {
            self.boost_seg3
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.low_threshold >= self.high_threshold {
            return Err(ParameterError::ThresholdOrder {
                low: self.low_threshold,
                high: self.high_threshold,
            });
        }
        if self.penalty_seg1 > self.penalty_seg2 || self.penalty_seg2 > self.boost_seg3 {
            return Err(ParameterError::SegmentOrder {
                seg1: self.penalty_seg1,
                seg2: self.penalty_seg2,
                seg3: self.boost_seg3,
            });
        }
        if self.boost_seg3 < WAD {
            return Err(ParameterError::BoostIsPenalty(self.boost_seg3));
        }
        Ok(())
    }
}

impl Default for Benchmark {
    fn default() -> Self {
        Self {
            low_threshold: 90 * PERCENT,
            high_threshold: 103 * PERCENT,
            penalty_seg1: 50 * PERCENT,
            penalty_seg2: WAD,
            boost_seg3: 120 * PERCENT,
        }
    }
}

/// Reward split and formula weights.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MiningParameters {
    pub strategist_share: u128,
    pub steward_share: u128,
    pub lp_share: u128,
    pub creator_bonus: u128,
    pub profit_weight: u128,
    pub principal_weight: u128,
    pub benchmark: Benchmark,
}

impl Default for MiningParameters {
    fn default() -> Self {
        Self {
            strategist_share: 10 * PERCENT,
            steward_share: 10 * PERCENT,
            lp_share: 70 * PERCENT,
            creator_bonus: 10 * PERCENT,
            profit_weight: 65 * PERCENT,
            principal_weight: 35 * PERCENT,
            benchmark: Benchmark::default(),
        }
    }
}

impl MiningParameters {
    /// Check every invariant: role shares sum to 100%, the two weights sum to
    /// 100%, and the benchmark is ordered.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let roles = self
            .strategist_share
            .checked_add(self.steward_share)
            .and_then(|v| v.checked_add(self.lp_share))
            .and_then(|v| v.checked_add(self.creator_bonus))
            .unwrap_or(u128::MAX);
        if roles != WAD {
            return Err(ParameterError::RoleSplit(roles));
        }
        let weights = self
            .profit_weight
            .checked_add(self.principal_weight)
            .unwrap_or(u128::MAX);
        if weights != WAD {
            return Err(ParameterError::WeightSplit(weights));
        }
        self.benchmark.validate()
    }
}

impl ProfitSharing {
    /// Default garden profit sharing: 10% strategist, 5% stewards, 80% LPs.
    pub fn standard() -> Self {
        Self {
            strategist: 10 * PERCENT,
            steward: 5 * PERCENT,
            lp: 80 * PERCENT,
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        let total = self
            .strategist
            .checked_add(self.steward)
            .and_then(|v| v.checked_add(self.lp))
            .unwrap_or(u128::MAX);
        if total > WAD {
            return Err(ParameterError::ProfitSharing(total));
        }
        Ok(())
    }
}

impl Default for ProfitSharing {
    fn default() -> Self {
        Self::standard()
    }
}
