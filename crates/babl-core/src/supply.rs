//! Quarterly BABL emission schedule.
//!
//! Quarter 1 emits [`FIRST_QUARTER_SUPPLY`]; every following quarter emits
//! 12% less than the one before:
//!
//! `supply(q) = FIRST_QUARTER_SUPPLY / 1.12^(q - 1)`
//!
//! The geometric series sums to roughly 500,000 BABL. The decay factor is
//! evaluated as `(1/1.12)^(q-1)` at 10^36 precision, so the curve floors to
//! exactly zero by value (quarter 463 onwards) well before the hard
//! [`SUPPLY_CUTOFF_QUARTER`] guard. No quarter index can overflow.
//!
//! Quarters:
//! - Quarter 1 spans `[start, start + EPOCH_DURATION)`
//! - Quarter 2 spans `[start + EPOCH_DURATION, start + 2 * EPOCH_DURATION)`
//! - …

use crate::constants::{
    DECAY_RATE, FIRST_QUARTER_SUPPLY, PERCENT, RAY36, SUPPLY_CUTOFF_QUARTER,
};
use crate::error::QuarterError;
use crate::math::{fixed_pow, mul_div};

/// `1 / (1 + DECAY_RATE)` at 10^36 precision.
const INVERSE_DECAY_BASE: u128 = RAY36 * 100 / (100 + DECAY_RATE / PERCENT);

/// BABL emitted during quarter `quarter`.
///
/// Returns 0 for quarter 0 (there is none) and for every quarter at or past
/// [`SUPPLY_CUTOFF_QUARTER`].
pub fn supply_for_quarter(quarter: u64) -> u128 {
    if quarter == 0 || quarter >= SUPPLY_CUTOFF_QUARTER {
        return 0;
    }
    let factor = match fixed_pow(INVERSE_DECAY_BASE, quarter - 1, RAY36) {
        Ok(f) => f,
        Err(_) => return 0,
    };
    mul_div(FIRST_QUARTER_SUPPLY, factor, RAY36).unwrap_or(0)
}

/// Like [`supply_for_quarter`] but rejects quarter 0.
pub fn checked_supply_for_quarter(quarter: u64) -> Result<u128, QuarterError> {
    if quarter == 0 {
        return Err(QuarterError::ZeroQuarter);
    }
    Ok(supply_for_quarter(quarter))
}

/// Which quarter a timestamp falls in, counting from 1 at `start`.
pub fn quarter_for_timestamp(start: u64, epoch: u64, timestamp: u64) -> Result<u64, QuarterError> {
    if timestamp < start {
        return Err(QuarterError::BeforeStart(timestamp));
    }
    Ok((timestamp - start) / epoch + 1)
}

/// First second of `quarter`.
///
/// Saturates for absurd quarter indices instead of wrapping.
pub fn quarter_start(start: u64, epoch: u64, quarter: u64) -> u64 {
    start.saturating_add(quarter.saturating_sub(1).saturating_mul(epoch))
}

/// First second after `quarter` ends.
pub fn quarter_end(start: u64, epoch: u64, quarter: u64) -> u64 {
    start.saturating_add(quarter.saturating_mul(epoch))
}

/// Total BABL emitted in quarters `1..=quarter`.
pub fn cumulative_supply(quarter: u64) -> u128 {
    let last = quarter.min(SUPPLY_CUTOFF_QUARTER);
    let mut total: u128 = 0;
    for q in 1..=last {
        let s = supply_for_quarter(q);
        if s == 0 {
            break;
        }
        total = total.saturating_add(s);
    }
    total
}

/// The last quarter with a non-zero emission.
pub fn last_emitting_quarter() -> u64 {
    for q in (1..SUPPLY_CUTOFF_QUARTER).rev() {
        if supply_for_quarter(q) > 0 {
            return q;
        }
    }
    0
}
