//! Fixed-point arithmetic on wad-scaled `u128` values.
//!
//! All computation is integer-only. Products are formed in a 256-bit
//! intermediate so that `a * b / d` is exact whenever the final quotient fits
//! in a `u128`; anything that does not fit is reported, never wrapped.

use crate::constants::WAD;
use crate::error::MathError;

/// Full 256-bit product of two `u128`s as `(high, low)`.
fn full_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let lo_lo = a_lo * b_lo;
    let hi_lo = a_hi * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_hi = a_hi * b_hi;

    // Middle column: carries from the cross terms.
    let mid = (lo_lo >> 64) + (hi_lo & MASK) + (lo_hi & MASK);
    let low = (lo_lo & MASK) | (mid << 64);
    let high = hi_hi + (hi_lo >> 64) + (lo_hi >> 64) + (mid >> 64);
    (high, low)
}

/// `floor(a * b / denominator)` without intermediate overflow.
///
/// Fails with [`MathError::Overflow`] if the quotient does not fit in a `u128`.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let (high, low) = full_mul(a, b);
    if high == 0 {
        return Ok(low / denominator);
    }
    if high >= denominator {
        return Err(MathError::Overflow);
    }

    // Restoring long division of the 256-bit value by `denominator`, one bit
    // of `low` at a time. `rem` stays below `denominator` throughout.
    let mut rem = high;
    let mut quotient: u128 = 0;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((low >> i) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= denominator {
            rem = rem.wrapping_sub(denominator);
            quotient |= 1;
        }
    }
    Ok(quotient)
}

/// Wad multiplication: `a * b / WAD`.
pub fn wad_mul(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, b, WAD)
}

/// Wad division: `a * WAD / b`.
pub fn wad_div(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, WAD, b)
}

/// Ratio `a / b` as a wad, with `0 / 0 == 0`.
///
/// Used for power and share ratios where an empty denominator means the
/// numerator is necessarily empty too.
pub fn ratio_or_zero(a: u128, b: u128) -> Result<u128, MathError> {
    if b == 0 {
        return Ok(0);
    }
    wad_div(a, b)
}

/// Fixed-point exponentiation: computes `(base/precision)^exp` in fixed-point.
///
/// Uses binary exponentiation for O(log n) multiplications. Every step is
/// floored, so for `base <= precision` the result never exceeds `precision`
/// and reaches exactly zero once the true value drops below one unit.
pub fn fixed_pow(base: u128, exp: u64, precision: u128) -> Result<u128, MathError> {
    if precision == 0 {
        return Err(MathError::DivisionByZero);
    }
    if exp == 0 {
        return Ok(precision);
    }

    let mut result = precision;
    let mut b = base;
    let mut e = exp;

    while e > 0 {
        if e & 1 == 1 {
            result = mul_div(result, b, precision)?;
        }
        e >>= 1;
        if e > 0 {
            b = mul_div(b, b, precision)?;
        }
        if result == 0 {
            break;
        }
    }

    Ok(result)
}

/// Clamp a ratio into `[0, WAD]`.
pub fn clamp_unit(value: u128) -> u128 {
    value.min(WAD)
}
