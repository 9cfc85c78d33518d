use std::fmt;

use ethers_core::types::{U256, U512};

use crate::error::{CoreError, Result};

pub const BPS_DENOMINATOR: u64 = 10_000;

/// Largest power of ten that fits in a `U256`.
const MAX_U256_EXP10: u32 = 77;

pub fn pow10(exp: u32) -> Result<U256> {
    if exp > MAX_U256_EXP10 {
        return Err(CoreError::Overflow("power of ten"));
    }
    Ok(U256::exp10(exp as usize))
}

/// Converts a human decimal string such as `"1.25"` into raw units.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid_amount(input, "empty amount"));
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (trimmed, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(CoreError::invalid_amount(input, "no digits"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::invalid_amount(input, "not a decimal number"));
    }
    if frac.len() > decimals as usize {
        return Err(CoreError::invalid_amount(
            input,
            "more fractional digits than the token supports",
        ));
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(frac);
    digits.extend(std::iter::repeat('0').take(decimals as usize - frac.len()));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|_| CoreError::Overflow("parsed amount"))
}

/// `floor(a * b / c)`, branching on a zero divisor before dividing.
pub fn mul_div(a: U256, b: U256, c: U256, what: &'static str) -> Result<U256> {
    if c.is_zero() {
        return Err(CoreError::DivisionByZero(what));
    }
    let quotient = a.full_mul(b) / U512::from(c);
    U256::try_from(quotient).map_err(|_| CoreError::Overflow(what))
}

/// Renders `value / 10^decimals` with exactly `precision` fractional digits.
pub fn format_units(value: U256, decimals: u8, precision: usize) -> String {
    // Any U256 over a scale past 512 bits truncates to zero.
    match U512::from(10u8).checked_pow(U512::from(decimals)) {
        Some(scale) => fixed_string(U512::from(value), scale, precision),
        None => fixed_string(U512::zero(), U512::one(), precision),
    }
}

/// Truncating decimal rendering of `numer / denom`. `denom` must be non-zero
/// and `precision` a display precision (a handful of digits).
fn fixed_string(numer: U512, denom: U512, precision: usize) -> String {
    let (whole, rem) = numer.div_mod(denom);
    if precision == 0 {
        return whole.to_string();
    }
    let frac = rem * U512::exp10(precision) / denom;
    format!("{}.{:0>width$}", whole, frac.to_string(), width = precision)
}

/// Drops a trailing fractional zero run, and the point if nothing is left.
pub fn trim_trailing_zeros(fixed: &str) -> String {
    match fixed.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => fixed.to_string(),
    }
}

/// An exact non-negative rational with a non-zero denominator.
#[derive(Debug, Clone, Copy)]
pub struct Fraction {
    numer: U256,
    denom: U256,
}

impl Fraction {
    /// Returns `None` when `denom` is zero; callers decide which error that is.
    pub fn new(numer: U256, denom: U256) -> Option<Self> {
        if denom.is_zero() {
            None
        } else {
            Some(Fraction { numer, denom })
        }
    }

    /// True when the value lies in `[0, 1]`.
    pub fn is_unit_interval(&self) -> bool {
        self.numer <= self.denom
    }

    /// `floor(value * self)`.
    pub fn scale(&self, value: U256) -> Result<U256> {
        mul_div(value, self.numer, self.denom, "scaled amount")
    }

    /// `floor(value * self * (1 - bps/10000))` as a single truncation.
    pub fn scale_discounted(&self, value: U256, bps: u64) -> Result<U256> {
        self.scale_by_factor(value, BPS_DENOMINATOR.saturating_sub(bps))
    }

    /// `floor(value * self * (1 + bps/10000))` as a single truncation.
    pub fn scale_with_premium(&self, value: U256, bps: u64) -> Result<U256> {
        self.scale_by_factor(value, BPS_DENOMINATOR + bps)
    }

    fn scale_by_factor(&self, value: U256, factor: u64) -> Result<U256> {
        let numer = value
            .full_mul(self.numer)
            .checked_mul(U512::from(factor))
            .ok_or(CoreError::Overflow("slippage bound"))?;
        let denom = self.denom.full_mul(U256::from(BPS_DENOMINATOR));
        U256::try_from(numer / denom).map_err(|_| CoreError::Overflow("slippage bound"))
    }

    /// JavaScript `toFixed` with truncation instead of rounding.
    pub fn to_fixed(&self, precision: usize) -> String {
        fixed_string(U512::from(self.numer), U512::from(self.denom), precision)
    }

    pub fn percent(&self, precision: usize) -> String {
        fixed_string(
            U512::from(self.numer) * U512::from(100u8),
            U512::from(self.denom),
            precision,
        )
    }
}

impl PartialEq for Fraction {
    fn eq(&self, other: &Self) -> bool {
        self.numer.full_mul(other.denom) == other.numer.full_mul(self.denom)
    }
}

impl Eq for Fraction {}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}
