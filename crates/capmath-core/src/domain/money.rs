use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ArithmeticError, ValidationError};

/// Exact monetary amount in minor currency units (cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    pub const fn from_minor(minor_units: i64) -> Self {
        Self(minor_units)
    }

    /// Whole major units (dollars) converted to minor units.
    pub const fn from_major(major_units: i64) -> Self {
        Self(major_units * 100)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn ensure_non_negative(self, field: &'static str) -> Result<Self, ValidationError> {
        if self.0 < 0 {
            return Err(ValidationError::NegativeValue {
                field,
                value: self.0,
            });
        }
        Ok(self)
    }

    pub fn ensure_positive(self, field: &'static str) -> Result<Self, ValidationError> {
        self.ensure_non_negative(field)?;
        if self.0 == 0 {
            return Err(ValidationError::NonPositiveValue { field });
        }
        Ok(self)
    }

    pub fn checked_add(self, other: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ArithmeticError::Overflow {
                context: "money addition",
            })
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(ArithmeticError::Overflow {
                context: "money subtraction",
            })
    }

    /// Non-negative amount widened for intermediate products.
    pub(crate) fn as_u128(self) -> u128 {
        u128::try_from(self.0).unwrap_or(0)
    }

    pub(crate) fn from_u128(value: u128, context: &'static str) -> Result<Self, ArithmeticError> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| ArithmeticError::Overflow { context })
    }
}

/// Renders as major units with two decimals: `123450` minor units is `1234.50`.
impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Parses major units such as `20000000`, `1234.5` or `-0.75`.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidAmount {
            value: value.to_owned(),
        };
        let trimmed = value.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |part: &str| part.chars().all(|ch| ch.is_ascii_digit());
        if whole.is_empty() || fraction.len() > 2 || !all_digits(whole) || !all_digits(fraction) {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let cents: i64 = format!("{fraction:0<2}").parse().map_err(|_| invalid())?;
        let minor = whole
            .checked_mul(100)
            .and_then(|units| units.checked_add(cents))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -minor } else { minor }))
    }
}

/// Fraction expressed in basis points (`10_000` = 100%).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BasisPoints(u32);

impl BasisPoints {
    pub const ZERO: Self = Self(0);
    pub const ONE_HUNDRED_PERCENT: u32 = 10_000;

    pub const fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Accepts values in `0..=10_000`.
    pub fn ensure_at_most_whole(self, field: &'static str) -> Result<Self, ValidationError> {
        self.ensure_below(field, Self::ONE_HUNDRED_PERCENT + 1)
    }

    /// Accepts values in `0..limit`.
    pub fn ensure_below(self, field: &'static str, limit: u32) -> Result<Self, ValidationError> {
        if self.0 >= limit {
            return Err(ValidationError::BasisPointsOutOfRange {
                field,
                value: self.0,
                max: limit - 1,
            });
        }
        Ok(self)
    }

    /// `floor(amount * bps / 10_000)`.
    pub fn apply_floor(self, amount: u128) -> Result<u128, ArithmeticError> {
        mul_div_floor(
            amount,
            u128::from(self.0),
            u128::from(Self::ONE_HUNDRED_PERCENT),
            "basis point scaling",
        )
    }

    pub fn as_fraction(self) -> f64 {
        f64::from(self.0) / f64::from(Self::ONE_HUNDRED_PERCENT)
    }
}

/// `floor(a * b / d)` with overflow reported instead of wrapped.
pub(crate) fn mul_div_floor(
    a: u128,
    b: u128,
    d: u128,
    context: &'static str,
) -> Result<u128, ArithmeticError> {
    if d == 0 {
        return Err(ArithmeticError::Overflow { context });
    }
    a.checked_mul(b)
        .map(|product| product / d)
        .ok_or(ArithmeticError::Overflow { context })
}

/// Ownership percentage in `[0, 100]` for display; never used for money.
pub(crate) fn percentage_of(part: u128, whole: u128) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Splits `amount` across `weights` proportionally, flooring each share.
///
/// Units lost to flooring go to the largest weight (first one on ties), so the
/// parts always sum to `amount` when at least one weight is non-zero. With all
/// weights zero nothing is allocated.
pub(crate) fn split_pro_rata(amount: u128, weights: &[u128]) -> Result<Vec<u128>, ArithmeticError> {
    let total_weight = weights
        .iter()
        .try_fold(0u128, |acc, weight| acc.checked_add(*weight))
        .ok_or(ArithmeticError::Overflow {
            context: "pro rata weight total",
        })?;

    if total_weight == 0 {
        return Ok(vec![0; weights.len()]);
    }

    let mut parts = weights
        .iter()
        .map(|weight| mul_div_floor(amount, *weight, total_weight, "pro rata split"))
        .collect::<Result<Vec<_>, _>>()?;

    let allocated: u128 = parts.iter().sum();
    let leftover = amount - allocated;
    if leftover > 0 {
        let largest = weights
            .iter()
            .enumerate()
            .fold(0usize, |best, (index, weight)| {
                if *weight > weights[best] {
                    index
                } else {
                    best
                }
            });
        parts[largest] += leftover;
    }

    Ok(parts)
}
