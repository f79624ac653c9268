use std::cmp::Ordering;

use serde::Serialize;

use crate::{ArithmeticError, BasisPoints, Money};

/// Exact price per share held as a reduced rational `minor_units / shares`.
///
/// Derived prices (pre-money over a share count) are rarely whole cents; keeping
/// the ratio lets share issuance floor exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SharePrice {
    minor_units: u128,
    shares: u128,
}

impl SharePrice {
    pub fn from_money(price: Money) -> Self {
        Self {
            minor_units: price.as_u128(),
            shares: 1,
        }
    }

    pub fn from_ratio(amount: Money, shares: u64) -> Result<Self, ArithmeticError> {
        if shares == 0 {
            return Err(ArithmeticError::NonPositivePrice {
                pre_money: amount.minor_units(),
                shares,
            });
        }
        Ok(Self::reduced(amount.as_u128(), u128::from(shares)))
    }

    fn reduced(minor_units: u128, shares: u128) -> Self {
        let divisor = gcd(minor_units, shares).max(1);
        Self {
            minor_units: minor_units / divisor,
            shares: shares / divisor,
        }
    }

    pub const fn is_positive(self) -> bool {
        self.minor_units > 0 && self.shares > 0
    }

    /// Whole shares purchasable with `amount`; the fractional share is forfeited.
    pub fn shares_for(self, amount: Money) -> Result<u64, ArithmeticError> {
        let context = "share issuance";
        if !self.is_positive() {
            return Err(ArithmeticError::Overflow { context });
        }
        let shares = amount
            .as_u128()
            .checked_mul(self.shares)
            .ok_or(ArithmeticError::Overflow { context })?
            / self.minor_units;
        u64::try_from(shares).map_err(|_| ArithmeticError::Overflow { context })
    }

    /// Price reduced by `discount` (e.g. 2_000 bps pays 80% of this price).
    pub fn discounted(self, discount: BasisPoints) -> Result<Self, ArithmeticError> {
        let context = "discounted price";
        let keep = u128::from(BasisPoints::ONE_HUNDRED_PERCENT - discount.get());
        let minor_units = self
            .minor_units
            .checked_mul(keep)
            .ok_or(ArithmeticError::Overflow { context })?;
        let shares = self
            .shares
            .checked_mul(u128::from(BasisPoints::ONE_HUNDRED_PERCENT))
            .ok_or(ArithmeticError::Overflow { context })?;
        Ok(Self::reduced(minor_units, shares))
    }

    pub fn compare(self, other: Self) -> Result<Ordering, ArithmeticError> {
        let context = "price comparison";
        let left = self
            .minor_units
            .checked_mul(other.shares)
            .ok_or(ArithmeticError::Overflow { context })?;
        let right = other
            .minor_units
            .checked_mul(self.shares)
            .ok_or(ArithmeticError::Overflow { context })?;
        Ok(left.cmp(&right))
    }

    pub fn min(self, other: Self) -> Result<Self, ArithmeticError> {
        Ok(match self.compare(other)? {
            Ordering::Greater => other,
            Ordering::Less | Ordering::Equal => self,
        })
    }

    /// Price rounded down to a whole minor unit, for reporting.
    pub fn floor_money(self) -> Result<Money, ArithmeticError> {
        Money::from_u128(self.minor_units / self.shares.max(1), "price rounding")
    }

    pub fn as_f64(self) -> f64 {
        self.minor_units as f64 / self.shares as f64
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
