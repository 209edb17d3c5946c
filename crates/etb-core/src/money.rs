//! Monetary amounts.
//!
//! Amounts are kept as `Decimal` rounded to two places and persisted as
//! integer minor units (cents) so SQL sums stay exact.

use std::{
    fmt,
    iter::Sum,
    ops::{Add, Sub},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};

use crate::{errors::Error, Result};

const SCALE: u32 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, SCALE))
    }

    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    pub fn cents(&self) -> Result<i64> {
        (self.0 * Decimal::ONE_HUNDRED)
            .trunc()
            .to_i64()
            .ok_or_else(|| Error::Parse(format!("amount out of range: {self}")))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Divide by a day count (or any positive count). A zero divisor yields zero.
    pub fn div_count(&self, count: u32) -> Money {
        if count == 0 {
            return Money::ZERO;
        }
        Money::new(self.0 / Decimal::from(count))
    }

    pub fn mul_count(&self, count: u32) -> Money {
        Money::new(self.0 * Decimal::from(count))
    }

    /// `self - other`, floored at zero.
    pub fn saturating_sub(&self, other: Money) -> Money {
        if other >= *self {
            Money::ZERO
        } else {
            *self - other
        }
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Accepts plain decimals with optional thousands separators (`1,250.5`).
    fn from_str(s: &str) -> Result<Self> {
        let cleaned = s.trim().replace(',', "");
        if cleaned.is_empty() {
            return Err(Error::Parse("empty amount".to_string()));
        }
        let value = Decimal::from_str(&cleaned)
            .map_err(|e| Error::Parse(format!("invalid amount {s:?}: {e}")))?;
        Ok(Money::new(value))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thousands_separators_and_rounds() {
        let m: Money = "1,250.555".parse().unwrap();
        assert_eq!(m.to_string(), "1250.56");
        assert_eq!(m.cents().unwrap(), 125_056);
    }

    #[test]
    fn displays_two_decimals_for_whole_amounts() {
        assert_eq!(Money::from_units(50).to_string(), "50.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
    }

    #[test]
    fn rejects_garbage() {
        assert!("abc".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
        assert!("12..5".parse::<Money>().is_err());
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let budget = Money::from_units(100);
        assert_eq!(budget.saturating_sub(Money::from_units(30)), Money::from_units(70));
        assert_eq!(budget.saturating_sub(Money::from_units(130)), Money::ZERO);
    }

    #[test]
    fn div_count_handles_zero() {
        assert_eq!(Money::from_units(10).div_count(0), Money::ZERO);
        assert_eq!(Money::from_units(10).div_count(3).to_string(), "3.33");
    }
}
