//! Monetary amounts backed by rust_decimal.
//!
//! Account balances are mutated with relative SQL increments, so amounts are
//! persisted as integer minor units (poisha) and converted at the repository
//! boundary. JSON serialization stays a plain number to match the upstream
//! storefront documents.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A monetary amount in taka, exact to two decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] Decimal);

// Request amounts round to two places on entry, so responses always echo
// what gets persisted.
impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = rust_decimal::serde::float::deserialize(deserializer)?;
        Ok(Money::new(value))
    }
}

/// Discrepancy tolerance for the self-healing balance recompute, in minor units.
pub const BALANCE_TOLERANCE_MINOR: i64 = 1;

impl Money {
    pub fn new(value: Decimal) -> Self {
        Money(value.round_dp(2))
    }

    /// Amount from integer minor units (1 taka = 100 minor units).
    pub fn from_minor(minor: i64) -> Self {
        Money(Decimal::new(minor, 2))
    }

    /// Integer minor units for storage.
    ///
    /// The inner value is always rounded to two places, so this is lossless.
    pub fn to_minor(&self) -> i64 {
        (self.0 * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Apply a percentage rate, rounding the result to two places.
    pub fn percent(&self, rate: Decimal) -> Money {
        Money((self.0 * rate / Decimal::ONE_HUNDRED).round_dp(2))
    }

    pub fn inner(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Money::new)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_unit_roundtrip() {
        for s in ["0", "1", "99.99", "1234.5", "-50.25"] {
            let m = Money::from_str(s).unwrap();
            assert_eq!(Money::from_minor(m.to_minor()), m, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn new_rounds_to_two_places() {
        let m = Money::new(Decimal::from_str("10.005").unwrap());
        assert_eq!(m.to_minor(), 1000); // banker's rounding at the half
        let m = Money::new(Decimal::from_str("10.006").unwrap());
        assert_eq!(m.to_minor(), 1001);
    }

    #[test]
    fn percent_of_order_total() {
        let total = Money::from_str("1000").unwrap();
        let commission = total.percent(Decimal::from_str("5").unwrap());
        assert_eq!(commission, Money::from_str("50").unwrap());

        let commission = total.percent(Decimal::from_str("7.5").unwrap());
        assert_eq!(commission, Money::from_str("75").unwrap());
    }

    #[test]
    fn percent_rounds_half_cents() {
        let total = Money::from_str("333.33").unwrap();
        let commission = total.percent(Decimal::from_str("5").unwrap());
        // 16.6665 rounds to 16.67 (round half to even on the last digit)
        assert_eq!(commission.to_minor(), 1667);
    }

    #[test]
    fn arithmetic_and_ordering() {
        let a = Money::from_str("100").unwrap();
        let b = Money::from_str("40.50").unwrap();
        assert_eq!(a - b, Money::from_str("59.50").unwrap());
        assert_eq!(a + b, Money::from_str("140.50").unwrap());
        assert!(b < a);
        assert!((b - a).0.is_sign_negative());
    }

    #[test]
    fn request_amounts_round_on_deserialize() {
        let m: Money = serde_json::from_str("50.005").unwrap();
        assert_eq!(m, Money::from_str("50").unwrap());
        let m: Money = serde_json::from_str("50.006").unwrap();
        assert_eq!(m, Money::from_str("50.01").unwrap());
        assert_eq!(serde_json::to_value(m).unwrap().to_string(), "50.01");
    }

    #[test]
    fn serializes_as_json_number() {
        let m = Money::from_str("123.45").unwrap();
        let json = serde_json::to_value(m).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.45");
    }
}
