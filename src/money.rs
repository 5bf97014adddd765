//! Fixed-point money type used for every balance, bet, and payout figure.
//!
//! All amounts in this crate are represented with [`rust_decimal::Decimal`]
//! clamped to scale 2 (two digits after the decimal point). There is no path
//! from `f64`/`f32` into [`Money`] — money never touches floating point.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decimal scale (digits after the point) every `Money` value is rounded to.
pub const SCALE: u32 = 2;

/// A non-negative-checked-at-the-boundary fixed-point amount of scale 2.
///
/// `Money` itself does not enforce non-negativity (a ledger direction can be
/// a debit of a positive amount against a balance check performed by the
/// caller); what it guarantees is scale and the absence of float leakage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// The zero amount.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Build a `Money` from a decimal value, rounding to [`SCALE`] digits.
    pub fn new(value: Decimal) -> Self {
        Money(value.round_dp(SCALE))
    }

    /// Build a `Money` from whole-unit integer minor units (e.g. paise/cents).
    pub fn from_minor_units(minor: i64) -> Self {
        Money(Decimal::new(minor, SCALE))
    }

    /// Parse a decimal string (e.g. `"12.34"`). Rejects anything that is not
    /// a plain base-10 decimal literal.
    pub fn parse(s: &str) -> Result<Self, rust_decimal::Error> {
        Decimal::from_str(s.trim()).map(Money::new)
    }

    /// The raw `Decimal` value, for interop with `sqlx::types::Decimal` binds.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Saturating add; never panics, never silently wraps past `Decimal::MAX`.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money::new)
    }

    /// Saturating subtract.
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money::new)
    }

    /// Multiply by an integer quantity (e.g. bet amount by multiplier count).
    pub fn checked_mul_int(&self, factor: i64) -> Option<Money> {
        self.0
            .checked_mul(Decimal::from(factor))
            .map(Money::new)
    }

    /// Multiply by a decimal multiplier (e.g. the payout multiplier).
    pub fn checked_mul(&self, factor: Decimal) -> Option<Money> {
        self.0.checked_mul(factor).map(Money::new)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.round_dp(SCALE))
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        self.checked_add(rhs)
            .expect("money addition overflowed Decimal range")
    }
}

impl std::ops::Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        self.checked_sub(rhs)
            .expect("money subtraction overflowed Decimal range")
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_to_scale_two() {
        let m = Money::new(dec!(12.345));
        assert_eq!(m.to_string(), "12.35");
    }

    #[test]
    fn addition_is_exact_for_decimals() {
        let a = Money::new(dec!(0.10));
        let b = Money::new(dec!(0.20));
        assert_eq!((a + b).to_string(), "0.30");
    }

    #[test]
    fn checked_sub_detects_would_go_negative_is_caller_responsibility() {
        // Money itself allows negative results; callers (ledger) enforce I1.
        let a = Money::new(dec!(5.00));
        let b = Money::new(dec!(10.00));
        let diff = a.checked_sub(b).unwrap();
        assert!(diff.is_negative());
    }

    #[test]
    fn mul_by_multiplier() {
        let bet = Money::new(dec!(10.00));
        let payout = bet.checked_mul(dec!(10.00)).unwrap();
        assert_eq!(payout.to_string(), "100.00");
    }
}
