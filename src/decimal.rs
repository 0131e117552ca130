use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

/// currency amount, rounded to 2 decimal places
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const SCALE: u32 = 2;

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.round_dp(Self::SCALE))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money::from_decimal(Decimal::from_str(s)?))
    }

    /// create from whole currency units
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from minor units (kobo, cents)
    pub fn from_minor(amount: i64) -> Self {
        Money::from_decimal(Decimal::new(amount, Self::SCALE))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// addition that reports overflow instead of panicking
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// total of `amounts`, or `None` on overflow
    pub fn checked_sum<I>(amounts: I) -> Option<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// subtraction floored at zero
    pub fn saturating_sub(self, other: Self) -> Self {
        (self - other).max(Money::ZERO)
    }

    /// apply a rate (e.g. 10% of 100,000 = 10,000)
    pub fn apply(&self, rate: Rate) -> Self {
        Money::from_decimal(self.0 * rate.as_decimal())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i64> for Money {
    fn from(i: i64) -> Self {
        Money::from_major(i)
    }
}

// the operator impls panic on overflow like `Decimal`; totals over stored
// rows go through `checked_add` / `checked_sum`
impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 -= other.0;
    }
}

impl Mul<Rate> for Money {
    type Output = Money;

    fn mul(self, rate: Rate) -> Money {
        self.apply(rate)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

/// ratio type for repayment and deduction rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);
    pub const ONE: Rate = Rate(Decimal::ONE);

    /// create from decimal (e.g., 0.10 for 10%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from percentage (e.g., 10 for 10%)
    pub fn from_percentage(p: u32) -> Self {
        Rate(Decimal::from(p) / Decimal::from(100))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_decimal(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rounds_to_currency_scale() {
        let m = Money::from_str_exact("100.125").unwrap();
        assert_eq!(m.as_decimal(), dec!(100.12)); // banker's rounding
        assert_eq!(Money::from_minor(12_345).to_string(), "123.45");
    }

    #[test]
    fn test_ten_percent_repayment() {
        let principal = Money::from_major(100_000);
        assert_eq!(principal * Rate::from_percentage(10), Money::from_major(10_000));

        let odd = Money::from_str_exact("12345.67").unwrap();
        assert_eq!(odd.apply(Rate::from_percentage(10)).as_decimal(), dec!(1234.57));
    }

    #[test]
    fn test_sum_and_saturating_sub() {
        let total: Money = [Money::from_major(300), Money::from_major(200)].iter().sum();
        assert_eq!(total, Money::from_major(500));
        assert_eq!(Money::from_major(10).saturating_sub(total), Money::ZERO);
    }

    #[test]
    fn test_checked_sum_overflow() {
        let half = Money::from_decimal(Decimal::MAX / Decimal::from(2));
        assert_eq!(half.checked_add(half), None);
        assert_eq!(Money::checked_sum([half, half, Money::from_major(1)]), None);
        assert_eq!(
            Money::checked_sum([Money::from_major(300), Money::from_major(200)]),
            Some(Money::from_major(500))
        );
        assert_eq!(Money::checked_sum(Vec::new()), Some(Money::ZERO));
    }

    #[test]
    fn test_deserialize_rounds_to_currency_scale() {
        let m: Money = serde_json::from_str("\"1.006\"").unwrap();
        assert_eq!(m.as_decimal(), dec!(1.01));

        let json = serde_json::to_string(&Money::from_minor(12_345)).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::from_minor(12_345));
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate::from_percentage(10).to_string(), "10%");
    }
}
