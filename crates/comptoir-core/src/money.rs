//! # Money Module
//!
//! Provides the `Money` type used for every price, discount and total.
//!
//! ## Integer Minor Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Amounts are i64 in the smallest currency unit (cents, centimes...).    │
//! │                                                                         │
//! │    1000 × 2 items        = 2000                                         │
//! │    10% of 2000 (1000bps) = (2000 × 1000 + 5000) / 10000 = 200           │
//! │    total                 = 1800                                         │
//! │                                                                         │
//! │  Percentages travel as basis points (1 bps = 0.01%), never as floats.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use comptoir_core::money::Money;
//!
//! let price = Money::from_minor(1000);
//! let subtotal = price.multiply_quantity(2);
//! assert_eq!(subtotal.percentage(1000).minor(), 200);
//! assert_eq!(subtotal.format_with(2, "€"), "20.00 €");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// One hundred percent in basis points.
pub const FULL_BPS: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed so that intermediate subtractions (subtotal minus discount) can be
/// computed before being clamped with [`Money::clamp_non_negative`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use comptoir_core::money::Money;
    ///
    /// let price = Money::from_minor(500);
    /// assert_eq!(price.minor(), 500);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns `self` or zero, whichever is larger.
    ///
    /// Every total shown to the operator passes through here.
    #[inline]
    pub const fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ```rust
    /// use comptoir_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(299);
    /// assert_eq!(unit_price.multiply_quantity(3).minor(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Computes `bps` basis points of this amount, rounding half up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, widened to i128 so that
    /// large order totals cannot overflow.
    ///
    /// ```rust
    /// use comptoir_core::money::Money;
    ///
    /// // 8.25% of 10.00 = 0.825 → 0.83
    /// assert_eq!(Money::from_minor(1000).percentage(825).minor(), 83);
    /// ```
    pub fn percentage(&self, bps: i64) -> Money {
        let amount = (self.0 as i128 * bps as i128 + 5000) / FULL_BPS as i128;
        Money(amount.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Formats with an explicit number of decimals and a currency symbol.
    ///
    /// The dashboard formats amounts itself; this is for logs, receipts and
    /// notifications produced server-side.
    ///
    /// ```rust
    /// use comptoir_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(150050).format_with(2, "€"), "1500.50 €");
    /// assert_eq!(Money::from_minor(2500).format_with(0, "FCFA"), "2500 FCFA");
    /// ```
    pub fn format_with(&self, decimals: u32, symbol: &str) -> String {
        format!("{} {symbol}", self.to_decimal_string(decimals))
    }

    /// Renders the amount as a plain decimal string (`"12.50"`), the form
    /// payment providers expect in their JSON bodies.
    pub fn to_decimal_string(&self, decimals: u32) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if decimals == 0 {
            return format!("{sign}{abs}");
        }
        let divisor = 10u64.pow(decimals);
        format!(
            "{sign}{}.{:0width$}",
            abs / divisor,
            abs % divisor,
            width = decimals as usize
        )
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain two-decimal rendering, for debugging.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(1099).to_string(), "10.99");
        assert_eq!(Money::from_minor(500).to_string(), "5.00");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.minor(), 2000);
    }

    #[test]
    fn test_percentage_rounding() {
        // 10% of 2000
        assert_eq!(Money::from_minor(2000).percentage(1000).minor(), 200);
        // 8.25% of 1000 = 82.5 → 83
        assert_eq!(Money::from_minor(1000).percentage(825).minor(), 83);
        // 100%
        assert_eq!(Money::from_minor(1234).percentage(FULL_BPS).minor(), 1234);
        assert_eq!(Money::from_minor(1234).percentage(0).minor(), 0);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_minor(-1).clamp_non_negative(), Money::zero());
        assert_eq!(
            Money::from_minor(42).clamp_non_negative(),
            Money::from_minor(42)
        );
    }

    #[test]
    fn test_format_with() {
        assert_eq!(Money::from_minor(150050).format_with(2, "€"), "1500.50 €");
        assert_eq!(Money::from_minor(5).format_with(2, "€"), "0.05 €");
        assert_eq!(Money::from_minor(-550).format_with(2, "$"), "-5.50 $");
        assert_eq!(Money::from_minor(2500).format_with(0, "FCFA"), "2500 FCFA");
        assert_eq!(Money::from_minor(1250).to_decimal_string(2), "12.50");
    }

    #[test]
    fn test_saturating_does_not_panic() {
        let max = Money::from_minor(i64::MAX);
        assert_eq!((max + Money::from_minor(1)).minor(), i64::MAX);
        assert_eq!(max.multiply_quantity(2).minor(), i64::MAX);
    }

    #[test]
    fn test_serde_is_transparent_number() {
        let json = serde_json::to_string(&Money::from_minor(1800)).unwrap();
        assert_eq!(json, "1800");
        let back: Money = serde_json::from_str("500").unwrap();
        assert_eq!(back.minor(), 500);
    }
}
