//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Exchange modal, floating point:                                        │
//! │    remove 3 × 33.3, add 1 × 99.9 → difference 0.0000000000001  ❌      │
//! │                                                                         │
//! │  Repeated add/remove on the basket accumulates that drift.              │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    3 × 3330 = 9990, 1 × 9990 = 9990 → difference 0                     │
//! │    Rounding happens in exactly one place: VAT on the aggregate          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use exchange_core::money::Money;
//!
//! let price = Money::from_minor(1099); // 10.99
//! let doubled = price * 2;              // 21.98
//! let total = price + Money::from_major(5); // 15.99
//! assert_eq!(total.minor(), 1599);
//! assert_eq!(doubled.minor(), 2198);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Minor units per major unit (100 poisha to the taka, 100 cents to the dollar).
pub const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: the exchange difference is negative when a refund is owed
/// - **Single field tuple struct**: zero-cost abstraction over i64
///
/// ## Where Money Flows
/// ```text
/// OriginalLineItem.unit_price ──► LineItemSelector.total ──┐
///                                                          ├─► difference
/// ReplacementLine.unit_price ──► Basket.subtotal ──► VAT ──┘       │
///                                                                  ▼
/// TenderSplit (cash / card / wallets) ──────────────────► Settlement
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use exchange_core::money::Money;
    ///
    /// let price = Money::from_minor(1099);
    /// assert_eq!(price.minor(), 1099);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from whole major units (a note's face value).
    ///
    /// ```rust
    /// use exchange_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(500).minor(), 50_000);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Creates a Money value from major and minor parts.
    ///
    /// For negative amounts only the major part carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * MINOR_PER_MAJOR - minor)
        } else {
            Money(major * MINOR_PER_MAJOR + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the whole major units, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor part (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
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

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Calculates VAT on this amount, rounding half-up to the nearest minor unit.
    ///
    /// ## Rounding
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  ROUND HALF UP (away from zero)                                     │
    /// │                                                                     │
    /// │    16.65 → 17      16.49 → 16      -16.5 → -17                      │
    /// │                                                                     │
    /// │  Applied ONCE to the basket subtotal, never per line:               │
    /// │    3 lines × 111 at 5% per line: 6 + 6 + 6 = 18                     │
    /// │    aggregate 333 at 5%:          round(16.65) = 17                  │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ```rust
    /// use exchange_core::money::Money;
    /// use exchange_core::types::TaxRate;
    ///
    /// let vat = Money::from_minor(333).calculate_tax(TaxRate::from_bps(500));
    /// assert_eq!(vat.minor(), 17);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 so large subtotals times basis points cannot overflow
        let scaled = self.0 as i128 * rate.bps() as i128;
        let half = 5_000i128;
        let rounded = if scaled >= 0 {
            (scaled + half) / 10_000
        } else {
            (scaled - half) / 10_000
        };
        Money::from_minor(rounded as i64)
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// ```rust
    /// use exchange_core::money::Money;
    ///
    /// let line = Money::from_minor(299).multiply_quantity(3);
    /// assert_eq!(line.minor(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `multiply_quantity` that returns `None` instead of overflowing.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Addition that returns `None` instead of overflowing.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `major.minor` without a currency symbol.
///
/// The symbol comes from configuration; this is for logs and debugging.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_and_major() {
        let money = Money::from_minor(1099);
        assert_eq!(money.minor(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor_part(), 99);

        assert_eq!(Money::from_major(1700).minor(), 170_000);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).minor(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).minor(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(1099).to_string(), "10.99");
        assert_eq!(Money::from_minor(500).to_string(), "5.00");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((b - a).minor(), -500);
        assert_eq!((-a).minor(), -1000);
        assert_eq!((a * 3).minor(), 3000);
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::from_minor(i64::MAX / 2);
        assert_eq!(Money::from_minor(299).checked_multiply_quantity(3), Some(Money::from_minor(897)));
        assert!(price.checked_multiply_quantity(3).is_none());
        assert!(price.checked_add(price).is_some());
        assert!(price.checked_add(price + Money::from_minor(2)).is_none());
    }

    #[test]
    fn test_sum() {
        let lines = [Money::from_minor(100), Money::from_minor(250), Money::from_minor(-50)];
        let total: Money = lines.iter().sum();
        assert_eq!(total.minor(), 300);

        let empty: Money = Vec::<Money>::new().into_iter().sum();
        assert!(empty.is_zero());
    }

    #[test]
    fn test_tax_half_up() {
        // 333 at 5% = 16.65 → 17
        assert_eq!(Money::from_minor(333).calculate_tax(TaxRate::from_bps(500)).minor(), 17);
        // 330 at 5% = 16.5 → 17
        assert_eq!(Money::from_minor(330).calculate_tax(TaxRate::from_bps(500)).minor(), 17);
        // 329 at 5% = 16.45 → 16
        assert_eq!(Money::from_minor(329).calculate_tax(TaxRate::from_bps(500)).minor(), 16);
        // negatives round away from zero
        assert_eq!(Money::from_minor(-330).calculate_tax(TaxRate::from_bps(500)).minor(), -17);
    }

    #[test]
    fn test_tax_zero_rate() {
        let vat = Money::from_minor(123_456).calculate_tax(TaxRate::zero());
        assert!(vat.is_zero());
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_minor(-60).floor_zero(), Money::zero());
        assert_eq!(Money::from_minor(60).floor_zero().minor(), 60);
    }

    /// Adding and removing the same line a thousand times leaves no residue.
    #[test]
    fn test_no_drift_on_repeated_add_remove() {
        let line = Money::from_minor(3333);
        let mut running = Money::zero();
        for _ in 0..1000 {
            running += line;
            running -= line;
        }
        assert!(running.is_zero());
    }
}
