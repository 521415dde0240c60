//! # Money Module
//!
//! Provides the `Money` type for every price, fee, discount and total.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ORDER TOTAL INVARIANT                                                  │
//! │                                                                         │
//! │    total == subtotal + shipping_fee - discount                          │
//! │                                                                         │
//! │  must hold EXACTLY for every committed order. With floats:              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  With integer minor units the identity is exact by construction.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use emporia_core::money::Money;
//!
//! let price = Money::from_minor(50_000);
//! let line = price.multiply_quantity(2);
//! let total = line + Money::from_minor(30_000);
//! assert_eq!(total.minor(), 130_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest unit of the store currency.
///
/// ## Design Decisions
/// - **i64 (signed)**: differences (stock value deltas, refunds) can go negative
/// - **Newtype**: serde writes it as a bare integer on the wire
/// - **No float constructor**: there is deliberately no `from_f64`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Zero.
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

    /// Multiplies a unit price by a line quantity.
    ///
    /// ```rust
    /// use emporia_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(30_000);
    /// assert_eq!(unit_price.multiply_quantity(3).minor(), 90_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `unit price × quantity`, or `None` when the product does not fit in
    /// an `i64`.
    ///
    /// ```rust
    /// use emporia_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(30_000).checked_multiply_quantity(3), Some(Money::from_minor(90_000)));
    /// assert_eq!(Money::from_minor(i64::MAX).checked_multiply_quantity(2), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(minor) => Some(Money(minor)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(minor) => Some(Money(minor)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(minor) => Some(Money(minor)),
            None => None,
        }
    }

    /// Returns `bps` basis points of this amount (1 bps = 0.01%).
    ///
    /// Rounds half up using i128 intermediate math so large totals cannot
    /// overflow.
    ///
    /// ```rust
    /// use emporia_core::money::Money;
    ///
    /// let subtotal = Money::from_minor(199_999);
    /// // 10% of 199,999 = 19,999.9 -> 20,000
    /// assert_eq!(subtotal.percentage_bps(1_000).minor(), 20_000);
    /// ```
    pub fn percentage_bps(&self, bps: u32) -> Money {
        let scaled = (self.0 as i128 * bps as i128 + 5_000) / 10_000;
        Money(scaled as i64)
    }

    /// Clamps the value into `[Money::zero(), ceiling]`.
    pub fn clamp_to(self, ceiling: Money) -> Money {
        self.max(Money::zero()).min(ceiling.max(Money::zero()))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Groups thousands with commas: `130000` displays as `130,000`.
///
/// Currency symbol and localisation belong to the client.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        if self.0 < 0 {
            write!(f, "-{}", grouped)
        } else {
            write!(f, "{}", grouped)
        }
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_minor(0).to_string(), "0");
        assert_eq!(Money::from_minor(999).to_string(), "999");
        assert_eq!(Money::from_minor(130_000).to_string(), "130,000");
        assert_eq!(Money::from_minor(1_000_000).to_string(), "1,000,000");
        assert_eq!(Money::from_minor(-25_000).to_string(), "-25,000");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(100_000);
        let b = Money::from_minor(30_000);

        assert_eq!((a + b).minor(), 130_000);
        assert_eq!((a - b).minor(), 70_000);

        let mut c = a;
        c += b;
        c -= Money::from_minor(5_000);
        assert_eq!(c.minor(), 125_000);
    }

    #[test]
    fn test_sum_of_lines() {
        let lines = [
            Money::from_minor(50_000).multiply_quantity(2),
            Money::from_minor(30_000).multiply_quantity(1),
        ];
        let subtotal: Money = lines.into_iter().sum();
        assert_eq!(subtotal.minor(), 130_000);
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::from_minor(4_000_000_000_000_000_000);
        assert_eq!(price.checked_multiply_quantity(2), Some(Money::from_minor(8_000_000_000_000_000_000)));
        assert_eq!(price.checked_multiply_quantity(3), None);

        let max = Money::from_minor(i64::MAX);
        assert_eq!(max.checked_add(Money::from_minor(1)), None);
        assert_eq!(
            max.checked_add(Money::zero()).and_then(|m| m.checked_sub(Money::from_minor(1))),
            Some(Money::from_minor(i64::MAX - 1))
        );
        assert_eq!(Money::from_minor(i64::MIN).checked_sub(Money::from_minor(1)), None);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(Money::from_minor(1_000).percentage_bps(825).minor(), 83);
        assert_eq!(Money::from_minor(100_000).percentage_bps(1_000).minor(), 10_000);
        assert_eq!(Money::from_minor(5).percentage_bps(1_000).minor(), 1);
        assert_eq!(Money::from_minor(4).percentage_bps(1_000).minor(), 0);
    }

    #[test]
    fn test_percentage_does_not_overflow() {
        let huge = Money::from_minor(i64::MAX / 2);
        let half = huge.percentage_bps(5_000);
        assert!(half.is_positive());
    }

    #[test]
    fn test_clamp_to() {
        let ceiling = Money::from_minor(10_000);
        assert_eq!(Money::from_minor(15_000).clamp_to(ceiling), ceiling);
        assert_eq!(Money::from_minor(-1).clamp_to(ceiling), Money::zero());
        assert_eq!(Money::from_minor(500).clamp_to(ceiling).minor(), 500);
    }

    #[test]
    fn test_serializes_as_bare_integer() {
        let json = serde_json::to_string(&Money::from_minor(130_000)).unwrap();
        assert_eq!(json, "130000");
        let back: Money = serde_json::from_str("42").unwrap();
        assert_eq!(back.minor(), 42);
    }
}
