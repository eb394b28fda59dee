//! # Quantity Module
//!
//! Provides the `Quantity` type for stock amounts in base units.
//!
//! ## Why Fixed-Point Quantities?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A bottle sold as ten 1/10-bottle tots, in floating point:              │
//! │    0.1 × 10 = 0.9999999999999999  ❌ a bottle "disappears"              │
//! │                                                                         │
//! │  Across thousands of fractional sales the ledger drifts away from      │
//! │  the shelf, and the daily reconciliation can never balance.            │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Hundredths                                      │
//! │    One tot = 10 hundredths. 10 tots = 100 hundredths = 1.00 bottle.    │
//! │    Exact, every time.                                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::quantity::Quantity;
//!
//! // Create from hundredths (preferred) or whole units
//! let stock = Quantity::from_hundredths(1250); // 12.50 bottles
//! let tot = Quantity::from_hundredths(10);     // 0.10 bottle
//!
//! // Fixed-point conversion: 4 tots in base units
//! let four = Quantity::from_units(4);
//! assert_eq!(four.mul_factor(tot).hundredths(), 40); // 0.40 bottle
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// =============================================================================
// Quantity Type
// =============================================================================

/// A stock amount in hundredths of a base unit (two decimal digits).
///
/// ## Design Decisions
/// - **i64 (signed)**: Intermediate results of `opening + additions − sales`
///   may dip below zero before the defensive floor is applied
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Hundredths**: Two decimal digits cover every serving size in use
///   (a 1/10-bottle tot is 10 hundredths) without floating-point drift
///
/// ## Where Quantity Flows
/// ```text
/// Variant.conversion_factor ──► SaleEvent.base_units ──► Snapshot.sales
/// PurchaseEvent.quantity ───────────────────────────► Snapshot.additions
/// Snapshot.closing_stock ───────────────────────────► Product.current_stock
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from hundredths of a base unit.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::quantity::Quantity;
    ///
    /// let q = Quantity::from_hundredths(1250); // 12.50 units
    /// assert_eq!(q.hundredths(), 1250);
    /// ```
    #[inline]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Quantity(hundredths)
    }

    /// Creates a quantity from whole base units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * 100)
    }

    /// Returns the raw value in hundredths.
    #[inline]
    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion (truncated towards zero).
    #[inline]
    pub const fn whole_units(&self) -> i64 {
        self.0 / 100
    }

    /// Zero quantity.
    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    /// Checks if the quantity is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the quantity is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the quantity is negative (less than zero).
    ///
    /// Persisted quantities are never negative; this only shows up on
    /// intermediate arithmetic before [`Quantity::floor_zero`] is applied.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Floors the quantity at zero.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::quantity::Quantity;
    ///
    /// let deficit = Quantity::from_hundredths(-250);
    /// assert_eq!(deficit.floor_zero(), Quantity::zero());
    /// ```
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Quantity(0)
        } else {
            *self
        }
    }

    /// Multiplies two fixed-point quantities, rounding half up at the
    /// hundredth.
    ///
    /// Used for `quantity × conversion_factor`: both operands carry two
    /// decimal digits, so the raw product carries four and must be scaled
    /// back down by 100.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::quantity::Quantity;
    ///
    /// let four_tots = Quantity::from_units(4);
    /// let tot_factor = Quantity::from_hundredths(10); // 0.10 bottle each
    ///
    /// // 4 × 0.10 = 0.40 bottle
    /// assert_eq!(four_tots.mul_factor(tot_factor).hundredths(), 40);
    /// ```
    pub fn mul_factor(&self, factor: Quantity) -> Quantity {
        // i128 intermediate to prevent overflow on large stocks
        // +50 provides round-half-up at the hundredth (50/100 = 0.5)
        let raw = self.0 as i128 * factor.0 as i128;
        let scaled = if raw >= 0 { (raw + 50) / 100 } else { (raw - 50) / 100 };
        Quantity(scaled as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows quantities with two decimal places.
///
/// ## Note
/// This is for logs and audit summaries. Callers format for UI display.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

/// Addition of two quantities.
impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two quantities.
impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Quantity::from_units(12).hundredths(), 1200);
        assert_eq!(Quantity::from_hundredths(1250).whole_units(), 12);
        assert!(Quantity::zero().is_zero());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Quantity::from_hundredths(1250)), "12.50");
        assert_eq!(format!("{}", Quantity::from_hundredths(40)), "0.40");
        assert_eq!(format!("{}", Quantity::from_hundredths(-250)), "-2.50");
        assert_eq!(format!("{}", Quantity::zero()), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Quantity::from_units(10);
        let b = Quantity::from_hundredths(250);

        assert_eq!((a + b).hundredths(), 1250);
        assert_eq!((a - b).hundredths(), 750);

        let mut c = a;
        c -= b;
        assert_eq!(c.hundredths(), 750);
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Quantity::from_hundredths(-1).floor_zero(), Quantity::zero());
        assert_eq!(
            Quantity::from_hundredths(1).floor_zero(),
            Quantity::from_hundredths(1)
        );
    }

    #[test]
    fn test_mul_factor_tot() {
        // 4 tots at 0.10 bottle each = 0.40 bottle
        let four = Quantity::from_units(4);
        let tot = Quantity::from_hundredths(10);
        assert_eq!(four.mul_factor(tot).hundredths(), 40);
    }

    #[test]
    fn test_mul_factor_whole() {
        // 3 units at factor 1.00 = 3.00 units
        let three = Quantity::from_units(3);
        let whole = Quantity::from_units(1);
        assert_eq!(three.mul_factor(whole), Quantity::from_units(3));
    }

    #[test]
    fn test_mul_factor_rounding() {
        // 0.05 × 0.10 = 0.005 → rounds up to 0.01
        let a = Quantity::from_hundredths(5);
        let b = Quantity::from_hundredths(10);
        assert_eq!(a.mul_factor(b).hundredths(), 1);

        // 0.04 × 0.10 = 0.004 → rounds down to 0.00
        let c = Quantity::from_hundredths(4);
        assert_eq!(c.mul_factor(b).hundredths(), 0);
    }

    /// Ten 1/10-bottle tots must reconstruct exactly one bottle.
    /// This is the drift the fixed-point representation exists to prevent.
    #[test]
    fn test_tot_reconstruction_exact() {
        let tot = Quantity::from_hundredths(10);
        let ten = Quantity::from_units(10);
        assert_eq!(ten.mul_factor(tot), Quantity::from_units(1));
    }
}
