//! # Money Module
//!
//! Integer money for sale totals and payments.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Totals arrive from the billing screen already computed. The engine    │
//! │  only compares and stores them, so they are kept in the smallest       │
//! │  currency unit (paise, cents) as i64:                                  │
//! │                                                                         │
//! │    ₹ 152.50  →  15250                                                   │
//! │                                                                         │
//! │  Comparisons like "paid >= total" are then exact.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use stockline_core::money::Money;
    ///
    /// let price = Money::from_minor(15250); // 152.50
    /// assert_eq!(price.minor(), 15250);
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
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

/// Renders as `major.minor` without a currency symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment flags derived from the amount paid at sale time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentStatus {
    pub is_paid: bool,
    pub is_partially_paid: bool,
}

impl PaymentStatus {
    /// Derives the flags stored on a sales record.
    ///
    /// ```text
    /// paid == 0             → unpaid
    /// 0 < paid < total      → partially paid
    /// paid >= total         → paid
    /// ```
    pub fn derive(paid: Money, total: Money) -> Self {
        let is_paid = paid >= total;
        PaymentStatus {
            is_paid,
            is_partially_paid: !is_paid && paid.is_positive(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
