//! # Pack/Loose Converter
//!
//! Arithmetic for stock held as sealed packs plus loose units.
//!
//! ## Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A batch of tablets with pack_size = 10:                               │
//! │                                                                         │
//! │    available_quantity       = 5   (sealed strips)                      │
//! │    available_loose_quantity = 3   (tablets cut from an opened strip)   │
//! │                                                                         │
//! │    total units = 5 * 10 + 3 = 53                                        │
//! │                                                                         │
//! │  Selling 13 loose tablets opens 1 strip:                               │
//! │    extra needed = 13 - 3 = 10   packs to open = ceil(10 / 10) = 1      │
//! │    result       = (4 packs, 10 - 10 = 0 loose)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is pure. The ledgers in `stockline-db` read a batch,
//! ask [`plan_deduction`] for the new counters and persist them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Pack Size
// =============================================================================

/// Units per sealed pack. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackSize(i64);

impl PackSize {
    /// A pack of one unit, used when a variant has no pack size.
    pub const ONE: PackSize = PackSize(1);

    /// Validates an explicit pack size.
    pub fn new(size: i64) -> CoreResult<Self> {
        if size <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "pack_size".to_string(),
            }
            .into());
        }
        Ok(PackSize(size))
    }

    /// Resolves a stored pack size. NULL means one unit per pack; zero or
    /// negative values are rejected instead of being silently replaced.
    pub fn resolve(stored: Option<i64>) -> CoreResult<Self> {
        match stored {
            None => Ok(PackSize::ONE),
            Some(size) => PackSize::new(size),
        }
    }

    #[inline]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

// =============================================================================
// Quantities
// =============================================================================

/// A requested movement in packs and loose units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quantity {
    pub packs: i64,
    pub loose: i64,
}

impl Quantity {
    #[inline]
    pub const fn new(packs: i64, loose: i64) -> Self {
        Quantity { packs, loose }
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.packs == 0 && self.loose == 0
    }

    /// Rejects negative parts and the empty request.
    pub fn ensure_deductible(&self) -> CoreResult<()> {
        self.ensure_non_negative()?;
        if self.is_zero() {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Rejects negative parts. Zero is allowed.
    pub fn ensure_non_negative(&self) -> CoreResult<()> {
        if self.packs < 0 {
            return Err(ValidationError::negative("qty").into());
        }
        if self.loose < 0 {
            return Err(ValidationError::negative("loose_qty").into());
        }
        Ok(())
    }

    /// Total loose-unit equivalent: `packs * pack_size + loose`.
    pub fn total_units(&self, pack_size: PackSize) -> CoreResult<i64> {
        total_units(pack_size, self.packs, self.loose, "quantity")
    }
}

/// The pack/loose counters of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevel {
    /// Whole packs.
    pub quantity: i64,
    /// Loose units.
    pub loose_quantity: i64,
}

impl StockLevel {
    #[inline]
    pub const fn new(quantity: i64, loose_quantity: i64) -> Self {
        StockLevel {
            quantity,
            loose_quantity,
        }
    }

    /// Total loose-unit equivalent of the level.
    pub fn total_units(&self, pack_size: PackSize) -> CoreResult<i64> {
        total_units(pack_size, self.quantity, self.loose_quantity, "available_quantity")
    }
}

fn total_units(pack_size: PackSize, packs: i64, loose: i64, field: &str) -> CoreResult<i64> {
    packs
        .checked_mul(pack_size.get())
        .and_then(|units| units.checked_add(loose))
        .ok_or_else(|| {
            ValidationError::Overflow {
                field: field.to_string(),
            }
            .into()
        })
}

// =============================================================================
// Deduction Planner
// =============================================================================

/// Outcome of a successful dry-run deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeductionPlan {
    pub before: StockLevel,
    pub after: StockLevel,
    /// Sealed packs opened to serve the loose portion.
    pub packs_opened: i64,
}

/// Computes the counters after deducting `request` from `level`.
///
/// ## Algorithm
/// ```text
/// 1. total requested > total available        → InsufficientStock
/// 2. loose first:
///      loose requested <= loose on hand       → subtract
///      otherwise open ceil(extra / pack_size) packs
///        not enough packs to open             → CannotBreakPack
///        loose = opened * pack_size - extra
/// 3. packs requested > packs left             → InsufficientPacks
/// ```
///
/// Nothing is returned on rejection, so the caller has nothing to write.
pub fn plan_deduction(
    batch_id: &str,
    pack_size: PackSize,
    level: StockLevel,
    request: Quantity,
) -> CoreResult<DeductionPlan> {
    request.ensure_deductible()?;

    let requested = request.total_units(pack_size)?;
    let available = level.total_units(pack_size)?;
    if requested > available {
        return Err(CoreError::InsufficientStock {
            batch_id: batch_id.to_string(),
            available,
            requested,
        });
    }

    let mut quantity = level.quantity;
    let mut loose = level.loose_quantity;
    let mut packs_opened = 0;

    if request.loose <= loose {
        loose -= request.loose;
    } else {
        let extra_needed = request.loose - loose;
        // ceil without overflow: extra_needed > 0 and pack_size >= 1
        let packs_to_open = (extra_needed - 1) / pack_size.get() + 1;
        // Not reachable once step 1 passed on non-negative counters; keeps
        // the planner from ever producing a negative pack count.
        if quantity < packs_to_open {
            return Err(CoreError::CannotBreakPack {
                batch_id: batch_id.to_string(),
                packs_available: quantity,
                packs_needed: packs_to_open,
            });
        }
        quantity -= packs_to_open;
        loose = packs_to_open * pack_size.get() - extra_needed;
        packs_opened = packs_to_open;
    }

    if quantity < request.packs {
        return Err(CoreError::InsufficientPacks {
            batch_id: batch_id.to_string(),
            available: quantity,
            requested: request.packs,
        });
    }
    quantity -= request.packs;

    Ok(DeductionPlan {
        before: level,
        after: StockLevel::new(quantity, loose),
        packs_opened,
    })
}

/// Computes the counters after adding `amount` back to `level`.
///
/// Packs go back as packs and loose as loose; opened packs are not resealed.
pub fn plan_revert(level: StockLevel, amount: Quantity) -> CoreResult<StockLevel> {
    amount.ensure_non_negative()?;

    let quantity = level.quantity.checked_add(amount.packs).ok_or_else(|| {
        CoreError::from(ValidationError::Overflow {
            field: "qty".to_string(),
        })
    })?;
    let loose_quantity = level.loose_quantity.checked_add(amount.loose).ok_or_else(|| {
        CoreError::from(ValidationError::Overflow {
            field: "loose_qty".to_string(),
        })
    })?;

    Ok(StockLevel::new(quantity, loose_quantity))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ten() -> PackSize {
        PackSize::new(10).unwrap()
    }

    #[test]
    fn test_pack_size_resolution() {
        assert_eq!(PackSize::resolve(None).unwrap(), PackSize::ONE);
        assert_eq!(PackSize::resolve(Some(12)).unwrap().get(), 12);
        assert!(PackSize::resolve(Some(0)).is_err());
        assert!(PackSize::resolve(Some(-4)).is_err());
    }

    #[test]
    fn test_total_units() {
        assert_eq!(StockLevel::new(5, 3).total_units(ten()).unwrap(), 53);
        assert_eq!(Quantity::new(2, 5).total_units(ten()).unwrap(), 25);

        let err = Quantity::new(i64::MAX, 0).total_units(ten()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn test_breaks_one_pack_for_loose_units() {
        let plan = plan_deduction("B", ten(), StockLevel::new(5, 3), Quantity::new(0, 13)).unwrap();
        assert_eq!(plan.after, StockLevel::new(4, 0));
        assert_eq!(plan.packs_opened, 1);
    }

    #[test]
    fn test_loose_served_from_loose_stock() {
        let plan = plan_deduction("B", ten(), StockLevel::new(5, 3), Quantity::new(1, 2)).unwrap();
        assert_eq!(plan.after, StockLevel::new(4, 1));
        assert_eq!(plan.packs_opened, 0);
    }

    #[test]
    fn test_opens_several_packs() {
        // extra = 25 - 3 = 22, open 3 packs, loose = 30 - 22 = 8
        let plan = plan_deduction("B", ten(), StockLevel::new(5, 3), Quantity::new(0, 25)).unwrap();
        assert_eq!(plan.after, StockLevel::new(2, 8));
        assert_eq!(plan.packs_opened, 3);
    }

    #[test]
    fn test_deducts_everything() {
        let plan = plan_deduction("B", ten(), StockLevel::new(5, 3), Quantity::new(5, 3)).unwrap();
        assert_eq!(plan.after, StockLevel::new(0, 0));
    }

    #[test]
    fn test_insufficient_stock() {
        let err = plan_deduction("B", ten(), StockLevel::new(2, 3), Quantity::new(2, 5)).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 23);
                assert_eq!(requested, 25);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_insufficient_packs_with_surplus_loose() {
        // A batch holding more loose than one pack: the units are there but
        // no sealed pack is.
        let level = StockLevel::new(0, 15);
        assert_eq!(
            plan_deduction("B", ten(), level, Quantity::new(0, 15)).unwrap().after,
            StockLevel::new(0, 0)
        );
        let err = plan_deduction("B", ten(), level, Quantity::new(1, 0)).unwrap_err();
        match err {
            CoreError::InsufficientPacks {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 0);
                assert_eq!(requested, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_breaking_exactly_all_packs() {
        let three = PackSize::new(3).unwrap();
        let plan = plan_deduction("B", three, StockLevel::new(1, 4), Quantity::new(0, 7)).unwrap();
        assert_eq!(plan.after, StockLevel::new(0, 0));
        assert_eq!(plan.packs_opened, 1);
    }

    #[test]
    fn test_rejects_empty_and_negative_requests() {
        let level = StockLevel::new(5, 3);
        for request in [Quantity::new(0, 0), Quantity::new(-1, 0), Quantity::new(0, -2)] {
            let err = plan_deduction("B", ten(), level, request).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationError);
        }
    }

    #[test]
    fn test_conservation_of_units() {
        let pack = PackSize::new(6).unwrap();
        let level = StockLevel::new(7, 4);
        let before = level.total_units(pack).unwrap();

        for packs in 0..=7 {
            for loose in 0..=20 {
                let request = Quantity::new(packs, loose);
                if request.is_zero() {
                    continue;
                }
                if let Ok(plan) = plan_deduction("B", pack, level, request) {
                    let after = plan.after.total_units(pack).unwrap();
                    let taken = request.total_units(pack).unwrap();
                    assert_eq!(after, before - taken, "request {request:?}");
                    assert!(plan.after.quantity >= 0 && plan.after.loose_quantity >= 0);
                }
            }
        }
    }

    #[test]
    fn test_loose_stays_below_pack_size_after_break() {
        let pack = PackSize::new(8).unwrap();
        for loose in 1..=40 {
            if let Ok(plan) = plan_deduction("B", pack, StockLevel::new(6, 2), Quantity::new(0, loose)) {
                if plan.packs_opened > 0 {
                    assert!(plan.after.loose_quantity < pack.get());
                }
            }
        }
    }

    #[test]
    fn test_revert_adds_back() {
        let after = plan_revert(StockLevel::new(4, 0), Quantity::new(0, 13)).unwrap();
        assert_eq!(after, StockLevel::new(4, 13));
        assert_eq!(after.total_units(ten()).unwrap(), 53);

        assert!(plan_revert(StockLevel::new(4, 0), Quantity::new(-1, 0)).is_err());
        assert_eq!(
            plan_revert(StockLevel::new(4, 0), Quantity::new(0, 0)).unwrap(),
            StockLevel::new(4, 0)
        );
    }
}
