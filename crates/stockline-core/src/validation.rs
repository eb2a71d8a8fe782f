//! # Validation Module
//!
//! Request validation that runs before any transaction is opened.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Billing screen (advisory pack/loose checks)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Scope present for the selected ledger                             │
//! │  ├── Item shape (batch reference, non-negative, non-empty quantity)    │
//! │  └── Totals and paid amount                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Ledger, under the write lock                                 │
//! │  └── Stock availability against the locked row                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite                                                       │
//! │  └── UNIQUE (scope_key, invoice_no), CHECK quantity >= 0               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{LedgerKind, SaleItemRequest, SaleRequest, SaleUpdateRequest, Scope};
use crate::{MAX_ID_LENGTH, MAX_INVOICE_NO_LENGTH, MAX_SALE_ITEMS, MAX_TAX_BASIS_POINTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Scope
// =============================================================================

/// Validates the resolved tenancy scope for the active ledger.
///
/// Branch users must carry a branch id; their sales are stamped with it and
/// their batches are looked up under it.
pub fn validate_scope(scope: &Scope, kind: LedgerKind) -> ValidationResult<()> {
    validate_id("tenant_id", &scope.tenant_id)?;
    validate_id("organisation_id", &scope.organisation_id)?;

    match (&scope.branch_id, kind) {
        (Some(branch), _) => validate_id("branch_id", branch),
        (None, LedgerKind::Branch) => Err(ValidationError::required("branch_id")),
        (None, LedgerKind::Organisation) => Ok(()),
    }
}

/// Ids are used verbatim in scope keys and lookups, so they must arrive
/// already trimmed.
fn validate_id(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.trim() != value {
        return Err(ValidationError::invalid(field, "surrounding whitespace"));
    }
    if value.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
        });
    }
    Ok(())
}

// =============================================================================
// Sale Requests
// =============================================================================

/// Validates a new sale before it reaches the engine.
pub fn validate_sale_request(req: &SaleRequest, kind: LedgerKind) -> ValidationResult<()> {
    if let Some(invoice_no) = &req.invoice_no {
        let invoice_no = invoice_no.trim();
        if invoice_no.is_empty() {
            return Err(ValidationError::required("invoice_no"));
        }
        if invoice_no.len() > MAX_INVOICE_NO_LENGTH {
            return Err(ValidationError::TooLong {
                field: "invoice_no".to_string(),
                max: MAX_INVOICE_NO_LENGTH,
            });
        }
    }

    validate_totals(
        req.sub_total,
        req.total_amount,
        req.value_of_goods,
        req.total_gst,
        req.discount,
    )?;

    if req.paid_amount < 0 {
        return Err(ValidationError::negative("paid_amount"));
    }
    if req.paid_amount > req.total_amount {
        return Err(ValidationError::OutOfRange {
            field: "paid_amount".to_string(),
            min: 0,
            max: req.total_amount,
        });
    }

    validate_item_count(req.items.len())?;
    for item in &req.items {
        validate_item(item, kind)?;
    }

    Ok(())
}

/// Validates an edit of an existing sale.
///
/// The paid amount is carried over from the stored sale, so the engine
/// checks it against the new total separately.
pub fn validate_update_request(req: &SaleUpdateRequest, kind: LedgerKind) -> ValidationResult<()> {
    validate_totals(
        req.sub_total,
        req.total_amount,
        req.value_of_goods,
        req.total_gst,
        req.discount,
    )?;

    validate_item_count(req.items.len())?;

    let mut seen = std::collections::HashSet::new();
    for line in &req.items {
        if let Some(id) = &line.id {
            if !seen.insert(id.as_str()) {
                return Err(ValidationError::invalid(
                    "items",
                    format!("item {} listed twice", id),
                ));
            }
        }
        validate_item(&line.item, kind)?;
    }

    Ok(())
}

fn validate_totals(
    sub_total: i64,
    total_amount: i64,
    value_of_goods: i64,
    total_gst: i64,
    discount: i64,
) -> ValidationResult<()> {
    for (field, value) in [
        ("sub_total", sub_total),
        ("total_amount", total_amount),
        ("value_of_goods", value_of_goods),
        ("total_gst", total_gst),
        ("discount", discount),
    ] {
        if value < 0 {
            return Err(ValidationError::negative(field));
        }
    }
    Ok(())
}

fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::required("items"));
    }
    if count > MAX_SALE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_ITEMS as i64,
        });
    }
    Ok(())
}

/// Validates one sale line against the active ledger.
pub fn validate_item(item: &SaleItemRequest, kind: LedgerKind) -> ValidationResult<()> {
    validate_id("product_id", &item.product_id)?;

    match item.batch_id(kind) {
        Some(batch) => validate_id(batch_field(kind), batch)?,
        None => return Err(ValidationError::required(batch_field(kind))),
    }

    if item.qty < 0 {
        return Err(ValidationError::negative("qty"));
    }
    if item.loose_qty < 0 {
        return Err(ValidationError::negative("loose_qty"));
    }
    if item.qty == 0 && item.loose_qty == 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    for (field, value) in [
        ("price", item.price),
        ("mrp", item.mrp),
        ("amount", item.amount),
        ("tax_percentage", item.tax_percentage),
    ] {
        if value < 0 {
            return Err(ValidationError::negative(field));
        }
    }
    if item.tax_percentage > MAX_TAX_BASIS_POINTS {
        return Err(ValidationError::OutOfRange {
            field: "tax_percentage".to_string(),
            min: 0,
            max: MAX_TAX_BASIS_POINTS,
        });
    }

    Ok(())
}

#[inline]
fn batch_field(kind: LedgerKind) -> &'static str {
    match kind {
        LedgerKind::Organisation => "stock_id",
        LedgerKind::Branch => "branch_stock_id",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaymentMode, SaleItemUpdate};
    use chrono::NaiveDate;

    fn item() -> SaleItemRequest {
        SaleItemRequest {
            product_id: "p1".into(),
            stock_id: Some("s1".into()),
            branch_stock_id: None,
            qty: 1,
            loose_qty: 0,
            price: 500,
            mrp: 550,
            amount: 500,
            tax_percentage: 1200,
        }
    }

    fn request() -> SaleRequest {
        SaleRequest {
            invoice_no: None,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            customer_id: Some("c1".into()),
            payment_mode: PaymentMode::Cash,
            paid_amount: 500,
            sub_total: 500,
            total_amount: 500,
            value_of_goods: 446,
            total_gst: 54,
            discount: 0,
            items: vec![item()],
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(validate_sale_request(&request(), LedgerKind::Organisation).is_ok());
    }

    #[test]
    fn test_paid_amount_bounds() {
        let mut req = request();
        req.paid_amount = -1;
        assert!(matches!(
            validate_sale_request(&req, LedgerKind::Organisation),
            Err(ValidationError::Negative { .. })
        ));

        req.paid_amount = 501;
        assert!(matches!(
            validate_sale_request(&req, LedgerKind::Organisation),
            Err(ValidationError::OutOfRange { .. })
        ));

        req.paid_amount = 0;
        assert!(validate_sale_request(&req, LedgerKind::Organisation).is_ok());
    }

    #[test]
    fn test_requires_items() {
        let mut req = request();
        req.items.clear();
        assert!(matches!(
            validate_sale_request(&req, LedgerKind::Organisation),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_item_must_reference_active_ledger() {
        // stock_id only, but the branch ledger is active
        let err = validate_sale_request(&request(), LedgerKind::Branch).unwrap_err();
        assert_eq!(err.to_string(), "branch_stock_id is required");
    }

    #[test]
    fn test_item_quantities() {
        let mut bad = item();
        bad.qty = 0;
        bad.loose_qty = 0;
        assert!(validate_item(&bad, LedgerKind::Organisation).is_err());

        bad.loose_qty = -3;
        assert!(matches!(
            validate_item(&bad, LedgerKind::Organisation),
            Err(ValidationError::Negative { .. })
        ));

        let mut loose_only = item();
        loose_only.qty = 0;
        loose_only.loose_qty = 4;
        assert!(validate_item(&loose_only, LedgerKind::Organisation).is_ok());
    }

    #[test]
    fn test_blank_invoice_no_rejected() {
        let mut req = request();
        req.invoice_no = Some("   ".into());
        assert!(validate_sale_request(&req, LedgerKind::Organisation).is_err());
    }

    #[test]
    fn test_branch_scope_requires_branch() {
        let scope = Scope::organisation("t1", "o1");
        assert!(validate_scope(&scope, LedgerKind::Organisation).is_ok());
        assert!(validate_scope(&scope, LedgerKind::Branch).is_err());
        assert!(validate_scope(&scope.with_branch("b1"), LedgerKind::Branch).is_ok());

        assert!(validate_scope(&Scope::organisation("", "o1"), LedgerKind::Organisation).is_err());
    }

    #[test]
    fn test_padded_ids_rejected() {
        let org = LedgerKind::Organisation;
        let err = validate_scope(&Scope::organisation(" t1", "o1"), org).unwrap_err();
        assert_eq!(err.to_string(), "tenant_id has invalid format: surrounding whitespace");
        assert!(validate_scope(&Scope::organisation("t1", "o1\t"), org).is_err());
        assert!(validate_scope(&Scope::organisation("t1", "o1").with_branch("b1 "), LedgerKind::Branch).is_err());
        assert!(matches!(
            validate_scope(&Scope::organisation("   ", "o1"), org),
            Err(ValidationError::Required { .. })
        ));

        let mut padded = item();
        padded.stock_id = Some(" s1".into());
        assert!(validate_item(&padded, org).is_err());
    }

    #[test]
    fn test_update_rejects_repeated_item_id() {
        let line = SaleItemUpdate {
            id: Some("it-1".into()),
            item: item(),
        };
        let req = SaleUpdateRequest {
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            customer_id: None,
            payment_mode: PaymentMode::Cash,
            sub_total: 1000,
            total_amount: 1000,
            value_of_goods: 892,
            total_gst: 108,
            discount: 0,
            items: vec![line.clone(), line],
        };
        assert!(validate_update_request(&req, LedgerKind::Organisation).is_err());
    }
}
