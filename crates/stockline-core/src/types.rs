//! # Domain Types
//!
//! Core domain types used throughout Stockline.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockBatch    │   │   SalesRecord   │   │ PaymentHistory  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  batch_no       │   │  invoice_no     │   │  sales_record_id│       │
//! │  │  pack_size      │   │  totals         │   │  amount         │       │
//! │  │  available_qty  │   │  is_paid        │   │  payment_mode   │       │
//! │  │  available_loose│   │  ledger_kind    │   └─────────────────┘       │
//! │  └─────────────────┘   └────────┬────────┘                              │
//! │                                 │ 1..N                                  │
//! │                        ┌────────▼────────┐                              │
//! │                        │ SalesRecordItem │                              │
//! │                        │  qty, loose_qty │                              │
//! │                        │  stock_id |     │                              │
//! │                        │  branch_stock_id│                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every row carries the tenancy scope (tenant, organisation, branch).
//! Money columns are i64 minor units.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::pack::{PackSize, Quantity, StockLevel};
use crate::CoreResult;

// =============================================================================
// Ledger Kind
// =============================================================================

/// Which stock table a sale draws from.
///
/// Organisation-level users sell from the shared `stocks` table; branch users
/// sell from their branch's `branch_stocks`. The caller's resolved role is
/// parsed into this enum once, at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Organisation,
    Branch,
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerKind::Organisation => write!(f, "organisation"),
            LedgerKind::Branch => write!(f, "branch"),
        }
    }
}

impl FromStr for LedgerKind {
    type Err = ValidationError;

    /// Parses a resolved role into a ledger kind.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "organisation" | "organization" | "org" | "org_admin" | "organisation_admin" => {
                Ok(LedgerKind::Organisation)
            }
            "branch" | "branch_admin" | "branch_user" => Ok(LedgerKind::Branch),
            other => Err(ValidationError::invalid(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

// =============================================================================
// Scope
// =============================================================================

/// How invoice numbers are partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoicePartition {
    /// One sequence per organisation per day.
    #[default]
    Organisation,
    /// One sequence per branch per day.
    Branch,
}

impl FromStr for InvoicePartition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "organisation" | "organization" | "org" => Ok(InvoicePartition::Organisation),
            "branch" => Ok(InvoicePartition::Branch),
            other => Err(ValidationError::invalid(
                "invoice_partition",
                format!("unknown partition '{}'", other),
            )),
        }
    }
}

/// The tenant/organisation/branch triple partitioning every ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Scope {
    pub tenant_id: String,
    pub organisation_id: String,
    pub branch_id: Option<String>,
}

impl Scope {
    /// Organisation-level scope (no branch).
    pub fn organisation(tenant_id: impl Into<String>, organisation_id: impl Into<String>) -> Self {
        Scope {
            tenant_id: tenant_id.into(),
            organisation_id: organisation_id.into(),
            branch_id: None,
        }
    }

    /// Adds a branch to the scope.
    pub fn with_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    /// Key under which invoice numbers are unique.
    ///
    /// ```text
    /// Organisation → "t1/o1"
    /// Branch       → "t1/o1/b7"   ("t1/o1/-" when no branch is set)
    /// ```
    pub fn key(&self, partition: InvoicePartition) -> String {
        match partition {
            InvoicePartition::Organisation => {
                format!("{}/{}", self.tenant_id, self.organisation_id)
            }
            InvoicePartition::Branch => format!(
                "{}/{}/{}",
                self.tenant_id,
                self.organisation_id,
                self.branch_id.as_deref().unwrap_or("-")
            ),
        }
    }
}

// =============================================================================
// Payment Mode
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    #[default]
    Cash,
    Card,
    Upi,
    BankTransfer,
    /// Sold on account; usually paired with `paid_amount = 0`.
    Credit,
}

// =============================================================================
// Catalog
// =============================================================================

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub organisation_id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A packaging of a product (e.g. "strip of 10").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub name: String,
    /// NULL when the variant is sold in single units.
    pub pack_size: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Batch
// =============================================================================

/// A purchase lot with its own pack/loose counters.
///
/// The same shape is read from both `stocks` and `branch_stocks`;
/// `pack_size` comes from the joined product variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockBatch {
    pub id: String,
    pub product_id: String,
    pub variant_id: String,
    pub batch_no: String,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// Units per sealed pack. NULL when the variant never declared one.
    pub pack_size: Option<i64>,
    /// Whole packs on hand.
    pub available_quantity: i64,
    /// Loose units outside any sealed pack.
    pub available_loose_quantity: i64,
    pub sell_price: i64,
    pub buy_price: i64,
    pub mrp: i64,
    pub tenant_id: String,
    pub organisation_id: String,
    pub branch_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockBatch {
    /// Current counters as a stock level.
    #[inline]
    pub fn level(&self) -> StockLevel {
        StockLevel::new(self.available_quantity, self.available_loose_quantity)
    }

    /// Resolves the pack size, rejecting zero or negative values.
    pub fn pack_size(&self) -> CoreResult<PackSize> {
        PackSize::resolve(self.pack_size)
    }
}

// =============================================================================
// Sale Request (caller payload)
// =============================================================================

/// One line of a sale request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItemRequest {
    pub product_id: String,
    /// Batch in the organisation ledger.
    #[serde(default)]
    pub stock_id: Option<String>,
    /// Batch in the branch ledger.
    #[serde(default)]
    pub branch_stock_id: Option<String>,
    /// Whole packs.
    #[serde(default)]
    pub qty: i64,
    /// Loose units.
    #[serde(default)]
    pub loose_qty: i64,
    pub price: i64,
    #[serde(default)]
    pub mrp: i64,
    #[serde(default)]
    pub amount: i64,
    /// Basis points.
    #[serde(default)]
    pub tax_percentage: i64,
}

impl SaleItemRequest {
    /// The batch reference matching the active ledger.
    pub fn batch_id(&self, kind: LedgerKind) -> Option<&str> {
        match kind {
            LedgerKind::Organisation => self.stock_id.as_deref(),
            LedgerKind::Branch => self.branch_stock_id.as_deref(),
        }
    }

    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::new(self.qty, self.loose_qty)
    }
}

/// A validated draft sale submitted by the billing screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    /// Caller-chosen invoice number; allocated by the engine when absent.
    #[serde(default)]
    pub invoice_no: Option<String>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_mode: PaymentMode,
    #[serde(default)]
    pub paid_amount: i64,
    #[serde(default)]
    pub sub_total: i64,
    pub total_amount: i64,
    #[serde(default)]
    pub value_of_goods: i64,
    #[serde(default)]
    pub total_gst: i64,
    #[serde(default)]
    pub discount: i64,
    pub items: Vec<SaleItemRequest>,
}

impl SaleRequest {
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_minor(self.paid_amount)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_amount)
    }
}

/// A line in an edit request. Lines with an `id` update the existing item,
/// lines without one are inserted, and existing items not listed are deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItemUpdate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub item: SaleItemRequest,
}

/// Edit of an existing sale. The invoice number and paid amount are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleUpdateRequest {
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_mode: PaymentMode,
    #[serde(default)]
    pub sub_total: i64,
    pub total_amount: i64,
    #[serde(default)]
    pub value_of_goods: i64,
    #[serde(default)]
    pub total_gst: i64,
    #[serde(default)]
    pub discount: i64,
    pub items: Vec<SaleItemUpdate>,
}

// =============================================================================
// Persisted Sale Rows
// =============================================================================

/// Sale header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesRecord {
    pub id: String,
    pub tenant_id: String,
    pub organisation_id: String,
    pub branch_id: Option<String>,
    /// Scope key the invoice number is unique under.
    pub scope_key: String,
    pub invoice_no: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub customer_id: Option<String>,
    pub payment_mode: PaymentMode,
    pub sub_total: i64,
    pub total_amount: i64,
    pub value_of_goods: i64,
    pub total_gst: i64,
    pub discount: i64,
    pub paid_amount: i64,
    pub is_paid: bool,
    pub is_partially_paid: bool,
    /// Ledger the items were deducted from.
    pub ledger_kind: LedgerKind,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Sale line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesRecordItem {
    pub id: String,
    pub sales_record_id: String,
    pub product_id: String,
    pub stock_id: Option<String>,
    pub branch_stock_id: Option<String>,
    pub qty: i64,
    pub loose_qty: i64,
    pub price: i64,
    pub mrp: i64,
    pub amount: i64,
    pub tax_percentage: i64,
    pub tenant_id: String,
    pub organisation_id: String,
    pub branch_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SalesRecordItem {
    /// The batch reference matching the given ledger.
    pub fn batch_id(&self, kind: LedgerKind) -> Option<&str> {
        match kind {
            LedgerKind::Organisation => self.stock_id.as_deref(),
            LedgerKind::Branch => self.branch_stock_id.as_deref(),
        }
    }

    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::new(self.qty, self.loose_qty)
    }
}

/// Payment recorded against a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentHistory {
    pub id: String,
    pub sales_record_id: String,
    pub amount: i64,
    pub payment_mode: PaymentMode,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub tenant_id: String,
    pub organisation_id: String,
    pub branch_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Responses
// =============================================================================

/// A sale with its lines and payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    pub record: SalesRecord,
    pub items: Vec<SalesRecordItem>,
    pub payments: Vec<PaymentHistory>,
}

/// Result of the invoice-number pre-allocation read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NextInvoiceNumber {
    pub invoice_no: String,
    /// Advisory only: a concurrent sale may take this number first.
    pub reserved: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================
