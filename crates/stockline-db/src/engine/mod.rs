//! # Sale Engine
//!
//! The sale use cases, each one write transaction.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    SaleEngine::create_sale                              │
//! │                                                                         │
//! │  validate scope + request                 (no transaction yet)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN + write lock                       Database::begin_write        │
//! │       │                                                                 │
//! │       ├── 1. invoice_no given?  exists → DuplicateInvoice              │
//! │       │                         absent → InvoiceSequence::allocate     │
//! │       ├── 2. insert sales_records                                      │
//! │       ├── 3. insert sales_record_items (stamped with scope)            │
//! │       ├── 4. paid_amount > 0 → insert payment_histories                │
//! │       ├── 5. ledger.deduct_from() per item, batch must hold the item's │
//! │       │      product (Organisation | Branch)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  6. COMMIT            any error above → ROLLBACK, nothing persisted    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is retried here. A `Contention` error means the whole request may
//! be sent again.

mod create;
mod update;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::str::FromStr;
use tracing::{error, warn};

use crate::error::{SaleError, SaleResult};
use crate::pool::Database;
use crate::repository::stock::{BranchLedger, OrganisationLedger, StockLedger};
use stockline_core::validation::validate_scope;
use stockline_core::{
    CoreError, ErrorKind, InvoicePartition, LedgerKind, NextInvoiceNumber, Quantity, SaleDetail,
    SalesRecord, SalesRecordItem, Scope, ValidationError,
};

// =============================================================================
// Configuration
// =============================================================================

/// What an edit of a committed sale does to stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStockPolicy {
    /// Items change, stock does not.
    #[default]
    MetadataOnly,
    /// Prior quantities of removed or changed items go back to their
    /// batches, new quantities are deducted.
    RevertAndRededuct,
}

impl FromStr for EditStockPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metadata_only" | "metadata-only" => Ok(EditStockPolicy::MetadataOnly),
            "revert_and_rededuct" | "revert-and-rededuct" => Ok(EditStockPolicy::RevertAndRededuct),
            other => Err(ValidationError::invalid(
                "edit_stock_policy",
                format!("unknown policy '{}'", other),
            )),
        }
    }
}

/// Engine options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleEngineConfig {
    /// How invoice numbers are partitioned.
    pub invoice_partition: InvoicePartition,
    /// What edits do to stock.
    pub edit_stock_policy: EditStockPolicy,
}

impl SaleEngineConfig {
    pub fn invoice_partition(mut self, partition: InvoicePartition) -> Self {
        self.invoice_partition = partition;
        self
    }

    pub fn edit_stock_policy(mut self, policy: EditStockPolicy) -> Self {
        self.edit_stock_policy = policy;
        self
    }
}

// =============================================================================
// Sale Engine
// =============================================================================

/// Runs sale transactions against a [`Database`].
#[derive(Debug, Clone)]
pub struct SaleEngine {
    db: Database,
    config: SaleEngineConfig,
}

impl SaleEngine {
    pub fn new(db: Database, config: SaleEngineConfig) -> Self {
        SaleEngine { db, config }
    }

    pub fn config(&self) -> &SaleEngineConfig {
        &self.config
    }

    /// Gets a live sale with its items and payments.
    pub async fn get_sale(
        &self,
        scope: &Scope,
        kind: LedgerKind,
        sale_id: &str,
    ) -> SaleResult<SaleDetail> {
        validate_scope(scope, kind)?;

        match self.db.sales().get_detail(scope, sale_id).await? {
            Some(detail) if visible_to(&detail.record, scope, kind) => Ok(detail),
            _ => Err(CoreError::SaleNotFound(sale_id.to_string()).into()),
        }
    }

    /// The invoice number the next sale on `date` would receive. Advisory
    /// only: nothing is reserved.
    pub async fn next_invoice_number(
        &self,
        scope: &Scope,
        kind: LedgerKind,
        date: NaiveDate,
    ) -> SaleResult<NextInvoiceNumber> {
        validate_scope(scope, kind)?;

        let next = self
            .db
            .invoices()
            .peek_next(scope, self.config.invoice_partition, date)
            .await?;
        Ok(next)
    }

    /// Commits on success, rolls back and logs on failure.
    async fn finish<T>(
        &self,
        operation: &'static str,
        tx: Transaction<'static, Sqlite>,
        outcome: SaleResult<T>,
    ) -> SaleResult<T> {
        match outcome {
            Ok(value) => match tx.commit().await {
                Ok(()) => Ok(value),
                Err(commit_err) => {
                    let err = SaleError::from(commit_err);
                    log_commit_failure(operation, &err);
                    Err(err)
                }
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(operation, error = %rollback_err, "Rollback failed");
                }
                log_rejection(operation, &err);
                Err(err)
            }
        }
    }
}

fn log_rejection(operation: &'static str, err: &SaleError) {
    match err.kind() {
        ErrorKind::InternalError => error!(operation, error = %err, "Sale operation failed"),
        kind => warn!(operation, code = %kind, error = %err, "Sale operation rejected"),
    }
}

/// A commit that fails leaves nothing persisted, same as a rollback.
fn log_commit_failure(operation: &'static str, err: &SaleError) {
    match err.kind() {
        ErrorKind::Contention => warn!(operation, code = %err.kind(), error = %err, "Commit failed"),
        kind => error!(operation, code = %kind, error = %err, "Commit failed"),
    }
}

/// Branch users only see their own branch's sales.
fn visible_to(record: &SalesRecord, scope: &Scope, kind: LedgerKind) -> bool {
    match kind {
        LedgerKind::Organisation => true,
        LedgerKind::Branch => record.branch_id.is_some() && record.branch_id == scope.branch_id,
    }
}

/// The scope a stored sale was recorded under.
fn record_scope(record: &SalesRecord) -> Scope {
    Scope {
        tenant_id: record.tenant_id.clone(),
        organisation_id: record.organisation_id.clone(),
        branch_id: record.branch_id.clone(),
    }
}

// =============================================================================
// Ledger dispatch
// =============================================================================

/// One stock movement of a sale item.
#[derive(Debug, Clone)]
struct Movement {
    product_id: String,
    batch_id: String,
    quantity: Quantity,
}

impl Movement {
    fn of(item: &SalesRecordItem, kind: LedgerKind) -> SaleResult<Self> {
        let batch_id = item.batch_id(kind).ok_or_else(|| {
            SaleError::from(ValidationError::required(match kind {
                LedgerKind::Organisation => "stock_id",
                LedgerKind::Branch => "branch_stock_id",
            }))
        })?;
        Ok(Movement {
            product_id: item.product_id.clone(),
            batch_id: batch_id.to_string(),
            quantity: item.quantity(),
        })
    }
}

async fn deduct_with<L: StockLedger>(
    ledger: &L,
    conn: &mut SqliteConnection,
    scope: &Scope,
    movements: &[Movement],
) -> SaleResult<()> {
    for movement in movements {
        let batch = ledger.locate(&mut *conn, scope, &movement.batch_id).await?;
        if batch.product_id != movement.product_id {
            return Err(ValidationError::invalid(
                "product_id",
                format!(
                    "batch {} holds product {}, not {}",
                    batch.id, batch.product_id, movement.product_id
                ),
            )
            .into());
        }
        ledger.deduct_from(&mut *conn, &batch, movement.quantity).await?;
    }
    Ok(())
}

async fn revert_with<L: StockLedger>(
    ledger: &L,
    conn: &mut SqliteConnection,
    scope: &Scope,
    movements: &[Movement],
) -> SaleResult<()> {
    for movement in movements {
        ledger
            .revert(&mut *conn, scope, &movement.batch_id, movement.quantity)
            .await?;
    }
    Ok(())
}

/// Deducts every movement from the ledger selected by `kind`.
async fn deduct_all(
    kind: LedgerKind,
    conn: &mut SqliteConnection,
    scope: &Scope,
    movements: &[Movement],
) -> SaleResult<()> {
    match kind {
        LedgerKind::Organisation => deduct_with(&OrganisationLedger, conn, scope, movements).await,
        LedgerKind::Branch => deduct_with(&BranchLedger, conn, scope, movements).await,
    }
}

/// Returns every movement to the ledger selected by `kind`.
async fn revert_all(
    kind: LedgerKind,
    conn: &mut SqliteConnection,
    scope: &Scope,
    movements: &[Movement],
) -> SaleResult<()> {
    match kind {
        LedgerKind::Organisation => revert_with(&OrganisationLedger, conn, scope, movements).await,
        LedgerKind::Branch => revert_with(&BranchLedger, conn, scope, movements).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured_logs(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_commit_failure_is_logged() {
        let logs = captured_logs(|| {
            let err = SaleError::from(DbError::QueryFailed("disk I/O error".into()));
            log_commit_failure("create_sale", &err);
        });
        assert!(logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("Commit failed"), "{logs}");
        assert!(logs.contains("create_sale"), "{logs}");
        assert!(logs.contains("INTERNAL_ERROR"), "{logs}");

        let logs = captured_logs(|| {
            let err = SaleError::from(DbError::Busy("database is locked".into()));
            log_commit_failure("void_sale", &err);
        });
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("CONTENTION"), "{logs}");
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "metadata_only".parse::<EditStockPolicy>().unwrap(),
            EditStockPolicy::MetadataOnly
        );
        assert_eq!(
            "Revert-And-Rededuct".parse::<EditStockPolicy>().unwrap(),
            EditStockPolicy::RevertAndRededuct
        );
        assert!("always".parse::<EditStockPolicy>().is_err());
        assert_eq!(EditStockPolicy::default(), EditStockPolicy::MetadataOnly);
    }

    #[test]
    fn test_branch_visibility() {
        let scope = Scope::organisation("t1", "o1").with_branch("b1");
        let mut record = SalesRecord {
            id: "s1".into(),
            tenant_id: "t1".into(),
            organisation_id: "o1".into(),
            branch_id: Some("b2".into()),
            scope_key: "t1/o1".into(),
            invoice_no: "INV-20250115-00001".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            customer_id: None,
            payment_mode: Default::default(),
            sub_total: 0,
            total_amount: 0,
            value_of_goods: 0,
            total_gst: 0,
            discount: 0,
            paid_amount: 0,
            is_paid: true,
            is_partially_paid: false,
            ledger_kind: LedgerKind::Branch,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            deleted_at: None,
        };
        assert!(!visible_to(&record, &scope, LedgerKind::Branch));
        assert!(visible_to(&record, &scope, LedgerKind::Organisation));

        record.branch_id = Some("b1".into());
        assert!(visible_to(&record, &scope, LedgerKind::Branch));
    }
}
