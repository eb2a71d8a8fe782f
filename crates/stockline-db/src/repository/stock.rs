//! # Stock Ledgers
//!
//! The organisation ledger (`stocks`) and the branch ledger
//! (`branch_stocks`) behind one [`StockLedger`] trait.
//!
//! ## Deduct Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ledger.deduct(conn, scope, id, qty)                  │
//! │                                                                         │
//! │  conn is inside a write transaction (Database::begin_write)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  fetch  SELECT batch JOIN product_variants (pack_size)                 │
//! │       │   missing / deleted / other scope → BatchNotFound              │
//! │       ▼                                                                 │
//! │  plan   stockline_core::pack::plan_deduction                           │
//! │       │   InsufficientStock / CannotBreakPack / InsufficientPacks      │
//! │       ▼                                                                 │
//! │  write  UPDATE ... WHERE id = ? AND available_quantity = ?old          │
//! │                            AND available_loose_quantity = ?old         │
//! │           0 rows → Contention                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is written until the plan succeeds, so a rejected item leaves
//! its batch untouched.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, SaleResult};
use crate::repository::generate_id;
use stockline_core::pack::{plan_deduction, plan_revert};
use stockline_core::{CoreError, DeductionPlan, LedgerKind, Quantity, Scope, StockBatch, StockLevel};

/// Columns selected into [`StockBatch`]; `s` is the ledger table, `v` the variant.
const BATCH_COLUMNS: &str = r#"
    s.id, s.product_id, s.variant_id, s.batch_no, s.expiry_date,
    v.pack_size,
    s.available_quantity, s.available_loose_quantity,
    s.sell_price, s.buy_price, s.mrp,
    s.tenant_id, s.organisation_id, s.branch_id,
    s.created_at, s.updated_at
"#;

// =============================================================================
// StockLedger
// =============================================================================

/// A table of stock batches that sales deduct from.
///
/// Every method takes the connection of the caller's transaction. For the
/// read-then-write methods to be safe that transaction must already hold
/// the write lock.
#[allow(async_fn_in_trait)]
pub trait StockLedger {
    /// Which ledger this is.
    const KIND: LedgerKind;

    /// Table holding the batches.
    const TABLE: &'static str;

    /// Whether a batch found under the caller's tenant and organisation
    /// also belongs to the caller's branch, where that matters.
    fn in_scope(batch: &StockBatch, scope: &Scope) -> bool;

    /// Reads a live batch of this ledger within the scope.
    async fn fetch(
        &self,
        conn: &mut SqliteConnection,
        scope: &Scope,
        batch_id: &str,
    ) -> DbResult<Option<StockBatch>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM {table} s
            INNER JOIN product_variants v ON v.id = s.variant_id
            WHERE s.id = ?1
              AND s.tenant_id = ?2
              AND s.organisation_id = ?3
              AND s.deleted_at IS NULL
            "#,
            table = Self::TABLE
        );

        let batch = sqlx::query_as::<_, StockBatch>(&sql)
            .bind(batch_id)
            .bind(&scope.tenant_id)
            .bind(&scope.organisation_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(batch.filter(|b| Self::in_scope(b, scope)))
    }

    /// Like [`fetch`](Self::fetch), but a missing batch is `BatchNotFound`.
    async fn locate(
        &self,
        conn: &mut SqliteConnection,
        scope: &Scope,
        batch_id: &str,
    ) -> SaleResult<StockBatch> {
        match self.fetch(&mut *conn, scope, batch_id).await? {
            Some(batch) => Ok(batch),
            None => Err(CoreError::BatchNotFound {
                ledger: Self::KIND,
                batch_id: batch_id.to_string(),
            }
            .into()),
        }
    }

    /// Dry run: reads the batch and plans the deduction without writing.
    async fn validate(
        &self,
        conn: &mut SqliteConnection,
        scope: &Scope,
        batch_id: &str,
        request: Quantity,
    ) -> SaleResult<DeductionPlan> {
        let batch = self.locate(&mut *conn, scope, batch_id).await?;
        let plan = plan_deduction(&batch.id, batch.pack_size()?, batch.level(), request)?;
        Ok(plan)
    }

    /// Deducts `request` from the batch, or rejects leaving it untouched.
    async fn deduct(
        &self,
        conn: &mut SqliteConnection,
        scope: &Scope,
        batch_id: &str,
        request: Quantity,
    ) -> SaleResult<DeductionPlan> {
        let batch = self.locate(&mut *conn, scope, batch_id).await?;
        self.deduct_from(&mut *conn, &batch, request).await
    }

    /// Deducts from a batch already read by [`locate`](Self::locate) in
    /// this transaction.
    async fn deduct_from(
        &self,
        conn: &mut SqliteConnection,
        batch: &StockBatch,
        request: Quantity,
    ) -> SaleResult<DeductionPlan> {
        let plan = plan_deduction(&batch.id, batch.pack_size()?, batch.level(), request)?;

        write_level(&mut *conn, Self::TABLE, &batch.id, plan.before, plan.after).await?;

        debug!(
            ledger = %Self::KIND,
            batch_id = %batch.id,
            packs = request.packs,
            loose = request.loose,
            packs_opened = plan.packs_opened,
            after_quantity = plan.after.quantity,
            after_loose = plan.after.loose_quantity,
            "Stock deducted"
        );
        Ok(plan)
    }

    /// Adds `amount` back to the batch. Only negative inputs are rejected.
    async fn revert(
        &self,
        conn: &mut SqliteConnection,
        scope: &Scope,
        batch_id: &str,
        amount: Quantity,
    ) -> SaleResult<StockLevel> {
        let batch = self.locate(&mut *conn, scope, batch_id).await?;
        let before = batch.level();
        let after = plan_revert(before, amount)?;

        write_level(&mut *conn, Self::TABLE, &batch.id, before, after).await?;

        debug!(
            ledger = %Self::KIND,
            batch_id = %batch.id,
            packs = amount.packs,
            loose = amount.loose,
            "Stock reverted"
        );
        Ok(after)
    }

    /// Inserts a new batch row.
    async fn insert(&self, conn: &mut SqliteConnection, batch: &StockBatch) -> DbResult<()> {
        let sql = format!(
            r#"
            INSERT INTO {table} (
                id, product_id, variant_id, batch_no, expiry_date,
                available_quantity, available_loose_quantity,
                sell_price, buy_price, mrp,
                tenant_id, organisation_id, branch_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            table = Self::TABLE
        );

        sqlx::query(&sql)
            .bind(&batch.id)
            .bind(&batch.product_id)
            .bind(&batch.variant_id)
            .bind(&batch.batch_no)
            .bind(batch.expiry_date)
            .bind(batch.available_quantity)
            .bind(batch.available_loose_quantity)
            .bind(batch.sell_price)
            .bind(batch.buy_price)
            .bind(batch.mrp)
            .bind(&batch.tenant_id)
            .bind(&batch.organisation_id)
            .bind(&batch.branch_id)
            .bind(batch.created_at)
            .bind(batch.updated_at)
            .execute(&mut *conn)
            .await?;

        debug!(ledger = %Self::KIND, batch_id = %batch.id, "Batch inserted");
        Ok(())
    }
}

/// Compare-and-set write of a batch's counters.
async fn write_level(
    conn: &mut SqliteConnection,
    table: &str,
    batch_id: &str,
    before: StockLevel,
    after: StockLevel,
) -> DbResult<()> {
    let sql = format!(
        r#"
        UPDATE {table} SET
            available_quantity = ?1,
            available_loose_quantity = ?2,
            updated_at = ?3
        WHERE id = ?4
          AND available_quantity = ?5
          AND available_loose_quantity = ?6
          AND deleted_at IS NULL
        "#
    );

    let result = sqlx::query(&sql)
        .bind(after.quantity)
        .bind(after.loose_quantity)
        .bind(Utc::now())
        .bind(batch_id)
        .bind(before.quantity)
        .bind(before.loose_quantity)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::contention(table, batch_id));
    }

    Ok(())
}

// =============================================================================
// Ledgers
// =============================================================================

/// Organisation-wide stock (`stocks`). Any branch of the organisation may
/// sell from it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrganisationLedger;

impl StockLedger for OrganisationLedger {
    const KIND: LedgerKind = LedgerKind::Organisation;
    const TABLE: &'static str = "stocks";

    fn in_scope(_batch: &StockBatch, _scope: &Scope) -> bool {
        true
    }
}

/// Per-branch stock (`branch_stocks`). Only the owning branch sells from it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchLedger;

impl StockLedger for BranchLedger {
    const KIND: LedgerKind = LedgerKind::Branch;
    const TABLE: &'static str = "branch_stocks";

    fn in_scope(batch: &StockBatch, scope: &Scope) -> bool {
        scope.branch_id.is_some() && batch.branch_id == scope.branch_id
    }
}

// =============================================================================
// Stock Repository
// =============================================================================

/// Fields for a new batch; scope and timestamps are filled in on insert.
#[derive(Debug, Clone, Default)]
pub struct NewStockBatch {
    pub product_id: String,
    pub variant_id: String,
    pub batch_no: String,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
    pub loose_quantity: i64,
    pub sell_price: i64,
    pub buy_price: i64,
    pub mrp: i64,
}

/// Pool-level access to both ledgers, for reads and stock entry outside a
/// sale.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Gets a live batch of the given ledger within the scope.
    pub async fn get(
        &self,
        kind: LedgerKind,
        scope: &Scope,
        batch_id: &str,
    ) -> DbResult<Option<StockBatch>> {
        let mut conn = self.pool.acquire().await?;
        match kind {
            LedgerKind::Organisation => OrganisationLedger.fetch(&mut conn, scope, batch_id).await,
            LedgerKind::Branch => BranchLedger.fetch(&mut conn, scope, batch_id).await,
        }
    }

    /// Records a purchase or stock-audit entry as a new batch.
    pub async fn create_batch(
        &self,
        kind: LedgerKind,
        scope: &Scope,
        new: NewStockBatch,
    ) -> DbResult<StockBatch> {
        if kind == LedgerKind::Branch && scope.branch_id.is_none() {
            return Err(DbError::QueryFailed(
                "branch batches require a branch_id".to_string(),
            ));
        }

        let now = Utc::now();
        let mut batch = StockBatch {
            id: generate_id(),
            product_id: new.product_id,
            variant_id: new.variant_id,
            batch_no: new.batch_no,
            expiry_date: new.expiry_date,
            pack_size: None,
            available_quantity: new.quantity,
            available_loose_quantity: new.loose_quantity,
            sell_price: new.sell_price,
            buy_price: new.buy_price,
            mrp: new.mrp,
            tenant_id: scope.tenant_id.clone(),
            organisation_id: scope.organisation_id.clone(),
            branch_id: scope.branch_id.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.pool.acquire().await?;
        match kind {
            LedgerKind::Organisation => OrganisationLedger.insert(&mut conn, &batch).await?,
            LedgerKind::Branch => BranchLedger.insert(&mut conn, &batch).await?,
        }

        let pack_size: Option<Option<i64>> =
            sqlx::query_scalar("SELECT pack_size FROM product_variants WHERE id = ?1")
                .bind(&batch.variant_id)
                .fetch_optional(&mut *conn)
                .await?;
        batch.pack_size = pack_size.flatten();

        Ok(batch)
    }

    /// Soft-deletes a batch. Deleted batches are invisible to sales.
    pub async fn soft_delete(&self, kind: LedgerKind, scope: &Scope, batch_id: &str) -> DbResult<()> {
        let table = match kind {
            LedgerKind::Organisation => OrganisationLedger::TABLE,
            LedgerKind::Branch => BranchLedger::TABLE,
        };
        let sql = format!(
            "UPDATE {table} SET deleted_at = ?1, updated_at = ?1 \
             WHERE id = ?2 AND tenant_id = ?3 AND organisation_id = ?4 AND deleted_at IS NULL"
        );

        let result = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(batch_id)
            .bind(&scope.tenant_id)
            .bind(&scope.organisation_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(table, batch_id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SaleError;
    use crate::{Database, DbConfig};
    use stockline_core::ErrorKind;

    struct Fixture {
        db: Database,
        scope: Scope,
        variant_id: String,
        product_id: String,
    }

    async fn fixture(pack_size: Option<i64>) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = Scope::organisation("t1", "o1").with_branch("b1");
        let product = db.catalog().create_product(&scope, "Amoxicillin 250").await.unwrap();
        let variant = db
            .catalog()
            .create_variant(&product.id, "Strip", pack_size)
            .await
            .unwrap();
        Fixture {
            db,
            scope,
            variant_id: variant.id,
            product_id: product.id,
        }
    }

    impl Fixture {
        async fn batch(&self, kind: LedgerKind, quantity: i64, loose: i64) -> StockBatch {
            self.db
                .stocks()
                .create_batch(
                    kind,
                    &self.scope,
                    NewStockBatch {
                        product_id: self.product_id.clone(),
                        variant_id: self.variant_id.clone(),
                        batch_no: "LOT-1".into(),
                        quantity,
                        loose_quantity: loose,
                        sell_price: 1000,
                        mrp: 1200,
                        ..Default::default()
                    },
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_deduct_persists_plan() {
        let f = fixture(Some(10)).await;
        let batch = f.batch(LedgerKind::Organisation, 5, 3).await;
        assert_eq!(batch.pack_size, Some(10));

        let mut tx = f.db.begin_write().await.unwrap();
        let plan = OrganisationLedger
            .deduct(&mut tx, &f.scope, &batch.id, Quantity::new(0, 13))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(plan.after, StockLevel::new(4, 0));
        let stored = f
            .db
            .stocks()
            .get(LedgerKind::Organisation, &f.scope, &batch.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.level(), StockLevel::new(4, 0));
    }

    #[tokio::test]
    async fn test_rejected_deduction_leaves_batch_untouched() {
        let f = fixture(Some(10)).await;
        let batch = f.batch(LedgerKind::Organisation, 2, 3).await;

        let mut tx = f.db.begin_write().await.unwrap();
        let err = OrganisationLedger
            .deduct(&mut tx, &f.scope, &batch.id, Quantity::new(2, 5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        tx.commit().await.unwrap();

        let stored = f
            .db
            .stocks()
            .get(LedgerKind::Organisation, &f.scope, &batch.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.level(), StockLevel::new(2, 3));
    }

    #[tokio::test]
    async fn test_validate_does_not_write() {
        let f = fixture(Some(10)).await;
        let batch = f.batch(LedgerKind::Branch, 5, 3).await;

        let mut conn = f.db.pool().acquire().await.unwrap();
        let plan = BranchLedger
            .validate(&mut conn, &f.scope, &batch.id, Quantity::new(1, 0))
            .await
            .unwrap();
        assert_eq!(plan.after, StockLevel::new(4, 3));

        let stored = BranchLedger
            .fetch(&mut conn, &f.scope, &batch.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.level(), StockLevel::new(5, 3));
    }

    #[tokio::test]
    async fn test_null_pack_size_counts_single_units() {
        let f = fixture(None).await;
        let batch = f.batch(LedgerKind::Organisation, 4, 0).await;

        let mut tx = f.db.begin_write().await.unwrap();
        let plan = OrganisationLedger
            .deduct(&mut tx, &f.scope, &batch.id, Quantity::new(0, 3))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // each loose unit opens one "pack" of size 1
        assert_eq!(plan.after, StockLevel::new(1, 0));
    }

    #[tokio::test]
    async fn test_zero_pack_size_is_validation_error() {
        let f = fixture(Some(0)).await;
        let batch = f.batch(LedgerKind::Organisation, 4, 0).await;

        let mut tx = f.db.begin_write().await.unwrap();
        let err = OrganisationLedger
            .deduct(&mut tx, &f.scope, &batch.id, Quantity::new(1, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_batch_not_found_across_ledgers_and_scopes() {
        let f = fixture(Some(10)).await;
        let org_batch = f.batch(LedgerKind::Organisation, 5, 0).await;
        let branch_batch = f.batch(LedgerKind::Branch, 5, 0).await;

        let mut tx = f.db.begin_write().await.unwrap();

        // organisation batch id used against the branch ledger
        let err = BranchLedger
            .deduct(&mut tx, &f.scope, &org_batch.id, Quantity::new(1, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SaleError::Core(CoreError::BatchNotFound {
                ledger: LedgerKind::Branch,
                ..
            })
        ));

        // another branch of the same organisation
        let other_branch = Scope::organisation("t1", "o1").with_branch("b2");
        let err = BranchLedger
            .deduct(&mut tx, &other_branch, &branch_batch.id, Quantity::new(1, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BatchNotFound);

        // another tenant
        let other_tenant = Scope::organisation("t2", "o1");
        let err = OrganisationLedger
            .deduct(&mut tx, &other_tenant, &org_batch.id, Quantity::new(1, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BatchNotFound);
        tx.rollback().await.unwrap();

        // soft-deleted
        f.db
            .stocks()
            .soft_delete(LedgerKind::Organisation, &f.scope, &org_batch.id)
            .await
            .unwrap();
        let mut tx = f.db.begin_write().await.unwrap();
        let err = OrganisationLedger
            .deduct(&mut tx, &f.scope, &org_batch.id, Quantity::new(1, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BatchNotFound);
    }

    #[tokio::test]
    async fn test_revert_restores_units() {
        let f = fixture(Some(10)).await;
        let batch = f.batch(LedgerKind::Organisation, 5, 3).await;

        let mut tx = f.db.begin_write().await.unwrap();
        OrganisationLedger
            .deduct(&mut tx, &f.scope, &batch.id, Quantity::new(1, 13))
            .await
            .unwrap();
        let after = OrganisationLedger
            .revert(&mut tx, &f.scope, &batch.id, Quantity::new(1, 13))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // opened pack is not resealed, total units are back
        assert_eq!(after.total_units(stockline_core::PackSize::new(10).unwrap()).unwrap(), 53);
    }

    #[tokio::test]
    async fn test_stale_write_is_contention() {
        let f = fixture(Some(10)).await;
        let batch = f.batch(LedgerKind::Organisation, 5, 3).await;

        let mut tx = f.db.begin_write().await.unwrap();
        let err = write_level(
            &mut tx,
            OrganisationLedger::TABLE,
            &batch.id,
            StockLevel::new(9, 9),
            StockLevel::new(8, 9),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::Contention { .. }));
        assert_eq!(SaleError::from(err).kind(), ErrorKind::Contention);
    }
}
