//! # Sale Repository
//!
//! Rows of `sales_records`, `sales_record_items` and `payment_histories`.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (one transaction, see engine::create)                       │
//! │     └── insert_record() → header with invoice_no                       │
//! │     └── insert_item()   → one row per line                             │
//! │     └── insert_payment()→ when paid_amount > 0                         │
//! │                                                                         │
//! │  2. (OPTIONAL) EDIT                                                    │
//! │     └── update_record(), update_item(), insert_item(), delete_item()   │
//! │                                                                         │
//! │  3. (OPTIONAL) VOID                                                    │
//! │     └── soft_delete() → deleted_at set, invoice_no stays taken         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Write methods take the caller's transaction; only [`SaleRepository::get_detail`]
//! uses the pool directly.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use stockline_core::{PaymentHistory, SaleDetail, SalesRecord, SalesRecordItem, Scope};

const RECORD_COLUMNS: &str = r#"
    id, tenant_id, organisation_id, branch_id, scope_key, invoice_no, date,
    customer_id, payment_mode,
    sub_total, total_amount, value_of_goods, total_gst, discount,
    paid_amount, is_paid, is_partially_paid, ledger_kind,
    created_at, updated_at, deleted_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, sales_record_id, product_id, stock_id, branch_stock_id,
    qty, loose_qty, price, mrp, amount, tax_percentage,
    tenant_id, organisation_id, branch_id, created_at, updated_at
"#;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a live sale with its items and payments.
    pub async fn get_detail(&self, scope: &Scope, id: &str) -> DbResult<Option<SaleDetail>> {
        let mut conn = self.pool.acquire().await?;
        match Self::find_record(&mut conn, scope, id).await? {
            Some(record) => Ok(Some(Self::load_detail(&mut conn, record).await?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Reads (any connection)
    // =========================================================================

    /// Whether `invoice_no` is taken within the scope key. Voided sales
    /// still count.
    pub async fn invoice_exists(
        conn: &mut SqliteConnection,
        scope_key: &str,
        invoice_no: &str,
    ) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM sales_records WHERE scope_key = ?1 AND invoice_no = ?2 LIMIT 1",
        )
        .bind(scope_key)
        .bind(invoice_no)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(found.is_some())
    }

    /// Gets a live sale header within the caller's tenant and organisation.
    pub async fn find_record(
        conn: &mut SqliteConnection,
        scope: &Scope,
        id: &str,
    ) -> DbResult<Option<SalesRecord>> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM sales_records
            WHERE id = ?1
              AND tenant_id = ?2
              AND organisation_id = ?3
              AND deleted_at IS NULL
            "#
        );

        let record = sqlx::query_as::<_, SalesRecord>(&sql)
            .bind(id)
            .bind(&scope.tenant_id)
            .bind(&scope.organisation_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(record)
    }

    /// Gets all items of a sale in insertion order.
    pub async fn list_items(
        conn: &mut SqliteConnection,
        sales_record_id: &str,
    ) -> DbResult<Vec<SalesRecordItem>> {
        let sql = format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM sales_record_items
            WHERE sales_record_id = ?1
            ORDER BY created_at, rowid
            "#
        );

        let items = sqlx::query_as::<_, SalesRecordItem>(&sql)
            .bind(sales_record_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(items)
    }

    /// Gets all payments of a sale.
    pub async fn list_payments(
        conn: &mut SqliteConnection,
        sales_record_id: &str,
    ) -> DbResult<Vec<PaymentHistory>> {
        let payments = sqlx::query_as::<_, PaymentHistory>(
            r#"
            SELECT id, sales_record_id, amount, payment_mode, date,
                   tenant_id, organisation_id, branch_id, created_at
            FROM payment_histories
            WHERE sales_record_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(sales_record_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(payments)
    }

    /// Loads items and payments for a header.
    pub async fn load_detail(
        conn: &mut SqliteConnection,
        record: SalesRecord,
    ) -> DbResult<SaleDetail> {
        let items = Self::list_items(&mut *conn, &record.id).await?;
        let payments = Self::list_payments(&mut *conn, &record.id).await?;
        Ok(SaleDetail {
            record,
            items,
            payments,
        })
    }

    // =========================================================================
    // Writes (caller's transaction)
    // =========================================================================

    /// Inserts a sale header.
    pub async fn insert_record(conn: &mut SqliteConnection, record: &SalesRecord) -> DbResult<()> {
        debug!(id = %record.id, invoice_no = %record.invoice_no, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales_records (
                id, tenant_id, organisation_id, branch_id, scope_key, invoice_no, date,
                customer_id, payment_mode,
                sub_total, total_amount, value_of_goods, total_gst, discount,
                paid_amount, is_paid, is_partially_paid, ledger_kind,
                created_at, updated_at, deleted_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9,
                ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18,
                ?19, ?20, ?21
            )
            "#,
        )
        .bind(&record.id)
        .bind(&record.tenant_id)
        .bind(&record.organisation_id)
        .bind(&record.branch_id)
        .bind(&record.scope_key)
        .bind(&record.invoice_no)
        .bind(record.date)
        .bind(&record.customer_id)
        .bind(record.payment_mode)
        .bind(record.sub_total)
        .bind(record.total_amount)
        .bind(record.value_of_goods)
        .bind(record.total_gst)
        .bind(record.discount)
        .bind(record.paid_amount)
        .bind(record.is_paid)
        .bind(record.is_partially_paid)
        .bind(record.ledger_kind)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.deleted_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Updates the editable header fields. `invoice_no`, scope and
    /// `paid_amount` never change.
    pub async fn update_record(conn: &mut SqliteConnection, record: &SalesRecord) -> DbResult<()> {
        debug!(id = %record.id, "Updating sale");

        let result = sqlx::query(
            r#"
            UPDATE sales_records SET
                date = ?2,
                customer_id = ?3,
                payment_mode = ?4,
                sub_total = ?5,
                total_amount = ?6,
                value_of_goods = ?7,
                total_gst = ?8,
                discount = ?9,
                is_paid = ?10,
                is_partially_paid = ?11,
                updated_at = ?12
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(&record.id)
        .bind(record.date)
        .bind(&record.customer_id)
        .bind(record.payment_mode)
        .bind(record.sub_total)
        .bind(record.total_amount)
        .bind(record.value_of_goods)
        .bind(record.total_gst)
        .bind(record.discount)
        .bind(record.is_paid)
        .bind(record.is_partially_paid)
        .bind(record.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", &record.id));
        }
        Ok(())
    }

    /// Marks a sale as voided at `at`.
    pub async fn soft_delete(
        conn: &mut SqliteConnection,
        id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sales_records SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }
        Ok(())
    }

    /// Inserts a sale item.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &SalesRecordItem) -> DbResult<()> {
        debug!(
            sales_record_id = %item.sales_record_id,
            product_id = %item.product_id,
            qty = item.qty,
            loose_qty = item.loose_qty,
            "Inserting sale item"
        );

        sqlx::query(
            r#"
            INSERT INTO sales_record_items (
                id, sales_record_id, product_id, stock_id, branch_stock_id,
                qty, loose_qty, price, mrp, amount, tax_percentage,
                tenant_id, organisation_id, branch_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sales_record_id)
        .bind(&item.product_id)
        .bind(&item.stock_id)
        .bind(&item.branch_stock_id)
        .bind(item.qty)
        .bind(item.loose_qty)
        .bind(item.price)
        .bind(item.mrp)
        .bind(item.amount)
        .bind(item.tax_percentage)
        .bind(&item.tenant_id)
        .bind(&item.organisation_id)
        .bind(&item.branch_id)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Updates a sale item in place.
    pub async fn update_item(conn: &mut SqliteConnection, item: &SalesRecordItem) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales_record_items SET
                product_id = ?3,
                stock_id = ?4,
                branch_stock_id = ?5,
                qty = ?6,
                loose_qty = ?7,
                price = ?8,
                mrp = ?9,
                amount = ?10,
                tax_percentage = ?11,
                updated_at = ?12
            WHERE id = ?1 AND sales_record_id = ?2
            "#,
        )
        .bind(&item.id)
        .bind(&item.sales_record_id)
        .bind(&item.product_id)
        .bind(&item.stock_id)
        .bind(&item.branch_stock_id)
        .bind(item.qty)
        .bind(item.loose_qty)
        .bind(item.price)
        .bind(item.mrp)
        .bind(item.amount)
        .bind(item.tax_percentage)
        .bind(item.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale item", &item.id));
        }
        Ok(())
    }

    /// Deletes a sale item.
    pub async fn delete_item(
        conn: &mut SqliteConnection,
        sales_record_id: &str,
        id: &str,
    ) -> DbResult<()> {
        let result =
            sqlx::query("DELETE FROM sales_record_items WHERE id = ?1 AND sales_record_id = ?2")
                .bind(id)
                .bind(sales_record_id)
                .execute(&mut *conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale item", id));
        }
        Ok(())
    }

    /// Records a payment for a sale.
    pub async fn insert_payment(conn: &mut SqliteConnection, payment: &PaymentHistory) -> DbResult<()> {
        debug!(sales_record_id = %payment.sales_record_id, amount = payment.amount, "Recording payment");

        sqlx::query(
            r#"
            INSERT INTO payment_histories (
                id, sales_record_id, amount, payment_mode, date,
                tenant_id, organisation_id, branch_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sales_record_id)
        .bind(payment.amount)
        .bind(payment.payment_mode)
        .bind(payment.date)
        .bind(&payment.tenant_id)
        .bind(&payment.organisation_id)
        .bind(&payment.branch_id)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
