//! # Invoice Sequence
//!
//! Daily invoice counters, one row per `(prefix, scope_key)`.
//!
//! ```text
//! invoice_counters
//! ┌──────────────┬───────────┬─────────────┐
//! │ prefix       │ scope_key │ last_number │
//! ├──────────────┼───────────┼─────────────┤
//! │ INV-20250115 │ t1/o1     │ 2           │  → next: INV-20250115-00003
//! │ INV-20250115 │ t1/o2     │ 7           │
//! │ INV-20250116 │ t1/o1     │ 1           │
//! └──────────────┴───────────┴─────────────┘
//! ```
//!
//! [`InvoiceSequence::allocate`] runs inside the sale transaction, so an
//! aborted sale also rolls its increment back and the next sale receives
//! the same number.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use stockline_core::invoice::{format_invoice_number, prefix_for_date, MAX_SEQUENCE};
use stockline_core::{InvoicePartition, NextInvoiceNumber, Scope};

/// Allocator for per-scope daily invoice numbers.
#[derive(Debug, Clone)]
pub struct InvoiceSequence {
    pool: SqlitePool,
}

impl InvoiceSequence {
    /// Creates a new InvoiceSequence.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceSequence { pool }
    }

    /// Issues the next number for `(date, scope)`.
    ///
    /// Creates the counter at 1 on first use, increments it otherwise. The
    /// caller's transaction must hold the write lock. A counter already at
    /// [`MAX_SEQUENCE`] is left untouched and the call fails with
    /// [`DbError::SequenceExhausted`].
    pub async fn allocate(
        conn: &mut SqliteConnection,
        scope_key: &str,
        date: NaiveDate,
    ) -> DbResult<String> {
        let prefix = prefix_for_date(date);
        let now = Utc::now();

        let number: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_counters (prefix, scope_key, last_number, created_at, updated_at)
            VALUES (?1, ?2, 1, ?3, ?3)
            ON CONFLICT (prefix, scope_key) DO UPDATE SET
                last_number = last_number + 1,
                updated_at = excluded.updated_at
            WHERE last_number < ?4
            RETURNING last_number
            "#,
        )
        .bind(&prefix)
        .bind(scope_key)
        .bind(now)
        .bind(MAX_SEQUENCE)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(number) = number else {
            return Err(DbError::SequenceExhausted {
                prefix,
                scope_key: scope_key.to_string(),
            });
        };

        let invoice_no = format_invoice_number(&prefix, number);
        debug!(scope_key = %scope_key, invoice_no = %invoice_no, "Invoice number allocated");
        Ok(invoice_no)
    }

    /// Moves the counter up to `sequence` if it is behind.
    ///
    /// Used when a caller supplies an engine-format number for this scope
    /// and day, so later allocations skip past it. Never moves the counter
    /// beyond [`MAX_SEQUENCE`].
    pub async fn advance_to(
        conn: &mut SqliteConnection,
        scope_key: &str,
        date: NaiveDate,
        sequence: i64,
    ) -> DbResult<()> {
        let prefix = prefix_for_date(date);
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO invoice_counters (prefix, scope_key, last_number, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT (prefix, scope_key) DO UPDATE SET
                last_number = MAX(last_number, excluded.last_number),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&prefix)
        .bind(scope_key)
        .bind(sequence.min(MAX_SEQUENCE))
        .bind(now)
        .execute(&mut *conn)
        .await?;

        debug!(scope_key = %scope_key, prefix = %prefix, sequence, "Invoice counter advanced");
        Ok(())
    }

    /// Returns the number the next sale for `(date, scope)` would receive.
    /// Reserves nothing.
    pub async fn peek_next(
        &self,
        scope: &Scope,
        partition: InvoicePartition,
        date: NaiveDate,
    ) -> DbResult<NextInvoiceNumber> {
        let prefix = prefix_for_date(date);
        let scope_key = scope.key(partition);

        let last: Option<i64> = sqlx::query_scalar(
            "SELECT last_number FROM invoice_counters WHERE prefix = ?1 AND scope_key = ?2",
        )
        .bind(&prefix)
        .bind(&scope_key)
        .fetch_optional(&self.pool)
        .await?;

        let next = match last {
            None => 1,
            Some(n) if n < MAX_SEQUENCE => n + 1,
            Some(_) => return Err(DbError::SequenceExhausted { prefix, scope_key }),
        };
        Ok(NextInvoiceNumber {
            invoice_no: format_invoice_number(&prefix, next),
            reserved: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn jan15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[tokio::test]
    async fn test_first_allocation_of_the_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        let first = InvoiceSequence::allocate(&mut tx, "t1/o1", jan15()).await.unwrap();
        let second = InvoiceSequence::allocate(&mut tx, "t1/o1", jan15()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, "INV-20250115-00001");
        assert_eq!(second, "INV-20250115-00002");
    }

    #[tokio::test]
    async fn test_counters_are_per_scope_and_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        InvoiceSequence::allocate(&mut tx, "t1/o1", jan15()).await.unwrap();
        let other_org = InvoiceSequence::allocate(&mut tx, "t1/o2", jan15()).await.unwrap();
        let next_day = InvoiceSequence::allocate(&mut tx, "t1/o1", jan15().succ_opt().unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(other_org, "INV-20250115-00001");
        assert_eq!(next_day, "INV-20250116-00001");
    }

    #[tokio::test]
    async fn test_rollback_returns_the_number() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = Scope::organisation("t1", "o1");
        let key = scope.key(InvoicePartition::Organisation);

        let mut tx = db.begin_write().await.unwrap();
        assert_eq!(
            InvoiceSequence::allocate(&mut tx, &key, jan15()).await.unwrap(),
            "INV-20250115-00001"
        );
        tx.rollback().await.unwrap();

        let peek = db
            .invoices()
            .peek_next(&scope, InvoicePartition::Organisation, jan15())
            .await
            .unwrap();
        assert_eq!(peek.invoice_no, "INV-20250115-00001");
        assert!(!peek.reserved);

        let mut tx = db.begin_write().await.unwrap();
        assert_eq!(
            InvoiceSequence::allocate(&mut tx, &key, jan15()).await.unwrap(),
            "INV-20250115-00001"
        );
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_peek_does_not_reserve() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = Scope::organisation("t1", "o1");

        for _ in 0..3 {
            let peek = db
                .invoices()
                .peek_next(&scope, InvoicePartition::Organisation, jan15())
                .await
                .unwrap();
            assert_eq!(peek.invoice_no, "INV-20250115-00001");
        }
    }

    #[tokio::test]
    async fn test_advance_only_moves_forward() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        InvoiceSequence::advance_to(&mut tx, "t1/o1", jan15(), 7).await.unwrap();
        InvoiceSequence::advance_to(&mut tx, "t1/o1", jan15(), 3).await.unwrap();
        let next = InvoiceSequence::allocate(&mut tx, "t1/o1", jan15()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(next, "INV-20250115-00008");
    }

    #[tokio::test]
    async fn test_sequence_grows_past_five_digits() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        InvoiceSequence::advance_to(&mut tx, "t1/o1", jan15(), 99_999).await.unwrap();
        let next = InvoiceSequence::allocate(&mut tx, "t1/o1", jan15()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(next, "INV-20250115-100000");
    }

    #[tokio::test]
    async fn test_exhausted_counter_stays_put() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        InvoiceSequence::advance_to(&mut tx, "t1/o1", jan15(), i64::MAX).await.unwrap();
        let err = InvoiceSequence::allocate(&mut tx, "t1/o1", jan15()).await.unwrap_err();
        tx.commit().await.unwrap();

        assert!(matches!(err, DbError::SequenceExhausted { .. }));
        let last: i64 = sqlx::query_scalar("SELECT last_number FROM invoice_counters")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(last, MAX_SEQUENCE);
    }
}
