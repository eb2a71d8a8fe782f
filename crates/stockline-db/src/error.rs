//! # Database Error Types
//!
//! Error types for database operations and the sale engine.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← Categorised: unique, FK, busy, contention                   │
//! │       │                                                                 │
//! │       │        CoreError (stock rules, validation)                     │
//! │       │             │                                                   │
//! │       ▼             ▼                                                   │
//! │  SaleError ← What the engine returns; always maps to one ErrorKind     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (in stockline-server) ← Serialized into the envelope         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use stockline_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate `(scope_key, invoice_no)` on sales_records
    /// - Any other UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The database is locked by another writer.
    ///
    /// ## When This Occurs
    /// - Another sale holds the write lock past the busy timeout
    #[error("Database busy: {0}")]
    Busy(String),

    /// A guarded write matched no row because the row changed after it was
    /// read.
    #[error("Concurrent update of {entity} {id}")]
    Contention { entity: String, id: String },

    /// The daily invoice counter reached its highest sequence.
    #[error("Invoice sequence {prefix} exhausted for {scope_key}")]
    SequenceExhausted { prefix: String, scope_key: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a Contention error for a row that changed under a guarded write.
    pub fn contention(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::Contention {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether the whole request may be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_) | DbError::Contention { .. } | DbError::PoolExhausted
        )
    }

    /// True if this is a unique violation on the given column list
    /// (as SQLite reports it, e.g. `sales_records.scope_key, sales_records.invoice_no`).
    pub fn is_unique_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(column))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze code/message for constraint or lock
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                // SQLite messages:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>, ..."
                // FK constraint:     "FOREIGN KEY constraint failed"
                // Busy / locked:     SQLITE_BUSY (5), SQLITE_LOCKED (6), "database is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if is_busy_code(code.as_deref()) || msg.contains("database is locked") {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// SQLITE_BUSY and SQLITE_LOCKED, including their extended codes.
fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xff, 5 | 6))
        .unwrap_or(false)
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Sale Error
// =============================================================================

/// Error returned by every [`SaleEngine`](crate::engine::SaleEngine)
/// operation.
///
/// Whatever the variant, the transaction it came from was rolled back.
#[derive(Debug, Error)]
pub enum SaleError {
    /// A stock or validation rule rejected the sale.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The database failed or was contended.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl SaleError {
    /// Returns the stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SaleError::Core(err) => err.kind(),
            SaleError::Db(err) if err.is_retryable() => ErrorKind::Contention,
            SaleError::Db(_) => ErrorKind::InternalError,
        }
    }
}

impl From<stockline_core::ValidationError> for SaleError {
    fn from(err: stockline_core::ValidationError) -> Self {
        SaleError::Core(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for SaleError {
    fn from(err: sqlx::Error) -> Self {
        SaleError::Db(err.into())
    }
}

/// Result type for engine operations.
pub type SaleResult<T> = Result<T, SaleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err: SaleError = DbError::contention("stocks", "s1").into();
        assert_eq!(err.kind(), ErrorKind::Contention);

        let err: SaleError = DbError::Busy("database is locked".into()).into();
        assert_eq!(err.kind(), ErrorKind::Contention);

        let err: SaleError = DbError::QueryFailed("syntax".into()).into();
        assert_eq!(err.kind(), ErrorKind::InternalError);

        let err: SaleError = CoreError::DuplicateInvoice("INV-20250115-00001".into()).into();
        assert_eq!(err.kind(), ErrorKind::DuplicateInvoice);
    }

    #[test]
    fn test_busy_codes() {
        assert!(is_busy_code(Some("5")));
        assert!(is_busy_code(Some("517"))); // SQLITE_BUSY_SNAPSHOT
        assert!(is_busy_code(Some("6")));
        assert!(!is_busy_code(Some("19")));
        assert!(!is_busy_code(None));
    }

    #[test]
    fn test_unique_on() {
        let err = DbError::duplicate("sales_records.scope_key, sales_records.invoice_no", "x");
        assert!(err.is_unique_on("sales_records.invoice_no"));
        assert!(!err.is_unique_on("stocks.id"));
    }
}
