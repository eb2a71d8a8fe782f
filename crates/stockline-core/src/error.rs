//! # Error Types
//!
//! Domain-specific error types for stockline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockline-core errors (this file)                                     │
//! │  ├── CoreError        - Stock and invoice rule violations              │
//! │  ├── ValidationError  - Malformed sale requests                        │
//! │  └── ErrorKind        - Stable, wire-visible classification            │
//! │                                                                         │
//! │  stockline-db errors (separate crate)                                  │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── SaleError        - CoreError | DbError, returned by the engine    │
//! │                                                                         │
//! │  stockline-server                                                      │
//! │  └── ApiError         - What the caller sees (inside the envelope)     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SaleError → ApiError → Caller     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;
use crate::types::LedgerKind;

// =============================================================================
// Error Kind
// =============================================================================

/// Stable classification of every failure the engine can report.
///
/// Each kind serializes to a fixed machine code. Callers switch on the code,
/// so renaming a variant is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    DuplicateInvoice,
    InsufficientStock,
    InsufficientPacks,
    CannotBreakPack,
    BatchNotFound,
    SaleNotFound,
    ValidationError,
    /// The database was busy or a guarded write lost a race. Safe to retry
    /// the whole request.
    Contention,
    InternalError,
}

impl ErrorKind {
    /// Returns the machine code sent to callers.
    pub const fn code(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateInvoice => "DUPLICATE_INVOICE",
            ErrorKind::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorKind::InsufficientPacks => "INSUFFICIENT_PACKS",
            ErrorKind::CannotBreakPack => "CANNOT_BREAK_PACK",
            ErrorKind::BatchNotFound => "BATCH_NOT_FOUND",
            ErrorKind::SaleNotFound => "SALE_NOT_FOUND",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::Contention => "CONTENTION",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may retry the whole request unchanged.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Contention)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant that rejects a stock movement is raised before any row is
/// written, so the batch is left exactly as it was read.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested units exceed everything the batch holds.
    ///
    /// ## When This Occurs
    /// ```text
    /// pack_size = 10, stock = 2 packs + 3 loose  → 23 units
    /// request   = 2 packs + 5 loose              → 25 units
    ///      │
    ///      ▼
    /// InsufficientStock { available: 23, requested: 25 }
    /// ```
    #[error("Insufficient stock in batch {batch_id}: available {available} units, requested {requested}")]
    InsufficientStock {
        batch_id: String,
        available: i64,
        requested: i64,
    },

    /// Enough units overall, but not enough sealed packs left after the
    /// loose portion was served.
    #[error("Insufficient packs in batch {batch_id}: available {available}, requested {requested}")]
    InsufficientPacks {
        batch_id: String,
        available: i64,
        requested: i64,
    },

    /// The loose portion needs more packs opened than the batch holds.
    #[error("Cannot break pack in batch {batch_id}: {packs_needed} packs needed, {packs_available} available")]
    CannotBreakPack {
        batch_id: String,
        packs_available: i64,
        packs_needed: i64,
    },

    /// Stock batch does not exist in the selected ledger for this scope.
    ///
    /// ## When This Occurs
    /// - Batch id unknown
    /// - Batch was soft-deleted
    /// - Batch belongs to another tenant, organisation or branch
    /// - Item points at a branch batch while the organisation ledger is active
    #[error("Stock batch not found in {ledger} ledger: {batch_id}")]
    BatchNotFound { ledger: LedgerKind, batch_id: String },

    /// Invoice number already used within the scope.
    #[error("Invoice number already exists: {0}")]
    DuplicateInvoice(String),

    /// Sale not found (or already voided).
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::InsufficientPacks { .. } => ErrorKind::InsufficientPacks,
            CoreError::CannotBreakPack { .. } => ErrorKind::CannotBreakPack,
            CoreError::BatchNotFound { .. } => ErrorKind::BatchNotFound,
            CoreError::DuplicateInvoice(_) => ErrorKind::DuplicateInvoice,
            CoreError::SaleNotFound(_) => ErrorKind::SaleNotFound,
            CoreError::Validation(_) => ErrorKind::ValidationError,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a transaction is opened whenever possible.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. unparseable role or invoice number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// An edited total would fall below the amount already paid.
    #[error("total_amount {total} is below the {paid} already paid")]
    BelowPaid { total: Money, paid: Money },

    /// Arithmetic on the submitted quantities would overflow.
    #[error("{field} is too large")]
    Overflow { field: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn negative(field: impl Into<String>) -> Self {
        ValidationError::Negative {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            batch_id: "B-1".to_string(),
            available: 23,
            requested: 25,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock in batch B-1: available 23 units, requested 25"
        );

        let err = CoreError::BatchNotFound {
            ledger: LedgerKind::Branch,
            batch_id: "B-9".to_string(),
        };
        assert_eq!(err.to_string(), "Stock batch not found in branch ledger: B-9");
    }

    #[test]
    fn test_every_kind_has_distinct_code() {
        let kinds = [
            ErrorKind::DuplicateInvoice,
            ErrorKind::InsufficientStock,
            ErrorKind::InsufficientPacks,
            ErrorKind::CannotBreakPack,
            ErrorKind::BatchNotFound,
            ErrorKind::SaleNotFound,
            ErrorKind::ValidationError,
            ErrorKind::Contention,
            ErrorKind::InternalError,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_kind_serializes_to_code() {
        let json = serde_json::to_string(&ErrorKind::CannotBreakPack).unwrap();
        assert_eq!(json, "\"CANNOT_BREAK_PACK\"");
        assert_eq!(ErrorKind::CannotBreakPack.to_string(), "CANNOT_BREAK_PACK");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("items").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn test_only_contention_is_retryable() {
        assert!(ErrorKind::Contention.is_retryable());
        assert!(!ErrorKind::InsufficientStock.is_retryable());
        assert!(!ErrorKind::DuplicateInvoice.is_retryable());
    }
}
