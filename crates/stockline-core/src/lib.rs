//! # stockline-core: Pure Business Logic for Stockline
//!
//! The rules behind every sale: pack/loose arithmetic, the deduction
//! algorithm, invoice number formatting, request validation and the error
//! taxonomy. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 stockline-server (axum)                         │   │
//! │  │    scope headers ──► routes ──► envelope                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 stockline-db (SaleEngine)                       │   │
//! │  │    transaction ─► invoice counter ─► ledgers ─► sale rows      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ stockline-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   pack    │  │  invoice  │  │   types   │  │ validation│  │   │
//! │  │   │ converter │  │  format   │  │   money   │  │   error   │  │   │
//! │  │   │  planner  │  │  parse    │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pack`] - Pack/loose converter and the deduction planner
//! - [`invoice`] - `INV-YYYYMMDD-NNNNN` formatting and parsing
//! - [`types`] - Domain types (StockBatch, SalesRecord, requests)
//! - [`money`] - Integer money and payment flags
//! - [`validation`] - Request validation
//! - [`error`] - Error taxonomy and stable codes
//!
//! ## Example Usage
//!
//! ```rust
//! use stockline_core::pack::{plan_deduction, PackSize, Quantity, StockLevel};
//!
//! let pack = PackSize::new(10).unwrap();
//! let plan = plan_deduction("B-1", pack, StockLevel::new(5, 3), Quantity::new(0, 13)).unwrap();
//!
//! // one strip opened, nothing loose left over
//! assert_eq!(plan.after, StockLevel::new(4, 0));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod invoice;
pub mod money;
pub mod pack;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::{Money, PaymentStatus};
pub use pack::{DeductionPlan, PackSize, Quantity, StockLevel};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items in a single sale.
pub const MAX_SALE_ITEMS: usize = 200;

/// Maximum length of a caller-supplied invoice number.
pub const MAX_INVOICE_NO_LENGTH: usize = 64;

/// Maximum length of tenant, organisation, branch, product and batch ids.
pub const MAX_ID_LENGTH: usize = 64;

/// Highest tax rate on a line, in basis points (10000 = 100%).
pub const MAX_TAX_BASIS_POINTS: i64 = 10_000;
