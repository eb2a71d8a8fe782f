//! # stockline-db: Database Layer and Sale Engine
//!
//! SQLite storage for the two stock ledgers, the invoice counters and the
//! sale rows, plus the [`SaleEngine`] that composes them into one
//! transaction per sale.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Data Flow                              │
//! │                                                                         │
//! │  POST /sales (stockline-server)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockline-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  SaleEngine   │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (engine/)    │───►│  stock.rs     │    │  (embedded)  │  │   │
//! │  │   │               │    │  invoice.rs   │    │              │  │   │
//! │  │   │ create/update │    │  sale.rs      │    │ 001_initial  │  │   │
//! │  │   │ void          │    │  catalog.rs   │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                     │   │
//! │  │   ┌───────▼───────┐                                             │   │
//! │  │   │   Database    │  begin_write() → one writer at a time       │   │
//! │  │   │   (pool.rs)   │                                             │   │
//! │  │   └───────────────┘                                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and the write-locked transaction
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and sale error types
//! - [`repository`] - Ledgers, invoice counters, sale rows, catalog
//! - [`engine`] - Sale create, update and void
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockline_db::{Database, DbConfig, SaleEngineConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/stockline.db")).await?;
//! let engine = db.sale_engine(SaleEngineConfig::default());
//!
//! let detail = engine.create_sale(&scope, LedgerKind::Organisation, request).await?;
//! println!("{}", detail.record.invoice_no);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use engine::{EditStockPolicy, SaleEngine, SaleEngineConfig};
pub use error::{DbError, DbResult, SaleError, SaleResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::invoice::InvoiceSequence;
pub use repository::sale::SaleRepository;
pub use repository::stock::{BranchLedger, NewStockBatch, OrganisationLedger, StockLedger, StockRepository};
