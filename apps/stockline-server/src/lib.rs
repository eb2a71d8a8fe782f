//! # Stockline Server
//!
//! HTTP surface for the sale engine.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Stockline HTTP API                              │
//! │                                                                         │
//! │  ┌────────────────────────────┐  ┌────────────────────────────┐        │
//! │  │  Sales                     │  │  Invoices                  │        │
//! │  │                            │  │                            │        │
//! │  │ • POST   /sales            │  │ • GET /invoices/next?date= │        │
//! │  │ • GET    /sales/{id}       │  │   (advisory, reserves      │        │
//! │  │ • PUT    /sales/{id}       │  │    nothing)                │        │
//! │  │ • DELETE /sales/{id} (void)│  │                            │        │
//! │  └────────────────────────────┘  └────────────────────────────┘        │
//! │                                                                         │
//! │  ┌────────────────────────────┐                                         │
//! │  │  GET /health               │   every body: {result, exception,       │
//! │  └────────────────────────────┘                pagination, statusCode}  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `STOCKLINE_BIND_ADDR` - Listen address (default: 0.0.0.0:8080)
//! - `STOCKLINE_DATABASE_PATH` - SQLite file (default: ./stockline.db)
//! - `STOCKLINE_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `STOCKLINE_INVOICE_PARTITION` - `organisation` or `branch`
//! - `STOCKLINE_EDIT_STOCK_POLICY` - `metadata_only` or `revert_and_rededuct`
//! - `STOCKLINE_LOG_LEVEL` - Filter when `RUST_LOG` is unset (default: info)

pub mod config;
pub mod error;
pub mod routes;
pub mod scope;

use axum::Router;

use stockline_db::{Database, SaleEngine};

// Re-exports
pub use config::ServerConfig;
pub use error::{ApiError, Envelope};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: SaleEngine,
}

impl AppState {
    pub fn new(db: Database, engine: SaleEngine) -> Self {
        AppState { db, engine }
    }
}

/// Creates the application router.
pub fn router(state: AppState) -> Router {
    routes::routes().with_state(state)
}
