//! # Repository Module
//!
//! Database repository implementations for Stockline.
//!
//! ## Two Access Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool-backed (struct holds SqlitePool)                                 │
//! │  ├── db.catalog().create_variant(...)                                  │
//! │  ├── db.stocks().get(kind, scope, id)                                  │
//! │  ├── db.sales().get_detail(scope, id)                                  │
//! │  └── db.invoices().peek_next(scope, partition, date)                   │
//! │                                                                         │
//! │  Transaction-backed (associated fns / trait methods on &mut conn)      │
//! │  ├── OrganisationLedger / BranchLedger: fetch, validate, deduct, revert│
//! │  ├── InvoiceSequence::allocate, advance_to                             │
//! │  └── SaleRepository::insert_record, insert_item, insert_payment, ...   │
//! │                                                                         │
//! │  The second style is what the sale engine composes into one            │
//! │  transaction.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Products and variants
//! - [`StockLedger`](stock::StockLedger) - The two stock ledgers
//! - [`InvoiceSequence`](invoice::InvoiceSequence) - Daily invoice counters
//! - [`SaleRepository`](sale::SaleRepository) - Sale headers, items, payments

pub mod catalog;
pub mod invoice;
pub mod sale;
pub mod stock;

/// Generates a new row ID.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
