//! Invoice number routes.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{ApiResult, Envelope};
use crate::scope::CallerScope;
use crate::AppState;
use stockline_core::NextInvoiceNumber;

/// Creates the invoice routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/invoices/next", get(next_invoice_number))
}

/// Query parameters for the next invoice number.
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    /// Business date (YYYY-MM-DD). Defaults to today (UTC).
    pub date: Option<NaiveDate>,
}

/// The number the next sale on `date` would receive. Nothing is reserved.
async fn next_invoice_number(
    State(state): State<AppState>,
    caller: CallerScope,
    query: Result<Query<NextQuery>, QueryRejection>,
) -> ApiResult<NextInvoiceNumber> {
    let Query(query) = query?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let next = state
        .engine
        .next_invoice_number(&caller.scope, caller.kind, date)
        .await?;
    Ok(Envelope::ok(next))
}
