//! Sale routes.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::{ApiResult, Envelope};
use crate::scope::CallerScope;
use crate::AppState;
use stockline_core::{SaleDetail, SaleRequest, SaleUpdateRequest};

/// Creates the sale routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sales", post(create_sale))
        .route("/sales/{id}", get(get_sale).put(update_sale).delete(void_sale))
}

async fn create_sale(
    State(state): State<AppState>,
    caller: CallerScope,
    payload: Result<Json<SaleRequest>, JsonRejection>,
) -> ApiResult<SaleDetail> {
    let Json(request) = payload?;
    let detail = state
        .engine
        .create_sale(&caller.scope, caller.kind, request)
        .await?;
    Ok(Envelope::ok(detail))
}

async fn get_sale(
    State(state): State<AppState>,
    caller: CallerScope,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<SaleDetail> {
    let Path(id) = id?;
    let detail = state.engine.get_sale(&caller.scope, caller.kind, &id).await?;
    Ok(Envelope::ok(detail))
}

async fn update_sale(
    State(state): State<AppState>,
    caller: CallerScope,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<SaleUpdateRequest>, JsonRejection>,
) -> ApiResult<SaleDetail> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let detail = state
        .engine
        .update_sale(&caller.scope, caller.kind, &id, request)
        .await?;
    Ok(Envelope::ok(detail))
}

/// Voids the sale and puts its stock back.
async fn void_sale(
    State(state): State<AppState>,
    caller: CallerScope,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<SaleDetail> {
    let Path(id) = id?;
    let detail = state.engine.void_sale(&caller.scope, caller.kind, &id).await?;
    Ok(Envelope::ok(detail))
}
