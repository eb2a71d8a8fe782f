//! API route definitions.

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::error::Envelope;
use crate::AppState;

pub mod invoice;
pub mod sale;

/// Creates the router with all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(sale::routes())
        .merge(invoice::routes())
        .route("/health", get(health))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
}

async fn health(State(state): State<AppState>) -> Envelope<Health> {
    let database = state.db.health_check().await;
    Envelope::ok(Health {
        status: if database { "ok" } else { "degraded" },
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}

// =============================================================================
// HTTP Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::scope::{BRANCH_HEADER, ORGANISATION_HEADER, ROLE_HEADER, TENANT_HEADER};
    use crate::{router, AppState};
    use stockline_core::{LedgerKind, Scope};
    use stockline_db::{Database, DbConfig, NewStockBatch, SaleEngineConfig};

    struct TestApp {
        app: Router,
        db: Database,
        batch_id: String,
        product_id: String,
    }

    async fn app(quantity: i64, loose: i64) -> TestApp {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = Scope::organisation("t1", "o1").with_branch("b1");
        let product = db.catalog().create_product(&scope, "Paracetamol 500").await.unwrap();
        let variant = db
            .catalog()
            .create_variant(&product.id, "Strip of 10", Some(10))
            .await
            .unwrap();
        let batch = db
            .stocks()
            .create_batch(
                LedgerKind::Organisation,
                &scope,
                NewStockBatch {
                    product_id: product.id.clone(),
                    variant_id: variant.id,
                    batch_no: "LOT-1".into(),
                    quantity,
                    loose_quantity: loose,
                    sell_price: 350,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let engine = db.sale_engine(SaleEngineConfig::default());
        TestApp {
            app: router(AppState::new(db.clone(), engine)),
            db,
            batch_id: batch.id,
            product_id: product.id,
        }
    }

    impl TestApp {
        fn sale_body(&self, qty: i64, loose_qty: i64) -> Value {
            json!({
                "date": "2025-01-15",
                "payment_mode": "cash",
                "paid_amount": 0,
                "total_amount": 350,
                "items": [{
                    "product_id": self.product_id,
                    "stock_id": self.batch_id,
                    "qty": qty,
                    "loose_qty": loose_qty,
                    "price": 350
                }]
            })
        }

        async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(TENANT_HEADER, "t1")
                .header(ORGANISATION_HEADER, "o1")
                .header(BRANCH_HEADER, "b1")
                .header(ROLE_HEADER, "org_admin")
                .header("content-type", "application/json");
            let request = match body {
                Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, serde_json::from_slice(&bytes).unwrap())
        }
    }

    #[tokio::test]
    async fn test_create_sale_returns_envelope() {
        let t = app(5, 3).await;

        let (status, body) = t.send("POST", "/sales", Some(t.sale_body(0, 13))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["statusCode"], 200);
        assert_eq!(body["exception"], Value::Null);
        assert_eq!(body["pagination"], Value::Null);
        assert_eq!(body["result"]["record"]["invoice_no"], "INV-20250115-00001");

        let batch = t
            .db
            .stocks()
            .get(LedgerKind::Organisation, &Scope::organisation("t1", "o1"), &t.batch_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((batch.available_quantity, batch.available_loose_quantity), (4, 0));
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_422_with_code() {
        let t = app(2, 3).await;

        let (status, body) = t.send("POST", "/sales", Some(t.sale_body(2, 5))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["statusCode"], 422);
        assert_eq!(body["result"], Value::Null);
        assert_eq!(body["exception"]["code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["exception"]["retryable"], false);
    }

    #[tokio::test]
    async fn test_duplicate_invoice_is_409() {
        let t = app(10, 0).await;
        let mut body = t.sale_body(1, 0);
        body["invoice_no"] = json!("MANUAL-1");

        let (status, _) = t.send("POST", "/sales", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = t.send("POST", "/sales", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["exception"]["code"], "DUPLICATE_INVOICE");
    }

    #[tokio::test]
    async fn test_missing_scope_headers_is_validation_error() {
        let t = app(10, 0).await;
        let request = Request::builder()
            .method("GET")
            .uri("/invoices/next?date=2025-01-15")
            .body(Body::empty())
            .unwrap();

        let response = t.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["exception"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let t = app(10, 0).await;
        let (status, body) = t
            .send("POST", "/sales", Some(json!({ "date": "not-a-date", "items": [] })))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["exception"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_undecodable_sale_id_is_enveloped() {
        let t = app(10, 0).await;
        // %FF does not decode to UTF-8
        let (status, body) = t.send("GET", "/sales/%FF", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["statusCode"], 422);
        assert_eq!(body["exception"]["code"], "VALIDATION_ERROR");

        let (status, body) = t.send("DELETE", "/sales/%FF", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["exception"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_get_update_void_round_trip() {
        let t = app(10, 0).await;

        let (_, created) = t.send("POST", "/sales", Some(t.sale_body(2, 0))).await;
        let id = created["result"]["record"]["id"].as_str().unwrap().to_string();
        let item_id = created["result"]["items"][0]["id"].as_str().unwrap().to_string();

        let (status, fetched) = t.send("GET", &format!("/sales/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["result"]["items"].as_array().unwrap().len(), 1);

        let edit = json!({
            "date": "2025-01-15",
            "total_amount": 700,
            "items": [{
                "id": item_id,
                "product_id": t.product_id,
                "stock_id": t.batch_id,
                "qty": 2,
                "price": 350,
                "amount": 700
            }]
        });
        let (status, updated) = t.send("PUT", &format!("/sales/{id}"), Some(edit)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["result"]["record"]["total_amount"], 700);

        let (status, voided) = t.send("DELETE", &format!("/sales/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(voided["result"]["record"]["deleted_at"].is_string());

        let (status, body) = t.send("GET", &format!("/sales/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["exception"]["code"], "SALE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_next_invoice_number() {
        let t = app(10, 0).await;
        let (status, body) = t.send("GET", "/invoices/next?date=2025-01-15", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["invoice_no"], "INV-20250115-00001");
        assert_eq!(body["result"]["reserved"], false);
    }

    #[tokio::test]
    async fn test_health() {
        let t = app(0, 0).await;
        let (status, body) = t.send("GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["database"], true);
    }
}
