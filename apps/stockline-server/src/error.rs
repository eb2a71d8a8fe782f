//! Response envelope and API errors.
//!
//! Every response, success or failure, has the same shape:
//!
//! ```text
//! {
//!   "result":     <payload> | null,
//!   "exception":  { "code": "INSUFFICIENT_STOCK", "message": "...", "retryable": false } | null,
//!   "pagination": null,
//!   "statusCode": 422
//! }
//! ```
//!
//! `statusCode` mirrors the HTTP status:
//!
//! | code                                   | status |
//! |----------------------------------------|--------|
//! | success                                | 200    |
//! | DUPLICATE_INVOICE                      | 409    |
//! | INSUFFICIENT_STOCK, INSUFFICIENT_PACKS | 422    |
//! | CANNOT_BREAK_PACK, VALIDATION_ERROR    | 422    |
//! | BATCH_NOT_FOUND, SALE_NOT_FOUND        | 404    |
//! | CONTENTION                             | 503    |
//! | INTERNAL_ERROR                         | 500    |

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use stockline_core::{ErrorKind, ValidationError};
use stockline_db::SaleError;

/// The response body of every route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub result: Option<T>,
    pub exception: Option<Exception>,
    /// Single-resource routes never paginate.
    pub pagination: Option<serde_json::Value>,
    pub status_code: u16,
}

/// Failure details inside the envelope.
#[derive(Debug, Serialize)]
pub struct Exception {
    pub code: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(result: T) -> Self {
        Envelope {
            result: Some(result),
            exception: None,
            pagination: None,
            status_code: StatusCode::OK.as_u16(),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// An error as the caller sees it.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(err: ValidationError) -> Self {
        ApiError::new(ErrorKind::ValidationError, err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.kind)
    }
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::DuplicateInvoice => StatusCode::CONFLICT,
        ErrorKind::InsufficientStock
        | ErrorKind::InsufficientPacks
        | ErrorKind::CannotBreakPack
        | ErrorKind::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::BatchNotFound | ErrorKind::SaleNotFound => StatusCode::NOT_FOUND,
        ErrorKind::Contention => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SaleError> for ApiError {
    fn from(err: SaleError) -> Self {
        let kind = err.kind();
        // database details stay in the server log
        let message = match kind {
            ErrorKind::InternalError => "internal error".to_string(),
            ErrorKind::Contention => "the store is busy, retry the request".to_string(),
            _ => err.to_string(),
        };
        ApiError::new(kind, message)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(ErrorKind::ValidationError, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(ErrorKind::ValidationError, rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::new(ErrorKind::ValidationError, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body: Envelope<()> = Envelope {
            result: None,
            exception: Some(Exception {
                code: self.kind,
                message: self.message,
                retryable: self.kind.is_retryable(),
            }),
            pagination: None,
            status_code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for route handlers.
pub type ApiResult<T> = Result<Envelope<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_core::CoreError;

    #[test]
    fn test_each_kind_has_a_status() {
        assert_eq!(status_for(ErrorKind::DuplicateInvoice), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::InsufficientPacks), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::BatchNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Contention), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::InternalError), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(Envelope::ok("x")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "result": "x",
                "exception": null,
                "pagination": null,
                "statusCode": 200
            })
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(SaleError::from(stockline_db::DbError::QueryFailed(
            "no such column: secret".into(),
        )));
        assert_eq!(err.kind, ErrorKind::InternalError);
        assert!(!err.message.contains("secret"));

        let err = ApiError::from(SaleError::from(CoreError::DuplicateInvoice("INV-1".into())));
        assert_eq!(err.kind, ErrorKind::DuplicateInvoice);
        assert!(err.message.contains("INV-1"));
    }
}
