//! HTTP error envelope.
//!
//! Every failure leaves the API as
//! `{ "success": false, "code": "...", "error": "...", "data"?: ... }`.
//!
//! ```text
//! ┌───────────────────────────┬────────┬────────────────────────────────────┐
//! │ Code                      │ Status │ Notes                              │
//! ├───────────────────────────┼────────┼────────────────────────────────────┤
//! │ VALIDATION_ERROR          │ 400    │ also malformed JSON / query        │
//! │ CART_EMPTY                │ 400    │                                    │
//! │ INVALID_TRANSITION        │ 400    │                                    │
//! │ UNAUTHORIZED              │ 401    │ no x-user-id from the gateway      │
//! │ FORBIDDEN                 │ 403    │ role is not staff or admin         │
//! │ NOT_FOUND                 │ 404    │                                    │
//! │ INSUFFICIENT_STOCK        │ 409    │ data.items = every shortfall       │
//! │ SERVICE_UNAVAILABLE       │ 503    │ retryable                          │
//! │ INTERNAL_ERROR            │ 500    │ details logged, never returned     │
//! └───────────────────────────┴────────┴────────────────────────────────────┘
//! ```

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use emporia_orders::OrderServiceError;

/// Successful envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(ApiResponse {
            success: true,
            data,
        })
    }
}

/// Errors a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing user identity")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    /// The request could not be decoded at all.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] OrderServiceError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Service(err) => {
                let status = match err {
                    OrderServiceError::Validation(_)
                    | OrderServiceError::CartEmpty
                    | OrderServiceError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
                    OrderServiceError::InsufficientStock { .. } => StatusCode::CONFLICT,
                    OrderServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
                    OrderServiceError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                    OrderServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let message = match &self {
            ApiError::Service(OrderServiceError::Internal(detail)) => {
                error!(target: "internal", error = %detail, "Internal error occurred");
                "Internal server error".to_string()
            }
            ApiError::Service(OrderServiceError::Transient(detail)) => {
                error!(error = %detail, "Request failed on a transient datastore error");
                "Service temporarily unavailable, please retry".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "success": false,
            "code": code,
            "error": message,
        });
        if let ApiError::Service(OrderServiceError::InsufficientStock { shortfalls }) = &self {
            body["data"] = json!({ "items": shortfalls });
        }

        (status, Json::<Value>(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporia_core::{OrderStatus, StockShortfall, ValidationError};

    fn status_of(err: OrderServiceError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(ValidationError::required("phone").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(OrderServiceError::CartEmpty), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(OrderServiceError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrderServiceError::InsufficientStock { shortfalls: vec![] }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrderServiceError::not_found("Order", "o1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(OrderServiceError::Transient("database is locked".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(OrderServiceError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_shortfalls_are_attached() {
        let err = ApiError::from(OrderServiceError::InsufficientStock {
            shortfalls: vec![StockShortfall {
                product_id: "C".into(),
                name: "Product C".into(),
                requested: 1,
                available: 0,
            }],
        });
        let (_, code) = err.parts();
        assert_eq!(code, "INSUFFICIENT_STOCK");
        assert!(err.to_string().contains("out of stock"));
    }
}
