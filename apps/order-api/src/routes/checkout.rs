//! Order placement.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use emporia_core::CheckoutRequest;

use crate::auth::CurrentUser;
use crate::error::{ApiResponse, ApiResult};
use crate::AppState;

/// Header alternative to the `idempotencyKey` body field.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/checkout", post(checkout))
}

/// `201` for a new order, `200` when the idempotency key replayed one.
async fn checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(mut request) = body?;
    if request.idempotency_key.is_none() {
        request.idempotency_key = headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }

    let outcome = state.services.checkout.checkout(&user.user_id, &request).await?;
    let status = if outcome.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, ApiResponse::ok(outcome)))
}
