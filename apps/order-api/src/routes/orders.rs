//! Staff order administration.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

use emporia_core::OrderDetail;

use crate::auth::StaffUser;
use crate::error::{ApiResponse, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackingBody {
    tracking_code: String,
    #[serde(default)]
    carrier: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/orders/{id}", get(get_order))
        .route("/api/admin/orders/{id}/status", put(update_status))
        .route("/api/admin/orders/{id}/tracking", put(update_tracking))
}

async fn get_order(
    State(state): State<AppState>,
    _staff: StaffUser,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<ApiResponse<OrderDetail>>> {
    let Path(id) = id?;
    let detail = state.services.status.get_order(&id).await?;
    Ok(ApiResponse::ok(detail))
}

async fn update_status(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    id: Result<Path<String>, PathRejection>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<OrderDetail>>> {
    let Path(id) = id?;
    let Json(body) = body?;
    let detail = state
        .services
        .status
        .update_status_str(&staff.user_id, &id, &body.status)
        .await?;
    Ok(ApiResponse::ok(detail))
}

async fn update_tracking(
    State(state): State<AppState>,
    _staff: StaffUser,
    id: Result<Path<String>, PathRejection>,
    body: Result<Json<TrackingBody>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<OrderDetail>>> {
    let Path(id) = id?;
    let Json(body) = body?;
    let detail = state
        .services
        .status
        .update_tracking(&id, &body.tracking_code, body.carrier.as_deref())
        .await?;
    Ok(ApiResponse::ok(detail))
}
