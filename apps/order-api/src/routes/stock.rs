//! Warehouse stock movements and the audit history.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use emporia_core::{Page, StockHistoryFilter, StockMovementKind, StockTransaction};
use emporia_orders::{StockAdjustRequest, StockMovementRequest, StockMovementResult};

use crate::auth::StaffUser;
use crate::error::{ApiResponse, ApiResult};
use crate::AppState;

/// Query string of the history endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    product_id: Option<String>,
    kind: Option<StockMovementKind>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    page: Option<u32>,
    limit: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/warehouse/stock/import", post(import))
        .route("/api/warehouse/stock/export", post(export))
        .route("/api/warehouse/stock/adjust", post(adjust))
        .route("/api/warehouse/stock/history", get(history))
}

async fn import(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    body: Result<Json<StockMovementRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<StockMovementResult>>> {
    let Json(request) = body?;
    let result = state.services.inventory.import(&staff.user_id, &request).await?;
    Ok(ApiResponse::ok(result))
}

async fn export(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    body: Result<Json<StockMovementRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<StockMovementResult>>> {
    let Json(request) = body?;
    let result = state.services.inventory.export(&staff.user_id, &request).await?;
    Ok(ApiResponse::ok(result))
}

async fn adjust(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    body: Result<Json<StockAdjustRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<StockMovementResult>>> {
    let Json(request) = body?;
    let result = state.services.inventory.adjust(&staff.user_id, &request).await?;
    Ok(ApiResponse::ok(result))
}

async fn history(
    State(state): State<AppState>,
    _staff: StaffUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Page<StockTransaction>>>> {
    let Query(query) = query?;
    let filter = StockHistoryFilter {
        product_id: query.product_id.filter(|id| !id.trim().is_empty()),
        kind: query.kind,
        from: query.from,
        to: query.to,
    };
    let page = state
        .services
        .inventory
        .history(&filter, query.page, query.limit)
        .await?;
    Ok(ApiResponse::ok(page))
}
