//! Liveness and dependency health.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::warn;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// `200` while the database answers. Redis is optional, so a Redis failure
/// only degrades the report.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = state.db.health_check().await;

    let redis = match &state.redis {
        None => "disabled",
        Some(client) => {
            if ping_redis(client).await {
                "ok"
            } else {
                "unavailable"
            }
        }
    };

    let (status_code, status) = match (db_ok, redis) {
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        (true, "unavailable") => (StatusCode::OK, "degraded"),
        (true, _) => (StatusCode::OK, "ok"),
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "database": if db_ok { "ok" } else { "unavailable" },
            "redis": redis,
        })),
    )
}

async fn ping_redis(client: &redis::Client) -> bool {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(?e, "Redis health check failed to connect");
            return false;
        }
    };
    match redis::cmd("PING").query_async::<String>(&mut conn).await {
        Ok(_) => true,
        Err(e) => {
            warn!(?e, "Redis health check failed");
            false
        }
    }
}
