//! # Emporia Order API
//!
//! HTTP transport for the order services.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/checkout                        customer                     │
//! │                                                                         │
//! │  GET  /api/admin/orders/{id}               staff | admin                │
//! │  PUT  /api/admin/orders/{id}/status        staff | admin                │
//! │  PUT  /api/admin/orders/{id}/tracking      staff | admin                │
//! │                                                                         │
//! │  POST /api/warehouse/stock/import          staff | admin                │
//! │  POST /api/warehouse/stock/export          staff | admin                │
//! │  POST /api/warehouse/stock/adjust          staff | admin                │
//! │  GET  /api/warehouse/stock/history         staff | admin                │
//! │                                                                         │
//! │  GET  /health                              public                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use emporia_db::Database;
use emporia_orders::OrderServices;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub services: OrderServices,
    pub redis: Option<redis::Client>,
}

/// Full router with tracing and the request timeout.
///
/// A request that times out is dropped together with any open transaction,
/// which rolls it back.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(routes::checkout::router())
        .merge(routes::orders::router())
        .merge(routes::stock::router())
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .with_state(state)
}
