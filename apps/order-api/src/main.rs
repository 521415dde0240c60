//! # Emporia Order API
//!
//! HTTP server for order placement, order administration and warehouse
//! stock operations.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Order API Server                                │
//! │                                                                         │
//! │  Storefront ───► HTTP (8080) ───► Services ───► SQLite                 │
//! │                                       │                                 │
//! │                                       ▼ after commit                    │
//! │                              NotificationRelay ───► Redis Pub/Sub       │
//! │                              Cache invalidation ──► Redis DEL           │
//! │                                                                         │
//! │  Background: IdempotencySweeper                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use emporia_core::RegionalShippingPolicy;
use emporia_db::Database;
use emporia_orders::{
    CacheInvalidator, ChannelDispatcher, IdempotencySweeper, NoopCacheInvalidator,
    NotificationDispatcher, NotificationRelay, OrderServices, RedisCacheInvalidator,
    RedisEventPublisher, SideEffects, TracingDispatcher,
};
use emporia_order_api::config::ApiConfig;
use emporia_order_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting Emporia Order API server...");

    // Load configuration
    let config = ApiConfig::load()?;
    info!(
        port = config.http_port,
        database = %config.database_path.display(),
        redis = config.redis_url.is_some(),
        "Configuration loaded"
    );

    // Open database (runs migrations)
    let db = Database::new(config.db_config()).await?;
    info!("Database ready");

    // Connect to Redis (optional)
    let redis = match config.redis_url.as_deref() {
        Some(url) => match redis::Client::open(url) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(?e, "Invalid Redis URL, continuing without it");
                None
            }
        },
        None => None,
    };

    let (sink, cache) = match &redis {
        Some(client) => redis_sinks(client).await,
        None => local_sinks(),
    };

    let orders_config = config.orders_config();

    // Requests only enqueue; the relay forwards to the real sink.
    let (dispatcher, events) = ChannelDispatcher::new(orders_config.notification_capacity);
    let (relay, relay_handle) = NotificationRelay::new(events, sink);
    let relay_task = tokio::spawn(relay.run());

    let (sweeper, sweeper_handle) =
        IdempotencySweeper::new(db.clone(), orders_config.idempotency_sweep_interval);
    let sweeper_task = tokio::spawn(sweeper.run());

    let effects = SideEffects::new(Arc::new(dispatcher), cache);
    let services = OrderServices::new(
        db.clone(),
        Arc::new(RegionalShippingPolicy::new()),
        effects,
        orders_config,
    );

    let state = AppState {
        db: db.clone(),
        services,
        redis,
    };
    let app = build_router(state, config.request_timeout());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background tasks; the relay drains queued events first.
    if let Err(e) = sweeper_handle.shutdown().await {
        warn!(?e, "Idempotency sweeper already stopped");
    }
    if let Err(e) = relay_handle.shutdown().await {
        warn!(?e, "Notification relay already stopped");
    }
    let _ = tokio::join!(sweeper_task, relay_task);

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

type Sinks = (Arc<dyn NotificationDispatcher>, Arc<dyn CacheInvalidator>);

fn local_sinks() -> Sinks {
    let sink: Arc<dyn NotificationDispatcher> = Arc::new(TracingDispatcher);
    let cache: Arc<dyn CacheInvalidator> = Arc::new(NoopCacheInvalidator);
    (sink, cache)
}

/// Redis publisher and cache invalidator, or the local fallbacks when
/// Redis cannot be reached at startup.
async fn redis_sinks(client: &redis::Client) -> Sinks {
    let publisher = match RedisEventPublisher::connect(client.clone()).await {
        Ok(publisher) => publisher,
        Err(e) => {
            warn!(?e, "Failed to connect to Redis, continuing without it");
            return local_sinks();
        }
    };
    let invalidator = match RedisCacheInvalidator::connect(client.clone()).await {
        Ok(invalidator) => invalidator,
        Err(e) => {
            warn!(?e, "Failed to connect to Redis, continuing without it");
            return local_sinks();
        }
    };
    info!("Connected to Redis");

    let sink: Arc<dyn NotificationDispatcher> = Arc::new(publisher);
    let cache: Arc<dyn CacheInvalidator> = Arc::new(invalidator);
    (sink, cache)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(?e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
