//! # Post-Commit Side Effects
//!
//! Notifications and cache invalidation run only after the transaction that
//! caused them has committed, and never feed back into its outcome.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  service ── COMMIT ──► SideEffects::notify / invalidate                 │
//! │                              │  (one tokio task per dispatch)           │
//! │                              ▼                                          │
//! │        ┌──────────────────────────────┐   ┌──────────────────────────┐  │
//! │        │ NotificationDispatcher       │   │ CacheInvalidator         │  │
//! │        │                              │   │                          │  │
//! │        │ ChannelDispatcher (try_send) │   │ RedisCacheInvalidator    │  │
//! │        │   └─► NotificationRelay      │   │   DEL product:{id} ...   │  │
//! │        │         └─► RedisEventPub.   │   │ NoopCacheInvalidator     │  │
//! │        │             or TracingDisp.  │   │ ChannelCacheInvalidator  │  │
//! │        └──────────────────────────────┘   └──────────────────────────┘  │
//! │                                                                         │
//! │  Failures: warn!, never returned to the caller.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::{CacheSignal, OrderEvent, ORDER_EVENTS_CHANNEL};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum EffectError {
    #[error("Notification channel is full")]
    ChannelFull,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// =============================================================================
// Traits
// =============================================================================

/// Hands an event to whatever delivers emails, pushes and websocket frames.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: &OrderEvent) -> Result<(), EffectError>;
}

/// Drops stale entries from read caches.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, signal: &CacheSignal) -> Result<(), EffectError>;
}

// =============================================================================
// Notification Dispatchers
// =============================================================================

/// Enqueues events on a bounded channel without waiting.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<OrderEvent>,
}

impl ChannelDispatcher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OrderEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChannelDispatcher { tx }, rx)
    }
}

#[async_trait]
impl NotificationDispatcher for ChannelDispatcher {
    async fn dispatch(&self, event: &OrderEvent) -> Result<(), EffectError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EffectError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => EffectError::ChannelClosed,
        })
    }
}

/// Publishes events as JSON on the `orders:events` Redis channel.
#[derive(Clone)]
pub struct RedisEventPublisher {
    conn: ConnectionManager,
}

impl RedisEventPublisher {
    pub async fn connect(client: redis::Client) -> Result<Self, EffectError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisEventPublisher { conn })
    }
}

#[async_trait]
impl NotificationDispatcher for RedisEventPublisher {
    async fn dispatch(&self, event: &OrderEvent) -> Result<(), EffectError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(ORDER_EVENTS_CHANNEL, payload).await?;
        debug!(kind = event.kind(), order_id = %event.order_id(), receivers, "Event published");
        Ok(())
    }
}

/// Writes events to the log. Used when no broker is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn dispatch(&self, event: &OrderEvent) -> Result<(), EffectError> {
        info!(kind = event.kind(), order_id = %event.order_id(), "Order event");
        Ok(())
    }
}

// =============================================================================
// Notification Relay
// =============================================================================

/// Drains a [`ChannelDispatcher`] queue into a downstream dispatcher.
pub struct NotificationRelay {
    rx: mpsc::Receiver<OrderEvent>,
    sink: Arc<dyn NotificationDispatcher>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping the relay.
#[derive(Clone)]
pub struct NotificationRelayHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl NotificationRelayHandle {
    /// Stops the relay after it has delivered what is already queued.
    pub async fn shutdown(&self) -> Result<(), EffectError> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| EffectError::ChannelClosed)
    }
}

impl NotificationRelay {
    pub fn new(
        rx: mpsc::Receiver<OrderEvent>,
        sink: Arc<dyn NotificationDispatcher>,
    ) -> (Self, NotificationRelayHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let relay = NotificationRelay {
            rx,
            sink,
            shutdown_rx,
        };
        (relay, NotificationRelayHandle { shutdown_tx })
    }

    /// Runs until shutdown or until every sender is gone.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Notification relay starting");

        loop {
            tokio::select! {
                maybe = self.rx.recv() => match maybe {
                    Some(event) => self.deliver(event).await,
                    None => break,
                },

                _ = self.shutdown_rx.recv() => {
                    info!("Notification relay shutting down");
                    while let Ok(event) = self.rx.try_recv() {
                        self.deliver(event).await;
                    }
                    break;
                }
            }
        }

        info!("Notification relay stopped");
    }

    async fn deliver(&self, event: OrderEvent) {
        if let Err(e) = self.sink.dispatch(&event).await {
            warn!(?e, kind = event.kind(), order_id = %event.order_id(), "Notification delivery failed");
        }
    }
}

// =============================================================================
// Cache Invalidators
// =============================================================================

/// Deletes the cached entries named by [`CacheSignal::keys`].
#[derive(Clone)]
pub struct RedisCacheInvalidator {
    conn: ConnectionManager,
}

impl RedisCacheInvalidator {
    pub async fn connect(client: redis::Client) -> Result<Self, EffectError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisCacheInvalidator { conn })
    }
}

#[async_trait]
impl CacheInvalidator for RedisCacheInvalidator {
    async fn invalidate(&self, signal: &CacheSignal) -> Result<(), EffectError> {
        let keys = signal.keys();
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(keys).await?;
        debug!(?signal, removed, "Cache invalidated");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheInvalidator;

#[async_trait]
impl CacheInvalidator for NoopCacheInvalidator {
    async fn invalidate(&self, _signal: &CacheSignal) -> Result<(), EffectError> {
        Ok(())
    }
}

/// Forwards signals to a channel, for observers in tests and tooling.
#[derive(Debug, Clone)]
pub struct ChannelCacheInvalidator {
    tx: mpsc::UnboundedSender<CacheSignal>,
}

impl ChannelCacheInvalidator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CacheSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelCacheInvalidator { tx }, rx)
    }
}

#[async_trait]
impl CacheInvalidator for ChannelCacheInvalidator {
    async fn invalidate(&self, signal: &CacheSignal) -> Result<(), EffectError> {
        self.tx
            .send(signal.clone())
            .map_err(|_| EffectError::ChannelClosed)
    }
}

// =============================================================================
// Side Effects
// =============================================================================

/// Fire-and-forget dispatch of post-commit effects.
#[derive(Clone)]
pub struct SideEffects {
    notifier: Arc<dyn NotificationDispatcher>,
    cache: Arc<dyn CacheInvalidator>,
}

impl SideEffects {
    pub fn new(notifier: Arc<dyn NotificationDispatcher>, cache: Arc<dyn CacheInvalidator>) -> Self {
        SideEffects { notifier, cache }
    }

    /// Log-only notifications, no cache.
    pub fn disabled() -> Self {
        SideEffects::new(Arc::new(TracingDispatcher), Arc::new(NoopCacheInvalidator))
    }

    /// Must be called from within a tokio runtime, after commit.
    pub fn notify(&self, event: OrderEvent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.dispatch(&event).await {
                warn!(?e, kind = event.kind(), order_id = %event.order_id(), "Failed to dispatch order event");
            }
        });
    }

    /// Must be called from within a tokio runtime, after commit.
    pub fn invalidate<I>(&self, signals: I)
    where
        I: IntoIterator<Item = CacheSignal>,
    {
        for signal in signals {
            let cache = Arc::clone(&self.cache);
            tokio::spawn(async move {
                if let Err(e) = cache.invalidate(&signal).await {
                    warn!(?e, ?signal, "Failed to invalidate cache");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use emporia_core::{Order, OrderStatus, PaymentMethod};

    fn event(id: &str) -> OrderEvent {
        let now = chrono::Utc::now();
        let order = Order {
            id: id.into(),
            user_id: "u-1".into(),
            recipient_name: "Lê Chi".into(),
            phone: "0912345678".into(),
            address: "7 Trần Phú, Đà Nẵng".into(),
            payment_method: PaymentMethod::Cod,
            status: OrderStatus::Confirmed,
            subtotal_minor: 1_000,
            shipping_fee_minor: 0,
            discount_minor: 0,
            total_minor: 1_000,
            promotion_id: None,
            note: None,
            tracking_code: None,
            carrier: None,
            created_at: now,
            updated_at: now,
        };
        OrderEvent::status_changed(&order, OrderStatus::Pending)
    }

    struct FailingDispatcher;

    #[async_trait]
    impl NotificationDispatcher for FailingDispatcher {
        async fn dispatch(&self, _event: &OrderEvent) -> Result<(), EffectError> {
            Err(EffectError::ChannelClosed)
        }
    }

    #[derive(Default)]
    struct CountingDispatcher(AtomicUsize);

    #[async_trait]
    impl NotificationDispatcher for CountingDispatcher {
        async fn dispatch(&self, _event: &OrderEvent) -> Result<(), EffectError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_channel_dispatcher_full_does_not_block() {
        let (dispatcher, _rx) = ChannelDispatcher::new(1);
        dispatcher.dispatch(&event("o-1")).await.unwrap();
        let second = dispatcher.dispatch(&event("o-2")).await;
        assert!(matches!(second, Err(EffectError::ChannelFull)));
    }

    #[tokio::test]
    async fn test_failed_dispatch_is_swallowed() {
        let (cache, mut signals) = ChannelCacheInvalidator::new();
        let effects = SideEffects::new(Arc::new(FailingDispatcher), Arc::new(cache));

        effects.notify(event("o-1"));
        effects.invalidate([CacheSignal::ProductStockChanged("p1".into())]);

        let signal = tokio::time::timeout(Duration::from_secs(1), signals.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal, CacheSignal::ProductStockChanged("p1".into()));
    }

    #[tokio::test]
    async fn test_relay_drains_queue_on_shutdown() {
        let (dispatcher, rx) = ChannelDispatcher::new(8);
        let sink = Arc::new(CountingDispatcher::default());
        let (relay, handle) = NotificationRelay::new(rx, sink.clone());

        for i in 0..3 {
            dispatcher.dispatch(&event(&format!("o-{i}"))).await.unwrap();
        }
        let task = tokio::spawn(relay.run());
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(sink.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_relay_stops_when_senders_dropped() {
        let (dispatcher, rx) = ChannelDispatcher::new(8);
        let sink = Arc::new(CountingDispatcher::default());
        let (relay, _handle) = NotificationRelay::new(rx, sink.clone());

        dispatcher.dispatch(&event("o-1")).await.unwrap();
        drop(dispatcher);
        relay.run().await;

        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }
}
