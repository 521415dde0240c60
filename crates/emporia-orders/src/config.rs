//! Tunables of the order services.

use std::time::Duration;

use emporia_core::DEFAULT_IDEMPOTENCY_TTL_HOURS;

/// Default capacity of the in-process notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// Configuration shared by the order services and their background tasks.
#[derive(Debug, Clone)]
pub struct OrdersConfig {
    /// How long a checkout result stays replayable under its idempotency key.
    pub idempotency_ttl: Duration,

    /// How often expired idempotency records are purged.
    pub idempotency_sweep_interval: Duration,

    /// Buffer size of the notification channel. Events are dropped (and
    /// logged) when it is full rather than blocking a request.
    pub notification_capacity: usize,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        OrdersConfig {
            idempotency_ttl: Duration::from_secs(DEFAULT_IDEMPOTENCY_TTL_HOURS.unsigned_abs() * 3600),
            idempotency_sweep_interval: Duration::from_secs(3600),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl OrdersConfig {
    pub fn idempotency_ttl(mut self, ttl: Duration) -> Self {
        self.idempotency_ttl = ttl;
        self
    }

    pub fn idempotency_sweep_interval(mut self, interval: Duration) -> Self {
        self.idempotency_sweep_interval = interval;
        self
    }

    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity.max(1);
        self
    }

    /// Retention window as a chrono duration, for expiry arithmetic.
    pub(crate) fn idempotency_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.idempotency_ttl).unwrap_or_else(|_| chrono::Duration::hours(24))
    }
}
