//! # emporia-orders: Order Placement Use Cases
//!
//! Transactional use cases built on the emporia-db repositories.
//!
//! ## Services
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          emporia-orders                                 │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌────────────────────┐  ┌────────────────────┐  │
//! │  │ CheckoutService  │  │ OrderStatusService │  │ InventoryService   │  │
//! │  │                  │  │                    │  │                    │  │
//! │  │ checkout         │  │ update_status      │  │ import / export    │  │
//! │  │ place_order      │  │ update_tracking    │  │ adjust             │  │
//! │  │                  │  │ get_order          │  │ history            │  │
//! │  └────────┬─────────┘  └─────────┬──────────┘  └─────────┬──────────┘  │
//! │           └──────────────────────┼───────────────────────┘             │
//! │                                  ▼                                      │
//! │                 SideEffects (after commit, fire-and-forget)             │
//! │                                                                         │
//! │  Background: NotificationRelay, IdempotencySweeper                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Correctness under concurrency comes from the datastore's locks, never
//! from in-process mutexes, so any number of service instances may share a
//! database.

pub mod checkout;
pub mod config;
pub mod effects;
pub mod error;
pub mod events;
pub mod inventory;
pub mod status;
pub mod sweeper;

use std::sync::Arc;

use emporia_core::ShippingFeePolicy;
use emporia_db::Database;

pub use checkout::{CheckoutOutcome, CheckoutService};
pub use config::OrdersConfig;
pub use effects::{
    CacheInvalidator, ChannelCacheInvalidator, ChannelDispatcher, EffectError, NoopCacheInvalidator,
    NotificationDispatcher, NotificationRelay, NotificationRelayHandle, RedisCacheInvalidator,
    RedisEventPublisher, SideEffects, TracingDispatcher,
};
pub use error::{OrderResult, OrderServiceError};
pub use events::{CacheSignal, OrderEvent, OrderEventItem};
pub use inventory::{
    InventoryService, StockAdjustRequest, StockMovementRequest, StockMovementResult,
    DEFAULT_ADJUST_REASON,
};
pub use status::OrderStatusService;
pub use sweeper::{IdempotencySweeper, IdempotencySweeperHandle};

/// The three services wired to one database and one set of side effects.
#[derive(Clone)]
pub struct OrderServices {
    pub checkout: CheckoutService,
    pub status: OrderStatusService,
    pub inventory: InventoryService,
}

impl OrderServices {
    pub fn new(
        db: Database,
        shipping: Arc<dyn ShippingFeePolicy>,
        effects: SideEffects,
        config: OrdersConfig,
    ) -> Self {
        OrderServices {
            checkout: CheckoutService::new(db.clone(), shipping, effects.clone(), config),
            status: OrderStatusService::new(db.clone(), effects.clone()),
            inventory: InventoryService::new(db, effects),
        }
    }
}
