//! # Order Status Service
//!
//! Staff-driven status changes and shipping metadata.
//!
//! ## Cancellation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   ├─ lock order row             (first statement)                       │
//! │   ├─ read status                (authoritative: nobody else can write)  │
//! │   ├─ transition table check     ── rejected ──► ROLLBACK                │
//! │   ├─ restore every line         (only when the target is cancelled)     │
//! │   └─ UPDATE status                                                      │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  A second cancel waits on the lock, then reads "cancelled", a terminal  │
//! │  state, and is rejected. Stock is therefore restored exactly once.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{info, warn};

use emporia_core::validation::validate_id;
use emporia_core::{OrderDetail, OrderStatus, ValidationError};
use emporia_db::{AuditContext, Database};

use crate::effects::SideEffects;
use crate::error::{OrderResult, OrderServiceError};
use crate::events::{CacheSignal, OrderEvent};

/// Maximum length of a tracking code or carrier name.
const MAX_TRACKING_LEN: usize = 100;

#[derive(Clone)]
pub struct OrderStatusService {
    db: Database,
    effects: SideEffects,
}

impl OrderStatusService {
    pub fn new(db: Database, effects: SideEffects) -> Self {
        OrderStatusService { db, effects }
    }

    /// Parses the requested status string, then applies it.
    pub async fn update_status_str(
        &self,
        actor_id: &str,
        order_id: &str,
        status: &str,
    ) -> OrderResult<OrderDetail> {
        let next = status.trim().parse::<OrderStatus>()?;
        self.update_status(actor_id, order_id, next).await
    }

    /// Moves an order to `next`, restoring stock when cancelling.
    pub async fn update_status(
        &self,
        actor_id: &str,
        order_id: &str,
        next: OrderStatus,
    ) -> OrderResult<OrderDetail> {
        let order_id = validate_id("orderId", order_id)?;
        let orders = self.db.orders();

        let mut tx = self.db.begin().await?;
        if !orders.lock(&mut tx, &order_id).await? {
            return Err(OrderServiceError::not_found("Order", order_id));
        }
        let mut order = orders
            .get_in(&mut tx, &order_id)
            .await?
            .ok_or_else(|| OrderServiceError::not_found("Order", order_id.clone()))?;
        let previous = order.status;

        let effect = previous.transition(next)?;
        let lines = orders.lines_in(&mut tx, &order_id).await?;

        if effect.restores_stock {
            let stock = self.db.stock();
            let reason = format!("order {} cancelled", order_id);
            let audit = AuditContext {
                actor_id,
                reference: Some(order_id.as_str()),
                reason: Some(reason.as_str()),
            };
            for line in &lines {
                stock.restore(&mut tx, &line.product_id, line.quantity, audit).await?;
            }
        }

        let now = Utc::now();
        orders.set_status(&mut tx, &order_id, next, now).await?;
        tx.commit().await?;

        order.status = next;
        order.updated_at = now;
        info!(
            order_id = %order_id,
            actor_id = %actor_id,
            from = %previous,
            to = %next,
            restored = effect.restores_stock,
            "Order status changed"
        );

        self.effects.notify(OrderEvent::status_changed(&order, previous));
        if effect.restores_stock {
            self.effects.invalidate(
                lines
                    .iter()
                    .map(|line| CacheSignal::ProductStockChanged(line.product_id.clone())),
            );
        }

        Ok(OrderDetail { order, lines })
    }

    /// Records the carrier's tracking code.
    pub async fn update_tracking(
        &self,
        order_id: &str,
        tracking_code: &str,
        carrier: Option<&str>,
    ) -> OrderResult<OrderDetail> {
        let order_id = validate_id("orderId", order_id)?;
        let tracking_code = tracking_code.trim();
        if tracking_code.is_empty() {
            return Err(ValidationError::required("trackingCode").into());
        }
        if tracking_code.chars().count() > MAX_TRACKING_LEN {
            return Err(ValidationError::TooLong {
                field: "trackingCode".into(),
                max: MAX_TRACKING_LEN,
            }
            .into());
        }
        let carrier = carrier.map(str::trim).filter(|c| !c.is_empty());
        if carrier.is_some_and(|c| c.chars().count() > MAX_TRACKING_LEN) {
            return Err(ValidationError::TooLong {
                field: "carrier".into(),
                max: MAX_TRACKING_LEN,
            }
            .into());
        }

        let orders = self.db.orders();
        let mut tx = self.db.begin().await?;
        if !orders.lock(&mut tx, &order_id).await? {
            return Err(OrderServiceError::not_found("Order", order_id));
        }
        let now = Utc::now();
        orders
            .set_tracking(&mut tx, &order_id, tracking_code, carrier, now)
            .await?;
        let order = orders
            .get_in(&mut tx, &order_id)
            .await?
            .ok_or_else(|| OrderServiceError::not_found("Order", order_id.clone()))?;
        let lines = orders.lines_in(&mut tx, &order_id).await?;
        tx.commit().await?;

        if order.status.is_terminal() {
            warn!(order_id = %order_id, status = %order.status, "Tracking updated on a closed order");
        }
        info!(order_id = %order_id, tracking_code = %tracking_code, "Tracking updated");
        self.effects.notify(OrderEvent::tracking_updated(&order));

        Ok(OrderDetail { order, lines })
    }

    /// The order with its line items.
    pub async fn get_order(&self, order_id: &str) -> OrderResult<OrderDetail> {
        let order = self
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| OrderServiceError::not_found("Order", order_id))?;
        let lines = self.db.orders().lines(order_id).await?;
        Ok(OrderDetail { order, lines })
    }
}
