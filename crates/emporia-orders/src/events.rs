//! # Order Events
//!
//! Messages handed to the notification dispatcher and cache layer after a
//! transaction commits.
//!
//! ## Wire Format
//! ```json
//! {
//!   "type": "order.status_changed",
//!   "orderId": "6f1c...",
//!   "userId": "u-42",
//!   "newStatus": "shipping",
//!   "label": "Out for delivery",
//!   "total": 130000
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporia_core::{Money, Order, OrderLine, OrderStatus};

/// Redis pub/sub channel the events are published on.
pub const ORDER_EVENTS_CHANNEL: &str = "orders:events";

/// One line of an `order.created` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEventItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl From<&OrderLine> for OrderEventItem {
    fn from(line: &OrderLine) -> Self {
        OrderEventItem {
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price(),
        }
    }
}

/// Notification event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    #[serde(rename = "order.created", rename_all = "camelCase")]
    Created {
        order_id: String,
        user_id: String,
        status: OrderStatus,
        total: Money,
        items: Vec<OrderEventItem>,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "order.status_changed", rename_all = "camelCase")]
    StatusChanged {
        order_id: String,
        user_id: String,
        old_status: OrderStatus,
        new_status: OrderStatus,
        label: String,
        total: Money,
    },

    #[serde(rename = "order.tracking_updated", rename_all = "camelCase")]
    TrackingUpdated {
        order_id: String,
        user_id: String,
        tracking_code: String,
        carrier: Option<String>,
    },
}

impl OrderEvent {
    pub fn created(order: &Order, lines: &[OrderLine]) -> Self {
        OrderEvent::Created {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            status: order.status,
            total: order.total(),
            items: lines.iter().map(OrderEventItem::from).collect(),
            created_at: order.created_at,
        }
    }

    pub fn status_changed(order: &Order, old_status: OrderStatus) -> Self {
        OrderEvent::StatusChanged {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            old_status,
            new_status: order.status,
            label: order.status.label().to_string(),
            total: order.total(),
        }
    }

    pub fn tracking_updated(order: &Order) -> Self {
        OrderEvent::TrackingUpdated {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            tracking_code: order.tracking_code.clone().unwrap_or_default(),
            carrier: order.carrier.clone(),
        }
    }

    /// Event name as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::Created { .. } => "order.created",
            OrderEvent::StatusChanged { .. } => "order.status_changed",
            OrderEvent::TrackingUpdated { .. } => "order.tracking_updated",
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            OrderEvent::Created { order_id, .. }
            | OrderEvent::StatusChanged { order_id, .. }
            | OrderEvent::TrackingUpdated { order_id, .. } => order_id,
        }
    }
}

/// Authoritative data changed; read caches holding it are stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheSignal {
    ProductStockChanged(String),
    PromotionUsageChanged(String),
}

impl CacheSignal {
    /// Cache keys the signal invalidates.
    pub fn keys(&self) -> Vec<String> {
        match self {
            CacheSignal::ProductStockChanged(id) => {
                vec![format!("product:{id}"), "products:list".to_string()]
            }
            CacheSignal::PromotionUsageChanged(id) => {
                vec![format!("promotion:{id}"), "promotions:active".to_string()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporia_core::PaymentMethod;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: "o-1".into(),
            user_id: "u-1".into(),
            recipient_name: "Lê Chi".into(),
            phone: "0912345678".into(),
            address: "7 Trần Phú, Đà Nẵng".into(),
            payment_method: PaymentMethod::Cod,
            status: OrderStatus::Shipping,
            subtotal_minor: 130_000,
            shipping_fee_minor: 0,
            discount_minor: 0,
            total_minor: 130_000,
            promotion_id: None,
            note: None,
            tracking_code: Some("GHN123".into()),
            carrier: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_changed_wire_shape() {
        let event = OrderEvent::status_changed(&order(), OrderStatus::Confirmed);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "order.status_changed");
        assert_eq!(json["orderId"], "o-1");
        assert_eq!(json["userId"], "u-1");
        assert_eq!(json["newStatus"], "shipping");
        assert_eq!(json["label"], "Out for delivery");
        assert_eq!(json["total"], 130_000);
    }

    #[test]
    fn test_created_carries_items() {
        let line = OrderLine {
            id: "l-1".into(),
            order_id: "o-1".into(),
            product_id: "a".into(),
            product_name: "Product a".into(),
            quantity: 2,
            unit_price_minor: 50_000,
        };
        let event = OrderEvent::created(&order(), &[line]);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(event.kind(), "order.created");
        assert_eq!(json["items"][0]["productId"], "a");
        assert_eq!(json["items"][0]["unitPrice"], 50_000);

        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(
            CacheSignal::ProductStockChanged("p1".into()).keys(),
            vec!["product:p1".to_string(), "products:list".to_string()]
        );
        assert_eq!(
            CacheSignal::PromotionUsageChanged("x".into()).keys()[1],
            "promotions:active"
        );
    }
}
