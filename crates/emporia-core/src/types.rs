//! # Domain Types
//!
//! Entities of the order-placement core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │   OrderLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  order_id (FK)  │       │
//! │  │  price_minor    │   │  status         │   │  unit_price     │       │
//! │  │  stock (≥ 0)    │   │  total_minor    │   │  (captured)     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Promotion     │   │ StockTransaction│   │ Idempotency     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │    Record       │       │
//! │  │  kind / value   │   │  before / after │   │  ─────────────  │       │
//! │  │  used / limit   │   │  append-only    │   │  (user, key)    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary columns are stored as integer minor units with a `_minor` suffix
//! and exposed as [`Money`] through accessor methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::status::OrderStatus;

// =============================================================================
// Product
// =============================================================================

/// A catalog product as seen by the order core.
///
/// The catalog itself is owned elsewhere; only `stock` is mutated here, and
/// only through the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price_minor: i64,
    /// Available quantity. Never negative.
    pub stock: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.price_minor)
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// A cart line joined with the product it references.
///
/// `price_minor` is the price read when the cart is loaded; it becomes the
/// captured unit price of the order line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub product_name: String,
    pub price_minor: i64,
}

impl CartLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_minor(self.price_minor)
    }

    /// unit price × quantity
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
    /// [`line_total`](Self::line_total) without the overflow panic.
    #[inline]
    pub fn checked_line_total(&self) -> Option<Money> {
        self.unit_price().checked_multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// Payment method label. No gateway is involved; the label only selects the
/// initial order status.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    /// Bank transfer, paid before the order is confirmed.
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 2] = [PaymentMethod::Cod, PaymentMethod::BankTransfer];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    /// Payment happens after the order is placed.
    pub const fn is_deferred(&self) -> bool {
        matches!(self, PaymentMethod::BankTransfer)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "paymentMethod".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Order
// =============================================================================

/// A placed order.
///
/// After creation only `status`, `tracking_code`, `carrier` and `updated_at`
/// ever change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub subtotal_minor: i64,
    pub shipping_fee_minor: i64,
    pub discount_minor: i64,
    pub total_minor: i64,
    pub promotion_id: Option<String>,
    pub note: Option<String>,
    pub tracking_code: Option<String>,
    pub carrier: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_minor(self.subtotal_minor)
    }

    #[inline]
    pub fn shipping_fee(&self) -> Money {
        Money::from_minor(self.shipping_fee_minor)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_minor(self.discount_minor)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_minor)
    }

    /// `total == subtotal + shipping_fee - discount`
    pub fn total_is_consistent(&self) -> bool {
        self.total() == self.subtotal() + self.shipping_fee() - self.discount()
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// A line item of an order.
/// Uses snapshot pattern to freeze product data at time of checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at time of checkout (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Unit price at time of checkout (frozen).
    pub unit_price_minor: i64,
}

impl OrderLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_minor(self.unit_price_minor)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// An order with its line items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

// =============================================================================
// Promotion
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    /// `value` is in basis points of the subtotal.
    Percentage,
    /// `value` is an amount in minor units.
    Fixed,
}

/// A promotion as stored in the promotion table.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Promotion {
    pub id: String,
    pub code: String,
    pub kind: PromotionKind,
    pub value: i64,
    /// Cap for percentage promotions.
    pub max_discount_minor: Option<i64>,
    pub min_order_minor: i64,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    #[ts(as = "Option<String>")]
    pub starts_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Promotion {
    #[inline]
    pub fn min_order(&self) -> Money {
        Money::from_minor(self.min_order_minor)
    }

    #[inline]
    pub fn max_discount(&self) -> Option<Money> {
        self.max_discount_minor.map(Money::from_minor)
    }
}

/// One application of a promotion to an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PromotionUsage {
    pub id: String,
    pub promotion_id: String,
    pub user_id: String,
    pub order_id: String,
    pub discount_minor: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Transaction
// =============================================================================

/// Cause of a stock movement.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockMovementKind {
    /// Goods received into the warehouse.
    Import,
    /// Goods removed from the warehouse (damage, transfer).
    Export,
    /// Stocktake correction to an absolute value.
    Adjust,
    /// Reservation by checkout, or its restoration on cancellation.
    Order,
    /// Goods coming back from a returned order.
    Return,
}

impl StockMovementKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockMovementKind::Import => "import",
            StockMovementKind::Export => "export",
            StockMovementKind::Adjust => "adjust",
            StockMovementKind::Order => "order",
            StockMovementKind::Return => "return",
        }
    }
}

impl fmt::Display for StockMovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only audit row for one stock change.
///
/// `quantity` is the magnitude of the movement; `stock_after - stock_before`
/// carries the sign.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockTransaction {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub actor_id: String,
    pub kind: StockMovementKind,
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reference: Option<String>,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    #[inline]
    pub fn delta(&self) -> i64 {
        self.stock_after - self.stock_before
    }
}

/// Filter for the stock audit read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockHistoryFilter {
    pub product_id: Option<String>,
    pub kind: Option<StockMovementKind>,
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64) as u32
        };
        Page {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Clamps client paging input: `page >= 1`, `1 <= limit <= MAX_PAGE_LIMIT`.
pub fn clamp_paging(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).clamp(1, crate::MAX_PAGE_LIMIT);
    (page, limit)
}

// =============================================================================
// Idempotency Record
// =============================================================================

/// Stored result of a checkout, keyed by (user, client key).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct IdempotencyRecord {
    pub user_id: String,
    pub idempotency_key: String,
    pub order_id: String,
    pub total_minor: i64,
    pub status: OrderStatus,
    /// Unix milliseconds.
    pub expires_at: i64,
}

impl IdempotencyRecord {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_minor)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now.timestamp_millis()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("cod".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
        assert_eq!(
            "bank_transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!("card".parse::<PaymentMethod>().is_err());
        assert!(PaymentMethod::BankTransfer.is_deferred());
        assert!(!PaymentMethod::Cod.is_deferred());
    }

    #[test]
    fn test_cart_line_total() {
        let line = CartLine {
            user_id: "u1".into(),
            product_id: "p1".into(),
            quantity: 2,
            product_name: "Kettle".into(),
            price_minor: 50_000,
        };
        assert_eq!(line.line_total().minor(), 100_000);
    }

    #[test]
    fn test_page_counts() {
        let page: Page<u8> = Page::new(vec![], 41, 1, 20);
        assert_eq!(page.total_pages, 3);

        let empty: Page<u8> = Page::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_clamp_paging() {
        assert_eq!(clamp_paging(None, None), (1, 20));
        assert_eq!(clamp_paging(Some(0), Some(0)), (1, 1));
        assert_eq!(clamp_paging(Some(3), Some(500)), (3, 100));
    }

    #[test]
    fn test_stock_movement_kind_serialization() {
        let json = serde_json::to_string(&StockMovementKind::Import).unwrap();
        assert_eq!(json, "\"import\"");
        assert_eq!(StockMovementKind::Return.to_string(), "return");
    }

    #[test]
    fn test_idempotency_record_expiry() {
        let now = Utc::now();
        let record = IdempotencyRecord {
            user_id: "u1".into(),
            idempotency_key: "k".into(),
            order_id: "o1".into(),
            total_minor: 130_000,
            status: OrderStatus::Pending,
            expires_at: now.timestamp_millis() + 1,
        };
        assert!(record.is_active_at(now));
        assert!(!record.is_active_at(now + chrono::Duration::milliseconds(1)));
    }
}
