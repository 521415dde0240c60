//! Shared fixtures for the emporia-orders integration tests.
//!
//! Every test gets its own file-backed SQLite database in a temp directory,
//! with a multi-connection pool so concurrent checkouts really contend for
//! the write lock.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::mpsc;

use emporia_core::{
    CheckoutRequest, FlatShippingPolicy, Money, Order, OrderLine, OrderStatus, PaymentMethod,
    Product, Promotion, PromotionKind, ShippingFeePolicy,
};
use emporia_db::{Database, DbConfig};
use emporia_orders::{
    CacheSignal, ChannelCacheInvalidator, ChannelDispatcher, OrderEvent, OrderServices,
    OrdersConfig, SideEffects,
};

pub struct TestEnv {
    pub db: Database,
    pub services: OrderServices,
    pub events: mpsc::Receiver<OrderEvent>,
    pub signals: mpsc::UnboundedReceiver<CacheSignal>,
    _dir: TempDir,
}

pub async fn setup() -> TestEnv {
    setup_with(Arc::new(FlatShippingPolicy::free()), OrdersConfig::default()).await
}

pub async fn setup_with(shipping: Arc<dyn ShippingFeePolicy>, config: OrdersConfig) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let db = Database::new(
        DbConfig::new(dir.path().join("emporia-test.db"))
            .max_connections(8)
            .lock_timeout(Duration::from_secs(30)),
    )
    .await
    .unwrap();

    let (dispatcher, events) = ChannelDispatcher::new(256);
    let (cache, signals) = ChannelCacheInvalidator::new();
    let effects = SideEffects::new(Arc::new(dispatcher), Arc::new(cache));
    let services = OrderServices::new(db.clone(), shipping, effects, config);

    TestEnv {
        db,
        services,
        events,
        signals,
        _dir: dir,
    }
}

pub async fn seed_product(db: &Database, id: &str, price: i64, stock: i64) -> Product {
    let product = Product {
        id: id.to_string(),
        name: format!("Product {id}"),
        price_minor: price,
        stock,
        is_active: true,
        updated_at: Utc::now(),
    };
    db.products().insert(&product).await.unwrap();
    product
}

pub async fn add_to_cart(db: &Database, user_id: &str, product_id: &str, quantity: i64) {
    db.carts().set_quantity(user_id, product_id, quantity).await.unwrap();
}

pub async fn seed_promotion(db: &Database, id: &str, kind: PromotionKind, value: i64) -> Promotion {
    let promo = Promotion {
        id: id.to_string(),
        code: id.to_uppercase(),
        kind,
        value,
        max_discount_minor: None,
        min_order_minor: 0,
        usage_limit: None,
        used_count: 0,
        starts_at: None,
        ends_at: None,
        is_active: true,
    };
    db.promotions().insert(&promo).await.unwrap();
    promo
}

pub fn request(payment_method: &str) -> CheckoutRequest {
    CheckoutRequest {
        recipient_name: "Nguyễn Văn An".into(),
        phone: "0901234567".into(),
        address: "12 Nguyễn Huệ, Quận 1, TP.HCM".into(),
        payment_method: payment_method.into(),
        ..Default::default()
    }
}

pub fn request_with_key(payment_method: &str, key: &str) -> CheckoutRequest {
    CheckoutRequest {
        idempotency_key: Some(key.into()),
        ..request(payment_method)
    }
}

/// Inserts an order directly in the given status, one line per
/// `(product_id, quantity, unit_price)`, without touching stock.
pub async fn seed_order(
    db: &Database,
    id: &str,
    status: OrderStatus,
    lines: &[(&str, i64, i64)],
) -> Order {
    let now = Utc::now();
    let subtotal: i64 = lines.iter().map(|(_, qty, price)| qty * price).sum();
    let order = Order {
        id: id.to_string(),
        user_id: "seed-user".into(),
        recipient_name: "Trần Thị Bình".into(),
        phone: "0912345678".into(),
        address: "45 Lê Lợi, Hải Châu, Đà Nẵng".into(),
        payment_method: PaymentMethod::Cod,
        status,
        subtotal_minor: subtotal,
        shipping_fee_minor: 0,
        discount_minor: 0,
        total_minor: subtotal,
        promotion_id: None,
        note: None,
        tracking_code: None,
        carrier: None,
        created_at: now,
        updated_at: now,
    };

    let mut tx = db.begin().await.unwrap();
    db.orders().insert(&mut tx, &order).await.unwrap();
    for (i, (product_id, quantity, price)) in lines.iter().enumerate() {
        let line = OrderLine {
            id: format!("{id}-line-{i}"),
            order_id: id.to_string(),
            product_id: product_id.to_string(),
            product_name: format!("Product {product_id}"),
            quantity: *quantity,
            unit_price_minor: *price,
        };
        db.orders().insert_line(&mut tx, &line).await.unwrap();
    }
    tx.commit().await.unwrap();
    order
}

pub async fn stock_of(db: &Database, product_id: &str) -> i64 {
    db.products().stock_of(product_id).await.unwrap()
}

pub async fn next_event(rx: &mut mpsc::Receiver<OrderEvent>) -> OrderEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an order event")
        .expect("event channel closed")
}

/// Collects the signals that arrive within a short window.
pub async fn drain_signals(rx: &mut mpsc::UnboundedReceiver<CacheSignal>) -> Vec<CacheSignal> {
    let mut signals = Vec::new();
    while let Ok(Some(signal)) = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await {
        signals.push(signal);
    }
    signals
}

pub fn money(minor: i64) -> Money {
    Money::from_minor(minor)
}
