//! Checkout integration tests against a file-backed SQLite database.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use emporia_core::{
    CheckoutRequest, FlatShippingPolicy, OrderStatus, PromotionKind, PromotionRejection,
    StockMovementKind, ValidationError, MAX_LINE_QUANTITY,
};
use emporia_orders::{CacheSignal, OrderEvent, OrderServiceError, OrdersConfig};

use common::*;

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_cod_checkout_of_two_lines() {
    let mut env = setup().await;
    seed_product(&env.db, "A", 50_000, 10).await;
    seed_product(&env.db, "B", 30_000, 10).await;
    add_to_cart(&env.db, "u1", "A", 2).await;
    add_to_cart(&env.db, "u1", "B", 1).await;

    let outcome = env.services.checkout.checkout("u1", &request("cod")).await.unwrap();

    assert_eq!(outcome.total, money(130_000));
    assert_eq!(outcome.status, OrderStatus::Pending);
    assert!(!outcome.duplicate);
    assert!(outcome.promotion_warning.is_none());

    assert!(env.db.carts().lines("u1").await.unwrap().is_empty());
    assert_eq!(stock_of(&env.db, "A").await, 8);
    assert_eq!(stock_of(&env.db, "B").await, 9);

    let detail = env.services.status.get_order(&outcome.order_id).await.unwrap();
    assert_eq!(detail.order.subtotal_minor, 130_000);
    assert_eq!(detail.order.shipping_fee_minor, 0);
    assert_eq!(detail.order.discount_minor, 0);
    assert!(detail.order.total_is_consistent());
    assert_eq!(detail.lines.len(), 2);
    let prices: Vec<(String, i64, i64)> = detail
        .lines
        .iter()
        .map(|l| (l.product_id.clone(), l.quantity, l.unit_price_minor))
        .collect();
    assert!(prices.contains(&("A".to_string(), 2, 50_000)));
    assert!(prices.contains(&("B".to_string(), 1, 30_000)));

    match next_event(&mut env.events).await {
        OrderEvent::Created {
            order_id,
            user_id,
            total,
            items,
            ..
        } => {
            assert_eq!(order_id, outcome.order_id);
            assert_eq!(user_id, "u1");
            assert_eq!(total, money(130_000));
            assert_eq!(items.len(), 2);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let signals = drain_signals(&mut env.signals).await;
    assert!(signals.contains(&CacheSignal::ProductStockChanged("A".into())));
    assert!(signals.contains(&CacheSignal::ProductStockChanged("B".into())));
}

#[tokio::test]
async fn test_bank_transfer_starts_awaiting_payment() {
    let env = setup().await;
    seed_product(&env.db, "A", 50_000, 10).await;
    seed_product(&env.db, "B", 30_000, 10).await;
    add_to_cart(&env.db, "u1", "A", 2).await;
    add_to_cart(&env.db, "u1", "B", 1).await;

    let outcome = env
        .services
        .checkout
        .checkout("u1", &request("bank_transfer"))
        .await
        .unwrap();

    assert_eq!(outcome.total, money(130_000));
    assert_eq!(outcome.status, OrderStatus::AwaitingPayment);
}

#[tokio::test]
async fn test_line_prices_are_captured() {
    let env = setup().await;
    seed_product(&env.db, "A", 50_000, 10).await;
    add_to_cart(&env.db, "u1", "A", 1).await;

    let outcome = env.services.checkout.checkout("u1", &request("cod")).await.unwrap();
    env.db.products().set_price("A", 99_000).await.unwrap();

    let detail = env.services.status.get_order(&outcome.order_id).await.unwrap();
    assert_eq!(detail.lines[0].unit_price_minor, 50_000);
    assert_eq!(detail.order.total_minor, 50_000);
}

#[tokio::test]
async fn test_every_reservation_is_audited() {
    let env = setup().await;
    seed_product(&env.db, "A", 50_000, 10).await;
    seed_product(&env.db, "B", 30_000, 4).await;
    add_to_cart(&env.db, "u1", "A", 2).await;
    add_to_cart(&env.db, "u1", "B", 1).await;

    let outcome = env.services.checkout.checkout("u1", &request("cod")).await.unwrap();

    let rows = env
        .db
        .stock()
        .transactions_for_reference(&outcome.order_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.kind, StockMovementKind::Order);
        assert_eq!(row.actor_id, "u1");
    }
    let b = rows.iter().find(|r| r.product_id == "B").unwrap();
    assert_eq!((b.stock_before, b.stock_after, b.quantity), (4, 3, 1));
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let env = setup().await;
    let err = env.services.checkout.checkout("u1", &request("cod")).await.unwrap_err();
    assert!(matches!(err, OrderServiceError::CartEmpty));
    assert_eq!(err.code(), "CART_EMPTY");
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_any_write() {
    let env = setup().await;
    seed_product(&env.db, "A", 50_000, 10).await;
    add_to_cart(&env.db, "u1", "A", 1).await;

    let bad = CheckoutRequest {
        phone: "12345".into(),
        ..request("cod")
    };
    let err = env.services.checkout.checkout("u1", &bad).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let bad = request("paypal");
    let err = env.services.checkout.checkout("u1", &bad).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    assert_eq!(stock_of(&env.db, "A").await, 10);
    assert_eq!(env.db.carts().lines("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_subtotal_overflow_is_rejected() {
    let env = setup().await;
    seed_product(&env.db, "X", 4_000_000_000_000_000_000, 10).await;
    add_to_cart(&env.db, "u1", "X", 3).await;

    let err = env.services.checkout.checkout("u1", &request("cod")).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(matches!(
        err,
        OrderServiceError::Validation(ValidationError::AmountOverflow { .. })
    ));

    assert_eq!(stock_of(&env.db, "X").await, 10);
    assert_eq!(env.db.carts().lines("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_line_quantity_above_limit_is_rejected() {
    let env = setup().await;
    seed_product(&env.db, "A", 1, 5_000).await;
    add_to_cart(&env.db, "u1", "A", MAX_LINE_QUANTITY + 1).await;

    let err = env.services.checkout.checkout("u1", &request("cod")).await.unwrap_err();
    assert!(matches!(
        err,
        OrderServiceError::Validation(ValidationError::OutOfRange { max: MAX_LINE_QUANTITY, .. })
    ));
    assert_eq!(stock_of(&env.db, "A").await, 5_000);

    add_to_cart(&env.db, "u1", "A", MAX_LINE_QUANTITY).await;
    let outcome = env.services.checkout.checkout("u1", &request("cod")).await.unwrap();
    assert_eq!(outcome.total, money(MAX_LINE_QUANTITY));
    assert_eq!(stock_of(&env.db, "A").await, 5_000 - MAX_LINE_QUANTITY);
}

#[tokio::test]
async fn test_all_shortfalls_reported_and_nothing_persisted() {
    let env = setup().await;
    seed_product(&env.db, "A", 50_000, 10).await;
    seed_product(&env.db, "B", 30_000, 1).await;
    seed_product(&env.db, "C", 20_000, 0).await;
    add_to_cart(&env.db, "u1", "A", 2).await;
    add_to_cart(&env.db, "u1", "B", 3).await;
    add_to_cart(&env.db, "u1", "C", 1).await;

    let err = env.services.checkout.checkout("u1", &request("cod")).await.unwrap_err();

    let OrderServiceError::InsufficientStock { mut shortfalls } = err else {
        panic!("expected InsufficientStock, got {err:?}");
    };
    shortfalls.sort_by(|a, b| a.product_id.cmp(&b.product_id));
    assert_eq!(shortfalls.len(), 2);
    assert_eq!(
        (shortfalls[0].product_id.as_str(), shortfalls[0].requested, shortfalls[0].available),
        ("B", 3, 1)
    );
    assert_eq!(
        (shortfalls[1].product_id.as_str(), shortfalls[1].requested, shortfalls[1].available),
        ("C", 1, 0)
    );
    assert_eq!(shortfalls[1].name, "Product C");

    // A was reserved before the shortfalls were found; the rollback undid it.
    assert_eq!(stock_of(&env.db, "A").await, 10);
    assert_eq!(stock_of(&env.db, "B").await, 1);
    assert_eq!(env.db.carts().lines("u1").await.unwrap().len(), 3);
    assert_eq!(env.db.orders().count_for_user("u1").await.unwrap(), 0);
}

// =============================================================================
// Idempotency
// =============================================================================

#[tokio::test]
async fn test_idempotent_replay_returns_same_order() {
    let env = setup().await;
    seed_product(&env.db, "A", 50_000, 10).await;
    add_to_cart(&env.db, "u1", "A", 2).await;

    let first = env
        .services
        .checkout
        .checkout("u1", &request_with_key("cod", "retry-123"))
        .await
        .unwrap();
    let second = env
        .services
        .checkout
        .checkout("u1", &request_with_key("cod", "retry-123"))
        .await
        .unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(first.order_id, second.order_id);
    assert_eq!(first.total, second.total);
    assert_eq!(first.status, second.status);
    assert_eq!(env.db.orders().count_for_user("u1").await.unwrap(), 1);
    assert_eq!(stock_of(&env.db, "A").await, 8);
}

#[tokio::test]
async fn test_same_key_different_users_do_not_collide() {
    let env = setup().await;
    seed_product(&env.db, "A", 50_000, 10).await;
    add_to_cart(&env.db, "u1", "A", 1).await;
    add_to_cart(&env.db, "u2", "A", 1).await;

    let one = env
        .services
        .checkout
        .checkout("u1", &request_with_key("cod", "shared-key"))
        .await
        .unwrap();
    let two = env
        .services
        .checkout
        .checkout("u2", &request_with_key("cod", "shared-key"))
        .await
        .unwrap();

    assert!(!two.duplicate);
    assert_ne!(one.order_id, two.order_id);
    assert_eq!(stock_of(&env.db, "A").await, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_key_creates_one_order() {
    let env = setup().await;
    seed_product(&env.db, "A", 50_000, 10).await;
    add_to_cart(&env.db, "u1", "A", 1).await;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let checkout = env.services.checkout.clone();
        tasks.push(tokio::spawn(async move {
            checkout.checkout("u1", &request_with_key("cod", "double-click")).await
        }));
    }

    let mut order_ids = Vec::new();
    for task in tasks {
        order_ids.push(task.await.unwrap().unwrap().order_id);
    }
    order_ids.dedup();

    assert_eq!(order_ids.len(), 1);
    assert_eq!(env.db.orders().count_for_user("u1").await.unwrap(), 1);
    assert_eq!(stock_of(&env.db, "A").await, 9);
}

#[tokio::test]
async fn test_expired_key_places_a_new_order() {
    let config = OrdersConfig::default().idempotency_ttl(Duration::from_millis(1));
    let env = setup_with(Arc::new(FlatShippingPolicy::free()), config).await;
    seed_product(&env.db, "A", 50_000, 10).await;

    add_to_cart(&env.db, "u1", "A", 1).await;
    let first = env
        .services
        .checkout
        .checkout("u1", &request_with_key("cod", "k"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    add_to_cart(&env.db, "u1", "A", 1).await;
    let second = env
        .services
        .checkout
        .checkout("u1", &request_with_key("cod", "k"))
        .await
        .unwrap();

    assert!(!second.duplicate);
    assert_ne!(first.order_id, second.order_id);
    assert_eq!(env.db.orders().count_for_user("u1").await.unwrap(), 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_oversell_under_contention() {
    let env = setup().await;
    let stock = 5;
    let quantity = 2;
    let attempts = 8;
    seed_product(&env.db, "HOT", 10_000, stock).await;
    for i in 0..attempts {
        add_to_cart(&env.db, &format!("buyer-{i}"), "HOT", quantity).await;
    }

    let mut tasks = Vec::new();
    for i in 0..attempts {
        let checkout = env.services.checkout.clone();
        tasks.push(tokio::spawn(async move {
            checkout.checkout(&format!("buyer-{i}"), &request("cod")).await
        }));
    }

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(OrderServiceError::InsufficientStock { shortfalls }) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].requested, quantity);
                assert!(shortfalls[0].available < quantity);
            }
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    assert_eq!(succeeded, stock / quantity);
    assert_eq!(stock_of(&env.db, "HOT").await, stock - succeeded * quantity);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_race() {
    let env = setup().await;
    seed_product(&env.db, "C", 20_000, 1).await;
    add_to_cart(&env.db, "alice", "C", 1).await;
    add_to_cart(&env.db, "bob", "C", 1).await;

    let a = {
        let checkout = env.services.checkout.clone();
        tokio::spawn(async move { checkout.checkout("alice", &request("cod")).await })
    };
    let b = {
        let checkout = env.services.checkout.clone();
        tokio::spawn(async move { checkout.checkout("bob", &request("bank_transfer")).await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(matches!(
        winners[0].status,
        OrderStatus::Pending | OrderStatus::AwaitingPayment
    ));

    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.code(), "INSUFFICIENT_STOCK");
    let OrderServiceError::InsufficientStock { shortfalls } = loser else {
        unreachable!();
    };
    assert_eq!(shortfalls.len(), 1);
    assert_eq!(shortfalls[0].product_id, "C");
    assert_eq!(shortfalls[0].requested, 1);
    assert_eq!(shortfalls[0].available, 0);

    assert_eq!(stock_of(&env.db, "C").await, 0);
}

// =============================================================================
// Promotions and totals
// =============================================================================

#[tokio::test]
async fn test_total_invariant_with_shipping_and_promotion() {
    let shipping = FlatShippingPolicy {
        fee: money(30_000),
        free_threshold: money(1_000_000),
    };
    let mut env = setup_with(Arc::new(shipping), OrdersConfig::default()).await;
    seed_product(&env.db, "A", 45_000, 10).await;
    seed_promotion(&env.db, "flat20", PromotionKind::Fixed, 20_000).await;
    add_to_cart(&env.db, "u1", "A", 3).await;

    let request = CheckoutRequest {
        promotion_id: Some("flat20".into()),
        discount_amount: Some(20_000),
        ..request("cod")
    };
    let outcome = env.services.checkout.checkout("u1", &request).await.unwrap();

    assert_eq!(outcome.total, money(135_000 + 30_000 - 20_000));
    let order = env.db.orders().get(&outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.subtotal_minor, 135_000);
    assert_eq!(order.shipping_fee_minor, 30_000);
    assert_eq!(order.discount_minor, 20_000);
    assert_eq!(order.promotion_id.as_deref(), Some("flat20"));
    assert_eq!(
        order.total_minor,
        order.subtotal_minor + order.shipping_fee_minor - order.discount_minor
    );

    let promo = env.db.promotions().get("flat20").await.unwrap().unwrap();
    assert_eq!(promo.used_count, 1);
    let usages = env.db.promotions().usages("flat20").await.unwrap();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].order_id, outcome.order_id);
    assert_eq!(usages[0].discount_minor, 20_000);

    let signals = drain_signals(&mut env.signals).await;
    assert!(signals.contains(&CacheSignal::PromotionUsageChanged("flat20".into())));
}

#[tokio::test]
async fn test_claim_above_entitlement_is_capped() {
    let env = setup().await;
    seed_product(&env.db, "A", 100_000, 10).await;
    // 10%
    seed_promotion(&env.db, "ten", PromotionKind::Percentage, 1_000).await;
    add_to_cart(&env.db, "u1", "A", 2).await;

    let request = CheckoutRequest {
        promotion_id: Some("ten".into()),
        discount_amount: Some(150_000),
        ..request("cod")
    };
    let outcome = env.services.checkout.checkout("u1", &request).await.unwrap();

    assert_eq!(outcome.total, money(180_000));
}

#[tokio::test]
async fn test_expired_promotion_degrades_to_warning() {
    let env = setup().await;
    seed_product(&env.db, "A", 100_000, 10).await;
    let mut promo = seed_promotion(&env.db, "old", PromotionKind::Fixed, 10_000).await;
    promo.id = "gone".into();
    promo.code = "GONE".into();
    promo.ends_at = Some(Utc::now() - chrono::Duration::days(1));
    env.db.promotions().insert(&promo).await.unwrap();
    add_to_cart(&env.db, "u1", "A", 1).await;

    let request = CheckoutRequest {
        promotion_id: Some("gone".into()),
        discount_amount: Some(10_000),
        ..request("cod")
    };
    let outcome = env.services.checkout.checkout("u1", &request).await.unwrap();

    assert_eq!(outcome.total, money(100_000));
    assert_eq!(outcome.promotion_warning, Some(PromotionRejection::Expired));
    let order = env.db.orders().get(&outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.discount_minor, 0);
    assert!(order.promotion_id.is_none());
    assert!(env.db.promotions().usages("gone").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_promotion_degrades_to_warning() {
    let env = setup().await;
    seed_product(&env.db, "A", 100_000, 10).await;
    add_to_cart(&env.db, "u1", "A", 1).await;

    let request = CheckoutRequest {
        promotion_id: Some("nope".into()),
        ..request("cod")
    };
    let outcome = env.services.checkout.checkout("u1", &request).await.unwrap();

    assert_eq!(outcome.total, money(100_000));
    assert_eq!(outcome.promotion_warning, Some(PromotionRejection::NotFound));
}

#[tokio::test]
async fn test_usage_limit_is_honoured() {
    let env = setup().await;
    seed_product(&env.db, "A", 100_000, 10).await;
    let mut promo = seed_promotion(&env.db, "base", PromotionKind::Fixed, 5_000).await;
    promo.id = "once".into();
    promo.code = "ONCE".into();
    promo.usage_limit = Some(1);
    env.db.promotions().insert(&promo).await.unwrap();

    let with_promo = CheckoutRequest {
        promotion_id: Some("once".into()),
        ..request("cod")
    };

    add_to_cart(&env.db, "u1", "A", 1).await;
    let first = env.services.checkout.checkout("u1", &with_promo).await.unwrap();
    add_to_cart(&env.db, "u2", "A", 1).await;
    let second = env.services.checkout.checkout("u2", &with_promo).await.unwrap();

    assert_eq!(first.total, money(95_000));
    assert_eq!(second.total, money(100_000));
    assert_eq!(second.promotion_warning, Some(PromotionRejection::UsageExhausted));
    assert_eq!(env.db.promotions().get("once").await.unwrap().unwrap().used_count, 1);
}
