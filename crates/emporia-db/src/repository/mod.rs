//! # Repository Module
//!
//! Database repositories for the order core.
//!
//! ## Two Kinds of Method
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool methods            fn get(&self, id)                              │
//! │  ────────────            run on any pooled connection, autocommit       │
//! │                          used for reads outside a use case              │
//! │                                                                         │
//! │  Transaction methods     fn get_in(&self, conn: &mut SqliteConnection)  │
//! │  ───────────────────     run on the caller's transaction                │
//! │                          commit or roll back together                  │
//! │                                                                         │
//! │  emporia-orders                                                        │
//! │       │  let mut tx = db.begin().await?;                               │
//! │       │  db.stock().lock_cart_products(&mut tx, user).await?;          │
//! │       │  db.orders().insert(&mut tx, &order).await?;                   │
//! │       ▼  tx.commit().await?;                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog rows (read, seed)
//! - [`CartRepository`](cart::CartRepository) - Cart lines
//! - [`StockLedger`](stock::StockLedger) - Row locks, stock movements, audit
//! - [`OrderRepository`](order::OrderRepository) - Orders and line items
//! - [`PromotionRepository`](promotion::PromotionRepository) - Promotions and usage
//! - [`IdempotencyRepository`](idempotency::IdempotencyRepository) - Checkout dedup

use chrono::{DateTime, SecondsFormat, Utc};

pub mod cart;
pub mod idempotency;
pub mod order;
pub mod product;
pub mod promotion;
pub mod stock;

/// Fixed-width UTC timestamp text, e.g. `2026-03-01T09:30:00.000Z`.
///
/// Every timestamp column is written through this so that lexical order is
/// chronological order.
pub(crate) fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use emporia_core::Product;

    use crate::{Database, DbConfig};

    pub async fn memory_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
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
}
