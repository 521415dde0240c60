//! # Order Repository
//!
//! Orders and their line items.
//!
//! ## Mutation Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  orders        INSERT once at checkout                                  │
//! │                UPDATE status                  (state machine only)      │
//! │                UPDATE tracking_code, carrier                            │
//! │                                                                         │
//! │  order_lines   INSERT once at checkout, never touched again            │
//! │                unit_price_minor is the captured price                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::db_timestamp;
use emporia_core::{Order, OrderLine, OrderStatus};

const SELECT_ORDER: &str = r#"
    SELECT id, user_id, recipient_name, phone, address, payment_method, status,
           subtotal_minor, shipping_fee_minor, discount_minor, total_minor,
           promotion_id, note, tracking_code, carrier, created_at, updated_at
    FROM orders
"#;

const SELECT_LINES: &str = r#"
    SELECT id, order_id, product_id, product_name, quantity, unit_price_minor
    FROM order_lines
    WHERE order_id = ?1
    ORDER BY rowid
"#;

/// Repository for orders and order lines.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Transaction methods
    // -------------------------------------------------------------------------

    /// Takes the order row lock for the rest of the transaction.
    ///
    /// Must be the first statement of the transaction. Returns `false` when
    /// the order does not exist.
    pub async fn lock(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE orders SET updated_at = updated_at WHERE id = ?1")
            .bind(order_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Inserts the order header.
    pub async fn insert(&self, conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, total = order.total_minor, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, recipient_name, phone, address, payment_method, status,
                subtotal_minor, shipping_fee_minor, discount_minor, total_minor,
                promotion_id, note, tracking_code, carrier, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.recipient_name)
        .bind(&order.phone)
        .bind(&order.address)
        .bind(order.payment_method)
        .bind(order.status)
        .bind(order.subtotal_minor)
        .bind(order.shipping_fee_minor)
        .bind(order.discount_minor)
        .bind(order.total_minor)
        .bind(&order.promotion_id)
        .bind(&order.note)
        .bind(&order.tracking_code)
        .bind(&order.carrier)
        .bind(db_timestamp(order.created_at))
        .bind(db_timestamp(order.updated_at))
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one line item.
    pub async fn insert_line(&self, conn: &mut SqliteConnection, line: &OrderLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_lines (id, order_id, product_id, product_name, quantity, unit_price_minor)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&line.id)
        .bind(&line.order_id)
        .bind(&line.product_id)
        .bind(&line.product_name)
        .bind(line.quantity)
        .bind(line.unit_price_minor)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Reads an order inside the caller's transaction.
    pub async fn get_in(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(order)
    }

    /// Reads line items inside the caller's transaction.
    pub async fn lines_in(&self, conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(SELECT_LINES)
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(lines)
    }

    /// Persists a new status.
    pub async fn set_status(
        &self,
        conn: &mut SqliteConnection,
        order_id: &str,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status)
            .bind(db_timestamp(at))
            .bind(order_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }
        Ok(())
    }

    /// Persists shipping-tracking metadata.
    pub async fn set_tracking(
        &self,
        conn: &mut SqliteConnection,
        order_id: &str,
        tracking_code: &str,
        carrier: Option<&str>,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET tracking_code = ?1, carrier = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(tracking_code)
        .bind(carrier)
        .bind(db_timestamp(at))
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Pool methods
    // -------------------------------------------------------------------------

    /// Gets an order by id.
    pub async fn get(&self, order_id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Line items of an order, in insertion order.
    pub async fn lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(SELECT_LINES)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Number of orders placed by a user.
    pub async fn count_for_user(&self, user_id: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{memory_db, seed_product};
    use emporia_core::PaymentMethod;

    fn order(id: &str, subtotal: i64, shipping: i64, discount: i64, total: i64) -> Order {
        let now = Utc::now();
        Order {
            id: id.to_string(),
            user_id: "u1".into(),
            recipient_name: "Lê Chi".into(),
            phone: "0912345678".into(),
            address: "7 Trần Phú, Đà Nẵng".into(),
            payment_method: PaymentMethod::Cod,
            status: OrderStatus::Pending,
            subtotal_minor: subtotal,
            shipping_fee_minor: shipping,
            discount_minor: discount,
            total_minor: total,
            promotion_id: None,
            note: None,
            tracking_code: None,
            carrier: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = memory_db().await;
        seed_product(&db, "a", 50_000, 5).await;
        let repo = db.orders();

        let mut tx = db.begin().await.unwrap();
        repo.insert(&mut tx, &order("o-1", 100_000, 30_000, 0, 130_000)).await.unwrap();
        repo.insert_line(
            &mut tx,
            &OrderLine {
                id: "l-1".into(),
                order_id: "o-1".into(),
                product_id: "a".into(),
                product_name: "Product a".into(),
                quantity: 2,
                unit_price_minor: 50_000,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let stored = repo.get("o-1").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.payment_method, PaymentMethod::Cod);
        assert!(stored.total_is_consistent());

        let lines = repo.lines("o-1").await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_total().minor(), 100_000);
        assert_eq!(repo.count_for_user("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_total_identity_enforced_by_schema() {
        let db = memory_db().await;
        let mut tx = db.begin().await.unwrap();
        let err = db
            .orders()
            .insert(&mut tx, &order("o-bad", 100_000, 0, 0, 99_999))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_lock_status_and_tracking() {
        let db = memory_db().await;
        let repo = db.orders();

        let mut tx = db.begin().await.unwrap();
        assert!(!repo.lock(&mut tx, "o-1").await.unwrap());
        repo.insert(&mut tx, &order("o-1", 1_000, 0, 0, 1_000)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.begin().await.unwrap();
        assert!(repo.lock(&mut tx, "o-1").await.unwrap());
        repo.set_status(&mut tx, "o-1", OrderStatus::Confirmed, Utc::now()).await.unwrap();
        repo.set_tracking(&mut tx, "o-1", "GHN123", Some("GHN"), Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let stored = repo.get("o-1").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.tracking_code.as_deref(), Some("GHN123"));
        assert_eq!(stored.carrier.as_deref(), Some("GHN"));
    }
}
