//! # Cart Repository
//!
//! Cart lines are ephemeral and owned by the user. Checkout reads them under
//! the stock lock and deletes them in the same transaction that creates the
//! order.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::db_timestamp;
use emporia_core::CartLine;

const SELECT_LINES: &str = r#"
    SELECT c.user_id, c.product_id, c.quantity, p.name AS product_name, p.price_minor
    FROM cart_lines c
    INNER JOIN products p ON p.id = c.product_id
    WHERE c.user_id = ?1
    ORDER BY c.added_at, c.rowid
"#;

/// Repository for cart lines.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Puts `quantity` of a product in the user's cart, replacing any
    /// existing quantity.
    pub async fn set_quantity(&self, user_id: &str, product_id: &str, quantity: i64) -> DbResult<()> {
        debug!(user_id = %user_id, product_id = %product_id, quantity, "Setting cart quantity");

        sqlx::query(
            r#"
            INSERT INTO cart_lines (user_id, product_id, quantity, added_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = excluded.quantity
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(db_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The user's cart lines joined with current product name and price.
    pub async fn lines(&self, user_id: &str) -> DbResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(SELECT_LINES)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Same as [`lines`](Self::lines), inside the caller's transaction.
    pub async fn lines_in(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(SELECT_LINES)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(lines)
    }

    /// Deletes every line of the user's cart. Returns the number removed.
    pub async fn clear(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        debug!(user_id = %user_id, removed = result.rows_affected(), "Cart cleared");
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
