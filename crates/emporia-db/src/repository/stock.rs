//! # Stock Ledger
//!
//! Owns every change to `products.stock` and its audit trail.
//!
//! ## Row Locking on SQLite
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite has no SELECT ... FOR UPDATE. The ledger takes the lock with a  │
//! │  write as the FIRST statement of a deferred transaction:               │
//! │                                                                         │
//! │    BEGIN;                                                               │
//! │    UPDATE products SET stock = stock WHERE id IN (...);  ◄── lock      │
//! │    SELECT stock FROM products WHERE id = ?;              ◄── fresh     │
//! │    UPDATE products SET stock = ? WHERE id = ?;                         │
//! │    INSERT INTO stock_transactions ...;                                 │
//! │    COMMIT;                                               ◄── release   │
//! │                                                                         │
//! │  Checkout A ──lock──► read 1 ──► write 0 ──► commit                    │
//! │  Checkout B ──lock (busy wait)...................──► read 0 ──► fail   │
//! │                                                                         │
//! │  The write lock is granted only after the busy handler has waited out  │
//! │  the holder, and the read snapshot starts with it, so B observes the   │
//! │  stock A committed, never a stale value.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing may be read in a ledger transaction before the lock statement;
//! a read first would pin an older snapshot.
//!
//! ## Audit
//! Every mutation writes exactly one `stock_transactions` row holding the
//! before/after values observed inside the same transaction. The table is
//! append-only (UPDATE and DELETE are rejected by triggers).

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::db_timestamp;
use emporia_core::{Page, StockHistoryFilter, StockMovementKind, StockTransaction};

// =============================================================================
// Result Types
// =============================================================================

/// One applied stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub product_id: String,
    pub product_name: String,
    pub stock_before: i64,
    pub stock_after: i64,
    /// Id of the audit row written for this change.
    pub transaction_id: String,
}

impl StockChange {
    pub fn delta(&self) -> i64 {
        self.stock_after - self.stock_before
    }
}

/// Outcome of a decrement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    Reserved(StockChange),
    /// Nothing was written.
    Insufficient { available: i64 },
}

/// Who and why, for the audit row.
#[derive(Debug, Clone, Copy)]
pub struct AuditContext<'a> {
    pub actor_id: &'a str,
    pub reference: Option<&'a str>,
    pub reason: Option<&'a str>,
}

const SELECT_TRANSACTION: &str = r#"
    SELECT st.id, st.product_id, p.name AS product_name, st.actor_id, st.kind,
           st.quantity, st.stock_before, st.stock_after, st.reference, st.reason,
           st.created_at
    FROM stock_transactions st
    INNER JOIN products p ON p.id = st.product_id
"#;

// =============================================================================
// Stock Ledger
// =============================================================================

/// Stock ledger over the `products` and `stock_transactions` tables.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    /// Creates a new StockLedger.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    // -------------------------------------------------------------------------
    // Locking
    // -------------------------------------------------------------------------

    /// Locks every product in the user's cart for the rest of the transaction.
    ///
    /// Must be the first statement of the transaction.
    pub async fn lock_cart_products(&self, conn: &mut SqliteConnection, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE products SET stock = stock
            WHERE id IN (SELECT product_id FROM cart_lines WHERE user_id = ?1)
            "#,
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        debug!(user_id = %user_id, locked = result.rows_affected(), "Cart products locked");
        Ok(result.rows_affected())
    }

    /// Locks the given products for the rest of the transaction.
    ///
    /// Must be the first statement of the transaction. Returns the number of
    /// rows that exist.
    pub async fn lock_products(&self, conn: &mut SqliteConnection, product_ids: &[String]) -> DbResult<u64> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE products SET stock = stock WHERE id IN (");
        if product_ids.is_empty() {
            // still takes the write lock
            builder.push("NULL");
        } else {
            let mut ids = builder.separated(", ");
            for id in product_ids {
                ids.push_bind(id.as_str());
            }
        }
        builder.push(")");

        let result = builder.build().execute(&mut *conn).await?;
        debug!(locked = result.rows_affected(), "Products locked");
        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Order movements
    // -------------------------------------------------------------------------

    /// Decrements stock by `quantity` for an order, or reports the shortfall.
    ///
    /// The product must have been locked in this transaction.
    pub async fn try_reserve(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
        audit: AuditContext<'_>,
    ) -> DbResult<Reservation> {
        let (name, before) = read_level(conn, product_id).await?;
        if before < quantity {
            debug!(product_id = %product_id, requested = quantity, available = before, "Reservation refused");
            return Ok(Reservation::Insufficient { available: before });
        }

        let change = write_level(
            conn,
            product_id,
            name,
            before,
            before - quantity,
            StockMovementKind::Order,
            quantity,
            audit,
        )
        .await?;
        Ok(Reservation::Reserved(change))
    }

    /// Puts `quantity` back into stock, the mirror of [`try_reserve`](Self::try_reserve).
    ///
    /// Callers guarantee at-most-once per cancelled order; the ledger itself
    /// does not deduplicate.
    pub async fn restore(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
        audit: AuditContext<'_>,
    ) -> DbResult<StockChange> {
        let (name, before) = read_level(conn, product_id).await?;
        write_level(
            conn,
            product_id,
            name,
            before,
            before + quantity,
            StockMovementKind::Order,
            quantity,
            audit,
        )
        .await
    }

    // -------------------------------------------------------------------------
    // Warehouse movements
    // -------------------------------------------------------------------------

    /// Goods received.
    pub async fn import(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
        audit: AuditContext<'_>,
    ) -> DbResult<StockChange> {
        let (name, before) = read_level(conn, product_id).await?;
        write_level(
            conn,
            product_id,
            name,
            before,
            before + quantity,
            StockMovementKind::Import,
            quantity,
            audit,
        )
        .await
    }

    /// Goods removed. Refuses to go below zero.
    pub async fn export(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
        audit: AuditContext<'_>,
    ) -> DbResult<Reservation> {
        let (name, before) = read_level(conn, product_id).await?;
        if before < quantity {
            return Ok(Reservation::Insufficient { available: before });
        }
        let change = write_level(
            conn,
            product_id,
            name,
            before,
            before - quantity,
            StockMovementKind::Export,
            quantity,
            audit,
        )
        .await?;
        Ok(Reservation::Reserved(change))
    }

    /// Stocktake: sets an absolute level. `quantity` on the audit row is the
    /// size of the correction.
    pub async fn adjust(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        new_stock: i64,
        audit: AuditContext<'_>,
    ) -> DbResult<StockChange> {
        let (name, before) = read_level(conn, product_id).await?;
        write_level(
            conn,
            product_id,
            name,
            before,
            new_stock,
            StockMovementKind::Adjust,
            (new_stock - before).abs(),
            audit,
        )
        .await
    }

    // -------------------------------------------------------------------------
    // Audit reads
    // -------------------------------------------------------------------------

    /// Audit rows written with the given reference (e.g. an order id), oldest first.
    pub async fn transactions_for_reference(&self, reference: &str) -> DbResult<Vec<StockTransaction>> {
        let rows = sqlx::query_as::<_, StockTransaction>(&format!(
            "{SELECT_TRANSACTION} WHERE st.reference = ?1 ORDER BY st.created_at, st.rowid"
        ))
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Paginated audit history, newest first.
    ///
    /// `page` and `limit` are expected to be clamped already
    /// (see [`emporia_core::clamp_paging`]).
    pub async fn history(
        &self,
        filter: &StockHistoryFilter,
        page: u32,
        limit: u32,
    ) -> DbResult<Page<StockTransaction>> {
        let mut count: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM stock_transactions st INNER JOIN products p ON p.id = st.product_id",
        );
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select: QueryBuilder<'_, Sqlite> = QueryBuilder::new(SELECT_TRANSACTION);
        push_filter(&mut select, filter);
        select.push(" ORDER BY st.created_at DESC, st.rowid DESC LIMIT ");
        select.push_bind(i64::from(limit));
        select.push(" OFFSET ");
        select.push_bind(i64::from(page.saturating_sub(1)) * i64::from(limit));

        let items = select
            .build_query_as::<StockTransaction>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total.max(0) as u64, page, limit))
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn read_level(conn: &mut SqliteConnection, product_id: &str) -> DbResult<(String, i64)> {
    sqlx::query_as::<_, (String, i64)>("SELECT name, stock FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))
}

#[allow(clippy::too_many_arguments)]
async fn write_level(
    conn: &mut SqliteConnection,
    product_id: &str,
    product_name: String,
    before: i64,
    after: i64,
    kind: StockMovementKind,
    quantity: i64,
    audit: AuditContext<'_>,
) -> DbResult<StockChange> {
    let now = db_timestamp(Utc::now());

    sqlx::query("UPDATE products SET stock = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(after)
        .bind(&now)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    let transaction_id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO stock_transactions
            (id, product_id, actor_id, kind, quantity, stock_before, stock_after,
             reference, reason, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&transaction_id)
    .bind(product_id)
    .bind(audit.actor_id)
    .bind(kind)
    .bind(quantity)
    .bind(before)
    .bind(after)
    .bind(audit.reference)
    .bind(audit.reason)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %product_id,
        kind = %kind,
        before,
        after,
        "Stock changed"
    );

    Ok(StockChange {
        product_id: product_id.to_string(),
        product_name,
        stock_before: before,
        stock_after: after,
        transaction_id,
    })
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &StockHistoryFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(product_id) = &filter.product_id {
        builder.push(" AND st.product_id = ");
        builder.push_bind(product_id.clone());
    }
    if let Some(kind) = filter.kind {
        builder.push(" AND st.kind = ");
        builder.push_bind(kind);
    }
    if let Some(from) = filter.from {
        builder.push(" AND st.created_at >= ");
        builder.push_bind(db_timestamp(from));
    }
    if let Some(to) = filter.to {
        builder.push(" AND st.created_at <= ");
        builder.push_bind(db_timestamp(to));
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
