//! # Idempotency Repository
//!
//! Maps `(user_id, idempotency_key)` to the result of the checkout that
//! first used it.
//!
//! ## Check and Claim
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. find_active (pool)            fast path for ordinary retries        │
//! │         │ miss                                                          │
//! │         ▼                                                               │
//! │  2. BEGIN + lock                  serialises concurrent same-key calls  │
//! │  3. find_active_in (txn)          second look, now authoritative        │
//! │         │ miss                                                          │
//! │         ▼                                                               │
//! │  4. ... reserve stock, insert order ...                                 │
//! │  5. claim (txn)                   upsert; replaces only an expired row  │
//! │  6. COMMIT                        order and key become visible together │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are scoped per user by the composite primary key, so two users
//! sending the same key never collide.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::db_timestamp;
use emporia_core::IdempotencyRecord;

const SELECT_ACTIVE: &str = r#"
    SELECT user_id, idempotency_key, order_id, total_minor, status, expires_at
    FROM idempotency_keys
    WHERE user_id = ?1 AND idempotency_key = ?2 AND expires_at > ?3
"#;

/// Repository for idempotency records.
#[derive(Debug, Clone)]
pub struct IdempotencyRepository {
    pool: SqlitePool,
}

impl IdempotencyRepository {
    /// Creates a new IdempotencyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        IdempotencyRepository { pool }
    }

    /// Unexpired record for the key, if any.
    pub async fn find_active(
        &self,
        user_id: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<IdempotencyRecord>> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(SELECT_ACTIVE)
            .bind(user_id)
            .bind(key)
            .bind(now.timestamp_millis())
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Same as [`find_active`](Self::find_active), inside the caller's transaction.
    pub async fn find_active_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<IdempotencyRecord>> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(SELECT_ACTIVE)
            .bind(user_id)
            .bind(key)
            .bind(now.timestamp_millis())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(record)
    }

    /// Stores the record unless an unexpired one already holds the key.
    ///
    /// Returns `true` when this call wrote the row.
    pub async fn claim(
        &self,
        conn: &mut SqliteConnection,
        record: &IdempotencyRecord,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_keys
                (user_id, idempotency_key, order_id, total_minor, status, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (user_id, idempotency_key) DO UPDATE SET
                order_id = excluded.order_id,
                total_minor = excluded.total_minor,
                status = excluded.status,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            WHERE idempotency_keys.expires_at <= ?8
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.idempotency_key)
        .bind(&record.order_id)
        .bind(record.total_minor)
        .bind(record.status)
        .bind(db_timestamp(now))
        .bind(record.expires_at)
        .bind(now.timestamp_millis())
        .execute(&mut *conn)
        .await?;

        let claimed = result.rows_affected() == 1;
        debug!(user_id = %record.user_id, order_id = %record.order_id, claimed, "Idempotency key claim");
        Ok(claimed)
    }

    /// Deletes expired records. Returns the number removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= ?1")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!(removed = result.rows_affected(), "Purged expired idempotency keys");
        }
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
