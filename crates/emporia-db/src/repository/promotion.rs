//! # Promotion Repository
//!
//! Promotions are read under the checkout lock and their usage is recorded
//! in the same transaction as the order, so `used_count` and the
//! `promotion_usage` rows can never disagree with the orders table.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::db_timestamp;
use emporia_core::{Promotion, PromotionUsage};

const SELECT_PROMOTION: &str = r#"
    SELECT id, code, kind, value, max_discount_minor, min_order_minor, usage_limit,
           used_count, starts_at, ends_at, is_active
    FROM promotions
"#;

/// Repository for promotions and their usage.
#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    /// Creates a new PromotionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Inserts a promotion (admin tooling, fixtures).
    pub async fn insert(&self, promo: &Promotion) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, code, kind, value, max_discount_minor, min_order_minor, usage_limit,
                used_count, starts_at, ends_at, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&promo.id)
        .bind(&promo.code)
        .bind(promo.kind)
        .bind(promo.value)
        .bind(promo.max_discount_minor)
        .bind(promo.min_order_minor)
        .bind(promo.usage_limit)
        .bind(promo.used_count)
        .bind(promo.starts_at.map(db_timestamp))
        .bind(promo.ends_at.map(db_timestamp))
        .bind(promo.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a promotion by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<Promotion>> {
        let promo = sqlx::query_as::<_, Promotion>(&format!("{SELECT_PROMOTION} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(promo)
    }

    /// Gets a promotion inside the caller's transaction.
    pub async fn get_in(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Promotion>> {
        let promo = sqlx::query_as::<_, Promotion>(&format!("{SELECT_PROMOTION} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(promo)
    }

    /// Increments `used_count` and inserts the usage row.
    ///
    /// The increment re-checks the usage limit so a concurrent writer that
    /// slipped past validation cannot push the counter over it.
    pub async fn record_usage(&self, conn: &mut SqliteConnection, usage: &PromotionUsage) -> DbResult<()> {
        let bumped = sqlx::query(
            r#"
            UPDATE promotions SET used_count = used_count + 1
            WHERE id = ?1 AND (usage_limit IS NULL OR used_count < usage_limit)
            "#,
        )
        .bind(&usage.promotion_id)
        .execute(&mut *conn)
        .await?;

        if bumped.rows_affected() == 0 {
            return Err(DbError::CheckViolation {
                message: format!("promotion {} has no usage left", usage.promotion_id),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO promotion_usage (id, promotion_id, user_id, order_id, discount_minor, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&usage.id)
        .bind(&usage.promotion_id)
        .bind(&usage.user_id)
        .bind(&usage.order_id)
        .bind(usage.discount_minor)
        .bind(db_timestamp(usage.created_at))
        .execute(&mut *conn)
        .await?;

        debug!(
            promotion_id = %usage.promotion_id,
            order_id = %usage.order_id,
            discount = usage.discount_minor,
            "Promotion usage recorded"
        );
        Ok(())
    }

    /// Usage rows of a promotion, oldest first.
    pub async fn usages(&self, promotion_id: &str) -> DbResult<Vec<PromotionUsage>> {
        let rows = sqlx::query_as::<_, PromotionUsage>(
            r#"
            SELECT id, promotion_id, user_id, order_id, discount_minor, created_at
            FROM promotion_usage
            WHERE promotion_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(promotion_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::memory_db;
    use chrono::{Duration, Utc};
    use emporia_core::{Order, OrderStatus, PaymentMethod, PromotionKind};

    fn promo(limit: Option<i64>) -> Promotion {
        Promotion {
            id: "promo-1".into(),
            code: "TET2026".into(),
            kind: PromotionKind::Percentage,
            value: 1_000,
            max_discount_minor: Some(50_000),
            min_order_minor: 100_000,
            usage_limit: limit,
            used_count: 0,
            starts_at: Some(Utc::now() - Duration::days(1)),
            ends_at: None,
            is_active: true,
        }
    }

    fn order(id: &str) -> Order {
        let now = Utc::now();
        Order {
            id: id.into(),
            user_id: "u1".into(),
            recipient_name: "Lê Chi".into(),
            phone: "0912345678".into(),
            address: "7 Trần Phú, Đà Nẵng".into(),
            payment_method: PaymentMethod::Cod,
            status: OrderStatus::Pending,
            subtotal_minor: 100_000,
            shipping_fee_minor: 0,
            discount_minor: 10_000,
            total_minor: 90_000,
            promotion_id: Some("promo-1".into()),
            note: None,
            tracking_code: None,
            carrier: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn usage(order_id: &str) -> PromotionUsage {
        PromotionUsage {
            id: format!("use-{order_id}"),
            promotion_id: "promo-1".into(),
            user_id: "u1".into(),
            order_id: order_id.into(),
            discount_minor: 10_000,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let db = memory_db().await;
        db.promotions().insert(&promo(Some(10))).await.unwrap();

        let stored = db.promotions().get("promo-1").await.unwrap().unwrap();
        assert_eq!(stored.kind, PromotionKind::Percentage);
        assert_eq!(stored.max_discount_minor, Some(50_000));
        assert!(stored.starts_at.is_some());
        assert!(stored.ends_at.is_none());
    }

    #[tokio::test]
    async fn test_record_usage_respects_limit() {
        let db = memory_db().await;
        db.promotions().insert(&promo(Some(1))).await.unwrap();
        let repo = db.promotions();

        let mut tx = db.begin().await.unwrap();
        db.orders().insert(&mut tx, &order("o-1")).await.unwrap();
        db.orders().insert(&mut tx, &order("o-2")).await.unwrap();
        repo.record_usage(&mut tx, &usage("o-1")).await.unwrap();
        let second = repo.record_usage(&mut tx, &usage("o-2")).await;
        tx.commit().await.unwrap();

        assert!(matches!(second, Err(DbError::CheckViolation { .. })));
        let stored = repo.get("promo-1").await.unwrap().unwrap();
        assert_eq!(stored.used_count, 1);
        assert_eq!(repo.usages("promo-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_usage_per_order() {
        let db = memory_db().await;
        db.promotions().insert(&promo(None)).await.unwrap();
        let repo = db.promotions();

        let mut tx = db.begin().await.unwrap();
        db.orders().insert(&mut tx, &order("o-1")).await.unwrap();
        repo.record_usage(&mut tx, &usage("o-1")).await.unwrap();
        let mut again = usage("o-1");
        again.id = "use-dup".into();
        let dup = repo.record_usage(&mut tx, &again).await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
    }
}
