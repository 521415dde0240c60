//! # Product Repository
//!
//! Catalog rows as the order core sees them.
//!
//! The catalog is owned by another service; this repository only reads it
//! and seeds it (tests, fixtures). Stock is changed exclusively through the
//! [`StockLedger`](super::stock::StockLedger).

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::db_timestamp;
use emporia_core::Product;

const SELECT_PRODUCT: &str = "SELECT id, name, price_minor, stock, is_active, updated_at FROM products";

/// Repository for product rows.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Current stock of a product.
    pub async fn stock_of(&self, id: &str) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT stock FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Inserts a catalog row.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(product_id = %product.id, stock = product.stock, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_minor, stock, is_active, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_minor)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(db_timestamp(product.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Changes the catalog price. Existing order lines keep their captured price.
    pub async fn set_price(&self, id: &str, price_minor: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET price_minor = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(price_minor)
            .bind(db_timestamp(chrono::Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
