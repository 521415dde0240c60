//! # emporia-db: Database Layer for Emporia
//!
//! SQLite persistence for the order-placement core, via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporia Data Flow                                │
//! │                                                                         │
//! │  emporia-orders (CheckoutService, OrderStatusService, ...)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    emporia-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ StockLedger   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepo     │    │ 0001_initial │  │   │
//! │  │   │ begin()       │    │ CartRepo, ... │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL), shared by every service instance on the host   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use emporia_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./data/emporia.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! db.stock().lock_cart_products(&mut tx, "user-1").await?;
//! let lines = db.carts().lines_in(&mut tx, "user-1").await?;
//! // ... reserve, insert order ...
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::idempotency::IdempotencyRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::promotion::PromotionRepository;
pub use repository::stock::{AuditContext, Reservation, StockChange, StockLedger};

// Transaction handle used by the services
pub use sqlx::{Error as SqlxError, Sqlite, SqliteConnection, Transaction};
