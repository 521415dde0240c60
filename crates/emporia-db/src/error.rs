//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← categorised by SQLite message                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  OrderServiceError ← Transient if `is_transient()`, else Internal      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (order-api) ← 503 / 500 JSON envelope                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second usage row for the same order
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Cart line referencing a deleted product
    /// - Order line referencing a non-existent order
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation.
    ///
    /// ## When This Occurs
    /// - A write that would drive `products.stock` below zero
    /// - An order whose total does not equal subtotal + shipping - discount
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Write rejected by the append-only audit triggers.
    #[error("Append-only violation: {0}")]
    AppendOnly(String),

    /// Lock wait exceeded the busy timeout.
    ///
    /// ## When This Occurs
    /// - Another transaction held the write lock for longer than
    ///   `DbConfig::lock_timeout`
    #[error("Lock wait timed out: {0}")]
    LockTimeout(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// The operation may succeed if retried as a fresh request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::LockTimeout(_) | DbError::PoolExhausted | DbError::ConnectionFailed(_)
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint / lock type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => classify_message(db_err.message()),

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Maps a SQLite error message to a DbError.
///
/// SQLite reports constraint failures as
/// `"<KIND> constraint failed: <table>.<column>"` and lock contention as
/// `"database is locked"` / `"database table is locked"`.
fn classify_message(msg: &str) -> DbError {
    if msg.contains("UNIQUE constraint failed") {
        let field = msg
            .split("UNIQUE constraint failed: ")
            .nth(1)
            .unwrap_or("unknown")
            .to_string();
        DbError::UniqueViolation {
            field,
            value: "unknown".to_string(),
        }
    } else if msg.contains("FOREIGN KEY constraint failed") {
        DbError::ForeignKeyViolation {
            message: msg.to_string(),
        }
    } else if msg.contains("CHECK constraint failed") {
        DbError::CheckViolation {
            message: msg.to_string(),
        }
    } else if msg.contains("append-only") {
        DbError::AppendOnly(msg.to_string())
    } else if msg.contains("is locked") || msg.contains("database is busy") {
        DbError::LockTimeout(msg.to_string())
    } else {
        DbError::QueryFailed(msg.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
