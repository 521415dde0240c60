//! # Order Service Errors
//!
//! The taxonomy a caller of the order services sees.
//!
//! ## Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Category      Variant              Code                 Retry?         │
//! │  ────────────  ───────────────────  ───────────────────  ──────         │
//! │  Validation    Validation           VALIDATION_ERROR     no             │
//! │  Precondition  CartEmpty            CART_EMPTY           no             │
//! │                InvalidTransition    INVALID_TRANSITION   no             │
//! │  Conflict      InsufficientStock    INSUFFICIENT_STOCK   no (fix cart)  │
//! │  Lookup        NotFound             NOT_FOUND            no             │
//! │  Transient     Transient            SERVICE_UNAVAILABLE  yes            │
//! │  Internal      Internal             INTERNAL_ERROR       no             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error raised inside a transaction is returned only after the
//! transaction handle has been dropped, so the rollback has already been
//! issued by the time the caller builds a response.

use thiserror::Error;
use tracing::error;

use emporia_core::{CoreError, OrderStatus, StockShortfall, ValidationError};
use emporia_db::{DbError, SqlxError};

/// Result alias for the order services.
pub type OrderResult<T> = Result<T, OrderServiceError>;

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Cart is empty")]
    CartEmpty,

    #[error("Cannot change order status from \"{from}\" to \"{to}\"")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Every insufficient line of the cart, not just the first.
    #[error("Insufficient stock: {}", describe_all(.shortfalls))]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Lock wait exceeded, pool exhausted, datastore unreachable.
    #[error("Service temporarily unavailable: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_all(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(StockShortfall::describe)
        .collect::<Vec<_>>()
        .join("; ")
}

impl OrderServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            OrderServiceError::Validation(_) => "VALIDATION_ERROR",
            OrderServiceError::CartEmpty => "CART_EMPTY",
            OrderServiceError::InvalidTransition { .. } => "INVALID_TRANSITION",
            OrderServiceError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            OrderServiceError::NotFound { .. } => "NOT_FOUND",
            OrderServiceError::Transient(_) => "SERVICE_UNAVAILABLE",
            OrderServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a fresh attempt of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderServiceError::Transient(_))
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        OrderServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<DbError> for OrderServiceError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            return OrderServiceError::Transient(err.to_string());
        }
        match err {
            DbError::NotFound { entity, id } => match entity.as_str() {
                "Order" => OrderServiceError::not_found("Order", id),
                "Product" => OrderServiceError::not_found("Product", id),
                _ => OrderServiceError::Internal(format!("{entity} not found: {id}")),
            },
            other => {
                error!(error = %other, "Database failure, transaction rolled back");
                OrderServiceError::Internal(other.to_string())
            }
        }
    }
}

impl From<SqlxError> for OrderServiceError {
    fn from(err: SqlxError) -> Self {
        OrderServiceError::from(DbError::from(err))
    }
}

impl From<CoreError> for OrderServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EmptyCart => OrderServiceError::CartEmpty,
            CoreError::InsufficientStock { shortfalls } => {
                OrderServiceError::InsufficientStock { shortfalls }
            }
            CoreError::InvalidTransition { from, to } => {
                OrderServiceError::InvalidTransition { from, to }
            }
            CoreError::OrderNotFound(id) => OrderServiceError::not_found("Order", id),
            CoreError::ProductNotFound(id) => OrderServiceError::not_found("Product", id),
            CoreError::Validation(v) => OrderServiceError::Validation(v),
        }
    }
}
