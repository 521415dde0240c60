//! # Error Types
//!
//! Domain-specific error types for emporia-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  emporia-core (this file)                                              │
//! │  ├── ValidationError  - malformed input, rejected before any txn       │
//! │  └── CoreError        - business rule violations                       │
//! │                                                                         │
//! │  emporia-db                                                            │
//! │  └── DbError          - datastore failures                             │
//! │                                                                         │
//! │  emporia-orders                                                        │
//! │  └── OrderServiceError - taxonomy the caller sees (code + retryable)   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → OrderServiceError → ApiError      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::status::OrderStatus;

// =============================================================================
// Stock Shortfall
// =============================================================================

/// One cart line that could not be reserved.
///
/// Reported for EVERY insufficient line of a checkout, not just the first,
/// so the customer can fix the whole cart in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockShortfall {
    pub product_id: String,
    /// Product name at the time of the failed checkout.
    pub name: String,
    pub requested: i64,
    /// Stock observed under the row lock.
    pub available: i64,
}

impl StockShortfall {
    /// Human-readable one-liner for the error message.
    pub fn describe(&self) -> String {
        if self.available == 0 {
            format!("\"{}\" is out of stock", self.name)
        } else {
            format!(
                "\"{}\" has only {} left (requested {})",
                self.name, self.available, self.requested
            )
        }
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The user's cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// One or more cart lines exceed the stock observed under lock.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout: [A × 2, C × 1]
    ///      │
    ///      ▼
    /// Lock rows: A.stock = 5, C.stock = 0
    ///      │
    ///      ▼
    /// InsufficientStock { shortfalls: [C: requested 1, available 0] }
    ///      │
    ///      ▼
    /// Client shows: "C" is out of stock
    /// ```
    #[error("Insufficient stock: {}", describe_shortfalls(.shortfalls))]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    /// A status change that is not in the transition table.
    #[error("Cannot change order status from \"{from}\" to \"{to}\"")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

fn describe_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(StockShortfall::describe)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any transaction starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (phone number, UUID, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {}", .allowed.join(", "))]
    NotAllowed { field: String, allowed: Vec<String> },
    /// A computed amount does not fit in the money representation.
    #[error("{field} exceeds the largest supported amount")]
    AmountOverflow { field: String },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub fn amount_overflow(field: &str) -> Self {
        ValidationError::AmountOverflow {
            field: field.to_string(),
        }
    }

    pub fn invalid_format(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
