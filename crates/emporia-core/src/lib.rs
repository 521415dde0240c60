//! # emporia-core: Pure Order-Placement Logic
//!
//! This crate holds every rule of the order-placement core that can be
//! expressed without touching a database, a socket or a clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporia Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 order-api (axum HTTP layer)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │       emporia-orders (checkout, status changes, effects)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ emporia-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │   │  money  │ │  types  │ │  status  │ │promotion │ │shipping│ │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └──────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            emporia-db (SQLite, stock ledger, repositories)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer money in minor currency units
//! - [`types`] - Entities (Order, OrderLine, Promotion, StockTransaction, ...)
//! - [`status`] - The order status state machine
//! - [`promotion`] - Promotion eligibility and discount entitlement
//! - [`shipping`] - Shipping fee policies
//! - [`checkout`] - Checkout request validation
//! - [`validation`] - Field validators
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use emporia_core::{Money, OrderStatus};
//!
//! let line = Money::from_minor(50_000).multiply_quantity(2);
//! assert_eq!(line.minor(), 100_000);
//!
//! assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
//! assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod money;
pub mod promotion;
pub mod shipping;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use checkout::{CheckoutRequest, PromotionClaim, ValidCheckout};
pub use error::{CoreError, CoreResult, StockShortfall, ValidationError};
pub use money::Money;
pub use promotion::{PromotionOutcome, PromotionRejection};
pub use shipping::{FlatShippingPolicy, RegionalShippingPolicy, ShippingFeePolicy, ShippingQuote};
pub use status::{OrderStatus, TransitionEffect};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default retention window for idempotency records, in hours.
///
/// Only has to outlive client retry storms; not a permanent dedup log.
pub const DEFAULT_IDEMPOTENCY_TTL_HOURS: i64 = 24;

/// Maximum quantity of a single product on one order line.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Upper bound for a page of stock audit rows.
pub const MAX_PAGE_LIMIT: u32 = 100;
