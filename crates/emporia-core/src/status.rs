//! # Order Status State Machine
//!
//! Legal status transitions and the side effects attached to them.
//!
//! ## Transition Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   cod ──► pending ──────────► confirmed ──► processing ──► shipping    │
//! │              │                 ▲   │    │                   ▲   │       │
//! │              ▼                 │   │    └───────────────────┘   ▼       │
//! │   bank ──► awaiting_payment ───┘   │                        delivered   │
//! │                                    │                            │       │
//! │   every non-terminal state ────────┴──► cancelled (restores)    ▼       │
//! │   except delivered                                          returned   │
//! │                                                                         │
//! │   Terminal: cancelled, returned                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only entering `cancelled` has a stock side effect. Because `cancelled` is
//! terminal, the restoration can happen at most once per order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::types::PaymentMethod;

// =============================================================================
// Order Status
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    AwaitingPayment,
    Confirmed,
    Processing,
    Shipping,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::AwaitingPayment,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipping,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    /// Status a freshly placed order starts in.
    pub const fn initial_for(method: PaymentMethod) -> Self {
        if method.is_deferred() {
            OrderStatus::AwaitingPayment
        } else {
            OrderStatus::Pending
        }
    }

    /// Statuses reachable in one step.
    pub const fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[AwaitingPayment, Confirmed, Cancelled],
            AwaitingPayment => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Shipping, Cancelled],
            Processing => &[Shipping, Cancelled],
            Shipping => &[Delivered, Cancelled],
            Delivered => &[Returned],
            Cancelled | Returned => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Validates `self → next` and returns what the transition must do.
    pub fn transition(&self, next: OrderStatus) -> Result<TransitionEffect, CoreError> {
        if !self.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        Ok(TransitionEffect {
            restores_stock: next == OrderStatus::Cancelled,
        })
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::AwaitingPayment => "awaiting_payment",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    /// Display label used in customer notifications.
    pub const fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::AwaitingPayment => "Awaiting payment",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipping => "Out for delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Returned => "Returned",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: OrderStatus::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Transition Effect
// =============================================================================

/// What a validated transition must do inside its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEffect {
    /// Put every line item's quantity back into stock.
    pub restores_stock: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const TABLE: &[(OrderStatus, &[OrderStatus])] = &[
        (Pending, &[AwaitingPayment, Confirmed, Cancelled]),
        (AwaitingPayment, &[Confirmed, Cancelled]),
        (Confirmed, &[Processing, Shipping, Cancelled]),
        (Processing, &[Shipping, Cancelled]),
        (Shipping, &[Delivered, Cancelled]),
        (Delivered, &[Returned]),
        (Cancelled, &[]),
        (Returned, &[]),
    ];

    #[test]
    fn test_every_pair_matches_table() {
        for (from, allowed) in TABLE {
            for to in OrderStatus::ALL {
                let expected = allowed.contains(&to);
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{from} -> {to} should be {}",
                    if expected { "allowed" } else { "rejected" }
                );
                assert_eq!(from.transition(to).is_ok(), expected);
            }
        }
    }

    #[test]
    fn test_only_cancellation_restores_stock() {
        for (from, allowed) in TABLE {
            for to in allowed.iter() {
                let effect = from.transition(*to).unwrap();
                assert_eq!(effect.restores_stock, *to == Cancelled, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(Cancelled.is_terminal());
        assert!(Returned.is_terminal());
        assert!(!Delivered.is_terminal());
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn test_rejected_transition_names_both_states() {
        let err = Cancelled.transition(Pending).unwrap_err();
        match err {
            CoreError::InvalidTransition { from, to } => {
                assert_eq!(from, Cancelled);
                assert_eq!(to, Pending);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_initial_status_by_payment_method() {
        assert_eq!(OrderStatus::initial_for(PaymentMethod::Cod), Pending);
        assert_eq!(
            OrderStatus::initial_for(PaymentMethod::BankTransfer),
            AwaitingPayment
        );
        assert_eq!(OrderStatus::default(), Pending);
    }

    #[test]
    fn test_parse_round_trips_wire_names() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
