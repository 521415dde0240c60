//! # Promotion Validator
//!
//! Decides how much of a promotion an order may actually receive.
//!
//! ## Evaluation Order
//! ```text
//! promotion row (read under the checkout lock)
//!      │
//!      ├── is_active == false          → Rejected(inactive)
//!      ├── now < starts_at             → Rejected(not_started)
//!      ├── now > ends_at               → Rejected(expired)
//!      ├── used_count >= usage_limit   → Rejected(usage_exhausted)
//!      ├── subtotal < min_order        → Rejected(below_minimum_order)
//!      │
//!      ▼
//! entitlement(subtotal)
//!      │
//!      ▼
//! applied = min(client claim, entitlement)      (claim absent → entitlement)
//! ```
//!
//! A rejection never blocks checkout. The order is placed without a discount
//! and the reason travels back to the client as a warning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Promotion, PromotionKind};

// =============================================================================
// Outcome Types
// =============================================================================

/// Why a promotion was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionRejection {
    NotFound,
    Inactive,
    NotStarted,
    Expired,
    UsageExhausted,
    BelowMinimumOrder,
}

impl PromotionRejection {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PromotionRejection::NotFound => "not_found",
            PromotionRejection::Inactive => "inactive",
            PromotionRejection::NotStarted => "not_started",
            PromotionRejection::Expired => "expired",
            PromotionRejection::UsageExhausted => "usage_exhausted",
            PromotionRejection::BelowMinimumOrder => "below_minimum_order",
        }
    }
}

impl fmt::Display for PromotionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of validating a promotion against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The discount to apply. Can be zero when the client claimed nothing.
    Applied(Money),
    Rejected(PromotionRejection),
}

impl PromotionOutcome {
    /// Authoritative discount; zero when rejected.
    pub fn discount(&self) -> Money {
        match self {
            PromotionOutcome::Applied(amount) => *amount,
            PromotionOutcome::Rejected(_) => Money::zero(),
        }
    }

    pub fn rejection(&self) -> Option<PromotionRejection> {
        match self {
            PromotionOutcome::Applied(_) => None,
            PromotionOutcome::Rejected(reason) => Some(*reason),
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Checks the activity window, usage cap and minimum order.
pub fn eligibility(
    promo: &Promotion,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<(), PromotionRejection> {
    if !promo.is_active {
        return Err(PromotionRejection::Inactive);
    }
    if promo.starts_at.is_some_and(|start| now < start) {
        return Err(PromotionRejection::NotStarted);
    }
    if promo.ends_at.is_some_and(|end| now > end) {
        return Err(PromotionRejection::Expired);
    }
    if promo.usage_limit.is_some_and(|limit| promo.used_count >= limit) {
        return Err(PromotionRejection::UsageExhausted);
    }
    if subtotal < promo.min_order() {
        return Err(PromotionRejection::BelowMinimumOrder);
    }
    Ok(())
}

/// Largest discount the promotion grants on `subtotal`, never above it.
pub fn entitlement(promo: &Promotion, subtotal: Money) -> Money {
    let raw = match promo.kind {
        PromotionKind::Percentage => {
            let bps = promo.value.clamp(0, 10_000) as u32;
            let pct = subtotal.percentage_bps(bps);
            match promo.max_discount() {
                Some(cap) => pct.min(cap),
                None => pct,
            }
        }
        PromotionKind::Fixed => Money::from_minor(promo.value),
    };
    raw.clamp_to(subtotal)
}

/// Validates `promo` and settles the discount against the client's claim.
///
/// The claimed amount is only ever an upper bound. A client cannot obtain
/// more than the promotion entitles it to.
pub fn evaluate(
    promo: &Promotion,
    claimed: Option<Money>,
    subtotal: Money,
    now: DateTime<Utc>,
) -> PromotionOutcome {
    if let Err(reason) = eligibility(promo, subtotal, now) {
        return PromotionOutcome::Rejected(reason);
    }
    let granted = entitlement(promo, subtotal);
    let applied = match claimed {
        Some(claim) => claim.clamp_to(granted),
        None => granted,
    };
    PromotionOutcome::Applied(applied)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn promo(kind: PromotionKind, value: i64) -> Promotion {
        Promotion {
            id: "promo-1".into(),
            code: "SALE".into(),
            kind,
            value,
            max_discount_minor: None,
            min_order_minor: 0,
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            ends_at: None,
            is_active: true,
        }
    }

    fn m(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    #[test]
    fn test_percentage_capped_by_max_discount() {
        let mut p = promo(PromotionKind::Percentage, 2_000);
        assert_eq!(entitlement(&p, m(130_000)), m(26_000));

        p.max_discount_minor = Some(20_000);
        assert_eq!(entitlement(&p, m(130_000)), m(20_000));
    }

    #[test]
    fn test_fixed_never_exceeds_subtotal() {
        let p = promo(PromotionKind::Fixed, 50_000);
        assert_eq!(entitlement(&p, m(30_000)), m(30_000));
        assert_eq!(entitlement(&p, m(130_000)), m(50_000));
    }

    #[test]
    fn test_claim_is_upper_bound() {
        let p = promo(PromotionKind::Fixed, 10_000);
        let now = Utc::now();

        let over = evaluate(&p, Some(m(99_999)), m(130_000), now);
        assert_eq!(over, PromotionOutcome::Applied(m(10_000)));

        let under = evaluate(&p, Some(m(4_000)), m(130_000), now);
        assert_eq!(under, PromotionOutcome::Applied(m(4_000)));

        let none = evaluate(&p, None, m(130_000), now);
        assert_eq!(none.discount(), m(10_000));
    }

    #[test]
    fn test_rejections() {
        let now = Utc::now();
        let subtotal = m(100_000);

        let mut p = promo(PromotionKind::Fixed, 10_000);
        p.is_active = false;
        assert_eq!(
            evaluate(&p, None, subtotal, now).rejection(),
            Some(PromotionRejection::Inactive)
        );

        let mut p = promo(PromotionKind::Fixed, 10_000);
        p.starts_at = Some(now + Duration::hours(1));
        assert_eq!(
            evaluate(&p, None, subtotal, now).rejection(),
            Some(PromotionRejection::NotStarted)
        );

        let mut p = promo(PromotionKind::Fixed, 10_000);
        p.ends_at = Some(now - Duration::seconds(1));
        assert_eq!(
            evaluate(&p, None, subtotal, now).rejection(),
            Some(PromotionRejection::Expired)
        );

        let mut p = promo(PromotionKind::Fixed, 10_000);
        p.usage_limit = Some(5);
        p.used_count = 5;
        assert_eq!(
            evaluate(&p, None, subtotal, now).rejection(),
            Some(PromotionRejection::UsageExhausted)
        );

        let mut p = promo(PromotionKind::Fixed, 10_000);
        p.min_order_minor = 200_000;
        assert_eq!(
            evaluate(&p, None, subtotal, now).rejection(),
            Some(PromotionRejection::BelowMinimumOrder)
        );
    }

    #[test]
    fn test_rejected_discount_is_zero() {
        let outcome = PromotionOutcome::Rejected(PromotionRejection::Expired);
        assert!(outcome.discount().is_zero());
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let now = Utc::now();
        let mut p = promo(PromotionKind::Fixed, 1_000);
        p.starts_at = Some(now);
        p.ends_at = Some(now);
        assert!(eligibility(&p, m(10_000), now).is_ok());
    }
}
