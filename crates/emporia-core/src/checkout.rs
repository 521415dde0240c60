//! # Checkout Request
//!
//! The client-facing checkout payload and its validated form.
//!
//! ```text
//! CheckoutRequest (raw JSON, camelCase)
//!      │  validate()
//!      ▼
//! ValidCheckout   (trimmed strings, typed payment method, Money)
//!      │
//!      ▼
//! CheckoutService::checkout(user_id, ValidCheckout)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::PaymentMethod;
use crate::validation::{
    validate_address, validate_claimed_discount, validate_id, validate_idempotency_key,
    validate_note, validate_phone, validate_recipient_name,
};

/// Raw checkout body as sent by the storefront.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutRequest {
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    /// `cod` or `bank_transfer`.
    pub payment_method: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub promotion_id: Option<String>,
    /// Discount the client believes it is owed. Upper bound only.
    #[serde(default)]
    pub discount_amount: Option<i64>,
}

/// A promotion the client asked to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionClaim {
    pub promotion_id: String,
    pub claimed: Option<Money>,
}

/// Checkout input that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCheckout {
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
    pub idempotency_key: Option<String>,
    pub promotion: Option<PromotionClaim>,
}

impl CheckoutRequest {
    /// Validates every field, failing on the first bad one.
    pub fn validate(&self) -> Result<ValidCheckout, ValidationError> {
        let recipient_name = validate_recipient_name(&self.recipient_name)?;
        let phone = validate_phone(&self.phone)?;
        let address = validate_address(&self.address)?;
        let payment_method = self.payment_method.trim().parse::<PaymentMethod>()?;
        let note = validate_note(self.note.as_deref())?;
        let idempotency_key = validate_idempotency_key(self.idempotency_key.as_deref())?;

        let promotion = match self.promotion_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                let claimed = self
                    .discount_amount
                    .map(|amount| validate_claimed_discount(Money::from_minor(amount)))
                    .transpose()?;
                Some(PromotionClaim {
                    promotion_id: validate_id("promotionId", id)?,
                    claimed,
                })
            }
            _ => None,
        };

        Ok(ValidCheckout {
            recipient_name,
            phone,
            address,
            payment_method,
            note,
            idempotency_key,
            promotion,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
