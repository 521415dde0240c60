//! # Checkout
//!
//! Turns a user's cart into an order in one transaction.
//!
//! ## Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  validate request ───────────────────────────────── VALIDATION_ERROR    │
//! │  idempotency fast path (pool) ── hit ──► replay (duplicate = true)      │
//! │  cart empty? ────────────────────────────────────── CART_EMPTY          │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├─ lock cart products            (first statement, waits on lock)     │
//! │   ├─ idempotency re-check          ── hit ──► ROLLBACK, replay          │
//! │   ├─ load cart lines               (captured name and unit price)       │
//! │   ├─ line quantities, subtotal     overflow ──────── VALIDATION_ERROR    │
//! │   ├─ try_reserve every line        collect ALL shortfalls               │
//! │   │     any shortfall ──► ROLLBACK ────────────── INSUFFICIENT_STOCK    │
//! │   ├─ subtotal, shipping quote, promotion evaluation                     │
//! │   ├─ INSERT order + lines                                               │
//! │   ├─ DELETE cart lines                                                  │
//! │   ├─ record promotion usage        (only when discount > 0)             │
//! │   └─ claim idempotency key                                              │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  post-commit: order.created event, stock/promotion cache signals        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any `?` between BEGIN and COMMIT drops the transaction, which rolls it
//! back: no order, no decrement, no usage row and no idempotency record
//! survive a failed checkout.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use emporia_core::promotion::{self, PromotionOutcome, PromotionRejection};
use emporia_core::validation::validate_line_quantity;
use emporia_core::{
    CartLine, CheckoutRequest, IdempotencyRecord, Money, Order, OrderLine, OrderStatus,
    PromotionClaim, PromotionUsage, ShippingFeePolicy, StockShortfall, ValidCheckout,
    ValidationError,
};
use emporia_db::{AuditContext, Database, Reservation, SqliteConnection};

use crate::config::OrdersConfig;
use crate::effects::SideEffects;
use crate::error::{OrderResult, OrderServiceError};
use crate::events::{CacheSignal, OrderEvent};

/// Result of a checkout, fresh or replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub order_id: String,
    pub total: Money,
    pub status: OrderStatus,
    /// Served from the idempotency store; no new order was created.
    pub duplicate: bool,
    /// Why a requested promotion was not applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_warning: Option<PromotionRejection>,
}

impl CheckoutOutcome {
    fn replay(record: &IdempotencyRecord) -> Self {
        CheckoutOutcome {
            order_id: record.order_id.clone(),
            total: record.total(),
            status: record.status,
            duplicate: true,
            promotion_warning: None,
        }
    }
}

/// Discount settled under the checkout lock.
struct SettledDiscount {
    amount: Money,
    promotion_id: Option<String>,
    warning: Option<PromotionRejection>,
}

impl SettledDiscount {
    fn none() -> Self {
        SettledDiscount {
            amount: Money::zero(),
            promotion_id: None,
            warning: None,
        }
    }

    fn rejected(reason: PromotionRejection) -> Self {
        SettledDiscount {
            warning: Some(reason),
            ..SettledDiscount::none()
        }
    }
}

/// The checkout orchestrator.
#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    shipping: Arc<dyn ShippingFeePolicy>,
    effects: SideEffects,
    config: OrdersConfig,
}

impl CheckoutService {
    pub fn new(
        db: Database,
        shipping: Arc<dyn ShippingFeePolicy>,
        effects: SideEffects,
        config: OrdersConfig,
    ) -> Self {
        CheckoutService {
            db,
            shipping,
            effects,
            config,
        }
    }

    /// Validates the raw request, then places the order.
    pub async fn checkout(&self, user_id: &str, request: &CheckoutRequest) -> OrderResult<CheckoutOutcome> {
        let input = request.validate()?;
        self.place_order(user_id, input).await
    }

    /// Places an order from the user's cart.
    pub async fn place_order(&self, user_id: &str, input: ValidCheckout) -> OrderResult<CheckoutOutcome> {
        let now = Utc::now();
        let key = input.idempotency_key.as_deref();

        if let Some(key) = key {
            if let Some(prior) = self.db.idempotency().find_active(user_id, key, now).await? {
                info!(user_id = %user_id, order_id = %prior.order_id, "Checkout replayed from idempotency store");
                return Ok(CheckoutOutcome::replay(&prior));
            }
        }

        if self.db.carts().lines(user_id).await?.is_empty() {
            // The cart may have just been consumed by a concurrent request
            // carrying the same key.
            if let Some(key) = key {
                if let Some(prior) = self.db.idempotency().find_active(user_id, key, Utc::now()).await? {
                    return Ok(CheckoutOutcome::replay(&prior));
                }
            }
            return Err(OrderServiceError::CartEmpty);
        }

        let stock = self.db.stock();
        let mut tx = self.db.begin().await?;
        stock.lock_cart_products(&mut tx, user_id).await?;

        // A concurrent request with the same key may have committed while we
        // waited on the lock.
        if let Some(key) = key {
            if let Some(prior) = self.db.idempotency().find_active_in(&mut tx, user_id, key, now).await? {
                tx.rollback().await?;
                info!(user_id = %user_id, order_id = %prior.order_id, "Checkout replayed after lock wait");
                return Ok(CheckoutOutcome::replay(&prior));
            }
        }

        let cart = self.db.carts().lines_in(&mut tx, user_id).await?;
        if cart.is_empty() {
            return Err(OrderServiceError::CartEmpty);
        }
        for line in &cart {
            validate_line_quantity(line.quantity)?;
        }
        let subtotal = cart_subtotal(&cart)?;

        let order_id = Uuid::new_v4().to_string();
        let audit = AuditContext {
            actor_id: user_id,
            reference: Some(order_id.as_str()),
            reason: Some("checkout"),
        };

        let mut shortfalls = Vec::new();
        for line in &cart {
            match stock.try_reserve(&mut tx, &line.product_id, line.quantity, audit).await? {
                Reservation::Reserved(change) => {
                    debug!(product_id = %change.product_id, after = change.stock_after, "Line reserved");
                }
                Reservation::Insufficient { available } => shortfalls.push(StockShortfall {
                    product_id: line.product_id.clone(),
                    name: line.product_name.clone(),
                    requested: line.quantity,
                    available,
                }),
            }
        }

        if !shortfalls.is_empty() {
            tx.rollback().await?;
            warn!(user_id = %user_id, lines = shortfalls.len(), "Checkout refused, insufficient stock");
            return Err(OrderServiceError::InsufficientStock { shortfalls });
        }

        let quote = self.shipping.quote(&input.address, subtotal);
        let discount = self
            .settle_discount(&mut tx, input.promotion.as_ref(), subtotal, now)
            .await?;
        let total = subtotal
            .checked_add(quote.fee)
            .and_then(|gross| gross.checked_sub(discount.amount))
            .ok_or_else(|| ValidationError::amount_overflow("total"))?;

        let order = Order {
            id: order_id.clone(),
            user_id: user_id.to_string(),
            recipient_name: input.recipient_name,
            phone: input.phone,
            address: input.address,
            payment_method: input.payment_method,
            status: OrderStatus::initial_for(input.payment_method),
            subtotal_minor: subtotal.minor(),
            shipping_fee_minor: quote.fee.minor(),
            discount_minor: discount.amount.minor(),
            total_minor: total.minor(),
            promotion_id: discount.promotion_id.clone(),
            note: input.note,
            tracking_code: None,
            carrier: None,
            created_at: now,
            updated_at: now,
        };
        let orders = self.db.orders();
        orders.insert(&mut tx, &order).await?;

        let lines: Vec<OrderLine> = cart
            .iter()
            .map(|line| OrderLine {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price_minor: line.price_minor,
            })
            .collect();
        for line in &lines {
            orders.insert_line(&mut tx, line).await?;
        }

        self.db.carts().clear(&mut tx, user_id).await?;

        if let Some(promotion_id) = &discount.promotion_id {
            let usage = PromotionUsage {
                id: Uuid::new_v4().to_string(),
                promotion_id: promotion_id.clone(),
                user_id: user_id.to_string(),
                order_id: order_id.clone(),
                discount_minor: discount.amount.minor(),
                created_at: now,
            };
            self.db.promotions().record_usage(&mut tx, &usage).await?;
        }

        if let Some(key) = key {
            let record = IdempotencyRecord {
                user_id: user_id.to_string(),
                idempotency_key: key.to_string(),
                order_id: order_id.clone(),
                total_minor: order.total_minor,
                status: order.status,
                expires_at: (now + self.config.idempotency_ttl_chrono()).timestamp_millis(),
            };
            if !self.db.idempotency().claim(&mut tx, &record, now).await? {
                return Err(OrderServiceError::Internal(format!(
                    "idempotency key already held for user {user_id}"
                )));
            }
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %user_id,
            status = %order.status,
            total = order.total_minor,
            lines = lines.len(),
            "Order placed"
        );

        self.effects.notify(OrderEvent::created(&order, &lines));
        let mut signals: Vec<CacheSignal> = cart
            .iter()
            .map(|line| CacheSignal::ProductStockChanged(line.product_id.clone()))
            .collect();
        if let Some(promotion_id) = &discount.promotion_id {
            signals.push(CacheSignal::PromotionUsageChanged(promotion_id.clone()));
        }
        self.effects.invalidate(signals);

        Ok(CheckoutOutcome {
            order_id: order.id,
            total,
            status: order.status,
            duplicate: false,
            promotion_warning: discount.warning,
        })
    }

    /// Evaluates the claimed promotion against the locked-in subtotal.
    ///
    /// A bad promotion never blocks checkout; it degrades to no discount and
    /// a warning.
    async fn settle_discount(
        &self,
        conn: &mut SqliteConnection,
        claim: Option<&PromotionClaim>,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> OrderResult<SettledDiscount> {
        let Some(claim) = claim else {
            return Ok(SettledDiscount::none());
        };

        let Some(promo) = self.db.promotions().get_in(conn, &claim.promotion_id).await? else {
            warn!(promotion_id = %claim.promotion_id, "Promotion not found, no discount applied");
            return Ok(SettledDiscount::rejected(PromotionRejection::NotFound));
        };

        match promotion::evaluate(&promo, claim.claimed, subtotal, now) {
            PromotionOutcome::Applied(amount) if amount.is_positive() => {
                if claim.claimed.is_some_and(|claimed| claimed != amount) {
                    debug!(promotion_id = %promo.id, applied = amount.minor(), "Claimed discount adjusted");
                }
                Ok(SettledDiscount {
                    amount,
                    promotion_id: Some(promo.id),
                    warning: None,
                })
            }
            PromotionOutcome::Applied(_) => Ok(SettledDiscount::none()),
            PromotionOutcome::Rejected(reason) => {
                warn!(promotion_id = %promo.id, %reason, "Promotion rejected, no discount applied");
                Ok(SettledDiscount::rejected(reason))
            }
        }
    }
}

/// Sum of `unit price × quantity` over the cart.
fn cart_subtotal(cart: &[CartLine]) -> Result<Money, ValidationError> {
    cart.iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.checked_line_total()?))
        .ok_or_else(|| ValidationError::amount_overflow("subtotal"))
}
