//! # Inventory Service
//!
//! Warehouse stock movements and the stock audit read.
//!
//! Every movement locks its product, mutates stock, writes exactly one
//! audit row in the same transaction, and signals the cache after commit.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use emporia_core::validation::{validate_id, validate_movement_quantity, validate_stock_level};
use emporia_core::{
    clamp_paging, Page, StockHistoryFilter, StockShortfall, StockTransaction, ValidationError,
};
use emporia_db::{AuditContext, Database, Reservation, StockChange};

use crate::effects::SideEffects;
use crate::error::{OrderResult, OrderServiceError};
use crate::events::CacheSignal;

/// Reason written on adjustments that do not give one.
pub const DEFAULT_ADJUST_REASON: &str = "stocktake adjustment";

const MAX_REASON_LEN: usize = 500;

/// Goods in or out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovementRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    /// Delivery note, supplier invoice, ...
    #[serde(default)]
    pub reference: Option<String>,
}

/// Stocktake correction to an absolute level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustRequest {
    pub product_id: String,
    pub new_stock: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// What a movement did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovementResult {
    pub product_id: String,
    pub product_name: String,
    pub stock_before: i64,
    pub stock_after: i64,
    pub transaction_id: String,
}

impl From<StockChange> for StockMovementResult {
    fn from(change: StockChange) -> Self {
        StockMovementResult {
            product_id: change.product_id,
            product_name: change.product_name,
            stock_before: change.stock_before,
            stock_after: change.stock_after,
            transaction_id: change.transaction_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Movement {
    Import,
    Export,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Database,
    effects: SideEffects,
}

impl InventoryService {
    pub fn new(db: Database, effects: SideEffects) -> Self {
        InventoryService { db, effects }
    }

    /// Goods received.
    pub async fn import(&self, actor_id: &str, request: &StockMovementRequest) -> OrderResult<StockMovementResult> {
        self.move_stock(actor_id, request, Movement::Import).await
    }

    /// Goods removed; refused when stock would go negative.
    pub async fn export(&self, actor_id: &str, request: &StockMovementRequest) -> OrderResult<StockMovementResult> {
        self.move_stock(actor_id, request, Movement::Export).await
    }

    async fn move_stock(
        &self,
        actor_id: &str,
        request: &StockMovementRequest,
        movement: Movement,
    ) -> OrderResult<StockMovementResult> {
        let product_id = validate_id("productId", &request.product_id)?;
        let quantity = validate_movement_quantity(request.quantity)?;
        let reason = optional_text("reason", request.reason.as_deref())?;
        let reference = optional_text("reference", request.reference.as_deref())?;

        let stock = self.db.stock();
        let mut tx = self.db.begin().await?;
        if stock.lock_products(&mut tx, std::slice::from_ref(&product_id)).await? == 0 {
            return Err(OrderServiceError::not_found("Product", product_id));
        }

        let audit = AuditContext {
            actor_id,
            reference: reference.as_deref(),
            reason: reason.as_deref(),
        };
        let change = match movement {
            Movement::Import => stock.import(&mut tx, &product_id, quantity, audit).await?,
            Movement::Export => match stock.export(&mut tx, &product_id, quantity, audit).await? {
                Reservation::Reserved(change) => change,
                Reservation::Insufficient { available } => {
                    tx.rollback().await?;
                    let name = self
                        .db
                        .products()
                        .get_by_id(&product_id)
                        .await?
                        .map(|p| p.name)
                        .unwrap_or_default();
                    warn!(product_id = %product_id, requested = quantity, available, "Export refused");
                    return Err(OrderServiceError::InsufficientStock {
                        shortfalls: vec![StockShortfall {
                            product_id,
                            name,
                            requested: quantity,
                            available,
                        }],
                    });
                }
            },
        };
        tx.commit().await?;

        info!(
            product_id = %change.product_id,
            actor_id = %actor_id,
            movement = ?movement,
            before = change.stock_before,
            after = change.stock_after,
            "Stock moved"
        );
        self.effects
            .invalidate([CacheSignal::ProductStockChanged(change.product_id.clone())]);
        Ok(change.into())
    }

    /// Sets the stock of a product to a counted level.
    pub async fn adjust(&self, actor_id: &str, request: &StockAdjustRequest) -> OrderResult<StockMovementResult> {
        let product_id = validate_id("productId", &request.product_id)?;
        let new_stock = validate_stock_level(request.new_stock)?;
        let reason = optional_text("reason", request.reason.as_deref())?
            .unwrap_or_else(|| DEFAULT_ADJUST_REASON.to_string());

        let stock = self.db.stock();
        let mut tx = self.db.begin().await?;
        if stock.lock_products(&mut tx, std::slice::from_ref(&product_id)).await? == 0 {
            return Err(OrderServiceError::not_found("Product", product_id));
        }
        let audit = AuditContext {
            actor_id,
            reference: None,
            reason: Some(reason.as_str()),
        };
        let change = stock.adjust(&mut tx, &product_id, new_stock, audit).await?;
        tx.commit().await?;

        info!(
            product_id = %change.product_id,
            actor_id = %actor_id,
            before = change.stock_before,
            after = change.stock_after,
            "Stock adjusted"
        );
        self.effects
            .invalidate([CacheSignal::ProductStockChanged(change.product_id.clone())]);
        Ok(change.into())
    }

    /// Stock audit rows, newest first.
    pub async fn history(
        &self,
        filter: &StockHistoryFilter,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> OrderResult<Page<StockTransaction>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(ValidationError::invalid_format("from", "must not be after `to`").into());
            }
        }
        let (page, limit) = clamp_paging(page, limit);
        Ok(self.db.stock().history(filter, page, limit).await?)
    }
}

/// Trimmed free text; blank becomes `None`.
fn optional_text(field: &str, value: Option<&str>) -> OrderResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_REASON_LEN,
        }
        .into());
    }
    Ok(Some(value.to_string()))
}
