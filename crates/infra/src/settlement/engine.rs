//! Order Settlement Engine.
//!
//! Closes one order and consumes its ingredients exactly once:
//!
//! ```text
//! CloseOrder(id)
//!   ↓
//! 1. Lock the order row (NotFound / AlreadyClosed)
//!   ↓
//! 2. Resolve recipes of every line item
//!   ↓
//! 3. Build the consumption plan (per-unit quantity × ordered quantity, summed per ingredient)
//!   ↓
//! 4. Lock inventory rows in ascending id order, verify stock covers the plan
//!   ↓
//! 5. Decrement each ingredient, flag low stock
//!   ↓
//! 6. Mark the order closed, commit
//! ```
//!
//! Steps 1 to 6 run inside one transaction. Any error, a panic, or the
//! settlement deadline expiring rolls back every write of the call.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{Span, field, instrument};

use brewline_core::OrderId;
use brewline_orders::{ConsumptionPlan, IngredientUsage, SettlementResult};

use crate::error::ServiceError;
use crate::store::Storage;
use crate::transaction::{BoxedTx, with_transaction};

#[derive(Debug, Clone)]
pub struct SettlementEngine {
    store: Arc<dyn Storage>,
    deadline: Option<Duration>,
}

impl SettlementEngine {
    /// `deadline` bounds one whole settlement; `None` lets it run to completion.
    pub fn new(store: Arc<dyn Storage>, deadline: Option<Duration>) -> Self {
        Self { store, deadline }
    }

    /// Close an order and deduct the ingredients it consumes.
    ///
    /// ## Errors
    ///
    /// - `NotFound` when the order does not exist (or a recipe/ingredient row vanished)
    /// - `AlreadyClosed` when it was closed before, by this or a concurrent call
    /// - `InsufficientInventory` naming the first deficient ingredient (ascending id)
    /// - `Transaction` for storage failures and an expired deadline
    ///
    /// On every error inventory and order status are left exactly as they were.
    #[instrument(skip(self), fields(order_id = %order_id, ingredients = field::Empty), err)]
    pub async fn close_order(&self, order_id: OrderId) -> Result<SettlementResult, ServiceError> {
        let work = with_transaction(self.store.as_ref(), move |tx| Box::pin(settle(tx, order_id)));

        let result = match self.deadline {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                ServiceError::Transaction(format!(
                    "settlement of order {order_id} exceeded {}ms and was rolled back",
                    limit.as_millis()
                ))
            })??,
            None => work.await?,
        };

        Span::current().record("ingredients", result.inventory_updates.len());
        for usage in result.inventory_updates.iter().filter(|u| u.low_stock) {
            tracing::warn!(
                ingredient_id = %usage.ingredient_id,
                name = %usage.name,
                remaining = usage.remaining,
                "ingredient at or below its reorder threshold"
            );
        }
        tracing::info!(
            order_id = %order_id,
            total = result.order.total_amount(),
            "order settled"
        );
        Ok(result)
    }
}

/// The transactional body of a settlement.
async fn settle(tx: &mut BoxedTx, order_id: OrderId) -> Result<SettlementResult, ServiceError> {
    let mut order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| ServiceError::order_not_found(order_id))?;
    if order.is_closed() {
        return Err(ServiceError::AlreadyClosed(order_id));
    }

    let products: Vec<_> = order.items().iter().map(|item| item.product_id).collect();
    let recipes = if products.is_empty() {
        Default::default()
    } else {
        tx.recipes(&products).await?
    };
    let plan = ConsumptionPlan::build(order.items(), &recipes)?;

    let mut inventory_updates = Vec::with_capacity(plan.len());
    if !plan.is_empty() {
        let stock = tx.lock_inventory(&plan.ingredient_ids()).await?;
        plan.verify(&stock)?;

        for (ingredient_id, required) in plan.iter() {
            let after = tx.decrement_stock(ingredient_id, required).await?;
            inventory_updates.push(IngredientUsage::after_deduction(&after, required));
        }
    }

    let closed_at = Utc::now();
    tx.mark_closed(order_id, closed_at).await?;
    order
        .close(closed_at)
        .map_err(|_| ServiceError::AlreadyClosed(order_id))?;

    Ok(SettlementResult {
        order,
        inventory_updates,
    })
}
