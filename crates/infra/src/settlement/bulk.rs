//! Bulk Settlement Coordinator.
//!
//! A batch runs in two phases. First every request is validated and priced
//! against the current catalog without writing anything; one bad request
//! (invalid name, unknown product) fails the whole call. Then each order is
//! created and settled in submission order. A settlement refused for lack of
//! stock becomes a `rejected` record; any other settlement failure aborts the
//! call with that error, leaving already-settled orders committed. An empty
//! batch yields an empty response with a zeroed summary.

use std::sync::Arc;

use tracing::instrument;

use brewline_orders::{BulkOrderResponse, NewOrder, REASON_INSUFFICIENT_INVENTORY};

use super::SettlementEngine;
use crate::error::ServiceError;
use crate::services::orders::price_order;
use crate::store::Storage;

#[derive(Debug, Clone)]
pub struct BulkCoordinator {
    store: Arc<dyn Storage>,
    engine: SettlementEngine,
}

impl BulkCoordinator {
    pub fn new(store: Arc<dyn Storage>, engine: SettlementEngine) -> Self {
        Self { store, engine }
    }

    #[instrument(skip(self, requests), fields(batch_size = requests.len()), err)]
    pub async fn process(&self, requests: Vec<NewOrder>) -> Result<BulkOrderResponse, ServiceError> {
        let mut priced = Vec::with_capacity(requests.len());
        for (index, request) in requests.into_iter().enumerate() {
            let order = price_order(self.store.as_ref(), request)
                .await
                .map_err(|err| match err {
                    ServiceError::Validation(msg) => {
                        ServiceError::Validation(format!("order #{}: {}", index + 1, msg))
                    }
                    other => other,
                })?;
            priced.push(order);
        }

        let mut response = BulkOrderResponse::new(priced.len());
        for order in priced {
            let created = self.store.insert_order(order).await?;
            match self.engine.close_order(created.id_typed()).await {
                Ok(settled) => response.accept(&settled.order, settled.inventory_updates),
                Err(err) if err.is_insufficient_inventory() => {
                    tracing::info!(
                        order_id = %created.id_typed(),
                        reason = %err,
                        "bulk order rejected"
                    );
                    response.reject(&created, REASON_INSUFFICIENT_INVENTORY);
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            accepted = response.summary.accepted,
            rejected = response.summary.rejected,
            total_revenue = response.summary.total_revenue,
            "bulk batch processed"
        );
        Ok(response)
    }
}
