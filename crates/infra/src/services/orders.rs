use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use brewline_core::OrderId;
use brewline_orders::{BulkOrderResponse, NewOrder, Order, PricedOrder, SettlementResult};

use crate::error::ServiceError;
use crate::reports::{DateRange, count_by_name};
use crate::settlement::{BulkCoordinator, SettlementEngine};
use crate::store::Storage;

/// Order lifecycle: create, revise while not closed, close through the
/// settlement engine.
#[derive(Debug, Clone)]
pub struct OrderService {
    store: Arc<dyn Storage>,
    engine: SettlementEngine,
    bulk: BulkCoordinator,
}

impl OrderService {
    pub fn new(store: Arc<dyn Storage>, engine: SettlementEngine, bulk: BulkCoordinator) -> Self {
        Self { store, engine, bulk }
    }

    pub async fn create(&self, request: NewOrder) -> Result<Order, ServiceError> {
        let priced = price_order(self.store.as_ref(), request).await?;
        let order = self.store.insert_order(priced).await?;
        tracing::info!(order_id = %order.id_typed(), total = order.total_amount(), "order created");
        Ok(order)
    }

    pub async fn list(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self.store.list_orders().await?)
    }

    pub async fn get(&self, id: OrderId) -> Result<Order, ServiceError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(id))
    }

    /// Replace items and instructions of an order that is not closed yet.
    /// Prices are snapshotted again from the current catalog.
    pub async fn update(&self, id: OrderId, request: NewOrder) -> Result<Order, ServiceError> {
        request.validate()?;
        let current = self.get(id).await?;
        if current.is_closed() {
            return Err(ServiceError::AlreadyClosed(id));
        }
        let priced = price_order(self.store.as_ref(), request).await?;
        self.store
            .update_order(id, priced)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(id))
    }

    pub async fn delete(&self, id: OrderId) -> Result<(), ServiceError> {
        if !self.store.delete_order(id).await? {
            return Err(ServiceError::order_not_found(id));
        }
        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }

    pub async fn close(&self, id: OrderId) -> Result<SettlementResult, ServiceError> {
        self.engine.close_order(id).await
    }

    pub async fn process_bulk(&self, requests: Vec<NewOrder>) -> Result<BulkOrderResponse, ServiceError> {
        self.bulk.process(requests).await
    }

    /// Summed quantity per menu item name over orders created between the two
    /// dates (`YYYY-MM-DD`, end day inclusive).
    pub async fn number_of_ordered_items(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<BTreeMap<String, u64>, ServiceError> {
        let range = DateRange::parse(start, end, Utc::now())?;
        let lines = self.store.ordered_lines(range).await?;
        Ok(count_by_name(&lines))
    }
}

/// Validate a request and snapshot current catalog prices into it.
///
/// Reads only; nothing is written.
pub(crate) async fn price_order(store: &dyn Storage, request: NewOrder) -> Result<PricedOrder, ServiceError> {
    request.validate()?;
    let products = request.product_ids();
    let prices = store.menu_prices(&products).await?;
    request
        .price(&prices)
        .map_err(ServiceError::menu_item_not_found)
}
