//! Application services: validation in front of the stores, error mapping
//! into `ServiceError`, and the settlement entry points.
//!
//! Every service shares one `Arc<dyn Storage>`; none of them cache state
//! between calls.

use std::sync::Arc;
use std::time::Duration;

pub mod inventory;
pub mod menu;
pub mod orders;
pub mod reports;

pub use inventory::InventoryService;
pub use menu::MenuService;
pub use orders::OrderService;
pub use reports::ReportService;

use crate::settlement::{BulkCoordinator, SettlementEngine};
use crate::store::Storage;

/// Everything the HTTP layer needs, built once at start-up.
#[derive(Debug, Clone)]
pub struct Services {
    pub inventory: InventoryService,
    pub menu: MenuService,
    pub orders: OrderService,
    pub reports: ReportService,
}

impl Services {
    /// `settlement_deadline` bounds each order close (`None` disables it).
    pub fn new(store: Arc<dyn Storage>, settlement_deadline: Option<Duration>) -> Self {
        let engine = SettlementEngine::new(store.clone(), settlement_deadline);
        let bulk = BulkCoordinator::new(store.clone(), engine.clone());
        Self {
            inventory: InventoryService::new(store.clone()),
            menu: MenuService::new(store.clone()),
            orders: OrderService::new(store.clone(), engine, bulk),
            reports: ReportService::new(store),
        }
    }
}
