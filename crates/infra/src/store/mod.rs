//! Storage contracts and their backends.
//!
//! Every backend implements the same async traits; the services only ever see
//! `Arc<dyn Storage>`. The pool (or in-memory state) is owned by the store
//! value handed in at construction, never by a process-wide handle.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use brewline_core::{IngredientId, MenuItemId, OrderId};
use brewline_inventory::{InventoryItem, LeftoverPage, LeftoverSort, NewInventoryItem, PageRequest};
use brewline_menu::{MenuItem, NewMenuItem, RecipeLine};
use brewline_orders::{Order, PricedOrder};

use crate::error::StoreResult;
use crate::reports::{DateRange, MenuMatch, OrderMatch, OrderedLine, PopularItem, SearchQuery};

pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::Fault;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Direct CRUD over the inventory ledger.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Fails with `Conflict` when the name is taken.
    async fn insert_inventory(&self, draft: NewInventoryItem) -> StoreResult<InventoryItem>;

    async fn list_inventory(&self) -> StoreResult<Vec<InventoryItem>>;

    async fn get_inventory(&self, id: IngredientId) -> StoreResult<Option<InventoryItem>>;

    /// `Ok(None)` when the row does not exist.
    async fn update_inventory(
        &self,
        id: IngredientId,
        draft: NewInventoryItem,
    ) -> StoreResult<Option<InventoryItem>>;

    /// `Ok(false)` when the row does not exist; `Conflict` while a recipe uses it.
    async fn delete_inventory(&self, id: IngredientId) -> StoreResult<bool>;

    async fn leftovers(&self, sort: LeftoverSort, page: PageRequest) -> StoreResult<LeftoverPage>;
}

#[async_trait]
pub trait MenuStore: Send + Sync {
    /// Every recipe ingredient must exist (`MissingIngredient` otherwise),
    /// checked in the same transaction as the insert.
    async fn insert_menu_item(&self, draft: NewMenuItem) -> StoreResult<MenuItem>;

    async fn list_menu_items(&self) -> StoreResult<Vec<MenuItem>>;

    async fn get_menu_item(&self, id: MenuItemId) -> StoreResult<Option<MenuItem>>;

    async fn update_menu_item(&self, id: MenuItemId, draft: NewMenuItem) -> StoreResult<Option<MenuItem>>;

    /// `Conflict` while orders reference the item.
    async fn delete_menu_item(&self, id: MenuItemId) -> StoreResult<bool>;

    /// Current prices of the requested items; unknown ids are simply absent.
    async fn menu_prices(&self, ids: &[MenuItemId]) -> StoreResult<HashMap<MenuItemId, f64>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: PricedOrder) -> StoreResult<Order>;

    async fn list_orders(&self) -> StoreResult<Vec<Order>>;

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    /// Replace items and metadata of a non-closed order (status becomes
    /// `updated`). Fails with `OrderClosed` when the order is closed.
    async fn update_order(&self, id: OrderId, order: PricedOrder) -> StoreResult<Option<Order>>;

    async fn delete_order(&self, id: OrderId) -> StoreResult<bool>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Sum of `total_amount` over closed orders.
    async fn total_sales(&self) -> StoreResult<f64>;

    async fn popular_items(&self, limit: u32) -> StoreResult<Vec<PopularItem>>;

    /// Every order line of orders created inside `range`.
    async fn ordered_lines(&self, range: DateRange) -> StoreResult<Vec<OrderedLine>>;

    async fn search_menu(&self, query: &SearchQuery) -> StoreResult<Vec<MenuMatch>>;

    async fn search_orders(&self, query: &SearchQuery) -> StoreResult<Vec<OrderMatch>>;
}

/// One settlement transaction.
///
/// Dropping the value without calling `commit` discards every write made
/// through it, which is what makes a cancelled or panicking settlement safe.
#[async_trait]
pub trait SettlementTx: Send {
    /// Load the order (with its items) and hold it against concurrent closes.
    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>>;

    /// Recipes of the given products; missing products are absent from the map.
    async fn recipes(&mut self, products: &[MenuItemId]) -> StoreResult<HashMap<MenuItemId, Vec<RecipeLine>>>;

    /// Current rows of the given ingredients, locked in ascending id order.
    async fn lock_inventory(
        &mut self,
        ids: &[IngredientId],
    ) -> StoreResult<BTreeMap<IngredientId, InventoryItem>>;

    /// Deduct `amount` and return the row as it stands afterwards.
    async fn decrement_stock(&mut self, id: IngredientId, amount: f64) -> StoreResult<InventoryItem>;

    async fn mark_closed(&mut self, id: OrderId, at: DateTime<Utc>) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn SettlementTx>>;
}

/// Everything the services need from a backend.
pub trait Storage: InventoryStore + MenuStore + OrderStore + ReportStore + SettlementStore + 'static {}

impl std::fmt::Debug for dyn Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Storage")
    }
}

impl<T> Storage for T where T: InventoryStore + MenuStore + OrderStore + ReportStore + SettlementStore + 'static {}
