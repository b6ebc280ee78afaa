//! In-memory storage backend.
//!
//! All state sits behind one async mutex. A settlement transaction holds the
//! owned guard for its whole lifetime and writes to a working copy that only
//! replaces the shared state on commit, so rollback (explicit, by drop, or by
//! unwinding) is just discarding the copy.
//!
//! Intended for tests/dev. Not optimized for performance.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use brewline_core::{IngredientId, MenuItemId, OrderId};
use brewline_inventory::{InventoryItem, Leftover, LeftoverPage, LeftoverSort, NewInventoryItem, PageRequest};
use brewline_menu::{MenuItem, NewMenuItem, RecipeLine};
use brewline_orders::{Order, PricedOrder};

use super::{InventoryStore, MenuStore, OrderStore, ReportStore, SettlementStore, SettlementTx};
use crate::error::{StoreError, StoreResult};
use crate::reports::{DateRange, MenuMatch, OrderMatch, OrderedLine, PopularItem, SearchQuery};

/// One-shot failure for the next settlement transaction, used to exercise
/// rollback paths. Test builds only.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail the n-th (1-based) stock decrement.
    FailDecrement(usize),
    /// Fail when marking the order closed, after every decrement succeeded.
    FailMarkClosed,
    /// Sleep before marking the order closed.
    Stall(Duration),
    /// Panic right after the first decrement.
    PanicAfterDecrement,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    inventory: BTreeMap<IngredientId, InventoryItem>,
    menu: BTreeMap<MenuItemId, MenuItem>,
    orders: BTreeMap<OrderId, Order>,
    last_ingredient_id: i64,
    last_menu_item_id: i64,
    last_order_id: i64,
    #[cfg(test)]
    pending_fault: Option<Fault>,
}

impl MemoryState {
    fn ensure_unique_inventory_name(&self, name: &str, except: Option<IngredientId>) -> StoreResult<()> {
        let taken = self
            .inventory
            .values()
            .any(|i| i.name() == name && Some(i.id_typed()) != except);
        if taken {
            return Err(StoreError::Conflict(
                "inventory item with this name already exists".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_unique_menu_name(&self, name: &str, except: Option<MenuItemId>) -> StoreResult<()> {
        let taken = self
            .menu
            .values()
            .any(|m| m.name() == name && Some(m.id_typed()) != except);
        if taken {
            return Err(StoreError::Conflict(
                "menu item with this name already exists".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_ingredients_exist(&self, draft: &NewMenuItem) -> StoreResult<()> {
        match draft
            .ingredient_ids()
            .into_iter()
            .find(|id| !self.inventory.contains_key(id))
        {
            Some(missing) => Err(StoreError::MissingIngredient(missing)),
            None => Ok(()),
        }
    }

    fn menu_name(&self, id: MenuItemId) -> Option<&str> {
        self.menu.get(&id).map(MenuItem::name)
    }
}

/// In-memory implementation of every storage trait.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fault for the next settlement transaction.
    #[cfg(test)]
    pub async fn inject_fault(&self, fault: Fault) {
        self.state.lock().await.pending_fault = Some(fault);
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn insert_inventory(&self, draft: NewInventoryItem) -> StoreResult<InventoryItem> {
        let mut state = self.state.lock().await;
        state.ensure_unique_inventory_name(&draft.name, None)?;
        state.last_ingredient_id += 1;
        let id = IngredientId::new(state.last_ingredient_id);
        let item = InventoryItem::from_draft(id, draft, Utc::now());
        state.inventory.insert(id, item.clone());
        Ok(item)
    }

    async fn list_inventory(&self) -> StoreResult<Vec<InventoryItem>> {
        Ok(self.state.lock().await.inventory.values().cloned().collect())
    }

    async fn get_inventory(&self, id: IngredientId) -> StoreResult<Option<InventoryItem>> {
        Ok(self.state.lock().await.inventory.get(&id).cloned())
    }

    async fn update_inventory(
        &self,
        id: IngredientId,
        draft: NewInventoryItem,
    ) -> StoreResult<Option<InventoryItem>> {
        let mut state = self.state.lock().await;
        if !state.inventory.contains_key(&id) {
            return Ok(None);
        }
        state.ensure_unique_inventory_name(&draft.name, Some(id))?;
        let item = state.inventory.get_mut(&id).ok_or_else(|| {
            StoreError::Backend(format!("inventory item {id} vanished during update"))
        })?;
        item.replace(draft, Utc::now());
        Ok(Some(item.clone()))
    }

    async fn delete_inventory(&self, id: IngredientId) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if let Some(user) = state
            .menu
            .values()
            .find(|m| m.ingredients().iter().any(|line| line.ingredient_id == id))
        {
            return Err(StoreError::Conflict(format!(
                "inventory item {id} is used by menu item {}",
                user.id_typed()
            )));
        }
        Ok(state.inventory.remove(&id).is_some())
    }

    async fn leftovers(&self, sort: LeftoverSort, page: PageRequest) -> StoreResult<LeftoverPage> {
        let state = self.state.lock().await;
        let rows = state.inventory.values().map(Leftover::from).collect();
        Ok(LeftoverPage::from_all(rows, sort, page))
    }
}

#[async_trait]
impl MenuStore for MemoryStore {
    async fn insert_menu_item(&self, draft: NewMenuItem) -> StoreResult<MenuItem> {
        let mut state = self.state.lock().await;
        state.ensure_unique_menu_name(&draft.name, None)?;
        state.ensure_ingredients_exist(&draft)?;
        state.last_menu_item_id += 1;
        let id = MenuItemId::new(state.last_menu_item_id);
        let item = MenuItem::from_draft(id, draft, Utc::now());
        state.menu.insert(id, item.clone());
        Ok(item)
    }

    async fn list_menu_items(&self) -> StoreResult<Vec<MenuItem>> {
        Ok(self.state.lock().await.menu.values().cloned().collect())
    }

    async fn get_menu_item(&self, id: MenuItemId) -> StoreResult<Option<MenuItem>> {
        Ok(self.state.lock().await.menu.get(&id).cloned())
    }

    async fn update_menu_item(&self, id: MenuItemId, draft: NewMenuItem) -> StoreResult<Option<MenuItem>> {
        let mut state = self.state.lock().await;
        if !state.menu.contains_key(&id) {
            return Ok(None);
        }
        state.ensure_unique_menu_name(&draft.name, Some(id))?;
        state.ensure_ingredients_exist(&draft)?;
        let item = state
            .menu
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("menu item {id} vanished during update")))?;
        item.replace(draft, Utc::now());
        Ok(Some(item.clone()))
    }

    async fn delete_menu_item(&self, id: MenuItemId) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if let Some(order) = state
            .orders
            .values()
            .find(|o| o.items().iter().any(|i| i.product_id == id))
        {
            return Err(StoreError::Conflict(format!(
                "menu item {id} is referenced by order {}",
                order.id_typed()
            )));
        }
        Ok(state.menu.remove(&id).is_some())
    }

    async fn menu_prices(&self, ids: &[MenuItemId]) -> StoreResult<HashMap<MenuItemId, f64>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.menu.get(id).map(|m| (*id, m.price())))
            .collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: PricedOrder) -> StoreResult<Order> {
        let mut state = self.state.lock().await;
        state.last_order_id += 1;
        let id = OrderId::new(state.last_order_id);
        let order = Order::open(id, order, Utc::now());
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        Ok(self.state.lock().await.orders.values().cloned().collect())
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn update_order(&self, id: OrderId, order: PricedOrder) -> StoreResult<Option<Order>> {
        let mut state = self.state.lock().await;
        let Some(existing) = state.orders.get_mut(&id) else {
            return Ok(None);
        };
        existing
            .revise(order, Utc::now())
            .map_err(|_| StoreError::OrderClosed(id))?;
        Ok(Some(existing.clone()))
    }

    async fn delete_order(&self, id: OrderId) -> StoreResult<bool> {
        Ok(self.state.lock().await.orders.remove(&id).is_some())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn total_sales(&self) -> StoreResult<f64> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.is_closed())
            .map(Order::total_amount)
            .sum())
    }

    async fn popular_items(&self, limit: u32) -> StoreResult<Vec<PopularItem>> {
        let state = self.state.lock().await;
        let mut sold: BTreeMap<MenuItemId, u64> = BTreeMap::new();
        for item in state.orders.values().flat_map(|o| o.items()) {
            *sold.entry(item.product_id).or_insert(0) += u64::from(item.quantity);
        }

        let mut ranked: Vec<PopularItem> = sold
            .into_iter()
            .filter_map(|(id, quantity_sold)| {
                state.menu_name(id).map(|name| PopularItem {
                    product_id: id,
                    name: name.to_string(),
                    quantity_sold,
                })
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.quantity_sold
                .cmp(&a.quantity_sold)
                .then(a.product_id.cmp(&b.product_id))
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    async fn ordered_lines(&self, range: DateRange) -> StoreResult<Vec<OrderedLine>> {
        let state = self.state.lock().await;
        let mut lines = Vec::new();
        for order in state.orders.values().filter(|o| range.contains(o.created_at())) {
            for item in order.items() {
                if let Some(name) = state.menu_name(item.product_id) {
                    lines.push(OrderedLine {
                        name: name.to_string(),
                        quantity: u64::from(item.quantity),
                        ordered_at: order.created_at(),
                    });
                }
            }
        }
        Ok(lines)
    }

    async fn search_menu(&self, query: &SearchQuery) -> StoreResult<Vec<MenuMatch>> {
        let state = self.state.lock().await;
        Ok(state
            .menu
            .values()
            .filter(|m| query.price_in_range(m.price()))
            .filter(|m| query.matches(m.name()) || query.matches(m.description()))
            .map(|m| MenuMatch {
                id: m.id_typed(),
                name: m.name().to_string(),
                description: m.description().to_string(),
                price: m.price(),
            })
            .collect())
    }

    async fn search_orders(&self, query: &SearchQuery) -> StoreResult<Vec<OrderMatch>> {
        let state = self.state.lock().await;
        let mut matches = Vec::new();
        for order in state.orders.values() {
            if !query.price_in_range(order.total_amount()) {
                continue;
            }
            let mut items: Vec<String> = order
                .items()
                .iter()
                .filter_map(|i| state.menu_name(i.product_id).map(str::to_string))
                .collect();
            items.sort();
            if query.matches(order.customer_name()) || items.iter().any(|n| query.matches(n)) {
                matches.push(OrderMatch {
                    id: order.id_typed(),
                    customer_name: order.customer_name().to_string(),
                    items,
                    total: order.total_amount(),
                });
            }
        }
        Ok(matches)
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn SettlementTx>> {
        #[cfg_attr(not(test), allow(unused_mut))]
        let mut guard = self.state.clone().lock_owned().await;
        #[cfg(test)]
        let fault = guard.pending_fault.take();
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            #[cfg(test)]
            fault,
            guard,
            working,
            decrements: 0,
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    #[cfg(test)]
    fault: Option<Fault>,
    decrements: usize,
}

#[async_trait]
impl SettlementTx for MemoryTx {
    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn recipes(&mut self, products: &[MenuItemId]) -> StoreResult<HashMap<MenuItemId, Vec<RecipeLine>>> {
        Ok(products
            .iter()
            .filter_map(|id| self.working.menu.get(id).map(|m| (*id, m.ingredients().to_vec())))
            .collect())
    }

    async fn lock_inventory(
        &mut self,
        ids: &[IngredientId],
    ) -> StoreResult<BTreeMap<IngredientId, InventoryItem>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.inventory.get(id).map(|i| (*id, i.clone())))
            .collect())
    }

    async fn decrement_stock(&mut self, id: IngredientId, amount: f64) -> StoreResult<InventoryItem> {
        self.decrements += 1;
        #[cfg(test)]
        if self.fault == Some(Fault::FailDecrement(self.decrements)) {
            return Err(StoreError::Fault(format!("decrement #{} of ingredient {id}", self.decrements)));
        }

        let item = self
            .working
            .inventory
            .get_mut(&id)
            .ok_or(StoreError::MissingIngredient(id))?;
        item.consume(amount, Utc::now())
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        let after = item.clone();

        #[cfg(test)]
        if self.fault == Some(Fault::PanicAfterDecrement) {
            panic!("injected panic after decrementing ingredient {id}");
        }
        Ok(after)
    }

    async fn mark_closed(&mut self, id: OrderId, at: DateTime<Utc>) -> StoreResult<()> {
        #[cfg(test)]
        match self.fault {
            Some(Fault::FailMarkClosed) => {
                return Err(StoreError::Fault(format!("closing order {id}")));
            }
            Some(Fault::Stall(pause)) => tokio::time::sleep(pause).await,
            _ => {}
        }
        let order = self
            .working
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("order {id} vanished during settlement")))?;
        order.close(at).map_err(|_| StoreError::OrderClosed(id))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        debug!(decrements = self.decrements, "discarding in-memory settlement");
        Ok(())
    }
}
