//! Postgres-backed storage implementation.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |-----------------------|------------|----------|
//! | `23505` unique violation | `Conflict` | Duplicate inventory or menu item name |
//! | `23503` foreign key violation | `Conflict` | Deleting a row that is still referenced |
//! | `23514` check violation | `Conflict` | A write would drive stock negative |
//! | Any other | `Backend` | Deadlock, connection failure, pool closed... |
//!
//! ## Settlement locking
//!
//! A settlement locks its order row `FOR UPDATE`, then the inventory rows it
//! needs `ORDER BY id FOR UPDATE`. Every settlement acquires inventory locks in
//! ascending id order, so two settlements over overlapping ingredients queue
//! behind each other instead of deadlocking.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool, Postgres, Row, Transaction};
use tracing::{Span, field, instrument};

use brewline_core::{IngredientId, MenuItemId, OrderId};
use brewline_inventory::{InventoryItem, Leftover, LeftoverPage, LeftoverSort, NewInventoryItem, PageRequest};
use brewline_menu::{MenuItem, NewMenuItem, RecipeLine};
use brewline_orders::{Order, OrderItem, OrderStatus, PricedOrder, SpecialInstructions};

use super::{InventoryStore, MenuStore, OrderStore, ReportStore, SettlementStore, SettlementTx};
use crate::error::{StoreError, StoreResult};
use crate::reports::{DateRange, MenuMatch, OrderMatch, OrderedLine, PopularItem, SearchQuery};

/// Postgres-backed store for every repository trait.
///
/// Owns an explicitly constructed connection pool; cloning the store shares it.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    /// Create a new PgStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    #[instrument(skip(self, draft), fields(name = %draft.name), err)]
    async fn insert_inventory(&self, draft: NewInventoryItem) -> StoreResult<InventoryItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO inventory (name, quantity, unit, reorder_threshold, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, name, quantity, unit, reorder_threshold, updated_at
            "#,
        )
        .bind(&draft.name)
        .bind(draft.quantity)
        .bind(&draft.unit)
        .bind(draft.reorder_threshold)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("inventory item with this name already exists".to_string())
            } else {
                map_sqlx_error("insert_inventory", e)
            }
        })?;

        Ok(InventoryRow::from_row(&row).map_err(decode_error)?.into())
    }

    async fn list_inventory(&self) -> StoreResult<Vec<InventoryItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, quantity, unit, reorder_threshold, updated_at
            FROM inventory
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_inventory", e))?;

        rows.iter()
            .map(|row| Ok(InventoryRow::from_row(row).map_err(decode_error)?.into()))
            .collect()
    }

    async fn get_inventory(&self, id: IngredientId) -> StoreResult<Option<InventoryItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, quantity, unit, reorder_threshold, updated_at
            FROM inventory
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_inventory", e))?;

        row.map(|row| Ok(InventoryRow::from_row(&row).map_err(decode_error)?.into()))
            .transpose()
    }

    #[instrument(skip(self, draft), fields(ingredient_id = %id), err)]
    async fn update_inventory(
        &self,
        id: IngredientId,
        draft: NewInventoryItem,
    ) -> StoreResult<Option<InventoryItem>> {
        let row = sqlx::query(
            r#"
            UPDATE inventory
            SET name = $2, quantity = $3, unit = $4, reorder_threshold = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, quantity, unit, reorder_threshold, updated_at
            "#,
        )
        .bind(id.get())
        .bind(&draft.name)
        .bind(draft.quantity)
        .bind(&draft.unit)
        .bind(draft.reorder_threshold)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("inventory item with this name already exists".to_string())
            } else {
                map_sqlx_error("update_inventory", e)
            }
        })?;

        row.map(|row| Ok(InventoryRow::from_row(&row).map_err(decode_error)?.into()))
            .transpose()
    }

    #[instrument(skip(self), fields(ingredient_id = %id), err)]
    async fn delete_inventory(&self, id: IngredientId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM inventory WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::Conflict(format!("inventory item {id} is used by a menu item"))
                } else {
                    map_sqlx_error("delete_inventory", e)
                }
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn leftovers(&self, sort: LeftoverSort, page: PageRequest) -> StoreResult<LeftoverPage> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM inventory")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_inventory", e))?
            .try_get("total")
            .map_err(decode_error)?;

        let sql = match sort {
            LeftoverSort::Quantity => {
                "SELECT name, quantity FROM inventory ORDER BY quantity DESC, name ASC LIMIT $1 OFFSET $2"
            }
            LeftoverSort::Name => "SELECT name, quantity FROM inventory ORDER BY name ASC LIMIT $1 OFFSET $2",
        };
        let rows = sqlx::query(sql)
            .bind(i64::from(page.page_size()))
            .bind(page.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("leftovers", e))?;

        let data = rows
            .iter()
            .map(|row| {
                Ok(Leftover {
                    name: row.try_get("name").map_err(decode_error)?,
                    quantity: row.try_get("quantity").map_err(decode_error)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(LeftoverPage::new(page, total.max(0) as u64, data))
    }
}

#[async_trait]
impl MenuStore for PgStore {
    #[instrument(skip(self, draft), fields(name = %draft.name, menu_item_id = field::Empty), err)]
    async fn insert_menu_item(&self, draft: NewMenuItem) -> StoreResult<MenuItem> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        ensure_ingredients_exist(&mut tx, &draft).await?;

        let row = sqlx::query(
            r#"
            INSERT INTO menu_items (name, description, price, categories, available)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, price, categories, available, created_at, updated_at
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(&draft.categories)
        .bind(draft.available)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("menu item with this name already exists".to_string())
            } else {
                map_sqlx_error("insert_menu_item", e)
            }
        })?;
        let menu_row = MenuRow::from_row(&row).map_err(decode_error)?;

        insert_recipe(&mut tx, menu_row.id, &draft.ingredients).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("menu_item_id", menu_row.id);
        Ok(menu_row.into_menu_item(draft.ingredients))
    }

    async fn list_menu_items(&self) -> StoreResult<Vec<MenuItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price, categories, available, created_at, updated_at
            FROM menu_items
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_menu_items", e))?;

        let menu_rows = rows
            .iter()
            .map(|row| MenuRow::from_row(row).map_err(decode_error))
            .collect::<StoreResult<Vec<_>>>()?;
        let ids: Vec<i64> = menu_rows.iter().map(|m| m.id).collect();
        let mut recipes = load_recipes(&*self.pool, &ids).await?;

        Ok(menu_rows
            .into_iter()
            .map(|m| {
                let lines = recipes.remove(&m.id).unwrap_or_default();
                m.into_menu_item(lines)
            })
            .collect())
    }

    async fn get_menu_item(&self, id: MenuItemId) -> StoreResult<Option<MenuItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price, categories, available, created_at, updated_at
            FROM menu_items
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_menu_item", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let menu_row = MenuRow::from_row(&row).map_err(decode_error)?;
        let mut recipes = load_recipes(&*self.pool, &[menu_row.id]).await?;
        let lines = recipes.remove(&menu_row.id).unwrap_or_default();
        Ok(Some(menu_row.into_menu_item(lines)))
    }

    #[instrument(skip(self, draft), fields(menu_item_id = %id), err)]
    async fn update_menu_item(&self, id: MenuItemId, draft: NewMenuItem) -> StoreResult<Option<MenuItem>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            r#"
            UPDATE menu_items
            SET name = $2, description = $3, price = $4, categories = $5, available = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, price, categories, available, created_at, updated_at
            "#,
        )
        .bind(id.get())
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(&draft.categories)
        .bind(draft.available)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("menu item with this name already exists".to_string())
            } else {
                map_sqlx_error("update_menu_item", e)
            }
        })?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        };
        let menu_row = MenuRow::from_row(&row).map_err(decode_error)?;

        ensure_ingredients_exist(&mut tx, &draft).await?;

        sqlx::query("DELETE FROM menu_item_ingredients WHERE menu_item_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_recipe", e))?;
        insert_recipe(&mut tx, menu_row.id, &draft.ingredients).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Some(menu_row.into_menu_item(draft.ingredients)))
    }

    #[instrument(skip(self), fields(menu_item_id = %id), err)]
    async fn delete_menu_item(&self, id: MenuItemId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::Conflict(format!("menu item {id} is referenced by existing orders"))
                } else {
                    map_sqlx_error("delete_menu_item", e)
                }
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn menu_prices(&self, ids: &[MenuItemId]) -> StoreResult<HashMap<MenuItemId, f64>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query("SELECT id, price FROM menu_items WHERE id = ANY($1)")
            .bind(&raw)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("menu_prices", e))?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(decode_error)?;
                let price: f64 = row.try_get("price").map_err(decode_error)?;
                Ok((MenuItemId::new(id), price))
            })
            .collect()
    }
}

#[async_trait]
impl OrderStore for PgStore {
    #[instrument(skip(self, order), fields(customer = %order.customer_name, order_id = field::Empty), err)]
    async fn insert_order(&self, order: PricedOrder) -> StoreResult<Order> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (customer_name, status, total_amount, special_instructions)
            VALUES ($1, 'open', $2, $3)
            RETURNING id, customer_name, status, total_amount, special_instructions, created_at, updated_at
            "#,
        )
        .bind(&order.customer_name)
        .bind(order.total_amount)
        .bind(Json(&order.special_instructions))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        let order_row = OrderRow::from_row(&row).map_err(decode_error)?;

        insert_order_items(&mut tx, order_row.id, &order.items).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("order_id", order_row.id);
        order_row.into_order(order.items)
    }

    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer_name, status, total_amount, special_instructions, created_at, updated_at
            FROM orders
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        let order_rows = rows
            .iter()
            .map(|row| OrderRow::from_row(row).map_err(decode_error))
            .collect::<StoreResult<Vec<_>>>()?;
        let ids: Vec<i64> = order_rows.iter().map(|o| o.id).collect();
        let mut items = load_order_items(&*self.pool, &ids).await?;

        order_rows
            .into_iter()
            .map(|o| {
                let lines = items.remove(&o.id).unwrap_or_default();
                o.into_order(lines)
            })
            .collect()
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire_connection", e))?;
        fetch_order(&mut conn, id, false).await
    }

    #[instrument(skip(self, order), fields(order_id = %id), err)]
    async fn update_order(&self, id: OrderId, order: PricedOrder) -> StoreResult<Option<Order>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_order", e))?;

        match status.as_deref() {
            None => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Ok(None);
            }
            Some("closed") => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::OrderClosed(id));
            }
            Some(_) => {}
        }

        let row = sqlx::query(
            r#"
            UPDATE orders
            SET customer_name = $2, special_instructions = $3, total_amount = $4,
                status = 'updated', updated_at = NOW()
            WHERE id = $1
            RETURNING id, customer_name, status, total_amount, special_instructions, created_at, updated_at
            "#,
        )
        .bind(id.get())
        .bind(&order.customer_name)
        .bind(Json(&order.special_instructions))
        .bind(order.total_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;
        let order_row = OrderRow::from_row(&row).map_err(decode_error)?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order_items", e))?;
        insert_order_items(&mut tx, order_row.id, &order.items).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        order_row.into_order(order.items).map(Some)
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn delete_order(&self, id: OrderId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn total_sales(&self) -> StoreResult<f64> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_amount), 0)::DOUBLE PRECISION
            FROM orders
            WHERE status = 'closed'
            "#,
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("total_sales", e))
    }

    async fn popular_items(&self, limit: u32) -> StoreResult<Vec<PopularItem>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.name, SUM(oi.quantity)::BIGINT AS quantity_sold
            FROM menu_items m
            JOIN order_items oi ON oi.menu_item_id = m.id
            GROUP BY m.id, m.name
            ORDER BY quantity_sold DESC, m.id ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("popular_items", e))?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(decode_error)?;
                let sold: i64 = row.try_get("quantity_sold").map_err(decode_error)?;
                Ok(PopularItem {
                    product_id: MenuItemId::new(id),
                    name: row.try_get("name").map_err(decode_error)?,
                    quantity_sold: sold.max(0) as u64,
                })
            })
            .collect()
    }

    async fn ordered_lines(&self, range: DateRange) -> StoreResult<Vec<OrderedLine>> {
        let rows = sqlx::query(
            r#"
            SELECT m.name, oi.quantity, o.created_at
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN menu_items m ON m.id = oi.menu_item_id
            WHERE o.created_at >= $1 AND o.created_at < $2
            ORDER BY o.created_at ASC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ordered_lines", e))?;

        rows.iter()
            .map(|row| {
                let quantity: i64 = row.try_get("quantity").map_err(decode_error)?;
                Ok(OrderedLine {
                    name: row.try_get("name").map_err(decode_error)?,
                    quantity: quantity.max(0) as u64,
                    ordered_at: row.try_get("created_at").map_err(decode_error)?,
                })
            })
            .collect()
    }

    async fn search_menu(&self, query: &SearchQuery) -> StoreResult<Vec<MenuMatch>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price
            FROM menu_items
            WHERE (name ILIKE ANY($1) OR description ILIKE ANY($1))
              AND price BETWEEN $2 AND $3
            ORDER BY id ASC
            "#,
        )
        .bind(like_patterns(query))
        .bind(query.min_price)
        .bind(query.max_price)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_menu", e))?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(decode_error)?;
                Ok(MenuMatch {
                    id: MenuItemId::new(id),
                    name: row.try_get("name").map_err(decode_error)?,
                    description: row.try_get("description").map_err(decode_error)?,
                    price: row.try_get("price").map_err(decode_error)?,
                })
            })
            .collect()
    }

    async fn search_orders(&self, query: &SearchQuery) -> StoreResult<Vec<OrderMatch>> {
        let rows = sqlx::query(
            r#"
            SELECT o.id, o.customer_name, o.total_amount, ARRAY_AGG(m.name ORDER BY m.name) AS items
            FROM orders o
            JOIN order_items oi ON oi.order_id = o.id
            JOIN menu_items m ON m.id = oi.menu_item_id
            WHERE o.total_amount BETWEEN $2 AND $3
            GROUP BY o.id
            HAVING o.customer_name ILIKE ANY($1) OR BOOL_OR(m.name ILIKE ANY($1))
            ORDER BY o.id ASC
            "#,
        )
        .bind(like_patterns(query))
        .bind(query.min_price)
        .bind(query.max_price)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_orders", e))?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(decode_error)?;
                Ok(OrderMatch {
                    id: OrderId::new(id),
                    customer_name: row.try_get("customer_name").map_err(decode_error)?,
                    items: row.try_get("items").map_err(decode_error)?,
                    total: row.try_get("total_amount").map_err(decode_error)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SettlementStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn SettlementTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_settlement", e))?;
        Ok(Box::new(PgSettlementTx { tx }))
    }
}

/// A settlement running inside one database transaction. Dropping it without
/// commit rolls the transaction back.
struct PgSettlementTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SettlementTx for PgSettlementTx {
    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        fetch_order(&mut *self.tx, id, true).await
    }

    async fn recipes(&mut self, products: &[MenuItemId]) -> StoreResult<HashMap<MenuItemId, Vec<RecipeLine>>> {
        let ids: Vec<i64> = products.iter().map(|id| id.get()).collect();
        let recipes = load_recipes(&mut *self.tx, &ids).await?;
        Ok(recipes
            .into_iter()
            .map(|(id, lines)| (MenuItemId::new(id), lines))
            .collect())
    }

    async fn lock_inventory(
        &mut self,
        ids: &[IngredientId],
    ) -> StoreResult<BTreeMap<IngredientId, InventoryItem>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, name, quantity, unit, reorder_threshold, updated_at
            FROM inventory
            WHERE id = ANY($1)
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(&raw)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_inventory", e))?;

        rows.iter()
            .map(|row| {
                let item: InventoryItem = InventoryRow::from_row(row).map_err(decode_error)?.into();
                Ok((item.id_typed(), item))
            })
            .collect()
    }

    async fn decrement_stock(&mut self, id: IngredientId, amount: f64) -> StoreResult<InventoryItem> {
        let row = sqlx::query(
            r#"
            UPDATE inventory
            SET quantity = quantity - $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, quantity, unit, reorder_threshold, updated_at
            "#,
        )
        .bind(id.get())
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_stock", e))?
        .ok_or(StoreError::MissingIngredient(id))?;

        Ok(InventoryRow::from_row(&row).map_err(decode_error)?.into())
    }

    async fn mark_closed(&mut self, id: OrderId, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'closed', updated_at = $2
            WHERE id = $1 AND status <> 'closed'
            "#,
        )
        .bind(id.get())
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("mark_closed", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderClosed(id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_settlement", e))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_settlement", e))
    }
}

// Shared query helpers (usable with the pool or inside a transaction)

async fn fetch_order(conn: &mut PgConnection, id: OrderId, for_update: bool) -> StoreResult<Option<Order>> {
    let sql = if for_update {
        r#"
        SELECT id, customer_name, status, total_amount, special_instructions, created_at, updated_at
        FROM orders
        WHERE id = $1
        FOR UPDATE
        "#
    } else {
        r#"
        SELECT id, customer_name, status, total_amount, special_instructions, created_at, updated_at
        FROM orders
        WHERE id = $1
        "#
    };
    let row = sqlx::query(sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("fetch_order", e))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let order_row = OrderRow::from_row(&row).map_err(decode_error)?;
    let mut items = load_order_items(&mut *conn, &[order_row.id]).await?;
    let lines = items.remove(&order_row.id).unwrap_or_default();
    order_row.into_order(lines).map(Some)
}

async fn load_order_items<'e, E>(executor: E, order_ids: &[i64]) -> StoreResult<HashMap<i64, Vec<OrderItem>>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT order_id, menu_item_id, quantity, price
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id ASC, menu_item_id ASC
        "#,
    )
    .bind(order_ids)
    .fetch_all(executor)
    .await
    .map_err(|e| map_sqlx_error("load_order_items", e))?;

    let mut grouped: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for row in &rows {
        let order_id: i64 = row.try_get("order_id").map_err(decode_error)?;
        let product: i64 = row.try_get("menu_item_id").map_err(decode_error)?;
        let quantity: i64 = row.try_get("quantity").map_err(decode_error)?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| StoreError::Backend(format!("order {order_id} has an invalid quantity {quantity}")))?;
        grouped.entry(order_id).or_default().push(OrderItem {
            product_id: MenuItemId::new(product),
            quantity,
            price: row.try_get("price").map_err(decode_error)?,
        });
    }
    Ok(grouped)
}

async fn load_recipes<'e, E>(executor: E, menu_item_ids: &[i64]) -> StoreResult<HashMap<i64, Vec<RecipeLine>>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT menu_item_id, ingredient_id, quantity
        FROM menu_item_ingredients
        WHERE menu_item_id = ANY($1)
        ORDER BY menu_item_id ASC, position ASC
        "#,
    )
    .bind(menu_item_ids)
    .fetch_all(executor)
    .await
    .map_err(|e| map_sqlx_error("load_recipes", e))?;

    let mut grouped: HashMap<i64, Vec<RecipeLine>> = HashMap::new();
    for row in &rows {
        let menu_item_id: i64 = row.try_get("menu_item_id").map_err(decode_error)?;
        let ingredient_id: i64 = row.try_get("ingredient_id").map_err(decode_error)?;
        grouped.entry(menu_item_id).or_default().push(RecipeLine {
            ingredient_id: IngredientId::new(ingredient_id),
            quantity: row.try_get("quantity").map_err(decode_error)?,
        });
    }
    Ok(grouped)
}

/// Locks the referenced inventory rows `FOR SHARE` so they cannot be deleted
/// before the recipe rows referencing them are written.
async fn ensure_ingredients_exist(conn: &mut PgConnection, draft: &NewMenuItem) -> StoreResult<()> {
    let wanted: Vec<i64> = draft.ingredient_ids().iter().map(|id| id.get()).collect();
    let found: Vec<i64> = sqlx::query_scalar("SELECT id FROM inventory WHERE id = ANY($1) FOR SHARE")
        .bind(&wanted)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("check_ingredients", e))?;

    let found: HashSet<i64> = found.into_iter().collect();
    match wanted.into_iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(StoreError::MissingIngredient(IngredientId::new(missing))),
        None => Ok(()),
    }
}

async fn insert_recipe(conn: &mut PgConnection, menu_item_id: i64, lines: &[RecipeLine]) -> StoreResult<()> {
    for (position, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO menu_item_ingredients (menu_item_id, ingredient_id, quantity, position)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(menu_item_id)
        .bind(line.ingredient_id.get())
        .bind(line.quantity)
        .bind(position as i32)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::MissingIngredient(line.ingredient_id)
            } else {
                map_sqlx_error("insert_recipe", e)
            }
        })?;
    }
    Ok(())
}

async fn insert_order_items(conn: &mut PgConnection, order_id: i64, items: &[OrderItem]) -> StoreResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, menu_item_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(item.product_id.get())
        .bind(i64::from(item.quantity))
        .bind(item.price)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_order_items", e))?;
    }
    Ok(())
}

/// `%term%` patterns for `ILIKE ANY`, with LIKE wildcards in the terms escaped.
fn like_patterns(query: &SearchQuery) -> Vec<String> {
    query
        .terms
        .iter()
        .map(|term| {
            let escaped = term
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
        .collect()
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {}", err))
}

fn has_code(err: &sqlx::Error, wanted: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == wanted;
        }
    }
    false
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_code(err, "23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_code(err, "23503")
}

// SQLx row types

#[derive(Debug)]
struct InventoryRow {
    id: i64,
    name: String,
    quantity: f64,
    unit: String,
    reorder_threshold: Option<f64>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for InventoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(InventoryRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            unit: row.try_get("unit")?,
            reorder_threshold: row.try_get("reorder_threshold")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<InventoryRow> for InventoryItem {
    fn from(row: InventoryRow) -> Self {
        InventoryItem::rehydrate(
            IngredientId::new(row.id),
            row.name,
            row.quantity,
            row.unit,
            row.reorder_threshold,
            row.updated_at,
        )
    }
}

#[derive(Debug)]
struct MenuRow {
    id: i64,
    name: String,
    description: String,
    price: f64,
    categories: Vec<String>,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MenuRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MenuRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            categories: row.try_get("categories")?,
            available: row.try_get("available")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl MenuRow {
    fn into_menu_item(self, ingredients: Vec<RecipeLine>) -> MenuItem {
        MenuItem::rehydrate(
            MenuItemId::new(self.id),
            self.name,
            self.description,
            self.price,
            self.categories,
            ingredients,
            self.available,
            self.created_at,
            self.updated_at,
        )
    }
}

#[derive(Debug)]
struct OrderRow {
    id: i64,
    customer_name: String,
    status: String,
    total_amount: f64,
    special_instructions: Json<SpecialInstructions>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            customer_name: row.try_get("customer_name")?,
            status: row.try_get("status")?,
            total_amount: row.try_get("total_amount")?,
            special_instructions: row.try_get("special_instructions")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> StoreResult<Order> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|e| StoreError::Backend(format!("order {}: {}", self.id, e)))?;
        Ok(Order::rehydrate(
            OrderId::new(self.id),
            self.customer_name,
            status,
            self.total_amount,
            self.special_instructions.0,
            items,
            self.created_at,
            self.updated_at,
        ))
    }
}
