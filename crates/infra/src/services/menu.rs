use std::sync::Arc;

use brewline_core::MenuItemId;
use brewline_menu::{MenuItem, NewMenuItem};

use crate::error::ServiceError;
use crate::store::Storage;

#[derive(Debug, Clone)]
pub struct MenuService {
    store: Arc<dyn Storage>,
}

impl MenuService {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Recipe ingredients must already exist in inventory.
    pub async fn create(&self, draft: NewMenuItem) -> Result<MenuItem, ServiceError> {
        draft.validate()?;
        let item = self.store.insert_menu_item(draft).await?;
        tracing::info!(menu_item_id = %item.id_typed(), name = %item.name(), "menu item created");
        Ok(item)
    }

    pub async fn list(&self) -> Result<Vec<MenuItem>, ServiceError> {
        Ok(self.store.list_menu_items().await?)
    }

    pub async fn get(&self, id: MenuItemId) -> Result<MenuItem, ServiceError> {
        self.store
            .get_menu_item(id)
            .await?
            .ok_or_else(|| ServiceError::menu_item_not_found(id))
    }

    /// Full replacement. Orders placed earlier keep their snapshotted prices.
    pub async fn update(&self, id: MenuItemId, draft: NewMenuItem) -> Result<MenuItem, ServiceError> {
        draft.validate()?;
        self.store
            .update_menu_item(id, draft)
            .await?
            .ok_or_else(|| ServiceError::menu_item_not_found(id))
    }

    pub async fn delete(&self, id: MenuItemId) -> Result<(), ServiceError> {
        if !self.store.delete_menu_item(id).await? {
            return Err(ServiceError::menu_item_not_found(id));
        }
        tracing::info!(menu_item_id = %id, "menu item deleted");
        Ok(())
    }
}
