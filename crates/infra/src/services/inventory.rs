use std::sync::Arc;

use brewline_core::IngredientId;
use brewline_inventory::{InventoryItem, LeftoverPage, LeftoverSort, NewInventoryItem, PageRequest};

use crate::error::ServiceError;
use crate::store::Storage;

/// Direct CRUD over the inventory ledger. Stock consumption goes through the
/// settlement engine instead.
#[derive(Debug, Clone)]
pub struct InventoryService {
    store: Arc<dyn Storage>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub async fn create(&self, draft: NewInventoryItem) -> Result<InventoryItem, ServiceError> {
        draft.validate_for_create()?;
        let item = self.store.insert_inventory(draft).await?;
        tracing::info!(ingredient_id = %item.id_typed(), name = %item.name(), "inventory item created");
        Ok(item)
    }

    pub async fn list(&self) -> Result<Vec<InventoryItem>, ServiceError> {
        Ok(self.store.list_inventory().await?)
    }

    pub async fn get(&self, id: IngredientId) -> Result<InventoryItem, ServiceError> {
        self.store
            .get_inventory(id)
            .await?
            .ok_or_else(|| ServiceError::ingredient_not_found(id))
    }

    pub async fn update(&self, id: IngredientId, draft: NewInventoryItem) -> Result<InventoryItem, ServiceError> {
        draft.validate_for_update()?;
        self.store
            .update_inventory(id, draft)
            .await?
            .ok_or_else(|| ServiceError::ingredient_not_found(id))
    }

    pub async fn delete(&self, id: IngredientId) -> Result<(), ServiceError> {
        if !self.store.delete_inventory(id).await? {
            return Err(ServiceError::ingredient_not_found(id));
        }
        tracing::info!(ingredient_id = %id, "inventory item deleted");
        Ok(())
    }

    pub async fn leftovers(&self, sort: LeftoverSort, page: PageRequest) -> Result<LeftoverPage, ServiceError> {
        Ok(self.store.leftovers(sort, page).await?)
    }
}
