//! Storage and service error types.

use thiserror::Error;

use brewline_core::{DomainError, IngredientId, MenuItemId, OrderId};
use brewline_orders::{SettlementError, Shortfall};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a storage backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Unique or referential constraint violated (duplicate name, row still in use).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A recipe references an inventory row that does not exist.
    #[error("ingredient {0} not found")]
    MissingIngredient(IngredientId),

    /// The order was closed before the write could be applied.
    #[error("order {0} is already closed")]
    OrderClosed(OrderId),

    /// Any other backend failure (connection, deadlock, serialization...).
    #[error("storage error: {0}")]
    Backend(String),

    /// Failure injected by the in-memory backend in tests.
    #[cfg(test)]
    #[error("injected fault: {0}")]
    Fault(String),
}

/// Error taxonomy surfaced by the services.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("order with ID {0} is already closed")]
    AlreadyClosed(OrderId),

    /// Expected business outcome: stock does not cover a settlement.
    #[error("{0}")]
    InsufficientInventory(Shortfall),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage failure, deadlock or deadline; nothing was persisted.
    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl ServiceError {
    pub fn order_not_found(id: OrderId) -> Self {
        Self::NotFound {
            entity: "order",
            id: id.get(),
        }
    }

    pub fn menu_item_not_found(id: MenuItemId) -> Self {
        Self::NotFound {
            entity: "menu item",
            id: id.get(),
        }
    }

    pub fn ingredient_not_found(id: IngredientId) -> Self {
        Self::NotFound {
            entity: "inventory item",
            id: id.get(),
        }
    }

    /// Structural classification used by bulk settlement.
    pub fn is_insufficient_inventory(&self) -> bool {
        matches!(self, ServiceError::InsufficientInventory(_))
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::MissingIngredient(id) => ServiceError::ingredient_not_found(id),
            StoreError::OrderClosed(id) => ServiceError::AlreadyClosed(id),
            StoreError::Backend(msg) => ServiceError::Transaction(msg),
            #[cfg(test)]
            StoreError::Fault(msg) => ServiceError::Transaction(msg),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::InvariantViolation(msg) => ServiceError::Transaction(msg),
        }
    }
}

impl From<SettlementError> for ServiceError {
    fn from(value: SettlementError) -> Self {
        match value {
            SettlementError::MissingRecipe(id) => ServiceError::menu_item_not_found(id),
            SettlementError::MissingIngredient(id) => ServiceError::ingredient_not_found(id),
            SettlementError::Insufficient(shortfall) => ServiceError::InsufficientInventory(shortfall),
        }
    }
}
