//! Settlement planning: from line items and recipes to a per-ingredient
//! consumption plan, checked against stock before anything is written.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;

use brewline_core::{IngredientId, MenuItemId, ValueObject};
use brewline_inventory::InventoryItem;
use brewline_menu::RecipeLine;

use crate::order::{Order, OrderItem};

/// The first ingredient (in ascending id order) that cannot be covered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shortfall {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub required: f64,
    pub available: f64,
}

impl core::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "insufficient inventory for ingredient ID {} (available: {}, required: {})",
            self.ingredient_id, self.available, self.required
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettlementError {
    /// A line item references a product whose recipe could not be loaded.
    #[error("menu item {0} not found")]
    MissingRecipe(MenuItemId),

    /// A recipe references an ingredient that is not in inventory.
    #[error("ingredient {0} not found")]
    MissingIngredient(IngredientId),

    #[error("{0}")]
    Insufficient(Shortfall),
}

/// Total quantity required per ingredient for one settlement.
///
/// Keys are kept in ascending id order; stores lock inventory rows in the same
/// order so concurrent settlements never deadlock on each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionPlan {
    required: BTreeMap<IngredientId, f64>,
}

impl ConsumptionPlan {
    /// Per-unit recipe quantities times the ordered quantity, summed across
    /// every line that uses the same ingredient.
    pub fn build(
        items: &[OrderItem],
        recipes: &HashMap<MenuItemId, Vec<RecipeLine>>,
    ) -> Result<Self, SettlementError> {
        let mut required = BTreeMap::new();
        for item in items {
            let recipe = recipes
                .get(&item.product_id)
                .ok_or(SettlementError::MissingRecipe(item.product_id))?;
            for line in recipe {
                *required.entry(line.ingredient_id).or_insert(0.0) +=
                    line.quantity * f64::from(item.quantity);
            }
        }
        Ok(Self { required })
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    pub fn len(&self) -> usize {
        self.required.len()
    }

    /// Ingredient ids in lock order.
    pub fn ingredient_ids(&self) -> Vec<IngredientId> {
        self.required.keys().copied().collect()
    }

    pub fn required(&self, id: IngredientId) -> Option<f64> {
        self.required.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IngredientId, f64)> + '_ {
        self.required.iter().map(|(id, qty)| (*id, *qty))
    }

    /// Check every requirement against the locked stock rows.
    ///
    /// Nothing is written here; a failure means the whole settlement is refused.
    pub fn verify(&self, stock: &BTreeMap<IngredientId, InventoryItem>) -> Result<(), SettlementError> {
        for (id, required) in self.iter() {
            let item = stock.get(&id).ok_or(SettlementError::MissingIngredient(id))?;
            if !item.can_cover(required) {
                return Err(SettlementError::Insufficient(Shortfall {
                    ingredient_id: id,
                    name: item.name().to_string(),
                    required,
                    available: item.quantity(),
                }));
            }
        }
        Ok(())
    }
}

/// What one settlement consumed from one ingredient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientUsage {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub quantity_used: f64,
    pub remaining: f64,
    pub low_stock: bool,
}

impl IngredientUsage {
    /// Build the record from the row as it stands after the deduction.
    pub fn after_deduction(item: &InventoryItem, quantity_used: f64) -> Self {
        Self {
            ingredient_id: item.id_typed(),
            name: item.name().to_string(),
            quantity_used,
            remaining: item.quantity(),
            low_stock: item.is_low_stock(),
        }
    }
}

impl ValueObject for IngredientUsage {}

/// The closed order plus what closing it consumed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementResult {
    pub order: Order,
    pub inventory_updates: Vec<IngredientUsage>,
}
