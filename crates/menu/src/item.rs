use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brewline_core::{
    DomainError, DomainResult, Entity, IngredientId, MenuItemId, ValueObject, validate_name,
};

pub const MAX_PRICE: f64 = 1_000_000.0;
pub const MAX_INGREDIENTS: usize = 50;
pub const MAX_QUANTITY_PER_UNIT: f64 = 1000.0;
const DESCRIPTION_LEN: core::ops::RangeInclusive<usize> = 10..=500;

/// One ingredient of a recipe and the amount consumed per unit sold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub ingredient_id: IngredientId,
    pub quantity: f64,
}

impl ValueObject for RecipeLine {}

/// Aggregate root: MenuItem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuItem {
    #[serde(rename = "product_id")]
    id: MenuItemId,
    name: String,
    description: String,
    price: f64,
    categories: Vec<String>,
    ingredients: Vec<RecipeLine>,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MenuItem {
    /// Build a stored item from a validated draft and its assigned id.
    pub fn from_draft(id: MenuItemId, draft: NewMenuItem, at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            price: draft.price,
            categories: draft.categories,
            ingredients: draft.ingredients,
            available: draft.available,
            created_at: at,
            updated_at: at,
        }
    }

    /// Rebuild an item from stored state.
    #[allow(clippy::too_many_arguments)]
    pub fn rehydrate(
        id: MenuItemId,
        name: String,
        description: String,
        price: f64,
        categories: Vec<String>,
        ingredients: Vec<RecipeLine>,
        available: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            price,
            categories,
            ingredients,
            available,
            created_at,
            updated_at,
        }
    }

    pub fn id_typed(&self) -> MenuItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// The recipe, in the order it was defined.
    pub fn ingredients(&self) -> &[RecipeLine] {
        &self.ingredients
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replace every mutable attribute, keeping identity and creation time.
    pub fn replace(&mut self, draft: NewMenuItem, at: DateTime<Utc>) {
        self.name = draft.name;
        self.description = draft.description;
        self.price = draft.price;
        self.categories = draft.categories;
        self.ingredients = draft.ingredients;
        self.available = draft.available;
        self.updated_at = at;
    }
}

impl Entity for MenuItem {
    type Id = MenuItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn default_available() -> bool {
    true
}

/// Draft used for both creating and replacing a menu item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMenuItem {
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub categories: Vec<String>,
    pub ingredients: Vec<RecipeLine>,
    #[serde(default = "default_available")]
    pub available: bool,
}

impl NewMenuItem {
    /// Checks everything that can be checked without storage. Whether every
    /// ingredient exists in inventory is verified by the store.
    pub fn validate(&self) -> DomainResult<()> {
        validate_name("name", &self.name)?;
        validate_description(&self.description)?;

        if !self.price.is_finite() || self.price <= 0.0 || self.price > MAX_PRICE {
            return Err(DomainError::validation(format!(
                "price must be greater than 0 and at most {MAX_PRICE}"
            )));
        }

        if self.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(DomainError::validation("categories cannot contain blank entries"));
        }

        validate_recipe(&self.ingredients)
    }

    pub fn ingredient_ids(&self) -> Vec<IngredientId> {
        self.ingredients.iter().map(|line| line.ingredient_id).collect()
    }
}

fn validate_description(description: &str) -> DomainResult<()> {
    let len = description.chars().count();
    if !DESCRIPTION_LEN.contains(&len) {
        return Err(DomainError::validation(format!(
            "description must be between {} and {} characters",
            DESCRIPTION_LEN.start(),
            DESCRIPTION_LEN.end()
        )));
    }
    if contains_markup(description) {
        return Err(DomainError::validation("description cannot contain HTML tags"));
    }
    Ok(())
}

/// Something shaped like `<tag ...>`, `</tag>` or `<!...>`.
fn contains_markup(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(i, b)| {
        *b == b'<'
            && bytes
                .get(i + 1)
                .is_some_and(|next| next.is_ascii_alphabetic() || *next == b'/' || *next == b'!')
            && bytes[i + 1..].contains(&b'>')
    })
}

fn validate_recipe(lines: &[RecipeLine]) -> DomainResult<()> {
    if lines.is_empty() {
        return Err(DomainError::validation("at least one ingredient is required"));
    }
    if lines.len() > MAX_INGREDIENTS {
        return Err(DomainError::validation(format!(
            "a menu item can have at most {MAX_INGREDIENTS} ingredients"
        )));
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if line.ingredient_id.get() <= 0 {
            return Err(DomainError::validation(format!(
                "invalid ingredient id {}",
                line.ingredient_id
            )));
        }
        if !seen.insert(line.ingredient_id) {
            return Err(DomainError::validation(format!(
                "duplicate ingredient id {}",
                line.ingredient_id
            )));
        }
        if !line.quantity.is_finite()
            || line.quantity <= 0.0
            || line.quantity > MAX_QUANTITY_PER_UNIT
        {
            return Err(DomainError::validation(format!(
                "quantity for ingredient {} must be greater than 0 and at most {MAX_QUANTITY_PER_UNIT}",
                line.ingredient_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(id: i64, quantity: f64) -> RecipeLine {
        RecipeLine {
            ingredient_id: IngredientId::new(id),
            quantity,
        }
    }

    fn latte() -> NewMenuItem {
        NewMenuItem {
            name: "Latte".to_string(),
            description: "Espresso with steamed milk".to_string(),
            price: 3.5,
            categories: vec!["coffee".to_string()],
            ingredients: vec![line(1, 200.0), line(2, 18.0)],
            available: true,
        }
    }

    fn expect_validation(draft: &NewMenuItem, needle: &str) {
        match draft.validate() {
            Err(DomainError::Validation(msg)) => {
                assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}")
            }
            other => panic!("Expected validation error mentioning {needle:?}, got {other:?}"),
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert!(latte().validate().is_ok());
    }

    #[test]
    fn rejects_price_out_of_range() {
        for price in [0.0, -1.0, MAX_PRICE + 0.01, f64::NAN] {
            let mut d = latte();
            d.price = price;
            expect_validation(&d, "price");
        }
    }

    #[test]
    fn rejects_short_description_and_markup() {
        let mut d = latte();
        d.description = "short".to_string();
        expect_validation(&d, "description must be between");

        let mut d = latte();
        d.description = "Espresso <b>with</b> milk".to_string();
        expect_validation(&d, "HTML");
    }

    #[test]
    fn comparison_signs_are_not_markup() {
        let mut d = latte();
        d.description = "Sweetness < 5 and bitterness > 2".to_string();
        assert!(d.validate().is_ok());
    }

    #[test]
    fn rejects_bad_recipes() {
        let mut d = latte();
        d.ingredients.clear();
        expect_validation(&d, "at least one ingredient");

        let mut d = latte();
        d.ingredients = vec![line(1, 10.0), line(1, 5.0)];
        expect_validation(&d, "duplicate ingredient");

        let mut d = latte();
        d.ingredients = vec![line(0, 10.0)];
        expect_validation(&d, "invalid ingredient id");

        let mut d = latte();
        d.ingredients = vec![line(1, 1000.5)];
        expect_validation(&d, "quantity for ingredient 1");

        let mut d = latte();
        d.ingredients = (1..=51).map(|id| line(id, 1.0)).collect();
        expect_validation(&d, "at most 50");
    }

    #[test]
    fn replace_keeps_identity() {
        let at = Utc::now();
        let mut item = MenuItem::from_draft(MenuItemId::new(7), latte(), at);
        let mut d = latte();
        d.price = 4.0;
        item.replace(d, Utc::now());
        assert_eq!(item.id(), MenuItemId::new(7));
        assert_eq!(item.price(), 4.0);
        assert_eq!(item.created_at(), at);
    }

    #[test]
    fn deserializes_with_defaults() {
        let d: NewMenuItem = serde_json::from_value(serde_json::json!({
            "name": "Flat White",
            "description": "Ristretto with microfoam",
            "price": 4.2,
            "ingredients": [{"ingredient_id": 1, "quantity": 150.0}]
        }))
        .unwrap();
        assert!(d.available);
        assert!(d.categories.is_empty());
        assert!(d.validate().is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: distinct positive ids with in-range quantities always validate.
        #[test]
        fn distinct_in_range_recipes_validate(
            ids in prop::collection::btree_set(1i64..10_000, 1..MAX_INGREDIENTS),
            quantity in 0.001f64..=MAX_QUANTITY_PER_UNIT,
        ) {
            let mut d = latte();
            d.ingredients = ids.into_iter().map(|id| line(id, quantity)).collect();
            prop_assert!(d.validate().is_ok());
        }
    }
}
