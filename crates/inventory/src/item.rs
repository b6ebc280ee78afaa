use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brewline_core::{DomainError, DomainResult, Entity, IngredientId, validate_name};

/// One row of the inventory ledger: a single ingredient and its stock level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryItem {
    #[serde(rename = "ingredient_id")]
    id: IngredientId,
    name: String,
    quantity: f64,
    unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reorder_threshold: Option<f64>,
    updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Rebuild an item from stored state.
    pub fn rehydrate(
        id: IngredientId,
        name: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        reorder_threshold: Option<f64>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            quantity,
            unit: unit.into(),
            reorder_threshold,
            updated_at,
        }
    }

    /// Build a stored item from a validated draft and its assigned id.
    pub fn from_draft(id: IngredientId, draft: NewInventoryItem, at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            quantity: draft.quantity,
            unit: draft.unit,
            reorder_threshold: draft.reorder_threshold,
            updated_at: at,
        }
    }

    pub fn id_typed(&self) -> IngredientId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn reorder_threshold(&self) -> Option<f64> {
        self.reorder_threshold
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// True when the stock level can cover `required`.
    pub fn can_cover(&self, required: f64) -> bool {
        self.quantity >= required
    }

    /// Low stock: at or below the reorder threshold (inclusive).
    pub fn is_low_stock(&self) -> bool {
        matches!(self.reorder_threshold, Some(threshold) if self.quantity <= threshold)
    }

    /// Deduct `amount` from stock and return the remaining quantity.
    ///
    /// Stock never goes negative; a deduction larger than the current level is
    /// rejected and leaves the item untouched.
    pub fn consume(&mut self, amount: f64, at: DateTime<Utc>) -> DomainResult<f64> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(DomainError::validation(format!(
                "deduction for ingredient {} must be a non-negative number",
                self.id
            )));
        }
        if !self.can_cover(amount) {
            return Err(DomainError::invariant(format!(
                "stock of ingredient {} cannot go negative",
                self.id
            )));
        }
        self.quantity -= amount;
        self.updated_at = at;
        Ok(self.quantity)
    }

    /// Replace the mutable attributes with a validated draft.
    pub fn replace(&mut self, draft: NewInventoryItem, at: DateTime<Utc>) {
        self.name = draft.name;
        self.quantity = draft.quantity;
        self.unit = draft.unit;
        self.reorder_threshold = draft.reorder_threshold;
        self.updated_at = at;
    }
}

impl Entity for InventoryItem {
    type Id = IngredientId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Draft used for both creating and replacing an inventory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub reorder_threshold: Option<f64>,
}

impl NewInventoryItem {
    /// Rules for a brand new row: stock must start positive.
    pub fn validate_for_create(&self) -> DomainResult<()> {
        self.validate_common()?;
        if self.quantity <= 0.0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok(())
    }

    /// Rules for a replacement: stock may be drained to zero but not below.
    pub fn validate_for_update(&self) -> DomainResult<()> {
        self.validate_common()?;
        if self.quantity < 0.0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(())
    }

    fn validate_common(&self) -> DomainResult<()> {
        validate_name("name", &self.name)?;
        if self.unit.trim().is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        if !self.quantity.is_finite() {
            return Err(DomainError::validation("quantity must be a finite number"));
        }
        if let Some(threshold) = self.reorder_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(DomainError::validation(
                    "reorder_threshold must be a non-negative number",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn milk(quantity: f64, threshold: Option<f64>) -> InventoryItem {
        InventoryItem::rehydrate(IngredientId::new(1), "Milk", quantity, "ml", threshold, test_time())
    }

    fn draft(quantity: f64) -> NewInventoryItem {
        NewInventoryItem {
            name: "Whole Milk".to_string(),
            quantity,
            unit: "ml".to_string(),
            reorder_threshold: Some(100.0),
        }
    }

    #[test]
    fn consume_deducts_and_returns_remaining() {
        let mut item = milk(500.0, None);
        let remaining = item.consume(400.0, test_time()).unwrap();
        assert_eq!(remaining, 100.0);
        assert_eq!(item.quantity(), 100.0);
    }

    #[test]
    fn consume_rejects_overdraw_and_leaves_stock_untouched() {
        let mut item = milk(300.0, None);
        let before = item.clone();
        match item.consume(400.0, test_time()) {
            Err(DomainError::InvariantViolation(msg)) => assert!(msg.contains("cannot go negative")),
            other => panic!("Expected invariant violation, got {other:?}"),
        }
        assert_eq!(item, before);
    }

    #[test]
    fn consume_allows_draining_to_zero() {
        let mut item = milk(40.0, Some(0.0));
        assert_eq!(item.consume(40.0, test_time()).unwrap(), 0.0);
        assert!(item.is_low_stock());
    }

    #[test]
    fn no_threshold_never_reports_low_stock() {
        let item = milk(0.0, None);
        assert!(!item.is_low_stock());
    }

    #[test]
    fn create_requires_positive_quantity() {
        assert!(draft(10.0).validate_for_create().is_ok());
        assert!(draft(0.0).validate_for_create().is_err());
        assert!(draft(0.0).validate_for_update().is_ok());
        assert!(draft(-1.0).validate_for_update().is_err());
    }

    #[test]
    fn draft_rejects_blank_unit_and_negative_threshold() {
        let mut d = draft(5.0);
        d.unit = "  ".to_string();
        assert!(d.validate_for_create().is_err());

        let mut d = draft(5.0);
        d.reorder_threshold = Some(-1.0);
        assert!(d.validate_for_create().is_err());
    }

    #[test]
    fn serializes_with_ingredient_id_key() {
        let json = serde_json::to_value(milk(10.0, Some(2.0))).unwrap();
        assert_eq!(json["ingredient_id"], 1);
        assert_eq!(json["reorder_threshold"], 2.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after deducting D from S, low stock fires iff S - D <= T.
        #[test]
        fn low_stock_fires_iff_remaining_at_or_below_threshold(
            stock in 1u32..10_000,
            threshold in 0u32..10_000,
            deduction in 0u32..10_000,
        ) {
            prop_assume!(deduction <= stock);
            let mut item = milk(f64::from(stock), Some(f64::from(threshold)));
            let remaining = item.consume(f64::from(deduction), test_time()).unwrap();
            prop_assert_eq!(item.is_low_stock(), remaining <= f64::from(threshold));
            prop_assert_eq!(item.is_low_stock(), stock - deduction <= threshold);
        }

        /// Property: boundary deductions D = S - T fire, D = S - T - 1 does not.
        #[test]
        fn threshold_boundary(stock in 2u32..10_000, threshold in 0u32..10_000) {
            prop_assume!(threshold + 1 <= stock);
            let at_boundary = f64::from(stock - threshold);
            let mut item = milk(f64::from(stock), Some(f64::from(threshold)));
            item.consume(at_boundary, test_time()).unwrap();
            prop_assert!(item.is_low_stock());

            let just_above = f64::from(stock - threshold - 1);
            let mut item = milk(f64::from(stock), Some(f64::from(threshold)));
            item.consume(just_above, test_time()).unwrap();
            prop_assert!(!item.is_low_stock());
        }
    }
}
