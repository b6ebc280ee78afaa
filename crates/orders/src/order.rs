use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brewline_core::{DomainError, DomainResult, Entity, MenuItemId, OrderId, validate_name};

use crate::instructions::SpecialInstructions;

/// Order status lifecycle: open → (updated)* → closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Updated,
    Closed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Updated => "updated",
            OrderStatus::Closed => "closed",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" | "created" => Ok(OrderStatus::Open),
            "updated" => Ok(OrderStatus::Updated),
            "closed" => Ok(OrderStatus::Closed),
            other => Err(DomainError::invariant(format!("unknown order status {other:?}"))),
        }
    }
}

/// A line of an order, with the unit price captured when the order was priced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: MenuItemId,
    pub quantity: u32,
    pub price: f64,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    #[serde(rename = "order_id")]
    id: OrderId,
    customer_name: String,
    status: OrderStatus,
    total_amount: f64,
    special_instructions: SpecialInstructions,
    items: Vec<OrderItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// A freshly priced order in the `open` state.
    pub fn open(id: OrderId, priced: PricedOrder, at: DateTime<Utc>) -> Self {
        Self {
            id,
            customer_name: priced.customer_name,
            status: OrderStatus::Open,
            total_amount: priced.total_amount,
            special_instructions: priced.special_instructions,
            items: priced.items,
            created_at: at,
            updated_at: at,
        }
    }

    /// Rebuild an order from stored state.
    #[allow(clippy::too_many_arguments)]
    pub fn rehydrate(
        id: OrderId,
        customer_name: String,
        status: OrderStatus,
        total_amount: f64,
        special_instructions: SpecialInstructions,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_name,
            status,
            total_amount,
            special_instructions,
            items,
            created_at,
            updated_at,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_amount(&self) -> f64 {
        self.total_amount
    }

    pub fn special_instructions(&self) -> &SpecialInstructions {
        &self.special_instructions
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_closed(&self) -> bool {
        self.status == OrderStatus::Closed
    }

    /// Closed orders are terminal.
    pub fn ensure_open(&self) -> DomainResult<()> {
        if self.is_closed() {
            return Err(DomainError::conflict(format!("order {} is already closed", self.id)));
        }
        Ok(())
    }

    /// Replace items, instructions and total; the order becomes `updated`.
    pub fn revise(&mut self, priced: PricedOrder, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open()?;
        self.customer_name = priced.customer_name;
        self.special_instructions = priced.special_instructions;
        self.items = priced.items;
        self.total_amount = priced.total_amount;
        self.status = OrderStatus::Updated;
        self.updated_at = at;
        Ok(())
    }

    /// Terminal transition; happens exactly once.
    pub fn close(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open()?;
        self.status = OrderStatus::Closed;
        self.updated_at = at;
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A requested line: which product and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: MenuItemId,
    pub quantity: i64,
}

/// Request to create (or fully revise) an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_name: String,
    #[serde(default)]
    pub special_instructions: SpecialInstructions,
    pub items: Vec<OrderLineRequest>,
}

impl NewOrder {
    pub fn validate(&self) -> DomainResult<()> {
        validate_name("customer_name", &self.customer_name)?;
        self.special_instructions.validate()?;

        if self.items.is_empty() {
            return Err(DomainError::validation("an order needs at least one item"));
        }
        for line in &self.items {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity for product {} must be at least 1",
                    line.product_id
                )));
            }
            if u32::try_from(line.quantity).is_err() {
                return Err(DomainError::validation(format!(
                    "quantity for product {} is too large",
                    line.product_id
                )));
            }
        }
        Ok(())
    }

    /// Lines with repeated products merged, in order of first appearance.
    ///
    /// Call after `validate`; quantities that do not fit are clamped.
    pub fn merged_lines(&self) -> Vec<(MenuItemId, u32)> {
        let mut merged: Vec<(MenuItemId, u32)> = Vec::with_capacity(self.items.len());
        for line in &self.items {
            let quantity = u32::try_from(line.quantity.max(0)).unwrap_or(u32::MAX);
            match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, total)) => *total = total.saturating_add(quantity),
                None => merged.push((line.product_id, quantity)),
            }
        }
        merged
    }

    /// Distinct referenced products.
    pub fn product_ids(&self) -> Vec<MenuItemId> {
        self.merged_lines().into_iter().map(|(id, _)| id).collect()
    }

    /// Snapshot current catalog prices into the order.
    ///
    /// On failure returns the first product that has no price in `prices`.
    pub fn price(self, prices: &HashMap<MenuItemId, f64>) -> Result<PricedOrder, MenuItemId> {
        let mut items = Vec::with_capacity(self.items.len());
        for (product_id, quantity) in self.merged_lines() {
            let price = *prices.get(&product_id).ok_or(product_id)?;
            items.push(OrderItem {
                product_id,
                quantity,
                price,
            });
        }
        let total_amount = items.iter().map(OrderItem::line_total).sum();
        Ok(PricedOrder {
            customer_name: self.customer_name,
            special_instructions: self.special_instructions,
            items,
            total_amount,
        })
    }
}

/// An order request with prices resolved and its total computed; ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub customer_name: String,
    pub special_instructions: SpecialInstructions,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(product: i64, quantity: i64) -> OrderLineRequest {
        OrderLineRequest {
            product_id: MenuItemId::new(product),
            quantity,
        }
    }

    fn request(items: Vec<OrderLineRequest>) -> NewOrder {
        NewOrder {
            customer_name: "Alice".to_string(),
            special_instructions: SpecialInstructions::default(),
            items,
        }
    }

    fn prices() -> HashMap<MenuItemId, f64> {
        HashMap::from([(MenuItemId::new(1), 3.5), (MenuItemId::new(2), 2.0)])
    }

    #[test]
    fn pricing_snapshots_prices_and_sums_total() {
        let priced = request(vec![line(1, 2), line(2, 3)]).price(&prices()).unwrap();
        assert_eq!(priced.total_amount, 13.0);
        assert_eq!(priced.items[0].price, 3.5);
        assert_eq!(priced.items[1].quantity, 3);
    }

    #[test]
    fn repeated_products_are_merged() {
        let req = request(vec![line(1, 1), line(2, 1), line(1, 2)]);
        assert_eq!(
            req.merged_lines(),
            vec![(MenuItemId::new(1), 3), (MenuItemId::new(2), 1)]
        );
    }

    #[test]
    fn pricing_reports_unknown_product() {
        let err = request(vec![line(1, 1), line(9, 1)]).price(&prices()).unwrap_err();
        assert_eq!(err, MenuItemId::new(9));
    }

    #[test]
    fn validation_rejects_bad_requests() {
        assert!(request(vec![]).validate().is_err());
        assert!(request(vec![line(1, 0)]).validate().is_err());
        assert!(request(vec![line(1, -2)]).validate().is_err());

        let mut req = request(vec![line(1, 1)]);
        req.customer_name = "A".to_string();
        assert!(req.validate().is_err());

        let mut req = request(vec![line(1, 1)]);
        req.special_instructions = [("size", "large")].into_iter().collect();
        assert!(req.validate().is_err());
    }

    #[test]
    fn close_is_terminal() {
        let priced = request(vec![line(1, 1)]).price(&prices()).unwrap();
        let mut order = Order::open(OrderId::new(1), priced.clone(), test_time());
        order.close(test_time()).unwrap();
        assert_eq!(order.status(), OrderStatus::Closed);

        match order.close(test_time()) {
            Err(DomainError::Conflict(msg)) => assert!(msg.contains("already closed")),
            other => panic!("Expected conflict, got {other:?}"),
        }
        assert!(order.revise(priced, test_time()).is_err());
    }

    #[test]
    fn revise_marks_order_updated() {
        let priced = request(vec![line(1, 1)]).price(&prices()).unwrap();
        let mut order = Order::open(OrderId::new(1), priced, test_time());
        let revised = request(vec![line(2, 4)]).price(&prices()).unwrap();
        order.revise(revised, test_time()).unwrap();
        assert_eq!(order.status(), OrderStatus::Updated);
        assert_eq!(order.total_amount(), 8.0);
        order.close(test_time()).unwrap();
    }

    #[test]
    fn status_parses_legacy_created_alias() {
        assert_eq!("created".parse::<OrderStatus>().unwrap(), OrderStatus::Open);
        assert_eq!(OrderStatus::Closed.to_string(), "closed");
        assert!("pending".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn serializes_with_order_id_key() {
        let priced = request(vec![line(1, 2)]).price(&prices()).unwrap();
        let order = Order::open(OrderId::new(3), priced, test_time());
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["order_id"], 3);
        assert_eq!(json["status"], "open");
        assert_eq!(json["items"][0]["product_id"], 1);
    }
}
