//! Response projection for bulk settlement: per-order outcomes plus a summary.

use serde::Serialize;

use brewline_core::OrderId;

use crate::order::Order;
use crate::settlement::IngredientUsage;

pub const REASON_INSUFFICIENT_INVENTORY: &str = "insufficient_inventory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOutcome {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedOrder {
    pub order_id: OrderId,
    pub customer_name: String,
    pub status: BulkOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkSummary {
    pub total_orders: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub total_revenue: f64,
    pub inventory_updates: Vec<IngredientUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkOrderResponse {
    pub processed_orders: Vec<ProcessedOrder>,
    pub summary: BulkSummary,
}

impl BulkOrderResponse {
    pub fn new(total_orders: usize) -> Self {
        Self {
            processed_orders: Vec::with_capacity(total_orders),
            summary: BulkSummary {
                total_orders,
                ..BulkSummary::default()
            },
        }
    }

    /// Record a settled order; its usage is appended as-is (no merging).
    pub fn accept(&mut self, order: &Order, usage: Vec<IngredientUsage>) {
        self.processed_orders.push(ProcessedOrder {
            order_id: order.id_typed(),
            customer_name: order.customer_name().to_string(),
            status: BulkOutcome::Accepted,
            total: Some(order.total_amount()),
            reason: None,
        });
        self.summary.accepted += 1;
        self.summary.total_revenue += order.total_amount();
        self.summary.inventory_updates.extend(usage);
    }

    pub fn reject(&mut self, order: &Order, reason: &str) {
        self.processed_orders.push(ProcessedOrder {
            order_id: order.id_typed(),
            customer_name: order.customer_name().to_string(),
            status: BulkOutcome::Rejected,
            total: None,
            reason: Some(reason.to_string()),
        });
        self.summary.rejected += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewline_core::{IngredientId, MenuItemId};
    use chrono::Utc;
    use std::collections::HashMap;

    use crate::{NewOrder, OrderLineRequest, SpecialInstructions};

    fn order(id: i64, name: &str, quantity: i64) -> Order {
        let priced = NewOrder {
            customer_name: name.to_string(),
            special_instructions: SpecialInstructions::default(),
            items: vec![OrderLineRequest {
                product_id: MenuItemId::new(1),
                quantity,
            }],
        }
        .price(&HashMap::from([(MenuItemId::new(1), 4.0)]))
        .unwrap();
        Order::open(OrderId::new(id), priced, Utc::now())
    }

    fn usage(id: i64, used: f64) -> IngredientUsage {
        IngredientUsage {
            ingredient_id: IngredientId::new(id),
            name: "milk".to_string(),
            quantity_used: used,
            remaining: 10.0,
            low_stock: false,
        }
    }

    #[test]
    fn tallies_accepted_and_rejected() {
        let mut response = BulkOrderResponse::new(3);
        response.accept(&order(1, "Ann", 1), vec![usage(1, 200.0)]);
        response.reject(&order(2, "Bob", 5), REASON_INSUFFICIENT_INVENTORY);
        response.accept(&order(3, "Cat", 2), vec![usage(1, 400.0)]);

        assert_eq!(response.summary.total_orders, 3);
        assert_eq!(response.summary.accepted, 2);
        assert_eq!(response.summary.rejected, 1);
        assert_eq!(response.summary.total_revenue, 12.0);
        assert_eq!(response.summary.inventory_updates.len(), 2);
        assert_eq!(response.processed_orders[1].reason.as_deref(), Some("insufficient_inventory"));
    }

    #[test]
    fn rejected_records_omit_total() {
        let mut response = BulkOrderResponse::new(1);
        response.reject(&order(2, "Bob", 1), REASON_INSUFFICIENT_INVENTORY);
        let json = serde_json::to_value(&response).unwrap();
        let record = &json["processed_orders"][0];
        assert_eq!(record["status"], "rejected");
        assert!(record.get("total").is_none());
        assert_eq!(json["summary"]["total_revenue"], 0.0);
    }
}
