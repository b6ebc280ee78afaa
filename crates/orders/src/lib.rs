//! Orders domain module.
//!
//! Pure order rules plus the settlement planner: working out, from an order's
//! line items and the recipes of the products it references, how much of each
//! ingredient a settlement consumes and whether the stock on hand covers it.
//! Storage, locking and transactions live in `brewline-infra`.

pub mod bulk;
pub mod instructions;
pub mod order;
pub mod settlement;

pub use bulk::{BulkOrderResponse, BulkOutcome, BulkSummary, ProcessedOrder, REASON_INSUFFICIENT_INVENTORY};
pub use instructions::SpecialInstructions;
pub use order::{NewOrder, Order, OrderItem, OrderLineRequest, OrderStatus, PricedOrder};
pub use settlement::{ConsumptionPlan, IngredientUsage, SettlementError, SettlementResult, Shortfall};
