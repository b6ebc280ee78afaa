//! Order settlement: the single-order engine and the bulk coordinator that
//! drives it over a batch of freshly created orders.

mod bulk;
mod engine;

pub use bulk::BulkCoordinator;
pub use engine::SettlementEngine;
