//! Inventory domain module (the inventory ledger).
//!
//! This crate contains business rules for ingredient stock, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod leftovers;

pub use item::{InventoryItem, NewInventoryItem};
pub use leftovers::{Leftover, LeftoverPage, LeftoverSort, PageRequest};
