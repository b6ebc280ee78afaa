//! `brewline-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model and the naming rules shared by the
//! inventory, menu and order crates.

pub mod entity;
pub mod error;
pub mod id;
pub mod name;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{IngredientId, MenuItemId, OrderId};
pub use name::validate_name;
pub use value_object::ValueObject;
