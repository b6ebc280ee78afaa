//! Menu catalog domain module.
//!
//! A menu item is a sellable product with a price and a recipe: the fixed list
//! of ingredients (by inventory id) and the quantity of each consumed per unit
//! sold. Recipes only *reference* inventory rows; they never own them.

pub mod item;

pub use item::{MenuItem, NewMenuItem, RecipeLine};
