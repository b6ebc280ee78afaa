//! Strongly-typed identifiers used across the domain.
//!
//! Every persisted row is keyed by a database-assigned serial number, so the
//! identifiers wrap a positive `i64` rather than a UUID.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of an inventory row (an ingredient).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngredientId(i64);

/// Identifier of a menu item (a sellable product).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuItemId(i64);

/// Identifier of an order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

macro_rules! impl_serial_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw database key. No range check is done here; use
            /// `parse`/`try_from` for untrusted input.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl TryFrom<i64> for $t {
            type Error = DomainError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                if value <= 0 {
                    return Err(DomainError::invalid_id(format!(
                        "{}: must be a positive integer, got {}",
                        $name, value
                    )));
                }
                Ok(Self(value))
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = i64::from_str(s.trim())
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Self::try_from(raw)
            }
        }
    };
}

impl_serial_newtype!(IngredientId, "IngredientId");
impl_serial_newtype!(MenuItemId, "MenuItemId");
impl_serial_newtype!(OrderId, "OrderId");
