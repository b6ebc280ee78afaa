use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use brewline_core::{DomainError, DomainResult, ValueObject};

/// Keys a customer may attach to an order.
pub const ALLOWED_KEYS: [&str; 2] = ["temperature", "notes"];

/// Free-form key/value notes on an order (e.g. `temperature = "extra hot"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecialInstructions(BTreeMap<String, String>);

impl SpecialInstructions {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Only allow-listed keys are accepted.
    pub fn validate(&self) -> DomainResult<()> {
        match self.0.keys().find(|k| !ALLOWED_KEYS.contains(&k.as_str())) {
            Some(key) => Err(DomainError::validation(format!(
                "invalid special instruction key: {key}"
            ))),
            None => Ok(()),
        }
    }
}

impl ValueObject for SpecialInstructions {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SpecialInstructions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
