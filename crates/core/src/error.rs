//! Errors raised by the pure domain crates.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A deterministic failure of a domain rule.
///
/// Nothing here touches storage: lookups that miss, constraint violations and
/// backend failures are reported by the infra crate, which folds these
/// variants into its own service error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Caller input was rejected: a bad name, a non-positive quantity,
    /// an unknown special instruction.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Internal state would become inconsistent, e.g. stock below zero.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A path or body identifier did not parse as a positive integer.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The entity is in the wrong lifecycle state, e.g. closing a closed order.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_detail() {
        let err = DomainError::validation("quantity must be greater than zero");
        assert_eq!(err.to_string(), "validation failed: quantity must be greater than zero");
        assert_eq!(
            DomainError::conflict("order 1 is already closed").to_string(),
            "conflict: order 1 is already closed"
        );
    }
}
