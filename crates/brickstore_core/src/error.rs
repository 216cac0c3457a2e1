//! Error types for Brickstore stores.

use crate::config::StoreLayout;
use brickstore_engine::{EngineError, Key};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by store operations.
///
/// Every failure is scoped to the call that produced it; no error leaves the
/// store in a state that affects later calls, except a failed readiness gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store never became ready, or the environment has no database.
    #[error("store unavailable: {reason}")]
    StoreUnavailable {
        /// Why the store cannot serve requests.
        reason: String,
    },

    /// A write collided with an existing key.
    #[error("constraint violation: {message}")]
    ConstraintViolation {
        /// What collided.
        message: String,
    },

    /// Any other failure reported by the engine.
    #[error("engine fault: {0}")]
    UnderlyingFault(EngineError),

    /// The recorded store layout differs from the configured one.
    #[error("store '{store}' was created with {recorded} but is configured with {expected}")]
    SchemaMismatch {
        /// Store name.
        store: String,
        /// Layout derived from the configuration.
        expected: StoreLayout,
        /// Layout found in the database.
        recorded: StoreLayout,
    },

    /// A record for a keyed store lacks a valid key in its key field.
    #[error("record has no valid key in field '{field}'")]
    MissingKey {
        /// The configured key field.
        field: String,
    },

    /// `set` was given a record whose key field holds another key.
    #[error("record key {found} does not match {expected}")]
    KeyMismatch {
        /// Key passed to `set`.
        expected: Key,
        /// Key found in the record.
        found: Key,
    },

    /// A range query named an index the store does not have.
    #[error("no index named '{name}'")]
    UnknownIndex {
        /// The requested index.
        name: String,
    },

    /// A range query's start lies after its end.
    #[error("range start is greater than range end")]
    InvalidRange,

    /// The operation was dropped before it produced an outcome.
    #[error("operation interrupted before completion")]
    Interrupted,
}

impl StoreError {
    /// Creates a store unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// The error an operation sees when the gate failed with `self`.
    pub(crate) fn as_unavailable(&self) -> Self {
        match self {
            Self::StoreUnavailable { .. } => self.clone(),
            other => Self::unavailable(other.to_string()),
        }
    }
}

impl From<EngineError> for StoreError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Constraint { message } => Self::ConstraintViolation { message },
            other => Self::UnderlyingFault(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_constraint_maps_to_violation() {
        let err = StoreError::from(EngineError::constraint("key 1"));
        assert_eq!(
            err,
            StoreError::ConstraintViolation {
                message: "key 1".into()
            }
        );
    }

    #[test]
    fn other_engine_errors_are_faults() {
        let err = StoreError::from(EngineError::ReadOnly);
        assert_eq!(err, StoreError::UnderlyingFault(EngineError::ReadOnly));
    }

    #[test]
    fn unavailable_keeps_original_reason() {
        let cause = StoreError::unavailable("no factory");
        assert_eq!(cause.as_unavailable(), cause);

        let wrapped = StoreError::InvalidRange.as_unavailable();
        assert_eq!(
            wrapped,
            StoreError::unavailable("range start is greater than range end")
        );
    }

    #[test]
    fn display() {
        let err = StoreError::MissingKey { field: "k".into() };
        assert_eq!(err.to_string(), "record has no valid key in field 'k'");
    }
}
