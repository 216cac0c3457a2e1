//! Error types for the engine.

use brickstore_codec::CodecError;
use brickstore_storage::StorageError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by engine requests.
///
/// Errors are cloneable because one failure may be reported to several
/// listeners (a request, its transaction, and queued requests it aborts).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A uniqueness constraint was violated.
    #[error("constraint violation: {message}")]
    Constraint {
        /// What collided.
        message: String,
    },

    /// An object store or index does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },

    /// A key, key range or version argument is invalid.
    #[error("invalid data: {message}")]
    Data {
        /// Why the argument was rejected.
        message: String,
    },

    /// Open was requested with a version older than the recorded one.
    #[error("requested version {requested} is lower than the recorded version {current}")]
    Version {
        /// Version passed to open.
        requested: u32,
        /// Version stored in the database.
        current: u32,
    },

    /// A write was attempted in a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// A request was placed on a transaction that already finished.
    #[error("transaction is no longer active")]
    TransactionInactive,

    /// The transaction was rolled back.
    #[error("transaction aborted: {reason}")]
    Aborted {
        /// What caused the abort.
        reason: String,
    },

    /// The database cannot serve the request in its current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the state.
        message: String,
    },

    /// The journal backend failed.
    #[error("storage error: {message}")]
    Storage {
        /// Backend error message.
        message: String,
    },

    /// A journal payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The journal is damaged beyond a torn tail.
    #[error("journal corruption: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// No tokio runtime was available to drive requests.
    #[error("no tokio runtime available")]
    RuntimeUnavailable,
}

impl EngineError {
    /// Creates a constraint error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a data error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Creates an aborted error.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Returns true for uniqueness violations.
    #[must_use]
    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint { .. })
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}
