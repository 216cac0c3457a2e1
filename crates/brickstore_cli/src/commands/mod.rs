//! CLI command implementations.
//!
//! Each command runs against an open store and returns the JSON document
//! to print.

pub mod json;
pub mod maintenance;
pub mod query;
pub mod records;

use brickstore_core::StoreError;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// An argument is not valid JSON.
    #[error("invalid JSON {input:?}: {message}")]
    InvalidJson {
        /// The argument as given.
        input: String,
        /// Parser message.
        message: String,
    },

    /// An argument is valid JSON but not usable here.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}
