//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another handle (possibly in another process) holds the file.
    #[error("storage locked: {path:?} is in use")]
    Locked {
        /// Path of the locked file.
        path: PathBuf,
    },

    /// Truncation beyond the current end of the log.
    #[error("cannot truncate to {requested} bytes, log holds {size}")]
    TruncateBeyondEnd {
        /// Requested new size.
        requested: u64,
        /// Current size.
        size: u64,
    },
}
