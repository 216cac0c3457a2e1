//! Storage backend trait definition.

use crate::error::StorageResult;

/// An append-only byte log.
///
/// # Invariants
///
/// - `append` writes at the current end and returns that offset
/// - `read_all` returns every byte appended and not truncated away
/// - after `sync` returns, appended bytes survive process termination
/// - backends are `Send + Sync` so a database can be shared across tasks
pub trait StorageBackend: Send + Sync {
    /// Reads the whole log.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the log and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Makes all appended data durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Drops everything after `new_size`.
    ///
    /// Used to discard a torn entry left by an interrupted write.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is past the end or the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
