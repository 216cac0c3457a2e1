//! # Brickstore Storage
//!
//! Append-only byte backends for the Brickstore engine journal.
//!
//! Backends are **opaque byte logs**: they do not interpret what they hold.
//! The engine frames, checksums and replays its own journal entries on top.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral databases
//! - [`FileBackend`] - A single file, exclusively locked while open
//!
//! ## Example
//!
//! ```rust
//! use brickstore_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.append(b"hello ").unwrap();
//! backend.append(b"world").unwrap();
//! assert_eq!(backend.read_all().unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
