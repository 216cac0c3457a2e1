//! # Brickstore Engine
//!
//! An embedded, in-process object-store database with an asynchronous,
//! callback-driven request model.
//!
//! A [`Factory`] opens named databases at a schema version. Each database
//! holds object stores of records keyed by [`Key`]s, with optional unique
//! or non-unique secondary indexes on record fields. All access happens
//! inside a [`Transaction`]: requests are queued on it and report one
//! success or one failure through [`RequestHandlers`], and cursors report
//! each position to a repeatable callback.
//!
//! ## Durability
//!
//! Directory-backed factories keep one append-only journal per database.
//! Schema changes and committed read-write transactions are appended as
//! checksummed entries; opening a database replays them.
//!
//! ## Ordering
//!
//! Transactions on one database run one at a time, in the order they were
//! created. A transaction commits once its queue is empty and every handle
//! to it has been dropped.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod cursor;
mod data;
mod database;
mod error;
mod factory;
mod handle;
mod index;
mod journal;
mod key;
mod request;
mod schema;
mod transaction;

pub use config::Config;
pub use connection::{Connection, OpenHandlers, VersionChange};
pub use cursor::{Cursor, CursorDirection, CursorHandlers};
pub use error::{EngineError, EngineResult};
pub use factory::Factory;
pub use handle::{Index, ObjectStore};
pub use key::{Key, KeyRange};
pub use request::{ErrorEvent, RequestHandlers};
pub use schema::{IndexSchema, StoreSchema};
pub use transaction::{Transaction, TransactionMode};

/// Re-exported record type.
pub use brickstore_codec::Value;
