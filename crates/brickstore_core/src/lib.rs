//! # Brickstore Core
//!
//! A key-value store with range queries and pagination, layered over the
//! asynchronous, cursor-based [`brickstore_engine`] database.
//!
//! This crate provides:
//! - [`Store`]: one named store, opened asynchronously behind a readiness
//!   gate that queues operations until the database is open
//! - Keyed stores (records addressed by a unique key field) and keyless
//!   stores (records addressed by a generated identifier)
//! - CRUD: `insert`, `insert_many`, `set`, `get`, `remove`
//! - [`RangeQuery`] pagination over the key, an index or the identifiers:
//!   bounds, ordering, reversal, offset and count
//! - `size` and `clear`
//!
//! Every operation returns a [`Pending`] future that settles exactly once.
//! Writes settle after their transaction commits.
//!
//! ## Example
//!
//! ```rust,ignore
//! use brickstore_core::{Environment, RangeQuery, Store, StoreConfig, Value};
//!
//! let env = Environment::in_memory()?;
//! let store = Store::open(&env, StoreConfig::new("scores").key("player").index("points"));
//! store.insert(Value::record([("player", Value::from("ann")), ("points", Value::from(12))])).await?;
//! let top = store.get_many(RangeQuery::new().orderby("points").reverse(true).count(10)).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod crud;
mod environment;
mod error;
mod gate;
mod key_strategy;
mod maintenance;
mod query;
mod request;
mod store;

pub use config::{StoreConfig, StoreLayout, API_VERSION, DEFAULT_STORE_NAME};
pub use environment::Environment;
pub use error::{StoreError, StoreResult};
pub use gate::Readiness;
pub use key_strategy::KeyStrategy;
pub use query::RangeQuery;
pub use request::{deferred, Deferred, Pending};
pub use store::Store;

pub use brickstore_engine::{Config as EngineConfig, EngineError, Key, KeyRange, Value};
