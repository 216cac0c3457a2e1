//! # Brickstore Testkit
//!
//! Test utilities for Brickstore.
//!
//! This crate provides:
//! - Store fixtures over in-memory and directory-backed engines
//! - Seeded record generators and proptest strategies
//! - A reference model of range queries for cross-checking stores
//!
//! ## Usage
//!
//! ```rust,ignore
//! use brickstore_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_store() {
//!     let store = TestStore::memory(people_config()).await;
//!     store.insert(record("a", 1, 0)).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
