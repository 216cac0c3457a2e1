//! Object store and index definitions.

use std::collections::BTreeMap;

/// Definition of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    /// Index name, unique within its store.
    pub name: String,
    /// Dotted path of the indexed field.
    pub key_path: String,
    /// Whether two records may share an index key.
    pub unique: bool,
}

impl IndexSchema {
    /// Creates an index definition.
    pub fn new(name: impl Into<String>, key_path: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique,
        }
    }
}

/// Definition of an object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSchema {
    /// Store name.
    pub name: String,
    /// Whether keys are generated when none is supplied.
    pub auto_increment: bool,
    /// Indexes by name.
    pub indexes: BTreeMap<String, IndexSchema>,
}

impl StoreSchema {
    /// Creates a store definition without indexes.
    pub fn new(name: impl Into<String>, auto_increment: bool) -> Self {
        Self {
            name: name.into(),
            auto_increment,
            indexes: BTreeMap::new(),
        }
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.get(name)
    }

    /// Index names in sorted order.
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }
}
