//! Store configuration.

use std::fmt;

/// Schema version stores are opened at.
///
/// The layout is created once on upgrade from version 0 and never migrated.
pub const API_VERSION: u32 = 1;

/// Store name used when none is configured.
pub const DEFAULT_STORE_NAME: &str = "storage";

/// Configuration of a single store.
///
/// The name is used both as the database name and as the name of the one
/// object store inside it.
///
/// # Example
///
/// ```rust
/// use brickstore_core::StoreConfig;
///
/// let config = StoreConfig::new("people").key("email").index("age").index("city");
/// assert_eq!(config.secondary_indices(), vec!["age", "city"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database and object store name.
    pub name: String,
    /// Field holding each record's user-visible key; `None` for keyless stores.
    pub key: Option<String>,
    /// Fields with a non-unique secondary index.
    pub indices: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_STORE_NAME.to_string(),
            key: None,
            indices: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Creates a keyless configuration without indices.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the key field.
    #[must_use]
    pub fn key(mut self, field: impl Into<String>) -> Self {
        self.key = Some(field.into());
        self
    }

    /// Adds an indexed field.
    #[must_use]
    pub fn index(mut self, field: impl Into<String>) -> Self {
        self.indices.push(field.into());
        self
    }

    /// Adds several indexed fields.
    #[must_use]
    pub fn indices<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Builds a configuration from string attributes.
    ///
    /// `lookup` is asked for `name`, `key` and `index`. A missing or empty
    /// `name` falls back to [`DEFAULT_STORE_NAME`], a missing or empty `key`
    /// makes the store keyless, and `index` is split on whitespace.
    pub fn from_attributes<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |attr: &str| lookup(attr).filter(|value| !value.trim().is_empty());
        Self {
            name: present("name").unwrap_or_else(|| DEFAULT_STORE_NAME.to_string()),
            key: present("key"),
            indices: present("index")
                .map(|list| list.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }

    /// Indexed fields that get a non-unique index, in declaration order.
    ///
    /// Duplicates are dropped, as is the key field: it is served by its
    /// unique index.
    #[must_use]
    pub fn secondary_indices(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(self.indices.len());
        for field in &self.indices {
            if Some(field) == self.key.as_ref() || out.contains(&field.as_str()) {
                continue;
            }
            out.push(field);
        }
        out
    }

    /// The index layout this configuration creates.
    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        let mut indices: Vec<String> = self
            .secondary_indices()
            .into_iter()
            .map(str::to_string)
            .collect();
        indices.sort();
        StoreLayout {
            key: self.key.clone(),
            indices,
        }
    }
}

/// Index layout of a store: its unique key index and its secondary indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreLayout {
    /// Field with a unique index, if any.
    pub key: Option<String>,
    /// Fields with a non-unique index, sorted.
    pub indices: Vec<String>,
}

impl fmt::Display for StoreLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "key '{key}'")?,
            None => write!(f, "no key")?,
        }
        write!(f, " and indices [{}]", self.indices.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn attributes(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.name, "storage");
        assert!(config.key.is_none());
        assert!(config.indices.is_empty());
    }

    #[test]
    fn from_attributes_parses_triple() {
        let config = StoreConfig::from_attributes(attributes(&[
            ("name", "people"),
            ("key", "email"),
            ("index", "  age\tcity  zip "),
        ]));
        assert_eq!(config.name, "people");
        assert_eq!(config.key.as_deref(), Some("email"));
        assert_eq!(config.indices, vec!["age", "city", "zip"]);
    }

    #[test]
    fn from_attributes_treats_empty_as_absent() {
        let config = StoreConfig::from_attributes(attributes(&[("name", ""), ("key", " ")]));
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn key_listed_as_index_is_not_duplicated() {
        let config = StoreConfig::new("s").key("k").indices(["v", "k", "v", "i"]);
        assert_eq!(config.secondary_indices(), vec!["v", "i"]);
        assert_eq!(
            config.layout(),
            StoreLayout {
                key: Some("k".into()),
                indices: vec!["i".into(), "v".into()],
            }
        );
    }

    #[test]
    fn layout_display() {
        let layout = StoreConfig::new("s").index("b").index("a").layout();
        assert_eq!(layout.to_string(), "no key and indices [a, b]");
    }
}
