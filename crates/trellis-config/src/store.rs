//! The configuration tree.
//!
//! A [`ConfigStore`] holds one JSON object tree. Application code and
//! plugins read it two ways: whole sections deserialized into typed
//! structs, or single values through dotted paths (`"server.port"`).

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{ConfigError, ConfigResult};

/// A tree of configuration values.
///
/// # Example
///
/// ```
/// use trellis_config::ConfigStore;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, Default)]
/// #[serde(default)]
/// struct Cache {
///     ttl_secs: u64,
/// }
///
/// let mut store = ConfigStore::new();
/// store.set("cache.ttl_secs", 30.into());
///
/// assert_eq!(store.get_i64("cache.ttl_secs"), Some(30));
/// let cache: Cache = store.section_or_default("cache").unwrap();
/// assert_eq!(cache.ttl_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigStore {
    root: Value,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wraps `root`, which must be a JSON object.
    pub fn from_value(root: Value) -> ConfigResult<Self> {
        if root.is_object() {
            Ok(Self { root })
        } else {
            Err(ConfigError::invalid_value("<root>", "expected a table"))
        }
    }

    /// The whole tree.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Consumes the store, returning the tree.
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Looks up a dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(&self.root, |node, key| node.get(key))
    }

    /// Returns true if `path` is present.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// String at `path`.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Integer at `path`.
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    /// Boolean at `path`.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// Table at `path`.
    pub fn table(&self, path: &str) -> Option<&Map<String, Value>> {
        self.get(path).and_then(Value::as_object)
    }

    /// Sets `path` to `value`, creating intermediate tables.
    ///
    /// A non-table value in the way is replaced by a table.
    pub fn set(&mut self, path: &str, value: Value) {
        let keys: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = keys.split_last() else {
            return;
        };

        let mut node = &mut self.root;
        for key in parents {
            node = ensure_object(node)
                .entry((*key).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(node).insert((*last).to_string(), value);
    }

    /// Deserializes the section at `path`, if present.
    pub fn section<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<Option<T>> {
        self.get(path)
            .map(|value| {
                T::deserialize(value)
                    .map_err(|e| ConfigError::invalid_value(path, e.to_string()))
            })
            .transpose()
    }

    /// Deserializes the section at `path`, or returns `T::default()`.
    pub fn section_or_default<T: DeserializeOwned + Default>(&self, path: &str) -> ConfigResult<T> {
        Ok(self.section(path)?.unwrap_or_default())
    }

    /// Deep-merges `other` into this store; `other` wins on conflicts.
    pub fn merge(&mut self, other: Value) {
        merge_values(&mut self.root, other);
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by an object"),
    }
}

/// Tables merge key by key; any other value replaces the old one.
pub(crate) fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    #[serde(default)]
    struct Pool {
        size: u32,
        name: String,
    }

    fn store() -> ConfigStore {
        ConfigStore::from_value(json!({
            "server": { "port": 8080, "dev_mode": true, "host": "0.0.0.0" },
            "pool": { "size": 4 }
        }))
        .unwrap()
    }

    #[test]
    fn test_dotted_lookups() {
        let store = store();
        assert_eq!(store.get_i64("server.port"), Some(8080));
        assert_eq!(store.get_bool("server.dev_mode"), Some(true));
        assert_eq!(store.get_str("server.host"), Some("0.0.0.0"));
        assert_eq!(store.get_str("server.port"), None);
        assert!(store.get("server.missing").is_none());
        assert!(store.table("server").is_some());
    }

    #[test]
    fn test_set_creates_tables() {
        let mut store = ConfigStore::new();
        store.set("a.b.c", json!(1));
        assert_eq!(store.get_i64("a.b.c"), Some(1));

        store.set("a.b", json!("flat"));
        assert_eq!(store.get_str("a.b"), Some("flat"));

        store.set("a.b.d", json!(true));
        assert_eq!(store.get_bool("a.b.d"), Some(true));
    }

    #[test]
    fn test_sections() {
        let store = store();
        let pool: Pool = store.section_or_default("pool").unwrap();
        assert_eq!(pool, Pool { size: 4, name: String::new() });

        let missing: Option<Pool> = store.section("nothing").unwrap();
        assert!(missing.is_none());

        let err = store.section::<Pool>("server.port").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "server.port"));
    }

    #[test]
    fn test_merge_is_deep() {
        let mut store = store();
        store.merge(json!({ "server": { "port": 9000 }, "extra": [1, 2] }));
        assert_eq!(store.get_i64("server.port"), Some(9000));
        assert_eq!(store.get_str("server.host"), Some("0.0.0.0"));
        assert!(store.get("extra").unwrap().is_array());
    }

    #[test]
    fn test_root_must_be_table() {
        assert!(ConfigStore::from_value(json!([1])).is_err());
    }
}
