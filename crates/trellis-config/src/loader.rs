//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for building a
//! [`ConfigStore`] from multiple sources: defaults, files, and environment
//! variables.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::store::merge_values;
use crate::{ConfigError, ConfigResult, ConfigStore};

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "TRELLIS";

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones table by table:
/// 1. Defaults
/// 2. Configuration files or strings (TOML or JSON), in the order added
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use trellis_config::ConfigLoader;
///
/// # fn main() -> Result<(), trellis_config::ConfigError> {
/// let store = ConfigLoader::new()
///     .with_file("trellis.toml")?
///     .with_env_prefix("TRELLIS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    root: Value,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader with an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Value::Object(serde_json::Map::new()),
            env_prefix: None,
        }
    }

    /// Merge `defaults` underneath everything loaded so far.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_config::ConfigLoader;
    /// use serde_json::json;
    ///
    /// let store = ConfigLoader::new()
    ///     .with_string(r#"{"server": {"port": 9000}}"#, "json")
    ///     .unwrap()
    ///     .with_defaults(json!({"server": {"port": 8080, "host": "127.0.0.1"}}))
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(store.get_i64("server.port"), Some(9000));
    /// assert_eq!(store.get_str("server.host"), Some("127.0.0.1"));
    /// ```
    #[must_use]
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        let loaded = std::mem::replace(&mut self.root, defaults);
        merge_values(&mut self.root, loaded);
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        tracing::debug!(path = %path.display(), "loading configuration file");
        self.with_string(&content, format)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `format` (`"toml"` or `"json"`).
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [plugins]
    ///     cors = true
    ///
    ///     [plugins.rate_limit]
    ///     limit = 10
    /// "#;
    ///
    /// let store = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(store.get_bool("plugins.cors"), Some(true));
    /// assert_eq!(store.get_i64("plugins.rate_limit.limit"), Some(10));
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> ConfigResult<Self> {
        let layer: Value = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        if !layer.is_object() {
            return Err(ConfigError::invalid_value("<root>", "expected a table"));
        }

        merge_values(&mut self.root, layer);
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`.
    /// For example, with prefix "TRELLIS":
    /// - `TRELLIS__SERVER__PORT=9000` sets `server.port`
    /// - `TRELLIS__PLUGINS__CORS=false` sets `plugins.cors`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Finalize, applying overrides from the process environment if a
    /// prefix was set.
    pub fn load(self) -> ConfigResult<ConfigStore> {
        self.load_with_env(env::vars())
    }

    /// Finalize, applying overrides from `vars` instead of the process
    /// environment.
    pub fn load_with_env<I>(mut self, vars: I) -> ConfigResult<ConfigStore>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut store = ConfigStore::from_value(std::mem::take(&mut self.root))?;
        if let Some(prefix) = self.env_prefix.take() {
            let marker = format!("{prefix}__");
            for (key, value) in vars {
                let Some(rest) = key.strip_prefix(&marker) else {
                    continue;
                };
                let path = env_path(rest)
                    .ok_or_else(|| ConfigError::invalid_value(&key, "empty key segment"))?;
                tracing::debug!(var = %key, path = %path, "applying environment override");
                store.set(&path, parse_env_value(&value));
            }
        }
        Ok(store)
    }
}

/// `SERVER__DEV_MODE` → `server.dev_mode`.
fn env_path(rest: &str) -> Option<String> {
    let parts: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
    if parts.iter().any(String::is_empty) {
        return None;
    }
    Some(parts.join("."))
}

/// Environment values are typed when they look like booleans or numbers.
fn parse_env_value(raw: &str) -> Value {
    match raw.trim() {
        "true" | "TRUE" | "True" => Value::Bool(true),
        "false" | "FALSE" | "False" => Value::Bool(false),
        trimmed => {
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::from(i)
            } else if let Some(f) = trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
                Value::from(f)
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}
