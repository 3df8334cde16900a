//! Settings read by the application itself.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult, ConfigStore};

/// The `server` section.
///
/// ```
/// use trellis_config::{ConfigStore, ServerSettings};
///
/// let mut store = ConfigStore::new();
/// store.set("server.port", 3000.into());
///
/// let settings = ServerSettings::from_store(&store).unwrap();
/// assert_eq!(settings.addr(), "0.0.0.0:3000");
/// assert!(!settings.dev_mode);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Development mode: error details in responses, route table logged
    /// at startup.
    pub dev_mode: bool,
    /// Deployment environment name.
    pub env: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            dev_mode: false,
            env: "production".to_string(),
        }
    }
}

impl ServerSettings {
    /// Section name in the store.
    pub const SECTION: &'static str = "server";

    /// Reads and validates the `server` section, defaulting when absent.
    pub fn from_store(store: &ConfigStore) -> ConfigResult<Self> {
        let settings: Self = store.section_or_default(Self::SECTION)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects settings a server could not start with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid_value("server.host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid_value("server.port", "must be between 1 and 65535"));
        }
        Ok(())
    }

    /// `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
