//! Plugins switched on and off from configuration.
//!
//! A [`PluginRegistry`] maps keys of the `plugins` table to constructors.
//! [`App::auto_configure`] then walks the table:
//!
//! ```toml
//! [plugins]
//! recovery = true          # install with defaults
//! access_log = false       # remove if installed
//!
//! [plugins.rate_limit]     # install with this table as configuration
//! limit = 50
//! window_ms = 1000
//!
//! [plugins.cors]
//! enabled = false          # remove if installed
//! ```
//!
//! Keys are processed in registration order, not in table order, so the
//! built-in stages always stack the same way.

use std::fmt;

use serde_json::Value;
use trellis_core::{TrellisError, TrellisResult};
use trellis_middleware::stages::{
    AccessLogMiddleware, BasicAuthMiddleware, CorsMiddleware, RateLimitMiddleware,
    RecoveryMiddleware, RequestIdMiddleware,
};
use trellis_middleware::ConfigurableMiddleware;

use crate::plugin::Plugin;
use crate::plugins::MiddlewarePlugin;
use crate::App;

type Installer = Box<dyn Fn(&mut App, &Value) -> TrellisResult<()> + Send + Sync>;
type Remover = fn(&mut App) -> TrellisResult<()>;

struct Entry {
    key: String,
    install: Installer,
    remove: Remover,
}

/// Constructors for plugins named in configuration.
#[derive(Default)]
pub struct PluginRegistry {
    entries: Vec<Entry>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in middleware plugins under their
    /// section names: `recovery`, `access_log`, `request_id`, `cors`,
    /// `rate_limit`, `basic_auth`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register_middleware::<RecoveryMiddleware>()
            .register_middleware::<AccessLogMiddleware>()
            .register_middleware::<RequestIdMiddleware>()
            .register_middleware::<CorsMiddleware>()
            .register_middleware::<RateLimitMiddleware>()
            .register_middleware::<BasicAuthMiddleware>();
        registry
    }

    /// Registers `ctor` under `key`, replacing any earlier registration.
    ///
    /// `ctor` receives the key's value: `true` or the key's table.
    pub fn register<P, F>(&mut self, key: impl Into<String>, ctor: F) -> &mut Self
    where
        P: Plugin,
        F: Fn(&Value) -> TrellisResult<P> + Send + Sync + 'static,
    {
        let key = key.into();
        let install_key = key.clone();
        let install: Installer = Box::new(move |app: &mut App, value: &Value| {
            if app.has_plugin::<P>() {
                tracing::debug!(plugin = %install_key, "already installed, skipping");
                return Ok(());
            }
            let plugin = ctor(value)?;
            app.use_plugin(plugin)?;
            Ok(())
        });
        let entry = Entry {
            key,
            install,
            remove: App::unuse::<P>,
        };

        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Registers [`MiddlewarePlugin<M>`] under `M::SECTION`.
    pub fn register_middleware<M: ConfigurableMiddleware>(&mut self) -> &mut Self {
        self.register(M::SECTION, MiddlewarePlugin::<M>::from_value)
    }

    /// Returns true if `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl App {
    /// Installs and removes plugins as the `plugins` config table says.
    ///
    /// A key set to `true`, or to a table without `enabled = false`, is
    /// installed unless a plugin of that type is already present. A key set
    /// to `false`, or to a table with `enabled = false`, is removed. Keys
    /// missing from `registry` are an error, reported before anything
    /// changes.
    pub fn auto_configure(&mut self, registry: &PluginRegistry) -> TrellisResult<()> {
        let Some(table) = self.config().table("plugins").cloned() else {
            return Ok(());
        };

        for (key, value) in &table {
            if !registry.contains(key) {
                return Err(TrellisError::config(format!(
                    "unknown plugin 'plugins.{key}'"
                )));
            }
            enabled(key, value)?;
        }

        for entry in &registry.entries {
            let Some(value) = table.get(&entry.key) else {
                continue;
            };
            let on = enabled(&entry.key, value)?;
            if on {
                (entry.install)(self, value)?;
            } else {
                (entry.remove)(self)?;
            }
            tracing::debug!(plugin = %entry.key, enabled = on, "auto-configured");
        }
        Ok(())
    }
}

fn enabled(key: &str, value: &Value) -> TrellisResult<bool> {
    match value {
        Value::Bool(on) => Ok(*on),
        Value::Object(table) => match table.get("enabled") {
            None => Ok(true),
            Some(Value::Bool(on)) => Ok(*on),
            Some(_) => Err(TrellisError::config(format!(
                "plugins.{key}.enabled must be a boolean"
            ))),
        },
        _ => Err(TrellisError::config(format!(
            "plugins.{key} must be a boolean or a table"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_keys_in_stack_order() {
        let registry = PluginRegistry::with_builtin();
        assert_eq!(
            registry.keys().collect::<Vec<_>>(),
            vec!["recovery", "access_log", "request_id", "cors", "rate_limit", "basic_auth"]
        );
    }

    #[test]
    fn test_register_replaces_key() {
        let mut registry = PluginRegistry::new();
        registry.register_middleware::<CorsMiddleware>();
        registry.register_middleware::<CorsMiddleware>();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_enabled_forms() {
        assert!(enabled("a", &json!(true)).unwrap());
        assert!(!enabled("a", &json!(false)).unwrap());
        assert!(enabled("a", &json!({ "limit": 1 })).unwrap());
        assert!(!enabled("a", &json!({ "enabled": false })).unwrap());
        assert!(enabled("a", &json!({ "enabled": "yes" })).is_err());
        assert!(enabled("a", &json!(1)).is_err());
    }

    #[test]
    fn test_installs_in_registry_order() {
        let mut app = App::new();
        app.config_mut().merge(json!({
            "plugins": {
                "request_id": true,
                "rate_limit": { "limit": 10 },
                "recovery": { "show_details": true }
            }
        }));
        app.auto_configure(&PluginRegistry::with_builtin()).unwrap();
        assert_eq!(app.middleware_names(), vec!["recovery", "request_id", "rate_limit"]);
    }

    #[test]
    fn test_unknown_key_changes_nothing() {
        let mut app = App::new();
        app.config_mut()
            .merge(json!({ "plugins": { "recovery": true, "telepathy": true } }));
        let err = app
            .auto_configure(&PluginRegistry::with_builtin())
            .unwrap_err();
        assert!(matches!(err, TrellisError::Config(ref msg) if msg.contains("telepathy")));
        assert!(app.middleware_names().is_empty());
    }

    #[test]
    fn test_disable_removes_and_rerun_is_stable() {
        let registry = PluginRegistry::with_builtin();
        let mut app = App::new();
        app.config_mut()
            .merge(json!({ "plugins": { "cors": true, "access_log": true } }));
        app.auto_configure(&registry).unwrap();
        app.auto_configure(&registry).unwrap();
        assert_eq!(app.middleware_names(), vec!["access_log", "cors"]);

        app.config_mut().set("plugins.cors", json!({ "enabled": false }));
        app.auto_configure(&registry).unwrap();
        assert_eq!(app.middleware_names(), vec!["access_log"]);
        assert!(!app.has_plugin::<MiddlewarePlugin<CorsMiddleware>>());
    }

    #[test]
    fn test_custom_plugin() {
        #[derive(Debug)]
        struct Banner(String);

        impl Plugin for Banner {
            fn config(&mut self, app: &mut App) -> TrellisResult<()> {
                let text = self.0.clone();
                app.get("/banner", move |ctx| {
                    ctx.text(text.clone());
                    Ok(())
                })?;
                Ok(())
            }
        }

        let mut registry = PluginRegistry::new();
        registry.register("banner", |value| {
            let text = value
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| TrellisError::config("plugins.banner.text is required"))?;
            Ok(Banner(text.to_string()))
        });

        let mut app = App::new();
        app.config_mut()
            .merge(json!({ "plugins": { "banner": { "text": "hi" } } }));
        app.auto_configure(&registry).unwrap();
        assert_eq!(app.get_plugin::<Banner>().map(|b| b.0.as_str()), Some("hi"));
        assert_eq!(app.routes().len(), 1);
    }
}
