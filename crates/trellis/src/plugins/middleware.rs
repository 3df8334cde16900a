//! Middleware as a plugin.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use trellis_config::ConfigStore;
use trellis_core::{TrellisError, TrellisResult};
use trellis_middleware::{ConfigurableMiddleware, Middleware};

use crate::plugin::{short_type_name, Plugin};
use crate::App;

#[derive(Debug)]
enum Source<M> {
    Instance(Arc<M>),
    Deferred(fn(&ConfigStore) -> TrellisResult<M>),
}

/// Installs a middleware stage when used and removes it when unused.
///
/// # Example
///
/// ```
/// use trellis::plugins::MiddlewarePlugin;
/// use trellis::App;
/// use trellis_middleware::stages::{CorsMiddleware, RateLimitMiddleware};
///
/// let mut app = App::new();
/// app.config_mut().set("plugins.rate_limit.limit", 5.into());
///
/// app.use_plugin(MiddlewarePlugin::new(CorsMiddleware::permissive())).unwrap();
/// app.use_plugin(MiddlewarePlugin::<RateLimitMiddleware>::from_config()).unwrap();
/// assert_eq!(app.middleware_names(), vec!["cors", "rate_limit"]);
///
/// app.unuse::<MiddlewarePlugin<CorsMiddleware>>().unwrap();
/// assert_eq!(app.middleware_names(), vec!["rate_limit"]);
/// ```
#[derive(Debug)]
pub struct MiddlewarePlugin<M> {
    source: Source<M>,
    name: &'static str,
}

impl<M: Middleware> MiddlewarePlugin<M> {
    /// Wraps an already built middleware.
    pub fn new(middleware: M) -> Self {
        Self {
            source: Source::Instance(Arc::new(middleware)),
            name: short_type_name(std::any::type_name::<M>()),
        }
    }

    /// The installed middleware, once it has been built.
    pub fn middleware(&self) -> Option<&M> {
        match &self.source {
            Source::Instance(m) => Some(m),
            Source::Deferred(_) => None,
        }
    }
}

impl<M: ConfigurableMiddleware> MiddlewarePlugin<M> {
    /// Builds the middleware from the `plugins.<section>` table when used.
    ///
    /// A missing table, or a plain `true`, gives the default configuration.
    pub fn from_config() -> Self {
        Self {
            source: Source::Deferred(build_from_store::<M>),
            name: short_type_name(std::any::type_name::<M>()),
        }
    }

    /// Builds the middleware from `value` right away.
    pub fn from_value(value: &Value) -> TrellisResult<Self> {
        Ok(Self::new(build::<M>(Some(value))?))
    }
}

impl<M: Middleware> Plugin for MiddlewarePlugin<M> {
    fn name(&self) -> &str {
        self.name
    }

    fn config(&mut self, app: &mut App) -> TrellisResult<()> {
        let stage = match &self.source {
            Source::Instance(m) => Arc::clone(m),
            Source::Deferred(build) => Arc::new(build(app.config())?),
        };
        self.source = Source::Instance(Arc::clone(&stage));
        app.middleware_boxed(stage);
        Ok(())
    }
}

fn build_from_store<M: ConfigurableMiddleware>(store: &ConfigStore) -> TrellisResult<M> {
    build(store.get(&format!("plugins.{}", M::SECTION)))
}

fn build<M: ConfigurableMiddleware>(value: Option<&Value>) -> TrellisResult<M> {
    let config = match value {
        Some(table @ Value::Object(_)) => M::Config::deserialize(table)
            .map_err(|e| TrellisError::config(format!("plugins.{}: {e}", M::SECTION)))?,
        _ => M::Config::default(),
    };
    M::from_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use serde_json::json;
    use trellis_core::Context;
    use trellis_middleware::stages::{BasicAuthMiddleware, RateLimitMiddleware, RequestIdMiddleware};

    #[test]
    fn test_from_value_reads_table() {
        let plugin =
            MiddlewarePlugin::<RateLimitMiddleware>::from_value(&json!({ "limit": 2, "enabled": true }))
                .unwrap();
        assert_eq!(plugin.middleware().map(RateLimitMiddleware::limit), Some(2));
        assert_eq!(plugin.name(), "RateLimitMiddleware");
    }

    #[test]
    fn test_true_means_defaults() {
        let plugin = MiddlewarePlugin::<RequestIdMiddleware>::from_value(&json!(true)).unwrap();
        assert!(plugin.middleware().is_some());
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let err = MiddlewarePlugin::<RateLimitMiddleware>::from_value(&json!({ "limit": "lots" }))
            .unwrap_err();
        assert!(matches!(err, TrellisError::Config(ref msg) if msg.starts_with("plugins.rate_limit")));

        // basic auth refuses to start without users
        assert!(MiddlewarePlugin::<BasicAuthMiddleware>::from_value(&json!({})).is_err());
    }

    #[test]
    fn test_deferred_build_reads_app_config() {
        let mut app = App::new();
        app.config_mut().set("plugins.rate_limit", json!({ "limit": 1 }));
        app.get("/", |ctx| {
            ctx.text("ok");
            Ok(())
        })
        .unwrap();
        app.use_plugin(MiddlewarePlugin::<RateLimitMiddleware>::from_config())
            .unwrap();

        let plugin = app
            .get_plugin::<MiddlewarePlugin<RateLimitMiddleware>>()
            .unwrap();
        assert_eq!(plugin.middleware().map(RateLimitMiddleware::limit), Some(1));

        let statuses: Vec<StatusCode> = (0..2)
            .map(|_| {
                let mut ctx = Context::new(Method::GET, "/").with_header("x-real-ip", "192.0.2.1");
                app.dispatch(&mut ctx);
                ctx.status()
            })
            .collect();
        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
    }

    #[test]
    fn test_failed_build_keeps_app_clean() {
        let mut app = App::new();
        app.config_mut().set("plugins.rate_limit", json!({ "limit": 0 }));
        let err = app
            .use_plugin(MiddlewarePlugin::<RateLimitMiddleware>::from_config())
            .unwrap_err();
        assert!(matches!(err, TrellisError::Plugin { .. }));
        assert!(app.middleware_names().is_empty());
        assert!(!app.has_plugin::<MiddlewarePlugin<RateLimitMiddleware>>());
    }
}
