//! A route collection as a plugin.

use trellis_core::{Routes, TrellisResult};
use trellis_router::join;

use crate::plugin::Plugin;
use crate::App;

/// Registers a [`Routes`] collection when used.
///
/// Routes stay registered after the plugin is unused.
///
/// ```
/// use trellis::plugins::RoutesPlugin;
/// use trellis::App;
/// use trellis_core::Routes;
///
/// let mut routes = Routes::new();
/// routes
///     .get("/", |ctx| { ctx.text("users"); Ok(()) })
///     .summary("List users")
///     .get("/:id", |ctx| { ctx.text("user"); Ok(()) });
///
/// let mut app = App::new();
/// app.use_plugin(RoutesPlugin::new("users", routes).under("/users")).unwrap();
///
/// let paths: Vec<&str> = app.routes().iter().map(|r| r.path()).collect();
/// assert_eq!(paths, vec!["/users", "/users/:id"]);
/// ```
pub struct RoutesPlugin {
    name: String,
    prefix: Option<String>,
    routes: Option<Routes>,
    registered: usize,
}

impl RoutesPlugin {
    /// Wraps `routes` under the plugin name `name`.
    pub fn new(name: impl Into<String>, routes: Routes) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            routes: Some(routes),
            registered: 0,
        }
    }

    /// Registers every route under `prefix`.
    #[must_use]
    pub fn under(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Number of routes this plugin registered.
    pub fn registered(&self) -> usize {
        self.registered
    }
}

impl Plugin for RoutesPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&mut self, app: &mut App) -> TrellisResult<()> {
        let Some(routes) = self.routes.take() else {
            return Ok(());
        };
        let routes = match &self.prefix {
            Some(prefix) => {
                let mut prefixed = Routes::new();
                for mut route in routes {
                    let full = join(prefix, route.path());
                    route.set_path(full);
                    prefixed.push(route);
                }
                prefixed
            }
            None => routes,
        };
        self.registered = routes.len();
        app.register(routes)?;
        Ok(())
    }
}

impl std::fmt::Debug for RoutesPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutesPlugin")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}
