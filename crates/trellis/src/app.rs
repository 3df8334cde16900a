//! The application: routes, middleware, plugins and request dispatch.
//!
//! An [`App`] is assembled through `&mut App` during setup and served
//! through `&App` afterwards, so it can sit behind an `Arc` and handle
//! requests from any number of threads without locking.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use http::header::ALLOW;
use http::{HeaderValue, Method};
use serde_json::json;
use trellis_config::{ConfigStore, ServerSettings};
use trellis_core::{
    handler, BoxHandler, Context, Handler, MethodFilter, PluginPhase, Route, Routes, Services,
    TrellisError, TrellisResult,
};
use trellis_middleware::stages::ErrorHook;
use trellis_middleware::{BoxedMiddleware, Chain, FnMiddleware, Middleware, Next};
use trellis_router::{Lookup, Router};
use trellis_telemetry::{fields, request_span, LogConfig};

use crate::group::AppGroup;
use crate::plugin::{AnyPlugin, Plugin};

/// State key under which a custom `no_method` handler finds the methods the
/// path does accept, as a `Vec<Method>`.
pub const ALLOWED_METHODS_STATE_KEY: &str = "allowed_methods";

type ReadyHook = Box<dyn FnOnce(&App) -> TrellisResult<()> + Send + Sync>;

struct MiddlewareEntry {
    owner: Option<u64>,
    stage: BoxedMiddleware,
}

struct ServiceEntry {
    owner: u64,
    type_id: TypeId,
    name: Option<String>,
}

struct PluginEntry {
    id: u64,
    type_id: TypeId,
    plugin: Box<dyn AnyPlugin>,
}

/// What a failed `config` call is rolled back to.
struct Checkpoint {
    router: Router<usize>,
    routes: usize,
    services: Services,
}

/// The composition root.
///
/// # Example
///
/// ```
/// use trellis::App;
/// use trellis_core::Context;
/// use http::{Method, StatusCode};
///
/// let mut app = App::new();
/// app.get("/users/:id", |ctx| {
///     let id = ctx.param("id").unwrap_or_default().to_string();
///     ctx.json(&serde_json::json!({ "id": id }))
/// })
/// .unwrap()
/// .summary("Fetch one user");
///
/// let mut ctx = Context::new(Method::GET, "/users/42");
/// app.dispatch(&mut ctx);
/// assert_eq!(ctx.status(), StatusCode::OK);
///
/// let mut ctx = Context::new(Method::DELETE, "/users/42");
/// app.dispatch(&mut ctx);
/// assert_eq!(ctx.status(), StatusCode::METHOD_NOT_ALLOWED);
/// assert_eq!(ctx.response_header("allow"), Some("GET"));
/// ```
pub struct App {
    router: Router<usize>,
    routes: Vec<Arc<Route>>,
    middleware: Vec<MiddlewareEntry>,
    chain: Chain,
    plugins: Vec<PluginEntry>,
    next_plugin_id: u64,
    installing: Option<u64>,
    services: Services,
    service_owners: Vec<ServiceEntry>,
    config: ConfigStore,
    dev_mode: bool,
    started: bool,
    no_route: Option<BoxHandler>,
    no_method: Option<BoxHandler>,
    on_error: Option<ErrorHook>,
    on_ready: Vec<ReadyHook>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Creates an empty application with default configuration.
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            routes: Vec::new(),
            middleware: Vec::new(),
            chain: Chain::new(),
            plugins: Vec::new(),
            next_plugin_id: 0,
            installing: None,
            services: Services::new(),
            service_owners: Vec::new(),
            config: ConfigStore::new(),
            dev_mode: false,
            started: false,
            no_route: None,
            no_method: None,
            on_error: None,
            on_ready: Vec::new(),
        }
    }

    /// Creates an application reading `server.dev_mode` from `config`.
    pub fn with_config(config: ConfigStore) -> Self {
        let mut app = Self::new();
        app.dev_mode = config.get_bool("server.dev_mode").unwrap_or(false);
        app.config = config;
        app
    }

    /// The configuration tree.
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Mutable access to the configuration tree.
    pub fn config_mut(&mut self) -> &mut ConfigStore {
        &mut self.config
    }

    /// Returns true in development mode.
    pub fn is_dev_mode(&self) -> bool {
        self.dev_mode
    }

    /// Switches development mode on or off.
    pub fn set_dev_mode(&mut self, dev_mode: bool) -> &mut Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Returns true between [`App::start`] and [`App::shutdown`].
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Installs the global `tracing` subscriber from the `logging` section.
    ///
    /// Without a `logging` section, development mode gets
    /// [`LogConfig::development`] and everything else
    /// [`LogConfig::production`].
    pub fn init_logging(&self) -> TrellisResult<()> {
        let config = match self.config.section::<LogConfig>("logging") {
            Ok(Some(config)) => config,
            Ok(None) if self.dev_mode => LogConfig::development(),
            Ok(None) => LogConfig::production(),
            Err(e) => return Err(TrellisError::config(e.to_string())),
        };
        trellis_telemetry::init_logging(&config)
            .map_err(|e| TrellisError::internal_with("failed to initialize logging", e))
    }

    // ---------------------------------------------------------------------
    // Routes
    // ---------------------------------------------------------------------

    /// Registers `route`.
    ///
    /// Returns the stored route so documentation can be attached.
    pub fn add(&mut self, route: Route) -> TrellisResult<&mut Route> {
        let index = self.routes.len();
        if let Err(err) = self
            .router
            .insert_filter(route.method().clone(), route.path(), index)
        {
            tracing::warn!(
                http.method = route.method().as_str(),
                http.path = route.path(),
                error = %err,
                "route rejected"
            );
            return Err(err.into());
        }
        tracing::debug!(
            http.method = route.method().as_str(),
            http.path = route.path(),
            "route registered"
        );
        self.routes.push(Arc::new(route));
        Ok(Arc::make_mut(&mut self.routes[index]))
    }

    /// Registers a closure for `method` and `path`.
    pub fn route<F>(
        &mut self,
        method: impl Into<MethodFilter>,
        path: &str,
        handler_fn: F,
    ) -> TrellisResult<&mut Route>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add(Route::new(method, path, handler(handler_fn)))
    }

    /// Registers a [`Handler`] value for `method` and `path`.
    pub fn route_handler<H: Handler>(
        &mut self,
        method: impl Into<MethodFilter>,
        path: &str,
        handler: H,
    ) -> TrellisResult<&mut Route> {
        self.add(Route::new(method, path, Arc::new(handler)))
    }

    /// Registers a GET route.
    pub fn get<F>(&mut self, path: &str, handler_fn: F) -> TrellisResult<&mut Route>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.route(Method::GET, path, handler_fn)
    }

    /// Registers a POST route.
    pub fn post<F>(&mut self, path: &str, handler_fn: F) -> TrellisResult<&mut Route>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.route(Method::POST, path, handler_fn)
    }

    /// Registers a PUT route.
    pub fn put<F>(&mut self, path: &str, handler_fn: F) -> TrellisResult<&mut Route>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.route(Method::PUT, path, handler_fn)
    }

    /// Registers a PATCH route.
    pub fn patch<F>(&mut self, path: &str, handler_fn: F) -> TrellisResult<&mut Route>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, path, handler_fn)
    }

    /// Registers a DELETE route.
    pub fn delete<F>(&mut self, path: &str, handler_fn: F) -> TrellisResult<&mut Route>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, path, handler_fn)
    }

    /// Registers a route accepting every method.
    ///
    /// A route registered for a specific method on the same path wins.
    pub fn any<F>(&mut self, path: &str, handler_fn: F) -> TrellisResult<&mut Route>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.route(MethodFilter::Any, path, handler_fn)
    }

    /// Opens a registration scope under `prefix`.
    ///
    /// ```
    /// use trellis::App;
    ///
    /// let mut app = App::new();
    /// let mut api = app.group("/api/v1");
    /// api.get("/users", |ctx| { ctx.text("[]"); Ok(()) }).unwrap();
    ///
    /// assert_eq!(app.routes()[0].path(), "/api/v1/users");
    /// ```
    pub fn group(&mut self, prefix: &str) -> AppGroup<'_> {
        AppGroup::new(self, prefix)
    }

    /// Runs `register` against a group under `prefix`.
    pub fn group_with<F>(&mut self, prefix: &str, register: F) -> TrellisResult<&mut Self>
    where
        F: FnOnce(&mut AppGroup<'_>) -> TrellisResult<()>,
    {
        register(&mut self.group(prefix))?;
        Ok(self)
    }

    /// Registers every route in `routes`.
    ///
    /// Either all of them are registered or, on the first rejection, none.
    pub fn register(&mut self, routes: Routes) -> TrellisResult<&mut Self> {
        let router = self.router.clone();
        let len = self.routes.len();
        for route in routes {
            if let Err(err) = self.add(route).map(|_| ()) {
                self.router = router;
                self.routes.truncate(len);
                return Err(err);
            }
        }
        Ok(self)
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Methods registered for `path`, in canonical order.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        self.router.allowed_methods(path)
    }

    // ---------------------------------------------------------------------
    // Middleware and fallbacks
    // ---------------------------------------------------------------------

    /// Appends `middleware` to the chain.
    ///
    /// Inside a plugin's `config`, the middleware belongs to that plugin
    /// and is removed with it.
    pub fn middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.middleware_boxed(Arc::new(middleware))
    }

    /// Appends an already shared middleware to the chain.
    pub fn middleware_boxed(&mut self, stage: BoxedMiddleware) -> &mut Self {
        tracing::debug!(
            middleware = stage.name(),
            owner = ?self.installing,
            "middleware added"
        );
        self.middleware.push(MiddlewareEntry {
            owner: self.installing,
            stage,
        });
        self.rebuild_chain();
        self
    }

    /// Appends a closure middleware named `name`.
    pub fn middleware_fn<F>(&mut self, name: &'static str, func: F) -> &mut Self
    where
        F: Fn(&mut Context, Next<'_>) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.middleware(FnMiddleware::new(name, func))
    }

    /// Names of the installed middleware, outermost first.
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.chain.stage_names()
    }

    /// Replaces the default 404 handling.
    pub fn no_route<F>(&mut self, handler_fn: F) -> &mut Self
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.no_route = Some(handler(handler_fn));
        self
    }

    /// Replaces the default 405 handling.
    ///
    /// The handler finds the accepted methods in state under
    /// [`ALLOWED_METHODS_STATE_KEY`].
    pub fn no_method<F>(&mut self, handler_fn: F) -> &mut Self
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.no_method = Some(handler(handler_fn));
        self
    }

    /// Replaces the default error rendering of [`App::render_error`].
    pub fn on_error<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Context, &TrellisError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    fn rebuild_chain(&mut self) {
        self.chain = self
            .middleware
            .iter()
            .map(|entry| Arc::clone(&entry.stage))
            .collect();
    }

    // ---------------------------------------------------------------------
    // Services
    // ---------------------------------------------------------------------

    /// Shared instances published during setup.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Publishes `service` under its type.
    ///
    /// Inside a plugin's `config`, the service is withdrawn when the plugin
    /// is removed.
    pub fn provide<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.services.register(service);
        self.track_service::<T>(None);
        self
    }

    /// Publishes `service` under its type and `name`.
    pub fn provide_named<T: Send + Sync + 'static>(
        &mut self,
        name: impl Into<String>,
        service: Arc<T>,
    ) -> &mut Self {
        let name = name.into();
        self.services.register_named(name.clone(), service);
        self.track_service::<T>(Some(name));
        self
    }

    /// Looks up a service published under its type.
    pub fn service<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services.resolve()
    }

    /// Looks up a service published under its type and `name`.
    pub fn service_named<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.services.resolve_named(name)
    }

    fn track_service<T: 'static>(&mut self, name: Option<String>) {
        if let Some(owner) = self.installing {
            self.service_owners.push(ServiceEntry {
                owner,
                type_id: TypeId::of::<T>(),
                name,
            });
        }
    }

    // ---------------------------------------------------------------------
    // Plugins
    // ---------------------------------------------------------------------

    /// Installs `plugin` by running its `config` right away.
    ///
    /// If `config` fails, routes, middleware, services and nested plugins
    /// it registered are rolled back and the plugin is not kept.
    pub fn use_plugin<P: Plugin>(&mut self, mut plugin: P) -> TrellisResult<&mut Self> {
        let id = self.next_plugin_id;
        self.next_plugin_id += 1;
        let name = plugin.name().to_string();
        let checkpoint = Checkpoint {
            router: self.router.clone(),
            routes: self.routes.len(),
            services: self.services.clone(),
        };

        let previous = self.installing.replace(id);
        let result = plugin.config(self);
        self.installing = previous;

        if let Err(err) = result {
            tracing::warn!(plugin = %name, error = %err, "plugin config failed, rolling back");
            self.rollback(id, checkpoint);
            return Err(TrellisError::plugin(name, PluginPhase::Config, err));
        }

        self.plugins.push(PluginEntry {
            id,
            type_id: TypeId::of::<P>(),
            plugin: Box::new(plugin),
        });
        tracing::info!(plugin = %name, "plugin installed");
        Ok(self)
    }

    /// Removes the first plugin of type `P`, along with the middleware and
    /// services it installed, then runs its `uninstall`.
    ///
    /// Routes it registered stay in place. Does nothing if no such plugin
    /// is installed.
    pub fn unuse<P: Plugin>(&mut self) -> TrellisResult<()> {
        let type_id = TypeId::of::<P>();
        match self.plugins.iter().position(|e| e.type_id == type_id) {
            Some(pos) => {
                let entry = self.plugins.remove(pos);
                self.remove_plugin(entry)
            }
            None => Ok(()),
        }
    }

    /// The first installed plugin of type `P`.
    pub fn get_plugin<P: Plugin>(&self) -> Option<&P> {
        self.plugins
            .iter()
            .find_map(|e| e.plugin.as_any().downcast_ref::<P>())
    }

    /// Mutable access to the first installed plugin of type `P`.
    pub fn get_plugin_mut<P: Plugin>(&mut self) -> Option<&mut P> {
        self.plugins
            .iter_mut()
            .find_map(|e| e.plugin.as_any_mut().downcast_mut::<P>())
    }

    /// Returns true if a plugin of type `P` is installed.
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        let type_id = TypeId::of::<P>();
        self.plugins.iter().any(|e| e.type_id == type_id)
    }

    /// Names of the installed plugins in install order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|e| e.plugin.name()).collect()
    }

    /// Registers a callback run once by [`App::start`].
    pub fn on_ready<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnOnce(&App) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.on_ready.push(Box::new(hook));
        self
    }

    /// Finishes setup.
    ///
    /// Validates the `server` section, logs the route table in development
    /// mode and runs the `on_ready` callbacks in registration order.
    pub fn start(&mut self) -> TrellisResult<()> {
        if self.started {
            return Ok(());
        }
        let settings = ServerSettings::from_store(&self.config)
            .map_err(|e| TrellisError::config(e.to_string()))?;

        if self.dev_mode {
            for (method, pattern) in self.router.routes() {
                tracing::info!(http.method = method.as_str(), route = pattern, "route");
            }
        }

        for hook in std::mem::take(&mut self.on_ready) {
            hook(&*self)?;
        }

        self.started = true;
        tracing::info!(
            addr = %settings.addr(),
            env = %settings.env,
            dev_mode = self.dev_mode,
            routes = self.routes.len(),
            plugins = self.plugins.len(),
            "application started"
        );
        Ok(())
    }

    /// Uninstalls every plugin, last installed first.
    ///
    /// Every plugin is attempted; the first failure is returned.
    pub fn shutdown(&mut self) -> TrellisResult<()> {
        let mut first_error = None;
        while let Some(entry) = self.plugins.pop() {
            if let Err(err) = self.remove_plugin(entry) {
                first_error.get_or_insert(err);
            }
        }
        self.started = false;
        tracing::info!("application stopped");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn remove_plugin(&mut self, mut entry: PluginEntry) -> TrellisResult<()> {
        self.release_owned(entry.id);
        let name = entry.plugin.name().to_string();
        match entry.plugin.uninstall() {
            Ok(()) => {
                tracing::info!(plugin = %name, "plugin uninstalled");
                Ok(())
            }
            Err(err) => {
                tracing::error!(plugin = %name, error = %err, "plugin uninstall failed");
                Err(TrellisError::plugin(name, PluginPhase::Uninstall, err))
            }
        }
    }

    fn release_owned(&mut self, id: u64) {
        let before = self.middleware.len();
        self.middleware.retain(|m| m.owner != Some(id));
        if self.middleware.len() != before {
            self.rebuild_chain();
        }

        let services = &mut self.services;
        self.service_owners.retain(|s| {
            if s.owner == id {
                services.remove_by_type_id(s.type_id, s.name.as_deref());
                false
            } else {
                true
            }
        });
    }

    fn rollback(&mut self, id: u64, checkpoint: Checkpoint) {
        // plugins installed by the failed one have larger ids
        while let Some(pos) = self.plugins.iter().rposition(|e| e.id > id) {
            let entry = self.plugins.remove(pos);
            if let Err(err) = self.remove_plugin(entry) {
                tracing::warn!(error = %err, "nested plugin failed to uninstall during rollback");
            }
        }

        self.middleware.retain(|m| m.owner.map_or(true, |o| o < id));
        self.rebuild_chain();
        self.service_owners.retain(|s| s.owner < id);
        self.router = checkpoint.router;
        self.routes.truncate(checkpoint.routes);
        self.services = checkpoint.services;
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Routes `ctx` and runs the middleware chain around the handler.
    ///
    /// Unmatched requests go through the chain too, ending in the
    /// `no_route` / `no_method` handler or an error carrying 404 / 405.
    /// Errors are returned, not rendered; see [`App::dispatch`].
    pub fn handle(&self, ctx: &mut Context) -> TrellisResult<()> {
        match self.router.lookup(ctx.method(), ctx.path()) {
            Lookup::Found(found) => {
                let route = self
                    .routes
                    .get(*found.value)
                    .map(Arc::clone)
                    .ok_or_else(|| TrellisError::internal("route table out of sync"))?;
                tracing::Span::current().record(fields::ROUTE, found.pattern);
                ctx.set_params(found.params);
                ctx.set_route(Arc::clone(&route));
                self.chain.run(ctx, route.handler().as_ref())
            }
            Lookup::MethodNotAllowed { allowed } => match &self.no_method {
                Some(custom) => {
                    ctx.put_state(ALLOWED_METHODS_STATE_KEY, allowed);
                    self.chain.run(ctx, custom.as_ref())
                }
                None => self.chain.run(ctx, &MethodNotAllowed { allowed }),
            },
            Lookup::NotFound => match &self.no_route {
                Some(custom) => self.chain.run(ctx, custom.as_ref()),
                None => self.chain.run(ctx, &NotFound),
            },
        }
    }

    /// [`App::handle`], then [`App::render_error`] on failure, inside a
    /// request span.
    pub fn dispatch(&self, ctx: &mut Context) {
        let span = request_span(ctx.method().as_str(), ctx.path());
        let _entered = span.enter();
        if let Err(err) = self.handle(ctx) {
            self.render_error(ctx, &err);
        }
        span.record(fields::HTTP_STATUS, ctx.status().as_u16());
    }

    /// Writes the response for an error that escaped the chain.
    ///
    /// The body is `{"error": <reason phrase>}`; development mode adds
    /// `message` and `type`. A hook installed with [`App::on_error`]
    /// replaces all of this.
    pub fn render_error(&self, ctx: &mut Context, err: &TrellisError) {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!(error = %err, kind = err.kind(), "request failed");
        } else {
            tracing::debug!(error = %err, kind = err.kind(), "request rejected");
        }

        if let Some(hook) = &self.on_error {
            hook(ctx, err);
            return;
        }

        let reason = status.canonical_reason().unwrap_or("Error");
        let mut body = json!({ "error": reason });
        if self.dev_mode {
            body["message"] = json!(err.to_string());
            body["type"] = json!(err.kind());
        }
        if let TrellisError::MethodNotAllowed { allowed, .. } = err {
            if let Some(value) = allow_header(allowed) {
                ctx.set_header(ALLOW, value);
            }
        }

        ctx.set_status(status);
        if ctx.json(&body).is_err() {
            ctx.text(reason);
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware_names())
            .field("plugins", &self.plugin_names())
            .field("dev_mode", &self.dev_mode)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

/// Terminal handler for paths with no endpoint.
struct NotFound;

impl Handler for NotFound {
    fn call(&self, ctx: &mut Context) -> TrellisResult<()> {
        Err(TrellisError::NotFound {
            method: ctx.method().clone(),
            path: ctx.path().to_string(),
        })
    }
}

/// Terminal handler for endpoints without the request method.
struct MethodNotAllowed {
    allowed: Vec<Method>,
}

impl Handler for MethodNotAllowed {
    fn call(&self, ctx: &mut Context) -> TrellisResult<()> {
        Err(TrellisError::MethodNotAllowed {
            method: ctx.method().clone(),
            path: ctx.path().to_string(),
            allowed: self.allowed.clone(),
        })
    }
}

fn allow_header(allowed: &[Method]) -> Option<HeaderValue> {
    let joined = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    HeaderValue::from_str(&joined).ok()
}
