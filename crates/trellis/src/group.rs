//! Prefixed registration on an [`App`].

use std::sync::Arc;

use http::Method;
use trellis_core::{handler, Context, Handler, MethodFilter, Route, TrellisResult};
use trellis_router::join;

use crate::App;

/// Registers routes under a shared prefix.
///
/// Created by [`App::group`]. Nested groups concatenate prefixes.
///
/// ```
/// use trellis::App;
///
/// let mut app = App::new();
/// app.group_with("/api", |api| {
///     let mut users = api.group("/users");
///     users.get("/:id", |ctx| { ctx.text("user"); Ok(()) })?;
///     Ok(())
/// })
/// .unwrap();
///
/// assert_eq!(app.routes()[0].path(), "/api/users/:id");
/// ```
pub struct AppGroup<'a> {
    app: &'a mut App,
    prefix: String,
}

impl<'a> AppGroup<'a> {
    pub(crate) fn new(app: &'a mut App, prefix: &str) -> Self {
        Self {
            app,
            prefix: join(prefix, ""),
        }
    }

    /// The normalized prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registers a closure for `method` at `prefix + path`.
    pub fn route<F>(
        &mut self,
        method: impl Into<MethodFilter>,
        path: &str,
        handler_fn: F,
    ) -> TrellisResult<&mut Route>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        let full = join(&self.prefix, path);
        self.app.add(Route::new(method, full, handler(handler_fn)))
    }

    /// Registers a [`Handler`] value for `method` at `prefix + path`.
    pub fn route_handler<H: Handler>(
        &mut self,
        method: impl Into<MethodFilter>,
        path: &str,
        handler: H,
    ) -> TrellisResult<&mut Route> {
        let full = join(&self.prefix, path);
        self.app.add(Route::new(method, full, Arc::new(handler)))
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
    pub fn any<F>(&mut self, path: &str, handler_fn: F) -> TrellisResult<&mut Route>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.route(MethodFilter::Any, path, handler_fn)
    }

    /// Opens a nested group under `prefix`.
    pub fn group(&mut self, prefix: &str) -> AppGroup<'_> {
        let nested = join(&self.prefix, prefix);
        AppGroup::new(self.app, &nested)
    }
}

impl std::fmt::Debug for AppGroup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppGroup")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_prefixes_are_normalized() {
        let mut app = App::new();
        let group = app.group("api/");
        assert_eq!(group.prefix(), "/api");

        let mut root = app.group("/");
        assert_eq!(root.prefix(), "/");
        root.get("/ping", |ctx| {
            ctx.text("pong");
            Ok(())
        })
        .unwrap();
        assert_eq!(app.routes()[0].path(), "/ping");
    }

    #[test]
    fn test_nested_groups_dispatch() {
        let mut app = App::new();
        {
            let mut api = app.group("/api");
            let mut v1 = api.group("v1");
            v1.get("/users/:id", |ctx| {
                let id = ctx.param("id").unwrap_or_default().to_string();
                ctx.text(id);
                Ok(())
            })
            .unwrap()
            .summary("Get user");
        }

        let mut ctx = Context::new(Method::GET, "/api/v1/users/5");
        app.handle(&mut ctx).unwrap();
        assert_eq!(ctx.status(), StatusCode::OK);
        assert_eq!(ctx.response_body().as_ref(), b"5");
        assert_eq!(app.routes()[0].doc().summary.as_deref(), Some("Get user"));
    }

    #[test]
    fn test_group_with_propagates_errors() {
        let mut app = App::new();
        let result = app.group_with("/dup", |g| {
            g.get("/a", |_| Ok(()))?;
            g.get("/a", |_| Ok(()))?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(app.routes().len(), 1);
    }
}
