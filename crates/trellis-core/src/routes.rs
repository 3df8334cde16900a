//! Batch route registration with a fluent builder.
//!
//! ```rust
//! use trellis_core::Routes;
//!
//! let mut routes = Routes::new();
//! routes
//!     .get("/users", |ctx| { ctx.text("all"); Ok(()) })
//!     .summary("List users")
//!     .tags(["users"])
//!     .post("/users", |_| Ok(()))
//!     .summary("Create user")
//!     .response::<()>(201, "Created")
//!     .end();
//!
//! assert_eq!(routes.len(), 2);
//! assert_eq!(routes.iter().nth(1).unwrap().doc().summary.as_deref(), Some("Create user"));
//! ```

use http::Method;
use trellis_router::MethodFilter;

use crate::handler::{BoxHandler, Handler};
use crate::route::Route;
use crate::{Context, TrellisResult};

/// An ordered collection of routes, registered together.
#[derive(Debug, Clone, Default)]
pub struct Routes {
    routes: Vec<Route>,
}

impl Routes {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route and returns a cursor bound to it.
    pub fn add<F>(&mut self, method: impl Into<MethodFilter>, path: &str, handler: F) -> RouteBuilder<'_>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add_handler(method, path, std::sync::Arc::new(handler))
    }

    /// Adds a route with an already boxed handler.
    pub fn add_handler(
        &mut self,
        method: impl Into<MethodFilter>,
        path: &str,
        handler: BoxHandler,
    ) -> RouteBuilder<'_> {
        self.push(Route::new(method, path, handler));
        RouteBuilder { routes: self }
    }

    /// Appends a fully built route.
    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Adds a `GET` route.
    pub fn get<F>(&mut self, path: &str, handler: F) -> RouteBuilder<'_>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add(Method::GET, path, handler)
    }

    /// Adds a `POST` route.
    pub fn post<F>(&mut self, path: &str, handler: F) -> RouteBuilder<'_>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add(Method::POST, path, handler)
    }

    /// Adds a `PUT` route.
    pub fn put<F>(&mut self, path: &str, handler: F) -> RouteBuilder<'_>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add(Method::PUT, path, handler)
    }

    /// Adds a `PATCH` route.
    pub fn patch<F>(&mut self, path: &str, handler: F) -> RouteBuilder<'_>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add(Method::PATCH, path, handler)
    }

    /// Adds a `DELETE` route.
    pub fn delete<F>(&mut self, path: &str, handler: F) -> RouteBuilder<'_>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add(Method::DELETE, path, handler)
    }

    /// Adds a `HEAD` route.
    pub fn head<F>(&mut self, path: &str, handler: F) -> RouteBuilder<'_>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add(Method::HEAD, path, handler)
    }

    /// Adds an `OPTIONS` route.
    pub fn options<F>(&mut self, path: &str, handler: F) -> RouteBuilder<'_>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add(Method::OPTIONS, path, handler)
    }

    /// Adds a route answering every method.
    pub fn any<F>(&mut self, path: &str, handler: F) -> RouteBuilder<'_>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.add(MethodFilter::Any, path, handler)
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes were added.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterates over the routes in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Route> {
        self.routes.iter()
    }
}

impl IntoIterator for Routes {
    type Item = Route;
    type IntoIter = std::vec::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.into_iter()
    }
}

impl<'a> IntoIterator for &'a Routes {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

/// A cursor on the most recently added route of a [`Routes`] collection.
///
/// Metadata calls apply to that route; method calls add the next route
/// and move the cursor to it. The cursor borrows the collection, it never
/// copies the route.
#[derive(Debug)]
pub struct RouteBuilder<'a> {
    routes: &'a mut Routes,
}

impl<'a> RouteBuilder<'a> {
    fn current(&mut self) -> &mut Route {
        let routes = &mut self.routes.routes;
        let last = routes.len() - 1;
        &mut routes[last]
    }

    /// The route under the cursor.
    pub fn route(&mut self) -> &mut Route {
        self.current()
    }

    /// Sets the summary.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.current().summary(summary);
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.current().description(description);
        self
    }

    /// Replaces the tags.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.current().tags(tags);
        self
    }

    /// Documents a parameter of type `T`.
    pub fn param<T: ?Sized>(
        mut self,
        name: impl Into<String>,
        required: bool,
        description: impl Into<String>,
    ) -> Self {
        self.current().param::<T>(name, required, description);
        self
    }

    /// Documents a request header of type `T`.
    pub fn header_param<T: ?Sized>(
        mut self,
        name: impl Into<String>,
        required: bool,
        description: impl Into<String>,
    ) -> Self {
        self.current().header_param::<T>(name, required, description);
        self
    }

    /// Documents the request body as type `T`.
    pub fn body<T: ?Sized>(mut self, description: impl Into<String>) -> Self {
        self.current().body::<T>(description);
        self
    }

    /// Documents a response.
    pub fn response<T: ?Sized>(mut self, status: u16, description: impl Into<String>) -> Self {
        self.current().response::<T>(status, description);
        self
    }

    /// Marks the route deprecated.
    pub fn deprecated(mut self) -> Self {
        self.current().deprecated();
        self
    }

    /// Adds the next route.
    pub fn add<F>(self, method: impl Into<MethodFilter>, path: &str, handler: F) -> RouteBuilder<'a>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.routes.add(method, path, handler)
    }

    /// Adds the next route with a struct handler.
    pub fn handler<H: Handler>(self, method: impl Into<MethodFilter>, path: &str, handler: H) -> RouteBuilder<'a> {
        self.routes.add_handler(method, path, std::sync::Arc::new(handler))
    }

    /// Adds a `GET` route.
    pub fn get<F>(self, path: &str, handler: F) -> RouteBuilder<'a>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.routes.add(Method::GET, path, handler)
    }

    /// Adds a `POST` route.
    pub fn post<F>(self, path: &str, handler: F) -> RouteBuilder<'a>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.routes.add(Method::POST, path, handler)
    }

    /// Adds a `PUT` route.
    pub fn put<F>(self, path: &str, handler: F) -> RouteBuilder<'a>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.routes.add(Method::PUT, path, handler)
    }

    /// Adds a `PATCH` route.
    pub fn patch<F>(self, path: &str, handler: F) -> RouteBuilder<'a>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.routes.add(Method::PATCH, path, handler)
    }

    /// Adds a `DELETE` route.
    pub fn delete<F>(self, path: &str, handler: F) -> RouteBuilder<'a>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.routes.add(Method::DELETE, path, handler)
    }

    /// Adds a `HEAD` route.
    pub fn head<F>(self, path: &str, handler: F) -> RouteBuilder<'a>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.routes.add(Method::HEAD, path, handler)
    }

    /// Adds an `OPTIONS` route.
    pub fn options<F>(self, path: &str, handler: F) -> RouteBuilder<'a>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.routes.add(Method::OPTIONS, path, handler)
    }

    /// Adds a route answering every method.
    pub fn any<F>(self, path: &str, handler: F) -> RouteBuilder<'a>
    where
        F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
    {
        self.routes.add(MethodFilter::Any, path, handler)
    }

    /// Finishes the chain, returning the collection.
    pub fn end(self) -> &'a mut Routes {
        self.routes
    }
}
