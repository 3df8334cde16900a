//! Prefixed route registration.

use http::Method;

use crate::error::RouteResult;
use crate::method_map::MethodFilter;
use crate::node::normalize;
use crate::router::Router;

/// Joins a group prefix and a route suffix into one normalized pattern.
///
/// Both sides may omit or repeat slashes: `join("users", "/list/")` and
/// `join("/users/", "list")` both give `/users/list`.
#[must_use]
pub fn join(prefix: &str, suffix: &str) -> String {
    normalize(&format!("{prefix}/{suffix}"))
}

/// A registrar writing prefixed patterns into a parent [`Router`].
///
/// Created by [`Router::group`]. Nested groups concatenate prefixes.
#[derive(Debug)]
pub struct Group<'r, T> {
    router: &'r mut Router<T>,
    prefix: String,
}

impl<'r, T> Group<'r, T> {
    pub(crate) fn new(router: &'r mut Router<T>, prefix: &str) -> Self {
        Self {
            router,
            prefix: normalize(prefix),
        }
    }

    /// The normalized prefix of this group.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registers `value` under `prefix + pattern` for `filter`.
    pub fn insert_filter(
        &mut self,
        filter: MethodFilter,
        pattern: &str,
        value: T,
    ) -> RouteResult<()> {
        let full = join(&self.prefix, pattern);
        self.router.insert_filter(filter, &full, value)
    }

    /// Registers `value` under `prefix + pattern` for `method`.
    pub fn insert(&mut self, method: Method, pattern: &str, value: T) -> RouteResult<()> {
        self.insert_filter(MethodFilter::Exact(method), pattern, value)
    }

    /// Registers `value` under `prefix + pattern` for every method.
    pub fn insert_any(&mut self, pattern: &str, value: T) -> RouteResult<()> {
        self.insert_filter(MethodFilter::Any, pattern, value)
    }

    /// Registers a `GET` route.
    pub fn get(&mut self, pattern: &str, value: T) -> RouteResult<()> {
        self.insert(Method::GET, pattern, value)
    }

    /// Registers a `POST` route.
    pub fn post(&mut self, pattern: &str, value: T) -> RouteResult<()> {
        self.insert(Method::POST, pattern, value)
    }

    /// Registers a `PUT` route.
    pub fn put(&mut self, pattern: &str, value: T) -> RouteResult<()> {
        self.insert(Method::PUT, pattern, value)
    }

    /// Registers a `PATCH` route.
    pub fn patch(&mut self, pattern: &str, value: T) -> RouteResult<()> {
        self.insert(Method::PATCH, pattern, value)
    }

    /// Registers a `DELETE` route.
    pub fn delete(&mut self, pattern: &str, value: T) -> RouteResult<()> {
        self.insert(Method::DELETE, pattern, value)
    }

    /// Opens a nested group below this one.
    pub fn group(&mut self, prefix: &str) -> Group<'_, T> {
        let prefix = join(&self.prefix, prefix);
        Group {
            router: &mut *self.router,
            prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_normalizes() {
        assert_eq!(join("users", "list"), "/users/list");
        assert_eq!(join("/users/", "/list/"), "/users/list");
        assert_eq!(join("/", "/"), "/");
        assert_eq!(join("api", ":id"), "/api/:id");
    }

    #[test]
    fn test_group_registers_into_parent() {
        let mut router = Router::new();
        {
            let mut users = router.group("users");
            users.get("list", "list").unwrap();
            users.post("", "create").unwrap();
            users.get(":id", "show").unwrap();
        }
        router.get("/health", "health").unwrap();

        assert_eq!(router.len(), 4);
        assert_eq!(*router.match_route(&Method::GET, "/users/list").unwrap().value, "list");
        assert_eq!(*router.match_route(&Method::POST, "/users").unwrap().value, "create");
        let m = router.match_route(&Method::GET, "/users/9").unwrap();
        assert_eq!(*m.value, "show");
        assert_eq!(m.params.get("id"), Some("9"));
    }

    #[test]
    fn test_nested_groups() {
        let mut router = Router::new();
        let mut api = router.group("/api");
        let mut v1 = api.group("v1/");
        assert_eq!(v1.prefix(), "/api/v1");
        v1.insert_any("echo/*rest", ()).unwrap();

        assert!(router.match_route(&Method::PATCH, "/api/v1/echo/a/b").is_some());
    }

    #[test]
    fn test_group_propagates_errors() {
        let mut router: Router<()> = Router::new();
        let mut files = router.group("files");
        assert!(files.get("*path/edit", ()).is_err());
        assert!(router.is_empty());
    }
}
