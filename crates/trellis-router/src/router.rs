//! High-level router API.
//!
//! This module provides the main [`Router`] struct which is the primary
//! interface for building and matching routes.

use http::Method;
use smallvec::SmallVec;

use crate::error::RouteResult;
use crate::group::Group;
use crate::method_map::{sort_methods, MethodFilter};
use crate::node::{normalize, parse_pattern, split_path, Node};
use crate::params::Params;
use crate::{Lookup, RouteMatch};

/// A radix tree router mapping `(method, path)` to values of type `T`.
///
/// `T` is whatever the caller dispatches to: a handler, an index into a
/// route table, an operation name.
///
/// # Example
///
/// ```rust
/// use trellis_router::Router;
/// use http::Method;
///
/// let mut router = Router::new();
/// router.get("/users/:id", "getUser").unwrap();
/// router.get("/users/:id/posts/:postId", "getPost").unwrap();
///
/// let m = router.match_route(&Method::GET, "/users/42/posts/7").unwrap();
/// assert_eq!(*m.value, "getPost");
/// assert_eq!(m.params.get("id"), Some("42"));
/// assert_eq!(m.params.get("postId"), Some("7"));
/// ```
///
/// # Route Priority
///
/// At every segment the router tries, in order:
///
/// 1. **Literal segments** (e.g. `/users/me`)
/// 2. **Parameter segments** (e.g. `/users/:id`)
/// 3. **Wildcard segments** (e.g. `/files/*path`)
///
/// A less specific branch is only tried when the more specific one
/// fails to reach an endpoint for the request method.
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    /// Registered `(method, normalized pattern)` pairs in insertion order
    routes: Vec<(MethodFilter, String)>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            routes: Vec::new(),
        }
    }

    /// Registers `value` for `filter` and `pattern`.
    ///
    /// The pattern must start with `/`. Doubled and trailing slashes are
    /// ignored. Fails without modifying the tree if the pattern is
    /// malformed or collides with an existing registration.
    pub fn insert_filter(
        &mut self,
        filter: MethodFilter,
        pattern: &str,
        value: T,
    ) -> RouteResult<()> {
        let segments = parse_pattern(pattern)?;
        let normalized = normalize(pattern);
        self.root
            .insert_segments(&segments, filter.clone(), value, &normalized)?;
        self.routes.push((filter, normalized));
        Ok(())
    }

    /// Registers `value` for `method` and `pattern`.
    pub fn insert(&mut self, method: Method, pattern: &str, value: T) -> RouteResult<()> {
        self.insert_filter(MethodFilter::Exact(method), pattern, value)
    }

    /// Registers `value` for every method on `pattern`.
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

    /// Returns a registrar that prefixes every pattern with `prefix`.
    ///
    /// Grouped routes live in this same tree and match exactly like
    /// routes registered directly.
    ///
    /// ```rust
    /// use trellis_router::Router;
    /// use http::Method;
    ///
    /// let mut router = Router::new();
    /// router.group("api").group("v1").get("users", 1).unwrap();
    ///
    /// assert!(router.match_route(&Method::GET, "/api/v1/users").is_some());
    /// ```
    pub fn group(&mut self, prefix: &str) -> Group<'_, T> {
        Group::new(self, prefix)
    }

    /// Matches `method` and `path`.
    ///
    /// Returns `None` if no endpoint matches the path or the endpoint has
    /// nothing registered for `method`.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        match self.lookup(method, path) {
            Lookup::Found(m) => Some(m),
            Lookup::MethodNotAllowed { .. } | Lookup::NotFound => None,
        }
    }

    /// Matches `method` and `path`, telling a wrong method apart from an
    /// unknown path.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<'_, T> {
        let segments: SmallVec<[&str; 8]> = split_path(path).collect();
        let mut params = Params::new();
        if let Some(node) = self.root.find(&segments, Some(method), &mut params) {
            if let Some(value) = node.methods().get(method) {
                return Lookup::Found(RouteMatch {
                    value,
                    params,
                    pattern: node.pattern(),
                });
            }
        }

        params.clear();
        if self.root.find(&segments, None, &mut params).is_none() {
            return Lookup::NotFound;
        }
        Lookup::MethodNotAllowed {
            allowed: self.allowed_methods(path),
        }
    }

    /// Lists the methods registered on every endpoint `path` can reach.
    ///
    /// Empty if the path matches nothing. An `ANY` registration is not
    /// listed since it does not name a method.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let segments: SmallVec<[&str; 8]> = split_path(path).collect();
        let mut allowed = Vec::new();
        self.root.collect_methods(&segments, &mut allowed);
        sort_methods(&mut allowed);
        allowed
    }

    /// Registered `(method, pattern)` pairs in insertion order.
    pub fn routes(&self) -> impl Iterator<Item = (&MethodFilter, &str)> {
        self.routes.iter().map(|(m, p)| (m, p.as_str()))
    }

    /// Returns the number of routes registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteError;

    #[test]
    fn test_router_new() {
        let router: Router<()> = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
        assert!(router.match_route(&Method::GET, "/").is_none());
    }

    #[test]
    fn test_router_static_vs_param_priority() {
        let mut router = Router::new();
        router.get("/users/:id", "getUser").unwrap();
        router.get("/users/me", "getCurrentUser").unwrap();

        let m = router.match_route(&Method::GET, "/users/me").unwrap();
        assert_eq!(*m.value, "getCurrentUser");
        assert!(m.params.is_empty());

        let m = router.match_route(&Method::GET, "/users/42").unwrap();
        assert_eq!(*m.value, "getUser");
        assert_eq!(m.params.get("id"), Some("42"));
    }

    #[test]
    fn test_router_param_vs_wildcard_priority() {
        let mut router = Router::new();
        router.get("/files/*path", "serveFile").unwrap();
        router.get("/files/:name", "fileInfo").unwrap();

        let m = router.match_route(&Method::GET, "/files/readme").unwrap();
        assert_eq!(*m.value, "fileInfo");

        let m = router.match_route(&Method::GET, "/files/docs/readme.md").unwrap();
        assert_eq!(*m.value, "serveFile");
        assert_eq!(m.params.get("path"), Some("docs/readme.md"));
    }

    #[test]
    fn test_router_root_route() {
        let mut router = Router::new();
        router.get("/", "index").unwrap();

        let m = router.match_route(&Method::GET, "/").unwrap();
        assert_eq!(*m.value, "index");
        assert_eq!(m.pattern, "/");
    }

    #[test]
    fn test_router_trailing_slash_is_ignored() {
        let mut router = Router::new();
        router.get("/users/", "listUsers").unwrap();

        assert!(router.match_route(&Method::GET, "/users").is_some());
        assert!(router.match_route(&Method::GET, "/users/").is_some());
        assert!(router.match_route(&Method::GET, "//users").is_some());
    }

    #[test]
    fn test_router_lookup_method_not_allowed() {
        let mut router = Router::new();
        router.get("/users", "listUsers").unwrap();
        router.post("/users", "createUser").unwrap();

        match router.lookup(&Method::DELETE, "/users") {
            Lookup::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
        assert!(matches!(router.lookup(&Method::GET, "/posts"), Lookup::NotFound));
        assert_eq!(router.allowed_methods("/users"), vec![Method::GET, Method::POST]);
        assert!(router.allowed_methods("/posts").is_empty());
    }

    #[test]
    fn test_router_any_method() {
        let mut router = Router::new();
        router.insert_any("/proxy/*rest", "proxy").unwrap();
        router.get("/proxy/*rest", "proxyGet").unwrap();

        let m = router.match_route(&Method::PUT, "/proxy/a/b").unwrap();
        assert_eq!(*m.value, "proxy");
        let m = router.match_route(&Method::GET, "/proxy/a/b").unwrap();
        assert_eq!(*m.value, "proxyGet");
    }

    #[test]
    fn test_router_rejects_duplicates() {
        let mut router = Router::new();
        router.get("/users", 1).unwrap();
        let err = router.get("/users/", 2).unwrap_err();
        assert_eq!(
            err,
            RouteError::Conflict {
                method: "GET".to_string(),
                pattern: "/users".to_string(),
            }
        );
        assert_eq!(router.len(), 1);
        assert_eq!(*router.match_route(&Method::GET, "/users").unwrap().value, 1);
    }

    #[test]
    fn test_router_rejects_second_param_name() {
        let mut router = Router::new();
        router.get("/users/:id", 1).unwrap();
        assert!(matches!(
            router.delete("/users/:userId", 2),
            Err(RouteError::ParamNameConflict { .. })
        ));
        assert!(matches!(
            router.get("/users/:id/*rest", 3).and_then(|()| router.get("/users/:id/*tail", 4)),
            Err(RouteError::WildcardNameConflict { .. })
        ));
    }

    #[test]
    fn test_router_routes_listing() {
        let mut router = Router::new();
        router.get("users", 0).unwrap_err();
        router.get("/a", 1).unwrap();
        router.insert_any("/b//c/", 2).unwrap();

        let listed: Vec<(String, &str)> = router
            .routes()
            .map(|(m, p)| (m.to_string(), p))
            .collect();
        assert_eq!(
            listed,
            vec![("GET".to_string(), "/a"), ("ANY".to_string(), "/b/c")]
        );
    }

    #[test]
    fn test_router_literal_falls_back_to_param_by_method() {
        let mut router = Router::new();
        router.get("/users/me", "me").unwrap();
        router.post("/users/:id", "updateUser").unwrap();

        let m = router.match_route(&Method::POST, "/users/me").unwrap();
        assert_eq!(*m.value, "updateUser");
        assert_eq!(m.params.get("id"), Some("me"));
        assert_eq!(m.pattern, "/users/:id");

        let m = router.match_route(&Method::GET, "/users/me").unwrap();
        assert_eq!(*m.value, "me");
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_router_param_falls_back_to_wildcard_by_method() {
        let mut router = Router::new();
        router.get("/files/:name", "fileInfo").unwrap();
        router.insert_any("/files/*path", "upload").unwrap();

        let m = router.match_route(&Method::PUT, "/files/a").unwrap();
        assert_eq!(*m.value, "upload");
        assert_eq!(m.params.get("path"), Some("a"));
        assert_eq!(m.params.get("name"), None);
    }

    #[test]
    fn test_router_allowed_is_union_of_matching_branches() {
        let mut router = Router::new();
        router.get("/users/me", 1).unwrap();
        router.put("/users/:id", 2).unwrap();
        router.delete("/users/*rest", 3).unwrap();

        match router.lookup(&Method::PATCH, "/users/me") {
            Lookup::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::GET, Method::PUT, Method::DELETE]);
            }
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
        assert_eq!(router.allowed_methods("/users/7"), vec![Method::PUT, Method::DELETE]);
    }

    #[test]
    fn test_router_match_reports_pattern() {
        let mut router = Router::new();
        router.get("/users/:id/posts/:postId", ()).unwrap();
        let m = router.match_route(&Method::GET, "/users/1/posts/2").unwrap();
        assert_eq!(m.pattern, "/users/:id/posts/:postId");
    }
}
