//! Radix tree router for Trellis.
//!
//! This crate maps `(method, path)` pairs to values using a prefix tree
//! with one node per path segment, so matching costs time proportional to
//! the path depth rather than the number of routes.
//!
//! # Features
//!
//! - **Path Parameters**: `:name` segments bind one path segment (`/users/:id`)
//! - **Wildcards**: a trailing `*name` binds the rest of the path (`/files/*path`)
//! - **Deterministic Priority**: literal beats parameter beats wildcard, with backtracking
//! - **Method Routing**: one value per method plus an optional `ANY` fallback
//! - **405 Support**: [`Router::lookup`] separates "wrong method" from "no such path"
//! - **Groups**: prefixed registration into the same tree
//!
//! # Example
//!
//! ```rust
//! use trellis_router::{Lookup, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.get("/users", "listUsers").unwrap();
//! router.post("/users", "createUser").unwrap();
//! router.get("/users/:id", "getUser").unwrap();
//! router.get("/files/*path", "serveFile").unwrap();
//!
//! let m = router.match_route(&Method::GET, "/users/123").unwrap();
//! assert_eq!(*m.value, "getUser");
//! assert_eq!(m.params.get("id"), Some("123"));
//!
//! assert!(matches!(
//!     router.lookup(&Method::DELETE, "/users"),
//!     Lookup::MethodNotAllowed { .. }
//! ));
//! ```
//!
//! # Architecture
//!
//! ```text
//!                    (root)
//!                      │
//!              ┌───────┴───────┐
//!              │               │
//!            "users"        "files"
//!              │               │
//!        ┌─────┴─────┐      "*path"
//!        │           │        [GET]
//!     (endpoint)   ":id"
//!   [GET,POST]       │
//!                (endpoint)
//!                  [GET]
//! ```
//!
//! Registration is rejected, never silently merged, when a pattern is
//! malformed, repeats an existing `(method, pattern)`, or names a parameter
//! differently from one already registered at the same position.

mod error;
mod group;
mod method_map;
mod node;
mod params;
mod router;
mod shared;

use http::Method;

pub use error::{RouteError, RouteResult};
pub use group::{join, Group};
pub use method_map::{MethodFilter, MethodMap};
pub use params::Params;
pub use router::Router;
pub use shared::SharedRouter;

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    /// The value registered for the matched method
    pub value: &'a T,
    /// Bound path parameters, percent-decoded, in pattern order
    pub params: Params,
    /// Normalized pattern of the matched route
    pub pattern: &'a str,
}

/// Outcome of [`Router::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'a, T> {
    /// The path and method matched
    Found(RouteMatch<'a, T>),
    /// The path matched an endpoint that has nothing for this method
    MethodNotAllowed {
        /// Methods registered at that endpoint, in canonical order
        allowed: Vec<Method>,
    },
    /// No endpoint matches the path
    NotFound,
}
