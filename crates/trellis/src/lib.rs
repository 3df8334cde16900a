//! # Trellis
//!
//! **Radix routing, middleware chains and plugins for HTTP services**
//!
//! Trellis is the dispatch core of a web service, without the socket:
//!
//! - **Radix Router** – `:param` and trailing `*wildcard` segments, literal beats parameter beats wildcard
//! - **Continuation Middleware** – Each stage gets an explicit `next`, so it can run code on both sides or stop the chain
//! - **Plugin Lifecycle** – Plugins install routes, middleware and services, and take them down again
//! - **Configuration-Driven Setup** – A `[plugins]` table switches built-in stages on and off
//! - **Structured Logs** – `tracing` events with standard field names
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis::prelude::*;
//! use http::{Method, StatusCode};
//!
//! let mut app = App::new();
//! app.use_plugin(MiddlewarePlugin::new(RecoveryMiddleware::new()))?;
//! app.use_plugin(MiddlewarePlugin::new(RequestIdMiddleware::new()))?;
//!
//! app.get("/users/:id", |ctx| {
//!     let id = ctx.param("id").unwrap_or_default().to_string();
//!     ctx.json(&serde_json::json!({ "id": id }))
//! })?
//! .summary("Fetch one user");
//!
//! app.start()?;
//! let app = Arc::new(app);
//!
//! let mut ctx = Context::new(Method::GET, "/users/42");
//! app.dispatch(&mut ctx);
//! assert_eq!(ctx.status(), StatusCode::OK);
//! assert!(ctx.response_header("x-request-id").is_some());
//! # Ok::<(), TrellisError>(())
//! ```
//!
//! ## Request Flow
//!
//! ```text
//! Context → Router ─┬─ Found ──────────────→ params + route on Context ─┐
//!                   ├─ MethodNotAllowed ───→ no_method / 405 ──────────┤
//!                   └─ NotFound ───────────→ no_route / 404 ───────────┤
//!                                                                      ↓
//!                   middleware 1 → middleware 2 → … → handler
//!                                                                      ↓
//! Context ← render_error (only if an error escaped the chain) ←────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/trellis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod group;
mod plugin;
pub mod plugins;
pub mod registry;

pub use app::{App, ALLOWED_METHODS_STATE_KEY};
pub use group::AppGroup;
pub use plugin::Plugin;
pub use registry::PluginRegistry;

pub use trellis_core::{Context, TrellisError, TrellisResult};

// Re-export core types
pub use trellis_core as core;

// Re-export router types
pub use trellis_router as router;

// Re-export middleware types
pub use trellis_middleware as middleware;

// Re-export configuration types
pub use trellis_config as config;

// Re-export logging types
pub use trellis_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use trellis::prelude::*;
///
/// let app = App::new();
/// assert!(app.routes().is_empty());
/// ```
pub mod prelude {
    pub use crate::plugins::{MiddlewarePlugin, RoutesPlugin, ServicePlugin};
    pub use crate::{App, AppGroup, Plugin, PluginRegistry};

    pub use trellis_core::{
        handler, BoxHandler, Context, ContextPool, Handler, MethodFilter, Params, Route, Routes,
        Services, TrellisError, TrellisResult,
    };

    // Re-export middleware types
    pub use trellis_middleware::stages::{
        AccessLogMiddleware, BasicAuthMiddleware, CorsMiddleware, RateLimitMiddleware,
        RecoveryMiddleware, RequestIdMiddleware,
    };
    pub use trellis_middleware::{from_fn, Chain, ConfigurableMiddleware, Middleware, Next};

    // Re-export configuration types
    pub use trellis_config::{ConfigLoader, ConfigStore, ServerSettings};

    // Re-export logging types
    pub use trellis_telemetry::LogConfig;
}
