//! # Trellis Core
//!
//! Core types shared by every Trellis crate:
//!
//! - [`Context`] - Per-request state flowing through routing, middleware and handler
//! - [`ContextPool`] - Bounded reuse of reset contexts
//! - [`Handler`] - Terminal request handler
//! - [`Route`], [`Routes`], [`RouteBuilder`] - Route definitions with documentation metadata
//! - [`Services`] - Shared instances published by plugins
//! - [`TrellisError`] - Standard error type

#![doc(html_root_url = "https://docs.rs/trellis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod handler;
mod pool;
pub mod route;
mod routes;
pub mod services;

pub use context::{Context, CLIENT_IP_HEADERS};
pub use error::{BoxError, PluginPhase, TrellisError, TrellisResult};
pub use handler::{handler, BoxHandler, Handler};
pub use pool::{ContextPool, DEFAULT_POOL_SIZE};
pub use route::{Route, RouteDoc};
pub use routes::{RouteBuilder, Routes};
pub use services::{ResolveError, Services};

pub use trellis_router::{MethodFilter, Params};
