//! # Trellis Middleware
//!
//! Continuation-based middleware for the Trellis framework.
//!
//! A middleware receives the request [`Context`](trellis_core::Context)
//! and a [`Next`] continuation. Calling `next.run(ctx)` hands control to
//! the rest of the chain and returns once the handler and every inner
//! stage have finished, so each stage sees the request on the way in and
//! the response on the way out:
//!
//! ```text
//! Request → M1 → M2 → Handler
//!                        ↓
//! Response ← M1 ← M2 ←──┘
//! ```
//!
//! ## Key Features
//!
//! - **Registration Order**: stages run in the order they were added
//! - **Short-Circuit**: a stage that does not call `next` ends the request
//! - **Error Propagation**: errors travel outwards unchanged until a
//!   [`RecoveryMiddleware`](stages::RecoveryMiddleware) renders them
//! - **Synchronous**: the chain never suspends and needs no runtime
//!
//! ## Example
//!
//! ```
//! use trellis_core::{handler, Context};
//! use trellis_middleware::stages::{RecoveryMiddleware, RequestIdMiddleware};
//! use trellis_middleware::Chain;
//! use http::{Method, StatusCode};
//! use std::sync::Arc;
//!
//! let chain = Chain::new()
//!     .with(Arc::new(RecoveryMiddleware::new()))
//!     .with(Arc::new(RequestIdMiddleware::new()));
//!
//! let h = handler(|_ctx| Err(trellis_core::TrellisError::internal("boom")));
//! let mut ctx = Context::new(Method::GET, "/");
//! chain.run(&mut ctx, h.as_ref()).unwrap();
//!
//! assert_eq!(ctx.status(), StatusCode::INTERNAL_SERVER_ERROR);
//! assert!(ctx.response_header("x-request-id").is_some());
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod middleware;
pub mod stages;

pub use chain::Chain;
pub use middleware::{from_fn, BoxedMiddleware, FnMiddleware, Middleware, Next};
pub use stages::ConfigurableMiddleware;
