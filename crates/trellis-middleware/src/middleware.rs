//! Core middleware trait and continuation type.
//!
//! This module defines the [`Middleware`] trait that all middleware stages
//! implement. A middleware receives the request [`Context`] and a [`Next`]
//! continuation standing for the rest of the chain. Code before
//! `next.run(ctx)` runs on the way in, code after it on the way out.
//!
//! # Example
//!
//! ```
//! use trellis_core::{Context, TrellisResult};
//! use trellis_middleware::{Middleware, Next};
//!
//! struct ServerHeader;
//!
//! impl Middleware for ServerHeader {
//!     fn name(&self) -> &'static str {
//!         "server-header"
//!     }
//!
//!     fn handle(&self, ctx: &mut Context, next: Next<'_>) -> TrellisResult<()> {
//!         let result = next.run(ctx);
//!         ctx.set_header("server", http::HeaderValue::from_static("trellis"));
//!         result
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use trellis_core::{Context, Handler, TrellisResult};

/// The core middleware trait.
///
/// # Invariants
///
/// - Call `next.run()` at most once; it consumes the continuation
/// - Not calling it short-circuits the chain, so the middleware must
///   write the response itself
/// - Errors from `next.run()` should be returned, not swallowed, unless
///   the middleware exists to convert them (see
///   [`crate::stages::RecoveryMiddleware`])
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by calling `next.run(ctx)`.
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> TrellisResult<()>;
}

/// A type-erased middleware that can be stored in a chain.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The rest of the chain: the remaining middleware, then the handler.
///
/// `run` consumes the value, so a middleware cannot invoke the remainder
/// twice.
pub struct Next<'a> {
    stages: &'a [BoxedMiddleware],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// Creates a continuation over `stages` ending in `handler`.
    pub fn new(stages: &'a [BoxedMiddleware], handler: &'a dyn Handler) -> Self {
        Self { stages, handler }
    }

    /// Invokes the next middleware, or the handler if none is left.
    ///
    /// Returns immediately without running anything if the context has
    /// been aborted.
    pub fn run(self, ctx: &mut Context) -> TrellisResult<()> {
        if ctx.is_aborted() {
            return Ok(());
        }
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(
                ctx,
                Next {
                    stages: rest,
                    handler: self.handler,
                },
            ),
            None => self.handler.call(ctx),
        }
    }

    /// Number of middleware still ahead of the handler.
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// A middleware built from a closure.
///
/// ```
/// use trellis_middleware::FnMiddleware;
///
/// let timing = FnMiddleware::new("timing", |ctx, next| {
///     let start = std::time::Instant::now();
///     let result = next.run(ctx);
///     tracing::debug!(elapsed = ?start.elapsed(), "request finished");
///     result
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&mut Context, Next<'_>) -> TrellisResult<()> + Send + Sync + 'static,
{
    /// Creates a named middleware from `func`.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Context, Next<'_>) -> TrellisResult<()> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> TrellisResult<()> {
        (self.func)(ctx, next)
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Wraps a closure as a [`BoxedMiddleware`].
pub fn from_fn<F>(name: &'static str, func: F) -> BoxedMiddleware
where
    F: Fn(&mut Context, Next<'_>) -> TrellisResult<()> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware::new(name, func))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trellis_core::handler;

    #[test]
    fn test_empty_chain_runs_handler() {
        let h = handler(|ctx| {
            ctx.text("done");
            Ok(())
        });
        let mut ctx = Context::new(Method::GET, "/");
        Next::new(&[], h.as_ref()).run(&mut ctx).unwrap();
        assert_eq!(ctx.response_body().as_ref(), b"done");
    }

    #[test]
    fn test_abort_skips_rest_of_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let stages = vec![
            from_fn("abort", |ctx, next| {
                ctx.abort_with(StatusCode::FORBIDDEN, "stop");
                next.run(ctx)
            }),
            from_fn("count", move |ctx, next| {
                counter.fetch_add(1, Ordering::SeqCst);
                next.run(ctx)
            }),
        ];
        let h = handler(|ctx| {
            ctx.set_status(StatusCode::OK);
            Ok(())
        });

        let mut ctx = Context::new(Method::GET, "/");
        Next::new(&stages, h.as_ref()).run(&mut ctx).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_remaining_counts_down() {
        let stages = vec![
            from_fn("first", |ctx, next| {
                assert_eq!(next.remaining(), 1);
                next.run(ctx)
            }),
            from_fn("second", |ctx, next| {
                assert_eq!(next.remaining(), 0);
                next.run(ctx)
            }),
        ];
        let h = handler(|_| Ok(()));
        let mut ctx = Context::new(Method::GET, "/");
        Next::new(&stages, h.as_ref()).run(&mut ctx).unwrap();
    }
}
