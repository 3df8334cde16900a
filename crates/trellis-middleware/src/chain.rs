//! Ordered middleware chain.
//!
//! A [`Chain`] wraps a terminal handler in its middleware, outermost
//! first. Registration order is execution order: with stages `[m1, m2]`
//! a request observes
//!
//! ```text
//! m1 before → m2 before → handler → m2 after → m1 after
//! ```
//!
//! The chain runs synchronously on the caller's thread and never
//! suspends. Errors travel back out through every stage unchanged; only a
//! stage that chooses to handle them (such as recovery) turns them into a
//! response.

use std::fmt;
use std::sync::Arc;

use trellis_core::{Context, Handler, TrellisResult};

use crate::middleware::{BoxedMiddleware, Middleware, Next};

/// An ordered list of middleware.
///
/// # Example
///
/// ```
/// use trellis_core::{handler, Context};
/// use trellis_middleware::{from_fn, Chain};
/// use http::Method;
///
/// let chain = Chain::new()
///     .with(from_fn("outer", |ctx, next| {
///         ctx.put_state("seen", true);
///         next.run(ctx)
///     }));
///
/// let h = handler(|ctx| {
///     assert_eq!(ctx.state::<bool>("seen"), Some(&true));
///     Ok(())
/// });
///
/// let mut ctx = Context::new(Method::GET, "/");
/// chain.run(&mut ctx, h.as_ref()).unwrap();
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<BoxedMiddleware>,
}

impl Chain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware, builder style.
    #[must_use]
    pub fn with(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Appends a middleware.
    pub fn push(&mut self, middleware: BoxedMiddleware) {
        self.stages.push(middleware);
    }

    /// Appends a concrete middleware.
    pub fn push_middleware<M: Middleware>(&mut self, middleware: M) {
        self.stages.push(Arc::new(middleware));
    }

    /// Runs `handler` wrapped in every stage.
    pub fn run(&self, ctx: &mut Context, handler: &dyn Handler) -> TrellisResult<()> {
        Next::new(&self.stages, handler).run(ctx)
    }

    /// Names of the stages in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl FromIterator<BoxedMiddleware> for Chain {
    fn from_iter<I: IntoIterator<Item = BoxedMiddleware>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;
    use http::{Method, StatusCode};
    use support::Log;
    use trellis_core::{handler, TrellisError};

    /// Minimal shared event log for ordering assertions.
    mod support {
        use std::sync::Arc;

        use parking_lot::Mutex;

        #[derive(Clone, Default)]
        pub struct Log(Arc<Mutex<Vec<String>>>);

        impl Log {
            pub fn push(&self, event: impl Into<String>) {
                self.0.lock().push(event.into());
            }

            pub fn events(&self) -> Vec<String> {
                self.0.lock().clone()
            }
        }
    }

    fn tracking(name: &'static str, log: &Log) -> BoxedMiddleware {
        let log = log.clone();
        from_fn(name, move |ctx, next| {
            log.push(format!("{name}-before"));
            let result = next.run(ctx);
            log.push(format!("{name}-after"));
            result
        })
    }

    #[test]
    fn test_chain_runs_in_registration_order() {
        let log = Log::default();
        let chain = Chain::new()
            .with(tracking("m1", &log))
            .with(tracking("m2", &log));

        let handler_log = log.clone();
        let h = handler(move |_| {
            handler_log.push("handler");
            Ok(())
        });

        let mut ctx = Context::new(Method::GET, "/");
        chain.run(&mut ctx, h.as_ref()).unwrap();

        assert_eq!(
            log.events(),
            vec!["m1-before", "m2-before", "handler", "m2-after", "m1-after"]
        );
        assert_eq!(chain.stage_names(), vec!["m1", "m2"]);
    }

    #[test]
    fn test_short_circuit_skips_later_stages() {
        let log = Log::default();
        let chain = Chain::new()
            .with(tracking("m1", &log))
            .with(from_fn("deny", |ctx, _next| {
                ctx.set_status(StatusCode::UNAUTHORIZED);
                Ok(())
            }))
            .with(tracking("m3", &log));

        let handler_log = log.clone();
        let h = handler(move |_| {
            handler_log.push("handler");
            Ok(())
        });

        let mut ctx = Context::new(Method::GET, "/");
        chain.run(&mut ctx, h.as_ref()).unwrap();

        assert_eq!(log.events(), vec!["m1-before", "m1-after"]);
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_errors_propagate_through_stages() {
        let log = Log::default();
        let chain = Chain::new().with(tracking("m1", &log));
        let h = handler(|_| Err(TrellisError::internal("handler failed")));

        let mut ctx = Context::new(Method::GET, "/");
        let err = chain.run(&mut ctx, h.as_ref()).unwrap_err();

        assert!(matches!(err, TrellisError::Internal { .. }));
        assert_eq!(log.events(), vec!["m1-before", "m1-after"]);
    }

    #[test]
    fn test_post_processing_sees_handler_output() {
        let chain: Chain = std::iter::once(from_fn("upper", |ctx, next| {
            next.run(ctx)?;
            let body = String::from_utf8_lossy(ctx.response_body()).to_uppercase();
            ctx.text(body);
            Ok(())
        }))
        .collect();
        let h = handler(|ctx| {
            ctx.text("quiet");
            Ok(())
        });

        let mut ctx = Context::new(Method::GET, "/");
        chain.run(&mut ctx, h.as_ref()).unwrap();
        assert_eq!(ctx.response_body().as_ref(), b"QUIET");
        assert_eq!(chain.len(), 1);
    }
}
