//! Handler trait for request processing.
//!
//! A [`Handler`] is the terminal step of a request: it reads from the
//! [`Context`], writes the response fields, and may fail with a
//! [`TrellisError`]. Closures `Fn(&mut Context) -> TrellisResult<()>`
//! implement it directly.

use std::sync::Arc;

use crate::{Context, TrellisResult};

/// A request handler.
///
/// # Example
///
/// ```rust
/// use trellis_core::{Context, Handler, TrellisResult};
/// use http::Method;
///
/// struct Hello;
///
/// impl Handler for Hello {
///     fn call(&self, ctx: &mut Context) -> TrellisResult<()> {
///         ctx.text("hello");
///         Ok(())
///     }
/// }
///
/// let mut ctx = Context::new(Method::GET, "/");
/// Hello.call(&mut ctx).unwrap();
/// assert_eq!(ctx.response_body().as_ref(), b"hello");
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handles the request in `ctx`.
    fn call(&self, ctx: &mut Context) -> TrellisResult<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut Context) -> TrellisResult<()> {
        self(ctx)
    }
}

/// A shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// Wraps a closure as a [`BoxHandler`].
///
/// Taking the closure type as an `Fn` bound lets the compiler infer the
/// argument type, so callers can write `handler(|ctx| ...)`.
pub fn handler<F>(f: F) -> BoxHandler
where
    F: Fn(&mut Context) -> TrellisResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}
