//! Bounded pool of reusable [`Context`] instances.

use http::Method;
use parking_lot::Mutex;

use crate::Context;

/// Default number of idle contexts a pool keeps.
pub const DEFAULT_POOL_SIZE: usize = 1024;

/// A bounded free list of contexts.
///
/// Released contexts are reset before they are stored, so a context drawn
/// from the pool never carries state from an earlier request. When the
/// pool is full, released contexts are dropped.
///
/// A context must only be released once the server has finished reading
/// its response.
///
/// # Example
///
/// ```
/// use trellis_core::ContextPool;
/// use http::Method;
///
/// let pool = ContextPool::new(8);
/// let mut ctx = pool.acquire(Method::GET, "/a");
/// ctx.put_state("user", 1_u32);
/// pool.release(ctx);
///
/// let ctx = pool.acquire(Method::POST, "/b");
/// assert_eq!(ctx.path(), "/b");
/// assert!(!ctx.has_state("user"));
/// ```
#[derive(Debug)]
pub struct ContextPool {
    idle: Mutex<Vec<Context>>,
    max_size: usize,
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl ContextPool {
    /// Creates a pool keeping at most `max_size` idle contexts.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_size,
        }
    }

    /// Takes an idle context, or allocates one, for `method` and `path`.
    pub fn acquire(&self, method: Method, path: &str) -> Context {
        let reused = self.idle.lock().pop();
        match reused {
            Some(mut ctx) => {
                ctx.rebind(method, path);
                ctx
            }
            None => Context::new(method, path),
        }
    }

    /// Resets `ctx` and returns it to the pool.
    pub fn release(&self, mut ctx: Context) {
        ctx.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_size {
            idle.push(ctx);
        }
    }

    /// Number of idle contexts.
    pub fn len(&self) -> usize {
        self.idle.lock().len()
    }

    /// Returns true if no contexts are idle.
    pub fn is_empty(&self) -> bool {
        self.idle.lock().is_empty()
    }

    /// Capacity of the pool.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Drops every idle context.
    pub fn clear(&self) {
        self.idle.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_release_resets_state() {
        let pool = ContextPool::new(4);
        let mut ctx = pool.acquire(Method::GET, "/first");
        ctx.set_status(StatusCode::NOT_FOUND);
        ctx.params_mut().push("id", "1");
        pool.release(ctx);
        assert_eq!(pool.len(), 1);

        let ctx = pool.acquire(Method::DELETE, "/second");
        assert!(pool.is_empty());
        assert_eq!(ctx.method(), Method::DELETE);
        assert_eq!(ctx.path(), "/second");
        assert_eq!(ctx.status(), StatusCode::OK);
        assert!(ctx.params().is_empty());
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = ContextPool::new(2);
        for i in 0..5 {
            pool.release(Context::new(Method::GET, format!("/{i}")));
        }
        assert_eq!(pool.len(), 2);
        pool.clear();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = Arc::new(ContextPool::default());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for i in 0..100 {
                        let mut ctx = pool.acquire(Method::GET, &format!("/{t}/{i}"));
                        assert!(!ctx.has_state("seen"));
                        ctx.put_state("seen", true);
                        pool.release(ctx);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.len() <= 4);
    }
}
