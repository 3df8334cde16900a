//! Copy-on-write router for registration after serving has started.

use std::sync::Arc;

use http::Method;
use parking_lot::{Mutex, RwLock};

use crate::error::RouteResult;
use crate::method_map::MethodFilter;
use crate::router::Router;

/// A router that accepts new routes while other threads are matching.
///
/// Readers take an [`Arc`] snapshot and match against it without holding
/// any lock. Writers clone the current tree, insert, and swap the new tree
/// in; matches already in flight keep using the snapshot they hold.
///
/// This is a standalone building block. `trellis::App` keeps a plain
/// [`Router`] that is frozen once serving starts, so routes added after
/// startup need a dispatcher built on this type instead.
///
/// ```
/// use std::sync::Arc;
/// use http::Method;
/// use trellis_router::SharedRouter;
///
/// let router = Arc::new(SharedRouter::default());
/// let before = router.snapshot();
/// router.insert(Method::GET, "/late", "late").unwrap();
///
/// assert!(before.match_route(&Method::GET, "/late").is_none());
/// assert!(router.snapshot().match_route(&Method::GET, "/late").is_some());
/// ```
#[derive(Debug)]
pub struct SharedRouter<T> {
    current: RwLock<Arc<Router<T>>>,
    /// Serializes writers so concurrent inserts are not lost
    write: Mutex<()>,
}

impl<T: Clone> SharedRouter<T> {
    /// Wraps a router built during startup.
    #[must_use]
    pub fn new(router: Router<T>) -> Self {
        Self {
            current: RwLock::new(Arc::new(router)),
            write: Mutex::new(()),
        }
    }

    /// Returns the tree as of now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Router<T>> {
        Arc::clone(&self.current.read())
    }

    /// Registers a route by replacing the tree with an extended copy.
    pub fn insert_filter(&self, filter: MethodFilter, pattern: &str, value: T) -> RouteResult<()> {
        let _writer = self.write.lock();
        let mut next = Router::clone(&self.snapshot());
        next.insert_filter(filter, pattern, value)?;
        *self.current.write() = Arc::new(next);
        Ok(())
    }

    /// Registers `value` for `method` and `pattern`.
    pub fn insert(&self, method: Method, pattern: &str, value: T) -> RouteResult<()> {
        self.insert_filter(MethodFilter::Exact(method), pattern, value)
    }
}

impl<T: Clone> Default for SharedRouter<T> {
    fn default() -> Self {
        Self::new(Router::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_snapshot_is_stable_across_inserts() {
        let shared = SharedRouter::new(Router::new());
        shared.insert(Method::GET, "/a", 1).unwrap();

        let before = shared.snapshot();
        shared.insert(Method::GET, "/b", 2).unwrap();

        assert!(before.match_route(&Method::GET, "/b").is_none());
        assert!(shared.snapshot().match_route(&Method::GET, "/b").is_some());
    }

    #[test]
    fn test_failed_insert_keeps_current_tree() {
        let shared = SharedRouter::default();
        shared.insert(Method::GET, "/a", 1).unwrap();
        assert!(shared.insert(Method::GET, "/a", 2).is_err());

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(*snapshot.match_route(&Method::GET, "/a").unwrap().value, 1);
    }

    #[test]
    fn test_concurrent_inserts_and_matches() {
        let shared = Arc::new(SharedRouter::default());
        shared.insert(Method::GET, "/static", 0usize).unwrap();

        let handles: Vec<_> = (1..=8usize)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    shared.insert(Method::GET, &format!("/r{i}"), i).unwrap();
                    for _ in 0..100 {
                        assert!(shared
                            .snapshot()
                            .match_route(&Method::GET, "/static")
                            .is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let router = shared.snapshot();
        assert_eq!(router.len(), 9);
        for i in 1..=8usize {
            let path = format!("/r{i}");
            assert_eq!(*router.match_route(&Method::GET, &path).unwrap().value, i);
        }
    }
}
