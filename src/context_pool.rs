//! Reusable query-context pool.
//!
//! Allocating a query context through the backend is comparatively
//! expensive, so released contexts are kept around for reuse instead of
//! being torn down after every call. Claim/free pairing is enforced by an
//! RAII guard rather than caller discipline: a claimed context returns to
//! the pool on every exit path, including early returns and panics.
//!
//! The pool always owns the underlying contexts. Two live borrowers never
//! see the same context, and the pool grows on demand (a context is only
//! allocated when no idle one is available).

use crate::backend::FontBackend;
use log::trace;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Growable pool of backend query contexts.
pub struct ContextPool<B: FontBackend> {
    backend: Arc<B>,
    idle: Mutex<Vec<B::Context>>,
}

impl<B: FontBackend> ContextPool<B> {
    /// Create an empty pool over the given backend.
    pub fn new(backend: Arc<B>) -> Self {
        ContextPool {
            backend,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Borrow a context for the duration of the returned guard.
    ///
    /// Reuses an idle context when one is available, otherwise allocates a
    /// fresh one from the backend. The guard returns the context to the
    /// pool when dropped.
    ///
    /// # Panics
    /// Panics if the backend cannot allocate a context. Callers are written
    /// against the invariant that a context is always obtainable; a backend
    /// that cannot produce one indicates an unrecoverable subsystem
    /// failure, not a condition to handle.
    pub fn claim(&self) -> PooledContext<'_, B> {
        let reused = self.idle.lock().pop();
        let context = match reused {
            Some(context) => {
                trace!("ContextPool: reusing idle context");
                context
            }
            None => {
                trace!("ContextPool: allocating fresh context");
                match self.backend.allocate_context() {
                    Ok(context) => context,
                    Err(err) => {
                        panic!("ContextPool: backend failed to allocate a query context: {err:#}")
                    }
                }
            }
        };

        PooledContext {
            pool: self,
            context: Some(context),
        }
    }

    /// Number of contexts currently sitting idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn reclaim(&self, context: B::Context) {
        self.idle.lock().push(context);
    }
}

impl<B: FontBackend> Drop for ContextPool<B> {
    fn drop(&mut self) {
        // Live guards borrow the pool, so by the time the pool drops every
        // claimed context has been reclaimed.
        for context in self.idle.get_mut().drain(..) {
            self.backend.release_context(context);
        }
    }
}

/// RAII borrow of a pooled context.
///
/// Dereferences to the backend's context type; the context goes back to the
/// pool when the guard drops.
pub struct PooledContext<'a, B: FontBackend> {
    pool: &'a ContextPool<B>,
    context: Option<B::Context>,
}

impl<B: FontBackend> Deref for PooledContext<'_, B> {
    type Target = B::Context;

    fn deref(&self) -> &B::Context {
        self.context.as_ref().expect("context present until drop")
    }
}

impl<B: FontBackend> DerefMut for PooledContext<'_, B> {
    fn deref_mut(&mut self) -> &mut B::Context {
        self.context.as_mut().expect("context present until drop")
    }
}

impl<B: FontBackend> Drop for PooledContext<'_, B> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.reclaim(context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{FaceSpec, HeadlessBackend};

    fn pool() -> (Arc<HeadlessBackend>, ContextPool<HeadlessBackend>) {
        let backend = Arc::new(HeadlessBackend::new().with_face(FaceSpec::new("Arial")));
        let pool = ContextPool::new(Arc::clone(&backend));
        (backend, pool)
    }

    #[test]
    fn claim_allocates_and_drop_reclaims() {
        let (backend, pool) = pool();
        assert_eq!(pool.idle_count(), 0);

        {
            let _ctx = pool.claim();
            assert_eq!(backend.contexts_allocated(), 1);
            assert_eq!(pool.idle_count(), 0);
        }

        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn released_context_is_reused_not_reallocated() {
        let (backend, pool) = pool();

        drop(pool.claim());
        drop(pool.claim());

        assert_eq!(backend.contexts_allocated(), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn concurrent_claims_get_distinct_contexts() {
        let (backend, pool) = pool();

        let first = pool.claim();
        let second = pool.claim();
        assert_eq!(backend.contexts_allocated(), 2);
        drop(first);
        drop(second);

        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn pool_drop_releases_idle_contexts_to_backend() {
        let (backend, pool) = pool();

        drop(pool.claim());
        drop(pool.claim());
        drop(pool);

        assert_eq!(backend.contexts_allocated(), backend.contexts_released());
    }

    #[test]
    #[should_panic(expected = "failed to allocate a query context")]
    fn allocation_failure_is_fatal() {
        let (backend, pool) = pool();
        backend.deny_further_contexts();
        let _ctx = pool.claim();
    }
}
