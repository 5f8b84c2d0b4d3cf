//! Asynchronous Memoization
//!
//! Wraps `Fn(A) -> impl Future<Output = Result<V, E>>`. Concurrent misses
//! for one key await a single shared computation. The slot map only keeps
//! a weak handle to it, so the computation lives exactly as long as at
//! least one caller is still awaiting it: dropping one caller's future
//! does not cancel it for the rest, and once every caller is gone the
//! computation is dropped and the key is free again.
//!
//! A panic inside the computation is caught before it reaches the shared
//! future and re-raised in every caller awaiting it, so no waiter is left
//! pending on a poisoned computation.

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use tracing::{debug, trace};

use crate::cache::{CacheEntry, CacheStore, Clock, InFlightGuard, Lookup, Sweep, SystemClock};
use crate::config::Ttl;
use crate::key::DeriveKey;

/// Result of the wrapped function, or the message of the panic it raised.
type Outcome<V, E> = std::result::Result<Result<V, E>, Arc<str>>;
type Computation<V, E> = BoxFuture<'static, Outcome<V, E>>;
type AsyncStore<A, V, E> = CacheStore<<A as DeriveKey>::Key, V, WeakShared<Computation<V, E>>>;

// == Async Memoized ==
/// An async function with a TTL cache in front of it.
///
/// Clones share one cache. Separately wrapped functions never do.
pub struct AsyncMemoized<A: DeriveKey, V, E, F> {
    func: Arc<F>,
    store: Arc<AsyncStore<A, V, E>>,
    _args: PhantomData<fn(A)>,
}

impl<A, V, E, F, Fut> AsyncMemoized<A, V, E, F>
where
    A: DeriveKey + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    /// Wraps `func` using the system clock.
    pub fn new(func: F, ttl: impl Into<Ttl>) -> Self {
        Self::with_clock(func, ttl, Arc::new(SystemClock))
    }

    /// Wraps `func`, reading time from `clock`.
    pub fn with_clock(func: F, ttl: impl Into<Ttl>, clock: Arc<dyn Clock>) -> Self {
        Self {
            func: Arc::new(func),
            store: Arc::new(CacheStore::new(ttl.into(), clock)),
            _args: PhantomData,
        }
    }

    // == Call ==
    /// Returns the cached value for `args` if it is fresh, otherwise awaits
    /// the computation for this key, starting it if nobody else has.
    ///
    /// Errors are returned as-is and never cached. The cache lookup itself
    /// never suspends.
    pub async fn call(&self, args: A) -> Result<V, E> {
        let key = args.derive_key();

        let lookup = self.store.lookup(
            &key,
            |weak| weak.upgrade(),
            |id, started_at| self.start(key.clone(), args, id, started_at),
        );

        let outcome = match lookup {
            Lookup::Hit(value) => {
                trace!("Cache hit");
                return Ok(value);
            }
            Lookup::Join(shared) => {
                trace!("Joining in-flight computation");
                shared.await
            }
            Lookup::Lead { id, handle, .. } => {
                trace!(id, "Cache miss");
                handle.await
            }
        };

        match outcome {
            Ok(result) => result,
            Err(message) => panic::resume_unwind(Box::new(message.to_string())),
        }
    }

    /// Builds the shared computation for a miss. The function itself is
    /// only invoked on first poll, outside the store lock.
    fn start(
        &self,
        key: A::Key,
        args: A,
        id: u64,
        started_at: std::time::Instant,
    ) -> (WeakShared<Computation<V, E>>, Shared<Computation<V, E>>) {
        let func = Arc::clone(&self.func);
        let guard = InFlightGuard::new(Arc::clone(&self.store), key, id);

        let computation: Computation<V, E> = async move {
            let caught = AssertUnwindSafe(async move { func(args).await })
                .catch_unwind()
                .await;
            match caught {
                Ok(Ok(value)) => {
                    guard.complete(Some(CacheEntry::new(value.clone(), started_at)));
                    Ok(Ok(value))
                }
                Ok(Err(e)) => {
                    debug!(id, "Computation failed, nothing cached");
                    guard.complete(None);
                    Ok(Err(e))
                }
                Err(payload) => {
                    let message = panic_message(&*payload);
                    debug!(id, %message, "Computation panicked, nothing cached");
                    guard.complete(None);
                    Err(message)
                }
            }
        }
        .boxed();

        let shared = computation.shared();
        let weak = shared
            .downgrade()
            .expect("a shared future that was never polled is still pending");
        (weak, shared)
    }

    /// Turns the wrapper into a plain closure returning a boxed future.
    pub fn into_fn(self) -> impl Fn(A) -> BoxFuture<'static, Result<V, E>> {
        move |args| {
            let this = self.clone();
            async move { this.call(args).await }.boxed()
        }
    }

    pub fn ttl(&self) -> Ttl {
        self.store.ttl()
    }

    /// Number of argument sets with a stored result, fresh or stale.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drops stale entries. See [`crate::tasks::spawn_sweep_task`].
    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    /// Weak handle for a background sweep. Does not keep the cache alive.
    pub fn sweeper(&self) -> Weak<dyn Sweep> {
        let weak: Weak<AsyncStore<A, V, E>> = Arc::downgrade(&self.store);
        weak
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> Arc<str> {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Arc::from(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        Arc::from(s.as_str())
    } else {
        Arc::from("computation panicked")
    }
}

impl<A: DeriveKey, V, E, F> Clone for AsyncMemoized<A, V, E, F> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            store: Arc::clone(&self.store),
            _args: PhantomData,
        }
    }
}
