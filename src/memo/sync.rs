//! Synchronous Memoization
//!
//! Wraps `Fn(A) -> Result<V, E>`. Concurrent misses for one key are
//! coalesced: the first caller runs the function while the others block
//! until it reports, then all of them return the same `Ok` or `Err`.

use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::cache::{CacheEntry, CacheStore, Clock, InFlightGuard, Lookup, Sweep, SystemClock};
use crate::config::Ttl;
use crate::key::DeriveKey;

// == Pending Call ==
enum CallState<V, E> {
    Running,
    Finished(Result<V, E>),
    Abandoned,
}

/// Rendezvous between the caller computing a key and those waiting on it.
struct PendingCall<V, E> {
    state: Mutex<CallState<V, E>>,
    done: Condvar,
}

impl<V: Clone, E: Clone> PendingCall<V, E> {
    fn new() -> Self {
        Self {
            state: Mutex::new(CallState::Running),
            done: Condvar::new(),
        }
    }

    fn finish(&self, result: Result<V, E>) {
        *self.state.lock() = CallState::Finished(result);
        self.done.notify_all();
    }

    fn abandon(&self) {
        let mut state = self.state.lock();
        if matches!(*state, CallState::Running) {
            *state = CallState::Abandoned;
            self.done.notify_all();
        }
    }

    /// Blocks until the leader reports. None means it never will.
    fn wait(&self) -> Option<Result<V, E>> {
        let mut state = self.state.lock();
        while matches!(*state, CallState::Running) {
            self.done.wait(&mut state);
        }
        match &*state {
            CallState::Finished(result) => Some(result.clone()),
            CallState::Running | CallState::Abandoned => None,
        }
    }
}

/// Wakes waiters if the leader unwinds before finishing.
struct AbandonOnUnwind<'a, V: Clone, E: Clone>(&'a PendingCall<V, E>);

impl<V: Clone, E: Clone> Drop for AbandonOnUnwind<'_, V, E> {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

type SyncStore<A, V, E> = CacheStore<<A as DeriveKey>::Key, V, Arc<PendingCall<V, E>>>;

// == Memoized ==
/// A synchronous function with a TTL cache in front of it.
///
/// Clones share one cache. Separately wrapped functions never do.
pub struct Memoized<A: DeriveKey, V, E, F> {
    func: Arc<F>,
    store: Arc<SyncStore<A, V, E>>,
    _args: PhantomData<fn(A)>,
}

impl<A, V, E, F> Memoized<A, V, E, F>
where
    A: DeriveKey,
    V: Clone,
    E: Clone,
    F: Fn(A) -> Result<V, E>,
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
    /// Returns the cached value for `args` if it is fresh, otherwise runs
    /// the function (or waits for the caller already running it).
    ///
    /// Errors are returned as-is and never cached.
    pub fn call(&self, args: A) -> Result<V, E> {
        let key = args.derive_key();

        loop {
            let lookup = self.store.lookup(
                &key,
                |pending| Some(Arc::clone(pending)),
                |_, _| {
                    let pending = Arc::new(PendingCall::new());
                    (Arc::clone(&pending), pending)
                },
            );

            match lookup {
                Lookup::Hit(value) => {
                    trace!("Cache hit");
                    return Ok(value);
                }
                Lookup::Join(pending) => {
                    trace!("Waiting on in-flight computation");
                    match pending.wait() {
                        Some(result) => return result,
                        None => debug!("In-flight computation abandoned, retrying"),
                    }
                }
                Lookup::Lead {
                    id,
                    started_at,
                    handle,
                } => {
                    trace!(id, "Cache miss");
                    return self.compute(key, args, id, started_at, &handle);
                }
            }
        }
    }

    fn compute(
        &self,
        key: A::Key,
        args: A,
        id: u64,
        started_at: std::time::Instant,
        pending: &PendingCall<V, E>,
    ) -> Result<V, E> {
        // Declared first so it drops last: the marker is cleared before
        // waiters wake up and retry.
        let _abandon = AbandonOnUnwind(pending);
        let guard = InFlightGuard::new(Arc::clone(&self.store), key, id);

        let result = (self.func)(args);

        match &result {
            Ok(value) => guard.complete(Some(CacheEntry::new(value.clone(), started_at))),
            Err(_) => {
                debug!(id, "Computation failed, nothing cached");
                guard.complete(None);
            }
        }
        pending.finish(result.clone());
        result
    }

    /// Turns the wrapper into a plain closure with the original signature.
    pub fn into_fn(self) -> impl Fn(A) -> Result<V, E> {
        move |args| self.call(args)
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
}

impl<A, V, E, F> Memoized<A, V, E, F>
where
    A: DeriveKey,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Weak handle for a background sweep. Does not keep the cache alive.
    pub fn sweeper(&self) -> Weak<dyn Sweep> {
        let weak: Weak<SyncStore<A, V, E>> = Arc::downgrade(&self.store);
        weak
    }
}

impl<A: DeriveKey, V, E, F> Clone for Memoized<A, V, E, F> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            store: Arc::clone(&self.store),
            _args: PhantomData,
        }
    }
}
