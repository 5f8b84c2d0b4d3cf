//! Cache Store Module
//!
//! Per-wrapper map from derived key to a slot. A slot holds the last
//! successful result and, independently, a marker for a computation that
//! is still running. Keeping the two apart lets a failed computation leave
//! the previous entry exactly as it was.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::cache::{CacheEntry, Clock, Sweep};
use crate::config::Ttl;

// == Slot ==
struct InFlight<P> {
    id: u64,
    handle: P,
}

struct Slot<V, P> {
    entry: Option<CacheEntry<V>>,
    in_flight: Option<InFlight<P>>,
}

impl<V, P> Slot<V, P> {
    fn empty() -> Self {
        Self {
            entry: None,
            in_flight: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.entry.is_none() && self.in_flight.is_none()
    }
}

// == Lookup ==
/// Outcome of [`CacheStore::lookup`].
pub enum Lookup<V, J> {
    /// A fresh entry was found
    Hit(V),
    /// Another caller is computing this key; share its result
    Join(J),
    /// The caller must compute the value and report back under `id`
    Lead {
        id: u64,
        started_at: Instant,
        handle: J,
    },
}

// == Cache Store ==
/// Thread-safe slot map with a fixed TTL.
///
/// `P` is the in-flight handle kept in the map. `J` (see [`lookup`]) is
/// what a caller gets to wait on; for the async wrapper the map keeps a
/// weak handle and callers get strong ones.
///
/// [`lookup`]: CacheStore::lookup
pub struct CacheStore<K, V, P> {
    slots: RwLock<HashMap<K, Slot<V, P>>>,
    ttl: Ttl,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
}

impl<K, V, P> CacheStore<K, V, P>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    pub fn new(ttl: Ttl, clock: Arc<dyn Clock>) -> Self {
        debug!(%ttl, "Creating cache store");
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl,
            clock,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    // == Lookup ==
    /// Reads the clock once and resolves `key` to a hit, a join, or a new
    /// in-flight computation.
    ///
    /// `join` turns a stored handle into something to wait on, returning
    /// None if the handle is dead. `lead` is called at most once, under the
    /// write lock, to build the marker for a new computation. Neither may
    /// block or call back into the store.
    pub fn lookup<J>(
        &self,
        key: &K,
        join: impl Fn(&P) -> Option<J>,
        lead: impl FnOnce(u64, Instant) -> (P, J),
    ) -> Lookup<V, J> {
        let now = self.clock.now();
        let ttl = self.ttl.as_duration();

        // Fast path: read lock only
        {
            let slots = self.slots.read();
            if let Some(slot) = slots.get(key) {
                if let Some(hit) = Self::fresh_value(slot, now, ttl) {
                    return Lookup::Hit(hit);
                }
                if let Some(joined) = slot.in_flight.as_ref().and_then(|f| join(&f.handle)) {
                    return Lookup::Join(joined);
                }
            }
        }

        let mut slots = self.slots.write();
        let slot = slots.entry(key.clone()).or_insert_with(Slot::empty);

        // Another caller may have finished or started while we waited
        if let Some(hit) = Self::fresh_value(slot, now, ttl) {
            return Lookup::Hit(hit);
        }
        if let Some(joined) = slot.in_flight.as_ref().and_then(|f| join(&f.handle)) {
            return Lookup::Join(joined);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, joined) = lead(id, now);
        slot.in_flight = Some(InFlight { id, handle });
        trace!(id, stale = slot.entry.is_some(), "Starting computation");

        Lookup::Lead {
            id,
            started_at: now,
            handle: joined,
        }
    }

    fn fresh_value(slot: &Slot<V, P>, now: Instant, ttl: std::time::Duration) -> Option<V> {
        slot.entry
            .as_ref()
            .filter(|entry| entry.is_fresh(now, ttl))
            .map(|entry| entry.value.clone())
    }

    // == Finish ==
    /// Clears the in-flight marker `id` for `key` and, on success, replaces
    /// the entry.
    ///
    /// Returns false if `id` is no longer the key's in-flight computation,
    /// in which case nothing is written.
    pub fn finish(&self, key: &K, id: u64, entry: Option<CacheEntry<V>>) -> bool {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };
        if slot.in_flight.as_ref().map(|f| f.id) != Some(id) {
            return false;
        }

        slot.in_flight = None;
        if let Some(entry) = entry {
            slot.entry = Some(entry);
        }
        if slot.is_empty() {
            slots.remove(key);
        }
        true
    }

    // == Cleanup Expired ==
    /// Drops every stale entry. Keys with a running computation keep their
    /// marker. Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl.as_duration();
        let mut removed = 0;

        self.slots.write().retain(|_, slot| {
            if slot.entry.as_ref().is_some_and(|e| !e.is_fresh(now, ttl)) {
                slot.entry = None;
                removed += 1;
            }
            !slot.is_empty()
        });

        removed
    }

    // == Length ==
    /// Number of keys holding an entry, fresh or stale.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a computation in progress.
    pub fn in_flight(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.in_flight.is_some())
            .count()
    }

    /// Clone of the in-flight handle stored for `key`.
    #[cfg(test)]
    pub fn in_flight_handle(&self, key: &K) -> Option<P>
    where
        P: Clone,
    {
        let slots = self.slots.read();
        slots.get(key)?.in_flight.as_ref().map(|f| f.handle.clone())
    }
}

impl<K, V, P> Sweep for CacheStore<K, V, P>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
    P: Send + Sync,
{
    fn purge_expired(&self) -> usize {
        CacheStore::purge_expired(self)
    }
}

// == In-Flight Guard ==
/// Clears an in-flight marker if the computation never reports back,
/// e.g. because it panicked or its future was dropped.
pub struct InFlightGuard<K, V, P>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    store: Arc<CacheStore<K, V, P>>,
    key: K,
    id: u64,
    armed: bool,
}

impl<K, V, P> InFlightGuard<K, V, P>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(store: Arc<CacheStore<K, V, P>>, key: K, id: u64) -> Self {
        Self {
            store,
            key,
            id,
            armed: true,
        }
    }

    /// Reports the outcome: `Some` stores a new entry, `None` records a
    /// failure and keeps whatever entry was there.
    pub fn complete(mut self, entry: Option<CacheEntry<V>>) {
        self.armed = false;
        self.store.finish(&self.key, self.id, entry);
    }
}

impl<K, V, P> Drop for InFlightGuard<K, V, P>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if self.armed && self.store.finish(&self.key, self.id, None) {
            debug!(id = self.id, "Computation abandoned before completing");
        }
    }
}
