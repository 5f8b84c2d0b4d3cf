//! Cache Entry Module
//!
//! A computed value paired with the instant its computation started.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A stored result. Replaced as a whole on the next successful miss,
/// never mutated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The computed value
    pub value: V,
    /// Clock reading taken before the computation ran
    pub inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    pub fn new(value: V, inserted_at: Instant) -> Self {
        Self { value, inserted_at }
    }

    // == Age ==
    /// Time elapsed since insertion as seen at `now`.
    ///
    /// Saturates to zero if `now` was read before the entry was written.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    // == Is Fresh ==
    /// Checks whether the entry may be served at `now`.
    ///
    /// Boundary condition: strictly less-than. An entry exactly `ttl` old
    /// is stale, and with a zero TTL nothing is ever fresh.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}
