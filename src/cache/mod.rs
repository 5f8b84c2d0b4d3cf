//! Cache Module
//!
//! Storage shared by the memoizing wrappers: entries stamped with their
//! insertion time, a pluggable clock, and the slot map that tracks both
//! completed results and computations still in flight.

mod clock;
mod entry;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use store::{CacheStore, InFlightGuard, Lookup};

/// A cache that can drop its stale entries on demand.
pub trait Sweep: Send + Sync {
    /// Removes stale entries and returns how many were dropped.
    fn purge_expired(&self) -> usize;
}
