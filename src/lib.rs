//! TTL Memo - memoize sync and async functions for a bounded time
//!
//! Wraps a computation so repeated calls with the same arguments reuse the
//! last successful result until it is older than the TTL. Concurrent misses
//! for the same arguments run the computation once and share the outcome.
//! Errors are never cached.

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod memo;
pub mod tasks;

pub use cache::{Clock, ManualClock, SystemClock};
pub use config::{MemoConfig, Ttl};
pub use error::{MemoError, Result};
pub use key::{Args, CacheKey, DeriveKey};
pub use memo::{wrap_async, wrap_sync, AsyncMemoized, Memoized};
pub use tasks::spawn_sweep_task;
