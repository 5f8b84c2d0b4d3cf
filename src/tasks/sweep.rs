//! Stale Entry Sweep Task
//!
//! Background task that periodically drops expired entries from a
//! memoized function's cache. Without it, stale entries are only
//! replaced when their key is requested again.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Sweep;

/// Spawns a background task that purges stale entries every `interval`.
///
/// The task holds only a weak reference (see `Memoized::sweeper`), so it
/// never keeps a cache alive; it exits on its own once the wrapped
/// function and all its clones are dropped.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort it early.
///
/// # Example
/// ```ignore
/// let square = wrap_sync(|x: u64| Ok::<_, ()>(x * x), Duration::from_secs(5));
/// let sweep_handle = spawn_sweep_task(square.sweeper(), Duration::from_secs(30));
/// ```
pub fn spawn_sweep_task(cache: Weak<dyn Sweep>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Starting stale entry sweep task");

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(store) = cache.upgrade() else {
                debug!("Cache dropped, stopping sweep task");
                break;
            };
            let removed = store.purge_expired();
            drop(store);

            if removed > 0 {
                info!(removed, "Sweep: removed stale entries");
            } else {
                debug!("Sweep: no stale entries found");
            }
        }
    })
}
