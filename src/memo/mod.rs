//! Memo Module
//!
//! The two wrapping entry points. A synchronous function stays
//! synchronous and an async one stays async; the choice is made by which
//! constructor is called, never at runtime.
//!
//! # Concurrency
//! Concurrent misses for the same key are coalesced. Exactly one caller
//! runs the function; the others wait for and share its result, including
//! an error. Once that computation reports, its in-flight marker is
//! cleared, so a call made after a failure runs the function again.

mod future;
mod sync;

use std::future::Future;

pub use future::AsyncMemoized;
pub use sync::Memoized;

use crate::config::Ttl;
use crate::key::DeriveKey;

/// Wraps a synchronous function with a TTL cache.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ttl_memo::wrap_sync;
///
/// let square = wrap_sync(|x: u64| Ok::<_, String>(x * x), Duration::from_secs(5));
/// assert_eq!(square.call(4), Ok(16));
/// assert_eq!(square.call(4), Ok(16)); // served from cache
/// ```
pub fn wrap_sync<A, V, E, F>(func: F, ttl: impl Into<Ttl>) -> Memoized<A, V, E, F>
where
    A: DeriveKey,
    V: Clone,
    E: Clone,
    F: Fn(A) -> Result<V, E>,
{
    Memoized::new(func, ttl)
}

/// Wraps an async function with a TTL cache.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ttl_memo::wrap_async;
///
/// # tokio_test::block_on(async {
/// let fetch = wrap_async(
///     |id: u32| async move { Ok::<_, String>(format!("user-{id}")) },
///     Duration::from_secs(30),
/// );
/// assert_eq!(fetch.call(7).await, Ok("user-7".to_string()));
/// # });
/// ```
pub fn wrap_async<A, V, E, F, Fut>(func: F, ttl: impl Into<Ttl>) -> AsyncMemoized<A, V, E, F>
where
    A: DeriveKey + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    AsyncMemoized::new(func, ttl)
}
