//! Integration Tests for the Public Wrapping API
//!
//! Exercises the crate the way a caller would: through `wrap_sync`,
//! `wrap_async`, `Args`, `Ttl` and the sweep task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ttl_memo::{
    spawn_sweep_task, wrap_async, wrap_sync, Args, ManualClock, MemoError, Memoized, Ttl,
};

// == Helper Functions ==

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Arc::clone(&calls), calls)
}

// == Sync Wrapper ==

#[test]
fn test_sync_wrapper_caches_within_ttl() {
    let (calls, seen) = counter();
    let square = wrap_sync(
        move |x: i64| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(x * x)
        },
        Duration::from_secs(60),
    );

    assert_eq!(square.call(-3), Ok(9));
    assert_eq!(square.call(-3), Ok(9));
    assert_eq!(square.call(3), Ok(9));
    assert_eq!(seen.load(Ordering::SeqCst), 2, "-3 and 3 are different keys");
}

#[test]
fn test_sync_wrapper_with_real_clock_expires() {
    let (calls, seen) = counter();
    let square = wrap_sync(
        move |x: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(x * x)
        },
        Duration::from_millis(200),
    );

    square.call(2).unwrap();
    square.call(2).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    thread::sleep(Duration::from_millis(300));
    square.call(2).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn test_tuple_arguments_are_positional() {
    let (calls, seen) = counter();
    let sub = wrap_sync(
        move |(a, b): (i32, i32)| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(a - b)
        },
        Duration::from_secs(60),
    );

    assert_eq!(sub.call((5, 2)), Ok(3));
    assert_eq!(sub.call((2, 5)), Ok(-3));
    assert_eq!(sub.call((5, 2)), Ok(3));
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn test_named_vs_positional_are_distinct_keys() {
    let (calls, seen) = counter();
    let square = wrap_sync(
        move |args: Args<u64>| -> Result<u64, &'static str> {
            calls.fetch_add(1, Ordering::SeqCst);
            let x = args
                .get(0)
                .or_else(|| args.get_named("x"))
                .copied()
                .ok_or("no x")?;
            Ok(x * x)
        },
        Duration::from_secs(60),
    );

    assert_eq!(square.call(Args::new().arg(4)), Ok(16));
    assert_eq!(square.call(Args::new().named("x", 4)), Ok(16));
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(square.len(), 2);
}

#[test]
fn test_expensive_square_worked_example() {
    let (calls, seen) = counter();
    let clock = ManualClock::new();
    let square = Memoized::with_clock(
        move |x: u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(x * x)
        },
        Ttl::from_secs(5),
        Arc::new(clock.clone()),
    );

    // t = 0
    assert_eq!(square.call(4), Ok(16));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    // t = 3
    clock.advance(Duration::from_secs(3));
    assert_eq!(square.call(4), Ok(16));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    // t = 6
    clock.advance(Duration::from_secs(3));
    assert_eq!(square.call(4), Ok(16));
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failure_does_not_evict_other_keys() {
    let (calls, seen) = counter();
    let checked = wrap_sync(
        move |x: i32| {
            calls.fetch_add(1, Ordering::SeqCst);
            if x < 0 {
                Err(format!("negative: {x}"))
            } else {
                Ok(x)
            }
        },
        Duration::from_secs(60),
    );

    assert_eq!(checked.call(1), Ok(1));
    assert_eq!(checked.call(-1), Err("negative: -1".to_string()));
    assert_eq!(checked.call(-1), Err("negative: -1".to_string()));
    assert_eq!(checked.call(1), Ok(1));
    assert_eq!(seen.load(Ordering::SeqCst), 3);
    assert_eq!(checked.len(), 1);
}

#[test]
fn test_thundering_herd_is_coalesced_across_threads() {
    let (calls, seen) = counter();
    let slow = wrap_sync(
        move |key: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(150));
            Ok::<_, String>(key.len())
        },
        Duration::from_secs(60),
    );

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let slow = slow.clone();
            thread::spawn(move || {
                let key = if i % 2 == 0 { "even" } else { "odd!" };
                slow.call(key.to_string())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(4));
    }
    assert_eq!(seen.load(Ordering::SeqCst), 2, "one computation per key");
}

// == Async Wrapper ==

#[tokio::test]
async fn test_async_wrapper_caches_and_coalesces() {
    let (calls, seen) = counter();
    let fetch = wrap_async(
        move |id: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, String>(format!("user-{id}"))
            }
        },
        Duration::from_secs(60),
    );

    let (a, b) = tokio::join!(fetch.call(1), fetch.call(1));
    assert_eq!(a, Ok("user-1".to_string()));
    assert_eq!(b, Ok("user-1".to_string()));
    assert_eq!(fetch.call(1).await, Ok("user-1".to_string()));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_async_wrapper_named_order_independent() {
    let (calls, seen) = counter();
    let lookup = wrap_async(
        move |args: Args<String>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, String>(format!(
                    "{}/{}",
                    args.get_named("region").cloned().unwrap_or_default(),
                    args.get_named("zone").cloned().unwrap_or_default()
                ))
            }
        },
        Duration::from_secs(60),
    );

    let first = lookup
        .call(
            Args::new()
                .named("region", "eu".to_string())
                .named("zone", "a".to_string()),
        )
        .await;
    let second = lookup
        .call(
            Args::new()
                .named("zone", "a".to_string())
                .named("region", "eu".to_string()),
        )
        .await;

    assert_eq!(first, Ok("eu/a".to_string()));
    assert_eq!(first, second);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_async_errors_propagate_and_retry() {
    let (calls, seen) = counter();
    let flaky = wrap_async(
        move |_: ()| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(format!("attempt {attempt} failed"))
                } else {
                    Ok(attempt)
                }
            }
        },
        Duration::from_secs(60),
    );

    assert_eq!(flaky.call(()).await, Err("attempt 0 failed".to_string()));
    assert_eq!(flaky.call(()).await, Err("attempt 1 failed".to_string()));
    assert_eq!(flaky.call(()).await, Ok(2));
    assert_eq!(flaky.call(()).await, Ok(2));
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

// == Configuration ==

#[test]
fn test_invalid_ttl_is_rejected_before_wrapping() {
    assert!(matches!(
        Ttl::from_secs_f64(-1.0),
        Err(MemoError::InvalidTtl(_))
    ));
    assert!(matches!("abc".parse::<Ttl>(), Err(MemoError::InvalidTtl(_))));

    let ttl: Ttl = "0.5".parse().unwrap();
    let memo = wrap_sync(|x: u8| Ok::<_, ()>(x), ttl);
    assert_eq!(memo.ttl().as_duration(), Duration::from_millis(500));
}

#[test]
fn test_zero_ttl_is_a_pass_through() {
    let (calls, seen) = counter();
    let identity = wrap_sync(
        move |x: u8| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(x)
        },
        Ttl::ZERO,
    );

    for _ in 0..4 {
        assert_eq!(identity.call(1), Ok(1));
    }
    assert_eq!(seen.load(Ordering::SeqCst), 4);
}

// == Sweep ==

#[tokio::test(start_paused = true)]
async fn test_sweep_task_bounds_growth() {
    let clock = ManualClock::new();
    let memo = Memoized::with_clock(
        |x: u64| Ok::<_, ()>(x),
        Duration::from_secs(5),
        Arc::new(clock.clone()),
    );

    for x in 0..100 {
        memo.call(x).unwrap();
    }
    assert_eq!(memo.len(), 100);

    let handle = spawn_sweep_task(memo.sweeper(), Duration::from_secs(1));
    clock.advance(Duration::from_secs(5));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(memo.is_empty());
    handle.abort();
}
