//! TTL Memo demo
//!
//! Wraps a slow synchronous and a slow asynchronous computation and shows
//! which calls are served from the cache.
//!
//! # Startup Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load configuration from environment variables
//! 3. Wrap the demo computations
//! 4. Start the background sweep task if configured
//! 5. Call the sync wrapper on the blocking pool, then the async wrapper
//!    with concurrent calls for one key

use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_memo::{spawn_sweep_task, wrap_async, wrap_sync, Args, MemoConfig};

fn slow_square(x: u64) -> Result<u64, String> {
    std::thread::sleep(Duration::from_millis(300));
    x.checked_mul(x).ok_or_else(|| format!("{x} squared overflows"))
}

async fn slow_greeting(args: Args<String>) -> Result<String, String> {
    tokio::time::sleep(Duration::from_millis(300)).await;
    let name = args
        .get_named("name")
        .ok_or_else(|| "missing `name`".to_string())?;
    let greeting = args.get_named("greeting").map_or("Hello", String::as_str);
    Ok(format!("{greeting}, {name}!"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_memo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MemoConfig::from_env().context("Failed to load memo configuration")?;
    info!(ttl = %config.ttl, sweep_interval = ?config.sweep_interval, "Configuration loaded");

    let square = wrap_sync(slow_square, config.ttl);
    let greet = wrap_async(slow_greeting, config.ttl);

    let sweepers = config.sweep_interval.map(|interval| {
        [
            spawn_sweep_task(square.sweeper(), interval),
            spawn_sweep_task(greet.sweeper(), interval),
        ]
    });

    // slow_square blocks its thread, so keep it off the async workers
    let blocking_square = square.clone();
    tokio::task::spawn_blocking(move || {
        for x in [4, 4, 5, 4] {
            let started = Instant::now();
            let result = blocking_square.call(x);
            info!(x, ?result, elapsed = ?started.elapsed(), "slow_square");
        }
        if let Err(e) = blocking_square.call(u64::MAX) {
            info!(error = %e, "slow_square failed, nothing cached");
        }
    })
    .await
    .context("slow_square demo task failed")?;

    let ada = || {
        Args::new()
            .named("name", "Ada".to_string())
            .named("greeting", "Hi".to_string())
    };
    let ada_reordered = Args::new()
        .named("greeting", "Hi".to_string())
        .named("name", "Ada".to_string());

    let started = Instant::now();
    let (a, b, c) = tokio::join!(
        greet.call(ada()),
        greet.call(ada()),
        greet.call(ada_reordered)
    );
    info!(?a, ?b, ?c, elapsed = ?started.elapsed(), "Three concurrent greetings, one computation");

    let started = Instant::now();
    let cached = greet.call(ada()).await;
    info!(?cached, elapsed = ?started.elapsed(), "slow_greeting");

    info!(
        squares = square.len(),
        greetings = greet.len(),
        "Cached entries"
    );

    if let Some(handles) = sweepers {
        for handle in handles {
            handle.abort();
        }
    }

    Ok(())
}
