//! Simulated market-data snapshot driven through the global worker pool.
//!
//! Fires a burst of concurrent "endpoint" fetches with random latency,
//! prints pool statistics while they run, then shuts the pool down.
//!
//! Run with `RUST_LOG=info cargo run --example market_snapshot`.

use rand::Rng;
use rust_worker_pool::global;
use rust_worker_pool::prelude::*;
use std::time::{Duration, Instant};

/// Pretend HTTP call against a market-data endpoint
async fn fetch_endpoint(endpoint: &'static str, latency: Duration) -> std::result::Result<String, TaskError> {
    tokio::time::sleep(latency).await;
    Ok(format!("{} ({} ms)", endpoint, latency.as_millis()))
}

async fn fetch_security(symbol: String) -> std::result::Result<String, TaskError> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    if symbol.is_empty() || symbol.len() > 10 {
        return Err(format!("unknown security '{}'", symbol).into());
    }
    Ok(format!("{}: 512.40", symbol))
}

fn print_stats(label: &str, stats: &PoolStats) {
    println!(
        "{}: workers={} busy={} idle={} queued={} completed={} errors={}",
        label,
        stats.total_workers,
        stats.busy_workers,
        stats.idle_workers,
        stats.queue_length,
        stats.total_tasks_completed,
        stats.total_errors
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = WorkerPoolConfig::new(1, 10)
        .with_scale_down_cooldown(Duration::from_secs(2))
        .with_pool_name("market-data");
    let pool = global::init_global_pool(config)?;
    print_stats("Initial", &pool.stats());

    let endpoints = [
        "market-status",
        "summary",
        "top-gainers",
        "top-losers",
        "nepse-index",
        "security-list",
        "price-volume",
        "supply-demand",
        "live-market",
        "disclosures",
    ];

    let started = Instant::now();
    let mut rng = rand::thread_rng();
    let handles = endpoints
        .iter()
        .map(|&endpoint| {
            let latency = Duration::from_millis(rng.gen_range(200..1200));
            pool.submit(ClosureTask::with_name(
                move || fetch_endpoint(endpoint, latency),
                endpoint,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    tokio::time::sleep(Duration::from_millis(150)).await;
    print_stats("Mid-execution", &global::global_pool_stats()?);

    for handle in handles {
        match handle.await {
            Ok(body) => println!("  ok   {}", body),
            Err(e) => println!("  fail {}", e),
        }
    }
    println!("Burst finished in {:?}", started.elapsed());
    print_stats("After burst", &pool.stats());

    // Edge cases: failing tasks are reported, the pool keeps going
    for symbol in ["INVALID_SYMBOL_12345", ""] {
        let result = pool
            .submit(ClosureTask::with_name(
                move || fetch_security(symbol.to_string()),
                "security-detail",
            ))?
            .await;
        println!("  security '{}': {:?}", symbol, result);
    }

    println!("\nPer-worker:");
    for worker in pool.worker_stats() {
        println!(
            "  worker {:>2}: {:?}, {} completed, {} errors",
            worker.id, worker.state, worker.tasks_completed, worker.errors
        );
    }

    println!("\nWaiting for idle workers to retire...");
    tokio::time::sleep(Duration::from_secs(7)).await;
    print_stats("After cooldown", &pool.stats());

    match serde_json::to_string_pretty(&pool.stats()) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to serialize stats: {}", e),
    }

    global::shutdown_global_pool(ShutdownMode::Graceful).await?;
    print_stats("After shutdown", &pool.stats());
    Ok(())
}
