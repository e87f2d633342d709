//! Integration tests for worker scaling

use rust_worker_pool::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bursty_config(min: usize, max: usize) -> WorkerPoolConfig {
    WorkerPoolConfig::new(min, max)
        .with_scale_down_cooldown(Duration::from_millis(100))
        .with_pool_name("scaling-test")
}

fn assert_bounds(pool: &WorkerPool) {
    let stats = pool.stats();
    let config = pool.config();
    assert_eq!(
        stats.total_workers,
        stats.busy_workers + stats.idle_workers,
        "total must equal busy + idle: {:?}",
        stats
    );
    assert!(
        stats.total_workers >= config.min_workers && stats.total_workers <= config.max_workers,
        "worker count {} outside {}..={}",
        stats.total_workers,
        config.min_workers,
        config.max_workers
    );
}

#[tokio::test(start_paused = true)]
async fn test_burst_scales_to_max_then_converges_to_min() {
    init_logging();
    let pool = WorkerPool::new(bursty_config(1, 10)).expect("Failed to create pool");
    assert_eq!(pool.stats().total_workers, 1);

    let handles: Vec<_> = (0..50)
        .map(|i| {
            pool.execute(move || async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Ok::<_, TaskError>(i)
            })
            .expect("Failed to submit task")
        })
        .collect();

    assert_eq!(pool.stats().total_workers, 10);
    assert_bounds(&pool);

    let mut peak_busy = 0;
    for handle in handles {
        handle.await.expect("task should succeed");
        let stats = pool.stats();
        peak_busy = peak_busy.max(stats.busy_workers);
        assert_bounds(&pool);
    }
    assert_eq!(peak_busy, 10);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let stats = pool.stats();
    assert_eq!(stats.total_workers, 1);
    assert_eq!(stats.total_tasks_completed, 50);
    assert_eq!(stats.total_errors, 0);

    pool.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(start_paused = true)]
async fn test_scale_down_retires_one_worker_per_tick() {
    init_logging();
    let pool = WorkerPool::new(bursty_config(2, 6)).expect("Failed to create pool");

    let handles: Vec<_> = (0..6)
        .map(|_| {
            pool.execute(|| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, TaskError>(())
            })
            .expect("Failed to submit task")
        })
        .collect();
    for handle in handles {
        handle.await.expect("task should succeed");
    }
    assert_eq!(pool.stats().total_workers, 6);

    // Ticks fire every 100ms; the first one where workers have idled long
    // enough is at 200ms.
    tokio::time::sleep(Duration::from_millis(195)).await;
    assert_eq!(pool.stats().total_workers, 5);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pool.stats().total_workers, 4);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(pool.stats().total_workers, 2, "never below min_workers");

    pool.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(start_paused = true)]
async fn test_busy_workers_are_never_retired() {
    init_logging();
    let pool = WorkerPool::new(bursty_config(1, 3)).expect("Failed to create pool");

    let long_tasks: Vec<_> = (0..3)
        .map(|_| {
            pool.execute(|| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, TaskError>(())
            })
            .expect("Failed to submit task")
        })
        .collect();

    // Many cooldown periods pass while every worker stays busy
    tokio::time::sleep(Duration::from_millis(900)).await;
    let stats = pool.stats();
    assert_eq!(stats.total_workers, 3);
    assert_eq!(stats.busy_workers, 3);

    for handle in long_tasks {
        handle.await.expect("task should succeed");
    }
    pool.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(start_paused = true)]
async fn test_backlog_threshold_delays_scale_up() {
    init_logging();
    let pool = WorkerPool::new(bursty_config(1, 4).with_scale_up_backlog_threshold(3))
        .expect("Failed to create pool");

    let handles: Vec<_> = (0..3)
        .map(|_| {
            pool.execute(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, TaskError>(())
            })
            .expect("Failed to submit task")
        })
        .collect();

    // Backlog is 3 - 1 idle = 2, below the threshold
    assert_eq!(pool.stats().total_workers, 1);

    let more = pool
        .execute(|| async { Ok::<_, TaskError>(()) })
        .expect("Failed to submit task");
    // Backlog is now 4 - 1 idle = 3
    assert_eq!(pool.stats().total_workers, 2);

    more.await.expect("task should succeed");
    for handle in handles {
        handle.await.expect("task should succeed");
    }
    pool.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(start_paused = true)]
async fn test_fixed_size_pool_never_scales() {
    init_logging();
    let pool = WorkerPool::new(WorkerPoolConfig::fixed(3)).expect("Failed to create pool");
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..30)
        .map(|_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.execute(move || async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, TaskError>(())
            })
            .expect("Failed to submit task")
        })
        .collect();

    assert_eq!(pool.stats().total_workers, 3);
    for handle in handles {
        handle.await.expect("task should succeed");
    }
    assert_eq!(peak.load(Ordering::SeqCst), 3);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(pool.stats().total_workers, 3);

    pool.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_on_multi_thread_runtime() {
    init_logging();
    let pool = Arc::new(
        WorkerPool::new(
            WorkerPoolConfig::new(1, 8).with_scale_down_cooldown(Duration::from_millis(50)),
        )
        .expect("Failed to create pool"),
    );
    let executed = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let executed = Arc::clone(&executed);
            tokio::spawn(async move {
                let mut handles = Vec::new();
                for _ in 0..100 {
                    let executed = Arc::clone(&executed);
                    handles.push(
                        pool.execute(move || async move {
                            executed.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            Ok::<_, TaskError>(())
                        })
                        .expect("Failed to submit task"),
                    );
                }
                for handle in handles {
                    handle.await.expect("task should succeed");
                }
            })
        })
        .collect();

    for submitter in submitters {
        submitter.await.expect("submitter should not panic");
        assert_bounds(&pool);
    }

    assert_eq!(executed.load(Ordering::SeqCst), 400);
    let stats = pool.stats();
    assert_eq!(stats.total_tasks_completed, 400);
    assert_eq!(stats.total_submitted, 400);
    assert!(stats.total_workers <= 8);

    pool.shutdown(ShutdownMode::Graceful).await;
    assert_eq!(pool.stats().total_workers, 0);
}
