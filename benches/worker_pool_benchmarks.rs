use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rust_worker_pool::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn benchmark_pool_creation(c: &mut Criterion) {
    let rt = runtime();

    c.bench_function("worker_pool_creation", |b| {
        b.iter(|| {
            rt.block_on(async {
                let pool = WorkerPool::new(WorkerPoolConfig::new(4, 4)).expect("Failed to create pool");
                pool.shutdown(ShutdownMode::Graceful).await;
            })
        });
    });
}

fn benchmark_task_submission(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("task_submission");

    // Lightweight tasks
    group.bench_function("lightweight_tasks_100", |b| {
        b.iter_batched(
            || {
                rt.block_on(async {
                    WorkerPool::new(WorkerPoolConfig::fixed(4)).expect("Failed to create pool")
                })
            },
            |pool| {
                rt.block_on(async {
                    for _ in 0..100 {
                        pool.execute(|| async {
                            black_box(1 + 1);
                            Ok::<_, TaskError>(())
                        })
                        .expect("Failed to submit task");
                    }
                    pool.shutdown(ShutdownMode::Graceful).await;
                })
            },
            BatchSize::SmallInput,
        );
    });

    // Medium workload
    group.bench_function("medium_tasks_100", |b| {
        b.iter_batched(
            || {
                rt.block_on(async {
                    WorkerPool::new(WorkerPoolConfig::fixed(4)).expect("Failed to create pool")
                })
            },
            |pool| {
                rt.block_on(async {
                    for _ in 0..100 {
                        pool.execute(|| async {
                            let mut sum = 0u64;
                            for i in 0..1000 {
                                sum = sum.wrapping_add(i);
                            }
                            black_box(sum);
                            Ok::<_, TaskError>(())
                        })
                        .expect("Failed to submit task");
                    }
                    pool.shutdown(ShutdownMode::Graceful).await;
                })
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_scale_up_burst(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("scale_up_burst");

    for max_workers in [2usize, 8, 32] {
        group.bench_with_input(
            BenchmarkId::from_parameter(max_workers),
            &max_workers,
            |b, &max_workers| {
                b.iter(|| {
                    rt.block_on(async {
                        let pool = WorkerPool::new(WorkerPoolConfig::new(1, max_workers))
                            .expect("Failed to create pool");
                        let handles: Vec<_> = (0..200)
                            .map(|_| {
                                pool.execute(|| async {
                                    tokio::time::sleep(Duration::from_micros(100)).await;
                                    Ok::<_, TaskError>(())
                                })
                                .expect("Failed to submit task")
                            })
                            .collect();
                        for handle in handles {
                            handle.await.expect("task should succeed");
                        }
                        pool.shutdown(ShutdownMode::Graceful).await;
                    })
                });
            },
        );
    }

    group.finish();
}

fn benchmark_throughput(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("tasks_per_second", |b| {
        b.iter_batched(
            || {
                let pool = rt.block_on(async {
                    WorkerPool::new(WorkerPoolConfig::new(2, 8)).expect("Failed to create pool")
                });
                (pool, Arc::new(AtomicU64::new(0)))
            },
            |(pool, counter)| {
                rt.block_on(async {
                    let handles: Vec<_> = (0..1000)
                        .map(|_| {
                            let counter = Arc::clone(&counter);
                            pool.execute(move || async move {
                                counter.fetch_add(1, Ordering::Relaxed);
                                Ok::<_, TaskError>(())
                            })
                            .expect("Failed to submit task")
                        })
                        .collect();
                    for handle in handles {
                        handle.await.expect("task should succeed");
                    }
                    pool.shutdown(ShutdownMode::Graceful).await;
                });
                black_box(counter.load(Ordering::Relaxed));
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_stats_snapshot(c: &mut Criterion) {
    let rt = runtime();
    let pool = rt.block_on(async { WorkerPool::new(WorkerPoolConfig::new(2, 8)).expect("Failed to create pool") });

    c.bench_function("stats_snapshot", |b| {
        b.iter(|| black_box(pool.stats()));
    });

    rt.block_on(pool.shutdown(ShutdownMode::Graceful));
}

criterion_group!(
    benches,
    benchmark_pool_creation,
    benchmark_task_submission,
    benchmark_scale_up_burst,
    benchmark_throughput,
    benchmark_stats_snapshot
);
criterion_main!(benches);
