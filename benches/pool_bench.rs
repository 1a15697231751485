use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use jobpool::{Job, Params, Pool, PoolConfig};
use rand::prelude::*;

const JOBS: usize = 1000;

/// Small CPU-bound jobs of random size.
fn workloads() -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..JOBS).map(|_| rng.gen_range(100..2_000)).collect()
}

fn submit_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit");
    let workloads = workloads();

    for max_open in [1, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("job_queue", max_open),
            &max_open,
            |b, &max_open| {
                let pool = Pool::new(
                    PoolConfig::default()
                        .pool_size(JOBS)
                        .worker_max_open(max_open)
                        .worker_idle(1)
                        .worker_life_time(Duration::from_secs(5)),
                )
                .unwrap();
                let sink = Arc::new(AtomicU64::new(0));

                b.iter(|| {
                    for &n in &workloads {
                        let sink = sink.clone();
                        pool.job_queue(Job::with_params(
                            move |params: Params| {
                                let n = params.get::<u64>(0).copied().unwrap_or(0);
                                let sum = (0..n).fold(0u64, |acc, x| acc.wrapping_add(x * x));
                                sink.fetch_add(black_box(sum) & 1, Ordering::Relaxed);
                            },
                            Params::new().with(n),
                        ));
                    }
                    pool.wait();
                });

                pool.graceful_stop();
            },
        );
    }

    group.finish();
}

fn burst_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("burst");

    group.bench_function("grow_and_shrink", |b| {
        b.iter_batched(
            || {
                Pool::new(
                    PoolConfig::default()
                        .pool_size(64)
                        .worker_max_open(32)
                        .worker_idle(2)
                        .worker_life_time(Duration::from_millis(1)),
                )
                .unwrap()
            },
            |pool| {
                for _ in 0..64 {
                    pool.job_queue(Job::new(|| std::thread::sleep(Duration::from_micros(50))));
                }
                pool.graceful_stop();
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, submit_bench, burst_bench);
criterion_main!(benches);
