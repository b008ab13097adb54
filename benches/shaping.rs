//! Benchmarks for the shaping hot path.
//!
//! Run with: cargo bench

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use ioshape::{Direction, MountShaper, MountStats, ShaperConfig, TokenBucket, WEIGHT_EQUAL};
use std::sync::Arc;
use std::thread;

/// Single-threaded admission with tokens always available.
fn bench_acquire_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire");
    group.throughput(Throughput::Elements(1));

    // Fresh bucket per admission keeps the token path hot.
    group.bench_function("token_available", |b| {
        b.iter_batched(
            || TokenBucket::new(u16::MAX, u16::MAX, 0),
            |bucket| black_box(bucket.acquire()),
            BatchSize::SmallInput,
        )
    });

    // Burst exhausted with an unreachable timeout: every admission
    // publishes a pushed-out deadline.
    let scheduled = TokenBucket::new(1, 1, u64::MAX);
    let _ = scheduled.acquire();
    group.bench_function("deadline_path", |b| {
        b.iter(|| black_box(scheduled.acquire()))
    });

    // Burst exhausted with a tiny timeout: every admission is a drop,
    // which publishes nothing.
    let starved = TokenBucket::new(1, 1, 1_000_000);
    let _ = starved.acquire();
    group.bench_function("drop_path", |b| b.iter(|| black_box(starved.acquire())));

    // Disabled shaping is the pure fast path.
    let disabled = TokenBucket::new(0, 0, 0);
    group.bench_function("disabled", |b| b.iter(|| black_box(disabled.acquire())));

    group.finish();
}

/// Admission under CAS contention from multiple threads.
fn bench_acquire_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_contended");

    for threads in [2, 4, 8] {
        group.throughput(Throughput::Elements(1_000 * threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let bucket = Arc::new(TokenBucket::new(u16::MAX, u16::MAX, 0));
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let bucket = Arc::clone(&bucket);
                            thread::spawn(move || {
                                for _ in 0..1_000 {
                                    black_box(bucket.acquire());
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Statistics fold-in, the other per-operation cost.
fn bench_stats_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats");
    group.throughput(Throughput::Elements(1));

    let stats = MountStats::new(WEIGHT_EQUAL);
    group.bench_function("update", |b| {
        b.iter(|| stats.update(Direction::Read, black_box(250_000), black_box(120)))
    });

    group.finish();
}

/// The full per-operation sequence a filesystem shim performs.
fn bench_shim_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("shim");
    group.throughput(Throughput::Elements(1));

    let shaper = MountShaper::new(ShaperConfig::iops(u16::MAX));
    group.bench_function("acquire_complete", |b| {
        b.iter(|| {
            let verdict = shaper.acquire();
            shaper.complete(Direction::Write, black_box(verdict), black_box(80));
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_acquire_uncontended,
    bench_acquire_contended,
    bench_stats_update,
    bench_shim_round_trip
);
criterion_main!(benches);
