//! Request statistics benchmarks
//!
//! Measures the recording hot path and the cost of a cold versus cached
//! snapshot.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;
use trafficlens_extras::stats::{
    compute_snapshot, RequestSample, StatsAggregator, StatsConfig, StatsHolder,
};

fn samples(count: usize) -> Vec<RequestSample> {
    (0..count)
        .map(|i| {
            RequestSample::new(
                format!("http://bench.local/items/{}", i),
                "GET",
                (i % 97) as f64 * 1.5,
                200,
            )
        })
        .collect()
}

fn aggregator(capacity: usize) -> StatsAggregator {
    let config = StatsConfig::new()
        .max_records(capacity)
        .publish_every(u64::MAX)
        .publish_after(Duration::from_secs(3600));
    StatsAggregator::new(config, Arc::new(StatsHolder::new()))
}

/// Benchmark recording into a full window
fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");

    for capacity in [100, 500, 5000].iter() {
        let agg = aggregator(*capacity);
        for sample in samples(*capacity) {
            agg.record(sample);
        }

        group.bench_with_input(BenchmarkId::new("capacity", capacity), capacity, |b, _| {
            b.iter(|| agg.record(RequestSample::new("http://bench.local/", "GET", 3.0, 200)))
        });
    }

    group.finish();
}

/// Benchmark a full snapshot computation
fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_snapshot");

    for count in [100, 500, 5000].iter() {
        let window = samples(*count);
        group.bench_with_input(BenchmarkId::new("samples", count), &window, |b, window| {
            b.iter(|| compute_snapshot(black_box(window), 5))
        });
    }

    group.finish();
}

/// Benchmark repeated snapshots of an unchanged window
fn bench_cached_snapshot(c: &mut Criterion) {
    let agg = aggregator(500);
    for sample in samples(500) {
        agg.record(sample);
    }
    agg.snapshot();

    c.bench_function("cached_snapshot", |b| b.iter(|| black_box(agg.snapshot())));
}

criterion_group!(benches, bench_record, bench_compute, bench_cached_snapshot);
criterion_main!(benches);
