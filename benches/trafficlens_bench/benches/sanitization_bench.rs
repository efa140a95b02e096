//! Sanitization benchmarks
//!
//! Masking and truncation run on every logged body, so their cost is paid
//! per request.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trafficlens_extras::sanitization::{is_likely_text, truncate, Sanitizer};

fn json_body(fields: usize) -> String {
    let entries: Vec<String> = (0..fields)
        .map(|i| format!(r#""field_{}": "value_{}""#, i, i))
        .collect();
    format!(r#"{{"password": "hunter2", {}, "token": "abc"}}"#, entries.join(", "))
}

/// Benchmark masking with a growing number of sensitive fields
fn bench_mask(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask");
    let body = json_body(50);

    for field_count in [1, 4, 16].iter() {
        let fields: Vec<String> = std::iter::once("password".to_string())
            .chain((1..*field_count).map(|i| format!("secret_{}", i)))
            .collect();
        let sanitizer = Sanitizer::new(fields);

        group.bench_with_input(
            BenchmarkId::new("sensitive_fields", field_count),
            &body,
            |b, body| b.iter(|| sanitizer.mask(black_box(body))),
        );
    }

    group.finish();
}

/// Benchmark truncate-then-mask on bodies around the default cap
fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");
    let sanitizer = Sanitizer::new(["password", "token"]);

    for fields in [10, 100, 1000].iter() {
        let body = json_body(*fields);
        group.bench_with_input(BenchmarkId::new("body_fields", fields), &body, |b, body| {
            b.iter(|| sanitizer.sanitize(black_box(body), 5000))
        });
    }

    group.finish();
}

/// Benchmark the cheap text checks
fn bench_text_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_checks");
    let text = "lorem ipsum dolor sit amet\n".repeat(200);

    group.bench_function("is_likely_text", |b| b.iter(|| is_likely_text(black_box(&text))));
    group.bench_function("truncate", |b| b.iter(|| truncate(black_box(&text), 1000)));

    group.finish();
}

criterion_group!(benches, bench_mask, bench_sanitize, bench_text_checks);
criterion_main!(benches);
