//! Benchmarks the threshold comparison hot path: `policy::scoring::evaluate`
//! is called once per accepted sample, so its cost sets a floor on how many
//! samples a single evaluate worker can process per second.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sentinel_monitor::policy::scoring::evaluate;
use sentinel_monitor::types::{Comparison, MetricInstanceId, MetricValue, Severity, Threshold};

fn numeric_threshold() -> Threshold {
    Threshold::new(
        MetricInstanceId::new(),
        Comparison::Gt,
        MetricValue::Number { n: 0.9 },
        Severity::Critical,
    )
}

fn string_threshold() -> Threshold {
    Threshold::new(
        MetricInstanceId::new(),
        Comparison::Contains,
        MetricValue::String { s: "fatal".into() },
        Severity::Critical,
    )
}

fn bench_evaluate(c: &mut Criterion) {
    let numeric = numeric_threshold();
    let string = string_threshold();

    let mut group = c.benchmark_group("evaluate");

    group.bench_function("numeric_gt_normal", |b| {
        let value = MetricValue::Number { n: 0.1 };
        b.iter(|| evaluate(black_box(&numeric), black_box(&value)));
    });

    group.bench_function("numeric_gt_critical", |b| {
        let value = MetricValue::Number { n: 0.99 };
        b.iter(|| evaluate(black_box(&numeric), black_box(&value)));
    });

    group.bench_function("numeric_gt_nan", |b| {
        let value = MetricValue::Number { n: f64::NAN };
        b.iter(|| evaluate(black_box(&numeric), black_box(&value)));
    });

    group.bench_function("string_contains_long_haystack", |b| {
        let value = MetricValue::String {
            s: "x".repeat(4096) + "fatal error encountered during shutdown",
        };
        b.iter(|| evaluate(black_box(&string), black_box(&value)));
    });

    group.finish();
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
