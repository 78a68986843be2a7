//! End-to-end mining of a generated history at different thread counts.
#![allow(clippy::expect_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use vardiff_bench::{NullSink, SizeTier, generate_history};
use vardiff_core::{DiffFilter, MiningConfig, TruthTableOracle, mine};

fn bench_mine(c: &mut Criterion) {
    let mut group = c.benchmark_group("mine");
    group.sample_size(10);
    let history = generate_history(&SizeTier::Small.config(3), 200, 4);
    let oracle = TruthTableOracle::default();

    for threads in [1, 2, 4] {
        let config = MiningConfig {
            batch_size: 20,
            threads: Some(threads),
            diff_filter: DiffFilter::c_family(),
            ..MiningConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(threads), &config, |b, config| {
            b.iter(|| mine(&history, &NullSink, &oracle, config).expect("mines"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mine);
criterion_main!(benches);
