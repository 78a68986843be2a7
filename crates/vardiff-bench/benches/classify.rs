//! Edit-pattern classification, the oracle-heavy part of mining.
#![allow(clippy::expect_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use vardiff_bench::{SizeTier, generate_patch};
use vardiff_core::{Catalog, DiffTreeSource, TruthTableOracle, parse_patch};

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_tree");
    let catalog = Catalog::elementary();
    let oracle = TruthTableOracle::default();

    for (name, tier) in [("S", SizeTier::Small), ("M", SizeTier::Medium)] {
        let patch = generate_patch(&tier.config(7));
        let tree = parse_patch(&patch, DiffTreeSource::new("bench.c", "0")).expect("parses");
        group.throughput(Throughput::Elements(tree.code_nodes().count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &tree, |b, tree| {
            b.iter(|| catalog.classify_tree(tree, &oracle).expect("classifies"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
