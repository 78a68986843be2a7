//! Generated patches are always well formed and fully classifiable.
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use proptest::prelude::*;
use vardiff_bench::{
    GeneratorConfig, NullSink, SizeTier, generate_file_diff, generate_history, generate_patch,
};
use vardiff_core::{
    Catalog, DiffFilter, DiffTreeSource, MiningConfig, TruthTableOracle, mine, parse_patch,
    split_unified_diff,
};

fn assert_valid(config: &GeneratorConfig, label: &str) {
    let patch = generate_patch(config);
    let tree = parse_patch(&patch, DiffTreeSource::new("gen.c", "0"))
        .unwrap_or_else(|e| panic!("{label}: generated patch does not parse: {e}"));
    tree.check_consistency()
        .unwrap_or_else(|e| panic!("{label}: inconsistent tree: {e}"));
    Catalog::elementary()
        .classify_tree(&tree, &TruthTableOracle::default())
        .unwrap_or_else(|e| panic!("{label}: classification failed: {e}"));
}

#[test]
fn every_tier_is_valid_across_seeds() {
    for tier in [SizeTier::Small, SizeTier::Medium] {
        for seed in 0..10 {
            assert_valid(&tier.config(seed), &format!("{tier:?}/{seed}"));
        }
    }
}

#[test]
fn generation_is_deterministic() {
    let config = SizeTier::Medium.config(99);
    assert_eq!(generate_patch(&config), generate_patch(&config));
    assert_ne!(generate_patch(&config), generate_patch(&SizeTier::Medium.config(100)));
}

#[test]
fn file_diff_headers_cover_the_whole_body() {
    let config = SizeTier::Small.config(5);
    let text = generate_file_diff("src/x.c", &config);
    let files = split_unified_diff(&text);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path(), "src/x.c");

    let direct = parse_patch(&generate_patch(&config), DiffTreeSource::default()).expect("parses");
    let split = parse_patch(&files[0].patch, DiffTreeSource::default()).expect("parses");
    assert_eq!(direct.len(), split.len());
}

#[test]
fn generated_history_mines_every_tree() {
    let history = generate_history(&SizeTier::Small.config(1), 12, 3);
    assert_eq!(history.len(), 12);
    let config = MiningConfig {
        batch_size: 5,
        threads: Some(2),
        diff_filter: DiffFilter::c_family(),
        ..MiningConfig::default()
    };
    let outcome = mine(&history, &NullSink, &TruthTableOracle::default(), &config).expect("mines");
    assert!(outcome.is_complete());
    assert_eq!(outcome.result.total_commits, 12);
    assert_eq!(outcome.result.total_patches, 36);
    assert_eq!(outcome.result.exported_trees, 36);
    assert!(outcome.result.diff_errors.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_settings_generate_valid_patches(
        seed in any::<u64>(),
        blocks in 1usize..40,
        max_depth in 0usize..5,
        conditional in 0.0f64..1.0,
        edit in 0.0f64..1.0,
    ) {
        let config = GeneratorConfig {
            seed,
            blocks,
            max_depth,
            conditional_probability: conditional,
            edit_probability: edit,
            ..SizeTier::Small.config(seed)
        };
        assert_valid(&config, "proptest");
    }
}
