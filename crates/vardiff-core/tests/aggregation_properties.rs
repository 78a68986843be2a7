//! Algebraic properties of `MiningResult::append` and its snapshot text.
#![allow(clippy::expect_used)]

use std::collections::BTreeMap;

use proptest::prelude::*;
use vardiff_core::{CommitTime, MiningResult, PatternCount, TreeCriterion};

fn arb_counts(keys: Vec<String>) -> impl Strategy<Value = BTreeMap<String, u64>> {
    prop::collection::btree_map(prop::sample::select(keys), 0u64..50, 0..4)
}

fn arb_commit_time() -> impl Strategy<Value = Option<CommitTime>> {
    prop::option::of(
        (prop::sample::select(vec!["a1", "b2", "c3", "d4"]), 0u64..20).prop_map(|(c, millis)| {
            CommitTime {
                commit: c.to_owned(),
                millis,
            }
        }),
    )
}

fn arb_result() -> impl Strategy<Value = MiningResult> {
    let keys = |names: &[&str]| names.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>();
    let filter_keys: Vec<String> = TreeCriterion::ALL
        .iter()
        .map(|c| c.explanation_key())
        .collect();
    (
        prop::collection::vec(0u64..100, 9),
        arb_counts(keys(&["ADD", "REM", "NON"])),
        prop::collection::btree_map(
            prop::sample::select(keys(&["AddToPC", "Untouched", "Refactoring"])),
            (0u64..30, 0u64..10).prop_map(|(occurrences, commits)| PatternCount {
                occurrences,
                commits,
            }),
            0..3,
        ),
        arb_counts(filter_keys),
        arb_counts(keys(&["unmatched_endif", "classification"])),
        prop::collection::btree_map(
            prop::sample::select(keys(&["a1", "b2", "e5"])),
            "[a-z]{1,8}",
            0..2,
        ),
        arb_commit_time(),
        arb_commit_time(),
    )
        .prop_map(
            |(n, exported_nodes, pattern_counts, filter_hits, diff_errors, failures, fastest, slowest)| {
                MiningResult {
                    total_commits: n[0],
                    exported_commits: n[1],
                    empty_commits: n[2],
                    failed_commits: n[3],
                    filtered_commits: n[4],
                    total_patches: n[5],
                    exported_trees: n[6],
                    exported_nodes,
                    pattern_counts,
                    filter_hits,
                    diff_errors,
                    failures,
                    fastest,
                    slowest,
                    runtime_millis: n[7],
                    runtime_with_multithreading_millis: n[8],
                }
            },
        )
}

fn combined(a: &MiningResult, b: &MiningResult) -> MiningResult {
    let mut out = a.clone();
    out.append(b);
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn append_is_commutative(a in arb_result(), b in arb_result()) {
        prop_assert_eq!(combined(&a, &b), combined(&b, &a));
    }

    #[test]
    fn append_is_associative(a in arb_result(), b in arb_result(), c in arb_result()) {
        prop_assert_eq!(combined(&combined(&a, &b), &c), combined(&a, &combined(&b, &c)));
    }

    #[test]
    fn empty_is_identity(a in arb_result()) {
        prop_assert_eq!(combined(&a, &MiningResult::new()), a.clone());
        prop_assert_eq!(combined(&MiningResult::new(), &a), a);
    }

    #[test]
    fn snapshot_text_parses_back(a in arb_result()) {
        let back = MiningResult::from_snapshot(&a.to_snapshot()).expect("parses");
        prop_assert_eq!(back, a);
    }
}
