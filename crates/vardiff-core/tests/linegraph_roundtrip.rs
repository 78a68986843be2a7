//! Exporting and re-importing trees preserves content and both edge sets.
#![allow(clippy::expect_used)]

mod common;

use common::{arb_blocks, read_fixture, render};
use proptest::prelude::*;
use vardiff_core::{
    CodeType, DecodeError, DiffTree, DiffTreeSource, DiffType, Formula, GraphFormat,
    LineGraphOptions, Side, export_trees, import, parse_patch, split_unified_diff,
};

type NodeShape = (
    usize,
    CodeType,
    DiffType,
    String,
    Option<Formula>,
    [Option<usize>; 2],
    [Vec<usize>; 2],
);

fn shape(tree: &DiffTree) -> Vec<NodeShape> {
    let id = |ix| tree.node(ix).id;
    tree.iter()
        .map(|(_, n)| {
            (
                n.id,
                n.code_type,
                n.diff_type,
                n.label.clone(),
                n.condition.clone(),
                Side::ALL.map(|side| n.parent(side).map(id)),
                Side::ALL.map(|side| n.children(side).iter().map(|&c| id(c)).collect()),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(150))]

    #[test]
    fn parsed_trees_round_trip(batch in prop::collection::vec(arb_blocks(), 1..4)) {
        let trees: Vec<DiffTree> = batch
            .iter()
            .enumerate()
            .map(|(i, blocks)| {
                parse_patch(&render(blocks), DiffTreeSource::new(format!("f{i}.c"), "abc"))
                    .expect("balanced input parses")
            })
            .collect();
        let options = LineGraphOptions::default();
        let text = export_trees(&trees, &options);
        let back = import(&text, &options).expect("own output decodes");
        prop_assert_eq!(back.len(), trees.len());
        for (original, decoded) in trees.iter().zip(&back) {
            prop_assert_eq!(&original.source, &decoded.source);
            prop_assert_eq!(shape(original), shape(decoded));
        }
    }

    #[test]
    fn commit_graphs_round_trip(batch in prop::collection::vec(arb_blocks(), 1..4)) {
        let trees = batch.iter().map(|blocks| {
            parse_patch(&render(blocks), DiffTreeSource::default()).expect("parses")
        });
        let graph = DiffTree::commit_graph("abc", trees);
        let options = LineGraphOptions {
            graph_format: GraphFormat::Graph,
            ..LineGraphOptions::default()
        };
        let back = import(&export_trees([&graph], &options), &options).expect("decodes");
        if graph.iter().next().is_none() {
            prop_assert!(back.is_empty());
        } else {
            prop_assert_eq!(back.len(), 1);
            prop_assert_eq!(shape(&graph), shape(&back[0]));
        }
    }
}

#[test]
fn fixture_commit_exports_and_decodes() {
    let files = split_unified_diff(&read_fixture("commit/multi.diff"));
    let trees: Vec<DiffTree> = files
        .iter()
        .filter_map(|f| parse_patch(&f.patch, DiffTreeSource::new(f.path(), "fixture")).ok())
        .collect();
    assert_eq!(trees.len(), 4);
    let options = LineGraphOptions::default();
    let back = import(&export_trees(&trees, &options), &options).expect("decodes");
    let paths: Vec<&str> = back.iter().map(|t| t.source.path.as_str()).collect();
    assert_eq!(paths, vec!["src/config.h", "src/main.c", "src/legacy.c", "README.md"]);
    for (a, b) in trees.iter().zip(&back) {
        assert_eq!(shape(a), shape(b));
    }
}

#[test]
fn undeclared_edge_target_yields_no_trees() {
    let text = "t # a.c$$$1\nv 0 NON_ROOT\nv 1 NON_CODE_x\ne 1 0 both\ne 1 2 both\n";
    let err = import(text, &LineGraphOptions::default()).expect_err("fails");
    assert_eq!(err, DecodeError::UnknownNode { line: 5, id: 2 });
}
