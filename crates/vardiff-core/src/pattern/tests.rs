#![allow(clippy::expect_used)]

use super::*;
use crate::oracle::TruthTableOracle;
use crate::test_helpers::{code, tree};

fn classify(text: &str, label: &str) -> PatternMatch {
    let tree = tree(text);
    let oracle = TruthTableOracle::default();
    let mut ctx = MatchContext::new(&tree, &oracle);
    let ix = code(&tree, label);
    Catalog::elementary().classify(&mut ctx, ix).expect("classifies")
}

fn pattern_of(text: &str, label: &str) -> &'static str {
    classify(text, label).pattern
}

#[test]
fn add_to_existing_scope() {
    assert_eq!(pattern_of(" #if A\n+x\n #endif\n", "x"), "AddToPC");
    assert_eq!(pattern_of("+x\n", "x"), "AddToPC");
}

#[test]
fn add_with_new_directive() {
    assert_eq!(pattern_of("+#if A\n+x\n+#endif\n", "x"), "AddWithMapping");
}

#[test]
fn remove_from_existing_scope() {
    assert_eq!(pattern_of(" #if A\n-x\n #endif\n", "x"), "RemFromPC");
}

#[test]
fn remove_with_directive() {
    assert_eq!(pattern_of("-#if A\n-x\n-#endif\n", "x"), "RemWithMapping");
}

#[test]
fn wrapping_in_new_guard_specializes() {
    assert_eq!(pattern_of("+#if A\n x\n+#endif\n", "x"), "Specialization");
}

#[test]
fn unwrapping_generalizes() {
    assert_eq!(pattern_of("-#if A\n x\n-#endif\n", "x"), "Generalization");
}

#[test]
fn swapping_guards_reconfigures() {
    assert_eq!(
        pattern_of("-#if A\n+#if B\n x\n #endif\n", "x"),
        "Reconfiguration"
    );
}

#[test]
fn moving_between_equivalent_scopes_is_refactoring() {
    assert_eq!(
        pattern_of("-#if A\n+#ifdef A\n x\n #endif\n", "x"),
        "Refactoring"
    );
}

#[test]
fn unchanged_code_is_untouched() {
    let m = classify(" #if A\n x\n #endif\n", "x");
    assert_eq!(m.pattern, "Untouched");
    assert_eq!(m.features, None);
}

#[test]
fn feature_context_lists_literals() {
    let m = classify(" #if A\n+#if B\n+x\n+#endif\n #endif\n", "x");
    assert_eq!(m.pattern, "AddWithMapping");
    let features = m.features.expect("after scope");
    assert_eq!(features.before, None);
    let literals: Vec<&str> = features.literals.iter().map(String::as_str).collect();
    assert_eq!(literals, vec!["A", "B"]);
}

#[test]
fn directives_are_not_classified() {
    let tree = tree(" #if A\n #endif\n");
    let oracle = TruthTableOracle::default();
    let mut ctx = MatchContext::new(&tree, &oracle);
    let if_ix = tree.find_id(1).expect("if");
    assert_eq!(
        Catalog::elementary().classify(&mut ctx, if_ix),
        Err(MatchError::NotAnArtifact { id: 1 })
    );
}

#[test]
fn catalog_without_catch_all_can_miss() {
    let tree = tree(" x\n");
    let oracle = TruthTableOracle::default();
    let catalog = Catalog::new(vec![ADD_TO_PC, REM_FROM_PC]);
    assert_eq!(
        catalog.classify_tree(&tree, &oracle),
        Err(MatchError::NoMatch { id: 1 })
    );
}

#[test]
fn oracle_failure_surfaces() {
    let tree = tree("-#if A && B\n+#if C\n x\n #endif\n");
    let oracle = TruthTableOracle { max_variables: 1 };
    let err = Catalog::elementary()
        .classify_tree(&tree, &oracle)
        .expect_err("too many literals");
    assert!(matches!(err, MatchError::Oracle(OracleError::TooManyVariables { .. })));
}

#[test]
fn classify_tree_covers_every_code_node() {
    let tree = tree(" a\n+b\n-c\n");
    let oracle = TruthTableOracle::default();
    let names: Vec<&str> = Catalog::elementary()
        .classify_tree(&tree, &oracle)
        .expect("classifies")
        .into_iter()
        .map(|m| m.pattern)
        .collect();
    assert_eq!(names, vec!["Untouched", "AddToPC", "RemFromPC"]);
}
