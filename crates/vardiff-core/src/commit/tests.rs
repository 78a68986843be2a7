#![allow(clippy::expect_used)]

use super::*;
use crate::parse::ParseError;

const MULTI: &str = include_str!("../../../../tests/fixtures/commit/multi.diff");

#[test]
fn splits_git_diff_into_files() {
    let files = split_unified_diff(MULTI);
    let paths: Vec<&str> = files.iter().map(FileDiff::path).collect();
    assert_eq!(
        paths,
        vec!["src/config.h", "src/main.c", "src/legacy.c", "src/broken.c", "README.md"]
    );
    let types: Vec<ChangeType> = files.iter().map(|f| f.change_type).collect();
    assert_eq!(
        types,
        vec![
            ChangeType::Modify,
            ChangeType::Modify,
            ChangeType::Rename,
            ChangeType::Add,
            ChangeType::Delete,
        ]
    );
    assert_eq!(files[2].old_path.as_deref(), Some("src/old.c"));
    assert_eq!(files[3].old_path, None);
    assert_eq!(files[4].new_path, None);
}

#[test]
fn removed_line_resembling_header_stays_in_patch() {
    let files = split_unified_diff(MULTI);
    assert!(files[1].patch.contains("-- legacy comment marker\n"));
    assert!(files[1].patch.starts_with("@@ -10,7 +10,7 @@"));
    assert!(files[1].patch.ends_with(" }\n"));
}

#[test]
fn splits_plain_unified_diff() {
    let text = "--- a.c\t2024-01-01\n+++ a.c\t2024-01-02\n@@ -1 +1 @@\n-x\n+y\n--- b.c\n+++ b.c\n@@ -1 +1,2 @@\n z\n+w\n";
    let files = split_unified_diff(text);
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].path(), "a.c");
    assert_eq!(files[0].patch, "@@ -1 +1 @@\n-x\n+y\n");
    assert_eq!(files[1].path(), "b.c");
}

#[test]
fn c_family_filter() {
    let filter = DiffFilter::c_family();
    let files = split_unified_diff(MULTI);
    let accepted: Vec<&str> = files
        .iter()
        .filter(|f| filter.accepts_file(f))
        .map(FileDiff::path)
        .collect();
    assert_eq!(accepted, vec!["src/config.h", "src/main.c", "src/broken.c"]);
}

#[test]
fn path_patterns_match_whole_path() {
    let filter = DiffFilter::new()
        .allow_path("src/.*")
        .and_then(|f| f.block_path(".*broken.*"))
        .expect("valid patterns");
    let file = |path: &str| FileDiff {
        old_path: Some(path.to_owned()),
        new_path: Some(path.to_owned()),
        change_type: ChangeType::Modify,
        patch: String::new(),
    };
    assert!(filter.accepts_file(&file("src/main.c")));
    assert!(!filter.accepts_file(&file("lib/src/main.c")));
    assert!(!filter.accepts_file(&file("src/broken.c")));
}

#[test]
fn invalid_path_pattern_is_reported() {
    let err = DiffFilter::new().allow_path("(").expect_err("invalid");
    assert_eq!(err.pattern, "(");
}

#[test]
fn extensions_are_case_insensitive() {
    let filter = DiffFilter::new().extension(".C");
    let file = FileDiff {
        old_path: None,
        new_path: Some("Main.c".to_owned()),
        change_type: ChangeType::Add,
        patch: String::new(),
    };
    assert!(filter.accepts_file(&file));
    assert_eq!(filter.extensions(), ["c"]);
}

#[test]
fn merge_commits_need_opt_in() {
    let merge = CommitInfo {
        id: "m".to_owned(),
        parent_count: 2,
    };
    assert!(!DiffFilter::new().accepts_commit(&merge));
    let filter = DiffFilter {
        allow_merge: true,
        ..DiffFilter::new()
    };
    assert!(filter.accepts_commit(&merge));
    assert!(DiffFilter::new().accepts_commit(&CommitInfo::new("c")));
}

#[test]
fn commit_diff_parses_accepted_files() {
    let diff = CommitDiff::build("abc", split_unified_diff(MULTI), &DiffFilter::c_family());
    assert_eq!(diff.filtered_files, 2);
    assert_eq!(diff.patches.len(), 3);
    assert_eq!(diff.trees().count(), 2);
    let errors: Vec<&ParseError> = diff.errors().collect();
    assert!(matches!(errors[..], [ParseError::UnclosedConditional { .. }]));
    let tree = diff.trees().next().expect("config.h");
    assert_eq!(tree.source.path, "src/config.h");
    assert_eq!(tree.source.commit, "abc");
    assert_eq!(tree.source.hunk.map(|h| h.to_string()).as_deref(), Some("-1,5 +1,8"));
}
