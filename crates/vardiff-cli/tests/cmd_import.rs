//! Integration tests for `vardiff import`.
#![allow(clippy::expect_used)]

use std::path::PathBuf;
use std::process::Command;

fn vardiff_bin() -> PathBuf {
    let mut path = std::env::current_exe().expect("current exe");
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("vardiff");
    path
}

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../../tests/fixtures");
    path.push(name);
    path
}

#[test]
fn import_counts_nodes_and_edges_per_tree() {
    let out = Command::new(vardiff_bin())
        .args(["import", fixture("linegraph/sample.lg").to_str().expect("path")])
        .output()
        .expect("run vardiff import");
    assert!(out.status.success(), "exit code: {:?}", out.status.code());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("trees: 2"), "stdout: {stdout}");
    assert!(stdout.contains("config.h$$$0001: 5 nodes, 4 edges"), "stdout: {stdout}");
    assert!(stdout.contains("main.c$$$0001: 3 nodes, 2 edges"), "stdout: {stdout}");
}

#[test]
fn import_json_reports_each_tree() {
    let out = Command::new(vardiff_bin())
        .args([
            "--format",
            "json",
            "import",
            fixture("linegraph/sample.lg").to_str().expect("path"),
        ])
        .output()
        .expect("run vardiff import");
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    let trees = value["trees"].as_array().expect("trees");
    assert_eq!(trees.len(), 2);
    assert_eq!(trees[0]["nodes"], 5);
}

#[test]
fn import_unknown_node_exits_2() {
    let out = Command::new(vardiff_bin())
        .args(["import", fixture("linegraph/unknown-node.lg").to_str().expect("path")])
        .output()
        .expect("run vardiff import");
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("cannot decode"), "stderr: {stderr}");
}

#[test]
fn parse_output_imports_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let lg = dir.path().join("a.lg");
    let parsed = Command::new(vardiff_bin())
        .args(["parse", fixture("pc/a.diff").to_str().expect("path")])
        .output()
        .expect("run vardiff parse");
    assert!(parsed.status.success());
    std::fs::write(&lg, &parsed.stdout).expect("write line graph");

    let out = Command::new(vardiff_bin())
        .args(["import", lg.to_str().expect("path")])
        .output()
        .expect("run vardiff import");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("trees: 1"), "stdout: {stdout}");
}
