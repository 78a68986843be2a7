//! Shared constructors for unit tests.
//!
//! Compiled only in test builds. Integration tests under `tests/` keep their
//! own helpers in `tests/common`.
#![allow(clippy::expect_used)]

use crate::formula::Formula;
use crate::parse::parse_patch;
use crate::tree::{DiffTree, DiffTreeSource, NodeIx};

/// Parses a patch that must be well formed.
pub fn tree(text: &str) -> DiffTree {
    parse_patch(text, DiffTreeSource::default()).expect("patch parses")
}

/// The first CODE node labelled `label`.
pub fn code(tree: &DiffTree, label: &str) -> NodeIx {
    tree.code_nodes()
        .find(|&ix| tree.node(ix).label == label)
        .expect("code node present")
}

/// Shorthand for [`Formula::var`].
pub fn v(name: &str) -> Formula {
    Formula::var(name)
}
