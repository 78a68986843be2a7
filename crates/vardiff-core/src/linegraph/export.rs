//! Line-graph writer.

use crate::enums::Side;
use crate::tree::DiffTree;

use super::{EDGE_PREFIX, LineGraphOptions, NODE_PREFIX, ROLE_AFTER, ROLE_BEFORE, ROLE_BOTH, TREE_HEADER};

/// Appends one tree section, trailing blank line included, to `out`.
///
/// Node lines follow arena order. Edge lines follow the arena order of their
/// child, which reproduces every child list on import because parsers and
/// transforms only ever append children in arena order.
pub fn write_tree(out: &mut String, tree: &DiffTree, options: &LineGraphOptions) {
    out.push_str(&format!("{TREE_HEADER} {}\n", options.tree_format.to_label(&tree.source)));
    for (_, node) in tree.iter() {
        out.push_str(&format!("{NODE_PREFIX}{} {}\n", node.id, options.node_format.to_label(node)));
    }
    for (_, node) in tree.iter() {
        let before = node.parent(Side::Before).map(|p| tree.node(p).id);
        let after = node.parent(Side::After).map(|p| tree.node(p).id);
        match (before, after) {
            (Some(b), Some(a)) if a == b => {
                out.push_str(&format!("{EDGE_PREFIX}{} {b} {ROLE_BOTH}\n", node.id));
            }
            (before, after) => {
                if let Some(b) = before {
                    out.push_str(&format!("{EDGE_PREFIX}{} {b} {ROLE_BEFORE}\n", node.id));
                }
                if let Some(a) = after {
                    out.push_str(&format!("{EDGE_PREFIX}{} {a} {ROLE_AFTER}\n", node.id));
                }
            }
        }
    }
    out.push('\n');
}

/// Encodes a single tree.
pub fn export_tree(tree: &DiffTree, options: &LineGraphOptions) -> String {
    let mut out = String::new();
    write_tree(&mut out, tree, options);
    out
}

/// Encodes trees in order.
pub fn export_trees<'a>(trees: impl IntoIterator<Item = &'a DiffTree>, options: &LineGraphOptions) -> String {
    let mut out = String::new();
    for tree in trees {
        write_tree(&mut out, tree, options);
    }
    out
}
