//! Tree rewrites applied before filtering and export.

use serde::{Deserialize, Serialize};

use crate::enums::{CodeType, DiffType, Side};
use crate::tree::DiffTree;

/// A rewrite of a tree in place. Node ids are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// Sets the label of ROOT.
    RelabelRoot(String),
    /// Removes every subtree in which nothing changed: all nodes are
    /// unchanged and sit under the same parent on both sides. ROOT stays,
    /// and so does the ENDIF of every kept branch.
    CutNonEditedSubtrees,
}

impl Transform {
    /// Applies the rewrite to `tree`.
    pub fn apply(&self, tree: &mut DiffTree) {
        match self {
            Transform::RelabelRoot(label) => {
                if let Some(root) = tree.root() {
                    tree.node_mut(root).label.clone_from(label);
                }
            }
            Transform::CutNonEditedSubtrees => cut_non_edited_subtrees(tree),
        }
    }
}

/// Applies `transforms` in order.
pub fn apply_all(transforms: &[Transform], tree: &mut DiffTree) {
    for t in transforms {
        t.apply(tree);
    }
}

/// A node is kept if it changed or has a changed descendant. Computed
/// bottom-up over the reversed pre-order of each side. An ENDIF is kept
/// with the branch it closes.
fn cut_non_edited_subtrees(tree: &mut DiffTree) {
    let mut keep = vec![false; tree.len()];
    for (ix, node) in tree.iter() {
        let moved = node.parent(Side::Before) != node.parent(Side::After);
        if node.code_type == CodeType::Root || node.diff_type != DiffType::Non || moved {
            keep[ix.index()] = true;
        }
    }
    for side in Side::ALL {
        for ix in tree.preorder(side).into_iter().rev() {
            if keep[ix.index()] {
                if let Some(parent) = tree.node(ix).parent(side) {
                    keep[parent.index()] = true;
                }
            }
        }
    }
    for (ix, node) in tree.iter() {
        let closes_kept = Side::ALL
            .into_iter()
            .any(|side| node.parent(side).is_some_and(|p| keep[p.index()]));
        if node.code_type == CodeType::Endif && closes_kept {
            keep[ix.index()] = true;
        }
    }
    tree.retain(|ix, _| keep[ix.index()]);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::linegraph::{LineGraphOptions, export_tree};
    use crate::test_helpers::tree;

    #[test]
    fn relabel_root() {
        let mut tree = tree(" x\n");
        Transform::RelabelRoot("commit".to_owned()).apply(&mut tree);
        let root = tree.root().expect("root");
        assert_eq!(tree.node(root).label, "commit");
    }

    #[test]
    fn cut_removes_untouched_conditionals() {
        let text = " #if A\n a\n #endif\n #if B\n+b\n #endif\n c\n";
        let mut tree = tree(text);
        apply_all(&[Transform::CutNonEditedSubtrees], &mut tree);
        let kept: Vec<(CodeType, &str)> = tree
            .iter()
            .map(|(_, n)| (n.code_type, n.label.as_str()))
            .collect();
        assert_eq!(
            kept,
            vec![
                (CodeType::Root, ""),
                (CodeType::If, "B"),
                (CodeType::Code, "b"),
                (CodeType::Endif, ""),
            ]
        );
        assert!(tree.check_consistency().is_ok());
    }

    #[test]
    fn cut_keeps_endif_of_every_kept_branch() {
        let text = " #if A
-a
 #elif B
 b
 #else
+c
 #endif
";
        let mut tree = tree(text);
        Transform::CutNonEditedSubtrees.apply(&mut tree);
        let types: Vec<CodeType> = tree.iter().map(|(_, n)| n.code_type).collect();
        assert_eq!(
            types,
            vec![
                CodeType::Root,
                CodeType::If,
                CodeType::Code,
                CodeType::Else,
                CodeType::Code,
                CodeType::Endif,
            ]
        );
        let text = export_tree(&tree, &LineGraphOptions::default());
        assert!(text.contains("_IF_A\n"), "{text}");
        assert!(text.contains("NON_ENDIF"), "{text}");
        assert!(tree.check_consistency().is_ok());
    }

    #[test]
    fn cut_keeps_moved_nodes_and_their_scopes() {
        let text = "+#if A\n x\n+#endif\n y\n";
        let mut tree = tree(text);
        Transform::CutNonEditedSubtrees.apply(&mut tree);
        assert_eq!(tree.len(), 4);
        assert!(tree.check_consistency().is_ok());
    }
}
