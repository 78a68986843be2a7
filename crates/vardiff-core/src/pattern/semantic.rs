//! Semantic patterns: edits recognized on directive nodes rather than on
//! CODE nodes.
//!
//! Unlike the elementary catalog, a semantic catalog is not total. A tree may
//! contain any number of matches, including none, and matches are reported
//! separately from the elementary pattern counts.

use std::fmt;

use serde::Serialize;

use crate::enums::{CodeType, DiffType, Side};
use crate::oracle::SatOracle;
use crate::tree::{DiffTree, LineRange, NodeIx};

use super::{MatchContext, MatchError};


/// A semantic rule, invoked for every non-CODE, non-ROOT node.
pub type SemanticRule =
    fn(&mut MatchContext<'_, '_>, NodeIx) -> Result<Option<SemanticMatch>, MatchError>;

/// One occurrence of a semantic pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemanticMatch {
    /// Pattern name.
    pub pattern: &'static str,
    /// Id of the directive the match is anchored on.
    pub node_id: usize,
    /// Diff lines spanned by the match.
    pub lines: LineRange,
}

/// A named semantic rule.
#[derive(Clone, Copy)]
pub struct SemanticPattern {
    /// Name used in results.
    pub name: &'static str,
    rule: SemanticRule,
}

impl SemanticPattern {
    /// Creates a pattern.
    pub const fn new(name: &'static str, rule: SemanticRule) -> Self {
        Self { name, rule }
    }

    /// Evaluates the rule for directive `ix`.
    ///
    /// # Errors
    ///
    /// Propagates rule failures.
    pub fn find(&self, ctx: &mut MatchContext<'_, '_>, ix: NodeIx) -> Result<Option<SemanticMatch>, MatchError> {
        (self.rule)(ctx, ix)
    }
}

impl fmt::Debug for SemanticPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticPattern")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// An `#else` was removed and re-added elsewhere in the same scope, so code
/// changed branch without being edited.
///
/// Anchored on the added ELSE. Matches when its after-parent holds a removed
/// ELSE on the before side and some child moved between one of the two ELSE
/// branches and an `#if`/`#elif` branch of that scope.
pub const MOVE_ELSE: SemanticPattern = SemanticPattern::new("MoveElse", |ctx, ix| {
    let tree = ctx.tree();
    let added = tree.node(ix);
    if added.code_type != CodeType::Else || added.diff_type != DiffType::Add {
        return Ok(None);
    }
    let Some(scope) = added.parent(Side::After) else {
        return Ok(None);
    };
    let Some(removed) = tree.node(scope).children(Side::Before).iter().copied().find(|&c| {
        let n = tree.node(c);
        n.code_type == CodeType::Else && n.diff_type == DiffType::Rem
    }) else {
        return Ok(None);
    };

    let mut branches: Vec<NodeIx> = Vec::new();
    for side in Side::ALL {
        for &c in tree.node(scope).children(side) {
            if tree.node(c).code_type.has_guard() && !branches.contains(&c) {
                branches.push(c);
            }
        }
    }
    let in_branch = |p: Option<NodeIx>| p.is_some_and(|p| branches.contains(&p));
    let moved_into_added = tree
        .node(ix)
        .children(Side::After)
        .iter()
        .any(|&c| in_branch(tree.node(c).parent(Side::Before)));
    let moved_out_of_removed = tree
        .node(removed)
        .children(Side::Before)
        .iter()
        .any(|&c| in_branch(tree.node(c).parent(Side::After)));
    if !moved_into_added && !moved_out_of_removed {
        return Ok(None);
    }

    let from = added.lines.from.min(tree.node(removed).lines.from);
    let to = added.lines.to.max(tree.node(removed).lines.to);
    Ok(Some(SemanticMatch {
        pattern: "MoveElse",
        node_id: added.id,
        lines: LineRange { from, to },
    }))
});

/// Semantic patterns evaluated on every directive of a tree.
#[derive(Debug, Clone, Default)]
pub struct SemanticCatalog {
    patterns: Vec<SemanticPattern>,
}

impl SemanticCatalog {
    /// Builds a catalog from `patterns`.
    pub fn new(patterns: Vec<SemanticPattern>) -> Self {
        Self { patterns }
    }

    /// The catalog holding [`MOVE_ELSE`].
    pub fn standard() -> Self {
        Self::new(vec![MOVE_ELSE])
    }

    /// Patterns of this catalog.
    pub fn patterns(&self) -> &[SemanticPattern] {
        &self.patterns
    }

    /// Every match of every pattern in `tree`, in arena order.
    ///
    /// # Errors
    ///
    /// Stops at the first rule that cannot be evaluated.
    pub fn find_all(&self, tree: &DiffTree, oracle: &dyn SatOracle) -> Result<Vec<SemanticMatch>, MatchError> {
        let mut ctx = MatchContext::new(tree, oracle);
        let mut found = Vec::new();
        for (ix, node) in tree.iter() {
            if node.code_type == CodeType::Code || node.code_type == CodeType::Root {
                continue;
            }
            for pattern in &self.patterns {
                if let Some(m) = pattern.find(&mut ctx, ix)? {
                    found.push(m);
                }
            }
        }
        Ok(found)
    }
}
