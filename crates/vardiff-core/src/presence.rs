//! Presence conditions: when is a node compiled, before and after the edit?
//!
//! The presence condition of a node on one side is the conjunction of the
//! feature mappings of the node and of all its ancestors on that side:
//!
//! | node kind | feature mapping |
//! |-----------|-----------------|
//! | IF        | its guard |
//! | ELIF      | its guard and the negation of every earlier branch of the same conditional |
//! | ELSE      | the negation of every earlier branch |
//! | ROOT, CODE, ENDIF | `true` |
//!
//! "Earlier branches" are read from the same side as the query, so a branch
//! that only exists after the edit never constrains the before-side condition.
//!
//! [`PresenceConditions`] caches results per `(node, side)` for the lifetime
//! of one analysis pass over an immutable tree.

use std::collections::HashMap;
use std::fmt;

use crate::enums::{CodeType, Side};
use crate::formula::Formula;
use crate::tree::{DiffTree, NodeIx};

/// A presence condition could not be derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceError {
    /// The node does not exist on the requested side.
    AbsentOnSide {
        /// Node id.
        id: usize,
        /// Requested side.
        side: Side,
    },
    /// An IF or ELIF node carries no guard formula.
    MissingCondition {
        /// Node id.
        id: usize,
    },
    /// The parent chain does not end; the tree is inconsistent.
    Cycle {
        /// Node id the walk started from.
        id: usize,
        /// Side of the walk.
        side: Side,
    },
}

impl fmt::Display for PresenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbsentOnSide { id, side } => {
                write!(f, "node {id} does not exist {side} the edit")
            }
            Self::MissingCondition { id } => write!(f, "conditional node {id} has no guard"),
            Self::Cycle { id, side } => write!(f, "{side} ancestors of node {id} form a cycle"),
        }
    }
}

impl std::error::Error for PresenceError {}

/// Memoizing presence-condition calculator for one tree.
#[derive(Debug)]
pub struct PresenceConditions<'t> {
    tree: &'t DiffTree,
    cache: HashMap<(NodeIx, Side), Formula>,
}

impl<'t> PresenceConditions<'t> {
    /// Creates an empty cache over `tree`.
    pub fn new(tree: &'t DiffTree) -> Self {
        Self {
            tree,
            cache: HashMap::new(),
        }
    }

    /// The tree being analyzed.
    pub fn tree(&self) -> &'t DiffTree {
        self.tree
    }

    /// The formula `ix` itself contributes on `side`.
    ///
    /// # Errors
    ///
    /// Fails if the node is absent on `side` or a guard is missing.
    pub fn feature_mapping(&self, ix: NodeIx, side: Side) -> Result<Formula, PresenceError> {
        let node = self.tree.node(ix);
        if !node.exists_on(side) {
            return Err(PresenceError::AbsentOnSide { id: node.id, side });
        }
        match node.code_type {
            CodeType::Root | CodeType::Code | CodeType::Endif => Ok(Formula::True),
            CodeType::If => self.guard(ix),
            CodeType::Elif => {
                let mut operands = vec![self.guard(ix)?];
                for earlier in self.earlier_branches(ix, side) {
                    operands.push(Formula::not(self.guard(earlier)?));
                }
                Ok(Formula::and(operands))
            }
            CodeType::Else => {
                let mut operands = Vec::new();
                for earlier in self.earlier_branches(ix, side) {
                    operands.push(Formula::not(self.guard(earlier)?));
                }
                Ok(Formula::and(operands))
            }
        }
    }

    /// The presence condition of `ix` on `side`.
    ///
    /// Walks the parent chain iteratively up to the nearest cached ancestor,
    /// then fills the cache top-down.
    ///
    /// # Errors
    ///
    /// Fails if the node is absent on `side`, a guard on the chain is missing,
    /// or the chain is cyclic.
    pub fn presence_condition(&mut self, ix: NodeIx, side: Side) -> Result<Formula, PresenceError> {
        if let Some(pc) = self.cache.get(&(ix, side)) {
            return Ok(pc.clone());
        }
        let start_id = self.tree.node(ix).id;

        let mut chain = vec![ix];
        let mut inherited = Formula::True;
        let mut current = self.tree.node(ix).parent(side);
        while let Some(p) = current {
            if let Some(pc) = self.cache.get(&(p, side)) {
                inherited = pc.clone();
                break;
            }
            if chain.len() > self.tree.len() {
                return Err(PresenceError::Cycle { id: start_id, side });
            }
            chain.push(p);
            current = self.tree.node(p).parent(side);
        }

        for &node in chain.iter().rev() {
            let pc = Formula::and([self.feature_mapping(node, side)?, inherited]);
            self.cache.insert((node, side), pc.clone());
            inherited = pc;
        }
        Ok(inherited)
    }

    fn guard(&self, ix: NodeIx) -> Result<Formula, PresenceError> {
        let node = self.tree.node(ix);
        node.condition
            .clone()
            .ok_or(PresenceError::MissingCondition { id: node.id })
    }

    /// IF and ELIF siblings preceding branch `ix` in its conditional on
    /// `side`, nearest first.
    fn earlier_branches(&self, ix: NodeIx, side: Side) -> Vec<NodeIx> {
        let Some(parent) = self.tree.node(ix).parent(side) else {
            return Vec::new();
        };
        let siblings = self.tree.node(parent).children(side);
        let Some(pos) = siblings.iter().position(|&s| s == ix) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for &sibling in siblings[..pos].iter().rev() {
            match self.tree.node(sibling).code_type {
                CodeType::Elif => out.push(sibling),
                CodeType::If => {
                    out.push(sibling);
                    break;
                }
                CodeType::Root | CodeType::Else | CodeType::Endif | CodeType::Code => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::test_helpers::{code, tree, v};

    #[test]
    fn top_level_code_is_always_present() {
        let t = tree(" x\n");
        let mut pcs = PresenceConditions::new(&t);
        let x = code(&t, "x");
        assert_eq!(pcs.presence_condition(x, Side::Before), Ok(Formula::True));
        assert_eq!(pcs.presence_condition(x, Side::After), Ok(Formula::True));
    }

    #[test]
    fn nested_guards_conjoin() {
        let t = tree(" #if A\n #if B\n x\n #endif\n #endif\n");
        let mut pcs = PresenceConditions::new(&t);
        let x = code(&t, "x");
        assert_eq!(
            pcs.presence_condition(x, Side::After),
            Ok(Formula::and([v("B"), v("A")]))
        );
    }

    #[test]
    fn else_negates_all_earlier_branches() {
        let t = tree(" #if A\n #elif B\n #else\n x\n #endif\n");
        let mut pcs = PresenceConditions::new(&t);
        let x = code(&t, "x");
        assert_eq!(
            pcs.presence_condition(x, Side::Before),
            Ok(Formula::and([Formula::not(v("B")), Formula::not(v("A"))]))
        );
    }

    #[test]
    fn absent_side_is_an_error() {
        let t = tree("+x\n");
        let mut pcs = PresenceConditions::new(&t);
        let x = code(&t, "x");
        assert_eq!(
            pcs.presence_condition(x, Side::Before),
            Err(PresenceError::AbsentOnSide {
                id: 1,
                side: Side::Before
            })
        );
    }

    #[test]
    fn earlier_branches_are_read_per_side() {
        let t = tree(" #if A\n-#elif B\n+#elif C\n x\n #endif\n");
        let mut pcs = PresenceConditions::new(&t);
        let x = code(&t, "x");
        assert_eq!(
            pcs.presence_condition(x, Side::Before),
            Ok(Formula::and([v("B"), Formula::not(v("A"))]))
        );
        assert_eq!(
            pcs.presence_condition(x, Side::After),
            Ok(Formula::and([v("C"), Formula::not(v("A"))]))
        );
    }

    #[test]
    fn repeated_queries_hit_the_cache() {
        let t = tree(" #if A\n x\n y\n #endif\n");
        let mut pcs = PresenceConditions::new(&t);
        let x = code(&t, "x");
        let y = code(&t, "y");
        let first = pcs.presence_condition(x, Side::Before).expect("pc");
        assert_eq!(pcs.cache.len(), 3);
        assert_eq!(pcs.presence_condition(y, Side::Before), Ok(first.clone()));
        assert_eq!(pcs.cache.len(), 4);
        assert_eq!(pcs.presence_condition(x, Side::Before), Ok(first));
    }
}
