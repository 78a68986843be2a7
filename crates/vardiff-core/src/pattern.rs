//! Elementary edit patterns and the ordered catalog that classifies CODE nodes.
//!
//! A pattern is plain data: a name, the diff type it applies to, a stateless
//! rule function, and which presence conditions make up its feature context.
//! [`Catalog::classify`] returns the first pattern in catalog order whose rule
//! accepts the node. The elementary catalog is total: every CODE node matches
//! exactly one of its patterns.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::enums::{CodeType, DiffType, Side};
use crate::formula::Formula;
use crate::oracle::{OracleError, SatOracle};
use crate::presence::{PresenceConditions, PresenceError};
use crate::tree::{DiffTree, NodeIx};

pub mod semantic;

pub use semantic::{MOVE_ELSE, SemanticCatalog, SemanticMatch, SemanticPattern, SemanticRule};

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// MatchError
// ---------------------------------------------------------------------------

/// Classification of a node failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// Only CODE nodes are classified.
    NotAnArtifact {
        /// Node id.
        id: usize,
    },
    /// No pattern in the catalog accepted the node.
    NoMatch {
        /// Node id.
        id: usize,
    },
    /// A presence condition could not be derived.
    Presence(PresenceError),
    /// The oracle could not answer.
    Oracle(OracleError),
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnArtifact { id } => write!(f, "node {id} is not a code node"),
            Self::NoMatch { id } => write!(f, "no edit pattern matches node {id}"),
            Self::Presence(err) => write!(f, "presence condition: {err}"),
            Self::Oracle(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for MatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Presence(err) => Some(err),
            Self::Oracle(err) => Some(err),
            Self::NotAnArtifact { .. } | Self::NoMatch { .. } => None,
        }
    }
}

impl From<PresenceError> for MatchError {
    fn from(err: PresenceError) -> Self {
        Self::Presence(err)
    }
}

impl From<OracleError> for MatchError {
    fn from(err: OracleError) -> Self {
        Self::Oracle(err)
    }
}

// ---------------------------------------------------------------------------
// MatchContext
// ---------------------------------------------------------------------------

/// Everything a rule may look at: the tree, its presence conditions, and the
/// oracle. Scoped to one tree; discarded afterwards.
pub struct MatchContext<'t, 'o> {
    presence: PresenceConditions<'t>,
    oracle: &'o dyn SatOracle,
    relations: HashMap<NodeIx, Relation>,
}

/// How the before and after presence conditions of an unchanged node relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// after ⇒ before.
    pub after_implies_before: bool,
    /// before ⇒ after.
    pub before_implies_after: bool,
}

impl<'t, 'o> MatchContext<'t, 'o> {
    /// Creates a context for `tree`.
    pub fn new(tree: &'t DiffTree, oracle: &'o dyn SatOracle) -> Self {
        Self {
            presence: PresenceConditions::new(tree),
            oracle,
            relations: HashMap::new(),
        }
    }

    /// The tree under classification.
    pub fn tree(&self) -> &'t DiffTree {
        self.presence.tree()
    }

    /// Presence condition of `ix` on `side`.
    ///
    /// # Errors
    ///
    /// See [`PresenceConditions::presence_condition`].
    pub fn pc(&mut self, ix: NodeIx, side: Side) -> Result<Formula, PresenceError> {
        self.presence.presence_condition(ix, side)
    }

    /// Implication in both directions between the before and after presence
    /// conditions of `ix`, memoized per node.
    ///
    /// # Errors
    ///
    /// Fails if either condition cannot be derived or the oracle gives up.
    pub fn relation(&mut self, ix: NodeIx) -> Result<Relation, MatchError> {
        if let Some(rel) = self.relations.get(&ix) {
            return Ok(*rel);
        }
        let before = self.pc(ix, Side::Before)?;
        let after = self.pc(ix, Side::After)?;
        let rel = Relation {
            after_implies_before: self.oracle.implies(&after, &before)?,
            before_implies_after: self.oracle.implies(&before, &after)?,
        };
        self.relations.insert(ix, rel);
        Ok(rel)
    }

    fn parent_diff_type(&self, ix: NodeIx, side: Side) -> Option<DiffType> {
        let tree = self.tree();
        tree.node(ix).parent(side).map(|p| tree.node(p).diff_type)
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// A pattern rule. Rules are only invoked for CODE nodes of the pattern's
/// diff type.
pub type MatchRule = fn(&mut MatchContext<'_, '_>, NodeIx) -> Result<bool, MatchError>;

/// Which presence conditions describe the features a pattern affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureScope {
    /// No feature context.
    None,
    /// The before presence condition.
    Before,
    /// The after presence condition.
    After,
    /// Both presence conditions.
    Both,
}

/// A named, stateless classifier.
#[derive(Clone, Copy)]
pub struct EditPattern {
    /// Name used in results and line-graph output.
    pub name: &'static str,
    /// Diff type of the CODE nodes this pattern applies to.
    pub diff_type: DiffType,
    /// Feature context reported on a match.
    pub scope: FeatureScope,
    rule: MatchRule,
}

impl EditPattern {
    /// Creates a pattern.
    pub const fn new(name: &'static str, diff_type: DiffType, scope: FeatureScope, rule: MatchRule) -> Self {
        Self {
            name,
            diff_type,
            scope,
            rule,
        }
    }

    /// Evaluates the rule for `ix`.
    ///
    /// # Errors
    ///
    /// Propagates rule failures.
    pub fn matches(&self, ctx: &mut MatchContext<'_, '_>, ix: NodeIx) -> Result<bool, MatchError> {
        if ctx.tree().node(ix).diff_type != self.diff_type {
            return Ok(false);
        }
        (self.rule)(ctx, ix)
    }
}

impl fmt::Debug for EditPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditPattern")
            .field("name", &self.name)
            .field("diff_type", &self.diff_type)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Code added under a scope that already existed.
pub const ADD_TO_PC: EditPattern =
    EditPattern::new("AddToPC", DiffType::Add, FeatureScope::After, |ctx, ix| {
        Ok(ctx.parent_diff_type(ix, Side::After) != Some(DiffType::Add))
    });

/// Code added together with its enclosing directive.
pub const ADD_WITH_MAPPING: EditPattern =
    EditPattern::new("AddWithMapping", DiffType::Add, FeatureScope::After, |ctx, ix| {
        Ok(ctx.parent_diff_type(ix, Side::After) == Some(DiffType::Add))
    });

/// Code removed from a scope that remains.
pub const REM_FROM_PC: EditPattern =
    EditPattern::new("RemFromPC", DiffType::Rem, FeatureScope::Before, |ctx, ix| {
        Ok(ctx.parent_diff_type(ix, Side::Before) != Some(DiffType::Rem))
    });

/// Code removed together with its enclosing directive.
pub const REM_WITH_MAPPING: EditPattern =
    EditPattern::new("RemWithMapping", DiffType::Rem, FeatureScope::Before, |ctx, ix| {
        Ok(ctx.parent_diff_type(ix, Side::Before) == Some(DiffType::Rem))
    });

/// Unchanged code whose presence condition became strictly stronger.
pub const SPECIALIZATION: EditPattern =
    EditPattern::new("Specialization", DiffType::Non, FeatureScope::Both, |ctx, ix| {
        let rel = ctx.relation(ix)?;
        Ok(rel.after_implies_before && !rel.before_implies_after)
    });

/// Unchanged code whose presence condition became strictly weaker.
pub const GENERALIZATION: EditPattern =
    EditPattern::new("Generalization", DiffType::Non, FeatureScope::Both, |ctx, ix| {
        let rel = ctx.relation(ix)?;
        Ok(rel.before_implies_after && !rel.after_implies_before)
    });

/// Unchanged code whose presence conditions are incomparable.
pub const RECONFIGURATION: EditPattern =
    EditPattern::new("Reconfiguration", DiffType::Non, FeatureScope::Both, |ctx, ix| {
        let rel = ctx.relation(ix)?;
        Ok(!rel.before_implies_after && !rel.after_implies_before)
    });

/// Unchanged code moved to a different but equivalent scope.
pub const REFACTORING: EditPattern =
    EditPattern::new("Refactoring", DiffType::Non, FeatureScope::Both, |ctx, ix| {
        let rel = ctx.relation(ix)?;
        Ok(rel.before_implies_after
            && rel.after_implies_before
            && !ctx.tree().before_path_equals_after_path(ix))
    });

/// Unchanged code in an unchanged scope. Catch-all for unchanged nodes.
pub const UNTOUCHED: EditPattern =
    EditPattern::new("Untouched", DiffType::Non, FeatureScope::None, |_, _| Ok(true));

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Feature literals implicated by a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureContext {
    /// Before presence condition, if in scope.
    pub before: Option<Formula>,
    /// After presence condition, if in scope.
    pub after: Option<Formula>,
    /// Literals of the in-scope conditions.
    pub literals: BTreeSet<String>,
}

/// Result of classifying one CODE node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    /// Matched pattern name.
    pub pattern: &'static str,
    /// Persisted id of the node.
    pub node_id: usize,
    /// Present unless the pattern's scope is [`FeatureScope::None`].
    pub features: Option<FeatureContext>,
}

/// An ordered list of patterns; earlier patterns take priority.
#[derive(Debug, Clone)]
pub struct Catalog {
    patterns: Vec<EditPattern>,
}

impl Catalog {
    /// Builds a catalog from patterns in priority order.
    pub fn new(patterns: Vec<EditPattern>) -> Self {
        Self { patterns }
    }

    /// The nine elementary patterns, ending in the catch-all [`UNTOUCHED`].
    pub fn elementary() -> Self {
        Self::new(vec![
            ADD_TO_PC,
            ADD_WITH_MAPPING,
            REM_FROM_PC,
            REM_WITH_MAPPING,
            SPECIALIZATION,
            GENERALIZATION,
            RECONFIGURATION,
            REFACTORING,
            UNTOUCHED,
        ])
    }

    /// Patterns in priority order.
    pub fn patterns(&self) -> &[EditPattern] {
        &self.patterns
    }

    /// Looks a pattern up by name.
    pub fn get(&self, name: &str) -> Option<&EditPattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    /// Returns the first pattern accepting CODE node `ix`.
    ///
    /// # Errors
    ///
    /// Fails for non-CODE nodes, when no pattern matches, or when a rule
    /// cannot be evaluated.
    pub fn classify(&self, ctx: &mut MatchContext<'_, '_>, ix: NodeIx) -> Result<PatternMatch, MatchError> {
        let node = ctx.tree().node(ix);
        let id = node.id;
        if node.code_type != CodeType::Code {
            return Err(MatchError::NotAnArtifact { id });
        }
        for pattern in &self.patterns {
            if pattern.matches(ctx, ix)? {
                return Ok(PatternMatch {
                    pattern: pattern.name,
                    node_id: id,
                    features: feature_context(ctx, ix, pattern.scope)?,
                });
            }
        }
        Err(MatchError::NoMatch { id })
    }

    /// Classifies every CODE node of `tree` in arena order.
    ///
    /// # Errors
    ///
    /// Stops at the first node that cannot be classified.
    pub fn classify_tree(&self, tree: &DiffTree, oracle: &dyn SatOracle) -> Result<Vec<PatternMatch>, MatchError> {
        self.classify_all(&mut MatchContext::new(tree, oracle))
    }

    /// Like [`Catalog::classify_tree`], reusing whatever `ctx` has already
    /// computed for its tree.
    ///
    /// # Errors
    ///
    /// Stops at the first artifact that cannot be classified.
    pub fn classify_all(&self, ctx: &mut MatchContext<'_, '_>) -> Result<Vec<PatternMatch>, MatchError> {
        let tree = ctx.tree();
        tree.code_nodes().map(|ix| self.classify(ctx, ix)).collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::elementary()
    }
}

fn feature_context(
    ctx: &mut MatchContext<'_, '_>,
    ix: NodeIx,
    scope: FeatureScope,
) -> Result<Option<FeatureContext>, MatchError> {
    let (before, after) = match scope {
        FeatureScope::None => return Ok(None),
        FeatureScope::Before => (Some(ctx.pc(ix, Side::Before)?), None),
        FeatureScope::After => (None, Some(ctx.pc(ix, Side::After)?)),
        FeatureScope::Both => (
            Some(ctx.pc(ix, Side::Before)?),
            Some(ctx.pc(ix, Side::After)?),
        ),
    };
    let literals = before
        .iter()
        .chain(after.iter())
        .flat_map(|f| f.variables())
        .map(str::to_owned)
        .collect();
    Ok(Some(FeatureContext {
        before,
        after,
        literals,
    }))
}
