//! Tree filters with per-invocation explanation counters.
//!
//! A [`TreeFilter`] is an ordered list of [`TreeCriterion`]s. A tree passes
//! when every criterion accepts it; otherwise the first rejecting criterion is
//! charged in the caller's [`FilterExplanations`]. Filters hold no mutable
//! state and can be shared freely between workers.
//!
//! Criteria read the tree through a [`MatchContext`], so presence conditions
//! and relations computed while filtering are reused when the same context
//! classifies the tree afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pattern::{ADD_TO_PC, Catalog, MatchContext, REM_FROM_PC, UNTOUCHED};

/// Prefix of explanation keys in result snapshots.
pub const EXPLANATION_PREFIX: &str = "filtered because not";

/// A named predicate over one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TreeCriterion {
    /// The tree has a node besides ROOT.
    NotEmpty,
    /// The tree has more than one CODE node.
    MoreThanOneArtifact,
    /// The tree passes [`crate::tree::DiffTree::check_consistency`].
    Consistent,
    /// Some CODE node matches a pattern other than the three that leave
    /// variability alone (`AddToPC`, `RemFromPC`, `Untouched`).
    HasEditsToVariability,
}

impl TreeCriterion {
    /// All criteria.
    pub const ALL: [TreeCriterion; 4] = [
        TreeCriterion::NotEmpty,
        TreeCriterion::MoreThanOneArtifact,
        TreeCriterion::Consistent,
        TreeCriterion::HasEditsToVariability,
    ];

    /// Human-readable name; also the explanation key suffix.
    pub fn name(self) -> &'static str {
        match self {
            TreeCriterion::NotEmpty => "is not empty",
            TreeCriterion::MoreThanOneArtifact => "has more than one elementary pattern",
            TreeCriterion::Consistent => "is consistent",
            TreeCriterion::HasEditsToVariability => "has edits to variability",
        }
    }

    /// Short token used on the command line.
    pub fn token(self) -> &'static str {
        match self {
            TreeCriterion::NotEmpty => "not-empty",
            TreeCriterion::MoreThanOneArtifact => "more-than-one-artifact",
            TreeCriterion::Consistent => "consistent",
            TreeCriterion::HasEditsToVariability => "edits-to-variability",
        }
    }

    /// Parses a [`TreeCriterion::token`].
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.token() == token)
    }

    /// Evaluates the criterion on the context's tree. Classification
    /// failures count as "no edit to variability".
    pub fn accepts(self, ctx: &mut MatchContext<'_, '_>) -> bool {
        let tree = ctx.tree();
        match self {
            TreeCriterion::NotEmpty => !tree.is_empty(),
            TreeCriterion::MoreThanOneArtifact => tree.code_nodes().nth(1).is_some(),
            TreeCriterion::Consistent => tree.check_consistency().is_ok(),
            TreeCriterion::HasEditsToVariability => has_edits_to_variability(ctx),
        }
    }

    /// Key under which rejections are reported.
    pub fn explanation_key(self) -> String {
        format!("{EXPLANATION_PREFIX} ({})", self.name())
    }
}

fn has_edits_to_variability(ctx: &mut MatchContext<'_, '_>) -> bool {
    let catalog = Catalog::elementary();
    let neutral = [ADD_TO_PC.name, REM_FROM_PC.name, UNTOUCHED.name];
    ctx.tree().code_nodes().any(|ix| {
        catalog
            .classify(ctx, ix)
            .is_ok_and(|m| !neutral.contains(&m.pattern))
    })
}

/// How often each criterion rejected a tree, keyed by explanation key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterExplanations {
    counts: BTreeMap<String, u64>,
}

impl FilterExplanations {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Charges one rejection to `criterion`.
    pub fn record(&mut self, criterion: TreeCriterion) {
        *self.counts.entry(criterion.explanation_key()).or_insert(0) += 1;
    }

    /// Adds all counts of `other`.
    pub fn merge(&mut self, other: &FilterExplanations) {
        for (key, count) in &other.counts {
            *self.counts.entry(key.clone()).or_insert(0) += count;
        }
    }

    /// Counts by explanation key.
    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    /// Consumes the accumulator.
    pub fn into_counts(self) -> BTreeMap<String, u64> {
        self.counts
    }

    /// Total number of rejections.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Conjunction of criteria, evaluated in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeFilter {
    criteria: Vec<TreeCriterion>,
}

impl TreeFilter {
    /// A filter that accepts everything.
    pub fn any() -> Self {
        Self {
            criteria: Vec::new(),
        }
    }

    /// A filter requiring all `criteria` in order.
    pub fn new(criteria: Vec<TreeCriterion>) -> Self {
        Self { criteria }
    }

    /// The criteria in evaluation order.
    pub fn criteria(&self) -> &[TreeCriterion] {
        &self.criteria
    }

    /// Returns `true` if every criterion accepts the context's tree;
    /// otherwise records the first rejecting criterion in `explanations`.
    pub fn test(&self, ctx: &mut MatchContext<'_, '_>, explanations: &mut FilterExplanations) -> bool {
        for &criterion in &self.criteria {
            if !criterion.accepts(ctx) {
                explanations.record(criterion);
                return false;
            }
        }
        true
    }
}

/// Rejects empty and inconsistent trees.
impl Default for TreeFilter {
    fn default() -> Self {
        Self::new(vec![TreeCriterion::NotEmpty, TreeCriterion::Consistent])
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::oracle::TruthTableOracle;
    use crate::test_helpers::tree;

    fn passes(filter: &TreeFilter, text: &str, explanations: &mut FilterExplanations) -> bool {
        let tree = tree(text);
        let oracle = TruthTableOracle::default();
        filter.test(&mut MatchContext::new(&tree, &oracle), explanations)
    }

    fn accepts(criterion: TreeCriterion, text: &str) -> bool {
        let tree = tree(text);
        let oracle = TruthTableOracle::default();
        criterion.accepts(&mut MatchContext::new(&tree, &oracle))
    }

    #[test]
    fn any_accepts_empty_tree() {
        let mut explanations = FilterExplanations::new();
        assert!(passes(&TreeFilter::any(), "", &mut explanations));
        assert_eq!(explanations.total(), 0);
    }

    #[test]
    fn first_rejecting_criterion_is_charged() {
        let filter = TreeFilter::new(vec![
            TreeCriterion::NotEmpty,
            TreeCriterion::MoreThanOneArtifact,
        ]);
        let mut explanations = FilterExplanations::new();
        assert!(!passes(&filter, "", &mut explanations));
        assert!(!passes(&filter, "+x\n", &mut explanations));
        assert!(!passes(&filter, "+x\n", &mut explanations));
        assert!(passes(&filter, "+x\n+y\n", &mut explanations));
        let counts = explanations.counts();
        assert_eq!(counts.get("filtered because not (is not empty)"), Some(&1));
        assert_eq!(
            counts.get("filtered because not (has more than one elementary pattern)"),
            Some(&2)
        );
    }

    #[test]
    fn edits_to_variability() {
        let c = TreeCriterion::HasEditsToVariability;
        assert!(!accepts(c, " #if A\n+x\n-y\n z\n #endif\n"));
        assert!(accepts(c, "+#if A\n+x\n+#endif\n"));
        assert!(accepts(c, "+#if A\n x\n+#endif\n"));
    }

    #[test]
    fn explanations_merge_by_key() {
        let mut a = FilterExplanations::new();
        a.record(TreeCriterion::Consistent);
        let mut b = FilterExplanations::new();
        b.record(TreeCriterion::Consistent);
        b.record(TreeCriterion::NotEmpty);
        a.merge(&b);
        assert_eq!(a.total(), 3);
        assert_eq!(a.counts().len(), 2);
    }

    #[test]
    fn criterion_tokens_round_trip() {
        for c in TreeCriterion::ALL {
            assert_eq!(TreeCriterion::from_token(c.token()), Some(c));
        }
    }
}
