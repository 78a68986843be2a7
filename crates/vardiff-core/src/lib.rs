#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod commit;
pub mod condition;
pub mod enums;
pub mod filter;
pub mod formula;
pub mod linegraph;
pub mod oracle;
pub mod parse;
pub mod pattern;
pub mod pipeline;
pub mod presence;
pub mod result;
pub mod transform;
pub mod tree;

#[cfg(test)]
mod test_helpers;

pub use commit::{
    C_FAMILY_EXTENSIONS, CommitDiff, CommitInfo, DiffFilter, FileDiff, PatchDiff,
    PathPatternError, split_unified_diff,
};
pub use condition::{ConditionError, Directive, Guard, is_directive, parse_condition, parse_directive};
pub use enums::{ChangeType, CodeType, DiffType, GraphFormat, Side};
pub use filter::{FilterExplanations, TreeCriterion, TreeFilter};
pub use formula::Formula;
pub use linegraph::{
    CommitDiffTreeFormat, DecodeError, LabeledNodeFormat, LineGraphOptions, NodeLabelFormat,
    TreeLabelFormat, TypeOnlyNodeFormat, export_tree, export_trees, import, write_tree,
};
pub use oracle::{DEFAULT_MAX_VARIABLES, OracleError, SatOracle, TruthTableOracle};
pub use parse::{ParseError, parse_hunk_header, parse_patch};
pub use pattern::{
    Catalog, EditPattern, FeatureContext, FeatureScope, MatchContext, MatchError, MatchRule,
    PatternMatch, Relation, SemanticCatalog, SemanticMatch, SemanticPattern,
};
pub use pipeline::{
    Batch, CommitOutcome, CommitSource, DEFAULT_BATCH_SIZE, MiningConfig, MiningError,
    MiningOutcome, OutputSink, SinkError, SourceError, UnitState, WorkerError, WorkerFailure,
    mine, partition_batches, process_batch, process_commit,
};
pub use presence::{PresenceConditions, PresenceError};
pub use result::{CommitTime, MiningResult, PatternCount, SnapshotError};
pub use transform::{Transform, apply_all};
pub use tree::{
    Ancestors, ConsistencyError, DiffNode, DiffTree, DiffTreeSource, HunkRange, LineRange, NodeIx,
};
