//! Batch mining over a commit history.
//!
//! Commits are listed once, filtered, and partitioned into ordered batches.
//! Each batch runs on one worker of a rayon pool and owns everything it
//! builds; workers hand back a partial [`MiningResult`] over a channel and the
//! orchestrator thread folds it into the total. Batches are dispatched in
//! order but may complete in any order.
//!
//! Per-patch and per-commit failures are recorded in the result. A worker
//! failure (sink error or panic) raises a cancellation flag: batches not yet
//! started are skipped, running ones finish, and the run returns the partial
//! total together with the failures. The total snapshot is only written for
//! complete runs.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::commit::{CommitDiff, CommitInfo, DiffFilter, FileDiff, PatchDiff};
use crate::enums::{CodeType, GraphFormat};
use crate::filter::{FilterExplanations, TreeFilter};
use crate::linegraph::{LineGraphOptions, write_tree};
use crate::oracle::{DEFAULT_MAX_VARIABLES, OracleError, SatOracle, TruthTableOracle};
use crate::pattern::{Catalog, MatchContext, MatchError};
use crate::result::MiningResult;
use crate::transform::{Transform, apply_all};
use crate::tree::DiffTree;


/// Default number of commits per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Diagnostics key for trees that could not be classified.
pub const CLASSIFICATION_ERROR_KIND: &str = "classification";

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Failure of a [`CommitSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    /// What went wrong.
    pub message: String,
}

impl SourceError {
    /// Creates an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SourceError {}

/// Failure of an [`OutputSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    /// What was being written.
    pub target: String,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot write {}: {}", self.target, self.message)
    }
}

impl std::error::Error for SinkError {}

/// Provides the commits of a history and their diffs.
pub trait CommitSource: Sync {
    /// Lists all commits to consider, in history order.
    ///
    /// # Errors
    ///
    /// Fails when the history cannot be read; the run does not start.
    fn commits(&self) -> Result<Vec<CommitInfo>, SourceError>;

    /// Returns the per-file diffs of one commit.
    ///
    /// # Errors
    ///
    /// Fails when the diff cannot be obtained; the commit is skipped.
    fn diff(&self, commit: &CommitInfo) -> Result<Vec<FileDiff>, SourceError>;
}

/// Receives batch exports and the final snapshot.
pub trait OutputSink: Sync {
    /// Stores the line graph and metadata of one batch.
    ///
    /// # Errors
    ///
    /// A failure here aborts the remaining run.
    fn write_batch(&self, batch_id: &str, line_graph: &str, result: &MiningResult) -> Result<(), SinkError>;

    /// Stores the total result of a complete run.
    ///
    /// # Errors
    ///
    /// Returned to the caller as [`MiningError::Sink`].
    fn write_total(&self, result: &MiningResult) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unrecoverable failure of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The sink rejected the batch output.
    Sink(SinkError),
    /// The worker panicked.
    Panicked(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sink(e) => write!(f, "{e}"),
            Self::Panicked(message) => write!(f, "worker panicked: {message}"),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sink(e) => Some(e),
            Self::Panicked(_) => None,
        }
    }
}

/// A batch that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    /// Id of the failed batch.
    pub batch_id: String,
    /// Why it failed.
    pub error: WorkerError,
}

/// Why a run could not start or finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningError {
    /// Listing commits failed.
    ListCommits(SourceError),
    /// The configuration is unusable.
    InvalidConfig(String),
    /// The worker pool could not be created.
    ThreadPool(String),
    /// Writing the total result failed.
    Sink(SinkError),
}

impl fmt::Display for MiningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListCommits(e) => write!(f, "cannot list commits: {e}"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::ThreadPool(msg) => write!(f, "cannot start worker pool: {msg}"),
            Self::Sink(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MiningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ListCommits(e) => Some(e),
            Self::Sink(e) => Some(e),
            Self::InvalidConfig(_) | Self::ThreadPool(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings of one mining run.
#[derive(Debug, Clone)]
pub struct MiningConfig {
    /// Name of the mined repository, used in logs.
    pub repository: String,
    /// Commits per batch.
    pub batch_size: usize,
    /// Worker threads; `None` uses the available parallelism.
    pub threads: Option<usize>,
    /// Commit and file selection.
    pub diff_filter: DiffFilter,
    /// Trees to export.
    pub tree_filter: TreeFilter,
    /// Rewrites applied to each tree before filtering.
    pub transforms: Vec<Transform>,
    /// Export format.
    pub line_graph: LineGraphOptions,
    /// Patterns to classify with.
    pub catalog: Catalog,
    /// Bound on distinct literals per oracle query. Patches needing more
    /// are logged and counted as classification failures.
    pub max_variables: usize,
}

impl MiningConfig {
    /// The truth-table oracle bounded by [`MiningConfig::max_variables`].
    pub fn reference_oracle(&self) -> TruthTableOracle {
        TruthTableOracle {
            max_variables: self.max_variables,
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            threads: None,
            diff_filter: DiffFilter::default(),
            tree_filter: TreeFilter::default(),
            transforms: Vec::new(),
            line_graph: LineGraphOptions::default(),
            catalog: Catalog::elementary(),
            max_variables: DEFAULT_MAX_VARIABLES,
        }
    }
}

// ---------------------------------------------------------------------------
// Batches and units
// ---------------------------------------------------------------------------

/// Consecutive commits processed by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Position in the history.
    pub index: usize,
    /// Stable id: the first commit's id.
    pub id: String,
    /// Commits in history order.
    pub commits: Vec<CommitInfo>,
}

/// Splits `commits` into batches of `size`, preserving order.
///
/// # Errors
///
/// Returns [`MiningError::InvalidConfig`] if `size` is zero.
pub fn partition_batches(commits: Vec<CommitInfo>, size: usize) -> Result<Vec<Batch>, MiningError> {
    if size == 0 {
        return Err(MiningError::InvalidConfig("batch size must be positive".to_owned()));
    }
    let mut batches = Vec::with_capacity(commits.len().div_ceil(size));
    let mut iter = commits.into_iter().peekable();
    while iter.peek().is_some() {
        let chunk: Vec<CommitInfo> = iter.by_ref().take(size).collect();
        let id = chunk.first().map(|c| c.id.clone()).unwrap_or_default();
        batches.push(Batch {
            index: batches.len(),
            id,
            commits: chunk,
        });
    }
    Ok(batches)
}

/// Progress of one mined unit. `Failed` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    /// Not yet looked at.
    Pending,
    /// Parsed into a tree.
    Parsed,
    /// Passed the tree filter.
    Filtered,
    /// Every CODE node got a pattern.
    Classified,
    /// Written to the batch line graph.
    Exported,
    /// Rejected by the tree filter.
    Rejected,
    /// Could not be processed.
    Failed,
}

impl UnitState {
    /// The next state on the success path; terminal states stay put.
    pub fn advance(self) -> Self {
        match self {
            UnitState::Pending => UnitState::Parsed,
            UnitState::Parsed => UnitState::Filtered,
            UnitState::Filtered => UnitState::Classified,
            UnitState::Classified => UnitState::Exported,
            UnitState::Exported | UnitState::Rejected | UnitState::Failed => self,
        }
    }

    /// Returns `true` for states no unit leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Exported | UnitState::Rejected | UnitState::Failed)
    }
}

/// What processing one commit produced.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    /// Statistics of this commit alone.
    pub result: MiningResult,
    /// Line-graph text of the exported trees.
    pub line_graph: String,
    /// Final state of each accepted patch, in diff order.
    pub patch_states: Vec<UnitState>,
}

/// Runs one commit through parse, transform, filter, classify, and export.
///
/// Never fails: source and parse errors are recorded in the outcome's result.
pub fn process_commit(
    commit: &CommitInfo,
    source: &dyn CommitSource,
    oracle: &dyn SatOracle,
    config: &MiningConfig,
) -> CommitOutcome {
    let started = Instant::now();
    let mut outcome = CommitOutcome::default();
    outcome.result.total_commits = 1;

    if !config.diff_filter.accepts_commit(commit) {
        debug!(commit = %commit.id, "commit filtered");
        outcome.result.filtered_commits = 1;
        return outcome;
    }

    let files = match source.diff(commit) {
        Ok(files) => files,
        Err(e) => {
            warn!(commit = %commit.id, error = %e, "cannot obtain commit diff");
            outcome.result.record_failure(&commit.id, &e.message);
            return outcome;
        }
    };

    let diff = CommitDiff::build(&commit.id, files, &config.diff_filter);
    outcome.result.total_patches = diff.patches.len() as u64;

    let mut explanations = FilterExplanations::new();
    let mut occurrences: BTreeMap<String, u64> = BTreeMap::new();
    let mut exported: Vec<DiffTree> = Vec::new();

    for patch in diff.patches {
        let path = patch.path.clone();
        let (state, tree) = process_patch(
            patch,
            oracle,
            config,
            &mut outcome.result,
            &mut explanations,
            &mut occurrences,
        );
        match (state, tree) {
            (UnitState::Classified, Some(tree)) => {
                for (_, node) in tree.iter() {
                    if node.code_type != CodeType::Root {
                        outcome.result.record_node(node.diff_type);
                    }
                }
                exported.push(tree);
                outcome.patch_states.push(UnitState::Classified.advance());
            }
            (state, Some(_) | None) => {
                if state == UnitState::Failed {
                    debug!(commit = %commit.id, path = %path, "patch failed");
                }
                outcome.patch_states.push(state);
            }
        }
    }

    outcome.result.record_filter_hits(&explanations);
    outcome.result.record_commit_patterns(&occurrences);
    outcome.result.exported_trees = exported.len() as u64;
    if exported.is_empty() {
        outcome.result.empty_commits = 1;
    } else {
        outcome.result.exported_commits = 1;
        match config.line_graph.graph_format {
            GraphFormat::Tree => {
                for tree in &exported {
                    write_tree(&mut outcome.line_graph, tree, &config.line_graph);
                }
            }
            GraphFormat::Graph => {
                let graph = DiffTree::commit_graph(&commit.id, exported);
                write_tree(&mut outcome.line_graph, &graph, &config.line_graph);
            }
        }
    }

    let millis = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    outcome.result.record_commit_time(&commit.id, millis);
    outcome
}

/// Advances one patch as far as it gets. Returns the tree only when it
/// reached [`UnitState::Classified`].
fn process_patch(
    patch: PatchDiff,
    oracle: &dyn SatOracle,
    config: &MiningConfig,
    result: &mut MiningResult,
    explanations: &mut FilterExplanations,
    occurrences: &mut BTreeMap<String, u64>,
) -> (UnitState, Option<DiffTree>) {
    let state = UnitState::Pending;
    let mut tree = match patch.tree {
        Ok(tree) => tree,
        Err(e) => {
            result.record_diff_error(e.kind());
            return (UnitState::Failed, None);
        }
    };
    let mut state = state.advance();

    apply_all(&config.transforms, &mut tree);
    let classified = {
        let mut ctx = MatchContext::new(&tree, oracle);
        if !config.tree_filter.test(&mut ctx, explanations) {
            return (UnitState::Rejected, None);
        }
        state = state.advance();
        config.catalog.classify_all(&mut ctx)
    };

    match classified {
        Ok(matches) => {
            for m in matches {
                *occurrences.entry(m.pattern.to_owned()).or_insert(0) += 1;
            }
            (state.advance(), Some(tree))
        }
        Err(e) => {
            if let MatchError::Oracle(OracleError::TooManyVariables { found, limit }) = &e {
                warn!(
                    path = %patch.path,
                    literals = found,
                    limit,
                    "presence conditions exceed the oracle bound; patch not classified"
                );
            } else {
                debug!(path = %patch.path, error = %e, state = ?state, "tree not classified");
            }
            result.record_diff_error(CLASSIFICATION_ERROR_KIND);
            (UnitState::Failed, None)
        }
    }
}

/// Processes the commits of `batch` in order and hands its output to `sink`.
///
/// # Errors
///
/// Returns [`WorkerError::Sink`] when the sink rejects the output.
pub fn process_batch(
    batch: &Batch,
    source: &dyn CommitSource,
    sink: &dyn OutputSink,
    oracle: &dyn SatOracle,
    config: &MiningConfig,
) -> Result<MiningResult, WorkerError> {
    let mut result = MiningResult::new();
    let mut line_graph = String::new();
    for commit in &batch.commits {
        let outcome = process_commit(commit, source, oracle, config);
        result.append(&outcome.result);
        line_graph.push_str(&outcome.line_graph);
    }
    sink.write_batch(&batch.id, &line_graph, &result)
        .map_err(WorkerError::Sink)?;
    info!(
        batch = %batch.id,
        commits = batch.commits.len(),
        trees = result.exported_trees,
        "batch done"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Result of [`mine`].
#[derive(Debug, Clone, Default)]
pub struct MiningOutcome {
    /// Combined result of all completed batches.
    pub result: MiningResult,
    /// Batches that failed.
    pub failures: Vec<WorkerFailure>,
    /// Ids of batches skipped after a failure.
    pub skipped_batches: Vec<String>,
}

impl MiningOutcome {
    /// Returns `true` if every batch completed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped_batches.is_empty()
    }
}

enum BatchReport {
    Done(MiningResult),
    Failed(WorkerFailure),
    Skipped(String),
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn run_batch(
    batch: &Batch,
    source: &dyn CommitSource,
    sink: &dyn OutputSink,
    oracle: &dyn SatOracle,
    config: &MiningConfig,
    cancelled: &AtomicBool,
) -> BatchReport {
    if cancelled.load(Ordering::SeqCst) {
        return BatchReport::Skipped(batch.id.clone());
    }
    let run = panic::catch_unwind(AssertUnwindSafe(|| {
        process_batch(batch, source, sink, oracle, config)
    }));
    let outcome = match run {
        Ok(outcome) => outcome,
        Err(payload) => Err(WorkerError::Panicked(panic_message(payload.as_ref()))),
    };
    match outcome {
        Ok(result) => BatchReport::Done(result),
        Err(error) => {
            cancelled.store(true, Ordering::SeqCst);
            BatchReport::Failed(WorkerFailure {
                batch_id: batch.id.clone(),
                error,
            })
        }
    }
}

/// Mines the history of `source`, writing batch outputs and, if every batch
/// completes, the total result to `sink`.
///
/// # Errors
///
/// Returns [`MiningError`] when the run cannot start or the total result
/// cannot be written. Batch failures are reported in the outcome instead.
pub fn mine(
    source: &dyn CommitSource,
    sink: &dyn OutputSink,
    oracle: &dyn SatOracle,
    config: &MiningConfig,
) -> Result<MiningOutcome, MiningError> {
    let started = Instant::now();
    let commits = source.commits().map_err(MiningError::ListCommits)?;
    let batches = partition_batches(commits, config.batch_size)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()
        .map_err(|e| MiningError::ThreadPool(e.to_string()))?;
    info!(
        repository = %config.repository,
        batches = batches.len(),
        threads = pool.current_num_threads(),
        "mining started"
    );

    let cancelled = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<BatchReport>();
    let mut outcome = MiningOutcome::default();

    std::thread::scope(|scope| {
        let batches = &batches;
        let cancelled = &cancelled;
        let pool = &pool;
        scope.spawn(move || {
            pool.scope_fifo(|s| {
                for batch in batches {
                    let tx = tx.clone();
                    s.spawn_fifo(move |_| {
                        let report = run_batch(batch, source, sink, oracle, config, cancelled);
                        if tx.send(report).is_err() {
                            debug!(batch = %batch.id, "orchestrator gone");
                        }
                    });
                }
            });
        });

        for report in rx {
            match report {
                BatchReport::Done(result) => outcome.result.append(&result),
                BatchReport::Failed(failure) => {
                    error!(batch = %failure.batch_id, error = %failure.error, "batch failed");
                    outcome.failures.push(failure);
                }
                BatchReport::Skipped(id) => outcome.skipped_batches.push(id),
            }
        }
    });

    outcome.failures.sort_by(|a, b| a.batch_id.cmp(&b.batch_id));
    outcome.skipped_batches.sort();
    outcome.result.runtime_with_multithreading_millis =
        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    if outcome.is_complete() {
        sink.write_total(&outcome.result).map_err(MiningError::Sink)?;
        info!(repository = %config.repository, "mining finished\n{}", outcome.result.to_snapshot());
    } else {
        error!(
            repository = %config.repository,
            failed = outcome.failures.len(),
            skipped = outcome.skipped_batches.len(),
            "mining aborted; no total result written"
        );
    }
    Ok(outcome)
}
