//! Aggregable mining statistics and their `key: value` snapshot text.
//!
//! [`MiningResult::append`] is commutative and associative: every field is a
//! sum, a key-wise sum, a set union, or an extremum under a total order
//! (time first, then commit id). Partial results from different batches can
//! therefore be combined in any order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::enums::DiffType;
use crate::filter::FilterExplanations;


const KEY_COMMITS: &str = "commits";
const KEY_EXPORTED_COMMITS: &str = "exported commits";
const KEY_EMPTY_COMMITS: &str = "empty commits";
const KEY_FAILED_COMMITS: &str = "failed commits";
const KEY_FILTERED_COMMITS: &str = "filtered commits";
const KEY_PATCHES: &str = "patches";
const KEY_EXPORTED_TREES: &str = "exported trees";
const KEY_RUNTIME: &str = "runtime in ms";
const KEY_RUNTIME_MT: &str = "runtime with multithreading in ms";
const KEY_FASTEST: &str = "fastest commit";
const KEY_SLOWEST: &str = "slowest commit";
const PREFIX_NODES: &str = "exported nodes ";
const PREFIX_PATTERN: &str = "pattern ";
const PREFIX_ERROR: &str = "parse error ";
const PREFIX_FILTERED: &str = "filtered because not";
const PREFIX_FAILURE: &str = "failure ";

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

/// Processing time of one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTime {
    /// Commit identifier.
    pub commit: String,
    /// Processing time in whole milliseconds.
    pub millis: u64,
}

impl CommitTime {
    /// Total order used for extremes: time, then commit id.
    fn order(&self, other: &CommitTime) -> Ordering {
        self.millis
            .cmp(&other.millis)
            .then_with(|| self.commit.cmp(&other.commit))
    }
}

fn keep_min(slot: &mut Option<CommitTime>, candidate: &CommitTime) {
    let replace = slot
        .as_ref()
        .is_none_or(|current| candidate.order(current) == Ordering::Less);
    if replace {
        *slot = Some(candidate.clone());
    }
}

fn keep_max(slot: &mut Option<CommitTime>, candidate: &CommitTime) {
    let replace = slot
        .as_ref()
        .is_none_or(|current| candidate.order(current) == Ordering::Greater);
    if replace {
        *slot = Some(candidate.clone());
    }
}

/// How often one pattern matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCount {
    /// Matched CODE nodes.
    pub occurrences: u64,
    /// Distinct commits with at least one match.
    pub commits: u64,
}

fn add_counts(into: &mut BTreeMap<String, u64>, from: &BTreeMap<String, u64>) {
    for (key, count) in from {
        *into.entry(key.clone()).or_insert(0) += count;
    }
}

// ---------------------------------------------------------------------------
// MiningResult
// ---------------------------------------------------------------------------

/// Statistics of a batch or of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningResult {
    /// Commits listed by the source.
    pub total_commits: u64,
    /// Commits that contributed at least one exported tree.
    pub exported_commits: u64,
    /// Processed commits without any exported tree.
    pub empty_commits: u64,
    /// Commits whose diff could not be obtained.
    pub failed_commits: u64,
    /// Commits rejected by the diff filter.
    pub filtered_commits: u64,
    /// Accepted file diffs, parsed or not.
    pub total_patches: u64,
    /// Trees that passed the tree filter and were exported.
    pub exported_trees: u64,
    /// Exported nodes per diff type token.
    pub exported_nodes: BTreeMap<String, u64>,
    /// Matches per pattern name.
    pub pattern_counts: BTreeMap<String, PatternCount>,
    /// Tree filter rejections per explanation key.
    pub filter_hits: BTreeMap<String, u64>,
    /// Parse failures per error kind.
    pub diff_errors: BTreeMap<String, u64>,
    /// Failure messages per commit id.
    pub failures: BTreeMap<String, String>,
    /// Fastest processed commit.
    pub fastest: Option<CommitTime>,
    /// Slowest processed commit.
    pub slowest: Option<CommitTime>,
    /// Summed worker time in milliseconds.
    pub runtime_millis: u64,
    /// Orchestrator wall-clock time in milliseconds.
    pub runtime_with_multithreading_millis: u64,
}

impl MiningResult {
    /// Creates an empty result; the identity of [`MiningResult::append`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Combines `other` into `self`.
    pub fn append(&mut self, other: &MiningResult) {
        self.total_commits += other.total_commits;
        self.exported_commits += other.exported_commits;
        self.empty_commits += other.empty_commits;
        self.failed_commits += other.failed_commits;
        self.filtered_commits += other.filtered_commits;
        self.total_patches += other.total_patches;
        self.exported_trees += other.exported_trees;
        add_counts(&mut self.exported_nodes, &other.exported_nodes);
        for (name, count) in &other.pattern_counts {
            let entry = self.pattern_counts.entry(name.clone()).or_default();
            entry.occurrences += count.occurrences;
            entry.commits += count.commits;
        }
        add_counts(&mut self.filter_hits, &other.filter_hits);
        add_counts(&mut self.diff_errors, &other.diff_errors);
        for (commit, message) in &other.failures {
            match self.failures.get_mut(commit) {
                // Keep the smaller message so duplicates combine symmetrically.
                Some(existing) => {
                    if message < existing {
                        existing.clone_from(message);
                    }
                }
                None => {
                    self.failures.insert(commit.clone(), message.clone());
                }
            }
        }
        if let Some(t) = &other.fastest {
            keep_min(&mut self.fastest, t);
        }
        if let Some(t) = &other.slowest {
            keep_max(&mut self.slowest, t);
        }
        self.runtime_millis += other.runtime_millis;
        self.runtime_with_multithreading_millis += other.runtime_with_multithreading_millis;
    }

    /// Records the processing time of one commit.
    pub fn record_commit_time(&mut self, commit: &str, millis: u64) {
        let time = CommitTime {
            commit: commit.to_owned(),
            millis,
        };
        keep_min(&mut self.fastest, &time);
        keep_max(&mut self.slowest, &time);
        self.runtime_millis += millis;
    }

    /// Counts one exported node.
    pub fn record_node(&mut self, diff_type: DiffType) {
        *self
            .exported_nodes
            .entry(diff_type.token().to_owned())
            .or_insert(0) += 1;
    }

    /// Adds the pattern matches of one commit; each pattern present counts
    /// for one commit.
    pub fn record_commit_patterns(&mut self, occurrences: &BTreeMap<String, u64>) {
        for (name, &n) in occurrences {
            if n == 0 {
                continue;
            }
            let entry = self.pattern_counts.entry(name.clone()).or_default();
            entry.occurrences += n;
            entry.commits += 1;
        }
    }

    /// Adds tree filter rejections.
    pub fn record_filter_hits(&mut self, explanations: &FilterExplanations) {
        add_counts(&mut self.filter_hits, explanations.counts());
    }

    /// Counts one parse failure.
    pub fn record_diff_error(&mut self, kind: &str) {
        *self.diff_errors.entry(kind.to_owned()).or_insert(0) += 1;
    }

    /// Records a commit whose diff could not be obtained.
    pub fn record_failure(&mut self, commit: &str, message: &str) {
        self.failed_commits += 1;
        self.failures
            .insert(commit.to_owned(), single_line(message));
    }

    /// Renders the snapshot text: one `key: value` line per entry, in a
    /// fixed order.
    pub fn to_snapshot(&self) -> String {
        let mut out = String::new();
        let mut line = |key: &str, value: &dyn fmt::Display| {
            out.push_str(&format!("{key}: {value}\n"));
        };
        line(KEY_COMMITS, &self.total_commits);
        line(KEY_EXPORTED_COMMITS, &self.exported_commits);
        line(KEY_EMPTY_COMMITS, &self.empty_commits);
        line(KEY_FAILED_COMMITS, &self.failed_commits);
        line(KEY_FILTERED_COMMITS, &self.filtered_commits);
        line(KEY_PATCHES, &self.total_patches);
        line(KEY_EXPORTED_TREES, &self.exported_trees);
        for (diff_type, count) in &self.exported_nodes {
            line(&format!("{PREFIX_NODES}{diff_type}"), count);
        }
        if let Some(t) = &self.fastest {
            line(KEY_FASTEST, &format!("{} ({} ms)", t.commit, t.millis));
        }
        if let Some(t) = &self.slowest {
            line(KEY_SLOWEST, &format!("{} ({} ms)", t.commit, t.millis));
        }
        line(KEY_RUNTIME, &self.runtime_millis);
        line(KEY_RUNTIME_MT, &self.runtime_with_multithreading_millis);
        for (name, count) in &self.pattern_counts {
            line(
                &format!("{PREFIX_PATTERN}{name}"),
                &format!("{} in {} commits", count.occurrences, count.commits),
            );
        }
        for (key, count) in &self.filter_hits {
            line(key, count);
        }
        for (kind, count) in &self.diff_errors {
            line(&format!("{PREFIX_ERROR}{kind}"), count);
        }
        for (commit, message) in &self.failures {
            line(&format!("{PREFIX_FAILURE}{commit}"), message);
        }
        out
    }

    /// Parses snapshot text written by [`MiningResult::to_snapshot`].
    /// Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] for lines without `: `, unknown keys, and
    /// unparsable values.
    pub fn from_snapshot(text: &str) -> Result<Self, SnapshotError> {
        let mut result = MiningResult::new();
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let Some((key, value)) = raw.split_once(": ") else {
                return Err(SnapshotError::Malformed { line });
            };
            result.read_entry(key, value.trim_end(), line)?;
        }
        Ok(result)
    }

    fn read_entry(&mut self, key: &str, value: &str, line: usize) -> Result<(), SnapshotError> {
        let number = |v: &str| -> Result<u64, SnapshotError> {
            v.trim().parse().map_err(|_| SnapshotError::InvalidValue {
                line,
                value: v.to_owned(),
            })
        };
        match key {
            KEY_COMMITS => self.total_commits = number(value)?,
            KEY_EXPORTED_COMMITS => self.exported_commits = number(value)?,
            KEY_EMPTY_COMMITS => self.empty_commits = number(value)?,
            KEY_FAILED_COMMITS => self.failed_commits = number(value)?,
            KEY_FILTERED_COMMITS => self.filtered_commits = number(value)?,
            KEY_PATCHES => self.total_patches = number(value)?,
            KEY_EXPORTED_TREES => self.exported_trees = number(value)?,
            KEY_RUNTIME => self.runtime_millis = number(value)?,
            KEY_RUNTIME_MT => self.runtime_with_multithreading_millis = number(value)?,
            KEY_FASTEST => self.fastest = Some(commit_time(value, line)?),
            KEY_SLOWEST => self.slowest = Some(commit_time(value, line)?),
            _ => {
                if let Some(diff_type) = key.strip_prefix(PREFIX_NODES) {
                    self.exported_nodes
                        .insert(diff_type.to_owned(), number(value)?);
                } else if let Some(name) = key.strip_prefix(PREFIX_PATTERN) {
                    let invalid = || SnapshotError::InvalidValue {
                        line,
                        value: value.to_owned(),
                    };
                    let (occurrences, rest) = value.split_once(" in ").ok_or_else(invalid)?;
                    let commits = rest.strip_suffix(" commits").ok_or_else(invalid)?;
                    self.pattern_counts.insert(
                        name.to_owned(),
                        PatternCount {
                            occurrences: number(occurrences)?,
                            commits: number(commits)?,
                        },
                    );
                } else if key.starts_with(PREFIX_FILTERED) {
                    self.filter_hits.insert(key.to_owned(), number(value)?);
                } else if let Some(kind) = key.strip_prefix(PREFIX_ERROR) {
                    self.diff_errors.insert(kind.to_owned(), number(value)?);
                } else if let Some(commit) = key.strip_prefix(PREFIX_FAILURE) {
                    self.failures.insert(commit.to_owned(), value.to_owned());
                } else {
                    return Err(SnapshotError::UnknownKey {
                        line,
                        key: key.to_owned(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn commit_time(value: &str, line: usize) -> Result<CommitTime, SnapshotError> {
    let invalid = || SnapshotError::InvalidValue {
        line,
        value: value.to_owned(),
    };
    let (commit, rest) = value.rsplit_once(" (").ok_or_else(invalid)?;
    let millis = rest
        .strip_suffix(" ms)")
        .and_then(|m| m.parse().ok())
        .ok_or_else(invalid)?;
    Ok(CommitTime {
        commit: commit.to_owned(),
        millis,
    })
}

fn single_line(message: &str) -> String {
    message.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// SnapshotError
// ---------------------------------------------------------------------------

/// Why snapshot text could not be read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// Line without a `key: value` separator.
    Malformed {
        /// 1-based line number.
        line: usize,
    },
    /// Key not written by [`MiningResult::to_snapshot`].
    UnknownKey {
        /// 1-based line number.
        line: usize,
        /// The key.
        key: String,
    },
    /// Value that does not parse for its key.
    InvalidValue {
        /// 1-based line number.
        line: usize,
        /// The value.
        value: String,
    },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { line } => write!(f, "line {line}: expected \"key: value\""),
            Self::UnknownKey { line, key } => write!(f, "line {line}: unknown key \"{key}\""),
            Self::InvalidValue { line, value } => {
                write!(f, "line {line}: invalid value \"{value}\"")
            }
        }
    }
}

impl std::error::Error for SnapshotError {}
