//! In-memory histories for mining benchmarks.

use std::collections::HashMap;

use vardiff_core::{
    CommitInfo, CommitSource, FileDiff, MiningResult, OutputSink, SinkError, SourceError,
    split_unified_diff,
};

use crate::generator::{GeneratorConfig, generate_file_diff};

/// A generated history held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    commits: Vec<CommitInfo>,
    diffs: HashMap<String, String>,
}

impl MemoryHistory {
    /// Number of commits.
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Returns `true` if the history has no commits.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

impl CommitSource for MemoryHistory {
    fn commits(&self) -> Result<Vec<CommitInfo>, SourceError> {
        Ok(self.commits.clone())
    }

    fn diff(&self, commit: &CommitInfo) -> Result<Vec<FileDiff>, SourceError> {
        self.diffs
            .get(&commit.id)
            .map(|text| split_unified_diff(text))
            .ok_or_else(|| SourceError::new(format!("unknown commit {}", commit.id)))
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_batch(&self, _batch_id: &str, _line_graph: &str, _result: &MiningResult) -> Result<(), SinkError> {
        Ok(())
    }

    fn write_total(&self, _result: &MiningResult) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Generates `commits` commits touching `files_per_commit` C files each.
///
/// Every file diff gets its own seed derived from `config.seed`, so the
/// history is deterministic.
pub fn generate_history(config: &GeneratorConfig, commits: usize, files_per_commit: usize) -> MemoryHistory {
    let mut history = MemoryHistory::default();
    for c in 0..commits {
        let id = format!("{c:08x}");
        let mut text = String::new();
        for f in 0..files_per_commit {
            let file_config = GeneratorConfig {
                seed: config
                    .seed
                    .wrapping_add((c * files_per_commit + f) as u64),
                ..config.clone()
            };
            text.push_str(&generate_file_diff(&format!("src/file_{f}.c"), &file_config));
        }
        history.commits.push(CommitInfo::new(id.clone()));
        history.diffs.insert(id, text);
    }
    history
}
