//! Output sink writing batch files into a directory.
//!
//! Layout of the output directory:
//!
//! ```text
//! <batch id>.lg                 line graph of the batch
//! <batch id>.metadata.txt       metadata snapshot of the batch
//! totalresult.metadata.txt      snapshot of a complete run
//! ```
//!
//! Existing files are overwritten, so re-mining with `--force` replaces the
//! previous run's outputs batch by batch.
use std::path::{Path, PathBuf};

use vardiff_core::{MiningResult, OutputSink, SinkError};

/// Extension of batch line-graph files.
pub const LINEGRAPH_EXTENSION: &str = "lg";
/// Suffix of metadata snapshot files.
pub const METADATA_SUFFIX: &str = ".metadata.txt";
/// File name of the total result.
pub const TOTAL_RESULT_FILE: &str = "totalresult.metadata.txt";

/// Writes mining output into one directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the directory cannot be created.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| SinkError {
            target: dir.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    /// Path of the total result file.
    pub fn total_path(&self) -> PathBuf {
        self.dir.join(TOTAL_RESULT_FILE)
    }

    /// Returns `true` if a previous complete run left its total result here.
    pub fn has_total(&self) -> bool {
        self.total_path().is_file()
    }

    fn write(&self, name: &str, contents: &str) -> Result<(), SinkError> {
        let path = self.dir.join(name);
        write_file(&path, contents)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), SinkError> {
    std::fs::write(path, contents).map_err(|e| SinkError {
        target: path.display().to_string(),
        message: e.to_string(),
    })
}

impl OutputSink for DirectorySink {
    fn write_batch(&self, batch_id: &str, line_graph: &str, result: &MiningResult) -> Result<(), SinkError> {
        self.write(&format!("{batch_id}.{LINEGRAPH_EXTENSION}"), line_graph)?;
        self.write(&format!("{batch_id}{METADATA_SUFFIX}"), &result.to_snapshot())
    }

    fn write_total(&self, result: &MiningResult) -> Result<(), SinkError> {
        write_file(&self.total_path(), &result.to_snapshot())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn batch_and_total_files_are_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = DirectorySink::create(dir.path().join("out")).expect("create");
        let mut result = MiningResult::new();
        result.total_commits = 2;

        sink.write_batch("abc", "t # x\n\n", &result).expect("batch");
        assert!(!sink.has_total());
        sink.write_total(&result).expect("total");
        assert!(sink.has_total());

        let lg = std::fs::read_to_string(dir.path().join("out/abc.lg")).expect("read lg");
        assert_eq!(lg, "t # x\n\n");
        let meta = std::fs::read_to_string(dir.path().join("out/abc.metadata.txt")).expect("read meta");
        assert_eq!(MiningResult::from_snapshot(&meta).expect("snapshot"), result);
    }
}
