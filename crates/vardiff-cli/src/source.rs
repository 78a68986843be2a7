//! Commit sources backed by the `git` executable or a directory of patches.
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;
use vardiff_core::{CommitInfo, CommitSource, FileDiff, SourceError, split_unified_diff};

use crate::io;

// ---------------------------------------------------------------------------
// GitSource
// ---------------------------------------------------------------------------

/// Reads history from a git working copy by running `git`.
#[derive(Debug, Clone)]
pub struct GitSource {
    repo: PathBuf,
}

impl GitSource {
    /// Creates a source for the repository at `repo`.
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    fn git(&self, args: &[&str]) -> Result<String, SourceError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            .output()
            .map_err(|e| SourceError::new(format!("cannot run git: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::new(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or(""),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CommitSource for GitSource {
    /// Lists all commits reachable from `HEAD`, oldest first.
    fn commits(&self) -> Result<Vec<CommitInfo>, SourceError> {
        let listing = self.git(&["rev-list", "--reverse", "--parents", "HEAD"])?;
        Ok(listing
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let id = fields.next()?;
                Some(CommitInfo {
                    id: id.to_owned(),
                    parent_count: fields.count(),
                })
            })
            .collect())
    }

    /// Diffs a commit against its first parent; root commits against the
    /// empty tree.
    fn diff(&self, commit: &CommitInfo) -> Result<Vec<FileDiff>, SourceError> {
        let text = if commit.parent_count == 0 {
            self.git(&["diff-tree", "-p", "-M", "--root", "--no-color", "--no-ext-diff", &commit.id])?
        } else {
            let parent = format!("{}^1", commit.id);
            self.git(&["diff", "-M", "--no-color", "--no-ext-diff", &parent, &commit.id])?
        };
        Ok(split_unified_diff(&text))
    }
}

// ---------------------------------------------------------------------------
// DirectorySource
// ---------------------------------------------------------------------------

/// Extension of the patch files read by [`DirectorySource`].
pub const PATCH_EXTENSION: &str = "diff";

/// Treats every `<commit>.diff` file in a directory as one commit, ordered
/// by file name. Each file holds the commit's multi-file unified diff.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    max_file_size: u64,
}

impl DirectorySource {
    /// Creates a source reading patches from `dir`.
    pub fn new(dir: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            dir: dir.into(),
            max_file_size,
        }
    }

    fn patch_path(&self, commit: &str) -> PathBuf {
        self.dir.join(format!("{commit}.{PATCH_EXTENSION}"))
    }
}

fn is_patch(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == PATCH_EXTENSION)
}

impl CommitSource for DirectorySource {
    fn commits(&self) -> Result<Vec<CommitInfo>, SourceError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| SourceError::new(format!("cannot list {}: {e}", self.dir.display())))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::new(e.to_string()))?;
            let path = entry.path();
            if !is_patch(&path) {
                debug!(path = %path.display(), "ignoring non-patch file");
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_owned());
            }
        }
        ids.sort();
        Ok(ids.into_iter().map(CommitInfo::new).collect())
    }

    fn diff(&self, commit: &CommitInfo) -> Result<Vec<FileDiff>, SourceError> {
        let text = io::read_file(&self.patch_path(&commit.id), self.max_file_size)
            .map_err(|e| SourceError::new(e.message()))?;
        Ok(split_unified_diff(&text))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    const PATCH: &str = "diff --git a/x.c b/x.c\n--- a/x.c\n+++ b/x.c\n@@ -1,1 +1,3 @@\n+#if A\n code\n+#endif\n";

    #[test]
    fn directory_commits_are_sorted_patch_stems() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("0002.diff"), PATCH).expect("write");
        std::fs::write(dir.path().join("0001.diff"), PATCH).expect("write");
        std::fs::write(dir.path().join("notes.txt"), "x").expect("write");
        let source = DirectorySource::new(dir.path(), 1 << 20);

        let ids: Vec<String> = source
            .commits()
            .expect("list")
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["0001", "0002"]);
    }

    #[test]
    fn directory_diff_splits_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("c1.diff"), PATCH).expect("write");
        let source = DirectorySource::new(dir.path(), 1 << 20);

        let files = source.diff(&CommitInfo::new("c1")).expect("diff");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path(), "x.c");
    }

    #[test]
    fn missing_directory_fails_listing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = DirectorySource::new(dir.path().join("absent"), 1 << 20);
        assert!(source.commits().is_err());
    }

    #[test]
    fn oversized_patch_fails_the_commit() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("c1.diff"), PATCH).expect("write");
        let source = DirectorySource::new(dir.path(), 4);
        let err = source.diff(&CommitInfo::new("c1")).expect_err("too large");
        assert!(err.message.contains("too large"), "{}", err.message);
    }
}
