//! Commit-level diffs: splitting multi-file diff text, path and change-type
//! filtering, and parsing each accepted file into a tree.

use std::fmt;

use regex::Regex;
use tracing::debug;

use crate::enums::ChangeType;
use crate::parse::{ParseError, parse_hunk_header, parse_patch};
use crate::tree::{DiffTree, DiffTreeSource};

#[cfg(test)]
mod tests;

const DEV_NULL: &str = "/dev/null";

/// Extensions of C-family sources and headers.
pub const C_FAMILY_EXTENSIONS: [&str; 7] = ["c", "cpp", "h", "hpp", "cc", "cxx", "hxx"];

// ---------------------------------------------------------------------------
// FileDiff / split_unified_diff
// ---------------------------------------------------------------------------

/// The part of a multi-file diff that touches one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path before the change; `None` for added files.
    pub old_path: Option<String>,
    /// Path after the change; `None` for deleted files.
    pub new_path: Option<String>,
    /// Kind of change.
    pub change_type: ChangeType,
    /// Hunks of this file, starting at the first `@@` header.
    pub patch: String,
}

impl FileDiff {
    /// The path after the change, or the old path for deletions.
    pub fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct FileDiffBuilder {
    old_path: Option<String>,
    new_path: Option<String>,
    change_type: Option<ChangeType>,
    binary: bool,
    patch: String,
}

impl FileDiffBuilder {
    fn from_git_header(line: &str) -> Self {
        let mut builder = Self::default();
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some((old, new)) = rest.split_once(" b/") {
                builder.old_path = Some(strip_side_prefix(old).to_owned());
                builder.new_path = Some(new.to_owned());
            }
        }
        builder
    }

    fn header_line(&mut self, line: &str) {
        if line.starts_with("new file mode") {
            self.change_type = Some(ChangeType::Add);
        } else if line.starts_with("deleted file mode") {
            self.change_type = Some(ChangeType::Delete);
        } else if let Some(path) = line.strip_prefix("rename from ") {
            self.change_type = Some(ChangeType::Rename);
            self.old_path = Some(path.to_owned());
        } else if let Some(path) = line.strip_prefix("rename to ") {
            self.change_type = Some(ChangeType::Rename);
            self.new_path = Some(path.to_owned());
        } else if let Some(path) = line.strip_prefix("copy from ") {
            self.change_type = Some(ChangeType::Copy);
            self.old_path = Some(path.to_owned());
        } else if let Some(path) = line.strip_prefix("copy to ") {
            self.change_type = Some(ChangeType::Copy);
            self.new_path = Some(path.to_owned());
        } else if let Some(path) = line.strip_prefix("--- ") {
            self.old_path = header_path(path);
        } else if let Some(path) = line.strip_prefix("+++ ") {
            self.new_path = header_path(path);
        } else if line.starts_with("Binary files ") || line.starts_with("GIT binary patch") {
            self.binary = true;
        }
    }

    fn finish(self) -> Option<FileDiff> {
        if self.binary || (self.old_path.is_none() && self.new_path.is_none()) {
            return None;
        }
        let change_type = self.change_type.unwrap_or(match (&self.old_path, &self.new_path) {
            (None, Some(_)) => ChangeType::Add,
            (Some(_), None) => ChangeType::Delete,
            (Some(_), Some(_)) | (None, None) => ChangeType::Modify,
        });
        Some(FileDiff {
            old_path: self.old_path,
            new_path: self.new_path,
            change_type,
            patch: self.patch,
        })
    }
}

fn strip_side_prefix(path: &str) -> &str {
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}

/// Path of a `---`/`+++` line, without `a/`/`b/` prefix or trailing
/// timestamp; `None` for `/dev/null`.
fn header_path(raw: &str) -> Option<String> {
    let path = raw.split('\t').next().unwrap_or(raw).trim_end();
    if path == DEV_NULL {
        None
    } else {
        Some(strip_side_prefix(path).to_owned())
    }
}

/// Splits `git diff`-style text into per-file diffs.
///
/// Files are delimited by `diff --git` lines; plain unified diffs without
/// them are delimited by `---`/`+++` header pairs. Hunk bodies are measured
/// by their headers, so removed lines that look like headers stay in the
/// patch. Binary files are dropped.
pub fn split_unified_diff(text: &str) -> Vec<FileDiff> {
    let mut files = Vec::new();
    let mut current: Option<FileDiffBuilder> = None;
    // Lines left in the current hunk body on the old and new side.
    let mut remaining = (0usize, 0usize);
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        if remaining != (0, 0) {
            if let Some(builder) = current.as_mut() {
                builder.patch.push_str(line);
                builder.patch.push('\n');
            }
            match line.chars().next() {
                Some('+') => remaining.1 = remaining.1.saturating_sub(1),
                Some('-') => remaining.0 = remaining.0.saturating_sub(1),
                Some('\\') => {}
                Some(_) | None => {
                    remaining.0 = remaining.0.saturating_sub(1);
                    remaining.1 = remaining.1.saturating_sub(1);
                }
            }
            continue;
        }

        let starts_plain_file = line.starts_with("--- ")
            && lines.peek().is_some_and(|next| next.starts_with("+++ "))
            && current.as_ref().is_none_or(|b| !b.patch.is_empty());
        if line.starts_with("diff --git ") || starts_plain_file {
            if let Some(file) = current.take().and_then(FileDiffBuilder::finish) {
                files.push(file);
            }
            let mut builder = FileDiffBuilder::from_git_header(line);
            if starts_plain_file {
                builder.header_line(line);
            }
            current = Some(builder);
            continue;
        }

        let Some(builder) = current.as_mut() else {
            continue;
        };
        if line.starts_with("@@") {
            if let Some(range) = parse_hunk_header(line) {
                remaining = (range.old_len, range.new_len);
            }
            builder.patch.push_str(line);
            builder.patch.push('\n');
        } else if builder.patch.is_empty() {
            builder.header_line(line);
        } else if line.starts_with('\\') {
            builder.patch.push_str(line);
            builder.patch.push('\n');
        }
    }
    if let Some(file) = current.and_then(FileDiffBuilder::finish) {
        files.push(file);
    }
    files
}

// ---------------------------------------------------------------------------
// DiffFilter
// ---------------------------------------------------------------------------

/// A path pattern that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPatternError {
    /// The pattern as given.
    pub pattern: String,
    /// Message from the regex engine.
    pub message: String,
}

impl fmt::Display for PathPatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid path pattern \"{}\": {}", self.pattern, self.message)
    }
}

impl std::error::Error for PathPatternError {}

fn full_match(pattern: &str) -> Result<Regex, PathPatternError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| PathPatternError {
        pattern: pattern.to_owned(),
        message: e.to_string(),
    })
}

/// Decides which commits and files are mined.
///
/// Empty allow-lists accept everything. Path patterns must match the whole
/// path; blocked patterns win over allowed ones.
#[derive(Debug, Clone, Default)]
pub struct DiffFilter {
    /// Include commits with more than one parent.
    pub allow_merge: bool,
    allowed_paths: Vec<Regex>,
    blocked_paths: Vec<Regex>,
    /// Accepted change types; empty accepts all.
    pub change_types: Vec<ChangeType>,
    extensions: Vec<String>,
}

impl DiffFilter {
    /// Accepts every non-merge commit and every file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Modified, added, or deleted C-family files.
    pub fn c_family() -> Self {
        Self {
            change_types: vec![ChangeType::Add, ChangeType::Modify, ChangeType::Delete],
            extensions: C_FAMILY_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect(),
            ..Self::default()
        }
    }

    /// Adds a pattern a path must fully match.
    ///
    /// # Errors
    ///
    /// Returns [`PathPatternError`] if `pattern` is not a valid regex.
    pub fn allow_path(mut self, pattern: &str) -> Result<Self, PathPatternError> {
        self.allowed_paths.push(full_match(pattern)?);
        Ok(self)
    }

    /// Adds a pattern excluding fully matching paths.
    ///
    /// # Errors
    ///
    /// Returns [`PathPatternError`] if `pattern` is not a valid regex.
    pub fn block_path(mut self, pattern: &str) -> Result<Self, PathPatternError> {
        self.blocked_paths.push(full_match(pattern)?);
        Ok(self)
    }

    /// Adds an accepted file extension, compared case-insensitively.
    pub fn extension(mut self, extension: &str) -> Self {
        self.extensions
            .push(extension.trim_start_matches('.').to_ascii_lowercase());
        self
    }

    /// Accepted extensions, lowercase without dot.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether a commit is mined at all.
    pub fn accepts_commit(&self, commit: &CommitInfo) -> bool {
        self.allow_merge || commit.parent_count <= 1
    }

    /// Whether a file of an accepted commit is mined.
    pub fn accepts_file(&self, file: &FileDiff) -> bool {
        if !self.change_types.is_empty() && !self.change_types.contains(&file.change_type) {
            return false;
        }
        let path = file.path();
        if !self.extensions.is_empty() {
            let file_name = path.rsplit('/').next().unwrap_or(path);
            let Some((_, ext)) = file_name.rsplit_once('.') else {
                return false;
            };
            let ext = ext.to_ascii_lowercase();
            if !self.extensions.contains(&ext) {
                return false;
            }
        }
        if !self.allowed_paths.is_empty() && !self.allowed_paths.iter().any(|r| r.is_match(path)) {
            return false;
        }
        !self.blocked_paths.iter().any(|r| r.is_match(path))
    }
}

// ---------------------------------------------------------------------------
// CommitDiff
// ---------------------------------------------------------------------------

/// A commit as listed by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit identifier.
    pub id: String,
    /// Number of parent commits.
    pub parent_count: usize,
}

impl CommitInfo {
    /// Creates a commit with a single parent.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_count: 1,
        }
    }
}

/// One accepted file of a commit, parsed or not.
#[derive(Debug, Clone)]
pub struct PatchDiff {
    /// Path of the file.
    pub path: String,
    /// Kind of change.
    pub change_type: ChangeType,
    /// The tree, or why it could not be built.
    pub tree: Result<DiffTree, ParseError>,
}

impl PatchDiff {
    /// Returns `true` if parsing succeeded.
    pub fn is_valid(&self) -> bool {
        self.tree.is_ok()
    }
}

/// All accepted files of one commit.
#[derive(Debug, Clone)]
pub struct CommitDiff {
    /// Commit identifier.
    pub commit: String,
    /// Parsed files in diff order.
    pub patches: Vec<PatchDiff>,
    /// Files rejected by the filter.
    pub filtered_files: usize,
}

impl CommitDiff {
    /// Filters `files` and parses the accepted ones.
    pub fn build(commit: &str, files: Vec<FileDiff>, filter: &DiffFilter) -> Self {
        let mut patches = Vec::with_capacity(files.len());
        let mut filtered_files = 0;
        for file in files {
            if !filter.accepts_file(&file) {
                debug!(commit, path = file.path(), "file filtered");
                filtered_files += 1;
                continue;
            }
            let path = file.path().to_owned();
            let tree = parse_patch(&file.patch, DiffTreeSource::new(path.clone(), commit));
            if let Err(err) = &tree {
                debug!(commit, path = %path, error = %err, "patch not parsed");
            }
            patches.push(PatchDiff {
                path,
                change_type: file.change_type,
                tree,
            });
        }
        Self {
            commit: commit.to_owned(),
            patches,
            filtered_files,
        }
    }

    /// Trees of the valid patches.
    pub fn trees(&self) -> impl Iterator<Item = &DiffTree> {
        self.patches.iter().filter_map(|p| p.tree.as_ref().ok())
    }

    /// Parse errors of the invalid patches.
    pub fn errors(&self) -> impl Iterator<Item = &ParseError> {
        self.patches.iter().filter_map(|p| p.tree.as_ref().err())
    }
}
