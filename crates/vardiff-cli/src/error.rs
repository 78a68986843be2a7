/// CLI error types with associated exit codes.
///
/// Every [`CliError`] variant maps to a stable exit code via
/// [`CliError::exit_code`]:
///
/// - Exit code **2**: input failure. An input could not be read, parsed, or
///   decoded.
/// - Exit code **1**: logical failure. The arguments were unusable or a mining
///   run did not complete.
use std::fmt;
use std::path::PathBuf;

use vardiff_core::{DecodeError, MiningError, ParseError, SnapshotError, WorkerFailure};

// ---------------------------------------------------------------------------
// CliError
// ---------------------------------------------------------------------------

/// All error conditions that the `vardiff` CLI can produce.
#[derive(Debug)]
pub enum CliError {
    // --- Exit code 2: input failures ---
    /// A file argument could not be found on the filesystem.
    FileNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// The process lacks permission to read a file.
    PermissionDenied {
        /// The path that could not be read.
        path: PathBuf,
    },

    /// The input exceeds the configured `--max-file-size` limit.
    FileTooLarge {
        /// `"-"` for stdin, or the filesystem path.
        source: String,
        /// The configured size limit in bytes.
        limit: u64,
        /// The actual size in bytes; `None` for stdin.
        actual: Option<u64>,
    },

    /// The input bytes are not valid UTF-8.
    InvalidUtf8 {
        /// `"-"` for stdin, or the filesystem path.
        source: String,
        /// The byte offset of the first invalid byte sequence.
        byte_offset: usize,
    },

    /// An I/O error occurred while reading from stdin.
    StdinReadError {
        /// The underlying I/O error message.
        detail: String,
    },

    /// Any other I/O error.
    IoError {
        /// The file or stream involved.
        source: String,
        /// The underlying I/O error message.
        detail: String,
    },

    /// A patch could not be parsed into a diff tree.
    PatchParse {
        /// The patch source.
        source: String,
        /// Why parsing failed.
        error: ParseError,
    },

    /// A line-graph file could not be decoded.
    Decode {
        /// The line-graph source.
        source: String,
        /// Why decoding failed.
        error: DecodeError,
    },

    /// A metadata file is not a valid snapshot.
    Snapshot {
        /// The metadata file.
        source: String,
        /// Why it could not be read back.
        error: SnapshotError,
    },

    // --- Exit code 1: logical failures ---
    /// Arguments were syntactically valid but unusable.
    InvalidArgument {
        /// What was wrong.
        detail: String,
    },

    /// Classification of a tree failed.
    Classification {
        /// The failure reported by the matcher.
        detail: String,
    },

    /// A mining run could not start or write its total result.
    Mining(MiningError),

    /// A mining run was cancelled after worker failures.
    WorkersFailed {
        /// Failed batches.
        failures: Vec<WorkerFailure>,
        /// Batches that never started.
        skipped: usize,
    },
}

impl CliError {
    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::FileTooLarge { .. }
            | Self::InvalidUtf8 { .. }
            | Self::StdinReadError { .. }
            | Self::IoError { .. }
            | Self::PatchParse { .. }
            | Self::Decode { .. }
            | Self::Snapshot { .. } => 2,

            Self::InvalidArgument { .. }
            | Self::Classification { .. }
            | Self::Mining(_)
            | Self::WorkersFailed { .. } => 1,
        }
    }

    /// Returns a human-readable error message suitable for printing to stderr.
    pub fn message(&self) -> String {
        match self {
            Self::FileNotFound { path } => {
                format!("error: file not found: {}", path.display())
            }
            Self::PermissionDenied { path } => {
                format!("error: permission denied: {}", path.display())
            }
            Self::FileTooLarge {
                source,
                limit,
                actual: Some(actual),
            } => {
                format!("error: file too large: {source} is {actual} bytes, limit is {limit} bytes")
            }
            Self::FileTooLarge {
                source,
                limit,
                actual: None,
            } => {
                format!("error: file too large: {source} exceeded limit of {limit} bytes")
            }
            Self::InvalidUtf8 {
                source,
                byte_offset,
            } => {
                format!("error: invalid UTF-8 in {source}: first invalid byte at offset {byte_offset}")
            }
            Self::StdinReadError { detail } => {
                format!("error: failed to read stdin: {detail}")
            }
            Self::IoError { source, detail } => {
                format!("error: I/O error on {source}: {detail}")
            }
            Self::PatchParse { source, error } => {
                format!("error: cannot parse {source}: {error}")
            }
            Self::Decode { source, error } => {
                format!("error: cannot decode {source}: {error}")
            }
            Self::Snapshot { source, error } => {
                format!("error: invalid metadata in {source}: {error}")
            }
            Self::InvalidArgument { detail } => {
                format!("error: {detail}")
            }
            Self::Classification { detail } => {
                format!("error: classification failed: {detail}")
            }
            Self::Mining(e) => format!("error: {e}"),
            Self::WorkersFailed { failures, skipped } => {
                let mut msg = format!(
                    "error: mining aborted: {} batch(es) failed, {skipped} skipped",
                    failures.len()
                );
                for failure in failures {
                    msg.push_str(&format!("\n  batch {}: {}", failure.batch_id, failure.error));
                }
                msg
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CliError {}

impl From<MiningError> for CliError {
    fn from(e: MiningError) -> Self {
        Self::Mining(e)
    }
}
