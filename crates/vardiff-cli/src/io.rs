/// File and stdin reading with size enforcement and UTF-8 validation.
///
/// `vardiff-core` never touches the filesystem; the CLI's inputs are read
/// here. Disk files are size-checked via metadata before any read, stdin is
/// read through a `Read::take` cap, and every failure becomes a [`CliError`]
/// with exit code 2.
use std::io::Read as _;
use std::path::Path;

use crate::PathOrStdin;
use crate::error::CliError;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reads the entire contents of `source` into a `String`.
///
/// # Errors
///
/// Returns [`CliError`] (exit code 2) if the input is missing, unreadable,
/// larger than `max_size`, or not UTF-8.
pub fn read_input(source: &PathOrStdin, max_size: u64) -> Result<String, CliError> {
    match source {
        PathOrStdin::Path(path) => read_file(path, max_size),
        PathOrStdin::Stdin => read_stdin(max_size),
    }
}

/// Reads a disk file, enforcing the size limit and UTF-8 requirement.
///
/// # Errors
///
/// See [`read_input`].
pub fn read_file(path: &Path, max_size: u64) -> Result<String, CliError> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| io_error_to_cli(&e, path))?
        .len();
    if file_size > max_size {
        return Err(CliError::FileTooLarge {
            source: path.display().to_string(),
            limit: max_size,
            actual: Some(file_size),
        });
    }
    let bytes = std::fs::read(path).map_err(|e| io_error_to_cli(&e, path))?;
    bytes_to_string(bytes, &path.display().to_string())
}

/// Maps a `std::io::Error` from a disk-file operation to a [`CliError`].
pub fn io_error_to_cli(e: &std::io::Error, path: &Path) -> CliError {
    let kind = e.kind();
    if kind == std::io::ErrorKind::NotFound {
        CliError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else if kind == std::io::ErrorKind::PermissionDenied {
        CliError::PermissionDenied {
            path: path.to_path_buf(),
        }
    } else {
        CliError::IoError {
            source: path.display().to_string(),
            detail: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stdin
// ---------------------------------------------------------------------------

/// Reads stdin, capped at `max_size` bytes plus one extra byte to tell
/// "exactly at the limit" from "over the limit".
fn read_stdin(max_size: u64) -> Result<String, CliError> {
    let stdin = std::io::stdin();
    let mut limited = stdin.lock().take(max_size.saturating_add(1));
    let mut buf: Vec<u8> = Vec::new();
    limited
        .read_to_end(&mut buf)
        .map_err(|e| CliError::StdinReadError {
            detail: e.to_string(),
        })?;
    if buf.len() as u64 > max_size {
        return Err(CliError::FileTooLarge {
            source: "-".to_owned(),
            limit: max_size,
            actual: None,
        });
    }
    bytes_to_string(buf, "-")
}

fn bytes_to_string(bytes: Vec<u8>, source_label: &str) -> Result<String, CliError> {
    String::from_utf8(bytes).map_err(|e| CliError::InvalidUtf8 {
        source: source_label.to_owned(),
        byte_offset: e.utf8_error().valid_up_to(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::wildcard_enum_match_arm)]

    use std::io::Write as _;

    use super::*;

    fn temp_file_with(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("create temp file");
        f.write_all(contents).expect("write temp file");
        f
    }

    #[test]
    fn read_file_exactly_at_limit_succeeds() {
        let f = temp_file_with(b"#if A");
        let text = read_file(f.path(), 5).expect("read at limit");
        assert_eq!(text, "#if A");
    }

    #[test]
    fn read_file_over_limit_is_an_input_failure() {
        let f = temp_file_with(b"#if A\n#endif\n");
        let err = read_file(f.path(), 5).expect_err("over limit");
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("too large"), "{}", err.message());
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.diff");
        let err = read_input(&PathOrStdin::Path(path.clone()), 1024).expect_err("missing");
        assert!(matches!(err, CliError::FileNotFound { path: p } if p == path));
    }

    #[test]
    fn invalid_utf8_reports_offset() {
        let f = temp_file_with(b"ab\xffcd");
        let err = read_file(f.path(), 1024).expect_err("bad utf-8");
        assert!(matches!(err, CliError::InvalidUtf8 { byte_offset: 2, .. }));
    }
}
