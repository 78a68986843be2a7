//! Implementation of `vardiff summarize <METADATA>...`.
//!
//! Reads metadata snapshots written by `vardiff mine`, combines them, and
//! prints the combined snapshot. Combining is order-independent, so batch
//! files can be given in any order.
use std::path::PathBuf;

use vardiff_core::MiningResult;

use crate::OutputFormat;
use crate::cmd::{write_json, write_stdout};
use crate::error::CliError;
use crate::io;

/// Reads and combines the snapshots in `files`.
///
/// # Errors
///
/// Returns [`CliError`] (exit code 2) if a file is unreadable or not a
/// valid snapshot.
pub fn combine(files: &[PathBuf], max_file_size: u64) -> Result<MiningResult, CliError> {
    let mut total = MiningResult::new();
    for path in files {
        let text = io::read_file(path, max_file_size)?;
        let result = MiningResult::from_snapshot(&text).map_err(|error| CliError::Snapshot {
            source: path.display().to_string(),
            error,
        })?;
        total.append(&result);
    }
    Ok(total)
}

/// Runs the `summarize` command.
///
/// # Errors
///
/// See [`combine`].
pub fn run(files: &[PathBuf], max_file_size: u64, format: OutputFormat) -> Result<(), CliError> {
    let total = combine(files, max_file_size)?;
    match format {
        OutputFormat::Human => write_stdout(&total.to_snapshot()),
        OutputFormat::Json => write_json(&total),
    }
}
