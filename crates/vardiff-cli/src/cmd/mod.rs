/// Command modules for the `vardiff` CLI.
///
/// Each submodule implements one subcommand with a `run` function returning
/// `Ok(())` on success or a [`crate::error::CliError`] on failure. Helpers
/// shared by several commands live here.
use std::io::Write as _;
use std::sync::Arc;

use serde::Serialize;
use vardiff_core::{
    DiffTree, DiffTreeSource, GraphFormat, LabeledNodeFormat, LineGraphOptions, TypeOnlyNodeFormat,
    parse_patch,
};

use crate::cli::{GraphFormatArg, LineGraphArgs, NodeFormatArg};
use crate::error::CliError;

pub mod classify;
pub mod import;
pub mod mine;
pub mod parse;
pub mod summarize;

/// Maps line-graph flags onto codec options.
pub fn line_graph_options(args: &LineGraphArgs) -> LineGraphOptions {
    let mut options = LineGraphOptions {
        graph_format: match args.graph_format {
            GraphFormatArg::Tree => GraphFormat::Tree,
            GraphFormatArg::Graph => GraphFormat::Graph,
        },
        ..LineGraphOptions::default()
    };
    match args.node_format {
        NodeFormatArg::Labeled => options.node_format = Arc::new(LabeledNodeFormat),
        NodeFormatArg::Type => options.node_format = Arc::new(TypeOnlyNodeFormat),
    }
    options
}

/// Parses a single-file patch read from `source`.
///
/// # Errors
///
/// Returns [`CliError::PatchParse`] (exit code 2) on malformed input.
pub fn parse_input(content: &str, source: &str) -> Result<DiffTree, CliError> {
    parse_patch(content, DiffTreeSource::new(source, "")).map_err(|error| CliError::PatchParse {
        source: source.to_owned(),
        error,
    })
}

/// Writes `text` to stdout.
///
/// # Errors
///
/// Returns [`CliError::IoError`] if stdout is closed.
pub fn write_stdout(text: &str) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| CliError::IoError {
            source: "stdout".to_owned(),
            detail: e.to_string(),
        })
}

/// Writes `value` to stdout as pretty-printed JSON followed by a newline.
///
/// # Errors
///
/// Returns [`CliError::IoError`] if serialization or writing fails.
pub fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let mut text = serde_json::to_string_pretty(value).map_err(|e| CliError::IoError {
        source: "stdout".to_owned(),
        detail: e.to_string(),
    })?;
    text.push('\n');
    write_stdout(&text)
}
