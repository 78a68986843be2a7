//! Implementation of `vardiff parse <PATCH>`.
//!
//! Parses a unified diff of one file into a diff tree and prints it as a line
//! graph. In `--format json` mode the line graph is wrapped in an object with
//! the node count.
//!
//! Exit codes: 0 = success, 2 = unreadable or malformed patch.
use serde::Serialize;
use vardiff_core::{GraphFormat, export_tree};

use crate::OutputFormat;
use crate::cli::LineGraphArgs;
use crate::cmd::{line_graph_options, parse_input, write_json, write_stdout};
use crate::error::CliError;

/// JSON output of `parse`.
#[derive(Debug, Serialize)]
struct ParseReport<'a> {
    source: &'a str,
    nodes: usize,
    line_graph: &'a str,
}

/// Runs the `parse` command.
///
/// # Errors
///
/// Returns [`CliError::PatchParse`] if the patch is malformed.
pub fn run(content: &str, source: &str, args: &LineGraphArgs, format: OutputFormat) -> Result<(), CliError> {
    let options = line_graph_options(args);
    let mut tree = parse_input(content, source)?;
    if options.graph_format == GraphFormat::Graph {
        tree = tree.into_graph_format();
    }
    let line_graph = export_tree(&tree, &options);

    match format {
        OutputFormat::Human => write_stdout(&line_graph),
        OutputFormat::Json => write_json(&ParseReport {
            source,
            nodes: tree.len(),
            line_graph: &line_graph,
        }),
    }
}
