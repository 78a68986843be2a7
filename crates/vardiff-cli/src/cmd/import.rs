//! Implementation of `vardiff import <LINEGRAPH>`.
//!
//! Decodes a line-graph file and prints node and edge counts per tree. A
//! decode error anywhere in the input fails the whole command.
//!
//! Exit codes: 0 = success, 2 = unreadable or malformed line graph.
use serde::Serialize;
use vardiff_core::{DiffTree, LineGraphOptions, Side, import};

use crate::OutputFormat;
use crate::cli::LineGraphArgs;
use crate::cmd::{line_graph_options, write_json, write_stdout};
use crate::error::CliError;

/// Counts of one decoded tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    /// Tree label as written in the header.
    pub label: String,
    /// Number of nodes.
    pub nodes: usize,
    /// Number of edge lines: one per shared parent, else one per side.
    pub edges: usize,
}

impl TreeStats {
    /// Computes the counts of `tree`.
    pub fn of(tree: &DiffTree, options: &LineGraphOptions) -> Self {
        let mut edges = 0;
        for (_, node) in tree.iter() {
            let before = node.parent(Side::Before);
            let after = node.parent(Side::After);
            edges += match (before, after) {
                (Some(b), Some(a)) if a == b => 1,
                (before, after) => usize::from(before.is_some()) + usize::from(after.is_some()),
            };
        }
        Self {
            label: options.tree_format.to_label(&tree.source),
            nodes: tree.len(),
            edges,
        }
    }
}

#[derive(Debug, Serialize)]
struct ImportReport<'a> {
    source: &'a str,
    trees: &'a [TreeStats],
}

/// Runs the `import` command.
///
/// # Errors
///
/// Returns [`CliError::Decode`] if the line graph is malformed.
pub fn run(content: &str, source: &str, args: &LineGraphArgs, format: OutputFormat) -> Result<(), CliError> {
    let options = line_graph_options(args);
    let trees = import(content, &options).map_err(|error| CliError::Decode {
        source: source.to_owned(),
        error,
    })?;
    let stats: Vec<TreeStats> = trees.iter().map(|t| TreeStats::of(t, &options)).collect();

    match format {
        OutputFormat::Human => {
            let mut out = format!("trees: {}\n", stats.len());
            for s in &stats {
                out.push_str(&format!("  {}: {} nodes, {} edges\n", s.label, s.nodes, s.edges));
            }
            write_stdout(&out)
        }
        OutputFormat::Json => write_json(&ImportReport {
            source,
            trees: &stats,
        }),
    }
}
