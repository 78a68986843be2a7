//! Implementation of `vardiff classify <PATCH>`.
//!
//! Prints one line per artifact: its id, the matched edit pattern, and the
//! presence conditions before and after the edit (`-` where the artifact
//! does not exist). With `--semantic`, matches of semantic patterns follow,
//! one line per anchoring directive.
use serde::Serialize;
use vardiff_core::{
    Catalog, DiffTree, FeatureContext, MatchContext, PatternMatch, SemanticCatalog, SemanticMatch,
    Side, TruthTableOracle,
};

use crate::OutputFormat;
use crate::cmd::{parse_input, write_json, write_stdout};
use crate::error::CliError;

/// Classification of one artifact.
pub struct ArtifactRow {
    /// Pattern match of the artifact.
    pub matched: PatternMatch,
    /// Source text of the artifact.
    pub label: String,
    /// Presence condition before the edit.
    pub before: Option<String>,
    /// Presence condition after the edit.
    pub after: Option<String>,
}

#[derive(Debug, Serialize)]
struct ArtifactRecord<'a> {
    id: usize,
    pattern: &'static str,
    label: &'a str,
    before: Option<&'a str>,
    after: Option<&'a str>,
    features: Option<&'a FeatureContext>,
}

impl<'a> From<&'a ArtifactRow> for ArtifactRecord<'a> {
    fn from(row: &'a ArtifactRow) -> Self {
        Self {
            id: row.matched.node_id,
            pattern: row.matched.pattern,
            label: &row.label,
            before: row.before.as_deref(),
            after: row.after.as_deref(),
            features: row.matched.features.as_ref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ClassifyReport<'a> {
    source: &'a str,
    artifacts: Vec<ArtifactRecord<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    semantic: Option<&'a [SemanticMatch]>,
}

/// Classifies every artifact of `tree` with the elementary catalog.
///
/// # Errors
///
/// Returns [`CliError::Classification`] if a presence condition or pattern
/// cannot be computed.
pub fn classify(tree: &DiffTree) -> Result<Vec<ArtifactRow>, CliError> {
    let oracle = TruthTableOracle::default();
    let catalog = Catalog::elementary();
    let mut ctx = MatchContext::new(tree, &oracle);
    let mut rows = Vec::new();
    for ix in tree.code_nodes() {
        let matched = catalog.classify(&mut ctx, ix).map_err(|e| CliError::Classification {
            detail: e.to_string(),
        })?;
        let node = tree.node(ix);
        let mut pcs = [None, None];
        for (slot, side) in pcs.iter_mut().zip(Side::ALL) {
            if node.exists_on(side) {
                let pc = ctx.pc(ix, side).map_err(|e| CliError::Classification {
                    detail: e.to_string(),
                })?;
                *slot = Some(pc.to_string());
            }
        }
        let [before, after] = pcs;
        rows.push(ArtifactRow {
            matched,
            label: node.label.clone(),
            before,
            after,
        });
    }
    Ok(rows)
}

/// Finds semantic pattern matches in `tree`.
///
/// # Errors
///
/// Returns [`CliError::Classification`] if a rule cannot be evaluated.
pub fn semantic_matches(tree: &DiffTree) -> Result<Vec<SemanticMatch>, CliError> {
    SemanticCatalog::standard()
        .find_all(tree, &TruthTableOracle::default())
        .map_err(|e| CliError::Classification {
            detail: e.to_string(),
        })
}

/// Runs the `classify` command.
///
/// # Errors
///
/// Returns [`CliError::PatchParse`] for malformed patches and
/// [`CliError::Classification`] when matching fails.
pub fn run(content: &str, source: &str, semantic: bool, format: OutputFormat) -> Result<(), CliError> {
    let tree = parse_input(content, source)?;
    let rows = classify(&tree)?;
    let semantic = if semantic {
        Some(semantic_matches(&tree)?)
    } else {
        None
    };
    match format {
        OutputFormat::Human => {
            let mut out = render_human(&rows);
            for m in semantic.iter().flatten() {
                out.push_str(&render_semantic(m));
            }
            write_stdout(&out)
        }
        OutputFormat::Json => write_json(&ClassifyReport {
            source,
            artifacts: rows.iter().map(ArtifactRecord::from).collect(),
            semantic: semantic.as_deref(),
        }),
    }
}

fn render_semantic(m: &SemanticMatch) -> String {
    format!(
        "{:>4}  {:<16} lines {}-{}\n",
        m.node_id, m.pattern, m.lines.from, m.lines.to
    )
}

fn render_human(rows: &[ArtifactRow]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!(
            "{:>4}  {:<16} before: {:<24} after: {:<24} {}\n",
            row.matched.node_id,
            row.matched.pattern,
            row.before.as_deref().unwrap_or("-"),
            row.after.as_deref().unwrap_or("-"),
            row.label.trim(),
        ));
    }
    out
}
