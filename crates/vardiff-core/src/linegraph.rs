//! Line-graph codec: a line-oriented text format for batches of diff trees.
//!
//! ```text
//! t # <tree label>
//! v <node id> <node label>
//! e <child id> <parent id> <role>
//! ```
//!
//! Trees are separated by a blank line. `role` is one of [`ROLE_BOTH`],
//! [`ROLE_BEFORE`], [`ROLE_AFTER`]. How node and tree labels are written is
//! pluggable through [`NodeLabelFormat`] and [`TreeLabelFormat`].

use std::fmt;
use std::sync::Arc;

use crate::condition;
use crate::enums::{CodeType, DiffType, GraphFormat};
use crate::tree::{ConsistencyError, DiffNode, DiffTreeSource, HunkRange};

pub mod export;
pub mod import;


pub use export::{export_tree, export_trees, write_tree};
pub use import::import;

/// Prefix of a tree header line.
pub const TREE_HEADER: &str = "t #";
/// Prefix of a node line.
pub const NODE_PREFIX: &str = "v ";
/// Prefix of an edge line.
pub const EDGE_PREFIX: &str = "e ";
/// Edge present in the before- and after-tree.
pub const ROLE_BOTH: &str = "both";
/// Edge present only in the before-tree.
pub const ROLE_BEFORE: &str = "before-only";
/// Edge present only in the after-tree.
pub const ROLE_AFTER: &str = "after-only";

/// Separator of the fields of a [`CommitDiffTreeFormat`] label.
const SOURCE_SEPARATOR: &str = "$$$";

// ---------------------------------------------------------------------------
// Label formats
// ---------------------------------------------------------------------------

/// Encodes and decodes the `<node label>` field of node lines.
pub trait NodeLabelFormat: Send + Sync + fmt::Debug {
    /// Short name, used on the command line.
    fn name(&self) -> &'static str;

    /// Writes the label of `node`.
    fn to_label(&self, node: &DiffNode) -> String;

    /// Rebuilds an unlinked node from its id and label.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the label is malformed.
    fn from_label(&self, id: usize, label: &str) -> Result<DiffNode, String>;
}

/// `<diffType>_<codeType>[_<label>]`, e.g. `ADD_IF_defined(A)` or
/// `NON_CODE_return 0;`. Lossless for node content.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabeledNodeFormat;

/// `<diffType>_<codeType>` only. Guards and source text are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeOnlyNodeFormat;

fn parse_types(diff: Option<&str>, code: Option<&str>) -> Result<(DiffType, CodeType), String> {
    let diff = diff.unwrap_or("");
    let code = code.unwrap_or("");
    let diff_type =
        DiffType::from_token(diff).ok_or_else(|| format!("unknown diff type \"{diff}\""))?;
    let code_type =
        CodeType::from_token(code).ok_or_else(|| format!("unknown code type \"{code}\""))?;
    Ok((diff_type, code_type))
}

impl NodeLabelFormat for LabeledNodeFormat {
    fn name(&self) -> &'static str {
        "labeled"
    }

    fn to_label(&self, node: &DiffNode) -> String {
        if node.label.is_empty() {
            format!("{}_{}", node.diff_type, node.code_type)
        } else {
            format!("{}_{}_{}", node.diff_type, node.code_type, node.label)
        }
    }

    fn from_label(&self, id: usize, label: &str) -> Result<DiffNode, String> {
        let mut parts = label.splitn(3, '_');
        let (diff_type, code_type) = parse_types(parts.next(), parts.next())?;
        let text = parts.next().unwrap_or("");
        let mut node = DiffNode::new(id, code_type, diff_type, text);
        if code_type.has_guard() && !text.is_empty() {
            let guard = condition::parse_condition(text).map_err(|e| e.to_string())?;
            node.condition = Some(guard.formula);
        }
        Ok(node)
    }
}

impl NodeLabelFormat for TypeOnlyNodeFormat {
    fn name(&self) -> &'static str {
        "type"
    }

    fn to_label(&self, node: &DiffNode) -> String {
        format!("{}_{}", node.diff_type, node.code_type)
    }

    fn from_label(&self, id: usize, label: &str) -> Result<DiffNode, String> {
        let mut parts = label.splitn(3, '_');
        let (diff_type, code_type) = parse_types(parts.next(), parts.next())?;
        Ok(DiffNode::new(id, code_type, diff_type, ""))
    }
}

/// Encodes and decodes the `<tree label>` field of tree headers.
pub trait TreeLabelFormat: Send + Sync + fmt::Debug {
    /// Writes the label for `source`.
    fn to_label(&self, source: &DiffTreeSource) -> String;

    /// Reads a label back. Labels are free text, so this never fails; fields
    /// that cannot be recovered are left empty.
    fn from_label(&self, label: &str) -> DiffTreeSource;
}

/// `<path>$$$<commit>[$$$<hunk range>]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitDiffTreeFormat;

impl TreeLabelFormat for CommitDiffTreeFormat {
    fn to_label(&self, source: &DiffTreeSource) -> String {
        match source.hunk {
            Some(hunk) => format!(
                "{}{SOURCE_SEPARATOR}{}{SOURCE_SEPARATOR}{hunk}",
                source.path, source.commit
            ),
            None => format!("{}{SOURCE_SEPARATOR}{}", source.path, source.commit),
        }
    }

    fn from_label(&self, label: &str) -> DiffTreeSource {
        let mut parts = label.splitn(3, SOURCE_SEPARATOR);
        let path = parts.next().unwrap_or("");
        let commit = parts.next().unwrap_or("");
        let hunk = parts.next().and_then(|h| h.parse::<HunkRange>().ok());
        DiffTreeSource {
            path: path.to_owned(),
            commit: commit.to_owned(),
            hunk,
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Settings shared by writer and reader.
#[derive(Debug, Clone)]
pub struct LineGraphOptions {
    /// Shape expected on import and produced by the mining exporter.
    pub graph_format: GraphFormat,
    /// Node label encoding.
    pub node_format: Arc<dyn NodeLabelFormat>,
    /// Tree label encoding.
    pub tree_format: Arc<dyn TreeLabelFormat>,
}

impl Default for LineGraphOptions {
    fn default() -> Self {
        Self {
            graph_format: GraphFormat::Tree,
            node_format: Arc::new(LabeledNodeFormat),
            tree_format: Arc::new(CommitDiffTreeFormat),
        }
    }
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Malformed line-graph input. Any of these aborts the whole import.
///
/// `line` is the 1-based input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A node or edge line appeared before any tree header.
    MissingTreeHeader {
        /// Input line.
        line: usize,
    },
    /// A node id is not a non-negative integer.
    InvalidNodeId {
        /// Input line.
        line: usize,
        /// The offending text.
        text: String,
    },
    /// The node label format rejected a label.
    InvalidNodeLabel {
        /// Input line.
        line: usize,
        /// Reason given by the format.
        reason: String,
    },
    /// A node id was declared twice in one tree section.
    DuplicateNodeId {
        /// Input line.
        line: usize,
        /// The repeated id.
        id: usize,
    },
    /// An edge references an id not declared in the current section.
    UnknownNode {
        /// Input line.
        line: usize,
        /// The undeclared id.
        id: usize,
    },
    /// An edge's role is not one of the three role tokens.
    InvalidRole {
        /// Input line.
        line: usize,
        /// The offending token.
        role: String,
    },
    /// An edge line does not have exactly three fields.
    MalformedEdge {
        /// Input line.
        line: usize,
    },
    /// An edge cannot be added without breaking the tree structure.
    InvalidEdge {
        /// Input line.
        line: usize,
        /// The violated invariant.
        error: ConsistencyError,
    },
    /// A non-blank line that is neither header, node, nor edge.
    UnrecognizedLine {
        /// Input line.
        line: usize,
        /// The line text.
        text: String,
    },
    /// A completed section violates the invariants of the configured format.
    InvalidTree {
        /// Line of the section's tree header.
        line: usize,
        /// The violated invariant.
        error: ConsistencyError,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTreeHeader { line } => {
                write!(f, "line {line}: expected \"{TREE_HEADER}\" before nodes and edges")
            }
            Self::InvalidNodeId { line, text } => {
                write!(f, "line {line}: node id \"{text}\" is not an integer")
            }
            Self::InvalidNodeLabel { line, reason } => {
                write!(f, "line {line}: invalid node label: {reason}")
            }
            Self::DuplicateNodeId { line, id } => {
                write!(f, "line {line}: node {id} is declared twice")
            }
            Self::UnknownNode { line, id } => {
                write!(f, "line {line}: node {id} does not exist in this tree")
            }
            Self::InvalidRole { line, role } => write!(
                f,
                "line {line}: invalid edge role \"{role}\", expected {ROLE_BOTH}, {ROLE_BEFORE} or {ROLE_AFTER}"
            ),
            Self::MalformedEdge { line } => {
                write!(f, "line {line}: expected \"e <child> <parent> <role>\"")
            }
            Self::InvalidEdge { line, error } => write!(f, "line {line}: {error}"),
            Self::UnrecognizedLine { line, text } => write!(
                f,
                "line {line}: expected a tree, node, edge, or blank line, found \"{text}\""
            ),
            Self::InvalidTree { line, error } => {
                write!(f, "tree starting at line {line}: {error}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}
