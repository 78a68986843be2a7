//! Builds a [`DiffTree`] from the unified diff of one file.
//!
//! The parser keeps one stack of open scopes per side, each starting with
//! ROOT. Every line becomes a node attached under the current top of the
//! stacks of the sides it exists on:
//!
//! - `#if` is attached, then pushed.
//! - `#elif`/`#else` first pop the open branch, so all branches of one
//!   conditional are siblings under the same parent; the new branch is then
//!   attached and pushed.
//! - `#endif` is attached under the branch it closes, then pops it.
//! - everything else is a CODE leaf.
//!
//! Node ids are creation indices with ROOT as 0. Line ranges count diff
//! lines from 1, hunk headers included.

use std::fmt;

use crate::condition::{self, ConditionError};
use crate::enums::{CodeType, DiffType, GraphFormat, Side};
use crate::tree::{ConsistencyError, DiffNode, DiffTree, DiffTreeSource, HunkRange, LineRange, NodeIx};


// ---------------------------------------------------------------------------
// ParseError
// ---------------------------------------------------------------------------

/// Why a patch could not be turned into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// `#endif` without an open conditional.
    UnmatchedEndif {
        /// Diff line number.
        line: usize,
        /// Side on which nothing was open.
        side: Side,
    },
    /// `#elif` or `#else` without an open conditional.
    UnmatchedBranch {
        /// Diff line number.
        line: usize,
        /// Side on which nothing was open.
        side: Side,
        /// The offending directive.
        code_type: CodeType,
    },
    /// `#elif` or `#else` after `#else`.
    BranchAfterElse {
        /// Diff line number.
        line: usize,
        /// Side of the conflict.
        side: Side,
    },
    /// Input ended with an open conditional.
    UnclosedConditional {
        /// Diff line number of the innermost unclosed directive.
        line: usize,
        /// Side left open.
        side: Side,
    },
    /// A continued directive line was followed by a line of another diff
    /// type.
    MixedContinuation {
        /// Diff line number of the continuation line.
        line: usize,
    },
    /// A guard expression could not be parsed.
    MalformedCondition {
        /// Diff line number of the directive.
        line: usize,
        /// Underlying failure.
        error: ConditionError,
    },
    /// The built tree violates an invariant.
    Inconsistent(ConsistencyError),
}

impl ParseError {
    /// Stable short name used as a diagnostics tally key.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnmatchedEndif { .. } => "unmatched_endif",
            Self::UnmatchedBranch { .. } => "unmatched_branch",
            Self::BranchAfterElse { .. } => "branch_after_else",
            Self::UnclosedConditional { .. } => "unclosed_conditional",
            Self::MixedContinuation { .. } => "mixed_continuation",
            Self::MalformedCondition { .. } => "malformed_condition",
            Self::Inconsistent(_) => "inconsistent",
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedEndif { line, side } => {
                write!(f, "line {line}: #endif without open conditional {side} the edit")
            }
            Self::UnmatchedBranch {
                line,
                side,
                code_type,
            } => write!(
                f,
                "line {line}: {code_type} without open conditional {side} the edit"
            ),
            Self::BranchAfterElse { line, side } => {
                write!(f, "line {line}: branch follows #else {side} the edit")
            }
            Self::UnclosedConditional { line, side } => {
                write!(f, "line {line}: conditional is never closed {side} the edit")
            }
            Self::MixedContinuation { line } => {
                write!(f, "line {line}: continued directive changes diff type")
            }
            Self::MalformedCondition { line, error } => write!(f, "line {line}: {error}"),
            Self::Inconsistent(err) => write!(f, "inconsistent tree: {err}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedCondition { error, .. } => Some(error),
            Self::Inconsistent(err) => Some(err),
            Self::UnmatchedEndif { .. }
            | Self::UnmatchedBranch { .. }
            | Self::BranchAfterElse { .. }
            | Self::UnclosedConditional { .. }
            | Self::MixedContinuation { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// File-level header lines that may precede the first hunk.
const HEADER_PREFIXES: [&str; 14] = [
    "diff ",
    "index ",
    "--- ",
    "+++ ",
    "new file mode",
    "deleted file mode",
    "old mode",
    "new mode",
    "similarity index",
    "dissimilarity index",
    "rename from",
    "rename to",
    "copy from",
    "copy to",
];

/// Open scopes per side. ROOT is never popped.
struct ScopeStacks {
    root: NodeIx,
    before: Vec<NodeIx>,
    after: Vec<NodeIx>,
}

impl ScopeStacks {
    fn new(root: NodeIx) -> Self {
        Self {
            root,
            before: vec![root],
            after: vec![root],
        }
    }

    fn get(&mut self, side: Side) -> &mut Vec<NodeIx> {
        match side {
            Side::Before => &mut self.before,
            Side::After => &mut self.after,
        }
    }

    fn top(&mut self, side: Side) -> NodeIx {
        let root = self.root;
        self.get(side).last().copied().unwrap_or(root)
    }

    fn has_open_scope(&mut self, side: Side) -> bool {
        self.get(side).len() > 1
    }
}

/// Parses the unified diff of one file.
///
/// Hunk headers (`@@ ... @@`), `\ No newline at end of file` markers, and
/// file headers before the first hunk are skipped.
///
/// # Errors
///
/// Returns [`ParseError`] when conditional nesting is unbalanced on either
/// side, a guard cannot be parsed, or a continued directive mixes diff types.
pub fn parse_patch(text: &str, source: DiffTreeSource) -> Result<DiffTree, ParseError> {
    let mut tree = DiffTree::empty(GraphFormat::Tree, source);
    let root = tree.add_node(DiffNode::new(0, CodeType::Root, DiffType::Non, ""));
    let mut stacks = ScopeStacks::new(root);
    let mut hunk: Option<HunkRange> = None;

    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line_no = i + 1;
        let raw = lines[i];
        i += 1;

        if raw.starts_with("@@") {
            if let Some(range) = parse_hunk_header(raw) {
                hunk = Some(hunk.map_or(range, |h| h.cover(range)));
            }
            continue;
        }
        if raw.starts_with('\\') {
            continue;
        }
        if hunk.is_none() && HEADER_PREFIXES.iter().any(|p| raw.starts_with(p)) {
            continue;
        }

        let (diff_type, content) = split_marker(raw);
        let mut text = content.to_owned();
        let mut last_line = line_no;
        if condition::is_directive(content) {
            while let Some(head) = text.trim_end().strip_suffix('\\') {
                let Some(next) = lines.get(i) else {
                    break;
                };
                let (next_type, next_content) = split_marker(next);
                if next_type != diff_type {
                    return Err(ParseError::MixedContinuation { line: i + 1 });
                }
                text = format!("{head} {}", next_content.trim_start());
                i += 1;
                last_line = i;
            }
        }

        let range = LineRange {
            from: line_no,
            to: last_line,
        };
        let directive = condition::parse_directive(&text)
            .map_err(|error| ParseError::MalformedCondition {
                line: line_no,
                error,
            })?;

        let id = tree.len();
        match directive {
            None => {
                let mut node = DiffNode::new(id, CodeType::Code, diff_type, text);
                node.lines = range;
                let ix = tree.add_node(node);
                attach(&mut tree, &mut stacks, ix, diff_type)?;
            }
            Some(directive) => {
                let code_type = directive.code_type;
                match code_type {
                    CodeType::Elif | CodeType::Else => {
                        for side in diff_type.sides() {
                            close_branch(&tree, &mut stacks, side, line_no, code_type)?;
                        }
                    }
                    CodeType::Endif => {
                        for side in diff_type.sides() {
                            if !stacks.has_open_scope(side) {
                                return Err(ParseError::UnmatchedEndif {
                                    line: line_no,
                                    side,
                                });
                            }
                        }
                    }
                    CodeType::If | CodeType::Root | CodeType::Code => {}
                }

                let (label, condition) = match directive.guard {
                    Some(guard) => (guard.label, Some(guard.formula)),
                    None => (String::new(), None),
                };
                let mut node = DiffNode::new(id, code_type, diff_type, label);
                node.condition = condition;
                node.lines = range;
                let ix = tree.add_node(node);
                attach(&mut tree, &mut stacks, ix, diff_type)?;

                for side in diff_type.sides() {
                    if code_type == CodeType::Endif {
                        stacks.get(side).pop();
                    } else {
                        stacks.get(side).push(ix);
                    }
                }
            }
        }
    }

    for side in Side::ALL {
        if stacks.has_open_scope(side) {
            let open = stacks.top(side);
            return Err(ParseError::UnclosedConditional {
                line: tree.node(open).lines.from,
                side,
            });
        }
    }

    tree.source.hunk = hunk;
    tree.check_consistency().map_err(ParseError::Inconsistent)?;
    Ok(tree)
}

/// Splits a diff line into its diff type and content.
fn split_marker(raw: &str) -> (DiffType, &str) {
    let mut chars = raw.chars();
    match chars.next() {
        Some(marker) => (DiffType::from_marker(marker), chars.as_str()),
        None => (DiffType::Non, ""),
    }
}

fn attach(
    tree: &mut DiffTree,
    stacks: &mut ScopeStacks,
    ix: NodeIx,
    diff_type: DiffType,
) -> Result<(), ParseError> {
    for side in diff_type.sides() {
        let parent = stacks.top(side);
        tree.link(parent, ix, side).map_err(ParseError::Inconsistent)?;
    }
    Ok(())
}

/// Pops the open IF or ELIF branch on `side` before a sibling branch opens.
fn close_branch(
    tree: &DiffTree,
    stacks: &mut ScopeStacks,
    side: Side,
    line: usize,
    code_type: CodeType,
) -> Result<(), ParseError> {
    let top = stacks.top(side);
    match tree.node(top).code_type {
        CodeType::If | CodeType::Elif => {
            stacks.get(side).pop();
            Ok(())
        }
        CodeType::Else => Err(ParseError::BranchAfterElse { line, side }),
        CodeType::Root | CodeType::Endif | CodeType::Code => Err(ParseError::UnmatchedBranch {
            line,
            side,
            code_type,
        }),
    }
}

/// Extracts the range of a `@@ -a,b +c,d @@` hunk header.
pub fn parse_hunk_header(line: &str) -> Option<HunkRange> {
    let body = line.strip_prefix("@@")?;
    let end = body.find("@@")?;
    body[..end].trim().parse().ok()
}
