//! Closed vocabularies shared across the crate: node kinds, diff types,
//! tree sides, graph formats, and file change types.
//!
//! Every enum carries a fixed upper-case token used by the line-graph codec
//! and the metadata snapshot. Tokens are part of the persisted format and must
//! not change.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CodeType
// ---------------------------------------------------------------------------

/// The syntactic kind of a [`crate::tree::DiffNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeType {
    /// The synthetic root of a tree-format [`crate::tree::DiffTree`].
    Root,
    /// `#if`, `#ifdef`, `#ifndef`.
    If,
    /// `#elif`, `#elifdef`, `#elifndef`.
    Elif,
    /// `#else`.
    Else,
    /// `#endif`.
    Endif,
    /// Any line that is not a conditional directive.
    Code,
}

impl CodeType {
    /// All variants in declaration order.
    pub const ALL: [CodeType; 6] = [
        CodeType::Root,
        CodeType::If,
        CodeType::Elif,
        CodeType::Else,
        CodeType::Endif,
        CodeType::Code,
    ];

    /// Returns the persisted token for this code type.
    pub fn token(self) -> &'static str {
        match self {
            CodeType::Root => "ROOT",
            CodeType::If => "IF",
            CodeType::Elif => "ELIF",
            CodeType::Else => "ELSE",
            CodeType::Endif => "ENDIF",
            CodeType::Code => "CODE",
        }
    }

    /// Parses a persisted token. Matching is case-sensitive.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.token() == token)
    }

    /// Returns `true` for kinds that may own children: ROOT and the three
    /// branch directives.
    pub fn is_scope(self) -> bool {
        match self {
            CodeType::Root | CodeType::If | CodeType::Elif | CodeType::Else => true,
            CodeType::Endif | CodeType::Code => false,
        }
    }

    /// Returns `true` for directives that carry a guard expression.
    pub fn has_guard(self) -> bool {
        match self {
            CodeType::If | CodeType::Elif => true,
            CodeType::Root | CodeType::Else | CodeType::Endif | CodeType::Code => false,
        }
    }

    /// Returns `true` for any preprocessor directive kind.
    pub fn is_directive(self) -> bool {
        match self {
            CodeType::If | CodeType::Elif | CodeType::Else | CodeType::Endif => true,
            CodeType::Root | CodeType::Code => false,
        }
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// ---------------------------------------------------------------------------
// DiffType
// ---------------------------------------------------------------------------

/// Whether a node was added, removed, or left unchanged by the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffType {
    /// Present only after the edit (`+` marker).
    Add,
    /// Present only before the edit (`-` marker).
    Rem,
    /// Present on both sides (context line).
    Non,
}

impl DiffType {
    /// All variants in declaration order.
    pub const ALL: [DiffType; 3] = [DiffType::Add, DiffType::Rem, DiffType::Non];

    /// Returns the persisted token for this diff type.
    pub fn token(self) -> &'static str {
        match self {
            DiffType::Add => "ADD",
            DiffType::Rem => "REM",
            DiffType::Non => "NON",
        }
    }

    /// Parses a persisted token.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.token() == token)
    }

    /// Maps a unified-diff line marker to a diff type.
    ///
    /// `+` and `-` map to [`DiffType::Add`] and [`DiffType::Rem`]; every
    /// other leading character is treated as context.
    pub fn from_marker(marker: char) -> Self {
        match marker {
            '+' => DiffType::Add,
            '-' => DiffType::Rem,
            _ => DiffType::Non,
        }
    }

    /// Returns `true` if a node of this diff type exists on `side`.
    pub fn exists_on(self, side: Side) -> bool {
        match (self, side) {
            (DiffType::Non, Side::Before | Side::After) => true,
            (DiffType::Add, Side::After) | (DiffType::Rem, Side::Before) => true,
            (DiffType::Add, Side::Before) | (DiffType::Rem, Side::After) => false,
        }
    }

    /// Returns the sides on which a node of this diff type exists.
    pub fn sides(self) -> impl Iterator<Item = Side> {
        Side::ALL.into_iter().filter(move |s| self.exists_on(*s))
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the two versions overlaid in a diff tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The version before the edit.
    Before,
    /// The version after the edit.
    After,
}

impl Side {
    /// Both sides, before first.
    pub const ALL: [Side; 2] = [Side::Before, Side::After];

    /// Returns the opposite side.
    pub fn other(self) -> Self {
        match self {
            Side::Before => Side::After,
            Side::After => Side::Before,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Before => f.write_str("before"),
            Side::After => f.write_str("after"),
        }
    }
}

// ---------------------------------------------------------------------------
// GraphFormat
// ---------------------------------------------------------------------------

/// Shape of a [`crate::tree::DiffTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    /// Exactly one synthetic ROOT node owns every top-level node.
    #[default]
    Tree,
    /// A forest without ROOT; used for whole-commit multi-file graphs.
    Graph,
}

impl fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphFormat::Tree => f.write_str("tree"),
            GraphFormat::Graph => f.write_str("graph"),
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeType
// ---------------------------------------------------------------------------

/// How a commit touched one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// The file did not exist before the commit.
    Add,
    /// The file existed on both sides.
    Modify,
    /// The file no longer exists after the commit.
    Delete,
    /// The file was moved, possibly with content changes.
    Rename,
    /// The file was copied from another path.
    Copy,
}

impl ChangeType {
    /// All variants in declaration order.
    pub const ALL: [ChangeType; 5] = [
        ChangeType::Add,
        ChangeType::Modify,
        ChangeType::Delete,
        ChangeType::Rename,
        ChangeType::Copy,
    ];

    /// Returns the lower-case token used on the command line.
    pub fn token(self) -> &'static str {
        match self {
            ChangeType::Add => "add",
            ChangeType::Modify => "modify",
            ChangeType::Delete => "delete",
            ChangeType::Rename => "rename",
            ChangeType::Copy => "copy",
        }
    }

    /// Parses a token produced by [`ChangeType::token`].
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.token() == token)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_type_tokens_round_trip() {
        for code_type in CodeType::ALL {
            assert_eq!(CodeType::from_token(code_type.token()), Some(code_type));
        }
        assert_eq!(CodeType::from_token("if"), None);
    }

    #[test]
    fn diff_type_sides() {
        assert_eq!(DiffType::Add.sides().collect::<Vec<_>>(), vec![Side::After]);
        assert_eq!(DiffType::Rem.sides().collect::<Vec<_>>(), vec![Side::Before]);
        assert_eq!(DiffType::Non.sides().collect::<Vec<_>>(), vec![Side::Before, Side::After]);
    }

    #[test]
    fn diff_type_markers() {
        assert_eq!(DiffType::from_marker('+'), DiffType::Add);
        assert_eq!(DiffType::from_marker('-'), DiffType::Rem);
        assert_eq!(DiffType::from_marker(' '), DiffType::Non);
    }

    #[test]
    fn scopes_and_guards() {
        assert!(CodeType::Root.is_scope());
        assert!(CodeType::Else.is_scope());
        assert!(!CodeType::Endif.is_scope());
        assert!(CodeType::Elif.has_guard());
        assert!(!CodeType::Else.has_guard());
    }
}
