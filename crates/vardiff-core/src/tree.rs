//! The dual-parent diff tree.
//!
//! A [`DiffTree`] overlays the pre-edit and post-edit nesting of one file on a
//! single set of [`DiffNode`]s. Nodes live in an arena owned by the tree and
//! refer to each other through [`NodeIx`] indices: every node has at most one
//! parent per [`Side`] and an ordered child list per side. Restricting the
//! arena to the nodes that exist on one side yields an ordinary rooted tree
//! (or a forest, for [`GraphFormat::Graph`]).
//!
//! All traversals are iterative worklists over arena indices so that deeply
//! nested conditionals cannot exhaust the call stack.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::enums::{CodeType, DiffType, GraphFormat, Side};
use crate::formula::Formula;


// ---------------------------------------------------------------------------
// Identity and provenance
// ---------------------------------------------------------------------------

/// Index of a node in its tree's arena.
///
/// Indices are only meaningful for the tree that produced them. They differ
/// from [`DiffNode::id`], which is the persisted identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIx(usize);

impl NodeIx {
    /// Returns the raw arena position.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Inclusive range of diff line numbers (1-based) a node was built from.
/// `0..=0` marks nodes without a textual origin, such as ROOT or imported
/// nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineRange {
    /// First line.
    pub from: usize,
    /// Last line.
    pub to: usize,
}

impl LineRange {
    /// A range covering the single line `line`.
    pub fn single(line: usize) -> Self {
        Self {
            from: line,
            to: line,
        }
    }
}

/// The old/new span covered by the hunks of a patch, `-a,b +c,d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkRange {
    /// First old-file line.
    pub old_start: usize,
    /// Number of old-file lines.
    pub old_len: usize,
    /// First new-file line.
    pub new_start: usize,
    /// Number of new-file lines.
    pub new_len: usize,
}

impl HunkRange {
    /// Returns the smallest range covering both `self` and `other`.
    pub fn cover(self, other: HunkRange) -> HunkRange {
        let old_end = (self.old_start + self.old_len).max(other.old_start + other.old_len);
        let new_end = (self.new_start + self.new_len).max(other.new_start + other.new_len);
        let old_start = self.old_start.min(other.old_start);
        let new_start = self.new_start.min(other.new_start);
        HunkRange {
            old_start,
            old_len: old_end - old_start,
            new_start,
            new_len: new_end - new_start,
        }
    }
}

impl fmt::Display for HunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "-{},{} +{},{}",
            self.old_start, self.old_len, self.new_start, self.new_len
        )
    }
}

impl FromStr for HunkRange {
    type Err = String;

    /// Parses `-a[,b] +c[,d]`; an omitted length means one line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn span(part: Option<&str>, sign: char) -> Option<(usize, usize)> {
            let body = part?.strip_prefix(sign)?;
            match body.split_once(',') {
                Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
                None => Some((body.parse().ok()?, 1)),
            }
        }
        let mut parts = s.split_whitespace();
        let old = span(parts.next(), '-');
        let new = span(parts.next(), '+');
        match (old, new, parts.next()) {
            (Some((old_start, old_len)), Some((new_start, new_len)), None) => Ok(HunkRange {
                old_start,
                old_len,
                new_start,
                new_len,
            }),
            _ => Err(format!("invalid hunk range \"{s}\"")),
        }
    }
}

/// Where a tree came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffTreeSource {
    /// Path of the changed file; empty for whole-commit graphs.
    pub path: String,
    /// Identifier of the commit that made the change.
    pub commit: String,
    /// Span of the hunks the tree was parsed from, when known.
    pub hunk: Option<HunkRange>,
}

impl DiffTreeSource {
    /// Creates a source without hunk information.
    pub fn new(path: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            commit: commit.into(),
            hunk: None,
        }
    }
}

// ---------------------------------------------------------------------------
// DiffNode
// ---------------------------------------------------------------------------

/// A line of code or a conditional directive taking part in an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffNode {
    /// Stable identity within the tree; used by the line-graph codec.
    pub id: usize,
    /// Syntactic kind.
    pub code_type: CodeType,
    /// Which sides the node exists on.
    pub diff_type: DiffType,
    /// Source text for CODE, normalized guard text for IF/ELIF, otherwise
    /// empty (unless a transform relabels ROOT).
    pub label: String,
    /// Guard formula; set for IF and ELIF only.
    pub condition: Option<Formula>,
    /// Diff lines this node was built from.
    pub lines: LineRange,
    before_parent: Option<NodeIx>,
    after_parent: Option<NodeIx>,
    before_children: Vec<NodeIx>,
    after_children: Vec<NodeIx>,
}

impl DiffNode {
    /// Creates an unlinked node.
    pub fn new(id: usize, code_type: CodeType, diff_type: DiffType, label: impl Into<String>) -> Self {
        Self {
            id,
            code_type,
            diff_type,
            label: label.into(),
            condition: None,
            lines: LineRange::default(),
            before_parent: None,
            after_parent: None,
            before_children: Vec::new(),
            after_children: Vec::new(),
        }
    }

    /// Returns `true` if the node exists on `side`. ROOT exists on both.
    pub fn exists_on(&self, side: Side) -> bool {
        self.code_type == CodeType::Root || self.diff_type.exists_on(side)
    }

    /// The enclosing scope on `side`, if any.
    pub fn parent(&self, side: Side) -> Option<NodeIx> {
        match side {
            Side::Before => self.before_parent,
            Side::After => self.after_parent,
        }
    }

    /// Children on `side` in source order.
    pub fn children(&self, side: Side) -> &[NodeIx] {
        match side {
            Side::Before => &self.before_children,
            Side::After => &self.after_children,
        }
    }

    /// Returns `true` for CODE nodes.
    pub fn is_code(&self) -> bool {
        self.code_type == CodeType::Code
    }

    fn parent_slot(&mut self, side: Side) -> &mut Option<NodeIx> {
        match side {
            Side::Before => &mut self.before_parent,
            Side::After => &mut self.after_parent,
        }
    }

    fn children_mut(&mut self, side: Side) -> &mut Vec<NodeIx> {
        match side {
            Side::Before => &mut self.before_children,
            Side::After => &mut self.after_children,
        }
    }
}

// ---------------------------------------------------------------------------
// ConsistencyError
// ---------------------------------------------------------------------------

/// A structural invariant of a [`DiffTree`] does not hold.
///
/// Node references are persisted ids, not arena indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// A tree-format tree has zero or several ROOT nodes.
    RootCount {
        /// Number of ROOT nodes found.
        found: usize,
    },
    /// A graph-format tree contains a ROOT node.
    RootInGraph {
        /// Id of the offending node.
        id: usize,
    },
    /// ROOT has a parent.
    RootWithParent {
        /// Id of the ROOT node.
        id: usize,
    },
    /// Two nodes share an id.
    DuplicateId {
        /// The repeated id.
        id: usize,
    },
    /// A node that exists on a side has no parent there (tree format).
    MissingParent {
        /// Id of the orphan.
        id: usize,
        /// Side on which the parent is missing.
        side: Side,
    },
    /// A node is linked on a side it does not exist on.
    AbsentNodeLinked {
        /// Id of the node.
        id: usize,
        /// The side it is absent from.
        side: Side,
    },
    /// A parent does not exist on the side of the edge.
    AbsentParent {
        /// Id of the child.
        id: usize,
        /// Id of the parent.
        parent: usize,
        /// Side of the edge.
        side: Side,
    },
    /// A node's parent is not ROOT, IF, ELIF, or ELSE.
    NonScopeParent {
        /// Id of the child.
        id: usize,
        /// Id of the parent.
        parent: usize,
    },
    /// A node already has a parent on that side.
    MultipleParents {
        /// Id of the child.
        id: usize,
        /// Side of the second edge.
        side: Side,
    },
    /// Parent pointer and child list disagree.
    ChildListMismatch {
        /// Id of the parent.
        parent: usize,
        /// Id of the child.
        child: usize,
        /// Side of the edge.
        side: Side,
    },
    /// Following parents on one side revisits a node.
    Cycle {
        /// Id of a node on the cycle.
        id: usize,
        /// Side of the cycle.
        side: Side,
    },
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootCount { found } => {
                write!(f, "tree format requires exactly one root, found {found}")
            }
            Self::RootInGraph { id } => write!(f, "graph format has root node {id}"),
            Self::RootWithParent { id } => write!(f, "root node {id} has a parent"),
            Self::DuplicateId { id } => write!(f, "node id {id} is used twice"),
            Self::MissingParent { id, side } => {
                write!(f, "node {id} has no {side} parent")
            }
            Self::AbsentNodeLinked { id, side } => {
                write!(f, "node {id} does not exist {side} the edit but is linked there")
            }
            Self::AbsentParent { id, parent, side } => write!(
                f,
                "{side} parent {parent} of node {id} does not exist {side} the edit"
            ),
            Self::NonScopeParent { id, parent } => {
                write!(f, "node {parent} cannot be the parent of node {id}")
            }
            Self::MultipleParents { id, side } => {
                write!(f, "node {id} has more than one {side} parent")
            }
            Self::ChildListMismatch {
                parent,
                child,
                side,
            } => write!(
                f,
                "{side} child list of node {parent} disagrees with parent of node {child}"
            ),
            Self::Cycle { id, side } => write!(f, "node {id} lies on a {side} cycle"),
        }
    }
}

impl std::error::Error for ConsistencyError {}

// ---------------------------------------------------------------------------
// DiffTree
// ---------------------------------------------------------------------------

/// The edit of one file (or, in graph format, of a whole commit).
#[derive(Debug, Clone, PartialEq)]
pub struct DiffTree {
    nodes: Vec<DiffNode>,
    format: GraphFormat,
    /// Provenance.
    pub source: DiffTreeSource,
}

impl DiffTree {
    /// Creates a tree-format tree holding only an unchanged ROOT with id 0.
    pub fn new(source: DiffTreeSource) -> Self {
        let mut tree = Self::empty(GraphFormat::Tree, source);
        tree.add_node(DiffNode::new(0, CodeType::Root, DiffType::Non, ""));
        tree
    }

    /// Creates a tree with no nodes at all. Callers building a tree-format
    /// tree node by node must add the ROOT themselves.
    pub fn empty(format: GraphFormat, source: DiffTreeSource) -> Self {
        Self {
            nodes: Vec::new(),
            format,
            source,
        }
    }

    /// Appends an unlinked node and returns its index.
    pub fn add_node(&mut self, node: DiffNode) -> NodeIx {
        self.nodes.push(node);
        NodeIx(self.nodes.len() - 1)
    }

    /// Makes `child` the last child of `parent` on `side`.
    ///
    /// # Errors
    ///
    /// Fails if either node does not exist on `side`, if `parent` cannot own
    /// children, or if `child` already has a parent on `side`.
    pub fn link(&mut self, parent: NodeIx, child: NodeIx, side: Side) -> Result<(), ConsistencyError> {
        let p = &self.nodes[parent.0];
        let c = &self.nodes[child.0];
        if !c.exists_on(side) || c.code_type == CodeType::Root {
            return Err(ConsistencyError::AbsentNodeLinked { id: c.id, side });
        }
        if !p.exists_on(side) {
            return Err(ConsistencyError::AbsentParent {
                id: c.id,
                parent: p.id,
                side,
            });
        }
        if !p.code_type.is_scope() {
            return Err(ConsistencyError::NonScopeParent {
                id: c.id,
                parent: p.id,
            });
        }
        if c.parent(side).is_some() {
            return Err(ConsistencyError::MultipleParents { id: c.id, side });
        }
        *self.nodes[child.0].parent_slot(side) = Some(parent);
        self.nodes[parent.0].children_mut(side).push(child);
        Ok(())
    }

    /// Returns the node at `ix`.
    ///
    /// Indexing with a [`NodeIx`] from a different tree is a logic error and
    /// may panic.
    pub fn node(&self, ix: NodeIx) -> &DiffNode {
        &self.nodes[ix.0]
    }

    /// Mutable access to a node's content. Links can only change through
    /// [`DiffTree::link`] and [`DiffTree::retain`].
    pub fn node_mut(&mut self, ix: NodeIx) -> &mut DiffNode {
        &mut self.nodes[ix.0]
    }

    /// Number of nodes, ROOT included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree has no node besides ROOT.
    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(|n| n.code_type == CodeType::Root)
    }

    /// The tree's shape.
    pub fn format(&self) -> GraphFormat {
        self.format
    }

    /// The ROOT node, if present.
    pub fn root(&self) -> Option<NodeIx> {
        self.nodes
            .iter()
            .position(|n| n.code_type == CodeType::Root)
            .map(NodeIx)
    }

    /// Nodes existing on `side` without a parent there, in arena order.
    pub fn roots(&self, side: Side) -> Vec<NodeIx> {
        self.iter()
            .filter(|(_, n)| n.exists_on(side) && n.parent(side).is_none())
            .map(|(ix, _)| ix)
            .collect()
    }

    /// All nodes with their indices, in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIx, &DiffNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIx(i), n))
    }

    /// Indices of all CODE nodes, in arena order.
    pub fn code_nodes(&self) -> impl Iterator<Item = NodeIx> + '_ {
        self.iter().filter(|(_, n)| n.is_code()).map(|(ix, _)| ix)
    }

    /// Looks up a node by persisted id.
    pub fn find_id(&self, id: usize) -> Option<NodeIx> {
        self.nodes.iter().position(|n| n.id == id).map(NodeIx)
    }

    /// Pre-order traversal of the `side` tree (or forest).
    pub fn preorder(&self, side: Side) -> Vec<NodeIx> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeIx> = self.roots(side).into_iter().rev().collect();
        while let Some(ix) = stack.pop() {
            if std::mem::replace(&mut seen[ix.0], true) {
                continue;
            }
            out.push(ix);
            stack.extend(self.nodes[ix.0].children(side).iter().rev().copied());
        }
        out
    }

    /// Iterates the ancestors of `ix` on `side`, nearest first.
    pub fn ancestors(&self, ix: NodeIx, side: Side) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.nodes[ix.0].parent(side),
            side,
            remaining: self.nodes.len(),
        }
    }

    /// Returns `true` if `ix` and each of its ancestors have the same parent
    /// on both sides, i.e. the node was not moved to a different scope.
    pub fn before_path_equals_after_path(&self, ix: NodeIx) -> bool {
        let mut current = ix;
        for _ in 0..=self.nodes.len() {
            let node = &self.nodes[current.0];
            let before = node.parent(Side::Before);
            if before != node.parent(Side::After) {
                return false;
            }
            match before {
                Some(p) => current = p,
                None => return true,
            }
        }
        false
    }

    /// Validates every structural invariant for the tree's format.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        let root_count = self
            .nodes
            .iter()
            .filter(|n| n.code_type == CodeType::Root)
            .count();
        match self.format {
            GraphFormat::Tree => {
                if root_count != 1 {
                    return Err(ConsistencyError::RootCount { found: root_count });
                }
            }
            GraphFormat::Graph => {
                if let Some(root) = self.nodes.iter().find(|n| n.code_type == CodeType::Root) {
                    return Err(ConsistencyError::RootInGraph { id: root.id });
                }
            }
        }

        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id) {
                return Err(ConsistencyError::DuplicateId { id: node.id });
            }
        }

        for (ix, node) in self.iter() {
            for side in Side::ALL {
                self.check_links(ix, node, side)?;
            }
        }

        for side in Side::ALL {
            self.check_acyclic(side)?;
        }
        Ok(())
    }

    fn check_links(&self, ix: NodeIx, node: &DiffNode, side: Side) -> Result<(), ConsistencyError> {
        let exists = node.exists_on(side);
        match node.parent(side) {
            Some(p) => {
                if node.code_type == CodeType::Root {
                    return Err(ConsistencyError::RootWithParent { id: node.id });
                }
                if !exists {
                    return Err(ConsistencyError::AbsentNodeLinked { id: node.id, side });
                }
                let parent = &self.nodes[p.0];
                if !parent.exists_on(side) {
                    return Err(ConsistencyError::AbsentParent {
                        id: node.id,
                        parent: parent.id,
                        side,
                    });
                }
                if !parent.code_type.is_scope() {
                    return Err(ConsistencyError::NonScopeParent {
                        id: node.id,
                        parent: parent.id,
                    });
                }
                if parent.children(side).iter().filter(|&&c| c == ix).count() != 1 {
                    return Err(ConsistencyError::ChildListMismatch {
                        parent: parent.id,
                        child: node.id,
                        side,
                    });
                }
            }
            None => {
                if exists && node.code_type != CodeType::Root && self.format == GraphFormat::Tree {
                    return Err(ConsistencyError::MissingParent { id: node.id, side });
                }
            }
        }
        if !exists && !node.children(side).is_empty() {
            return Err(ConsistencyError::AbsentNodeLinked { id: node.id, side });
        }
        for &child in node.children(side) {
            if self.nodes[child.0].parent(side) != Some(ix) {
                return Err(ConsistencyError::ChildListMismatch {
                    parent: node.id,
                    child: self.nodes[child.0].id,
                    side,
                });
            }
        }
        Ok(())
    }

    /// Colors nodes whose parent chain is known to end; any chain longer
    /// than the arena must revisit a node.
    fn check_acyclic(&self, side: Side) -> Result<(), ConsistencyError> {
        let mut terminates = vec![false; self.nodes.len()];
        for start in 0..self.nodes.len() {
            let mut chain = Vec::new();
            let mut current = Some(NodeIx(start));
            while let Some(ix) = current {
                if terminates[ix.0] {
                    break;
                }
                if chain.len() > self.nodes.len() {
                    return Err(ConsistencyError::Cycle {
                        id: self.nodes[start].id,
                        side,
                    });
                }
                chain.push(ix);
                current = self.nodes[ix.0].parent(side);
            }
            for ix in chain {
                terminates[ix.0] = true;
            }
        }
        Ok(())
    }

    /// Removes every node for which `keep` returns `false`.
    ///
    /// Surviving nodes keep their ids and relative order. Links to removed
    /// nodes are dropped, so removing a scope without its descendants leaves
    /// them parentless.
    pub fn retain(&mut self, keep: impl Fn(NodeIx, &DiffNode) -> bool) {
        let mut remap: Vec<Option<NodeIx>> = Vec::with_capacity(self.nodes.len());
        let mut next = 0;
        for (ix, node) in self.iter() {
            if keep(ix, node) {
                remap.push(Some(NodeIx(next)));
                next += 1;
            } else {
                remap.push(None);
            }
        }
        let old = std::mem::take(&mut self.nodes);
        for (i, mut node) in old.into_iter().enumerate() {
            if remap[i].is_none() {
                continue;
            }
            for side in Side::ALL {
                let parent = node.parent(side).and_then(|p| remap[p.0]);
                *node.parent_slot(side) = parent;
                let children: Vec<NodeIx> = node
                    .children(side)
                    .iter()
                    .filter_map(|c| remap[c.0])
                    .collect();
                *node.children_mut(side) = children;
            }
            self.nodes.push(node);
        }
    }

    /// Converts a tree-format tree into a graph-format forest by dissolving
    /// ROOT: its children become parentless roots. Graph-format input is
    /// returned unchanged.
    pub fn into_graph_format(mut self) -> DiffTree {
        if self.format == GraphFormat::Graph {
            return self;
        }
        self.retain(|_, n| n.code_type != CodeType::Root);
        self.format = GraphFormat::Graph;
        self
    }

    /// Joins the trees of one commit into a single graph-format forest.
    ///
    /// Each tree's ROOT is dissolved and nodes are renumbered with fresh,
    /// sequential ids in input order.
    pub fn commit_graph(commit: &str, trees: impl IntoIterator<Item = DiffTree>) -> DiffTree {
        let mut graph = DiffTree::empty(GraphFormat::Graph, DiffTreeSource::new("", commit));
        for tree in trees {
            let tree = tree.into_graph_format();
            let offset = graph.nodes.len();
            let shift = |ix: NodeIx| NodeIx(ix.0 + offset);
            for mut node in tree.nodes {
                node.id = graph.nodes.len();
                for side in Side::ALL {
                    let parent = node.parent(side).map(shift);
                    *node.parent_slot(side) = parent;
                    for child in node.children_mut(side) {
                        *child = shift(*child);
                    }
                }
                graph.nodes.push(node);
            }
        }
        graph
    }
}

/// Iterator returned by [`DiffTree::ancestors`].
///
/// Stops after as many steps as the tree has nodes, so a cyclic (inconsistent)
/// tree cannot make it loop forever.
#[derive(Debug)]
pub struct Ancestors<'t> {
    tree: &'t DiffTree,
    next: Option<NodeIx>,
    side: Side,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeIx;

    fn next(&mut self) -> Option<NodeIx> {
        let ix = self.next?;
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.next = self.tree.nodes[ix.0].parent(self.side);
        Some(ix)
    }
}
