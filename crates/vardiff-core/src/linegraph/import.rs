//! Line-graph reader.
//!
//! A single forward pass. Nodes and edges accumulate into the current tree
//! section; the next tree header (or the end of input) closes the section,
//! validates it against the configured [`crate::enums::GraphFormat`], and appends it to the
//! result. Sections without any node line are skipped.

use std::collections::HashMap;

use crate::enums::Side;
use crate::tree::{DiffTree, NodeIx};

use super::{
    DecodeError, EDGE_PREFIX, LineGraphOptions, NODE_PREFIX, ROLE_AFTER, ROLE_BEFORE, ROLE_BOTH,
    TREE_HEADER,
};

struct Section {
    header_line: usize,
    tree: DiffTree,
    ids: HashMap<usize, NodeIx>,
}

/// Decodes every tree in `text`.
///
/// # Errors
///
/// Returns the first [`DecodeError`]; no trees are returned in that case.
pub fn import(text: &str, options: &LineGraphOptions) -> Result<Vec<DiffTree>, DecodeError> {
    let mut trees = Vec::new();
    let mut section: Option<Section> = None;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        if let Some(label) = line.strip_prefix(TREE_HEADER) {
            if let Some(done) = section.take() {
                finish(done, &mut trees)?;
            }
            let label = label.strip_prefix(' ').unwrap_or(label);
            section = Some(Section {
                header_line: line_no,
                tree: DiffTree::empty(options.graph_format, options.tree_format.from_label(label)),
                ids: HashMap::new(),
            });
        } else if let Some(rest) = line.strip_prefix(NODE_PREFIX) {
            let current = section
                .as_mut()
                .ok_or(DecodeError::MissingTreeHeader { line: line_no })?;
            read_node(current, rest, line_no, options)?;
        } else if let Some(rest) = line.strip_prefix(EDGE_PREFIX) {
            let current = section
                .as_mut()
                .ok_or(DecodeError::MissingTreeHeader { line: line_no })?;
            read_edge(current, rest, line_no)?;
        } else if !line.trim().is_empty() {
            return Err(DecodeError::UnrecognizedLine {
                line: line_no,
                text: line.to_owned(),
            });
        }
    }
    if let Some(done) = section.take() {
        finish(done, &mut trees)?;
    }
    Ok(trees)
}

fn read_node(
    section: &mut Section,
    rest: &str,
    line: usize,
    options: &LineGraphOptions,
) -> Result<(), DecodeError> {
    let (id_text, label) = rest.split_once(' ').unwrap_or((rest, ""));
    let id = parse_id(id_text, line)?;
    if section.ids.contains_key(&id) {
        return Err(DecodeError::DuplicateNodeId { line, id });
    }
    let node = options
        .node_format
        .from_label(id, label)
        .map_err(|reason| DecodeError::InvalidNodeLabel { line, reason })?;
    let ix = section.tree.add_node(node);
    section.ids.insert(id, ix);
    Ok(())
}

fn read_edge(section: &mut Section, rest: &str, line: usize) -> Result<(), DecodeError> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let [child, parent, role] = fields.as_slice() else {
        return Err(DecodeError::MalformedEdge { line });
    };
    let lookup = |text: &str| -> Result<NodeIx, DecodeError> {
        let id = parse_id(text, line)?;
        section
            .ids
            .get(&id)
            .copied()
            .ok_or(DecodeError::UnknownNode { line, id })
    };
    let child = lookup(*child)?;
    let parent = lookup(*parent)?;
    let sides: &[Side] = match *role {
        ROLE_BOTH => &Side::ALL,
        ROLE_BEFORE => &[Side::Before],
        ROLE_AFTER => &[Side::After],
        other => {
            return Err(DecodeError::InvalidRole {
                line,
                role: other.to_owned(),
            });
        }
    };
    for &side in sides {
        section
            .tree
            .link(parent, child, side)
            .map_err(|error| DecodeError::InvalidEdge { line, error })?;
    }
    Ok(())
}

fn parse_id(text: &str, line: usize) -> Result<usize, DecodeError> {
    text.parse().map_err(|_| DecodeError::InvalidNodeId {
        line,
        text: text.to_owned(),
    })
}

fn finish(section: Section, trees: &mut Vec<DiffTree>) -> Result<(), DecodeError> {
    if section.ids.is_empty() {
        return Ok(());
    }
    section
        .tree
        .check_consistency()
        .map_err(|error| DecodeError::InvalidTree {
            line: section.header_line,
            error,
        })?;
    trees.push(section.tree);
    Ok(())
}
