//! Shared generators for the integration tests.
#![allow(dead_code, clippy::expect_used)]

use std::path::PathBuf;

use proptest::prelude::*;
use vardiff_core::DiffType;

/// Directive spellings as `(#if form, #elif form)`, written after the `#`.
/// A `\n` continues the directive on the next diff line.
const GUARDS: [(&str, &str); 14] = [
    ("if A", "elif A"),
    ("if B", "elif B"),
    ("if C", "elif C"),
    ("if defined(D)", "elif defined D"),
    ("if !E", "elif !E"),
    ("if A && B", "elif A && B"),
    ("if A || !C", "elif A || !C"),
    ("if (B || defined(D)) && !A", "elif (B || defined(D)) && !A"),
    ("ifdef F_G", "elifdef F_G"),
    ("ifndef E", "elifndef E"),
    ("if X > 1", "elif X > 1"),
    ("if KERNEL_VERSION(2,6) && !B", "elif KERNEL_VERSION(2,6) && !B"),
    ("if A && \\\n    (C || D)", "elif A && \\\n    (C || D)"),
    ("  if   B  /* x */", "elif B // y"),
];

/// One generated source fragment.
#[derive(Debug, Clone)]
pub enum Block {
    /// A line of code.
    Code(DiffType, String),
    /// `#if`/`#elif`.../`#else`/`#endif` whose directive lines all share one
    /// diff type.
    Conditional {
        diff_type: DiffType,
        branches: Vec<(Guard, Vec<Block>)>,
        otherwise: Option<Vec<Block>>,
    },
}

pub fn arb_diff_type() -> impl Strategy<Value = DiffType> {
    prop_oneof![Just(DiffType::Add), Just(DiffType::Rem), Just(DiffType::Non)]
}

fn arb_guard() -> impl Strategy<Value = Guard> {
    prop::sample::select(GUARDS.to_vec())
}

type Guard = (&'static str, &'static str);

pub fn arb_block() -> impl Strategy<Value = Block> {
    let leaf = (arb_diff_type(), "[ \t_a-z]{0,8}").prop_map(|(d, text)| Block::Code(d, text));
    leaf.prop_recursive(4, 48, 4, |inner| {
        (
            arb_diff_type(),
            prop::collection::vec((arb_guard(), prop::collection::vec(inner.clone(), 0..3)), 1..3),
            prop::option::of(prop::collection::vec(inner, 0..3)),
        )
            .prop_map(|(diff_type, branches, otherwise)| Block::Conditional {
                diff_type,
                branches,
                otherwise,
            })
    })
}

/// A patch whose conditionals are balanced on both sides.
pub fn arb_blocks() -> impl Strategy<Value = Vec<Block>> {
    prop::collection::vec(arb_block(), 0..6)
}

fn marker(diff_type: DiffType) -> char {
    match diff_type {
        DiffType::Add => '+',
        DiffType::Rem => '-',
        DiffType::Non => ' ',
    }
}

fn render_into(blocks: &[Block], out: &mut String) {
    for block in blocks {
        match block {
            Block::Code(d, text) => {
                out.push(marker(*d));
                out.push_str(text);
                out.push('\n');
            }
            Block::Conditional {
                diff_type,
                branches,
                otherwise,
            } => {
                let m = marker(*diff_type);
                for (i, ((if_form, elif_form), body)) in branches.iter().enumerate() {
                    let form = if i == 0 { if_form } else { elif_form };
                    for (j, part) in form.split('\n').enumerate() {
                        let hash = if j == 0 { "#" } else { "" };
                        out.push_str(&format!("{m}{hash}{part}\n"));
                    }
                    render_into(body, out);
                }
                if let Some(body) = otherwise {
                    out.push_str(&format!("{m}#else\n"));
                    render_into(body, out);
                }
                out.push_str(&format!("{m}#endif\n"));
            }
        }
    }
}

/// Diff text of `blocks`. Continued directives span several lines.
pub fn render(blocks: &[Block]) -> String {
    let mut out = String::new();
    render_into(blocks, &mut out);
    out
}

/// Number of nodes the parser builds from [`render`] output, ROOT excluded.
pub fn node_count(blocks: &[Block]) -> usize {
    blocks
        .iter()
        .map(|block| match block {
            Block::Code(..) => 1,
            Block::Conditional {
                branches, otherwise, ..
            } => {
                let branch_lines: usize = branches.iter().map(|(_, body)| 1 + node_count(body)).sum();
                let else_lines = otherwise.as_ref().map_or(0, |body| 1 + node_count(body));
                branch_lines + else_lines + 1
            }
        })
        .sum()
}

/// The same blocks with every line unchanged.
pub fn unchanged(blocks: &[Block]) -> Vec<Block> {
    blocks
        .iter()
        .map(|block| match block {
            Block::Code(_, text) => Block::Code(DiffType::Non, text.clone()),
            Block::Conditional {
                branches, otherwise, ..
            } => Block::Conditional {
                diff_type: DiffType::Non,
                branches: branches
                    .iter()
                    .map(|(guard, body)| (*guard, unchanged(body)))
                    .collect(),
                otherwise: otherwise.as_ref().map(|body| unchanged(body)),
            },
        })
        .collect()
}

/// Path of a shared fixture file at the workspace root.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
        .join(name)
}

/// Contents of a shared fixture file.
pub fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture(name)).expect("fixture readable")
}
