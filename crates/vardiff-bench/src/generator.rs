//! Balanced patch generator.
//!
//! Every generated patch parses: each conditional writes its `#if`, branch
//! directives, and `#endif` with one shared diff marker, so both sides of the
//! diff stay balanced whatever markers the enclosed lines carry.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vardiff_core::DiffType;

/// Configuration for the patch generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Seed for the random number generator (deterministic).
    pub seed: u64,
    /// Top-level blocks per patch.
    pub blocks: usize,
    /// Deepest conditional nesting.
    pub max_depth: usize,
    /// Features guards are drawn from. Keep at most 16 so presence
    /// conditions stay within the reference oracle's bound.
    pub features: usize,
    /// Chance that a block is a conditional rather than a code line.
    pub conditional_probability: f64,
    /// Chance that a conditional gets an `#elif` branch.
    pub elif_probability: f64,
    /// Chance that a conditional gets an `#else` branch.
    pub else_probability: f64,
    /// Chance that a line or conditional is added or removed.
    pub edit_probability: f64,
}

/// Predefined size tiers for benchmarking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeTier {
    /// ~50 lines
    Small,
    /// ~600 lines
    Medium,
    /// ~8000 lines
    Large,
}

impl SizeTier {
    /// Returns the default `GeneratorConfig` for this size tier.
    pub fn config(self, seed: u64) -> GeneratorConfig {
        let (blocks, max_depth) = match self {
            SizeTier::Small => (20, 2),
            SizeTier::Medium => (200, 3),
            SizeTier::Large => (2000, 4),
        };
        GeneratorConfig {
            seed,
            blocks,
            max_depth,
            features: 8,
            conditional_probability: 0.3,
            elif_probability: 0.2,
            else_probability: 0.3,
            edit_probability: 0.3,
        }
    }
}

struct Generator<'c> {
    rng: StdRng,
    config: &'c GeneratorConfig,
    statements: usize,
    out: String,
}

impl Generator<'_> {
    fn diff_type(&mut self) -> DiffType {
        if !self.rng.gen_bool(self.config.edit_probability) {
            DiffType::Non
        } else if self.rng.gen_bool(0.5) {
            DiffType::Add
        } else {
            DiffType::Rem
        }
    }

    fn feature(&mut self) -> String {
        format!("F{}", self.rng.gen_range(0..self.config.features.max(1)))
    }

    fn guard(&mut self) -> String {
        let a = self.feature();
        match self.rng.gen_range(0..4) {
            0 => format!("defined({a})"),
            1 => a,
            2 => format!("{a} && !defined({})", self.feature()),
            _ => format!("{a} || {}", self.feature()),
        }
    }

    fn line(&mut self, diff_type: DiffType, text: &str) {
        self.out.push(marker(diff_type));
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, depth: usize) {
        if depth < self.config.max_depth && self.rng.gen_bool(self.config.conditional_probability) {
            let diff_type = self.diff_type();
            let guard = self.guard();
            self.line(diff_type, &format!("#if {guard}"));
            self.body(depth + 1);
            if self.rng.gen_bool(self.config.elif_probability) {
                let guard = self.guard();
                self.line(diff_type, &format!("#elif {guard}"));
                self.body(depth + 1);
            }
            if self.rng.gen_bool(self.config.else_probability) {
                self.line(diff_type, "#else");
                self.body(depth + 1);
            }
            self.line(diff_type, "#endif");
        } else {
            self.statements += 1;
            let diff_type = self.diff_type();
            let text = format!("stmt_{}();", self.statements);
            self.line(diff_type, &text);
        }
    }

    fn body(&mut self, depth: usize) {
        for _ in 0..self.rng.gen_range(1..=3) {
            self.block(depth);
        }
    }
}

fn marker(diff_type: DiffType) -> char {
    match diff_type {
        DiffType::Add => '+',
        DiffType::Rem => '-',
        DiffType::Non => ' ',
    }
}

/// Generates the diff lines of one patch, without file or hunk headers.
pub fn generate_patch(config: &GeneratorConfig) -> String {
    let mut generator = Generator {
        rng: StdRng::seed_from_u64(config.seed),
        config,
        statements: 0,
        out: String::new(),
    };
    for _ in 0..config.blocks.max(1) {
        generator.block(0);
    }
    generator.out
}

/// Generates a `git diff`-style single-file diff of `path` with one hunk
/// whose header matches the body.
pub fn generate_file_diff(path: &str, config: &GeneratorConfig) -> String {
    let body = generate_patch(config);
    let (mut old, mut new) = (0usize, 0usize);
    for line in body.lines() {
        match line.chars().next() {
            Some('+') => new += 1,
            Some('-') => old += 1,
            Some(_) | None => {
                old += 1;
                new += 1;
            }
        }
    }
    format!("diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1,{old} +1,{new} @@\n{body}")
}
