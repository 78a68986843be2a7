//! Random patch generator and benchmark utilities for vardiff.
//!
//! This crate provides deterministic generation of balanced conditional
//! compilation patches and whole in-memory histories for benchmarking and
//! property testing of `vardiff-core`.

pub mod generator;
pub mod history;

pub use generator::{GeneratorConfig, SizeTier, generate_file_diff, generate_patch};
pub use history::{MemoryHistory, NullSink, generate_history};
