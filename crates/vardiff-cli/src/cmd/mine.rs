//! Implementation of `vardiff mine`.
//!
//! Mines a git repository (`--repo`) or a directory of `<commit>.diff`
//! files (`--patches`) in parallel batches. Batch line graphs and metadata go
//! to `--output`; after a complete run the total result is written there too
//! and printed to stdout.
//!
//! A repository whose output directory already holds a total result is
//! skipped unless `--force` is given.
//!
//! Exit codes: 0 = success or skipped, 1 = invalid arguments or aborted run,
//! 2 = unreadable output directory.
use std::path::Path;

use tracing::info;
use vardiff_core::{
    ChangeType, DiffFilter, MiningConfig, MiningOutcome, Transform, TreeCriterion, TreeFilter, mine,
};

use crate::OutputFormat;
use crate::cli::MineArgs;
use crate::cmd::{line_graph_options, write_json, write_stdout};
use crate::error::CliError;
use crate::sink::DirectorySink;
use crate::source::{DirectorySource, GitSource};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn repository_name(args: &MineArgs) -> String {
    let dir = args.repo.as_deref().or(args.patches.as_deref());
    dir.and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Builds the diff filter: C-family files unless `--extension` is given.
///
/// # Errors
///
/// Returns [`CliError::InvalidArgument`] for malformed path patterns.
pub fn diff_filter(args: &MineArgs) -> Result<DiffFilter, CliError> {
    let mut filter = if args.extension.is_empty() {
        DiffFilter::c_family()
    } else {
        let mut filter = DiffFilter::new();
        filter.change_types = vec![ChangeType::Add, ChangeType::Modify, ChangeType::Delete];
        for ext in &args.extension {
            filter = filter.extension(ext);
        }
        filter
    };
    filter.allow_merge = args.allow_merge;
    for pattern in &args.allow_path {
        filter = filter.allow_path(pattern).map_err(invalid)?;
    }
    for pattern in &args.block_path {
        filter = filter.block_path(pattern).map_err(invalid)?;
    }
    Ok(filter)
}

/// Builds the tree filter from `--require` tokens.
///
/// # Errors
///
/// Returns [`CliError::InvalidArgument`] for an unknown criterion.
pub fn tree_filter(tokens: &[String]) -> Result<TreeFilter, CliError> {
    if tokens.is_empty() {
        return Ok(TreeFilter::default());
    }
    let criteria = tokens
        .iter()
        .map(|token| {
            TreeCriterion::from_token(token).ok_or_else(|| {
                let known: Vec<&str> = TreeCriterion::ALL.iter().map(|c| c.token()).collect();
                CliError::InvalidArgument {
                    detail: format!("unknown criterion \"{token}\" (expected one of: {})", known.join(", ")),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TreeFilter::new(criteria))
}

/// Maps `mine` arguments onto a [`MiningConfig`].
///
/// # Errors
///
/// Returns [`CliError::InvalidArgument`] for unusable filter arguments or a
/// zero batch size, thread count or variable bound.
pub fn config(args: &MineArgs) -> Result<MiningConfig, CliError> {
    if args.batch_size == 0 {
        return Err(CliError::InvalidArgument {
            detail: "--batch-size must be positive".to_owned(),
        });
    }
    if args.threads == Some(0) {
        return Err(CliError::InvalidArgument {
            detail: "--threads must be positive".to_owned(),
        });
    }
    if args.max_variables == 0 {
        return Err(CliError::InvalidArgument {
            detail: "--max-variables must be positive".to_owned(),
        });
    }
    let transforms = if args.cut_unedited {
        vec![Transform::CutNonEditedSubtrees]
    } else {
        Vec::new()
    };
    Ok(MiningConfig {
        repository: repository_name(args),
        batch_size: args.batch_size,
        threads: args.threads,
        diff_filter: diff_filter(args)?,
        tree_filter: tree_filter(&args.require)?,
        transforms,
        line_graph: line_graph_options(&args.line_graph),
        max_variables: args.max_variables,
        ..MiningConfig::default()
    })
}

fn invalid(e: impl std::fmt::Display) -> CliError {
    CliError::InvalidArgument {
        detail: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Runs the `mine` command.
///
/// # Errors
///
/// Returns [`CliError::WorkersFailed`] if the run was cancelled, and
/// [`CliError::Mining`] if it could not start or finish.
pub fn run(args: &MineArgs, max_file_size: u64, format: OutputFormat) -> Result<(), CliError> {
    let config = config(args)?;
    let sink = DirectorySink::create(&args.output).map_err(|e| CliError::IoError {
        source: e.target,
        detail: e.message,
    })?;
    if sink.has_total() && !args.force {
        info!(
            repository = %config.repository,
            output = %args.output.display(),
            "total result exists; skipping (use --force to mine again)"
        );
        return Ok(());
    }

    let oracle = config.reference_oracle();
    let outcome = if let Some(repo) = &args.repo {
        mine(&GitSource::new(repo), &sink, &oracle, &config)?
    } else if let Some(dir) = &args.patches {
        mine(&DirectorySource::new(dir, max_file_size), &sink, &oracle, &config)?
    } else {
        return Err(CliError::InvalidArgument {
            detail: "one of --repo or --patches is required".to_owned(),
        });
    };
    report(outcome, format)
}

fn report(outcome: MiningOutcome, format: OutputFormat) -> Result<(), CliError> {
    if !outcome.is_complete() {
        return Err(CliError::WorkersFailed {
            skipped: outcome.skipped_batches.len(),
            failures: outcome.failures,
        });
    }
    match format {
        OutputFormat::Human => write_stdout(&outcome.result.to_snapshot()),
        OutputFormat::Json => write_json(&outcome.result),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::wildcard_enum_match_arm)]

    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn mine_args(extra: &[&str]) -> MineArgs {
        let mut argv = vec!["vardiff", "mine", "--patches", "history/linux", "--output", "out"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).expect("parse").command {
            Command::Mine(args) => args,
            _ => panic!("expected mine"),
        }
    }

    #[test]
    fn defaults_mine_c_family_files() {
        let config = config(&mine_args(&[])).expect("config");
        assert_eq!(config.repository, "linux");
        assert_eq!(config.diff_filter.extensions().len(), 7);
        assert!(!config.diff_filter.allow_merge);
        assert_eq!(config.tree_filter.criteria(), TreeFilter::default().criteria());
        assert!(config.transforms.is_empty());
        assert_eq!(config.max_variables, vardiff_core::DEFAULT_MAX_VARIABLES);
    }

    #[test]
    fn max_variables_bounds_the_oracle() {
        let config = config(&mine_args(&["--max-variables", "24"])).expect("config");
        assert_eq!(config.reference_oracle().max_variables, 24);
        let err = config_error(&["--max-variables", "0"]);
        assert!(err.message().contains("--max-variables"), "{}", err.message());
    }

    fn config_error(extra: &[&str]) -> CliError {
        config(&mine_args(extra)).expect_err("rejected")
    }

    #[test]
    fn explicit_extensions_replace_the_preset() {
        let config = config(&mine_args(&["--extension", ".C", "--allow-merge"])).expect("config");
        assert_eq!(config.diff_filter.extensions(), ["c"]);
        assert!(config.diff_filter.allow_merge);
    }

    #[test]
    fn require_tokens_become_criteria() {
        let config = config(&mine_args(&["--require", "edits-to-variability", "--cut-unedited"]))
            .expect("config");
        assert_eq!(config.tree_filter.criteria(), [TreeCriterion::HasEditsToVariability]);
        assert_eq!(config.transforms, vec![Transform::CutNonEditedSubtrees]);
    }

    #[test]
    fn unknown_criterion_is_rejected() {
        let err = config(&mine_args(&["--require", "pretty"])).expect_err("unknown");
        assert_eq!(err.exit_code(), 1);
        assert!(err.message().contains("not-empty"), "{}", err.message());
    }

    #[test]
    fn bad_path_pattern_is_rejected() {
        let err = config(&mine_args(&["--block-path", "("])).expect_err("bad regex");
        assert!(matches!(err, CliError::InvalidArgument { .. }));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(config(&mine_args(&["--batch-size", "0"])).is_err());
    }
}
