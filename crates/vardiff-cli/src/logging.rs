//! Tracing subscriber setup.
//!
//! Logs go to stderr so that stdout carries only command output. `RUST_LOG`
//! selects the filter unless `--quiet` or `--verbose` is given, which pin it
//! to `error` and `debug` respectively.
use tracing_subscriber::EnvFilter;

/// Filter used when neither a flag nor `RUST_LOG` selects one.
const DEFAULT_LEVEL: &str = "info";

/// Builds the filter for the given verbosity flags.
pub fn filter(quiet: bool, verbose: bool) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
    }
}

/// Installs the global stderr subscriber. Call once, before any command runs.
pub fn init(quiet: bool, verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(quiet, verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
