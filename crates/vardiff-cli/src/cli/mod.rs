//! Clap CLI definition: root struct, subcommands, and shared argument types.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// A CLI argument that is either a filesystem path or the stdin sentinel `"-"`.
#[derive(Clone, Debug)]
pub enum PathOrStdin {
    /// Read from standard input.
    Stdin,
    /// Read from the given filesystem path.
    Path(PathBuf),
}

impl std::str::FromStr for PathOrStdin {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-" {
            Ok(PathOrStdin::Stdin)
        } else {
            Ok(PathOrStdin::Path(PathBuf::from(s)))
        }
    }
}

impl PathOrStdin {
    /// Label used in tree sources and error messages.
    pub fn label(&self) -> String {
        match self {
            PathOrStdin::Stdin => "-".to_owned(),
            PathOrStdin::Path(path) => path.display().to_string(),
        }
    }
}

/// Output format for CLI commands.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default).
    Human,
    /// A single JSON object on stdout.
    Json,
}

/// Shape of exported diff trees.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum GraphFormatArg {
    /// One tree per patch, rooted at ROOT.
    Tree,
    /// ROOT removed; top-level nodes become roots.
    Graph,
}

/// Encoding of node labels in line graphs.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum NodeFormatArg {
    /// Diff type, code type, and label text.
    Labeled,
    /// Diff type and code type only.
    Type,
}

/// Options shared by commands that read or write line graphs.
#[derive(Args, Clone, Debug)]
pub struct LineGraphArgs {
    /// Shape of the trees: tree (default) or graph.
    #[arg(long, default_value = "tree", value_enum)]
    pub graph_format: GraphFormatArg,
    /// Node label encoding: labeled (default) or type.
    #[arg(long, default_value = "labeled", value_enum)]
    pub node_format: NodeFormatArg,
}

/// Arguments of `vardiff mine`.
#[derive(Args, Clone, Debug)]
pub struct MineArgs {
    /// Git working copy to mine.
    #[arg(long, value_name = "DIR", conflicts_with = "patches", required_unless_present = "patches")]
    pub repo: Option<PathBuf>,
    /// Directory of `<commit>.diff` files to mine instead of a git repository.
    #[arg(long, value_name = "DIR")]
    pub patches: Option<PathBuf>,
    /// Directory receiving the batch line graphs and metadata.
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output: PathBuf,
    /// Commits per batch.
    #[arg(long, env = "VARDIFF_BATCH_SIZE", default_value = "1000")]
    pub batch_size: usize,
    /// Worker threads (default: available parallelism).
    #[arg(long, env = "VARDIFF_THREADS")]
    pub threads: Option<usize>,
    /// Largest number of distinct literals per satisfiability query; patches
    /// needing more are logged and counted as classification failures.
    #[arg(long, env = "VARDIFF_MAX_VARIABLES", default_value = "16")]
    pub max_variables: usize,
    /// Only mine files with this extension (repeatable; default: C family).
    #[arg(long, value_name = "EXT")]
    pub extension: Vec<String>,
    /// Only mine paths fully matching this regex (repeatable).
    #[arg(long, value_name = "REGEX")]
    pub allow_path: Vec<String>,
    /// Never mine paths fully matching this regex (repeatable).
    #[arg(long, value_name = "REGEX")]
    pub block_path: Vec<String>,
    /// Include merge commits.
    #[arg(long)]
    pub allow_merge: bool,
    /// Export only trees meeting this criterion (repeatable): not-empty,
    /// more-than-one-artifact, consistent, edits-to-variability.
    #[arg(long, value_name = "CRITERION")]
    pub require: Vec<String>,
    /// Remove subtrees without edits before filtering.
    #[arg(long)]
    pub cut_unedited: bool,
    /// Mine even if the output directory already holds a total result.
    #[arg(long)]
    pub force: bool,
    /// Line-graph export options.
    #[command(flatten)]
    pub line_graph: LineGraphArgs,
}

/// All top-level subcommands exposed by the `vardiff` binary.
#[derive(Subcommand)]
pub enum Command {
    /// Parse one file diff and print its line graph.
    Parse {
        /// Path to a unified diff of one file, or `-` for stdin.
        #[arg(value_name = "PATCH")]
        file: PathOrStdin,
        /// Line-graph export options.
        #[command(flatten)]
        line_graph: LineGraphArgs,
    },

    /// Classify every artifact of a file diff by its edit pattern.
    Classify {
        /// Path to a unified diff of one file, or `-` for stdin.
        #[arg(value_name = "PATCH")]
        file: PathOrStdin,

        /// Also report semantic patterns (such as a moved `#else`) found on
        /// directive lines.
        #[arg(long)]
        semantic: bool,
    },

    /// Decode a line-graph file and print per-tree statistics.
    Import {
        /// Path to a line-graph file, or `-` for stdin.
        #[arg(value_name = "LINEGRAPH")]
        file: PathOrStdin,
        /// Line-graph decoding options.
        #[command(flatten)]
        line_graph: LineGraphArgs,
    },

    /// Mine a history for variability-aware edits.
    Mine(MineArgs),

    /// Combine metadata snapshot files into one.
    Summarize {
        /// Metadata files written by `vardiff mine`.
        #[arg(value_name = "METADATA", num_args = 1.., required = true)]
        files: Vec<PathBuf>,
    },
}

/// Root CLI struct for the `vardiff` binary.
///
/// All global flags are marked `global = true` so that clap propagates them
/// to every subcommand.
#[derive(Parser)]
#[command(
    name = "vardiff",
    version,
    about = "Variability-aware diff miner",
    long_about = "Parses C preprocessor edits into variation diff trees, classifies\n\
                  them by edit pattern, and mines whole histories in parallel batches."
)]
pub struct Cli {
    /// Active subcommand.
    #[command(subcommand)]
    pub command: Command,

    /// Output format: human (default) or json.
    #[arg(long, short = 'f', default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Only log errors (incompatible with `--verbose`).
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log per-commit and per-patch detail (incompatible with `--quiet`).
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Maximum input file size in bytes.
    ///
    /// Can also be set via the `VARDIFF_MAX_FILE_SIZE` environment variable.
    /// Default: 268435456 (256 MB).
    #[arg(
        long,
        global = true,
        env = "VARDIFF_MAX_FILE_SIZE",
        default_value = "268435456"
    )]
    pub max_file_size: u64,
}
