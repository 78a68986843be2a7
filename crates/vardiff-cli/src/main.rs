use clap::Parser;

mod cli;
mod cmd;
mod error;
mod io;
mod logging;
mod sink;
mod source;

pub use cli::{Cli, Command, OutputFormat, PathOrStdin};

use error::CliError;

fn dispatch(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Parse { file, line_graph } => {
            let content = io::read_input(file, cli.max_file_size)?;
            cmd::parse::run(&content, &file.label(), line_graph, cli.format)
        }
        Command::Classify { file, semantic } => {
            let content = io::read_input(file, cli.max_file_size)?;
            cmd::classify::run(&content, &file.label(), *semantic, cli.format)
        }
        Command::Import { file, line_graph } => {
            let content = io::read_input(file, cli.max_file_size)?;
            cmd::import::run(&content, &file.label(), line_graph, cli.format)
        }
        Command::Mine(args) => cmd::mine::run(args, cli.max_file_size, cli.format),
        Command::Summarize { files } => cmd::summarize::run(files, cli.max_file_size, cli.format),
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.quiet, cli.verbose);

    if let Err(e) = dispatch(&cli) {
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
