//! libroll CLI entry point.
//!
//! Parses arguments, installs logging and dispatches to the command.

use clap::Parser;
use libroll_cli::{cli, commands, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Build(build_args) => commands::build_execute(build_args).await,
    };

    match result {
        Ok(outcome) if outcome.success => Ok(()),
        Ok(_) => std::process::exit(1),
        Err(e) => Err(error::cli_error_to_miette(e)),
    }
}
