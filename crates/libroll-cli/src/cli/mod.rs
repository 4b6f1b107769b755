//! Command-line interface definition.
//!
//! - `libroll build <project>` - bundle one workspace library, once or in
//!   watch mode

mod commands;
pub mod enums;

use clap::Parser;

pub use commands::{BuildArgs, Command};
pub use enums::{CompilerArg, FormatArg};

/// libroll - build workspace libraries into publishable packages
#[derive(Parser, Debug)]
#[command(
    name = "libroll",
    version,
    about = "Build workspace libraries into publishable packages",
    long_about = "libroll bundles one library of a monorepo into ESM, CommonJS or UMD output\n\
                  and writes a package.json whose exports map points at every entry point."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}
