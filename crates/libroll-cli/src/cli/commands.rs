use std::path::PathBuf;

use clap::{Args, Subcommand};
use libroll_config::OptionOverrides;

use crate::cli::enums::{CompilerArg, FormatArg};

/// Available libroll subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build one library of the workspace
    ///
    /// Bundles the library once per requested format, then writes its
    /// package.json into the output directory. With --watch, rebuilds on
    /// every source change until interrupted.
    Build(BuildArgs),
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project name, as it appears in the workspace graph
    #[arg(value_name = "PROJECT")]
    pub project: String,

    /// Workspace root [default: current directory]
    #[arg(long, value_name = "DIR")]
    pub workspace_root: Option<PathBuf>,

    /// Workspace graph file [default: <workspace-root>/graph.json]
    #[arg(long, value_name = "FILE")]
    pub graph: Option<PathBuf>,

    /// Build options file [default: <workspace-root>/libroll.json]
    #[arg(long, value_name = "FILE")]
    pub options: Option<PathBuf>,

    /// The library's package.json, relative to the workspace root
    #[arg(long = "package", value_name = "FILE")]
    pub package: Option<PathBuf>,

    /// Entry file, relative to the workspace root
    #[arg(long, value_name = "FILE")]
    pub main: Option<PathBuf>,

    /// Output directory, relative to the workspace root
    #[arg(long, value_name = "DIR")]
    pub output_path: Option<PathBuf>,

    /// TypeScript configuration of the library
    #[arg(long = "ts-config", value_name = "FILE")]
    pub ts_config: Option<PathBuf>,

    /// Formats to produce, comma separated
    ///
    /// Inferred from the tsconfig module kind when neither this flag nor the
    /// options file sets it.
    #[arg(short = 'f', long, value_enum, value_delimiter = ',')]
    pub format: Vec<FormatArg>,

    /// Compiler used before bundling
    #[arg(long, value_enum)]
    pub compiler: Option<CompilerArg>,

    /// Module to keep out of the bundle (repeatable)
    #[arg(short = 'e', long, value_name = "NAME")]
    pub external: Vec<String>,

    /// Named configuration override, applied in order (repeatable)
    #[arg(long = "override", value_name = "NAME")]
    pub overrides: Vec<String>,

    /// Rebuild on every change until interrupted
    #[arg(short, long)]
    pub watch: bool,

    /// Keep existing files in the output directory
    #[arg(long)]
    pub no_delete_output_path: bool,

    /// Write a conditional exports map into package.json
    #[arg(long)]
    pub generate_exports_field: bool,

    /// Production build [default when NODE_ENV is unset]
    #[arg(long, conflicts_with = "development")]
    pub production: bool,

    /// Development build
    #[arg(long)]
    pub development: bool,
}

impl BuildArgs {
    /// Options given on the command line. Flags left at their default are
    /// omitted so they never replace a value from the options file.
    pub fn overrides(&self) -> OptionOverrides {
        OptionOverrides {
            project: self.package.clone(),
            main: self.main.clone(),
            output_path: self.output_path.clone(),
            ts_config: self.ts_config.clone(),
            format: self.format.iter().copied().map(Into::into).collect(),
            compiler: self.compiler.map(Into::into),
            external: self.external.clone(),
            overrides: self.overrides.clone(),
            watch: self.watch.then_some(true),
            delete_output_path: self.no_delete_output_path.then_some(false),
            generate_exports_field: self.generate_exports_field.then_some(true),
            production: self.production_flag(),
        }
    }

    /// `Some` only when `--production` or `--development` was passed.
    pub fn production_flag(&self) -> Option<bool> {
        match (self.production, self.development) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
