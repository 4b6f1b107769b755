//! Error type for CLI commands.
//!
//! Configuration and bundler errors convert automatically; everything is
//! rendered through miette at the top of `main`.

mod miette;

pub use self::miette::cli_error_to_miette;

use std::path::PathBuf;

use libroll_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Options could not be loaded or resolved
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Raised by the bundler before any format ran
    #[error(transparent)]
    Bundler(#[from] libroll_bundler::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Workspace graph file is missing
    #[error("Workspace graph not found: {}\n\nHint: Pass --graph <file> or generate one at the workspace root", .0.display())]
    GraphNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
