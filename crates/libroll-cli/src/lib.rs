//! libroll CLI.
//!
//! Command-line front end for `libroll-bundler`: one `build` command that
//! bundles a single workspace library, once or continuously.
//!
//! - [`cli`] - clap argument definitions
//! - [`commands`] - command implementations
//! - [`error`] - CLI error type and miette conversion
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines for the terminal

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result};
