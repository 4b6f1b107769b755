//! # libroll-bundler
//!
//! Builds one library unit of a workspace into one bundle per module format
//! and writes the `package.json` consumers resolve it through.
//!
//! Data flows through four stages:
//!
//! 1. [`externals`] merges workspace, manifest, explicit and transitive registry
//!    dependencies into one shared predicate.
//! 2. [`pipeline`] composes an ordered [`Stage`] list and an output descriptor
//!    per format, applies named overrides and scans the entry points.
//! 3. [`runner`] drives a [`BundlerEngine`] once (batch) or continuously (watch)
//!    and folds per-format outcomes into one [`BuildOutcome`].
//! 4. [`manifest`] synthesizes the conditional `exports` map and writes it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use libroll_bundler::{Execution, ExecutionContext, Executor, ProjectGraph, RolldownEngine};
//! use libroll_config::RawBuildOptions;
//!
//! # async fn run() -> libroll_bundler::Result<()> {
//! let graph = ProjectGraph::load("graph.json".as_ref(), ".".as_ref())?;
//! let ctx = ExecutionContext::new(".", "ui", Arc::new(graph));
//! let executor = Executor::new(Arc::new(RolldownEngine::default()));
//!
//! let raw = RawBuildOptions {
//!     project: "libs/ui/package.json".into(),
//!     main: "libs/ui/src/index.ts".into(),
//!     output_path: "dist/libs/ui".into(),
//!     ts_config: "libs/ui/tsconfig.lib.json".into(),
//!     ..Default::default()
//! };
//!
//! if let Execution::Batch(outcome) = executor.run(raw, &ctx).await? {
//!     assert!(outcome.success);
//! }
//! # Ok(()) }
//! ```

pub mod diagnostics;
pub mod engine;
pub mod entries;
pub mod externals;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod validate;
pub mod workspace;

use std::path::PathBuf;

use libroll_config::{ConfigError, Format};

pub use engine::{BundleReport, BundlerEngine, RolldownEngine, WatchEvent, WatchHandle};
pub use entries::{EntryPointIndex, scan_entries};
pub use externals::{ExternalPredicate, ExternalSet, ExternalSources};
pub use pipeline::{
    ComposedPipeline, FormatConfig, OverrideFn, OverrideRegistry, PipelineContext, Stage, compose,
};
pub use runner::{
    BuildOutcome, Execution, ExecutionContext, Executor, FormatOutput, WatchStream,
};
pub use validate::{TscValidator, TypeValidator, ValidationRequest};
pub use workspace::{DependencyKind, DependencyTarget, DependentProject, ProjectGraph};

/// Error types for libroll-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Options could not be resolved; nothing was built.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Type validation failed before bundling.
    #[error("Type validation failed: {0}")]
    Validation(String),

    /// One format's bundle failed.
    #[error("Failed to bundle {format}: {}", diagnostics::summarize(.diagnostics))]
    Bundler {
        format: Format,
        diagnostics: Vec<diagnostics::ExtractedDiagnostic>,
    },

    /// The watcher could not be started or a rebuild cycle failed.
    #[error("Watch error: {0}")]
    WatchCycle(String),

    /// A package.json could not be read or written.
    #[error("Manifest error at {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("Unknown override '{0}'")]
    UnknownOverride(String),

    /// The project is missing from the workspace graph.
    #[error("Project '{0}' not found in the workspace graph")]
    UnknownProject(String),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("Write failure: {0}")]
    WriteFailure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for libroll-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a bundler error for `format` from a Rolldown error.
    pub fn from_rolldown_batch(format: Format, error: &dyn std::fmt::Debug) -> Self {
        Error::Bundler {
            format,
            diagnostics: diagnostics::extract_from_rolldown_error(error),
        }
    }

    pub(crate) fn manifest(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Manifest {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Bundler { .. } => "BUNDLER_ERROR",
            Error::WatchCycle(_) => "WATCH_ERROR",
            Error::Manifest { .. } => "MANIFEST_ERROR",
            Error::UnknownOverride(_) => "UNKNOWN_OVERRIDE",
            Error::UnknownProject(_) => "UNKNOWN_PROJECT",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::WriteFailure(_) => "WRITE_FAILURE",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Validation(_) => Some(Box::new(
                "Fix the reported type errors, or switch `compiler` to babel or tsc to check types during bundling.",
            )),
            Error::Bundler { diagnostics, .. } => match diagnostics.as_slice() {
                [single] => single
                    .help
                    .as_ref()
                    .map(|h| Box::new(h.clone()) as Box<dyn std::fmt::Display>),
                [] => None,
                _ => Some(Box::new(
                    "Multiple bundler errors occurred. See details above.".to_string(),
                )),
            },
            Error::UnknownOverride(name) => Some(Box::new(format!(
                "'{}' is not a registered override. Built-in overrides: sourcemap, minify",
                name
            ))),
            Error::UnknownProject(_) => Some(Box::new(
                "Regenerate the graph file or check the project name.",
            )),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it stays inside the output directory.",
                path
            ))),
            Error::WriteFailure(msg) => Some(Box::new(format!(
                "Failed to write file. Check disk space and permissions.\nError: {}",
                msg
            ))),
            _ => None,
        }
    }
}
