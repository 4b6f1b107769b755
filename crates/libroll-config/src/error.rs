//! Error types for option loading and normalization.
//!
//! Every variant here is a configuration error: it is raised before any build
//! stage runs and aborts the invocation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required option '{field}'\n\nHint: {hint}")]
    MissingField { field: String, hint: String },

    #[error("invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },

    #[error("asset '{asset}' must be inside the project source root {}", .source_root.display())]
    AssetOutsideSourceRoot { asset: String, source_root: PathBuf },

    #[error("asset output '{0}' would be written outside of the output path")]
    AssetOutputEscapes(String),

    #[error("output path must not be the workspace root: {}", .0.display())]
    OutputIsWorkspaceRoot(PathBuf),

    #[error("failed to load build options: {0}")]
    Load(String),

    #[error("failed to read {}: {message}", .path.display())]
    TsConfig { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn missing(field: &str, hint: &str) -> Self {
        ConfigError::MissingField {
            field: field.to_string(),
            hint: hint.to_string(),
        }
    }
}
