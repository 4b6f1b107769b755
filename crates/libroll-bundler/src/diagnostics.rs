//! Diagnostic extraction from Rolldown errors.
//!
//! Rolldown reports failures as batched diagnostics whose concrete types shift
//! between releases, so they are flattened into [`ExtractedDiagnostic`] from
//! their debug rendering.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedDiagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: Option<String>,
    pub help: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MissingExport,
    ParseError,
    UnresolvedEntry,
    UnresolvedImport,
    Plugin,
    Other(String),
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::MissingExport => write!(f, "MissingExport"),
            DiagnosticKind::ParseError => write!(f, "ParseError"),
            DiagnosticKind::UnresolvedEntry => write!(f, "UnresolvedEntry"),
            DiagnosticKind::UnresolvedImport => write!(f, "UnresolvedImport"),
            DiagnosticKind::Plugin => write!(f, "Plugin"),
            DiagnosticKind::Other(s) => write!(f, "{}", s),
        }
    }
}

impl ExtractedDiagnostic {
    pub fn other(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Other(kind.to_string()),
            message: message.into(),
            file: None,
            help: None,
        }
    }
}

/// Flatten a Rolldown error into diagnostics.
pub fn extract_from_rolldown_error(error: &dyn fmt::Debug) -> Vec<ExtractedDiagnostic> {
    let rendered = format!("{error:?}");
    vec![classify(&rendered)]
}

fn classify(rendered: &str) -> ExtractedDiagnostic {
    let (kind, help) = if rendered.contains("MissingExport") {
        (
            DiagnosticKind::MissingExport,
            Some("Check that the imported name is exported by the target module"),
        )
    } else if rendered.contains("UnresolvedEntry") {
        (
            DiagnosticKind::UnresolvedEntry,
            Some("Check that `main` points at an existing file"),
        )
    } else if rendered.contains("UnresolvedImport") {
        (
            DiagnosticKind::UnresolvedImport,
            Some("Install the package or mark it as external"),
        )
    } else if rendered.contains("Parse") || rendered.contains("Syntax") {
        (DiagnosticKind::ParseError, None)
    } else if rendered.contains("Plugin") {
        (DiagnosticKind::Plugin, None)
    } else {
        (DiagnosticKind::Other("BundlerError".to_string()), None)
    };

    ExtractedDiagnostic {
        kind,
        message: first_message_line(rendered),
        file: extract_file(rendered),
        help: help.map(str::to_string),
    }
}

fn first_message_line(rendered: &str) -> String {
    rendered
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Unknown bundler error")
        .to_string()
}

fn extract_file(rendered: &str) -> Option<String> {
    const SOURCE_EXTENSIONS: &[&str] = &[".tsx", ".ts", ".jsx", ".mjs", ".cjs", ".js"];

    rendered
        .split(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '(' || c == ')')
        .find(|token| {
            (token.starts_with('/') || token.starts_with("./"))
                && SOURCE_EXTENSIONS.iter().any(|ext| token.ends_with(ext))
        })
        .map(str::to_string)
}

/// One-line summary of a diagnostic list.
pub fn summarize(diagnostics: &[ExtractedDiagnostic]) -> String {
    match diagnostics {
        [] => "Unknown bundler error".to_string(),
        [single] => format!("{}: {}", single.kind, single.message),
        many => format!(
            "{} errors: {}",
            many.len(),
            many.iter()
                .map(|d| format!("{}: {}", d.kind, d.message))
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
}
