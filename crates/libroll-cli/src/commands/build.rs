//! `libroll build`.
//!
//! Loads options (CLI > `LIBROLL_*` env > options file > defaults), reads the
//! workspace graph and hands both to the bundler's [`Executor`]. A batch run
//! returns its outcome; a watch run streams outcomes until Ctrl+C.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libroll_bundler::{
    BuildOutcome, Execution, ExecutionContext, Executor, ProjectGraph, RolldownEngine,
    WatchStream,
};
use libroll_config::RawBuildOptions;
use tokio_stream::StreamExt;

use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use crate::ui;

/// Default graph file, looked up in the workspace root.
pub const GRAPH_FILE: &str = "graph.json";

/// Execute the build command.
///
/// Configuration problems are returned as errors. Build failures come back as
/// an unsuccessful [`BuildOutcome`]; the caller turns that into the exit code.
pub async fn execute(args: BuildArgs) -> Result<BuildOutcome> {
    let cwd = std::env::current_dir()?;
    let workspace_root = match &args.workspace_root {
        Some(root) => resolve_path(root, &cwd),
        None => cwd,
    };
    if !workspace_root.is_dir() {
        return Err(CliError::InvalidArgument(format!(
            "workspace root is not a directory: {}",
            workspace_root.display()
        )));
    }

    let mut raw = RawBuildOptions::load(
        &args.overrides(),
        &workspace_root,
        args.options.as_deref(),
    )?;
    if raw.production.is_none() {
        raw.production = Some(production_from_env(
            std::env::var("NODE_ENV").ok().as_deref(),
        ));
    }

    let graph_path = args
        .graph
        .as_deref()
        .map(|path| resolve_path(path, &workspace_root))
        .unwrap_or_else(|| workspace_root.join(GRAPH_FILE));
    if !graph_path.is_file() {
        return Err(CliError::GraphNotFound(graph_path));
    }
    let graph = ProjectGraph::load(&graph_path, &workspace_root)?;

    let ctx = ExecutionContext::new(&workspace_root, args.project.as_str(), Arc::new(graph))
        .with_target("build");
    let executor = Executor::new(Arc::new(RolldownEngine::default()));

    match executor.run(raw, &ctx).await? {
        Execution::Batch(outcome) => {
            if outcome.success {
                ui::success(&format!("Built {}", args.project));
            } else {
                ui::error(&format!("Build of {} failed", args.project));
            }
            Ok(outcome)
        }
        Execution::Watch(stream) => watch(stream, &args.project).await,
    }
}

/// Consume watch outcomes until the stream ends or Ctrl+C arrives.
///
/// Returns the outcome of the last finished cycle.
async fn watch(mut stream: WatchStream, project: &str) -> Result<BuildOutcome> {
    ui::info(&format!("Watching {project} (press Ctrl+C to stop)"));
    let mut last = BuildOutcome::success();

    loop {
        tokio::select! {
            next = stream.next() => match next {
                Some(outcome) => {
                    if !outcome.success {
                        ui::warning("Build failed, waiting for changes...");
                    }
                    last = outcome;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                ui::info("Stopping watch...");
                break;
            }
        }
    }

    // Dropping the stream releases the file watcher.
    drop(stream);
    Ok(last)
}

/// Production unless `NODE_ENV` names something else.
pub fn production_from_env(node_env: Option<&str>) -> bool {
    match node_env {
        None => true,
        Some(value) => value.trim().is_empty() || value.trim() == "production",
    }
}

fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_from_env() {
        assert!(production_from_env(None));
        assert!(production_from_env(Some("production")));
        assert!(production_from_env(Some("")));
        assert!(!production_from_env(Some("development")));
        assert!(!production_from_env(Some("test")));
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/ws");
        assert_eq!(resolve_path(Path::new("graph.json"), base), PathBuf::from("/ws/graph.json"));
        assert_eq!(resolve_path(Path::new("/other/g.json"), base), PathBuf::from("/other/g.json"));
    }
}
