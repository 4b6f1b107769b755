use std::time::Instant;

use libroll_config::BuildConfiguration;

use super::{BuildOutcome, FormatOutput};
use crate::Result;
use crate::engine::BundlerEngine;
use crate::output::delete_output_path;
use crate::pipeline::FormatConfig;

/// Build every format in order, then write the manifest once if all succeeded.
///
/// A failing format is logged and recorded; the remaining formats still run.
pub(crate) async fn run_batch<F>(
    engine: &dyn BundlerEngine,
    config: &BuildConfiguration,
    formats: &[FormatConfig],
    project: &str,
    synthesize: F,
) -> BuildOutcome
where
    F: FnOnce() -> Result<()>,
{
    tracing::info!("Bundling {}...", project);

    if config.delete_output_path {
        if let Err(e) = delete_output_path(&config.output_path, &config.workspace_root) {
            tracing::error!("Error during bundle: {}", e);
            tracing::error!("Bundle failed: {}", project);
            return BuildOutcome::failure();
        }
    }

    let start = Instant::now();
    let mut outputs = Vec::with_capacity(formats.len());

    for format in formats {
        match engine.bundle(format).await {
            Ok(report) => {
                tracing::debug!("{}: wrote {} file(s)", report.format, report.files.len());
                outputs.push(FormatOutput::succeeded(format.format));
            }
            Err(e) => {
                tracing::error!("Error during bundle: {}", e);
                outputs.push(FormatOutput::failed(format.format, e));
            }
        }
    }

    let outcome = BuildOutcome::aggregate(&outputs);
    if !outcome.success {
        tracing::error!("Bundle failed: {}", project);
        return outcome;
    }

    if let Err(e) = synthesize() {
        tracing::error!("Error during bundle: {}", e);
        tracing::error!("Bundle failed: {}", project);
        return BuildOutcome::failure();
    }

    tracing::info!("⚡ Done in {:.2}s", start.elapsed().as_secs_f64());
    outcome
}
