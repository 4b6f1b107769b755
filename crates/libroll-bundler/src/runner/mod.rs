//! Build runner.
//!
//! [`Executor::run`] resolves options, composes the per-format pipelines and
//! then either builds every format once ([`Execution::Batch`]) or hands back a
//! live [`WatchStream`] of outcomes ([`Execution::Watch`]).

mod batch;
mod watch;

pub use self::watch::WatchStream;

use std::path::PathBuf;
use std::sync::Arc;

use libroll_config::{CompilerStrategy, Format, RawBuildOptions, normalize};
use serde_json::Value;

use crate::Result;
use crate::engine::BundlerEngine;
use crate::externals::{ExternalPredicate, ExternalSet, ExternalSources};
use crate::manifest::{DependentManifest, Manifest, ManifestJob, load_manifest};
use crate::pipeline::{OverrideRegistry, PipelineContext, compose};
use crate::validate::{TscValidator, TypeValidator, ValidationRequest};
use crate::workspace::{DependencyKind, ProjectGraph};

/// Who is being built, and the workspace around it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub workspace_root: PathBuf,
    pub project_name: String,
    pub target_name: Option<String>,
    pub configuration_name: Option<String>,
    pub graph: Arc<ProjectGraph>,
}

impl ExecutionContext {
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        project_name: impl Into<String>,
        graph: Arc<ProjectGraph>,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            project_name: project_name.into(),
            target_name: None,
            configuration_name: None,
            graph,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = Some(target.into());
        self
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration_name = Some(configuration.into());
        self
    }
}

/// Result of building one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOutput {
    pub format: Format,
    pub success: bool,
    pub error: Option<String>,
}

impl FormatOutput {
    pub fn succeeded(format: Format) -> Self {
        Self {
            format,
            success: true,
            error: None,
        }
    }

    pub fn failed(format: Format, error: impl ToString) -> Self {
        Self {
            format,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOutcome {
    pub success: bool,
}

impl BuildOutcome {
    pub const fn success() -> Self {
        Self { success: true }
    }

    pub const fn failure() -> Self {
        Self { success: false }
    }

    /// Failed as soon as any format failed.
    pub fn aggregate<'a>(outputs: impl IntoIterator<Item = &'a FormatOutput>) -> Self {
        outputs
            .into_iter()
            .fold(Self::success(), |acc, output| Self {
                success: acc.success && output.success,
            })
    }
}

/// What [`Executor::run`] started.
pub enum Execution {
    Batch(BuildOutcome),
    Watch(WatchStream),
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Execution::Batch(outcome) => f.debug_tuple("Batch").field(outcome).finish(),
            Execution::Watch(stream) => f.debug_tuple("Watch").field(stream).finish(),
        }
    }
}

/// Drives one build of one unit.
pub struct Executor {
    engine: Arc<dyn BundlerEngine>,
    validator: Arc<dyn TypeValidator>,
    overrides: OverrideRegistry,
}

impl Executor {
    pub fn new(engine: Arc<dyn BundlerEngine>) -> Self {
        Self {
            engine,
            validator: Arc::new(TscValidator::default()),
            overrides: OverrideRegistry::new(),
        }
    }

    /// Validator used for up-front type checks.
    pub fn with_validator(mut self, validator: Arc<dyn TypeValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the override registry composition looks names up in.
    pub fn with_overrides(mut self, overrides: OverrideRegistry) -> Self {
        self.overrides = overrides;
        self
    }

    /// Resolve, compose and run.
    ///
    /// Configuration problems are returned as errors before anything runs. Build
    /// failures, including up-front type validation, are reported through the
    /// returned outcome instead.
    pub async fn run(&self, raw: RawBuildOptions, ctx: &ExecutionContext) -> Result<Execution> {
        raw.validate()?;

        let project = ctx.project_name.as_str();
        let graph = &ctx.graph;
        let dependencies = graph.calculate_project_dependencies(project)?;
        let source_root = graph.source_root(project);
        let config = normalize(&raw, &ctx.workspace_root, source_root.as_deref())?;
        let base = load_manifest(&config.project_manifest)?;

        let sources = ExternalSources {
            workspace_dependencies: dependencies
                .iter()
                .filter(|d| d.kind == DependencyKind::Workspace)
                .map(|d| d.name.clone())
                .collect(),
            manifest_dependencies: manifest_keys(&base, "dependencies"),
            explicit: config.external.clone(),
            transitive_packages: graph.transitive_npm_packages(project)?,
        };
        let npm: ExternalSet = graph.npm_dependencies(project).into_iter().collect();
        let external = ExternalPredicate::new(Arc::new(sources.resolve()), Arc::new(npm));

        let pipeline = compose(&PipelineContext {
            config: &config,
            project_name: project,
            external,
            peer_dependencies: manifest_keys(&base, "peerDependencies"),
            dependencies: &dependencies,
            overrides: &self.overrides,
        })?;

        if let CompilerStrategy::Swc(swc) = &config.compiler {
            let request = ValidationRequest::check(&swc.ts_config, &config.workspace_root);
            if let Err(e) = self.validator.validate(&request).await {
                tracing::error!("{}", e);
                return Ok(if config.is_watch() {
                    Execution::Watch(WatchStream::failed(project))
                } else {
                    Execution::Batch(BuildOutcome::failure())
                });
            }
        }

        let job = ManifestJob {
            base,
            config: config.clone(),
            index: pipeline.entries,
            dependencies,
            dependents: DependentManifest::collect(graph, project, &ctx.workspace_root),
        };

        if config.is_watch() {
            let handle = self.engine.watch(pipeline.formats).await?;
            let stream = WatchStream::new(handle, project, move || job.run().map(|_| ()));
            return Ok(Execution::Watch(stream));
        }

        let outcome = batch::run_batch(
            self.engine.as_ref(),
            &config,
            &pipeline.formats,
            project,
            || job.run().map(|_| ()),
        )
        .await;
        Ok(Execution::Batch(outcome))
    }
}

fn manifest_keys(manifest: &Manifest, field: &str) -> Vec<String> {
    manifest
        .get(field)
        .and_then(Value::as_object)
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}
