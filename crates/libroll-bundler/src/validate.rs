//! Type validation through the TypeScript compiler.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::{Duration, timeout};

use crate::pipeline::CompilerOptionsOverride;
use crate::{Error, Result};

/// Default timeout for a single compiler run (5 minutes)
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Declaration output requested alongside validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationEmit {
    pub out_dir: PathBuf,
    pub root_dir: PathBuf,
    pub module: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    pub ts_config: PathBuf,
    /// Working directory for the compiler process
    pub cwd: PathBuf,
    /// `None` validates only
    pub emit: Option<DeclarationEmit>,
}

impl ValidationRequest {
    /// Validate only, emitting nothing.
    pub fn check(ts_config: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            ts_config: ts_config.into(),
            cwd: cwd.into(),
            emit: None,
        }
    }

    /// Validate and emit declarations into `out_dir` using the forced compiler options.
    pub fn with_declarations(
        ts_config: impl Into<PathBuf>,
        cwd: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        options: &CompilerOptionsOverride,
    ) -> Self {
        Self {
            ts_config: ts_config.into(),
            cwd: cwd.into(),
            emit: Some(DeclarationEmit {
                out_dir: out_dir.into(),
                root_dir: options.root_dir.clone(),
                module: options.module.clone(),
            }),
        }
    }

    /// Compiler arguments for this request.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-p".to_string(), path_arg(&self.ts_config)];
        match &self.emit {
            None => args.push("--noEmit".to_string()),
            Some(emit) => {
                args.extend([
                    "--declaration".to_string(),
                    "--emitDeclarationOnly".to_string(),
                    "--allowJs".to_string(),
                    "false".to_string(),
                    "--rootDir".to_string(),
                    path_arg(&emit.root_dir),
                    "--outDir".to_string(),
                    path_arg(&emit.out_dir),
                ]);
                if let Some(module) = &emit.module {
                    args.extend(["--module".to_string(), module.clone()]);
                }
            }
        }
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Runs type validation for a project.
#[async_trait]
pub trait TypeValidator: Send + Sync {
    async fn validate(&self, request: &ValidationRequest) -> Result<()>;
}

/// Validator that shells out to `tsc`.
#[derive(Debug, Clone)]
pub struct TscValidator {
    /// Program and leading arguments, e.g. `["npx", "--no-install", "tsc"]`
    command: Vec<String>,
    timeout: Duration,
}

impl Default for TscValidator {
    fn default() -> Self {
        Self {
            command: vec!["npx".into(), "--no-install".into(), "tsc".into()],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl TscValidator {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TypeValidator for TscValidator {
    async fn validate(&self, request: &ValidationRequest) -> Result<()> {
        let Some((program, leading)) = self.command.split_first() else {
            return Err(Error::Validation("no type checker command configured".into()));
        };

        let args = request.args();
        tracing::debug!("Running {} {} {}", program, leading.join(" "), args.join(" "));

        let child = Command::new(program)
            .args(leading)
            .args(&args)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, child)
            .await
            .map_err(|_| {
                Error::Validation(format!(
                    "type checker timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Validation(format!("failed to run {program}: {e}")))?;

        if output.status.success() {
            return Ok(());
        }

        // tsc reports diagnostics on stdout
        let mut report = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !report.is_empty() {
                report.push('\n');
            }
            report.push_str(stderr.trim());
        }
        if report.is_empty() {
            report = format!("{program} exited with {}", output.status);
        }

        Err(Error::Validation(report))
    }
}
