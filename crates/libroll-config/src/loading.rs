use crate::RawBuildOptions;
use crate::error::{ConfigError, Result};
use crate::options::{CompilerKind, Format};
use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Default options file name, looked up in the workspace root.
pub const OPTIONS_FILE: &str = "libroll.json";

/// Options given explicitly on the command line.
///
/// Only fields that are `Some` (or non-empty) take part in the merge, so a flag
/// the user did not pass never clobbers a value from the options file.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_config: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_output_path: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_exports_field: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production: Option<bool>,
}

impl RawBuildOptions {
    /// Load build options from multiple sources.
    /// Priority: CLI overrides > environment variables > options file > defaults
    pub fn load(
        overrides: &OptionOverrides,
        workspace_root: &Path,
        options_path: Option<&Path>,
    ) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(RawBuildOptions::default()));

        let options_file = match options_path {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    workspace_root.join(path)
                };
                if !path.exists() {
                    return Err(ConfigError::Load(format!(
                        "options file not found: {}",
                        path.display()
                    )));
                }
                Some(path)
            }
            None => {
                let default_path = workspace_root.join(OPTIONS_FILE);
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = options_file {
            tracing::debug!("Loading build options from {}", path.display());
            figment = figment.merge(Json::file(path));
        }

        // Env keys arrive lowercased, so only single-word options are accepted
        // (LIBROLL_FORMAT, LIBROLL_COMPILER, LIBROLL_WATCH, ...).
        figment = figment.merge(Env::prefixed("LIBROLL_").only(&[
            "project",
            "main",
            "format",
            "compiler",
            "external",
            "watch",
            "production",
        ]));

        figment = figment.merge(Serialized::defaults(overrides));

        let options: Self = figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: "options".to_string(),
            value: e.to_string(),
            hint: format!("Check {OPTIONS_FILE} syntax and field types"),
        })?;

        options.validate()?;
        Ok(options)
    }

    /// Check that every required option is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("project", &self.project, "Path to the package.json of the library"),
            ("main", &self.main, "Path to the library entry file"),
            ("outputPath", &self.output_path, "Directory that receives the bundle"),
            ("tsConfig", &self.ts_config, "Path to the library tsconfig"),
        ];

        for (field, value, hint) in required {
            if value.as_os_str().is_empty() {
                return Err(ConfigError::missing(field, hint));
            }
        }

        if let Some(name) = &self.output_file_name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "outputFileName".to_string(),
                    value: name.clone(),
                    hint: "Leave unset to keep the entry file name".to_string(),
                });
            }
        }

        Ok(())
    }
}
