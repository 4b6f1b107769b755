//! Raw build options as authored in `libroll.json` or passed on the command line.
//!
//! These types are deliberately loose: paths are workspace-relative strings and
//! most fields are optional. [`crate::normalize`] turns them into a resolved
//! [`crate::BuildConfiguration`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Output module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// ECMAScript modules (`import`/`export`)
    Esm,
    /// CommonJS (`require`/`module.exports`)
    Cjs,
    /// Universal module definition
    Umd,
}

impl Format {
    /// Whether this is the ECMAScript module format.
    pub fn is_module(self) -> bool {
        matches!(self, Format::Esm)
    }

    /// File extension used for bundles of this format (without the dot).
    pub fn extension(self) -> &'static str {
        if self.is_module() { "js" } else { "cjs" }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Esm => "esm",
            Format::Cjs => "cjs",
            Format::Umd => "umd",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "esm" | "es" | "module" => Ok(Format::Esm),
            "cjs" | "commonjs" => Ok(Format::Cjs),
            "umd" => Ok(Format::Umd),
            other => Err(ConfigError::InvalidValue {
                field: "format".to_string(),
                value: other.to_string(),
                hint: "Expected one of: esm, cjs, umd".to_string(),
            }),
        }
    }
}

/// Which toolchain turns sources into bundler-ready modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    /// Type-checked compile followed by a transpile-only pass
    #[default]
    Babel,
    /// Type-checked compile only
    Tsc,
    /// Fast native compile; types are validated up front
    Swc,
}

impl fmt::Display for CompilerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompilerKind::Babel => "babel",
            CompilerKind::Tsc => "tsc",
            CompilerKind::Swc => "swc",
        })
    }
}

impl FromStr for CompilerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "babel" => Ok(CompilerKind::Babel),
            "tsc" => Ok(CompilerKind::Tsc),
            "swc" => Ok(CompilerKind::Swc),
            other => Err(ConfigError::InvalidValue {
                field: "compiler".to_string(),
                value: other.to_string(),
                hint: "Expected one of: babel, tsc, swc".to_string(),
            }),
        }
    }
}

/// Static asset to copy next to the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AssetInput {
    /// A file or directory inside the project source root
    Path(String),
    /// Explicit glob copied from `input` into `output` (relative to the output path)
    Glob {
        glob: String,
        input: String,
        output: String,
    },
}

/// CSS extraction: either inline (`false`), next to the bundle (`true`), or into a named file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ExtractCss {
    Enabled(bool),
    File(String),
}

impl Default for ExtractCss {
    fn default() -> Self {
        ExtractCss::Enabled(true)
    }
}

impl ExtractCss {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ExtractCss::Enabled(false))
    }
}

/// Manifest field that receives recorded dependency versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum DependencyField {
    #[default]
    PeerDependencies,
    Dependencies,
}

impl DependencyField {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyField::PeerDependencies => "peerDependencies",
            DependencyField::Dependencies => "dependencies",
        }
    }
}

/// Build options before normalization.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawBuildOptions {
    /// The unit's `package.json`, relative to the workspace root
    #[serde(default)]
    pub project: PathBuf,

    /// Entry file, relative to the workspace root (e.g. `libs/ui/src/index.ts`)
    #[serde(default)]
    pub main: PathBuf,

    /// Output directory, relative to the workspace root
    #[serde(default)]
    pub output_path: PathBuf,

    /// TypeScript configuration used for compilation and type validation
    #[serde(default)]
    pub ts_config: PathBuf,

    /// Rename the primary entry's output (only the file stem is used)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_name: Option<String>,

    /// Formats to produce; inferred from the tsconfig module kind when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,

    #[serde(default)]
    pub compiler: CompilerKind,

    /// Extra module names to keep out of the bundle
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<String>,

    /// Named configuration overrides, applied in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<String>,

    #[serde(default)]
    pub watch: bool,

    #[serde(default = "default_true")]
    pub delete_output_path: bool,

    #[serde(default)]
    pub extract_css: ExtractCss,

    /// Passed through to the less preprocessor
    #[serde(default)]
    pub javascript_enabled: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetInput>,

    #[serde(default)]
    pub generate_exports_field: bool,

    #[serde(default = "default_true")]
    pub update_buildable_project_deps_in_package_json: bool,

    #[serde(default)]
    pub buildable_project_deps_in_package_json_type: DependencyField,

    /// Production build; defaults to `true` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl Default for RawBuildOptions {
    fn default() -> Self {
        Self {
            project: PathBuf::new(),
            main: PathBuf::new(),
            output_path: PathBuf::new(),
            ts_config: PathBuf::new(),
            output_file_name: None,
            format: Vec::new(),
            compiler: CompilerKind::default(),
            external: Vec::new(),
            overrides: Vec::new(),
            watch: false,
            delete_output_path: true,
            extract_css: ExtractCss::default(),
            javascript_enabled: false,
            assets: Vec::new(),
            generate_exports_field: false,
            update_buildable_project_deps_in_package_json: true,
            buildable_project_deps_in_package_json_type: DependencyField::default(),
            production: None,
        }
    }
}

impl RawBuildOptions {
    /// JSON Schema for `libroll.json`.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(RawBuildOptions);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }
}
