//! Option normalization.
//!
//! Turns [`RawBuildOptions`] plus workspace context into an immutable
//! [`BuildConfiguration`]: absolute paths, inferred formats, resolved asset
//! rules and a single compiler strategy.

use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;

use crate::error::{ConfigError, Result};
use crate::options::{
    AssetInput, CompilerKind, DependencyField, ExtractCss, Format, RawBuildOptions,
};
use crate::tsconfig::{ModuleKind, read_module_kind};

/// Extensions the transpile-only strategy and the resolver understand.
pub const SOURCE_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx"];

/// Options for the transpile-only strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BabelOptions {
    /// Working directory for config lookup (the project source root)
    pub cwd: PathBuf,
    /// Search parent directories for the root config
    pub root_mode_upward: bool,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
}

/// Options for the fast native strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwcOptions {
    /// tsconfig used for up-front type validation
    pub ts_config: PathBuf,
}

/// Source-transformation toolchain. Exactly one is active per build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerStrategy {
    Tsc,
    Babel(BabelOptions),
    Swc(SwcOptions),
}

impl CompilerStrategy {
    pub fn kind(&self) -> CompilerKind {
        match self {
            CompilerStrategy::Tsc => CompilerKind::Tsc,
            CompilerStrategy::Babel(_) => CompilerKind::Babel,
            CompilerStrategy::Swc(_) => CompilerKind::Swc,
        }
    }

    /// Whether the pipeline carries a type-checked compile stage.
    pub fn requires_type_checker(&self) -> bool {
        matches!(self, CompilerStrategy::Tsc | CompilerStrategy::Babel(_))
    }
}

/// One resolved static-asset copy rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRule {
    /// Absolute directory the glob is matched in
    pub input: PathBuf,
    pub glob: String,
    /// Destination relative to the output path
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSettings {
    pub extract: ExtractCss,
    pub javascript_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestSettings {
    pub generate_exports_field: bool,
    pub update_buildable_project_deps: bool,
    pub dependency_field: DependencyField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Batch,
    Watch,
}

/// Fully resolved build request for one library unit.
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    pub workspace_root: PathBuf,
    /// Absolute path of the unit's `package.json`
    pub project_manifest: PathBuf,
    pub project_root: PathBuf,
    pub source_root: PathBuf,
    pub entry_file: PathBuf,
    /// Directory containing the entry file
    pub entry_root: PathBuf,
    pub ts_config: PathBuf,
    pub output_path: PathBuf,
    pub output_file_name: Option<String>,
    /// Requested formats, non-empty, in request order
    pub formats: Vec<Format>,
    pub module_kind: ModuleKind,
    pub compiler: CompilerStrategy,
    pub external: Vec<String>,
    pub overrides: Vec<String>,
    pub mode: RunMode,
    pub delete_output_path: bool,
    pub styles: StyleSettings,
    pub assets: Vec<AssetRule>,
    pub manifest: ManifestSettings,
    pub production: bool,
}

impl BuildConfiguration {
    /// Source root relative to the project root, with `/` separators (e.g. `src`).
    ///
    /// Empty when the sources live directly in the project root.
    pub fn source_dir(&self) -> String {
        let relative = self
            .source_root
            .strip_prefix(&self.project_root)
            .unwrap_or_else(|_| Path::new(""));
        to_slash(relative)
    }

    /// Whether `format` is among the requested formats.
    pub fn produces(&self, format: Format) -> bool {
        self.formats.contains(&format)
    }

    /// Whether any non-module format is produced.
    pub fn produces_legacy(&self) -> bool {
        self.formats.iter().any(|f| !f.is_module())
    }

    pub fn is_watch(&self) -> bool {
        self.mode == RunMode::Watch
    }
}

/// Resolve raw options against the workspace.
///
/// `source_root` comes from the workspace graph and may be relative to the
/// workspace root; when the graph does not know it the entry directory is used.
pub fn normalize(
    raw: &RawBuildOptions,
    workspace_root: &Path,
    source_root: Option<&Path>,
) -> Result<BuildConfiguration> {
    raw.validate()?;

    let workspace_root = workspace_root.to_path_buf().clean();
    let resolve = |p: &Path| -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf().clean()
        } else {
            workspace_root.join(p).clean()
        }
    };

    let project_manifest = resolve(&raw.project);
    let project_root = parent_dir(&project_manifest);
    let entry_file = resolve(&raw.main);
    let entry_root = parent_dir(&entry_file);
    let ts_config = resolve(&raw.ts_config);
    let output_path = resolve(&raw.output_path);
    let source_root = source_root.map(resolve).unwrap_or_else(|| entry_root.clone());

    if output_path == workspace_root {
        return Err(ConfigError::OutputIsWorkspaceRoot(output_path));
    }

    // Formats given explicitly don't depend on the tsconfig.
    let module_kind = if raw.format.is_empty() {
        read_module_kind(&ts_config)?
    } else {
        read_module_kind(&ts_config).unwrap_or_else(|e| {
            tracing::debug!("Could not read module kind: {}", e);
            ModuleKind::Unspecified
        })
    };

    let formats = resolve_formats(&raw.format, &module_kind);

    let compiler = match raw.compiler {
        CompilerKind::Tsc => CompilerStrategy::Tsc,
        CompilerKind::Babel => CompilerStrategy::Babel(BabelOptions {
            cwd: source_root.clone(),
            root_mode_upward: true,
            extensions: SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude: vec!["node_modules/**".to_string()],
        }),
        CompilerKind::Swc => CompilerStrategy::Swc(SwcOptions {
            ts_config: ts_config.clone(),
        }),
    };

    let assets = raw
        .assets
        .iter()
        .map(|asset| normalize_asset(asset, &workspace_root, &source_root))
        .collect::<Result<Vec<_>>>()?;

    let output_file_name = raw.output_file_name.as_ref().map(|name| {
        Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone())
    });

    Ok(BuildConfiguration {
        workspace_root,
        project_manifest,
        project_root,
        source_root,
        entry_file,
        entry_root,
        ts_config,
        output_path,
        output_file_name,
        formats,
        module_kind,
        compiler,
        external: raw.external.clone(),
        overrides: raw.overrides.clone(),
        mode: if raw.watch {
            RunMode::Watch
        } else {
            RunMode::Batch
        },
        delete_output_path: raw.delete_output_path,
        styles: StyleSettings {
            extract: raw.extract_css.clone(),
            javascript_enabled: raw.javascript_enabled,
        },
        assets,
        manifest: ManifestSettings {
            generate_exports_field: raw.generate_exports_field,
            update_buildable_project_deps: raw.update_buildable_project_deps_in_package_json,
            dependency_field: raw.buildable_project_deps_in_package_json_type,
        },
        production: raw.production.unwrap_or(true),
    })
}

/// Requested formats with duplicates removed, or the format implied by the module kind.
pub fn resolve_formats(requested: &[Format], module_kind: &ModuleKind) -> Vec<Format> {
    if requested.is_empty() {
        return if module_kind.is_legacy() {
            vec![Format::Cjs]
        } else {
            vec![Format::Esm]
        };
    }

    let mut formats = Vec::with_capacity(requested.len());
    for format in requested {
        if !formats.contains(format) {
            formats.push(*format);
        }
    }
    formats
}

fn normalize_asset(
    asset: &AssetInput,
    workspace_root: &Path,
    source_root: &Path,
) -> Result<AssetRule> {
    match asset {
        AssetInput::Path(path) => {
            let asset_path = workspace_root.join(path).clean();
            if !asset_path.starts_with(source_root) {
                return Err(ConfigError::AssetOutsideSourceRoot {
                    asset: path.clone(),
                    source_root: source_root.to_path_buf(),
                });
            }

            let is_dir = asset_path.is_dir();
            let input = if is_dir {
                asset_path.clone()
            } else {
                parent_dir(&asset_path)
            };
            let glob = if is_dir {
                "**/*".to_string()
            } else {
                asset_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            };
            let output = input
                .strip_prefix(source_root)
                .map(Path::to_path_buf)
                .unwrap_or_default();

            Ok(AssetRule {
                input,
                glob,
                output,
            })
        }
        AssetInput::Glob {
            glob,
            input,
            output,
        } => {
            let relative = output.trim_start_matches('/');
            let escapes = Path::new(relative)
                .components()
                .next()
                .is_some_and(|c| matches!(c, Component::ParentDir));
            if output.starts_with("..") || escapes {
                return Err(ConfigError::AssetOutputEscapes(output.clone()));
            }

            Ok(AssetRule {
                input: workspace_root.join(input).clean(),
                glob: glob.clone(),
                output: PathBuf::from(relative),
            })
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Render a relative path with forward slashes.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
