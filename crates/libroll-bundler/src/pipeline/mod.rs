//! Per-format pipeline composition.
//!
//! For each requested format [`compose`] builds an ordered stage list and an
//! output descriptor, folds the configured overrides over it, then rescans the
//! entry points so every export has a produced file.

mod overrides;
mod stage;

pub use overrides::{OverrideFn, OverrideRegistry, apply_chain};
pub use stage::{
    CompilerOptionsOverride, CopyTarget, Stage, StagePhase, StyleOptions, TranspileOptions,
    TypeCheckOptions, is_ordered,
};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use libroll_config::{
    BuildConfiguration, CompilerStrategy, Format, ModuleKind, SOURCE_EXTENSIONS, to_slash,
};

use crate::Result;
use crate::entries::{EntryPointIndex, scan_entries};
use crate::externals::ExternalPredicate;
use crate::workspace::{DependencyKind, DependentProject};

/// Output descriptor plus stage list for one format.
#[derive(Debug, Clone)]
pub struct FormatConfig {
    /// Module format of every file this config emits
    pub format: Format,
    /// Bundle input name → source file, primary entry first
    pub input: IndexMap<String, PathBuf>,
    /// Directory module resolution starts from
    pub cwd: PathBuf,
    /// Output directory, the unit's output path
    pub dir: PathBuf,
    /// `[name].<ext>` pattern for entry chunks
    pub entry_file_names: String,
    /// Pattern for shared chunks split out of the entries
    pub chunk_file_names: String,
    /// Global name for UMD bundles
    pub name: String,
    /// Requests left as imports instead of bundled
    pub external: ExternalPredicate,
    /// Stage list in phase order
    pub stages: Vec<Stage>,
    pub sourcemap: bool,
    pub minify: bool,
    /// Replaces `process.env.NODE_ENV` with `"production"` or `"development"`
    pub production: bool,
    /// Directories a watcher should observe for this format
    pub watch_roots: Vec<PathBuf>,
}

impl FormatConfig {
    /// First stage with the given [`Stage::name`].
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name() == name)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }
}

/// Everything composition needs besides the resolved configuration.
pub struct PipelineContext<'a> {
    pub config: &'a BuildConfiguration,
    pub project_name: &'a str,
    /// Shared predicate, identical for every format
    pub external: ExternalPredicate,
    /// `peerDependencies` keys of the unit's manifest
    pub peer_dependencies: Vec<String>,
    pub dependencies: &'a [DependentProject],
    pub overrides: &'a OverrideRegistry,
}

#[derive(Debug, Clone)]
pub struct ComposedPipeline {
    pub formats: Vec<FormatConfig>,
    pub entries: EntryPointIndex,
}

/// Build one [`FormatConfig`] per requested format.
///
/// Named overrides run in the order they were requested, before discovered
/// entry points are added as extra inputs.
///
/// # Errors
///
/// Returns an error if the entry scan fails or an override name is not
/// registered.
pub fn compose(ctx: &PipelineContext<'_>) -> Result<ComposedPipeline> {
    let config = ctx.config;
    let chain = ctx.overrides.resolve(&config.overrides)?;
    let source_dir = config.source_dir();
    let mut entries = EntryPointIndex::new(source_dir.clone());
    let mut formats = Vec::with_capacity(config.formats.len());

    for &format in &config.formats {
        let base = compose_format(ctx, format);
        let mut composed = apply_chain(&chain, base, config);

        let scanned = scan_entries(&config.entry_root, &config.source_root, &source_dir)?;
        add_discovered_inputs(&mut composed, &scanned);
        entries.merge(scanned);

        debug_assert!(is_ordered(&composed.stages));
        tracing::debug!(
            "Composed {} pipeline: [{}] with {} inputs",
            format,
            composed.stage_names().join(", "),
            composed.input.len()
        );
        formats.push(composed);
    }

    Ok(ComposedPipeline { formats, entries })
}

fn compose_format(ctx: &PipelineContext<'_>, format: Format) -> FormatConfig {
    let config = ctx.config;
    let extension = format.extension();

    FormatConfig {
        format,
        input: primary_input(config),
        cwd: config.workspace_root.clone(),
        dir: config.output_path.clone(),
        entry_file_names: format!("[name].{extension}"),
        chunk_file_names: format!("[name].{extension}"),
        name: class_name(ctx.project_name),
        external: ctx.external.clone(),
        stages: compose_stages(ctx, format),
        sourcemap: false,
        minify: false,
        production: config.production,
        watch_roots: vec![config.source_root.clone()],
    }
}

fn compose_stages(ctx: &PipelineContext<'_>, format: Format) -> Vec<Stage> {
    let config = ctx.config;
    let mut stages = vec![
        Stage::CopyAssets(
            config
                .assets
                .iter()
                .map(|rule| CopyTarget {
                    input: rule.input.clone(),
                    glob: rule.glob.clone(),
                    output: config.output_path.join(&rule.output),
                })
                .collect(),
        ),
        Stage::InlineImages,
        Stage::InlineJson,
    ];

    if config.compiler.requires_type_checker() {
        stages.push(Stage::TypeCheck(TypeCheckOptions {
            ts_config: config.ts_config.clone(),
            compiler_options: CompilerOptionsOverride {
                root_dir: config.project_root.clone(),
                allow_js: false,
                declaration: true,
                paths: compiler_paths(&config.workspace_root, ctx.dependencies),
                module: matches!(config.module_kind, ModuleKind::CommonJs)
                    .then(|| "ESNext".to_string()),
            },
        }));
    }

    stages.push(Stage::PeerDepsExternal {
        manifest: config.project_manifest.clone(),
        peers: ctx.peer_dependencies.clone(),
    });
    stages.push(Stage::Styles(StyleOptions {
        inject: true,
        extract: config.styles.extract.clone(),
        auto_modules: true,
        autoprefixer: true,
        less_javascript_enabled: config.styles.javascript_enabled,
    }));
    stages.push(Stage::Resolve {
        prefer_builtins: true,
        extensions: SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
    });

    match &config.compiler {
        CompilerStrategy::Swc(swc) => stages.push(Stage::NativeCompile {
            ts_config: swc.ts_config.clone(),
        }),
        CompilerStrategy::Babel(babel) => stages.push(Stage::Transpile(TranspileOptions {
            cwd: babel.cwd.clone(),
            root_mode_upward: babel.root_mode_upward,
            extensions: babel.extensions.clone(),
            exclude: babel.exclude.clone(),
            bundled_helpers: true,
            async_to_promises: !format.is_module(),
        })),
        // the type-checked compile stage above already emits JavaScript
        CompilerStrategy::Tsc => {}
    }

    stages.push(Stage::CommonJs);
    stages.push(Stage::Analyze);
    stages
}

/// File stem the main entry is emitted under, relative to the source dir.
///
/// `outputFileName` wins; otherwise the entry path below the source root.
pub(crate) fn primary_key(config: &BuildConfiguration) -> String {
    match &config.output_file_name {
        Some(name) => name.clone(),
        None => {
            let relative = config
                .entry_file
                .strip_prefix(&config.source_root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| {
                    PathBuf::from(config.entry_file.file_name().unwrap_or_default())
                });
            to_slash(&relative.with_extension(""))
        }
    }
}

fn primary_input(config: &BuildConfiguration) -> IndexMap<String, PathBuf> {
    let key = primary_key(config);
    let source_dir = config.source_dir();
    let name = if source_dir.is_empty() {
        key
    } else {
        format!("{source_dir}/{key}")
    };

    let mut input = IndexMap::new();
    input.insert(name, config.entry_file.clone());
    input
}

fn add_discovered_inputs(config: &mut FormatConfig, entries: &EntryPointIndex) {
    for (key, path) in entries.iter() {
        if config.input.values().any(|existing| existing == path) {
            continue;
        }
        config
            .input
            .entry(entries.input_name(key))
            .or_insert_with(|| path.to_path_buf());
    }
}

/// `paths` entries pointing workspace packages at their sources.
fn compiler_paths(
    workspace_root: &Path,
    dependencies: &[DependentProject],
) -> BTreeMap<String, Vec<String>> {
    dependencies
        .iter()
        .filter(|d| d.kind == DependencyKind::Workspace)
        .filter_map(|d| {
            let root = d.source_root.as_ref()?;
            let path = workspace_root.join(root).to_string_lossy().into_owned();
            Some((d.name.clone(), vec![path]))
        })
        .collect()
}

/// `my-lib` → `MyLib`, `@acme/ui-kit` → `AcmeUiKit`.
pub fn class_name(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
