//! Rolldown-backed engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use libroll_config::{ExtractCss, Format};
use rolldown::{
    BundlerBuilder, BundlerOptions, InputItem, OutputFormat, Platform, RawMinifyOptions,
    ResolveOptions, SourceMapType,
};
use rolldown_common::Output;
use rolldown_plugin::__inner::SharedPluginable;

use super::plugins::{ExternalsPlugin, MediaPlugin};
use super::{BundleReport, BundlerEngine, WatchHandle};
use crate::output::{OutputFile, copy_matching, write_output};
use crate::pipeline::{FormatConfig, Stage, StyleOptions};
use crate::validate::{TscValidator, TypeValidator, ValidationRequest};
use crate::{Error, Result};

/// Delay between the first change of a burst and the rebuild.
const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Builds each [`FormatConfig`] with Rolldown and writes the result to disk.
#[derive(Clone)]
pub struct RolldownEngine {
    validator: Arc<dyn TypeValidator>,
    debounce: Duration,
}

impl Default for RolldownEngine {
    fn default() -> Self {
        Self {
            validator: Arc::new(TscValidator::default()),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl std::fmt::Debug for RolldownEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolldownEngine")
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl RolldownEngine {
    /// Engine that runs type-checked compiles through `validator`.
    pub fn new(validator: Arc<dyn TypeValidator>) -> Self {
        Self {
            validator,
            ..Default::default()
        }
    }

    /// Delay between the first change of a burst and the rebuild.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub(crate) fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Run one format end to end: type check, bundle, write, copy assets.
    pub(crate) async fn build(&self, config: &FormatConfig) -> Result<BundleReport> {
        if let Some(Stage::TypeCheck(check)) = config.stage("typescript") {
            if !check.compiler_options.paths.is_empty() {
                tracing::debug!(
                    "Workspace paths resolved through tsconfig: {:?}",
                    check.compiler_options.paths.keys().collect::<Vec<_>>()
                );
            }
            let request = ValidationRequest::with_declarations(
                &check.ts_config,
                &config.cwd,
                &config.dir,
                &check.compiler_options,
            );
            self.validator.validate(&request).await?;
        }

        let options = bundler_options(config);
        let plugins = plugins_for(config);

        let mut bundler = BundlerBuilder::default()
            .with_options(options)
            .with_plugins(plugins)
            .build()
            .map_err(|e| Error::from_rolldown_batch(config.format, &e))?;

        let bundle = bundler
            .generate()
            .await
            .map_err(|e| Error::from_rolldown_batch(config.format, &e))?;

        let files: Vec<OutputFile> = bundle
            .assets
            .iter()
            .map(|item| match item {
                Output::Chunk(chunk) => OutputFile {
                    filename: chunk.filename.to_string(),
                    contents: chunk.code.as_bytes().to_vec(),
                },
                Output::Asset(asset) => OutputFile {
                    filename: asset.filename.to_string(),
                    contents: asset.source.as_bytes().to_vec(),
                },
            })
            .collect();

        let mut written = write_output(&files, &config.dir)?;

        if let Some(Stage::CopyAssets(targets)) = config.stage("copy") {
            for target in targets {
                let copied = copy_matching(&target.input, &target.glob, &target.output)?;
                tracing::debug!(
                    "Copied {} asset(s) from {} to {}",
                    copied,
                    target.input.display(),
                    target.output.display()
                );
            }
        }

        written.sort();
        Ok(BundleReport {
            format: config.format,
            files: written,
        })
    }
}

#[async_trait]
impl BundlerEngine for RolldownEngine {
    async fn bundle(&self, config: &FormatConfig) -> Result<BundleReport> {
        self.build(config).await
    }

    async fn watch(&self, configs: Vec<FormatConfig>) -> Result<WatchHandle> {
        super::watch::spawn(self.clone(), configs)
    }
}

fn output_format(format: Format) -> OutputFormat {
    match format {
        Format::Esm => OutputFormat::Esm,
        Format::Cjs => OutputFormat::Cjs,
        Format::Umd => OutputFormat::Umd,
    }
}

fn bundler_options(config: &FormatConfig) -> BundlerOptions {
    let mut options = BundlerOptions {
        format: Some(output_format(config.format)),
        sourcemap: config.sourcemap.then_some(SourceMapType::File),
        ..Default::default()
    };

    options.input = Some(
        config
            .input
            .iter()
            .map(|(name, path)| InputItem {
                name: Some(name.clone()),
                import: path.to_string_lossy().into_owned(),
            })
            .collect(),
    );
    options.cwd = Some(config.cwd.clone());
    options.dir = Some(config.dir.to_string_lossy().into_owned());
    options.entry_filenames = Some(config.entry_file_names.clone().into());
    options.chunk_filenames = Some(config.chunk_file_names.clone().into());
    options.platform = Some(Platform::Node);

    if config.format == Format::Umd {
        options.name = Some(config.name.clone());
    }
    if config.minify {
        options.minify = Some(RawMinifyOptions::from(true));
    }
    options.define = Some(
        [(
            "process.env.NODE_ENV".to_string(),
            node_env(config.production).to_string(),
        )]
        .into_iter()
        .collect(),
    );

    if let Some(Stage::Resolve { extensions, .. }) = config.stage("node-resolve") {
        options.resolve = Some(ResolveOptions {
            extensions: Some(extensions.clone()),
            ..Default::default()
        });
    }

    for stage in &config.stages {
        match stage {
            Stage::Styles(styles) => {
                tracing::debug!(
                    "Styles handled by Rolldown's CSS support (extract: {:?})",
                    styles.extract
                );
                for warning in unsupported_style_options(styles) {
                    tracing::warn!("{}", warning);
                }
            }
            Stage::Transpile(transpile) => tracing::debug!(
                "Transpiling with the built-in transformer (async-to-promises: {})",
                transpile.async_to_promises
            ),
            Stage::NativeCompile { ts_config } => tracing::debug!(
                "Native compile using {}",
                ts_config.display()
            ),
            _ => {}
        }
    }

    options
}

/// Replacement for `process.env.NODE_ENV`, as a JS string literal.
fn node_env(production: bool) -> &'static str {
    if production {
        "\"production\""
    } else {
        "\"development\""
    }
}

/// Style options the bundle cannot honor, as user-facing messages.
fn unsupported_style_options(styles: &StyleOptions) -> Vec<String> {
    let mut warnings = Vec::new();
    if let ExtractCss::File(name) = &styles.extract {
        warnings.push(format!(
            "extractCss \"{}\" is not supported; CSS is emitted under Rolldown's asset names",
            name
        ));
    }
    if styles.less_javascript_enabled {
        warnings.push("javascriptEnabled has no effect: less stylesheets are not compiled".into());
    }
    warnings
}

fn plugins_for(config: &FormatConfig) -> Vec<SharedPluginable> {
    let prefer_builtins = matches!(
        config.stage("node-resolve"),
        Some(Stage::Resolve {
            prefer_builtins: true,
            ..
        })
    );
    let peers: &[String] = match config.stage("peer-deps-external") {
        Some(Stage::PeerDepsExternal { peers, .. }) => peers,
        _ => &[],
    };

    let mut plugins: Vec<SharedPluginable> = vec![Arc::new(ExternalsPlugin::new(
        config.external.clone(),
        peers,
        prefer_builtins,
    ))];
    if config.stage("image").is_some() {
        plugins.push(Arc::new(MediaPlugin));
    }
    plugins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::externals::ExternalPredicate;
    use indexmap::IndexMap;
    use std::path::PathBuf;

    fn format_config(format: Format) -> FormatConfig {
        let mut input = IndexMap::new();
        input.insert("src/index".to_string(), PathBuf::from("/ws/libs/ui/src/index.ts"));
        FormatConfig {
            format,
            input,
            cwd: PathBuf::from("/ws"),
            dir: PathBuf::from("/ws/dist/libs/ui"),
            entry_file_names: format!("[name].{}", format.extension()),
            chunk_file_names: format!("[name].{}", format.extension()),
            name: "Ui".into(),
            external: ExternalPredicate::default(),
            stages: vec![
                Stage::InlineImages,
                Stage::Resolve {
                    prefer_builtins: true,
                    extensions: vec![".ts".into()],
                },
            ],
            sourcemap: true,
            minify: false,
            production: true,
            watch_roots: vec![PathBuf::from("/ws/libs/ui/src")],
        }
    }

    #[test]
    fn test_bundler_options_mapping() {
        let options = bundler_options(&format_config(Format::Umd));
        assert!(matches!(options.format, Some(OutputFormat::Umd)));
        assert_eq!(options.name.as_deref(), Some("Ui"));
        assert_eq!(options.dir.as_deref(), Some("/ws/dist/libs/ui"));
        assert_eq!(options.input.as_ref().map(Vec::len), Some(1));
        assert!(options.minify.is_none());
    }

    #[test]
    fn test_node_env_follows_production() {
        let config = format_config(Format::Esm);
        let options = bundler_options(&config);
        let define = options.define.unwrap();
        assert_eq!(
            define.get("process.env.NODE_ENV").map(String::as_str),
            Some("\"production\"")
        );

        let config = FormatConfig {
            production: false,
            ..format_config(Format::Esm)
        };
        let define = bundler_options(&config).define.unwrap();
        assert_eq!(
            define.get("process.env.NODE_ENV").map(String::as_str),
            Some("\"development\"")
        );
    }

    #[test]
    fn test_unsupported_style_options() {
        let mut styles = StyleOptions {
            inject: false,
            extract: ExtractCss::Enabled(true),
            auto_modules: true,
            autoprefixer: true,
            less_javascript_enabled: false,
        };
        assert!(unsupported_style_options(&styles).is_empty());

        styles.extract = ExtractCss::File("styles.css".into());
        styles.less_javascript_enabled = true;
        let warnings = unsupported_style_options(&styles);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("styles.css"));
    }

    #[test]
    fn test_name_only_for_umd() {
        let options = bundler_options(&format_config(Format::Esm));
        assert!(options.name.is_none());
    }

    #[test]
    fn test_plugins_follow_stages() {
        let mut config = format_config(Format::Cjs);
        assert_eq!(plugins_for(&config).len(), 2);
        config.stages.retain(|s| !matches!(s, Stage::InlineImages));
        assert_eq!(plugins_for(&config).len(), 1);
    }
}
