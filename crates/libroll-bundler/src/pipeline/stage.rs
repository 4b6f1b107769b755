//! Transformation stages.
//!
//! A format's stage list is always in [`StagePhase`] order. The compiler
//! strategy decides which of the compile stages appear, never more than one.

use std::collections::BTreeMap;
use std::path::PathBuf;

use libroll_config::ExtractCss;

/// Position of a stage in the pipeline. Lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StagePhase {
    CopyAssets = 0,
    InlineMedia = 10,
    TypeCheck = 20,
    Externalize = 30,
    Styles = 40,
    Resolve = 50,
    Compile = 60,
    Interop = 70,
    Analyze = 100,
}

/// Files copied next to the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTarget {
    pub input: PathBuf,
    pub glob: String,
    /// Absolute destination directory
    pub output: PathBuf,
}

/// Compiler options forced onto the type-checked compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptionsOverride {
    pub root_dir: PathBuf,
    pub allow_js: bool,
    pub declaration: bool,
    /// Workspace package name → source roots
    pub paths: BTreeMap<String, Vec<String>>,
    /// Set when the tsconfig declares a module kind the bundler cannot consume
    pub module: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCheckOptions {
    pub ts_config: PathBuf,
    pub compiler_options: CompilerOptionsOverride,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOptions {
    pub inject: bool,
    pub extract: ExtractCss,
    pub auto_modules: bool,
    pub autoprefixer: bool,
    pub less_javascript_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOptions {
    pub cwd: PathBuf,
    pub root_mode_upward: bool,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    /// Inline helpers into the bundle rather than importing a runtime
    pub bundled_helpers: bool,
    /// Downlevel async functions to promise chains (non-module formats only)
    pub async_to_promises: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    CopyAssets(Vec<CopyTarget>),
    InlineImages,
    InlineJson,
    TypeCheck(TypeCheckOptions),
    PeerDepsExternal {
        manifest: PathBuf,
        peers: Vec<String>,
    },
    Styles(StyleOptions),
    Resolve {
        prefer_builtins: bool,
        extensions: Vec<String>,
    },
    NativeCompile {
        ts_config: PathBuf,
    },
    Transpile(TranspileOptions),
    CommonJs,
    Analyze,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::CopyAssets(_) => "copy",
            Stage::InlineImages => "image",
            Stage::InlineJson => "json",
            Stage::TypeCheck(_) => "typescript",
            Stage::PeerDepsExternal { .. } => "peer-deps-external",
            Stage::Styles(_) => "postcss",
            Stage::Resolve { .. } => "node-resolve",
            Stage::NativeCompile { .. } => "swc",
            Stage::Transpile(_) => "babel",
            Stage::CommonJs => "commonjs",
            Stage::Analyze => "analyze",
        }
    }

    pub fn phase(&self) -> StagePhase {
        match self {
            Stage::CopyAssets(_) => StagePhase::CopyAssets,
            Stage::InlineImages | Stage::InlineJson => StagePhase::InlineMedia,
            Stage::TypeCheck(_) => StagePhase::TypeCheck,
            Stage::PeerDepsExternal { .. } => StagePhase::Externalize,
            Stage::Styles(_) => StagePhase::Styles,
            Stage::Resolve { .. } => StagePhase::Resolve,
            Stage::NativeCompile { .. } | Stage::Transpile(_) => StagePhase::Compile,
            Stage::CommonJs => StagePhase::Interop,
            Stage::Analyze => StagePhase::Analyze,
        }
    }
}

/// Whether `stages` respect phase order.
pub fn is_ordered(stages: &[Stage]) -> bool {
    stages.windows(2).all(|w| w[0].phase() <= w[1].phase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ordered() {
        let ordered = vec![
            Stage::CopyAssets(vec![]),
            Stage::InlineImages,
            Stage::InlineJson,
            Stage::CommonJs,
            Stage::Analyze,
        ];
        assert!(is_ordered(&ordered));

        let unordered = vec![Stage::Analyze, Stage::CommonJs];
        assert!(!is_ordered(&unordered));
    }

    #[test]
    fn test_inline_stages_share_phase() {
        assert_eq!(Stage::InlineJson.phase(), Stage::InlineImages.phase());
    }
}
