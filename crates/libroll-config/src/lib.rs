//! Build options for libroll.
//!
//! Raw options are loaded with figment (CLI > `LIBROLL_*` env > `libroll.json` >
//! defaults), validated, and normalized into a [`BuildConfiguration`] that the
//! bundler crate consumes without further path handling.

mod error;
mod loading;
mod normalize;
mod options;
mod tsconfig;

pub use error::{ConfigError, Result};
pub use loading::{OPTIONS_FILE, OptionOverrides};
pub use normalize::{
    AssetRule, BabelOptions, BuildConfiguration, CompilerStrategy, ManifestSettings, RunMode,
    SOURCE_EXTENSIONS, StyleSettings, SwcOptions, normalize, resolve_formats, to_slash,
};
pub use options::{
    AssetInput, CompilerKind, DependencyField, ExtractCss, Format, RawBuildOptions,
};
pub use tsconfig::{ModuleKind, read_module_kind};
