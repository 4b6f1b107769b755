use clap::ValueEnum;
use libroll_config::{CompilerKind, Format};

/// Module format to produce
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum FormatArg {
    /// ECMAScript modules, written as `.js`
    #[value(name = "esm")]
    Esm,

    /// CommonJS, written as `.cjs`
    #[value(name = "cjs")]
    Cjs,

    /// Universal module definition, written as `.cjs`
    #[value(name = "umd")]
    Umd,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Esm => Format::Esm,
            FormatArg::Cjs => Format::Cjs,
            FormatArg::Umd => Format::Umd,
        }
    }
}

/// Toolchain that compiles sources before bundling
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum CompilerArg {
    /// Type-checked compile, then a transpile pass
    #[value(name = "babel")]
    Babel,

    /// Type-checked compile only
    #[value(name = "tsc")]
    Tsc,

    /// Fast native compile; types are checked before bundling starts
    #[value(name = "swc")]
    Swc,
}

impl From<CompilerArg> for CompilerKind {
    fn from(arg: CompilerArg) -> Self {
        match arg {
            CompilerArg::Babel => CompilerKind::Babel,
            CompilerArg::Tsc => CompilerKind::Tsc,
            CompilerArg::Swc => CompilerKind::Swc,
        }
    }
}
