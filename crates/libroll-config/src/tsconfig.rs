//! Minimal tsconfig reader.
//!
//! Only `compilerOptions.module` is needed: it decides the default output
//! format when none is requested.

use std::path::{Path, PathBuf};

use oxc_resolver::{ResolveOptions, Resolver};

use crate::error::{ConfigError, Result};

/// Module system declared by a tsconfig.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModuleKind {
    CommonJs,
    Amd,
    Umd,
    /// Any ES/Node module kind (`es2015`, `esnext`, `node16`, ...)
    Other(String),
    /// No `module` option anywhere in the chain
    #[default]
    Unspecified,
}

impl ModuleKind {
    /// Case-insensitive parse of a `module` value.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "commonjs" => ModuleKind::CommonJs,
            "amd" => ModuleKind::Amd,
            "umd" => ModuleKind::Umd,
            other => ModuleKind::Other(other.to_string()),
        }
    }

    /// CommonJS, AMD and UMD all default to a single commonjs-style output.
    pub fn is_legacy(&self) -> bool {
        matches!(self, ModuleKind::CommonJs | ModuleKind::Amd | ModuleKind::Umd)
    }
}

/// Read the effective `compilerOptions.module` of a tsconfig file.
///
/// The `extends` chain is followed by `oxc_resolver`, including package
/// bases such as `@tsconfig/node18` resolved through `node_modules`.
///
/// # Errors
///
/// Returns [`ConfigError::TsConfig`] when the file or any base in its
/// `extends` chain cannot be read, parsed or resolved.
pub fn read_module_kind(path: &Path) -> Result<ModuleKind> {
    let resolver = Resolver::new(ResolveOptions::default());
    let tsconfig = resolver
        .resolve_tsconfig(path)
        .map_err(|e| ConfigError::TsConfig {
            path: PathBuf::from(path),
            message: e.to_string(),
        })?;

    Ok(tsconfig
        .compiler_options
        .module
        .as_deref()
        .map_or(ModuleKind::Unspecified, ModuleKind::parse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_module_kind() {
        assert_eq!(ModuleKind::parse("CommonJS"), ModuleKind::CommonJs);
        assert!(ModuleKind::parse("umd").is_legacy());
        assert!(!ModuleKind::parse("ESNext").is_legacy());
        assert!(!ModuleKind::Unspecified.is_legacy());
    }

    #[test]
    fn test_read_module_kind_accepts_jsonc() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("tsconfig.json"),
            r#"{
                // line comment
                "compilerOptions": {
                    "module": "umd", /* block */
                    "outDir": "dist//lib",
                },
            }"#,
        )
        .unwrap();

        let kind = read_module_kind(&dir.path().join("tsconfig.json")).unwrap();
        assert_eq!(kind, ModuleKind::Umd);
    }

    #[test]
    fn test_read_module_kind_follows_extends() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("tsconfig.base.json"),
            r#"{ "compilerOptions": { "module": "commonjs" } }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("tsconfig.lib.json"),
            r#"{ "extends": "./tsconfig.base.json", "compilerOptions": { "declaration": true } }"#,
        )
        .unwrap();

        let kind = read_module_kind(&dir.path().join("tsconfig.lib.json")).unwrap();
        assert_eq!(kind, ModuleKind::CommonJs);
    }

    #[test]
    fn test_read_module_kind_unspecified() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tsconfig.json"), "{}").unwrap();
        let kind = read_module_kind(&dir.path().join("tsconfig.json")).unwrap();
        assert_eq!(kind, ModuleKind::Unspecified);
    }

    #[test]
    fn test_read_module_kind_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_module_kind(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::TsConfig { .. }));
    }

    #[test]
    fn test_read_module_kind_follows_package_extends() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("node_modules/@tsconfig/node18");
        fs::create_dir_all(&base).unwrap();
        fs::write(
            base.join("package.json"),
            r#"{ "name": "@tsconfig/node18", "version": "1.0.0" }"#,
        )
        .unwrap();
        fs::write(
            base.join("tsconfig.json"),
            r#"{ "compilerOptions": { "module": "commonjs" } }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("tsconfig.lib.json"),
            r#"{ "extends": "@tsconfig/node18/tsconfig.json" }"#,
        )
        .unwrap();

        let kind = read_module_kind(&dir.path().join("tsconfig.lib.json")).unwrap();
        assert_eq!(kind, ModuleKind::CommonJs);
    }

    #[test]
    fn test_read_module_kind_missing_package_base() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("tsconfig.json"),
            r#"{ "extends": "@tsconfig/not-installed/tsconfig.json" }"#,
        )
        .unwrap();

        let err = read_module_kind(&dir.path().join("tsconfig.json")).unwrap_err();
        assert!(matches!(err, ConfigError::TsConfig { .. }));
    }
}
