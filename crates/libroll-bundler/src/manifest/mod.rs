//! Distribution manifest synthesis.
//!
//! The unit's `package.json` is read once, then [`synthesize`] derives the
//! resolution fields and the conditional `exports` map from the entry point
//! index and the produced formats. Fields this crate does not own keep their
//! content and their position.

mod dependencies;

pub use self::dependencies::{DependentManifest, propagate_to_dependents, record_dependencies};

use std::fs;
use std::path::{Path, PathBuf};

use libroll_config::{BuildConfiguration, Format};
use serde_json::{Map, Value};

use crate::entries::EntryPointIndex;
use crate::pipeline::primary_key;
use crate::workspace::DependentProject;
use crate::{Error, Result};

/// A parsed `package.json`.
pub type Manifest = Map<String, Value>;

pub const MANIFEST_FILE: &str = "package.json";

/// Read a `package.json`, keeping key order.
///
/// # Errors
///
/// Returns [`Error::Manifest`] if the file is unreadable or not a JSON object.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = fs::read_to_string(path).map_err(|e| Error::manifest(path, e))?;
    match serde_json::from_str(&content).map_err(|e| Error::manifest(path, e))? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::manifest(path, "expected a JSON object")),
    }
}

/// Write `manifest` as two-space indented JSON with a trailing newline.
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::manifest(path, e))?;
    }
    let mut content = serde_json::to_string_pretty(manifest)?;
    content.push('\n');
    fs::write(path, content).map_err(|e| Error::manifest(path, e))
}

/// Conditional export for one entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDescriptor {
    /// Declaration file, always present
    pub types: String,
    /// ESM file, when esm is produced
    pub import: Option<String>,
    /// CommonJS file, when cjs or umd is produced
    pub require: Option<String>,
}

impl ExportDescriptor {
    fn for_key(source_dir: &str, key: &str, esm: bool, legacy: bool) -> Self {
        Self {
            types: file_ref(source_dir, key, "d.ts"),
            import: esm.then(|| file_ref(source_dir, key, Format::Esm.extension())),
            require: legacy.then(|| file_ref(source_dir, key, Format::Cjs.extension())),
        }
    }

    /// `{types, import?, require?}` in that order.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("types".into(), Value::String(self.types.clone()));
        if let Some(import) = &self.import {
            map.insert("import".into(), Value::String(import.clone()));
        }
        if let Some(require) = &self.require {
            map.insert("require".into(), Value::String(require.clone()));
        }
        Value::Object(map)
    }
}

/// `./src/widgets/button.js`
fn file_ref(source_dir: &str, key: &str, extension: &str) -> String {
    if source_dir.is_empty() {
        format!("./{key}.{extension}")
    } else {
        format!("./{source_dir}/{key}.{extension}")
    }
}

/// Export map for the produced formats, `.` first, other keys sorted.
pub fn export_map(
    config: &BuildConfiguration,
    index: &EntryPointIndex,
) -> Vec<(String, ExportDescriptor)> {
    let esm = config.produces(Format::Esm);
    let legacy = config.produces_legacy();
    let source_dir = config.source_dir();

    let root_key = primary_key(config);
    let root = ExportDescriptor::for_key(&source_dir, &root_key, esm, legacy);
    let mut exports = vec![(".".to_string(), root)];
    // the main entry is only emitted under the root key
    exports.extend(
        index
            .keys()
            .filter(|key| *key != root_key && index.get(key) != Some(config.entry_file.as_path()))
            .map(|key| {
                (
                    format!("./{key}"),
                    ExportDescriptor::for_key(&source_dir, key, esm, legacy),
                )
            }),
    );
    exports
}

/// Derive the updated manifest from `base`.
///
/// Pure: the same inputs always give the same manifest, key order included.
pub fn synthesize(
    base: &Manifest,
    config: &BuildConfiguration,
    index: &EntryPointIndex,
) -> Manifest {
    let mut manifest = base.clone();
    let exports = export_map(config, index);
    let root = &exports[0].1;

    let module_type = if config.produces(Format::Esm) {
        "module"
    } else {
        "commonjs"
    };
    manifest.insert("type".into(), Value::String(module_type.into()));

    let main = root.require.as_ref().or(root.import.as_ref());
    if let Some(main) = main {
        manifest.insert("main".into(), Value::String(main.clone()));
    }
    if let Some(module) = &root.import {
        manifest.insert("module".into(), Value::String(module.clone()));
    }
    manifest.insert("types".into(), Value::String(root.types.clone()));

    let generate = config.manifest.generate_exports_field;
    match manifest.get_mut("exports") {
        Some(Value::String(_)) => {
            tracing::debug!("Keeping hand-authored string exports field");
        }
        Some(Value::Object(existing)) => {
            if generate {
                for (key, descriptor) in &exports {
                    existing.insert(key.clone(), descriptor.to_value());
                }
            }
            sort_keys(existing);
        }
        _ if generate => {
            let mut map: Map<String, Value> = exports
                .iter()
                .map(|(key, descriptor)| (key.clone(), descriptor.to_value()))
                .collect();
            sort_keys(&mut map);
            manifest.insert("exports".into(), Value::Object(map));
        }
        _ => {}
    }

    manifest
}

fn sort_keys(map: &mut Map<String, Value>) {
    let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    map.extend(entries);
}

/// Everything needed to (re)write the manifest after a successful build.
#[derive(Debug, Clone)]
pub struct ManifestJob {
    pub base: Manifest,
    pub config: BuildConfiguration,
    pub index: EntryPointIndex,
    pub dependencies: Vec<DependentProject>,
    pub dependents: Vec<DependentManifest>,
}

impl ManifestJob {
    pub fn output_file(&self) -> PathBuf {
        self.config.output_path.join(MANIFEST_FILE)
    }

    /// Synthesize, record dependency versions, write, then propagate.
    pub fn run(&self) -> Result<PathBuf> {
        let mut manifest = synthesize(&self.base, &self.config, &self.index);

        let settings = &self.config.manifest;
        if settings.update_buildable_project_deps && !self.dependencies.is_empty() {
            record_dependencies(&mut manifest, &self.dependencies, settings.dependency_field);
        }

        let path = self.output_file();
        write_manifest(&path, &manifest)?;
        tracing::debug!("Wrote {}", path.display());

        if settings.update_buildable_project_deps {
            let name = manifest.get("name").and_then(Value::as_str);
            let version = manifest.get("version").and_then(Value::as_str);
            if let (Some(name), Some(version)) = (name, version) {
                propagate_to_dependents(&self.dependents, name, version)?;
            }
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libroll_config::{
        CompilerStrategy, DependencyField, ExtractCss, ManifestSettings, ModuleKind, RunMode,
        StyleSettings,
    };
    use serde_json::json;

    fn config(formats: &[Format], generate: bool) -> BuildConfiguration {
        BuildConfiguration {
            workspace_root: "/ws".into(),
            project_manifest: "/ws/libs/ui/package.json".into(),
            project_root: "/ws/libs/ui".into(),
            source_root: "/ws/libs/ui/src".into(),
            entry_file: "/ws/libs/ui/src/index.ts".into(),
            entry_root: "/ws/libs/ui/src".into(),
            ts_config: "/ws/libs/ui/tsconfig.lib.json".into(),
            output_path: "/ws/dist/libs/ui".into(),
            output_file_name: None,
            formats: formats.to_vec(),
            module_kind: ModuleKind::Unspecified,
            compiler: CompilerStrategy::Tsc,
            external: Vec::new(),
            overrides: Vec::new(),
            mode: RunMode::Batch,
            delete_output_path: true,
            styles: StyleSettings {
                extract: ExtractCss::Enabled(false),
                javascript_enabled: false,
            },
            assets: Vec::new(),
            manifest: ManifestSettings {
                generate_exports_field: generate,
                update_buildable_project_deps: true,
                dependency_field: DependencyField::PeerDependencies,
            },
            production: true,
        }
    }

    fn index(keys: &[&str]) -> EntryPointIndex {
        let mut index = EntryPointIndex::new("src");
        for key in keys {
            index.insert(*key, format!("/ws/libs/ui/src/{key}.ts"));
        }
        index
    }

    fn base() -> Manifest {
        match json!({"name": "@acme/ui", "version": "1.2.0"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_esm_and_cjs_scenario() {
        let manifest = synthesize(
            &base(),
            &config(&[Format::Esm, Format::Cjs], true),
            &index(&["index"]),
        );

        assert_eq!(manifest["type"], "module");
        assert_eq!(manifest["main"], "./src/index.cjs");
        assert_eq!(manifest["module"], "./src/index.js");
        assert_eq!(manifest["types"], "./src/index.d.ts");
        assert_eq!(
            manifest["exports"],
            json!({".": {
                "types": "./src/index.d.ts",
                "import": "./src/index.js",
                "require": "./src/index.cjs"
            }})
        );
    }

    #[test]
    fn test_index_mirrors_top_level() {
        let manifest = synthesize(
            &base(),
            &config(&[Format::Esm, Format::Cjs], true),
            &index(&["index", "widgets/button"]),
        );

        let exports = manifest["exports"].as_object().unwrap();
        let keys: Vec<&str> = exports.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![".", "./widgets/button"]);

        let root = &exports["."];
        assert_eq!(root["types"], manifest["types"]);
        assert_eq!(root["import"], manifest["module"]);
        assert_eq!(root["require"], manifest["main"]);
        assert_eq!(exports["./widgets/button"]["import"], "./src/widgets/button.js");
    }

    #[test]
    fn test_string_exports_untouched() {
        let mut base = base();
        base.insert("exports".into(), json!("./custom.js"));
        let manifest = synthesize(&base, &config(&[Format::Esm], true), &index(&["index"]));
        assert_eq!(manifest["exports"], "./custom.js");
        assert_eq!(manifest["types"], "./src/index.d.ts");
    }

    #[test]
    fn test_merge_keeps_foreign_entries_and_sorts() {
        let mut base = base();
        base.insert(
            "exports".into(),
            json!({"./package.json": "./package.json", "./a": {"import": "./old.js"}}),
        );
        let manifest = synthesize(
            &base,
            &config(&[Format::Esm], true),
            &index(&["index", "a"]),
        );
        let exports = manifest["exports"].as_object().unwrap();
        let keys: Vec<&str> = exports.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![".", "./a", "./package.json"]);
        assert_eq!(exports["./a"]["import"], "./src/a.js");
        assert!(exports["./a"].get("require").is_none());
    }

    #[test]
    fn test_exports_untouched_when_generation_disabled() {
        let manifest = synthesize(&base(), &config(&[Format::Esm], false), &index(&["index"]));
        assert!(manifest.get("exports").is_none());
        assert_eq!(manifest["module"], "./src/index.js");
    }

    #[test]
    fn test_cjs_only() {
        let manifest = synthesize(&base(), &config(&[Format::Cjs], true), &index(&["index"]));
        assert_eq!(manifest["type"], "commonjs");
        assert_eq!(manifest["main"], "./src/index.cjs");
        assert!(manifest.get("module").is_none());
        assert!(manifest["exports"]["."].get("import").is_none());
    }

    #[test]
    fn test_missing_index_defaults() {
        let manifest = synthesize(&base(), &config(&[Format::Esm], true), &index(&["button"]));
        assert_eq!(
            manifest["exports"]["."],
            json!({"types": "./src/index.d.ts", "import": "./src/index.js"})
        );
    }

    #[test]
    fn test_output_file_name_renames_root_export() {
        let mut cfg = config(&[Format::Esm, Format::Cjs], true);
        cfg.output_file_name = Some("bundle".into());
        let manifest = synthesize(&base(), &cfg, &index(&["index", "widgets/button"]));

        assert_eq!(manifest["main"], "./src/bundle.cjs");
        assert_eq!(manifest["module"], "./src/bundle.js");
        assert_eq!(manifest["types"], "./src/bundle.d.ts");
        let keys: Vec<&str> = manifest["exports"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec![".", "./widgets/button"]);
    }

    #[test]
    fn test_synthesis_is_idempotent() {
        let cfg = config(&[Format::Esm, Format::Cjs], true);
        let idx = index(&["index", "z", "b/c", "a"]);
        let once = synthesize(&base(), &cfg, &idx);
        let twice = synthesize(&once, &cfg, &idx);
        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
    }

    #[test]
    fn test_job_writes_pretty_json() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut cfg = config(&[Format::Esm], true);
        cfg.output_path = temp.path().join("dist");

        let job = ManifestJob {
            base: base(),
            config: cfg,
            index: index(&["index"]),
            dependencies: Vec::new(),
            dependents: Vec::new(),
        };
        let path = job.run().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("}\n"));
        assert!(written.starts_with("{\n  \"name\": \"@acme/ui\""));
        assert_eq!(load_manifest(&path).unwrap()["module"], "./src/index.js");
    }
}
