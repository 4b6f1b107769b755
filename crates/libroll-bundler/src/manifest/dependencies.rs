//! Dependency versions in the written manifest and in dependents' manifests.

use std::path::{Path, PathBuf};

use libroll_config::DependencyField;
use serde_json::{Map, Value};

use super::{MANIFEST_FILE, Manifest, load_manifest, write_manifest};
use crate::Result;
use crate::workspace::{DependentProject, ProjectGraph};

const DEPENDENCY_FIELDS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// A workspace project that depends on the unit, with its manifest location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentManifest {
    pub project: String,
    pub manifest: PathBuf,
}

impl DependentManifest {
    /// Manifests of every workspace project with an edge to `project`.
    pub fn collect(graph: &ProjectGraph, project: &str, workspace_root: &Path) -> Vec<Self> {
        graph
            .dependents(project)
            .into_iter()
            .map(|node| DependentManifest {
                project: node.name.clone(),
                manifest: workspace_root.join(&node.data.root).join(MANIFEST_FILE),
            })
            .collect()
    }
}

fn declares(manifest: &Manifest, field: &str, package: &str) -> bool {
    manifest
        .get(field)
        .and_then(Value::as_object)
        .is_some_and(|deps| deps.contains_key(package))
}

/// Add every direct dependency the manifest does not declare yet.
///
/// Versions come from the dependency graph; `@types/*` packages and entries
/// without a known version are skipped.
pub fn record_dependencies(
    manifest: &mut Manifest,
    dependencies: &[DependentProject],
    field: DependencyField,
) {
    for dependency in dependencies.iter().filter(|d| d.top_level) {
        if dependency.name.starts_with("@types/") {
            continue;
        }
        let Some(version) = &dependency.version else {
            tracing::debug!("No version known for {}, not recording it", dependency.name);
            continue;
        };
        if DEPENDENCY_FIELDS
            .iter()
            .any(|f| declares(manifest, f, &dependency.name))
        {
            continue;
        }

        let entry = manifest
            .entry(field.as_str())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(deps) = entry {
            tracing::debug!(
                "Recording {}@{} in {}",
                dependency.name,
                version,
                field.as_str()
            );
            deps.insert(dependency.name.clone(), Value::String(version.clone()));
        }
    }
}

/// `^1.0.0` → `^1.2.0`; `*` and protocol references stay as written.
fn rewrite_reference(current: &str, version: &str) -> Option<String> {
    if current == "*" || current.contains(':') {
        return None;
    }
    let prefix = match current.chars().next() {
        Some(c @ ('^' | '~')) => c.to_string(),
        _ => String::new(),
    };
    let updated = format!("{prefix}{version}");
    (updated != current).then_some(updated)
}

/// Point every dependent already referencing `package` at `version`.
///
/// Returns the manifests that changed. Dependents without a manifest are skipped.
pub fn propagate_to_dependents(
    dependents: &[DependentManifest],
    package: &str,
    version: &str,
) -> Result<Vec<PathBuf>> {
    let mut updated = Vec::new();

    for dependent in dependents {
        if !dependent.manifest.is_file() {
            continue;
        }
        let mut manifest = load_manifest(&dependent.manifest)?;
        let mut changed = false;

        for field in DEPENDENCY_FIELDS {
            let Some(Value::Object(deps)) = manifest.get_mut(*field) else {
                continue;
            };
            let Some(Value::String(current)) = deps.get_mut(package) else {
                continue;
            };
            if let Some(reference) = rewrite_reference(current, version) {
                *current = reference;
                changed = true;
            }
        }

        if changed {
            write_manifest(&dependent.manifest, &manifest)?;
            tracing::info!("Updated {} in {}", package, dependent.project);
            updated.push(dependent.manifest.clone());
        }
    }

    Ok(updated)
}
