//! Workspace dependency graph.
//!
//! The graph is read from a JSON document shaped like an Nx project graph:
//!
//! ```json
//! {
//!   "nodes": { "ui": { "name": "ui", "type": "lib", "data": { "root": "libs/ui", "sourceRoot": "libs/ui/src" } } },
//!   "externalNodes": { "npm:react": { "data": { "packageName": "react", "version": "18.2.0" } } },
//!   "dependencies": { "ui": [{ "source": "ui", "target": "npm:react", "type": "static" }] }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const NPM_PREFIX: &str = "npm:";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectGraph {
    #[serde(default)]
    pub nodes: IndexMap<String, ProjectNode>,
    #[serde(default)]
    pub external_nodes: IndexMap<String, ExternalNode>,
    #[serde(default)]
    pub dependencies: IndexMap<String, Vec<DependencyEdge>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    #[default]
    Lib,
    App,
    E2e,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectNode {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ProjectType,
    pub data: ProjectData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    /// Published package name; read from `<root>/package.json` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalNode {
    #[serde(default)]
    pub data: ExternalData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalData {
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default = "default_edge_type")]
    pub kind: String,
}

fn default_edge_type() -> String {
    "static".to_string()
}

/// Where a dependency edge points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyTarget {
    /// Another workspace project (graph node name)
    Project(String),
    /// A registry package
    Npm { node: String, package: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Workspace,
    Npm,
}

/// A resolved dependency of the unit being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentProject {
    /// Package name consumers import
    pub name: String,
    /// Graph node name
    pub node: String,
    pub kind: DependencyKind,
    pub version: Option<String>,
    /// Source root, for workspace projects
    pub source_root: Option<String>,
    /// Whether the unit depends on it directly
    pub top_level: bool,
}

impl ProjectGraph {
    /// Load a graph file and fill in package names and versions from each
    /// project's `package.json`.
    pub fn load(path: &Path, workspace_root: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::manifest(path, format!("failed to read graph: {e}")))?;
        let mut graph: ProjectGraph = serde_json::from_str(&content)
            .map_err(|e| Error::manifest(path, format!("invalid graph: {e}")))?;
        graph.hydrate(workspace_root);
        Ok(graph)
    }

    fn hydrate(&mut self, workspace_root: &Path) {
        for node in self.nodes.values_mut() {
            if node.data.package_name.is_some() && node.data.version.is_some() {
                continue;
            }
            let manifest = workspace_root.join(&node.data.root).join("package.json");
            let Ok(content) = fs::read_to_string(&manifest) else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) else {
                tracing::debug!("Skipping unreadable manifest {}", manifest.display());
                continue;
            };
            if node.data.package_name.is_none() {
                node.data.package_name = value["name"].as_str().map(str::to_string);
            }
            if node.data.version.is_none() {
                node.data.version = value["version"].as_str().map(str::to_string);
            }
        }
    }

    /// Look up a project node by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph has no node called `name`.
    pub fn project(&self, name: &str) -> Result<&ProjectNode> {
        self.nodes
            .get(name)
            .ok_or_else(|| Error::UnknownProject(name.to_string()))
    }

    pub fn source_root(&self, name: &str) -> Option<PathBuf> {
        self.nodes
            .get(name)
            .and_then(|n| n.data.source_root.as_ref())
            .map(PathBuf::from)
    }

    /// Package name of a workspace project, falling back to the node name.
    pub fn package_name(&self, name: &str) -> String {
        self.nodes
            .get(name)
            .and_then(|n| n.data.package_name.clone())
            .unwrap_or_else(|| name.to_string())
    }

    fn resolve_target(&self, target: &str) -> Option<DependencyTarget> {
        if let Some(stripped) = target.strip_prefix(NPM_PREFIX) {
            let package = self
                .external_nodes
                .get(target)
                .map(|n| n.data.package_name.clone())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| stripped.to_string());
            return Some(DependencyTarget::Npm {
                node: target.to_string(),
                package,
            });
        }
        self.nodes
            .contains_key(target)
            .then(|| DependencyTarget::Project(target.to_string()))
    }

    /// Direct dependency edges of `name`, deduplicated in declaration order.
    pub fn direct_dependencies(&self, name: &str) -> Vec<DependencyTarget> {
        let mut seen = IndexSet::new();
        for edge in self.dependencies.get(name).into_iter().flatten() {
            if let Some(target) = self.resolve_target(&edge.target) {
                seen.insert(target);
            }
        }
        seen.into_iter().collect()
    }

    /// Registry package names `name` depends on directly.
    pub fn npm_dependencies(&self, name: &str) -> Vec<String> {
        self.direct_dependencies(name)
            .into_iter()
            .filter_map(|t| match t {
                DependencyTarget::Npm { package, .. } => Some(package),
                DependencyTarget::Project(_) => None,
            })
            .collect()
    }

    /// All dependencies reachable from `name` through workspace projects.
    ///
    /// Registry packages are leaves: their own dependencies are not followed.
    pub fn calculate_project_dependencies(&self, name: &str) -> Result<Vec<DependentProject>> {
        self.project(name)?;

        let direct: IndexSet<DependencyTarget> =
            self.direct_dependencies(name).into_iter().collect();
        let mut visited = IndexSet::new();
        let mut stack: Vec<DependencyTarget> = direct.iter().rev().cloned().collect();
        let mut result = Vec::new();

        while let Some(target) = stack.pop() {
            if !visited.insert(target.clone()) {
                continue;
            }
            let top_level = direct.contains(&target);

            match &target {
                DependencyTarget::Project(node_name) => {
                    if node_name == name {
                        continue;
                    }
                    let data = &self.nodes[node_name.as_str()].data;
                    result.push(DependentProject {
                        name: self.package_name(node_name),
                        node: node_name.clone(),
                        kind: DependencyKind::Workspace,
                        version: data.version.clone(),
                        source_root: data.source_root.clone(),
                        top_level,
                    });
                    for next in self.direct_dependencies(node_name).into_iter().rev() {
                        if !visited.contains(&next) {
                            stack.push(next);
                        }
                    }
                }
                DependencyTarget::Npm { node, package } => {
                    let version = self
                        .external_nodes
                        .get(node.as_str())
                        .map(|n| n.data.version.clone())
                        .filter(|v| !v.is_empty());
                    result.push(DependentProject {
                        name: package.clone(),
                        node: node.clone(),
                        kind: DependencyKind::Npm,
                        version,
                        source_root: None,
                        top_level,
                    });
                }
            }
        }

        Ok(result)
    }

    /// Registry packages reachable through the workspace projects `name` depends on.
    pub fn transitive_npm_packages(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .calculate_project_dependencies(name)?
            .into_iter()
            .filter(|d| d.kind == DependencyKind::Npm)
            .map(|d| d.name)
            .collect())
    }

    /// Workspace projects with a direct edge to `name`.
    pub fn dependents(&self, name: &str) -> Vec<&ProjectNode> {
        self.dependencies
            .iter()
            .filter(|(source, edges)| {
                source.as_str() != name && edges.iter().any(|e| e.target == name)
            })
            .filter_map(|(source, _)| self.nodes.get(source))
            .collect()
    }
}
