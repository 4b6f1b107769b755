//! Entry-point discovery.
//!
//! Every TypeScript module beneath the entry file's directory becomes a
//! consumer-facing entry point, keyed by its path relative to the source root
//! without extension (`index`, `widgets/button`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use libroll_config::to_slash;
use walkdir::WalkDir;

use crate::Result;

const ENTRY_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];
/// Stem suffixes of test files, which are never entries.
const TEST_STEM_SUFFIXES: &[&str] = &[".spec", ".test"];

/// Export key → absolute source path, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPointIndex {
    source_dir: String,
    entries: BTreeMap<String, PathBuf>,
}

impl EntryPointIndex {
    /// Empty index for sources living in `source_dir` (relative to the project root).
    pub fn new(source_dir: impl Into<String>) -> Self {
        Self {
            source_dir: source_dir.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn source_dir(&self) -> &str {
        &self.source_dir
    }

    pub fn insert(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.entries.insert(key.into(), path.into());
    }

    /// Last-write merge; keys are path-derived so repeated scans converge.
    pub fn merge(&mut self, other: EntryPointIndex) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bundle input name for `key` (`src/widgets/button`).
    pub fn input_name(&self, key: &str) -> String {
        if self.source_dir.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.source_dir, key)
        }
    }
}

/// Scan `entry_root` for entry points.
pub fn scan_entries(
    entry_root: &Path,
    source_root: &Path,
    source_dir: &str,
) -> Result<EntryPointIndex> {
    let mut index = EntryPointIndex::new(source_dir);
    if !entry_root.is_dir() {
        return Ok(index);
    }

    let key_base = if entry_root.starts_with(source_root) {
        source_root
    } else {
        entry_root
    };

    let walker = WalkDir::new(entry_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || !(name.starts_with('.') || name == "node_modules")
        });

    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if !entry.file_type().is_file() || !is_entry_file(entry.path()) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(key_base) else {
            continue;
        };
        let key = to_slash(&relative.with_extension(""));
        tracing::trace!("Discovered entry point {} ({})", key, entry.path().display());
        index.insert(key, entry.path());
    }

    Ok(index)
}

fn is_entry_file(path: &Path) -> bool {
    let (Some(stem), Some(extension)) = (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) else {
        return false;
    };

    ENTRY_EXTENSIONS.contains(&extension)
        && !(extension == "ts" && stem.ends_with(".d"))
        && !TEST_STEM_SUFFIXES.iter().any(|s| stem.ends_with(s))
}
