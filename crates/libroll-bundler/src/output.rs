//! Writing bundle output and clearing the output directory.
//!
//! Every written path is cleaned and checked to stay inside the output
//! directory; chunks are staged as temporary files and renamed into place so a
//! failed write never leaves a half-written bundle behind.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::{Error, Result};

/// A file produced by the bundler, relative to the output directory.
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub filename: String,
    pub contents: Vec<u8>,
}

/// Write `files` into `dir`, returning the absolute paths written.
pub fn write_output(files: &[OutputFile], dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = dir.to_path_buf().clean();
    fs::create_dir_all(&dir).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create output directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let mut operations = Vec::with_capacity(files.len());
    for file in files {
        let target = validate_output_path(&dir, &file.filename)?;
        operations.push((target, file.contents.as_slice()));
    }

    write_files_atomic(&operations)?;
    Ok(operations.into_iter().map(|(path, _)| path).collect())
}

/// Resolve `filename` inside `base_dir`, rejecting traversal.
pub(crate) fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();
    if !full_path.starts_with(base_dir) {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}'",
            filename,
            base_dir.display()
        )));
    }

    Ok(full_path)
}

fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(operations.len());

    for (target, content) in operations {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                cleanup(&staged);
                Error::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut temp = target.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        fs::write(&temp, content).map_err(|e| {
            cleanup(&staged);
            Error::WriteFailure(format!(
                "Failed to write temporary file '{}': {}",
                temp.display(),
                e
            ))
        })?;
        staged.push((temp, target.as_path()));
    }

    for (temp, target) in &staged {
        fs::rename(temp, target).map_err(|e| {
            cleanup(&staged);
            Error::WriteFailure(format!(
                "Failed to rename '{}' to '{}': {}",
                temp.display(),
                target.display(),
                e
            ))
        })?;
    }

    Ok(())
}

fn cleanup(staged: &[(PathBuf, &Path)]) {
    for (temp, _) in staged {
        if temp.exists() {
            if let Err(e) = fs::remove_file(temp) {
                tracing::warn!(
                    "Failed to clean up temporary file '{}': {}",
                    temp.display(),
                    e
                );
            }
        }
    }
}

/// Recursively delete the output directory.
///
/// Refuses to delete the workspace root or any of its ancestors.
pub fn delete_output_path(output_path: &Path, workspace_root: &Path) -> Result<()> {
    let output_path = output_path.to_path_buf().clean();
    if workspace_root.starts_with(&output_path) {
        return Err(Error::InvalidOutputPath(format!(
            "Refusing to delete '{}': it contains the workspace root",
            output_path.display()
        )));
    }

    if !output_path.exists() {
        return Ok(());
    }
    if !output_path.is_dir() {
        return Err(Error::InvalidOutputPath(format!(
            "Output path exists but is not a directory: {}",
            output_path.display()
        )));
    }

    tracing::debug!("Deleting output path {}", output_path.display());
    fs::remove_dir_all(&output_path)?;
    Ok(())
}

/// Copy every file matching `glob` under `input` into `output`.
pub fn copy_matching(input: &Path, glob: &str, output: &Path) -> Result<usize> {
    use ignore::WalkBuilder;
    use ignore::overrides::OverrideBuilder;

    if !input.is_dir() {
        tracing::warn!("Asset input {} does not exist, skipping", input.display());
        return Ok(0);
    }

    let overrides = OverrideBuilder::new(input)
        .add(glob)
        .and_then(|b| b.build())
        .map_err(|e| Error::InvalidOutputPath(format!("invalid asset glob '{glob}': {e}")))?;

    let walker = WalkBuilder::new(input)
        .standard_filters(false)
        .overrides(overrides)
        .build();

    let mut copied = 0;
    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(input) else {
            continue;
        };
        let target = output.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
        copied += 1;
    }

    Ok(copied)
}
