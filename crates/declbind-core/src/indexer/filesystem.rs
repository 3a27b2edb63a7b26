//! Locating and reading declaration inputs.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{DeclbindError, DeclbindResult};

const INPUT_EXTENSION: &str = "json";

/// Paths listed in a list file: one per line, blank lines and `#` comments
/// ignored. Relative entries resolve against the list file's directory.
pub fn read_list_file(path: &Path) -> DeclbindResult<Vec<PathBuf>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DeclbindError::Input(format!("cannot read list file {}: {e}", path.display()))
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(content
        .lines()
        .filter_map(|line| {
            let stripped = line.trim();
            if stripped.is_empty() || stripped.starts_with('#') {
                return None;
            }
            let entry = Path::new(stripped);
            Some(if entry.is_absolute() {
                entry.to_path_buf()
            } else {
                base.join(entry)
            })
        })
        .collect())
}

/// Every `*.json` file below `dir`, in sorted order.
pub fn collect_dir_inputs(dir: &Path) -> DeclbindResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            DeclbindError::Input(format!("cannot walk {}: {e}", dir.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_input = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION));
        if is_input {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Expand command-line inputs (files and directories) plus an optional
/// list file into the ordered list of batch files.
pub fn expand_inputs(inputs: &[PathBuf], list_file: Option<&Path>) -> DeclbindResult<Vec<PathBuf>> {
    let mut requested: Vec<PathBuf> = inputs.to_vec();
    if let Some(list) = list_file {
        requested.extend(read_list_file(list)?);
    }

    let mut files = Vec::new();
    for path in requested {
        if path.is_dir() {
            let found = collect_dir_inputs(&path)?;
            debug!(dir = %path.display(), files = found.len(), "expanded input directory");
            files.extend(found);
        } else if path.is_file() {
            files.push(path);
        } else {
            return Err(DeclbindError::Input(format!(
                "input not found: {}",
                path.display()
            )));
        }
    }
    Ok(files)
}

pub fn compute_content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
