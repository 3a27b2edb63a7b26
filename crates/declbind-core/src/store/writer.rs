//! Persisting generated fragments and the signature catalog.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codegen::GeneratedSources;
use crate::errors::DeclbindResult;
use crate::indexer::filesystem::compute_content_hash;
use crate::store::catalog::SignatureCatalog;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// Write `contents` to `path` unless the file already holds exactly that
/// content. Returns whether the file was written.
pub fn write_if_changed(path: &Path, contents: &str) -> DeclbindResult<bool> {
    if path.is_file() {
        let existing = std::fs::read(path)?;
        if compute_content_hash(&existing) == compute_content_hash(contents.as_bytes()) {
            debug!(path = %path.display(), "unchanged, skipping write");
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(true)
}

/// Save every generated fragment plus the catalog under `output_dir`.
pub fn save_outputs(
    output_dir: &Path,
    prefix: &str,
    sources: &GeneratedSources,
    catalog: &SignatureCatalog,
) -> DeclbindResult<WriteSummary> {
    let mut files: Vec<(String, String)> = sources
        .fragments()
        .into_iter()
        .map(|(suffix, text)| (format!("{prefix}_generated_{suffix}.h"), text.to_string()))
        .collect();
    files.push((format!("{prefix}_signatures.json"), catalog.to_json()?));

    let mut summary = WriteSummary::default();
    for (name, contents) in files {
        let path = output_dir.join(name);
        if write_if_changed(&path, &contents)? {
            summary.written.push(path);
        } else {
            summary.unchanged.push(path);
        }
    }
    info!(
        written = summary.written.len(),
        unchanged = summary.unchanged.len(),
        dir = %output_dir.display(),
        "outputs saved"
    );
    Ok(summary)
}
