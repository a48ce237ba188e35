//! Directory scanner
//!
//! Walks registered roots depth-first with the ignore engine applied and
//! emits candidate files with the metadata the indexer needs for change
//! detection. Unreadable entries are logged and skipped; a missing root is
//! the caller's error.

use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::content::normalize_path;
use crate::error::{AppError, Result};
use crate::ignore_rules::{build_walker, EssentialPatterns};

/// One file surviving the ignore filter.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    /// Normalized absolute path.
    pub path: String,
    pub size: u64,
    /// Epoch seconds; 0 when the platform cannot report it.
    pub modified_time: i64,
    /// Exceeds the size cap: excluded from processing but still reported so
    /// the indexer can warn on a previously indexed record instead of
    /// deleting it.
    pub oversize: bool,
}

/// Enumerate candidate files under a normalized root.
pub fn scan_root(
    root: &str,
    essentials: &EssentialPatterns,
    max_file_size: u64,
) -> Result<Vec<FileCandidate>> {
    let root_path = Path::new(root);
    if !root_path.is_dir() {
        return Err(AppError::NotFound(format!(
            "directory '{root}' does not exist or is not a directory"
        )));
    }
    let canonical_root = root_path.canonicalize().map_err(|e| {
        AppError::NotFound(format!("directory '{root}' cannot be resolved: {e}"))
    })?;

    let mut candidates = Vec::new();
    for entry in build_walker(root_path, essentials) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping unreadable entry during walk");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        // Symlink containment: a link target outside the root is rejected.
        let resolved = match entry.path().canonicalize() {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), error = %err, "Skipping unresolvable path");
                continue;
            }
        };
        if !resolved.starts_with(&canonical_root) {
            tracing::warn!(path = %entry.path().display(), "Skipping symlink escaping the scanned root");
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), error = %err, "Skipping file without metadata");
                continue;
            }
        };
        let modified_time = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        candidates.push(FileCandidate {
            path: normalize_path(entry.path()),
            size: metadata.len(),
            modified_time,
            oversize: metadata.len() > max_file_size,
        });
    }

    tracing::debug!(root, count = candidates.len(), "Scan complete");
    Ok(candidates)
}
