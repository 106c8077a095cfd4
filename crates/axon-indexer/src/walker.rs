//! File system walker: discover and read source files in a repository
//!
//! Discovery is sequential; reading happens on a bounded worker pool. The
//! final list is sorted by relative path so downstream phases see files in
//! a deterministic order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{get_language, normalize_rel_path, IgnoreRules};

/// Default size of the file-reading worker pool.
pub const READ_WORKERS: usize = 8;

/// A source file discovered during walking.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    /// Relative path from the repo root (e.g. `src/auth/validate.py`).
    pub path: String,
    /// Full file content.
    pub content: String,
    /// Language tag (`python`, `typescript`, …).
    pub language: String,
}

/// Discover supported source file paths without reading their content.
///
/// Walks `repo_path` recursively and keeps paths that are not ignored and
/// carry a supported extension. Used by the incremental path to vet files
/// before reading.
pub fn discover_files(repo_path: &Path, rules: &IgnoreRules) -> Vec<PathBuf> {
    let mut discovered = Vec::new();

    for entry in WalkDir::new(repo_path).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(repo_path) else {
            continue;
        };
        if rules.should_ignore(relative) {
            continue;
        }
        if get_language(entry.path()).is_none() {
            continue;
        }
        discovered.push(entry.path().to_path_buf());
    }

    discovered
}

/// Read a single file into a [`FileEntry`], or `None` on failure.
///
/// Returns `None` when the file cannot be decoded as UTF-8 (binary files),
/// when it is empty, or on an OS-level read error.
pub fn read_file(repo_path: &Path, file_path: &Path) -> Option<FileEntry> {
    let relative = file_path.strip_prefix(repo_path).ok()?;

    let content = match std::fs::read_to_string(file_path) {
        Ok(content) => content,
        Err(err) => {
            debug!("skipping unreadable file {}: {}", file_path.display(), err);
            return None;
        }
    };
    if content.is_empty() {
        return None;
    }

    let language = get_language(file_path)?;

    Some(FileEntry {
        path: normalize_rel_path(relative),
        content,
        language: language.to_string(),
    })
}

/// Walk a repository and return every supported source file with content.
///
/// Reading is parallelised over a bounded pool (default 8 workers); the
/// result is stable-sorted by relative path.
pub fn walk_repo(repo_path: &Path, rules: &IgnoreRules) -> Vec<FileEntry> {
    let file_paths = discover_files(repo_path, rules);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(READ_WORKERS)
        .build();

    let mut entries: Vec<FileEntry> = match pool {
        Ok(pool) => pool.install(|| {
            file_paths
                .par_iter()
                .filter_map(|fp| read_file(repo_path, fp))
                .collect()
        }),
        // Pool creation can only fail under resource exhaustion; fall back
        // to sequential reads.
        Err(_) => file_paths
            .iter()
            .filter_map(|fp| read_file(repo_path, fp))
            .collect(),
    };

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}
