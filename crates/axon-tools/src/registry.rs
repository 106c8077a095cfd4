//! Indexed-repository registry
//!
//! Every `analyze` run mirrors its `meta.json` into a user-global
//! registry directory (default `~/.axon-pro/repos/<name>/meta.json`) so
//! tool clients can discover indexed projects.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-repository metadata, written next to the store and into the
/// registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoMeta {
    pub version: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub stats: RepoStats,
    #[serde(default)]
    pub last_indexed_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoStats {
    #[serde(default)]
    pub files: u64,
    #[serde(default)]
    pub symbols: u64,
    #[serde(default)]
    pub relationships: u64,
    #[serde(default)]
    pub clusters: u64,
    #[serde(default)]
    pub flows: u64,
    #[serde(default)]
    pub dead_code: u64,
    #[serde(default)]
    pub coupled_pairs: u64,
}

/// The default registry directory: `~/.axon-pro/repos`.
pub fn default_registry_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".axon-pro").join("repos"))
}

fn read_meta(path: &Path) -> Option<RepoMeta> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

/// Collect metadata for every registered repository. Unreadable entries
/// are skipped.
pub fn collect_repos(registry_dir: &Path) -> Vec<RepoMeta> {
    let Ok(entries) = std::fs::read_dir(registry_dir) else {
        return Vec::new();
    };

    let mut repos: Vec<RepoMeta> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| read_meta(&entry.path().join("meta.json")))
        .collect();
    repos.sort_by(|a, b| a.name.cmp(&b.name));
    repos
}

/// List indexed repositories as a formatted report.
///
/// Scans `registry_dir` (or the default) and falls back to
/// `<cwd>/.axon-pro/meta.json` when the registry is empty and no
/// explicit directory was given.
pub fn handle_list_repos(registry_dir: Option<&Path>) -> String {
    let use_cwd_fallback = registry_dir.is_none();
    let resolved = registry_dir
        .map(Path::to_path_buf)
        .or_else(default_registry_dir);

    let mut repos = resolved
        .as_deref()
        .map(collect_repos)
        .unwrap_or_default();

    if repos.is_empty() && use_cwd_fallback {
        if let Ok(cwd) = std::env::current_dir() {
            if let Some(meta) = read_meta(&cwd.join(".axon-pro").join("meta.json")) {
                repos.push(meta);
            }
        }
    }

    if repos.is_empty() {
        return "No indexed repositories found. Run `axon analyze` on a project first.".to_string();
    }

    let mut lines = vec![format!("Indexed repositories ({}):", repos.len()), String::new()];
    for (i, repo) in repos.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, repo.name));
        lines.push(format!("     Path: {}", repo.path));
        lines.push(format!(
            "     Files: {}  Symbols: {}  Relationships: {}",
            repo.stats.files, repo.stats.symbols, repo.stats.relationships
        ));
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Build the meta blob for a finished index run.
pub fn build_meta(
    version: &str,
    name: &str,
    path: &str,
    stats: RepoStats,
    last_indexed_at: &str,
) -> Value {
    serde_json::json!({
        "version": version,
        "name": name,
        "path": path,
        "stats": {
            "files": stats.files,
            "symbols": stats.symbols,
            "relationships": stats.relationships,
            "clusters": stats.clusters,
            "flows": stats.flows,
            "dead_code": stats.dead_code,
            "coupled_pairs": stats.coupled_pairs,
        },
        "last_indexed_at": last_indexed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_meta(dir: &Path, name: &str) {
        let repo_dir = dir.join(name);
        std::fs::create_dir_all(&repo_dir).unwrap();
        let meta = build_meta(
            "0.4.0",
            name,
            &format!("/work/{name}"),
            RepoStats {
                files: 3,
                symbols: 10,
                relationships: 12,
                ..RepoStats::default()
            },
            "2026-08-01T00:00:00Z",
        );
        std::fs::write(
            repo_dir.join("meta.json"),
            serde_json::to_string_pretty(&meta).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn lists_registered_repos() {
        let tmp = TempDir::new().unwrap();
        write_meta(tmp.path(), "beta");
        write_meta(tmp.path(), "alpha");

        let report = handle_list_repos(Some(tmp.path()));
        assert!(report.contains("Indexed repositories (2):"));
        let alpha_pos = report.find("alpha").unwrap();
        let beta_pos = report.find("beta").unwrap();
        assert!(alpha_pos < beta_pos);
        assert!(report.contains("Files: 3  Symbols: 10  Relationships: 12"));
    }

    #[test]
    fn empty_registry_reports_none() {
        let tmp = TempDir::new().unwrap();
        let report = handle_list_repos(Some(tmp.path()));
        assert!(report.contains("No indexed repositories found"));
    }

    #[test]
    fn malformed_meta_is_skipped() {
        let tmp = TempDir::new().unwrap();
        write_meta(tmp.path(), "good");
        let bad_dir = tmp.path().join("bad");
        std::fs::create_dir_all(&bad_dir).unwrap();
        std::fs::write(bad_dir.join("meta.json"), "{not json").unwrap();

        let report = handle_list_repos(Some(tmp.path()));
        assert!(report.contains("Indexed repositories (1):"));
    }
}
