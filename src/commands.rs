//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use axon_core::{hybrid_search, StorageBackend, DEFAULT_RRF_K};
use axon_indexer::pipeline::run_pipeline;
use axon_store::GraphStore;
use axon_tools::registry::{build_meta, default_registry_dir, RepoStats};

/// Per-repository metadata directory.
const AXON_DIR: &str = ".axon-pro";
/// Store directory inside it.
const STORE_DIR: &str = "graph";

fn store_path(repo_path: &Path) -> PathBuf {
    repo_path.join(AXON_DIR).join(STORE_DIR)
}

/// Open the store for the given repo read-only, failing when no index
/// exists yet.
fn load_storage(repo_path: &Path) -> Result<GraphStore> {
    let db_path = store_path(repo_path);
    if !db_path.exists() {
        bail!(
            "no index found at {}; run 'axon analyze' first",
            repo_path.display()
        );
    }
    let mut storage = GraphStore::new();
    storage.initialize(&db_path, true)?;
    Ok(storage)
}

pub fn analyze(path: PathBuf, full: bool) -> Result<()> {
    let repo_path = path
        .canonicalize()
        .with_context(|| format!("{} is not an accessible directory", path.display()))?;
    if !repo_path.is_dir() {
        bail!("{} is not a directory", repo_path.display());
    }

    tracing::info!("indexing {}", repo_path.display());

    let axon_dir = repo_path.join(AXON_DIR);
    std::fs::create_dir_all(&axon_dir)?;

    let mut storage = GraphStore::new();
    storage.initialize(&store_path(&repo_path), false)?;

    let mut progress = |phase: &str, pct: f32| {
        tracing::debug!("{phase} ({:.0}%)", pct * 100.0);
    };
    let (_, result) = run_pipeline(&repo_path, Some(&mut storage), full, Some(&mut progress))?;
    storage.close();

    let repo_name = repo_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string());
    let meta = build_meta(
        env!("CARGO_PKG_VERSION"),
        &repo_name,
        &repo_path.to_string_lossy(),
        RepoStats {
            files: result.files as u64,
            symbols: result.symbols as u64,
            relationships: result.relationships as u64,
            clusters: result.clusters as u64,
            flows: result.processes as u64,
            dead_code: result.dead_code as u64,
            coupled_pairs: result.coupled_pairs as u64,
        },
        &chrono::Utc::now().to_rfc3339(),
    );
    let meta_text = serde_json::to_string_pretty(&meta)? + "\n";
    std::fs::write(axon_dir.join("meta.json"), &meta_text)?;

    // Mirror into the user-global registry for discovery.
    if let Some(registry_dir) = default_registry_dir() {
        let repo_registry = registry_dir.join(&repo_name);
        if std::fs::create_dir_all(&repo_registry).is_ok() {
            let _ = std::fs::write(repo_registry.join("meta.json"), &meta_text);
        }
    }

    println!("Indexing complete.");
    println!("  Files:          {}", result.files);
    println!("  Symbols:        {}", result.symbols);
    println!("  Relationships:  {}", result.relationships);
    if result.clusters > 0 {
        println!("  Clusters:       {}", result.clusters);
    }
    if result.processes > 0 {
        println!("  Flows:          {}", result.processes);
    }
    if result.dead_code > 0 {
        println!("  Dead code:      {}", result.dead_code);
    }
    if result.coupled_pairs > 0 {
        println!("  Coupled pairs:  {}", result.coupled_pairs);
    }
    println!("  Duration:       {:.2}s", result.duration_seconds);

    Ok(())
}

pub fn status() -> Result<()> {
    let repo_path = std::env::current_dir()?;
    let meta_path = repo_path.join(AXON_DIR).join("meta.json");
    if !meta_path.exists() {
        bail!(
            "no index found at {}; run 'axon analyze' first",
            repo_path.display()
        );
    }

    let meta: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)?;
    let stats = meta.get("stats").cloned().unwrap_or_default();

    println!(
        "Index for {}",
        meta.get("name").and_then(|v| v.as_str()).unwrap_or("?")
    );
    println!(
        "  Last indexed:  {}",
        meta.get("last_indexed_at")
            .and_then(|v| v.as_str())
            .unwrap_or("?")
    );
    for key in [
        "files",
        "symbols",
        "relationships",
        "clusters",
        "flows",
        "dead_code",
        "coupled_pairs",
    ] {
        if let Some(value) = stats.get(key).and_then(|v| v.as_u64()) {
            println!("  {key}: {value}");
        }
    }
    Ok(())
}

pub fn search(query: String, limit: usize) -> Result<()> {
    let repo_path = std::env::current_dir()?;
    let storage = load_storage(&repo_path)?;

    let results = hybrid_search(&query, &storage, None, limit, 1.0, 1.0, DEFAULT_RRF_K);
    if results.is_empty() {
        println!("No results found for '{query}'.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} ({}) -- {}",
            i + 1,
            result.node_name,
            result.label,
            result.file_path
        );
        if !result.snippet.is_empty() {
            let snippet: String = result.snippet.replace('\n', " ");
            println!("   {}", snippet.trim());
        }
    }
    Ok(())
}

pub fn diff(path: PathBuf, range: String) -> Result<()> {
    let repo_path = path.canonicalize()?;
    let structural = axon_indexer::diff_branches(&repo_path, &range)?;
    println!("{}", axon_indexer::format_diff(&structural));
    Ok(())
}

pub async fn watch(path: PathBuf) -> Result<()> {
    let repo_path = path.canonicalize()?;

    let mut storage = GraphStore::new();
    storage.initialize(&store_path(&repo_path), false)?;

    // Build a fresh index before watching so the store starts complete.
    let (_, result) = run_pipeline(&repo_path, Some(&mut storage), true, None)?;
    tracing::info!(
        "initial index complete: {} files, {} symbols",
        result.files,
        result.symbols
    );

    let storage = Arc::new(Mutex::new(storage));
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(true);
        }
    });

    axon_watcher::watch_repo(
        &repo_path,
        storage,
        stop_rx,
        axon_watcher::WatchOptions::default(),
    )
    .await
}
