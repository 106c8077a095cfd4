//! Watch mode: debounced incremental re-indexing
//!
//! Filesystem events are batched with a debounce window. Each batch runs
//! the file-local phases only; a dirty flag plus a global interval
//! triggers a full pipeline refresh (communities, processes, dead code,
//! coupling). Storage-mutating work happens under a single lock so
//! concurrent readers observe either the state before a batch or after
//! it, never a partially applied one. The loop exits between batches
//! when the stop signal fires.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axon_core::StorageBackend;
use axon_indexer::config::IgnoreRules;
use axon_indexer::pipeline::{reindex_files, run_pipeline};
use axon_indexer::walker::{read_file, FileEntry};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// Tuning knobs for the watch loop.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Quiet period before a batch of changes is processed.
    pub debounce: Duration,
    /// Quiet period (while dirty) before the global phases re-run.
    pub global_interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            debounce: Duration::from_millis(500),
            global_interval: Duration::from_secs(30),
        }
    }
}

/// Watch `repo_path` and keep `storage` in sync until `stop_rx` turns
/// true.
pub async fn watch_repo<S>(
    repo_path: &Path,
    storage: Arc<Mutex<S>>,
    mut stop_rx: watch::Receiver<bool>,
    options: WatchOptions,
) -> Result<()>
where
    S: StorageBackend + Send + 'static,
{
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    for path in event.paths {
                        let _ = event_tx.send(path);
                    }
                }
            }
            Err(err) => error!("filesystem watch error: {err}"),
        })?;
    watcher.watch(repo_path, RecursiveMode::Recursive)?;
    info!("watching {} for changes", repo_path.display());

    let rules = Arc::new(IgnoreRules::load(repo_path));
    let repo_path = repo_path.to_path_buf();
    let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
    let mut dirty = false;
    let mut files_changed = 0usize;

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            maybe_path = event_rx.recv() => {
                match maybe_path {
                    Some(path) => { pending.insert(path); }
                    None => break,
                }
            }
            _ = tokio::time::sleep(options.debounce), if !pending.is_empty() => {
                let batch: Vec<PathBuf> = std::mem::take(&mut pending).into_iter().collect();
                match process_batch(batch, &repo_path, &storage, &rules).await {
                    Ok(count) if count > 0 => {
                        files_changed += count;
                        dirty = true;
                        info!("reindexed {count} file(s)");
                    }
                    Ok(_) => {}
                    Err(err) => error!("incremental reindex failed: {err}"),
                }
            }
            _ = tokio::time::sleep(options.global_interval), if dirty && pending.is_empty() => {
                info!("running global analysis phases");
                if let Err(err) = run_global_phases(&repo_path, &storage).await {
                    error!("global phase refresh failed: {err}");
                }
                dirty = false;
            }
        }
    }

    info!("watch stopped; total files reindexed: {files_changed}");
    Ok(())
}

/// Run the file-local phases over one debounced batch.
///
/// Deleted paths are removed from storage; ignored and unsupported paths
/// are skipped; the survivors are read and pushed through the
/// mini-pipeline. The storage lock is held only for the mutating part.
async fn process_batch<S>(
    batch: Vec<PathBuf>,
    repo_path: &Path,
    storage: &Arc<Mutex<S>>,
    rules: &Arc<IgnoreRules>,
) -> Result<usize>
where
    S: StorageBackend + Send + 'static,
{
    let repo_path = repo_path.to_path_buf();
    let storage = Arc::clone(storage);
    let rules = Arc::clone(rules);

    tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut deleted: Vec<String> = Vec::new();
        let mut entries: Vec<FileEntry> = Vec::new();

        for abs_path in batch {
            let Ok(relative) = abs_path.strip_prefix(&repo_path) else {
                continue;
            };

            if rules.should_ignore(relative) {
                debug!("ignoring changed path {}", relative.display());
                continue;
            }
            if !axon_indexer::config::is_supported(&abs_path) {
                continue;
            }
            if !abs_path.is_file() {
                deleted.push(axon_indexer::config::normalize_rel_path(relative));
                continue;
            }
            if let Some(entry) = read_file(&repo_path, &abs_path) {
                entries.push(entry);
            }
        }

        if deleted.is_empty() && entries.is_empty() {
            return Ok(0);
        }

        let mut guard = storage.lock().expect("storage lock poisoned");
        for path in &deleted {
            guard.remove_nodes_by_file(path)?;
        }
        if !entries.is_empty() {
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            reindex_files(&entries, &repo_path, &mut *guard)?;
        }
        Ok(entries.len())
    })
    .await?
}

/// Full pipeline refresh for the global phases (communities, processes,
/// dead code, coupling).
async fn run_global_phases<S>(repo_path: &Path, storage: &Arc<Mutex<S>>) -> Result<()>
where
    S: StorageBackend + Send + 'static,
{
    let repo_path = repo_path.to_path_buf();
    let storage = Arc::clone(storage);

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut guard = storage.lock().expect("storage lock poisoned");
        run_pipeline(&repo_path, Some(&mut *guard), true, None)?;
        info!("global phases completed");
        Ok(())
    })
    .await?
}
