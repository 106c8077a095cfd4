//! Pipeline orchestrator
//!
//! Runs the ingestion phases in order over a single in-memory graph,
//! optionally bulk-loads the result into a storage backend, and returns
//! a run summary. Also provides the file-local mini-pipeline used by the
//! incremental re-indexer.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use axon_core::{KnowledgeGraph, NodeLabel, StorageBackend};

use crate::calls::process_calls;
use crate::community::{process_communities, MIN_COMMUNITY_SIZE};
use crate::config::IgnoreRules;
use crate::coupling::{process_coupling, MIN_STRENGTH};
use crate::dead_code::process_dead_code;
use crate::heritage::process_heritage;
use crate::imports::process_imports;
use crate::parsing::process_parsing;
use crate::processes::process_processes;
use crate::structure::process_structure;
use crate::types::process_types;
use crate::walker::{walk_repo, FileEntry};

/// Summary of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    pub files: usize,
    pub symbols: usize,
    pub relationships: usize,
    pub clusters: usize,
    pub processes: usize,
    pub dead_code: usize,
    pub coupled_pairs: usize,
    pub duration_seconds: f64,
    pub incremental: bool,
    pub changed_files: usize,
}

/// Labels counted as symbols in the run summary.
fn is_symbol_label(label: NodeLabel) -> bool {
    !matches!(
        label,
        NodeLabel::File | NodeLabel::Folder | NodeLabel::Community | NodeLabel::Process
    )
}

/// Run the full ingestion pipeline over `repo_path`.
///
/// When `storage` is provided the graph is bulk-loaded into it after all
/// phases complete. `full` forces a complete re-index (reserved for the
/// incremental-diff fast path; currently every run is full). The
/// progress callback receives `(phase_name, fraction)` pairs.
pub fn run_pipeline(
    repo_path: &Path,
    mut storage: Option<&mut dyn StorageBackend>,
    _full: bool,
    mut progress: Option<&mut dyn FnMut(&str, f32)>,
) -> Result<(KnowledgeGraph, PipelineResult)> {
    let start = Instant::now();
    let mut result = PipelineResult::default();

    let mut report = |phase: &str, pct: f32, progress: &mut Option<&mut dyn FnMut(&str, f32)>| {
        if let Some(cb) = progress.as_mut() {
            cb(phase, pct);
        }
    };

    report("Walking files", 0.0, &mut progress);
    let rules = IgnoreRules::load(repo_path);
    let files = walk_repo(repo_path, &rules);
    result.files = files.len();
    report("Walking files", 1.0, &mut progress);

    let mut graph = KnowledgeGraph::new();

    report("Processing structure", 0.0, &mut progress);
    process_structure(&files, &mut graph);
    report("Processing structure", 1.0, &mut progress);

    report("Parsing code", 0.0, &mut progress);
    let parse_data = process_parsing(&files, &mut graph);
    report("Parsing code", 1.0, &mut progress);

    report("Resolving imports", 0.0, &mut progress);
    process_imports(&parse_data, &mut graph);
    report("Resolving imports", 1.0, &mut progress);

    report("Tracing calls", 0.0, &mut progress);
    process_calls(&parse_data, &mut graph);
    report("Tracing calls", 1.0, &mut progress);

    report("Extracting heritage", 0.0, &mut progress);
    process_heritage(&parse_data, &mut graph);
    report("Extracting heritage", 1.0, &mut progress);

    report("Analyzing types", 0.0, &mut progress);
    process_types(&parse_data, &mut graph);
    report("Analyzing types", 1.0, &mut progress);

    report("Detecting communities", 0.0, &mut progress);
    result.clusters = process_communities(&mut graph, MIN_COMMUNITY_SIZE);
    report("Detecting communities", 1.0, &mut progress);

    report("Detecting execution flows", 0.0, &mut progress);
    result.processes = process_processes(&mut graph);
    report("Detecting execution flows", 1.0, &mut progress);

    report("Finding dead code", 0.0, &mut progress);
    result.dead_code = process_dead_code(&mut graph);
    report("Finding dead code", 1.0, &mut progress);

    report("Analyzing git history", 0.0, &mut progress);
    result.coupled_pairs = process_coupling(&mut graph, repo_path, MIN_STRENGTH, None);
    report("Analyzing git history", 1.0, &mut progress);

    if let Some(storage) = storage.as_deref_mut() {
        report("Loading to storage", 0.0, &mut progress);
        storage.bulk_load(&graph)?;
        report("Loading to storage", 1.0, &mut progress);
    }

    result.symbols = graph
        .iter_nodes()
        .filter(|n| is_symbol_label(n.label))
        .count();
    result.relationships = graph.relationship_count();
    result.duration_seconds = start.elapsed().as_secs_f64();

    Ok((graph, result))
}

/// Re-index specific files through the file-local phases only.
///
/// Old nodes for these files are removed from storage first; the
/// re-parsed nodes and edges are inserted and the text indexes rebuilt.
/// Returns the partial graph for further processing.
pub fn reindex_files(
    file_entries: &[FileEntry],
    _repo_path: &Path,
    storage: &mut dyn StorageBackend,
) -> Result<KnowledgeGraph> {
    for entry in file_entries {
        storage.remove_nodes_by_file(&entry.path)?;
    }

    let mut graph = KnowledgeGraph::new();

    process_structure(file_entries, &mut graph);
    let parse_data = process_parsing(file_entries, &mut graph);
    process_imports(&parse_data, &mut graph);
    process_calls(&parse_data, &mut graph);
    process_heritage(&parse_data, &mut graph);
    process_types(&parse_data, &mut graph);

    let nodes: Vec<_> = graph.iter_nodes().cloned().collect();
    let rels: Vec<_> = graph.iter_relationships().cloned().collect();
    storage.add_nodes(&nodes)?;
    storage.add_relationships(&rels)?;
    storage.rebuild_fts_indexes()?;

    Ok(graph)
}

/// Run the pipeline and return only the in-memory graph (no storage),
/// used by branch comparison snapshots.
pub fn build_graph(repo_path: &Path) -> Result<KnowledgeGraph> {
    let (graph, _) = run_pipeline(repo_path, None, false, None)?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn empty_repository_yields_empty_graph() {
        let tmp = TempDir::new().unwrap();
        let (graph, result) = run_pipeline(tmp.path(), None, false, None).unwrap();

        assert_eq!(result.files, 0);
        assert_eq!(result.symbols, 0);
        assert_eq!(result.relationships, 0);
        assert_eq!(result.clusters, 0);
        assert_eq!(result.processes, 0);
        assert_eq!(result.dead_code, 0);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn pipeline_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "src/auth.py",
            "def validate(token):\n    return hash_password(token)\n\ndef hash_password(token):\n    return token\n",
        );
        write(
            tmp.path(),
            "src/app.py",
            "from .auth import validate\n\ndef login(token):\n    return validate(token)\n",
        );

        let (first, _) = run_pipeline(tmp.path(), None, false, None).unwrap();
        let (second, _) = run_pipeline(tmp.path(), None, false, None).unwrap();

        let nodes_a: Vec<&str> = first.iter_nodes().map(|n| n.id.as_str()).collect();
        let nodes_b: Vec<&str> = second.iter_nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(nodes_a, nodes_b);

        let rels_a: Vec<&str> = first.iter_relationships().map(|r| r.id.as_str()).collect();
        let rels_b: Vec<&str> = second.iter_relationships().map(|r| r.id.as_str()).collect();
        assert_eq!(rels_a, rels_b);
    }

    #[test]
    fn progress_callback_reaches_every_phase() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "main.py", "def main():\n    pass\n");

        let mut phases: Vec<String> = Vec::new();
        {
            let mut cb = |phase: &str, _pct: f32| {
                if !phases.contains(&phase.to_string()) {
                    phases.push(phase.to_string());
                }
            };
            run_pipeline(tmp.path(), None, false, Some(&mut cb)).unwrap();
        }

        assert_eq!(phases[0], "Walking files");
        assert!(phases.contains(&"Tracing calls".to_string()));
        assert!(phases.contains(&"Finding dead code".to_string()));
    }
}
