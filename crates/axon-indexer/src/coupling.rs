//! Change coupling phase: COUPLED_WITH edges from version-control
//! history
//!
//! Files that repeatedly change in the same commits share implicit
//! dependencies invisible to static analysis. The git log is parsed via
//! subprocess; a non-git repository simply produces no edges.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::Command;

use axon_core::{GraphRelationship, KnowledgeGraph, NodeLabel, RelType};
use tracing::{debug, info};

/// Default history window in months.
pub const SINCE_MONTHS: u32 = 6;
/// Commits touching more files than this are skipped (merges, bulk
/// reformats).
pub const MAX_FILES_PER_COMMIT: usize = 50;
/// Default minimum strength for an edge.
pub const MIN_STRENGTH: f64 = 0.3;

/// Run `git log --name-only` and return commits as lists of changed
/// file paths, filtered to `graph_files` when provided. Returns an empty
/// list when the command fails (not a git repository, git missing).
pub fn parse_git_log(
    repo_path: &Path,
    since_months: u32,
    graph_files: Option<&BTreeSet<String>>,
) -> Vec<Vec<String>> {
    let output = Command::new("git")
        .args([
            "log",
            "--name-only",
            "--pretty=format:COMMIT:%H",
            &format!("--since={since_months} months ago"),
        ])
        .current_dir(repo_path)
        .output();

    let output = match output {
        Ok(output) if output.status.success() => output,
        _ => {
            debug!("git log failed for {} (not a git repo?)", repo_path.display());
            return Vec::new();
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut commits: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("COMMIT:") {
            if !current.is_empty() {
                commits.push(std::mem::take(&mut current));
            }
        } else if graph_files.map_or(true, |files| files.contains(trimmed)) {
            current.push(trimmed.to_string());
        }
    }
    if !current.is_empty() {
        commits.push(current);
    }

    commits
}

/// Co-change counts per unordered file pair. Pair keys are sorted so
/// `(A, B)` and `(B, A)` share an entry, making the emitted edge
/// direction canonical. Oversized commits are skipped; pairs below
/// `min_cochanges` are dropped.
pub fn build_cochange_matrix(
    commits: &[Vec<String>],
    min_cochanges: u32,
    max_files_per_commit: usize,
) -> BTreeMap<(String, String), u32> {
    let mut counts: BTreeMap<(String, String), u32> = BTreeMap::new();

    for files in commits {
        let unique: BTreeSet<&String> = files.iter().collect();
        if unique.len() > max_files_per_commit {
            continue;
        }
        let ordered: Vec<&String> = unique.into_iter().collect();
        for i in 0..ordered.len() {
            for j in (i + 1)..ordered.len() {
                *counts
                    .entry((ordered[i].clone(), ordered[j].clone()))
                    .or_insert(0) += 1;
            }
        }
    }

    counts.retain(|_, count| *count >= min_cochanges);
    counts
}

/// `co_changes / max(total_a, total_b)`, in `[0, 1]`.
pub fn calculate_coupling(
    file_a: &str,
    file_b: &str,
    co_changes: u32,
    total_changes: &BTreeMap<String, u32>,
) -> f64 {
    let max_changes = total_changes
        .get(file_a)
        .copied()
        .unwrap_or(0)
        .max(total_changes.get(file_b).copied().unwrap_or(0));
    if max_changes == 0 {
        return 0.0;
    }
    co_changes as f64 / max_changes as f64
}

/// Analyse history and create COUPLED_WITH relationships between File
/// nodes. Returns the number created.
///
/// `commits` can be supplied directly for deterministic testing; when
/// `None`, the git log is parsed.
pub fn process_coupling(
    graph: &mut KnowledgeGraph,
    repo_path: &Path,
    min_strength: f64,
    commits: Option<Vec<Vec<String>>>,
) -> usize {
    let file_nodes = graph.get_nodes_by_label(NodeLabel::File);
    let graph_files: BTreeSet<String> = file_nodes.iter().map(|n| n.file_path.clone()).collect();
    let path_to_id: BTreeMap<String, String> = file_nodes
        .iter()
        .map(|n| (n.file_path.clone(), n.id.clone()))
        .collect();

    let commits = match commits {
        Some(commits) => commits,
        None => parse_git_log(repo_path, SINCE_MONTHS, Some(&graph_files)),
    };

    // Threshold of 1 here: pairs are filtered by strength below.
    let cochange = build_cochange_matrix(&commits, 1, MAX_FILES_PER_COMMIT);

    let mut total_changes: BTreeMap<String, u32> = BTreeMap::new();
    for files in &commits {
        let unique: BTreeSet<&String> = files.iter().collect();
        for file in unique {
            *total_changes.entry(file.clone()).or_insert(0) += 1;
        }
    }

    let mut count = 0usize;
    for ((file_a, file_b), co_changes) in &cochange {
        let strength = calculate_coupling(file_a, file_b, *co_changes, &total_changes);
        if strength < min_strength {
            continue;
        }

        let (Some(id_a), Some(id_b)) = (path_to_id.get(file_a), path_to_id.get(file_b)) else {
            continue;
        };

        graph.add_relationship(
            GraphRelationship::new(
                format!("coupled:{id_a}->{id_b}"),
                RelType::CoupledWith,
                id_a.clone(),
                id_b.clone(),
            )
            .with_prop("strength", strength)
            .with_prop("co_changes", *co_changes),
        );
        count += 1;
    }

    info!("created {count} coupled_with relationships");
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::GraphNode;

    fn file_node(path: &str) -> GraphNode {
        GraphNode::new(NodeLabel::File, path, "", path)
    }

    fn commits(history: &[&[&str]]) -> Vec<Vec<String>> {
        history
            .iter()
            .map(|files| files.iter().map(|f| f.to_string()).collect())
            .collect()
    }

    #[test]
    fn strength_formula_and_threshold() {
        let mut graph = KnowledgeGraph::new();
        for path in ["x.py", "y.py", "u.py", "v.py"] {
            graph.add_node(file_node(path));
        }

        let history = commits(&[
            &["x.py", "y.py"],
            &["x.py", "y.py"],
            &["x.py", "y.py"],
            &["x.py"],
            &["y.py"],
            &["u.py", "v.py"],
        ]);

        let created = process_coupling(&mut graph, Path::new("."), MIN_STRENGTH, Some(history));
        assert_eq!(created, 2);

        let xy = graph
            .get_relationship("coupled:file:x.py:->file:y.py:")
            .unwrap();
        assert_eq!(xy.prop_f64("strength"), 0.75);
        assert_eq!(xy.prop_i64("co_changes"), 3);

        let uv = graph
            .get_relationship("coupled:file:u.py:->file:v.py:")
            .unwrap();
        assert_eq!(uv.prop_f64("strength"), 1.0);
    }

    #[test]
    fn weak_pairs_are_dropped() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node(file_node("a.py"));
        graph.add_node(file_node("b.py"));

        let history = commits(&[
            &["a.py", "b.py"],
            &["a.py"],
            &["a.py"],
            &["a.py"],
            &["a.py"],
        ]);

        // co=1, total(a)=5 -> strength 0.2 < 0.3.
        let created = process_coupling(&mut graph, Path::new("."), MIN_STRENGTH, Some(history));
        assert_eq!(created, 0);
    }

    #[test]
    fn oversized_commits_are_skipped() {
        let big: Vec<String> = (0..60).map(|i| format!("f{i}.py")).collect();
        let matrix = build_cochange_matrix(&[big], 1, MAX_FILES_PER_COMMIT);
        assert!(matrix.is_empty());
    }

    #[test]
    fn non_git_directory_produces_no_edges() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut graph = KnowledgeGraph::new();
        graph.add_node(file_node("a.py"));

        let created = process_coupling(&mut graph, tmp.path(), MIN_STRENGTH, None);
        assert_eq!(created, 0);
    }

    #[test]
    fn canonical_direction_is_sorted() {
        let matrix = build_cochange_matrix(
            &commits(&[&["z.py", "a.py"], &["a.py", "z.py"]]),
            1,
            MAX_FILES_PER_COMMIT,
        );
        assert_eq!(matrix.get(&("a.py".to_string(), "z.py".to_string())), Some(&2));
        assert!(!matrix.contains_key(&("z.py".to_string(), "a.py".to_string())));
    }
}
