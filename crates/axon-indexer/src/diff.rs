//! Structural branch comparison
//!
//! Builds in-memory graphs for two refs using temporary git worktrees
//! (so the user's working tree is never touched) and diffs them by node
//! and relationship id. Worktrees are removed on every exit path.

use std::path::{Path, PathBuf};
use std::process::Command;

use axon_core::{GraphNode, GraphRelationship, KnowledgeGraph};
use thiserror::Error;
use tracing::warn;

use crate::pipeline::build_graph;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("invalid branch range {0:?}")]
    InvalidRange(String),
    #[error("failed to create worktree for ref {ref_name:?}: {message}")]
    Worktree { ref_name: String, message: String },
    #[error("pipeline failed: {0}")]
    Pipeline(String),
}

/// Result of comparing two code graphs.
#[derive(Debug, Default)]
pub struct StructuralDiff {
    pub added_nodes: Vec<GraphNode>,
    pub removed_nodes: Vec<GraphNode>,
    /// `(base, current)` pairs for nodes whose content, signature, or
    /// line range changed.
    pub modified_nodes: Vec<(GraphNode, GraphNode)>,
    pub added_relationships: Vec<GraphRelationship>,
    pub removed_relationships: Vec<GraphRelationship>,
}

fn node_changed(base: &GraphNode, current: &GraphNode) -> bool {
    base.content != current.content
        || base.signature != current.signature
        || base.start_line != current.start_line
        || base.end_line != current.end_line
}

/// Diff two graph snapshots by id. Relationships are compared by id
/// only.
pub fn diff_graphs(base: &KnowledgeGraph, current: &KnowledgeGraph) -> StructuralDiff {
    let mut diff = StructuralDiff::default();

    for node in current.iter_nodes() {
        match base.get_node(&node.id) {
            None => diff.added_nodes.push(node.clone()),
            Some(base_node) => {
                if node_changed(base_node, node) {
                    diff.modified_nodes.push((base_node.clone(), node.clone()));
                }
            }
        }
    }
    for node in base.iter_nodes() {
        if current.get_node(&node.id).is_none() {
            diff.removed_nodes.push(node.clone());
        }
    }

    for rel in current.iter_relationships() {
        if base.get_relationship(&rel.id).is_none() {
            diff.added_relationships.push(rel.clone());
        }
    }
    for rel in base.iter_relationships() {
        if current.get_relationship(&rel.id).is_none() {
            diff.removed_relationships.push(rel.clone());
        }
    }

    diff
}

/// Compare two branches structurally.
///
/// `branch_range` is `base..current`; with no `..` (or an empty current
/// side) the working tree stands in for the current branch. The two
/// graph builds run in parallel when both sides need worktrees.
pub fn diff_branches(repo_path: &Path, branch_range: &str) -> Result<StructuralDiff, DiffError> {
    let (base_ref, current_ref) = match branch_range.split_once("..") {
        Some((base, current)) => {
            let current = current.trim();
            (
                base.trim().to_string(),
                if current.is_empty() {
                    None
                } else {
                    Some(current.to_string())
                },
            )
        }
        None => (branch_range.trim().to_string(), None),
    };

    if base_ref.is_empty() {
        return Err(DiffError::InvalidRange(branch_range.to_string()));
    }

    let (base_graph, current_graph) = match current_ref {
        Some(current_ref) => {
            let (base_result, current_result) = std::thread::scope(|scope| {
                let base_handle =
                    scope.spawn(|| build_graph_for_ref(repo_path, &base_ref));
                let current_handle =
                    scope.spawn(|| build_graph_for_ref(repo_path, &current_ref));
                (
                    base_handle.join().expect("base diff thread panicked"),
                    current_handle.join().expect("current diff thread panicked"),
                )
            });
            (base_result?, current_result?)
        }
        None => {
            let current = build_graph(repo_path)
                .map_err(|err| DiffError::Pipeline(err.to_string()))?;
            let base = build_graph_for_ref(repo_path, &base_ref)?;
            (base, current)
        }
    };

    Ok(diff_graphs(&base_graph, &current_graph))
}

/// Removes the worktree when dropped, so every exit path tears it down.
struct WorktreeGuard {
    repo_path: PathBuf,
    worktree_path: PathBuf,
}

impl Drop for WorktreeGuard {
    fn drop(&mut self) {
        let removed = Command::new("git")
            .args(["worktree", "remove", "--force"])
            .arg(&self.worktree_path)
            .current_dir(&self.repo_path)
            .output();
        match removed {
            Ok(output) if output.status.success() => {}
            _ => warn!(
                "failed to remove worktree at {}",
                self.worktree_path.display()
            ),
        }
    }
}

/// Build an in-memory graph for a git ref via a temporary worktree.
fn build_graph_for_ref(repo_path: &Path, ref_name: &str) -> Result<KnowledgeGraph, DiffError> {
    let tmp_dir = tempfile::Builder::new()
        .prefix("axon_diff_")
        .tempdir()
        .map_err(|err| DiffError::Worktree {
            ref_name: ref_name.to_string(),
            message: err.to_string(),
        })?;
    let worktree_path = tmp_dir.path().join("worktree");

    let created = Command::new("git")
        .args(["worktree", "add"])
        .arg(&worktree_path)
        .arg(ref_name)
        .current_dir(repo_path)
        .output()
        .map_err(|err| DiffError::Worktree {
            ref_name: ref_name.to_string(),
            message: err.to_string(),
        })?;
    if !created.status.success() {
        return Err(DiffError::Worktree {
            ref_name: ref_name.to_string(),
            message: String::from_utf8_lossy(&created.stderr).trim().to_string(),
        });
    }

    let _guard = WorktreeGuard {
        repo_path: repo_path.to_path_buf(),
        worktree_path: worktree_path.clone(),
    };

    build_graph(&worktree_path).map_err(|err| DiffError::Pipeline(err.to_string()))
}

/// Render a diff for terminal output.
pub fn format_diff(diff: &StructuralDiff) -> String {
    let total = diff.added_nodes.len()
        + diff.removed_nodes.len()
        + diff.modified_nodes.len()
        + diff.added_relationships.len()
        + diff.removed_relationships.len();

    if total == 0 {
        return "No structural differences found.".to_string();
    }

    let mut lines = vec![format!("Structural diff: {total} changes"), String::new()];

    let mut section = |title: String, body: Vec<String>, lines: &mut Vec<String>| {
        if !body.is_empty() {
            lines.push(title);
            lines.extend(body);
            lines.push(String::new());
        }
    };

    let mut added = diff.added_nodes.clone();
    added.sort_by(|a, b| a.id.cmp(&b.id));
    section(
        format!("Added nodes ({}):", added.len()),
        added
            .iter()
            .map(|n| format!("  + {} ({}) -- {}", n.name, n.label.as_str(), n.file_path))
            .collect(),
        &mut lines,
    );

    let mut removed = diff.removed_nodes.clone();
    removed.sort_by(|a, b| a.id.cmp(&b.id));
    section(
        format!("Removed nodes ({}):", removed.len()),
        removed
            .iter()
            .map(|n| format!("  - {} ({}) -- {}", n.name, n.label.as_str(), n.file_path))
            .collect(),
        &mut lines,
    );

    let mut modified = diff.modified_nodes.clone();
    modified.sort_by(|a, b| a.0.id.cmp(&b.0.id));
    section(
        format!("Modified nodes ({}):", modified.len()),
        modified
            .iter()
            .map(|(_, n)| format!("  ~ {} ({}) -- {}", n.name, n.label.as_str(), n.file_path))
            .collect(),
        &mut lines,
    );

    let mut added_rels = diff.added_relationships.clone();
    added_rels.sort_by(|a, b| a.id.cmp(&b.id));
    section(
        format!("Added relationships ({}):", added_rels.len()),
        added_rels
            .iter()
            .map(|r| format!("  + [{}] {} -> {}", r.rel_type.as_str(), r.source, r.target))
            .collect(),
        &mut lines,
    );

    let mut removed_rels = diff.removed_relationships.clone();
    removed_rels.sort_by(|a, b| a.id.cmp(&b.id));
    section(
        format!("Removed relationships ({}):", removed_rels.len()),
        removed_rels
            .iter()
            .map(|r| format!("  - [{}] {} -> {}", r.rel_type.as_str(), r.source, r.target))
            .collect(),
        &mut lines,
    );

    lines.join("\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::NodeLabel;

    fn node(path: &str, name: &str, content: &str) -> GraphNode {
        let mut node = GraphNode::new(NodeLabel::Function, path, name, name);
        node.content = content.to_string();
        node
    }

    #[test]
    fn added_removed_modified() {
        let mut base = KnowledgeGraph::new();
        base.add_node(node("src/a.py", "foo", "old"));
        base.add_node(node("src/c.py", "gone", "x"));

        let mut current = KnowledgeGraph::new();
        current.add_node(node("src/a.py", "foo", "new"));
        current.add_node(node("src/b.py", "bar", "y"));

        let diff = diff_graphs(&base, &current);

        assert_eq!(diff.added_nodes.len(), 1);
        assert_eq!(diff.added_nodes[0].name, "bar");
        assert_eq!(diff.removed_nodes.len(), 1);
        assert_eq!(diff.removed_nodes[0].name, "gone");
        assert_eq!(diff.modified_nodes.len(), 1);
        assert_eq!(diff.modified_nodes[0].1.name, "foo");
    }

    #[test]
    fn relationships_diff_by_id() {
        let mut base = KnowledgeGraph::new();
        base.add_node(node("src/a.py", "f", ""));
        base.add_node(node("src/a.py", "g", ""));
        base.add_relationship(GraphRelationship::new(
            "calls:function:src/a.py:f->function:src/a.py:g",
            axon_core::RelType::Calls,
            "function:src/a.py:f",
            "function:src/a.py:g",
        ));

        let mut current = KnowledgeGraph::new();
        current.add_node(node("src/a.py", "f", ""));
        current.add_node(node("src/a.py", "g", ""));

        let diff = diff_graphs(&base, &current);
        assert_eq!(diff.removed_relationships.len(), 1);
        assert!(diff.added_relationships.is_empty());
    }

    #[test]
    fn invalid_range_is_an_error() {
        let err = diff_branches(Path::new("."), "  ").unwrap_err();
        assert!(matches!(err, DiffError::InvalidRange(_)));
    }

    #[test]
    fn identical_graphs_format_as_no_changes() {
        let diff = diff_graphs(&KnowledgeGraph::new(), &KnowledgeGraph::new());
        assert_eq!(format_diff(&diff), "No structural differences found.");
    }
}
