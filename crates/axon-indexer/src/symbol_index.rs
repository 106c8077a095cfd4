//! Shared symbol lookup utilities for the resolver phases
//!
//! Provides the name→candidates index and a per-file interval index for
//! line-containment lookups (binary search plus a small window scan to
//! handle nested symbols).

use std::collections::BTreeMap;

use axon_core::{KnowledgeGraph, NodeLabel};

/// Map symbol names to candidate node ids over the given labels.
///
/// Multiple symbols can share a name across files, so each entry holds a
/// list. Candidate order is deterministic (graph iteration order).
pub fn build_name_index(
    graph: &KnowledgeGraph,
    labels: &[NodeLabel],
) -> BTreeMap<String, Vec<String>> {
    let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for label in labels {
        for node in graph.get_nodes_by_label(*label) {
            index
                .entry(node.name.clone())
                .or_default()
                .push(node.id.clone());
        }
    }
    index
}

#[derive(Debug, Clone)]
struct IntervalEntry {
    start: u32,
    end: u32,
    span: u32,
    node_id: String,
}

/// Per-file interval index: symbols sorted by start line for O(log n)
/// containment lookups.
#[derive(Debug, Default)]
pub struct FileSymbolIndex {
    entries: BTreeMap<String, Vec<IntervalEntry>>,
}

impl FileSymbolIndex {
    /// Build the index over all nodes with the given labels that carry
    /// line information.
    pub fn build(graph: &KnowledgeGraph, labels: &[NodeLabel]) -> Self {
        let mut entries: BTreeMap<String, Vec<IntervalEntry>> = BTreeMap::new();

        for label in labels {
            for node in graph.get_nodes_by_label(*label) {
                if node.file_path.is_empty() || node.start_line == 0 {
                    continue;
                }
                entries
                    .entry(node.file_path.clone())
                    .or_default()
                    .push(IntervalEntry {
                        start: node.start_line,
                        end: node.end_line,
                        span: node.end_line.saturating_sub(node.start_line),
                        node_id: node.id.clone(),
                    });
            }
        }

        for file_entries in entries.values_mut() {
            file_entries.sort_by_key(|e| e.start);
        }

        FileSymbolIndex { entries }
    }

    /// The most specific (smallest line span) symbol whose range contains
    /// `line` in `file_path`, or `None`.
    pub fn find_containing_symbol(&self, line: u32, file_path: &str) -> Option<&str> {
        let entries = self.entries.get(file_path)?;
        if entries.is_empty() {
            return None;
        }

        // Rightmost entry whose start_line <= line, then a small window
        // scan around it for nested/overlapping symbols.
        let idx = entries.partition_point(|e| e.start <= line);
        let search_start = idx.saturating_sub(10);
        let search_end = (idx + 5).min(entries.len());

        let mut best: Option<&IntervalEntry> = None;
        for entry in &entries[search_start..search_end] {
            if entry.start <= line && line <= entry.end {
                if best.map_or(true, |b| entry.span < b.span) {
                    best = Some(entry);
                }
            }
        }
        best.map(|e| e.node_id.as_str())
    }
}
