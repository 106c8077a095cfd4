//! Heritage phase: EXTENDS / IMPLEMENTS edges
//!
//! Resolves each `(child, kind, parent)` tuple over class and interface
//! nodes, preferring same-file matches. An unresolved parent whose name
//! is a protocol marker annotates the child instead of producing an
//! edge; dead-code analysis consumes that annotation.

use std::collections::BTreeMap;

use axon_core::{GraphRelationship, KnowledgeGraph, NodeLabel, RelType};
use tracing::{debug, warn};

use crate::parsing::FileParseData;
use crate::symbol_index::build_name_index;

const HERITAGE_LABELS: [NodeLabel; 2] = [NodeLabel::Class, NodeLabel::Interface];

/// Parent names that mark a class as a structural protocol / abstract
/// base. Part of the behavioural contract of dead-code detection.
pub const PROTOCOL_MARKERS: [&str; 3] = ["Protocol", "ABC", "ABCMeta"];

/// Resolve a symbol name, preferring candidates defined in `file_path`,
/// falling back to the first global candidate.
fn resolve_node(
    name: &str,
    file_path: &str,
    index: &BTreeMap<String, Vec<String>>,
    graph: &KnowledgeGraph,
) -> Option<String> {
    let candidates = index.get(name)?;
    if candidates.is_empty() {
        return None;
    }

    for nid in candidates {
        if let Some(node) = graph.get_node(nid) {
            if node.file_path == file_path {
                return Some(nid.clone());
            }
        }
    }
    Some(candidates[0].clone())
}

/// Create EXTENDS and IMPLEMENTS relationships from heritage tuples.
pub fn process_heritage(parse_data: &[FileParseData], graph: &mut KnowledgeGraph) {
    let symbol_index = build_name_index(graph, &HERITAGE_LABELS);

    for fpd in parse_data {
        for heritage in &fpd.parse_result.heritage {
            let rel_type = match heritage.kind.as_str() {
                "extends" => RelType::Extends,
                "implements" => RelType::Implements,
                other => {
                    warn!(
                        "unknown heritage kind {:?} for {} in {}, skipping",
                        other, heritage.child, fpd.file_path
                    );
                    continue;
                }
            };

            let child_id = resolve_node(&heritage.child, &fpd.file_path, &symbol_index, graph);
            let parent_id = resolve_node(&heritage.parent, &fpd.file_path, &symbol_index, graph);

            let Some(child_id) = child_id else {
                debug!(
                    "skipping heritage {} {} {} in {}: unresolved child",
                    heritage.child, heritage.kind, heritage.parent, fpd.file_path
                );
                continue;
            };

            let Some(parent_id) = parent_id else {
                // External parent. Protocol markers annotate the child so
                // structural subtyping can be honoured later.
                if PROTOCOL_MARKERS.contains(&heritage.parent.as_str()) {
                    if let Some(child_node) = graph.get_node_mut(&child_id) {
                        child_node.set_prop("is_protocol", true);
                        debug!(
                            "annotated {} as protocol in {} (parent: {})",
                            heritage.child, fpd.file_path, heritage.parent
                        );
                    }
                } else {
                    debug!(
                        "skipping heritage {} {} {} in {}: unresolved parent",
                        heritage.child, heritage.kind, heritage.parent, fpd.file_path
                    );
                }
                continue;
            };

            graph.add_relationship(GraphRelationship::new(
                format!("{}:{child_id}->{parent_id}", heritage.kind),
                rel_type,
                child_id,
                parent_id,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::process_parsing;
    use crate::structure::process_structure;
    use crate::walker::FileEntry;

    fn build(path: &str, content: &str) -> KnowledgeGraph {
        let files = vec![FileEntry {
            path: path.to_string(),
            content: content.to_string(),
            language: "python".to_string(),
        }];
        let mut graph = KnowledgeGraph::new();
        process_structure(&files, &mut graph);
        let parse_data = process_parsing(&files, &mut graph);
        process_heritage(&parse_data, &mut graph);
        graph
    }

    #[test]
    fn extends_edge_between_resolved_classes() {
        let graph = build(
            "src/backends.py",
            "class Base:\n    pass\n\nclass KuzuBackend(Base):\n    pass\n",
        );
        assert!(graph
            .get_relationship(
                "extends:class:src/backends.py:KuzuBackend->class:src/backends.py:Base"
            )
            .is_some());
    }

    #[test]
    fn protocol_marker_annotates_child() {
        let graph = build(
            "src/backends.py",
            "class Backend(Protocol):\n    def close(self):\n        ...\n",
        );
        let backend = graph.get_node("class:src/backends.py:Backend").unwrap();
        assert!(backend.prop_bool("is_protocol"));
        assert_eq!(graph.get_relationships_by_type(RelType::Extends).len(), 0);
    }

    #[test]
    fn unresolved_external_parent_is_skipped() {
        let graph = build(
            "src/models.py",
            "class User(BaseModel):\n    pass\n",
        );
        assert_eq!(graph.get_relationships_by_type(RelType::Extends).len(), 0);
        let user = graph.get_node("class:src/models.py:User").unwrap();
        assert!(!user.prop_bool("is_protocol"));
    }
}
