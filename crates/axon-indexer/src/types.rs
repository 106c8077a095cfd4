//! Type analysis phase: USES_TYPE edges
//!
//! Resolves type annotation references to Class, Interface, or TypeAlias
//! nodes and links them from the containing function/method with a
//! `role` property (`param`, `return`, `variable`).

use std::collections::{BTreeMap, BTreeSet};

use axon_core::{GraphRelationship, KnowledgeGraph, NodeLabel, RelType};
use tracing::debug;

use crate::parsing::FileParseData;
use crate::symbol_index::{build_name_index, FileSymbolIndex};

const TYPE_LABELS: [NodeLabel; 3] = [NodeLabel::Class, NodeLabel::Interface, NodeLabel::TypeAlias];
const CONTAINER_LABELS: [NodeLabel; 2] = [NodeLabel::Function, NodeLabel::Method];

/// Same-file match first, then the first global candidate.
fn resolve_type(
    type_name: &str,
    file_path: &str,
    type_index: &BTreeMap<String, Vec<String>>,
    graph: &KnowledgeGraph,
) -> Option<String> {
    let candidates = type_index.get(type_name)?;
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

/// Resolve type references and create USES_TYPE relationships.
///
/// References outside any function/method, or naming unresolvable
/// (built-in or external) types, are skipped. Edges are deduplicated per
/// `(source, target, role)`.
pub fn process_types(parse_data: &[FileParseData], graph: &mut KnowledgeGraph) {
    let type_index = build_name_index(graph, &TYPE_LABELS);
    let container_index = FileSymbolIndex::build(graph, &CONTAINER_LABELS);
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for fpd in parse_data {
        for type_ref in &fpd.parse_result.type_refs {
            let source_id =
                match container_index.find_containing_symbol(type_ref.line, &fpd.file_path) {
                    Some(id) => id.to_string(),
                    None => {
                        debug!(
                            "no containing symbol for type ref {} at line {} in {}",
                            type_ref.name, type_ref.line, fpd.file_path
                        );
                        continue;
                    }
                };

            let Some(target_id) = resolve_type(&type_ref.name, &fpd.file_path, &type_index, graph)
            else {
                continue;
            };

            let role = &type_ref.kind;
            let rel_id = format!("uses_type:{source_id}->{target_id}:{role}");
            if !seen.insert(rel_id.clone()) {
                continue;
            }

            graph.add_relationship(
                GraphRelationship::new(rel_id, RelType::UsesType, source_id, target_id)
                    .with_prop("role", role.as_str()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::process_parsing;
    use crate::structure::process_structure;
    use crate::walker::FileEntry;

    fn build(content: &str) -> KnowledgeGraph {
        let files = vec![FileEntry {
            path: "src/svc.py".to_string(),
            content: content.to_string(),
            language: "python".to_string(),
        }];
        let mut graph = KnowledgeGraph::new();
        process_structure(&files, &mut graph);
        let parse_data = process_parsing(&files, &mut graph);
        process_types(&parse_data, &mut graph);
        graph
    }

    #[test]
    fn param_and_return_roles() {
        let graph = build(
            "class User:\n    pass\n\ndef save(user: User) -> User:\n    return user\n",
        );

        let param_edge = graph.get_relationship(
            "uses_type:function:src/svc.py:save->class:src/svc.py:User:param",
        );
        assert!(param_edge.is_some());
        assert_eq!(param_edge.unwrap().prop_str("role"), "param");

        assert!(graph
            .get_relationship("uses_type:function:src/svc.py:save->class:src/svc.py:User:return")
            .is_some());
    }

    #[test]
    fn same_role_same_site_deduplicates() {
        let graph = build(
            "class User:\n    pass\n\ndef merge(a: User, b: User):\n    return a\n",
        );
        let edges = graph.get_relationships_by_type(RelType::UsesType);
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn module_level_annotations_are_skipped() {
        let graph = build("class User:\n    pass\n\ncurrent: User = User()\n");
        assert_eq!(graph.get_relationships_by_type(RelType::UsesType).len(), 0);
    }
}
