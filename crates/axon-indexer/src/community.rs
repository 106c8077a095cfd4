//! Community phase: cluster the call subgraph into functional groups
//!
//! Projects callable nodes and their `calls` edges into a dense petgraph
//! multigraph, runs the modularity optimiser, and writes Community nodes
//! plus `member_of` edges back into the knowledge graph.

use std::collections::BTreeMap;

use axon_core::{generate_id, GraphNode, GraphRelationship, KnowledgeGraph, NodeLabel, RelType};
use petgraph::graph::DiGraph;
use tracing::{debug, info};

use crate::config::{base_name, parent_dir};
use crate::leiden::detect_communities;

const CALLABLE_LABELS: [NodeLabel; 3] = [NodeLabel::Function, NodeLabel::Method, NodeLabel::Class];

/// Default minimum membership for a community to be kept.
pub const MIN_COMMUNITY_SIZE: usize = 2;

/// Project the callable subgraph into a dense directed multigraph.
///
/// Returns the projection plus the vertex-index → node-id mapping.
pub fn project_call_graph(graph: &KnowledgeGraph) -> (DiGraph<(), ()>, Vec<String>) {
    let mut projection: DiGraph<(), ()> = DiGraph::new();
    let mut index_of: BTreeMap<String, petgraph::graph::NodeIndex> = BTreeMap::new();
    let mut id_of: Vec<String> = Vec::new();

    for label in CALLABLE_LABELS {
        for node in graph.get_nodes_by_label(label) {
            let idx = projection.add_node(());
            index_of.insert(node.id.clone(), idx);
            id_of.push(node.id.clone());
        }
    }

    for rel in graph.get_relationships_by_type(RelType::Calls) {
        if let (Some(&src), Some(&tgt)) = (index_of.get(&rel.source), index_of.get(&rel.target)) {
            projection.add_edge(src, tgt, ());
        }
    }

    (projection, id_of)
}

/// Derive a human label from member file paths: the common parent
/// directory name when all members agree, the two most frequent joined
/// with `+` otherwise, `Cluster` when nothing is known. Equal counts
/// rank in first-seen member order.
pub fn generate_label(graph: &KnowledgeGraph, member_ids: &[String]) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for nid in member_ids {
        let Some(node) = graph.get_node(nid) else {
            continue;
        };
        if node.file_path.is_empty() {
            continue;
        }
        let dir = base_name(parent_dir(&node.file_path));
        if !dir.is_empty() {
            if !counts.contains_key(dir) {
                first_seen.push(dir.to_string());
            }
            *counts.entry(dir.to_string()).or_insert(0) += 1;
        }
    }

    if first_seen.is_empty() {
        return "Cluster".to_string();
    }

    // Stable sort by descending count only, so ties keep encounter order.
    let mut ranked: Vec<(&String, usize)> = first_seen
        .iter()
        .map(|dir| (dir, counts.get(dir).copied().unwrap_or(0)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    if ranked.len() == 1 {
        return capitalize(ranked[0].0);
    }
    capitalize(&format!("{}+{}", ranked[0].0, ranked[1].0))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Detect communities and add them to the graph. Returns the number of
/// Community nodes created.
///
/// A no-op when fewer than three callable nodes exist. Communities below
/// `min_community_size` are skipped (their index still advances, keeping
/// ids stable).
pub fn process_communities(graph: &mut KnowledgeGraph, min_community_size: usize) -> usize {
    let (projection, id_of) = project_call_graph(graph);

    if projection.node_count() < 3 {
        debug!(
            "call graph too small for community detection ({} nodes), skipping",
            projection.node_count()
        );
        return 0;
    }

    let edges: Vec<(usize, usize)> = projection
        .edge_indices()
        .filter_map(|e| projection.edge_endpoints(e))
        .map(|(a, b)| (a.index(), b.index()))
        .collect();

    let partition = detect_communities(projection.node_count(), &edges);

    let mut count = 0usize;
    for (i, members) in partition.communities().into_iter().enumerate() {
        if members.len() < min_community_size {
            continue;
        }

        let member_ids: Vec<String> = members.iter().map(|&idx| id_of[idx].clone()).collect();
        let community_id = generate_id(NodeLabel::Community, &format!("community_{i}"), "");
        let label = generate_label(graph, &member_ids);

        let mut community_node = GraphNode::new(
            NodeLabel::Community,
            &format!("community_{i}"),
            "",
            label.clone(),
        );
        community_node.file_path = String::new();
        community_node.set_prop("cohesion", partition.modularity);
        community_node.set_prop("symbol_count", member_ids.len());
        graph.add_node(community_node);

        for member_id in &member_ids {
            graph.add_relationship(GraphRelationship::new(
                format!("member_of:{member_id}->{community_id}"),
                RelType::MemberOf,
                member_id.clone(),
                community_id.clone(),
            ));
        }

        count += 1;
        info!(
            "community {i}: {:?} with {} members (modularity={:.3})",
            label,
            member_ids.len(),
            partition.modularity
        );
    }

    info!("community detection complete: {count} communities created");
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::GraphRelationship;

    fn callable(path: &str, name: &str) -> GraphNode {
        GraphNode::new(NodeLabel::Function, path, name, name)
    }

    fn call_edge(src: &str, tgt: &str) -> GraphRelationship {
        GraphRelationship::new(
            format!("calls:{src}->{tgt}"),
            RelType::Calls,
            src,
            tgt,
        )
        .with_prop("confidence", 1.0)
    }

    fn id(path: &str, name: &str) -> String {
        generate_id(NodeLabel::Function, path, name)
    }

    #[test]
    fn two_clusters_from_triangles() {
        let mut graph = KnowledgeGraph::new();
        let auth = ["validate", "hash_password", "check_token"];
        let data = ["query_db", "format_result", "cache_result"];
        for name in auth {
            graph.add_node(callable("src/auth/core.py", name));
        }
        for name in data {
            graph.add_node(callable("src/data/core.py", name));
        }

        for (a, b) in [(0, 1), (1, 2), (2, 0)] {
            graph.add_relationship(call_edge(
                &id("src/auth/core.py", auth[a]),
                &id("src/auth/core.py", auth[b]),
            ));
            graph.add_relationship(call_edge(
                &id("src/data/core.py", data[a]),
                &id("src/data/core.py", data[b]),
            ));
        }
        graph.add_relationship(call_edge(
            &id("src/auth/core.py", "validate"),
            &id("src/data/core.py", "query_db"),
        ));

        let created = process_communities(&mut graph, MIN_COMMUNITY_SIZE);
        assert!(created >= 1);

        // Every community's symbol_count matches its member_of edges.
        for community in graph.get_nodes_by_label(NodeLabel::Community) {
            let members = graph.get_incoming(&community.id, Some(RelType::MemberOf));
            assert_eq!(members.len() as i64, community.prop_i64("symbol_count"));
            assert!(community.prop_i64("symbol_count") >= 2);
        }

        // Labels derive from member directories.
        let labels: Vec<String> = graph
            .get_nodes_by_label(NodeLabel::Community)
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert!(labels.iter().any(|l| l.contains("Auth") || l.contains("auth")));
    }

    #[test]
    fn fewer_than_three_callables_is_a_noop() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node(callable("src/a.py", "one"));
        graph.add_node(callable("src/a.py", "two"));

        assert_eq!(process_communities(&mut graph, MIN_COMMUNITY_SIZE), 0);
        assert_eq!(graph.count_nodes_by_label(NodeLabel::Community), 0);
    }

    #[test]
    fn label_falls_back_to_cluster() {
        let graph = KnowledgeGraph::new();
        assert_eq!(generate_label(&graph, &[]), "Cluster");
    }

    #[test]
    fn label_ties_keep_first_seen_directory_order() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node(callable("src/zeta/a.py", "a"));
        graph.add_node(callable("src/alpha/b.py", "b"));

        // Even split between two directories: the one seen first among
        // the members leads the label, not the alphabetically smaller.
        let members = vec![
            generate_id(NodeLabel::Function, "src/zeta/a.py", "a"),
            generate_id(NodeLabel::Function, "src/alpha/b.py", "b"),
        ];
        assert_eq!(generate_label(&graph, &members), "Zeta+alpha");
    }
}
