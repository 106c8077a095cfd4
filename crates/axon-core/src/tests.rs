//! Unit tests for the axon-core graph and search

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use crate::graph::KnowledgeGraph;
use crate::model::{generate_id, GraphNode, GraphRelationship, NodeLabel, RelType};
use crate::search::{hybrid_search, DEFAULT_RRF_K};
use crate::storage::{NodeEmbedding, SearchResult, StorageBackend, TraversalDirection};

fn function_node(path: &str, name: &str) -> GraphNode {
    GraphNode::new(NodeLabel::Function, path, name, name)
}

fn calls(source: &str, target: &str) -> GraphRelationship {
    GraphRelationship::new(
        format!("calls:{source}->{target}"),
        RelType::Calls,
        source,
        target,
    )
}

#[test]
fn add_node_replaces_existing_id() {
    let mut graph = KnowledgeGraph::new();
    graph.add_node(function_node("src/a.py", "run"));
    let mut replacement = function_node("src/a.py", "run");
    replacement.content = "def run(): pass".to_string();
    graph.add_node(replacement);

    assert_eq!(graph.node_count(), 1);
    let node = graph.get_node("function:src/a.py:run").unwrap();
    assert_eq!(node.content, "def run(): pass");
}

#[test]
fn label_change_updates_label_index() {
    let mut graph = KnowledgeGraph::new();
    let id = generate_id(NodeLabel::Function, "src/a.py", "Thing");
    graph.add_node(function_node("src/a.py", "Thing"));

    let mut as_class = GraphNode::new(NodeLabel::Class, "src/a.py", "Thing", "Thing");
    as_class.id = id.clone();
    graph.add_node(as_class);

    assert_eq!(graph.count_nodes_by_label(NodeLabel::Function), 0);
    assert_eq!(graph.count_nodes_by_label(NodeLabel::Class), 1);
}

#[test]
fn remove_node_cascades_relationships() {
    let mut graph = KnowledgeGraph::new();
    graph.add_node(function_node("src/a.py", "caller"));
    graph.add_node(function_node("src/a.py", "callee"));
    graph.add_relationship(calls(
        "function:src/a.py:caller",
        "function:src/a.py:callee",
    ));
    assert_eq!(graph.relationship_count(), 1);

    assert!(graph.remove_node("function:src/a.py:callee"));
    assert_eq!(graph.relationship_count(), 0);
    assert!(graph
        .get_outgoing("function:src/a.py:caller", None)
        .is_empty());
}

#[test]
fn remove_nodes_by_file_returns_count() {
    let mut graph = KnowledgeGraph::new();
    graph.add_node(function_node("src/a.py", "one"));
    graph.add_node(function_node("src/a.py", "two"));
    graph.add_node(function_node("src/b.py", "three"));

    assert_eq!(graph.remove_nodes_by_file("src/a.py"), 2);
    assert_eq!(graph.node_count(), 1);
}

#[test]
fn relationship_replace_is_idempotent() {
    let mut graph = KnowledgeGraph::new();
    graph.add_node(function_node("src/a.py", "f"));
    graph.add_node(function_node("src/a.py", "g"));

    let rel = calls("function:src/a.py:f", "function:src/a.py:g");
    graph.add_relationship(rel.clone());
    graph.add_relationship(rel.with_prop("confidence", 0.5));

    assert_eq!(graph.relationship_count(), 1);
    let stored = graph
        .get_relationship("calls:function:src/a.py:f->function:src/a.py:g")
        .unwrap();
    assert_eq!(stored.prop_f64("confidence"), 0.5);
}

#[test]
fn has_incoming_checks_type() {
    let mut graph = KnowledgeGraph::new();
    graph.add_node(function_node("src/a.py", "f"));
    graph.add_node(function_node("src/a.py", "g"));
    graph.add_relationship(calls("function:src/a.py:f", "function:src/a.py:g"));

    assert!(graph.has_incoming("function:src/a.py:g", RelType::Calls));
    assert!(!graph.has_incoming("function:src/a.py:g", RelType::UsesType));
    assert!(!graph.has_incoming("function:src/a.py:f", RelType::Calls));
}

/// Storage stub returning canned rankings, for exercising RRF fusion.
#[derive(Default)]
struct StubStorage {
    fts: Vec<SearchResult>,
    vector: Vec<SearchResult>,
    fuzzy: Vec<SearchResult>,
}

fn result(node_id: &str) -> SearchResult {
    SearchResult {
        node_id: node_id.to_string(),
        score: 1.0,
        ..SearchResult::default()
    }
}

impl StorageBackend for StubStorage {
    fn initialize(&mut self, _path: &Path, _read_only: bool) -> Result<()> {
        Ok(())
    }
    fn close(&mut self) {}
    fn add_nodes(&mut self, _nodes: &[GraphNode]) -> Result<()> {
        Ok(())
    }
    fn add_relationships(&mut self, _rels: &[GraphRelationship]) -> Result<()> {
        Ok(())
    }
    fn remove_nodes_by_file(&mut self, _file_path: &str) -> Result<usize> {
        Ok(0)
    }
    fn get_node(&self, _node_id: &str) -> Option<GraphNode> {
        None
    }
    fn get_callers(&self, _node_id: &str) -> Vec<GraphNode> {
        Vec::new()
    }
    fn get_callees(&self, _node_id: &str) -> Vec<GraphNode> {
        Vec::new()
    }
    fn get_type_refs(&self, _node_id: &str) -> Vec<GraphNode> {
        Vec::new()
    }
    fn traverse(
        &self,
        _start_id: &str,
        _depth: usize,
        _direction: TraversalDirection,
    ) -> Vec<GraphNode> {
        Vec::new()
    }
    fn execute_raw(&self, _query: &str) -> Result<Vec<Vec<serde_json::Value>>> {
        Ok(Vec::new())
    }
    fn fts_search(&self, _query: &str, _limit: usize) -> Vec<SearchResult> {
        self.fts.clone()
    }
    fn exact_name_search(&self, _name: &str, _limit: usize) -> Vec<SearchResult> {
        Vec::new()
    }
    fn fuzzy_search(&self, _query: &str, _limit: usize, _max_distance: usize) -> Vec<SearchResult> {
        self.fuzzy.clone()
    }
    fn vector_search(&self, _vector: &[f32], _limit: usize) -> Vec<SearchResult> {
        self.vector.clone()
    }
    fn store_embeddings(&mut self, _embeddings: &[NodeEmbedding]) -> Result<()> {
        Ok(())
    }
    fn get_indexed_files(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
    fn bulk_load(&mut self, _graph: &KnowledgeGraph) -> Result<()> {
        Ok(())
    }
    fn rebuild_fts_indexes(&mut self) -> Result<()> {
        Ok(())
    }
}

#[test]
fn rrf_fuses_both_rankings() {
    let storage = StubStorage {
        fts: vec![result("a"), result("b"), result("c")],
        vector: vec![result("b"), result("d"), result("a")],
        ..StubStorage::default()
    };
    let embedding = vec![0.0f32; 4];

    let merged = hybrid_search(
        "query",
        &storage,
        Some(&embedding),
        10,
        1.0,
        1.0,
        DEFAULT_RRF_K,
    );

    let ids: Vec<&str> = merged.iter().map(|r| r.node_id.as_str()).collect();
    assert_eq!(&ids[..2], &["a", "b"]);

    let score_of = |id: &str| {
        merged
            .iter()
            .find(|r| r.node_id == id)
            .map(|r| r.score)
            .unwrap()
    };
    let expected_a = 1.0 / 61.0 + 1.0 / 63.0;
    let expected_b = 1.0 / 62.0 + 1.0 / 61.0;
    assert!((score_of("a") - expected_a).abs() < 1e-6);
    assert!((score_of("b") - expected_b).abs() < 1e-6);
    assert!((score_of("c") - 1.0 / 63.0).abs() < 1e-6);
    assert!((score_of("d") - 1.0 / 62.0).abs() < 1e-6);
}

#[test]
fn rrf_sorted_descending_no_duplicates_capped() {
    let storage = StubStorage {
        fts: vec![result("a"), result("a"), result("b"), result("c")],
        vector: vec![result("c"), result("d")],
        ..StubStorage::default()
    };
    let embedding = vec![0.0f32; 4];

    let merged = hybrid_search("q", &storage, Some(&embedding), 3, 1.0, 1.0, DEFAULT_RRF_K);

    assert!(merged.len() <= 3);
    let mut ids: Vec<&str> = merged.iter().map(|r| r.node_id.as_str()).collect();
    let before = ids.len();
    ids.dedup();
    assert_eq!(before, ids.len());
    assert!(merged.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn fuzzy_fallback_when_lexical_is_empty() {
    let storage = StubStorage {
        fuzzy: vec![result("near_miss")],
        ..StubStorage::default()
    };

    let merged = hybrid_search("qurey", &storage, None, 5, 1.0, 1.0, DEFAULT_RRF_K);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].node_id, "near_miss");
}

#[test]
fn zero_limit_returns_nothing() {
    let storage = StubStorage::default();
    assert!(hybrid_search("q", &storage, None, 0, 1.0, 1.0, DEFAULT_RRF_K).is_empty());
}
