//! Embedded graph store
//!
//! Persists the knowledge graph as JSON tables grouped by node label,
//! with a relationships table and an embeddings table alongside a
//! tantivy full-text index. All tables are mirrored in memory behind
//! id-keyed maps and adjacency indexes, so lookups and traversals are
//! O(result). A bulk load replaces the store wholesale; row-level
//! failures are logged and dropped rather than failing a batch.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use axon_core::{
    label_of_id, GraphNode, GraphRelationship, KnowledgeGraph, NodeEmbedding, NodeLabel, RelType,
    SearchResult, StorageBackend, TraversalDirection,
};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::fts::{FtsDocument, FtsIndex};
use crate::query::run_query;

const RELATIONSHIPS_FILE: &str = "relationships.json";
const EMBEDDINGS_FILE: &str = "embeddings.json";
const FTS_DIR: &str = "fts";

/// Labels surfaced by text search. Folder, community, and process nodes
/// are structural and never returned.
const SEARCHABLE_LABELS: [NodeLabel; 7] = [
    NodeLabel::File,
    NodeLabel::Function,
    NodeLabel::Class,
    NodeLabel::Method,
    NodeLabel::Interface,
    NodeLabel::TypeAlias,
    NodeLabel::Enum,
];

/// Embedded storage backend keeping JSON tables on disk and indexes in
/// memory.
#[derive(Default)]
pub struct GraphStore {
    dir: Option<PathBuf>,
    read_only: bool,
    nodes: BTreeMap<String, GraphNode>,
    relationships: BTreeMap<String, GraphRelationship>,
    outgoing: BTreeMap<String, BTreeSet<String>>,
    incoming: BTreeMap<String, BTreeSet<String>>,
    embeddings: BTreeMap<String, Vec<f32>>,
    fts: Option<FtsIndex>,
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore::default()
    }

    fn dir(&self) -> Result<&Path> {
        self.dir
            .as_deref()
            .context("store is not initialized; call initialize() first")
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            bail!("store was opened read-only");
        }
        Ok(())
    }

    fn node_table_path(dir: &Path, label: NodeLabel) -> PathBuf {
        dir.join(format!("nodes_{}.json", label.as_str()))
    }

    fn load_tables(&mut self) -> Result<()> {
        let dir = self.dir()?.to_path_buf();

        for label in NodeLabel::ALL {
            let path = Self::node_table_path(&dir, label);
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<Vec<GraphNode>>(&text) {
                Ok(nodes) => {
                    for node in nodes {
                        self.nodes.insert(node.id.clone(), node);
                    }
                }
                Err(err) => debug!("skipping unreadable node table {}: {err}", path.display()),
            }
        }

        let rel_path = dir.join(RELATIONSHIPS_FILE);
        if let Ok(text) = std::fs::read_to_string(&rel_path) {
            match serde_json::from_str::<Vec<GraphRelationship>>(&text) {
                Ok(rels) => {
                    for rel in rels {
                        self.index_relationship(&rel);
                        self.relationships.insert(rel.id.clone(), rel);
                    }
                }
                Err(err) => debug!("skipping unreadable relationships table: {err}"),
            }
        }

        let emb_path = dir.join(EMBEDDINGS_FILE);
        if let Ok(text) = std::fs::read_to_string(&emb_path) {
            match serde_json::from_str::<Vec<NodeEmbedding>>(&text) {
                Ok(embeddings) => {
                    for embedding in embeddings {
                        self.embeddings.insert(embedding.node_id.clone(), embedding.vector);
                    }
                }
                Err(err) => debug!("skipping unreadable embeddings table: {err}"),
            }
        }

        Ok(())
    }

    fn index_relationship(&mut self, rel: &GraphRelationship) {
        self.outgoing
            .entry(rel.source.clone())
            .or_default()
            .insert(rel.id.clone());
        self.incoming
            .entry(rel.target.clone())
            .or_default()
            .insert(rel.id.clone());
    }

    fn unindex_relationship(&mut self, rel: &GraphRelationship) {
        if let Some(ids) = self.outgoing.get_mut(&rel.source) {
            ids.remove(&rel.id);
        }
        if let Some(ids) = self.incoming.get_mut(&rel.target) {
            ids.remove(&rel.id);
        }
    }

    /// Rewrite every table. Nodes are grouped by label, one file per
    /// label.
    fn persist(&self) -> Result<()> {
        self.ensure_writable()?;
        let dir = self.dir()?;

        let mut by_label: BTreeMap<NodeLabel, Vec<&GraphNode>> = BTreeMap::new();
        for node in self.nodes.values() {
            by_label.entry(node.label).or_default().push(node);
        }
        for label in NodeLabel::ALL {
            let rows = by_label.get(&label).cloned().unwrap_or_default();
            let path = Self::node_table_path(dir, label);
            std::fs::write(&path, serde_json::to_string(&rows)?)
                .with_context(|| format!("writing node table {}", path.display()))?;
        }

        let rels: Vec<&GraphRelationship> = self.relationships.values().collect();
        std::fs::write(dir.join(RELATIONSHIPS_FILE), serde_json::to_string(&rels)?)?;

        let embeddings: Vec<NodeEmbedding> = self
            .embeddings
            .iter()
            .map(|(node_id, vector)| NodeEmbedding {
                node_id: node_id.clone(),
                vector: vector.clone(),
            })
            .collect();
        std::fs::write(dir.join(EMBEDDINGS_FILE), serde_json::to_string(&embeddings)?)?;

        Ok(())
    }

    fn neighbors(&self, node_id: &str, direction: TraversalDirection) -> Vec<GraphNode> {
        let index = match direction {
            TraversalDirection::Callers => &self.incoming,
            TraversalDirection::Callees => &self.outgoing,
        };
        let Some(rel_ids) = index.get(node_id) else {
            return Vec::new();
        };
        rel_ids
            .iter()
            .filter_map(|id| self.relationships.get(id))
            .filter(|rel| rel.rel_type == RelType::Calls)
            .filter_map(|rel| match direction {
                TraversalDirection::Callers => self.nodes.get(&rel.source),
                TraversalDirection::Callees => self.nodes.get(&rel.target),
            })
            .cloned()
            .collect()
    }

    fn search_result_for(&self, node: &GraphNode, score: f32) -> SearchResult {
        let snippet = if node.content.is_empty() {
            node.signature.chars().take(200).collect()
        } else {
            node.content.chars().take(200).collect()
        };
        SearchResult {
            node_id: node.id.clone(),
            score,
            node_name: node.name.clone(),
            file_path: node.file_path.clone(),
            label: node.label.as_str().to_string(),
            snippet,
        }
    }

    fn is_test_path(file_path: &str) -> bool {
        file_path.contains("/tests/") || file_path.contains("/test_")
    }
}

impl StorageBackend for GraphStore {
    /// Open or create the store at `path`. In read-only mode nothing is
    /// created on disk and mutating calls fail.
    fn initialize(&mut self, path: &Path, read_only: bool) -> Result<()> {
        self.dir = Some(path.to_path_buf());
        self.read_only = read_only;

        if !read_only {
            std::fs::create_dir_all(path)
                .with_context(|| format!("creating store directory {}", path.display()))?;
        }

        self.load_tables()?;

        let fts_dir = path.join(FTS_DIR);
        if !read_only || fts_dir.exists() {
            self.fts = Some(FtsIndex::open_or_create(&fts_dir)?);
        }

        Ok(())
    }

    fn close(&mut self) {
        self.fts = None;
        self.dir = None;
        self.nodes.clear();
        self.relationships.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.embeddings.clear();
    }

    fn add_nodes(&mut self, nodes: &[GraphNode]) -> Result<()> {
        self.ensure_writable()?;
        for node in nodes {
            self.nodes.insert(node.id.clone(), node.clone());
        }
        self.persist()
    }

    fn add_relationships(&mut self, rels: &[GraphRelationship]) -> Result<()> {
        self.ensure_writable()?;
        for rel in rels {
            if let Some(old) = self.relationships.remove(&rel.id) {
                self.unindex_relationship(&old);
            }
            self.index_relationship(rel);
            self.relationships.insert(rel.id.clone(), rel.clone());
        }
        self.persist()
    }

    fn remove_nodes_by_file(&mut self, file_path: &str) -> Result<usize> {
        self.ensure_writable()?;

        let node_ids: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.file_path == file_path)
            .map(|n| n.id.clone())
            .collect();

        for node_id in &node_ids {
            self.nodes.remove(node_id);
            self.embeddings.remove(node_id);

            let mut incident: BTreeSet<String> = BTreeSet::new();
            if let Some(ids) = self.outgoing.remove(node_id) {
                incident.extend(ids);
            }
            if let Some(ids) = self.incoming.remove(node_id) {
                incident.extend(ids);
            }
            for rel_id in incident {
                if let Some(rel) = self.relationships.remove(&rel_id) {
                    self.unindex_relationship(&rel);
                }
            }
        }

        self.persist()?;
        Ok(node_ids.len())
    }

    fn get_node(&self, node_id: &str) -> Option<GraphNode> {
        self.nodes.get(node_id).cloned()
    }

    fn get_callers(&self, node_id: &str) -> Vec<GraphNode> {
        self.neighbors(node_id, TraversalDirection::Callers)
    }

    fn get_callees(&self, node_id: &str) -> Vec<GraphNode> {
        self.neighbors(node_id, TraversalDirection::Callees)
    }

    fn get_type_refs(&self, node_id: &str) -> Vec<GraphNode> {
        let Some(rel_ids) = self.outgoing.get(node_id) else {
            return Vec::new();
        };
        rel_ids
            .iter()
            .filter_map(|id| self.relationships.get(id))
            .filter(|rel| rel.rel_type == RelType::UsesType)
            .filter_map(|rel| self.nodes.get(&rel.target))
            .cloned()
            .collect()
    }

    fn traverse(
        &self,
        start_id: &str,
        depth: usize,
        direction: TraversalDirection,
    ) -> Vec<GraphNode> {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut result: Vec<GraphNode> = Vec::new();
        let mut queue: std::collections::VecDeque<(String, usize)> = std::collections::VecDeque::new();
        queue.push_back((start_id.to_string(), 0));

        while let Some((current_id, current_depth)) = queue.pop_front() {
            if !visited.insert(current_id.clone()) {
                continue;
            }
            if current_id != start_id {
                if let Some(node) = self.nodes.get(&current_id) {
                    result.push(node.clone());
                }
            }
            if current_depth < depth {
                for neighbor in self.neighbors(&current_id, direction) {
                    if !visited.contains(&neighbor.id) {
                        queue.push_back((neighbor.id, current_depth + 1));
                    }
                }
            }
        }

        result
    }

    fn execute_raw(&self, query: &str) -> Result<Vec<Vec<serde_json::Value>>> {
        let nodes: Vec<&GraphNode> = self.nodes.values().collect();
        run_query(query, &nodes)
    }

    /// BM25 over name/content/signature, with a ×0.5 penalty for test
    /// files and a ×1.2 boost for top-level definitions in source files.
    fn fts_search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let Some(fts) = &self.fts else {
            return Vec::new();
        };
        let hits = match fts.search(query, limit.max(1) * 3) {
            Ok(hits) => hits,
            Err(err) => {
                debug!("fts search failed: {err}");
                return Vec::new();
            }
        };

        let mut candidates: Vec<SearchResult> = Vec::new();
        for hit in hits {
            let Some(node) = self.nodes.get(&hit.node_id) else {
                continue;
            };
            let mut score = hit.score;
            if Self::is_test_path(&node.file_path) {
                score *= 0.5;
            }
            if matches!(node.label, NodeLabel::Function | NodeLabel::Class)
                && !node.file_path.contains("/tests/")
            {
                score *= 1.2;
            }
            candidates.push(self.search_result_for(node, score));
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        candidates.truncate(limit);
        candidates
    }

    /// Exact name match across searchable labels; source files rank
    /// above test files.
    fn exact_name_search(&self, name: &str, limit: usize) -> Vec<SearchResult> {
        let mut candidates: Vec<SearchResult> = self
            .nodes
            .values()
            .filter(|n| SEARCHABLE_LABELS.contains(&n.label) && n.name == name)
            .map(|n| {
                let score = if n.file_path.contains("/tests/") { 1.0 } else { 2.0 };
                self.search_result_for(n, score)
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        candidates.truncate(limit);
        candidates
    }

    /// Levenshtein name search: score 1.0 at distance 0, floored at 0.3.
    fn fuzzy_search(&self, query: &str, limit: usize, max_distance: usize) -> Vec<SearchResult> {
        let needle = query.to_lowercase();
        let mut candidates: Vec<SearchResult> = Vec::new();

        for node in self.nodes.values() {
            if !SEARCHABLE_LABELS.contains(&node.label) {
                continue;
            }
            let distance = strsim::levenshtein(&node.name.to_lowercase(), &needle);
            if distance > max_distance {
                continue;
            }
            let score = (1.0 - 0.3 * distance as f32).max(0.3);
            candidates.push(self.search_result_for(node, score));
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        candidates.truncate(limit);
        candidates
    }

    /// Cosine similarity against stored per-node embedding vectors.
    fn vector_search(&self, vector: &[f32], limit: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(f32, &String)> = self
            .embeddings
            .iter()
            .filter_map(|(node_id, stored)| {
                cosine_similarity(vector, stored).map(|sim| (sim, node_id))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, node_id)| match self.nodes.get(node_id) {
                Some(node) => self.search_result_for(node, score),
                None => SearchResult {
                    node_id: node_id.clone(),
                    score,
                    label: label_of_id(node_id)
                        .map(|l| l.as_str().to_string())
                        .unwrap_or_default(),
                    ..SearchResult::default()
                },
            })
            .collect()
    }

    fn store_embeddings(&mut self, embeddings: &[NodeEmbedding]) -> Result<()> {
        self.ensure_writable()?;
        for embedding in embeddings {
            self.embeddings
                .insert(embedding.node_id.clone(), embedding.vector.clone());
        }
        self.persist()
    }

    fn get_indexed_files(&self) -> BTreeMap<String, String> {
        self.nodes
            .values()
            .filter(|n| n.label == NodeLabel::File)
            .map(|n| {
                let mut hasher = Sha256::new();
                hasher.update(n.content.as_bytes());
                (n.file_path.clone(), format!("{:x}", hasher.finalize()))
            })
            .collect()
    }

    /// Replace the entire store: clear every table, write nodes grouped
    /// by label, then relationships, then rebuild the text index.
    fn bulk_load(&mut self, graph: &KnowledgeGraph) -> Result<()> {
        self.ensure_writable()?;

        self.nodes.clear();
        self.relationships.clear();
        self.outgoing.clear();
        self.incoming.clear();

        for node in graph.iter_nodes() {
            self.nodes.insert(node.id.clone(), node.clone());
        }
        for rel in graph.iter_relationships() {
            self.index_relationship(rel);
            self.relationships.insert(rel.id.clone(), rel.clone());
        }

        self.persist()?;
        self.rebuild_fts_indexes()
    }

    fn rebuild_fts_indexes(&mut self) -> Result<()> {
        self.ensure_writable()?;
        let Some(fts) = self.fts.as_mut() else {
            return Ok(());
        };

        let documents = self
            .nodes
            .values()
            .filter(|n| SEARCHABLE_LABELS.contains(&n.label))
            .map(|n| FtsDocument {
                node_id: &n.id,
                name: &n.name,
                content: &n.content,
                signature: &n.signature,
            });
        fts.rebuild(documents)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn function(path: &str, name: &str, content: &str) -> GraphNode {
        let mut node = GraphNode::new(NodeLabel::Function, path, name, name);
        node.content = content.to_string();
        node.start_line = 1;
        node.end_line = 3;
        node
    }

    fn calls(src: &str, tgt: &str) -> GraphRelationship {
        GraphRelationship::new(format!("calls:{src}->{tgt}"), RelType::Calls, src, tgt)
            .with_prop("confidence", 1.0)
    }

    fn sample_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        let mut file = GraphNode::new(NodeLabel::File, "src/auth.py", "", "auth.py");
        file.content = "def validate(token):\n    return token\n".to_string();
        graph.add_node(file);
        graph.add_node(function(
            "src/auth.py",
            "validate",
            "def validate(token):\n    return hash_password(token)",
        ));
        graph.add_node(function(
            "src/auth.py",
            "hash_password",
            "def hash_password(token):\n    return token",
        ));
        graph.add_relationship(calls(
            "function:src/auth.py:validate",
            "function:src/auth.py:hash_password",
        ));
        graph
    }

    fn open_store(dir: &Path) -> GraphStore {
        let mut store = GraphStore::new();
        store.initialize(dir, false).unwrap();
        store
    }

    #[test]
    fn bulk_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        let graph = sample_graph();

        store.bulk_load(&graph).unwrap();

        let node = store.get_node("function:src/auth.py:validate").unwrap();
        assert_eq!(node.name, "validate");
        assert_eq!(node.start_line, 1);

        let callees = store.get_callees("function:src/auth.py:validate");
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].name, "hash_password");

        let callers = store.get_callers("function:src/auth.py:hash_password");
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].name, "validate");
    }

    #[test]
    fn bulk_load_twice_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        let graph = sample_graph();

        store.bulk_load(&graph).unwrap();
        let nodes_first = store.nodes.len();
        let rels_first = store.relationships.len();

        store.bulk_load(&graph).unwrap();
        assert_eq!(store.nodes.len(), nodes_first);
        assert_eq!(store.relationships.len(), rels_first);
    }

    #[test]
    fn reopen_restores_state() {
        let tmp = TempDir::new().unwrap();
        {
            let mut store = open_store(tmp.path());
            store.bulk_load(&sample_graph()).unwrap();
        }

        let mut reopened = GraphStore::new();
        reopened.initialize(tmp.path(), true).unwrap();
        assert!(reopened.get_node("function:src/auth.py:validate").is_some());
        assert_eq!(
            reopened.get_callees("function:src/auth.py:validate").len(),
            1
        );
    }

    #[test]
    fn read_only_rejects_writes() {
        let tmp = TempDir::new().unwrap();
        {
            let mut store = open_store(tmp.path());
            store.bulk_load(&sample_graph()).unwrap();
        }

        let mut store = GraphStore::new();
        store.initialize(tmp.path(), true).unwrap();
        assert!(store.add_nodes(&[]).is_err());
        assert!(store.bulk_load(&sample_graph()).is_err());
    }

    #[test]
    fn remove_nodes_by_file_cascades() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        store.bulk_load(&sample_graph()).unwrap();

        let removed = store.remove_nodes_by_file("src/auth.py").unwrap();
        assert_eq!(removed, 3);
        assert!(store.get_node("function:src/auth.py:validate").is_none());
        assert!(store.relationships.is_empty());
    }

    #[test]
    fn traverse_walks_both_directions() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        let mut graph = sample_graph();
        graph.add_node(function("src/app.py", "login", "def login(): pass"));
        graph.add_relationship(calls(
            "function:src/app.py:login",
            "function:src/auth.py:validate",
        ));
        store.bulk_load(&graph).unwrap();

        let downstream = store.traverse(
            "function:src/app.py:login",
            3,
            TraversalDirection::Callees,
        );
        let names: Vec<&str> = downstream.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["validate", "hash_password"]);

        let upstream = store.traverse(
            "function:src/auth.py:hash_password",
            3,
            TraversalDirection::Callers,
        );
        assert_eq!(upstream.len(), 2);
    }

    #[test]
    fn fts_search_ranks_and_boosts() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        let mut graph = sample_graph();
        graph.add_node(function(
            "tests/test_auth.py",
            "test_validate",
            "def test_validate():\n    validate('x')",
        ));
        store.bulk_load(&graph).unwrap();

        let results = store.fts_search("validate", 10);
        assert!(!results.is_empty());
        // The source-file definition outranks the test that mentions it.
        assert_eq!(results[0].node_id, "function:src/auth.py:validate");
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn exact_name_search_prefers_source_files() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        let mut graph = sample_graph();
        graph.add_node(function("tests/helpers.py", "validate", "def validate(): pass"));
        store.bulk_load(&graph).unwrap();

        let results = store.exact_name_search("validate", 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file_path, "src/auth.py");
        assert_eq!(results[0].score, 2.0);
        assert_eq!(results[1].score, 1.0);
    }

    #[test]
    fn fuzzy_search_scores_by_distance() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        store.bulk_load(&sample_graph()).unwrap();

        let results = store.fuzzy_search("validat", 5, 2);
        assert_eq!(results[0].node_id, "function:src/auth.py:validate");
        let expected = 1.0 - 0.3;
        assert!((results[0].score - expected).abs() < 1e-6);

        assert!(store.fuzzy_search("zzzzzz", 5, 2).is_empty());
    }

    #[test]
    fn embeddings_and_vector_search() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        store.bulk_load(&sample_graph()).unwrap();

        store
            .store_embeddings(&[
                NodeEmbedding {
                    node_id: "function:src/auth.py:validate".to_string(),
                    vector: vec![1.0, 0.0],
                },
                NodeEmbedding {
                    node_id: "function:src/auth.py:hash_password".to_string(),
                    vector: vec![0.0, 1.0],
                },
            ])
            .unwrap();

        let results = store.vector_search(&[1.0, 0.1], 2);
        assert_eq!(results[0].node_id, "function:src/auth.py:validate");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn indexed_files_hash_content() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        store.bulk_load(&sample_graph()).unwrap();

        let files = store.get_indexed_files();
        assert_eq!(files.len(), 1);
        let hash = files.get("src/auth.py").unwrap();
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn execute_raw_reads_node_tables() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(tmp.path());
        store.bulk_load(&sample_graph()).unwrap();

        let rows = store
            .execute_raw("MATCH (n:Function) WHERE n.file_path = 'src/auth.py' RETURN n.name")
            .unwrap();
        assert_eq!(rows.len(), 2);
    }
}
