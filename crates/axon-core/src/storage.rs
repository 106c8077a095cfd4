//! Storage backend abstraction
//!
//! Defines the trait every persistent backend must satisfy, covering the
//! full lifecycle of graph persistence: initialisation, node/relationship
//! upserts, lookups and traversal, full-text / fuzzy / vector search, and
//! the hooks the incremental re-indexer relies on. Exposing this as a
//! trait lets tests stub the store without touching disk.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::graph::KnowledgeGraph;
use crate::model::{GraphNode, GraphRelationship};

/// Which way a call-graph traversal walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    /// Follow incoming `calls` edges (blast radius).
    Callers,
    /// Follow outgoing `calls` edges (dependencies).
    Callees,
}

/// A single result from a full-text, fuzzy, or vector search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub node_id: String,
    pub score: f32,
    pub node_name: String,
    pub file_path: String,
    pub label: String,
    pub snippet: String,
}

/// An embedding vector associated with a graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEmbedding {
    pub node_id: String,
    pub vector: Vec<f32>,
}

/// Contract every storage backend must implement.
pub trait StorageBackend {
    /// Open or create the backing store at `path`. In read-only mode
    /// schema/index creation is skipped and mutating calls fail.
    fn initialize(&mut self, path: &Path, read_only: bool) -> Result<()>;

    /// Release resources held by the backend.
    fn close(&mut self);

    /// Insert or upsert a batch of nodes.
    fn add_nodes(&mut self, nodes: &[GraphNode]) -> Result<()>;

    /// Insert or upsert a batch of relationships.
    fn add_relationships(&mut self, rels: &[GraphRelationship]) -> Result<()>;

    /// Remove all nodes originating from `file_path`, cascading incident
    /// edges. Returns the number of nodes removed.
    fn remove_nodes_by_file(&mut self, file_path: &str) -> Result<usize>;

    fn get_node(&self, node_id: &str) -> Option<GraphNode>;

    /// Nodes that call the node identified by `node_id`.
    fn get_callers(&self, node_id: &str) -> Vec<GraphNode>;

    /// Nodes called by the node identified by `node_id`.
    fn get_callees(&self, node_id: &str) -> Vec<GraphNode>;

    /// Nodes referenced via `uses_type` from `node_id`.
    fn get_type_refs(&self, node_id: &str) -> Vec<GraphNode>;

    /// Breadth-first traversal through `calls` edges up to `depth` hops.
    fn traverse(&self, start_id: &str, depth: usize, direction: TraversalDirection)
        -> Vec<GraphNode>;

    /// Execute a raw backend-specific read-only query. Writes are rejected
    /// at the tool layer before reaching this call.
    fn execute_raw(&self, query: &str) -> Result<Vec<Vec<serde_json::Value>>>;

    /// BM25 full-text search across indexed node content.
    fn fts_search(&self, query: &str, limit: usize) -> Vec<SearchResult>;

    /// Exact name match across searchable labels, source files ranked
    /// above test files.
    fn exact_name_search(&self, name: &str, limit: usize) -> Vec<SearchResult>;

    /// Fuzzy name search by edit distance.
    fn fuzzy_search(&self, query: &str, limit: usize, max_distance: usize) -> Vec<SearchResult>;

    /// Nearest nodes to `vector` by cosine similarity.
    fn vector_search(&self, vector: &[f32], limit: usize) -> Vec<SearchResult>;

    /// Upsert embedding vectors keyed by node id.
    fn store_embeddings(&mut self, embeddings: &[NodeEmbedding]) -> Result<()>;

    /// `{file_path -> content hash}` for every File node. Used by the
    /// incremental re-indexer to detect changes.
    fn get_indexed_files(&self) -> BTreeMap<String, String>;

    /// Replace the entire store contents with `graph`.
    fn bulk_load(&mut self, graph: &KnowledgeGraph) -> Result<()>;

    /// Drop and recreate the full-text indexes. Must be called after any
    /// bulk data change.
    fn rebuild_fts_indexes(&mut self) -> Result<()>;
}
