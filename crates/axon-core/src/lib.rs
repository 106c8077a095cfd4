//! Axon Core — graph data model, in-memory knowledge graph, storage
//! contract, and hybrid search

pub mod graph;
pub mod model;
pub mod search;
pub mod storage;

#[cfg(test)]
pub mod tests;

pub use graph::KnowledgeGraph;
pub use model::{generate_id, label_of_id, GraphNode, GraphRelationship, NodeLabel, RelType};
pub use search::{hybrid_search, DEFAULT_RRF_K};
pub use storage::{NodeEmbedding, SearchResult, StorageBackend, TraversalDirection};
