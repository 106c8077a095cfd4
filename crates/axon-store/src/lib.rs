//! Axon Store — embedded persistence for the knowledge graph
//!
//! JSON node tables grouped by label, an adjacency-indexed in-memory
//! mirror, tantivy BM25 full-text search, Levenshtein fuzzy search,
//! cosine vector search, and a read-only raw-query engine.

pub mod fts;
pub mod query;
pub mod store;

pub use store::GraphStore;
