//! Batch embedding pipeline
//!
//! Turns embeddable graph nodes into natural-language descriptions and
//! feeds them through an [`EmbeddingProvider`] in batches. The dense
//! model itself lives outside this system; production wiring supplies a
//! provider, tests stub one.

pub mod text;

use anyhow::Result;
use axon_core::{KnowledgeGraph, NodeEmbedding, NodeLabel};

use self::text::{build_class_method_index, generate_text};

/// Default number of texts per provider call.
pub const BATCH_SIZE: usize = 64;

/// Labels worth embedding. Folder, Community, and Process nodes are
/// structural only and are skipped.
pub const EMBEDDABLE_LABELS: [NodeLabel; 7] = [
    NodeLabel::File,
    NodeLabel::Function,
    NodeLabel::Class,
    NodeLabel::Method,
    NodeLabel::Interface,
    NodeLabel::TypeAlias,
    NodeLabel::Enum,
];

/// Contract for the external dense-embedding model.
pub trait EmbeddingProvider {
    /// Embed a batch of texts, one vector per input, in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Generate embeddings for every embeddable node in the graph.
pub fn embed_graph(
    graph: &KnowledgeGraph,
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<Vec<NodeEmbedding>> {
    let nodes: Vec<_> = graph
        .iter_nodes()
        .filter(|n| EMBEDDABLE_LABELS.contains(&n.label))
        .collect();
    if nodes.is_empty() {
        return Ok(Vec::new());
    }

    let class_method_index = build_class_method_index(graph);
    let texts: Vec<String> = nodes
        .iter()
        .map(|node| generate_text(node, graph, Some(&class_method_index)))
        .collect();

    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(nodes.len());
    for (chunk_index, chunk) in texts.chunks(batch_size).enumerate() {
        let vectors = provider.embed(chunk)?;
        for (offset, vector) in vectors.into_iter().enumerate() {
            let node = nodes[chunk_index * batch_size + offset];
            results.push(NodeEmbedding {
                node_id: node.id.clone(),
                vector,
            });
        }
    }

    Ok(results)
}
