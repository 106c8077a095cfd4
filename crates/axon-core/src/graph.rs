//! In-memory knowledge graph with id-keyed storage and secondary indexes
//!
//! Nodes and relationships live in `BTreeMap`s keyed by their string ids,
//! with four secondary indexes (label, relationship type, outgoing edges,
//! incoming edges) kept consistent by the add/remove primitives. Every
//! query is O(result), not O(graph), and iteration order is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{GraphNode, GraphRelationship, NodeLabel, RelType};

/// An in-memory directed graph of code-level entities and their
/// relationships.
///
/// Adding a node or relationship with an existing id replaces the previous
/// instance. Removing a node cascades to every relationship where it
/// appears as source or target.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    nodes: BTreeMap<String, GraphNode>,
    relationships: BTreeMap<String, GraphRelationship>,

    // Secondary indexes, maintained by the add/remove primitives.
    by_label: BTreeMap<NodeLabel, BTreeSet<String>>,
    by_rel_type: BTreeMap<RelType, BTreeSet<String>>,
    outgoing: BTreeMap<String, BTreeSet<String>>,
    incoming: BTreeMap<String, BTreeSet<String>>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, replacing any existing node with the same id. If the
    /// label changed, the label index is updated.
    pub fn add_node(&mut self, node: GraphNode) {
        if let Some(old) = self.nodes.get(&node.id) {
            if old.label != node.label {
                if let Some(ids) = self.by_label.get_mut(&old.label) {
                    ids.remove(&node.id);
                }
            }
        }
        self.by_label
            .entry(node.label)
            .or_default()
            .insert(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn get_node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.get(node_id)
    }

    pub fn get_node_mut(&mut self, node_id: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(node_id)
    }

    /// Remove a node and cascade-delete all relationships that reference
    /// it. Returns `true` if the node existed.
    pub fn remove_node(&mut self, node_id: &str) -> bool {
        let Some(node) = self.nodes.remove(node_id) else {
            return false;
        };
        if let Some(ids) = self.by_label.get_mut(&node.label) {
            ids.remove(node_id);
        }
        self.cascade_relationships(node_id);
        true
    }

    /// Remove every node whose `file_path` matches and cascade their
    /// relationships. Returns the number of nodes removed.
    pub fn remove_nodes_by_file(&mut self, file_path: &str) -> usize {
        let ids: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.file_path == file_path)
            .map(|n| n.id.clone())
            .collect();
        for id in &ids {
            self.remove_node(id);
        }
        ids.len()
    }

    /// Add a relationship, replacing any existing one with the same id.
    pub fn add_relationship(&mut self, rel: GraphRelationship) {
        if let Some(old) = self.relationships.remove(&rel.id) {
            if let Some(ids) = self.by_rel_type.get_mut(&old.rel_type) {
                ids.remove(&rel.id);
            }
            if let Some(ids) = self.outgoing.get_mut(&old.source) {
                ids.remove(&rel.id);
            }
            if let Some(ids) = self.incoming.get_mut(&old.target) {
                ids.remove(&rel.id);
            }
        }
        self.by_rel_type
            .entry(rel.rel_type)
            .or_default()
            .insert(rel.id.clone());
        self.outgoing
            .entry(rel.source.clone())
            .or_default()
            .insert(rel.id.clone());
        self.incoming
            .entry(rel.target.clone())
            .or_default()
            .insert(rel.id.clone());
        self.relationships.insert(rel.id.clone(), rel);
    }

    pub fn get_relationship(&self, rel_id: &str) -> Option<&GraphRelationship> {
        self.relationships.get(rel_id)
    }

    pub fn get_nodes_by_label(&self, label: NodeLabel) -> Vec<&GraphNode> {
        self.ids_by_label(label)
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .collect()
    }

    /// Node ids for a label, cloned so callers can mutate nodes while
    /// iterating.
    pub fn ids_by_label(&self, label: NodeLabel) -> Vec<String> {
        self.by_label
            .get(&label)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_relationships_by_type(&self, rel_type: RelType) -> Vec<&GraphRelationship> {
        self.by_rel_type
            .get(&rel_type)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.relationships.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Relationships originating from `node_id`, optionally filtered by
    /// type.
    pub fn get_outgoing(&self, node_id: &str, rel_type: Option<RelType>) -> Vec<&GraphRelationship> {
        self.adjacent(&self.outgoing, node_id, rel_type)
    }

    /// Relationships targeting `node_id`, optionally filtered by type.
    pub fn get_incoming(&self, node_id: &str, rel_type: Option<RelType>) -> Vec<&GraphRelationship> {
        self.adjacent(&self.incoming, node_id, rel_type)
    }

    /// True if `node_id` has any incoming edge of `rel_type`, without
    /// materializing a list.
    pub fn has_incoming(&self, node_id: &str, rel_type: RelType) -> bool {
        self.incoming
            .get(node_id)
            .map(|ids| {
                ids.iter().any(|id| {
                    self.relationships
                        .get(id)
                        .is_some_and(|r| r.rel_type == rel_type)
                })
            })
            .unwrap_or(false)
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn iter_relationships(&self) -> impl Iterator<Item = &GraphRelationship> {
        self.relationships.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn count_nodes_by_label(&self, label: NodeLabel) -> usize {
        self.by_label.get(&label).map_or(0, BTreeSet::len)
    }

    fn adjacent(
        &self,
        index: &BTreeMap<String, BTreeSet<String>>,
        node_id: &str,
        rel_type: Option<RelType>,
    ) -> Vec<&GraphRelationship> {
        let Some(ids) = index.get(node_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.relationships.get(id))
            .filter(|r| rel_type.map_or(true, |rt| r.rel_type == rt))
            .collect()
    }

    /// Remove all relationships where `node_id` is source or target.
    fn cascade_relationships(&mut self, node_id: &str) {
        let mut to_remove: BTreeSet<String> = BTreeSet::new();
        if let Some(ids) = self.outgoing.remove(node_id) {
            to_remove.extend(ids);
        }
        if let Some(ids) = self.incoming.remove(node_id) {
            to_remove.extend(ids);
        }
        for rel_id in to_remove {
            let Some(rel) = self.relationships.remove(&rel_id) else {
                continue;
            };
            if let Some(ids) = self.by_rel_type.get_mut(&rel.rel_type) {
                ids.remove(&rel_id);
            }
            if let Some(ids) = self.outgoing.get_mut(&rel.source) {
                ids.remove(&rel_id);
            }
            if let Some(ids) = self.incoming.get_mut(&rel.target) {
                ids.remove(&rel_id);
            }
        }
    }
}
