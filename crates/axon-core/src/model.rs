//! Core data structures for the knowledge graph
//!
//! Nodes represent code-level entities (files, functions, classes, …) and
//! relationships the edges between them (calls, imports, contains, …).
//! Both are keyed by deterministic string IDs so that two index runs over
//! the same tree produce identical graphs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Labels for graph nodes representing code-level entities.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum NodeLabel {
    File,
    Folder,
    Function,
    Class,
    Method,
    Interface,
    TypeAlias,
    Enum,
    Community,
    Process,
}

impl NodeLabel {
    /// All labels, in id-prefix order.
    pub const ALL: [NodeLabel; 10] = [
        NodeLabel::File,
        NodeLabel::Folder,
        NodeLabel::Function,
        NodeLabel::Class,
        NodeLabel::Method,
        NodeLabel::Interface,
        NodeLabel::TypeAlias,
        NodeLabel::Enum,
        NodeLabel::Community,
        NodeLabel::Process,
    ];

    /// The wire value used in node ids (`function`, `type_alias`, …).
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::File => "file",
            NodeLabel::Folder => "folder",
            NodeLabel::Function => "function",
            NodeLabel::Class => "class",
            NodeLabel::Method => "method",
            NodeLabel::Interface => "interface",
            NodeLabel::TypeAlias => "type_alias",
            NodeLabel::Enum => "enum",
            NodeLabel::Community => "community",
            NodeLabel::Process => "process",
        }
    }

    /// Parse a wire value back into a label.
    pub fn parse(value: &str) -> Option<NodeLabel> {
        NodeLabel::ALL.iter().copied().find(|l| l.as_str() == value)
    }
}

/// Relationship types connecting graph nodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelType {
    Contains,
    Defines,
    Calls,
    Imports,
    Extends,
    Implements,
    MemberOf,
    StepInProcess,
    UsesType,
    Exports,
    CoupledWith,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::Contains => "contains",
            RelType::Defines => "defines",
            RelType::Calls => "calls",
            RelType::Imports => "imports",
            RelType::Extends => "extends",
            RelType::Implements => "implements",
            RelType::MemberOf => "member_of",
            RelType::StepInProcess => "step_in_process",
            RelType::UsesType => "uses_type",
            RelType::Exports => "exports",
            RelType::CoupledWith => "coupled_with",
        }
    }
}

/// Produce a deterministic node ID of the form
/// `{label}:{file_path}:{symbol_name}`.
///
/// For methods the symbol name is `ClassName.method_name`, folders use
/// their directory path as `file_path`, and community/process nodes use a
/// synthetic key in the `file_path` slot.
pub fn generate_id(label: NodeLabel, file_path: &str, symbol_name: &str) -> String {
    format!("{}:{}:{}", label.as_str(), file_path, symbol_name)
}

/// Recover the label encoded in a node id prefix.
pub fn label_of_id(node_id: &str) -> Option<NodeLabel> {
    let prefix = node_id.split(':').next()?;
    NodeLabel::parse(prefix)
}

/// A node in the knowledge graph representing a code entity.
///
/// `id`, `label`, and `name` are always meaningful; the remaining fields
/// default to empty so that phases only fill in what they know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: NodeLabel,
    pub name: String,

    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub start_line: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub language: String,
    /// For methods: the owning class. Empty for functions.
    #[serde(default)]
    pub class_name: String,

    #[serde(default)]
    pub is_dead: bool,
    #[serde(default)]
    pub is_entry_point: bool,
    #[serde(default)]
    pub is_exported: bool,

    /// Open map for rare attributes (decorators, bases, is_protocol,
    /// cohesion, symbol_count, step_count, kind).
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl GraphNode {
    /// Create a node with a generated id and empty defaults.
    pub fn new(label: NodeLabel, file_path: &str, symbol_name: &str, name: impl Into<String>) -> Self {
        GraphNode {
            id: generate_id(label, file_path, symbol_name),
            label,
            name: name.into(),
            file_path: file_path.to_string(),
            start_line: 0,
            end_line: 0,
            content: String::new(),
            signature: String::new(),
            language: String::new(),
            class_name: String::new(),
            is_dead: false,
            is_entry_point: false,
            is_exported: false,
            properties: BTreeMap::new(),
        }
    }

    pub fn set_prop(&mut self, key: &str, value: impl Into<Value>) {
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn prop_bool(&self, key: &str) -> bool {
        self.properties.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn prop_i64(&self, key: &str) -> i64 {
        self.properties.get(key).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn prop_f64(&self, key: &str) -> f64 {
        self.properties.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn prop_str(&self, key: &str) -> &str {
        self.properties.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// String-list property (decorators, bases). Non-string items are skipped.
    pub fn prop_str_list(&self, key: &str) -> Vec<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// A directed edge in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub id: String,
    #[serde(rename = "type")]
    pub rel_type: RelType,
    pub source: String,
    pub target: String,

    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl GraphRelationship {
    pub fn new(
        id: impl Into<String>,
        rel_type: RelType,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        GraphRelationship {
            id: id.into(),
            rel_type,
            source: source.into(),
            target: target.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn prop_f64(&self, key: &str) -> f64 {
        self.properties.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn prop_i64(&self, key: &str) -> i64 {
        self.properties.get(key).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn prop_str(&self, key: &str) -> &str {
        self.properties.get(key).and_then(Value::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trips_label() {
        for label in NodeLabel::ALL {
            let id = generate_id(label, "src/app.py", "login");
            assert_eq!(label_of_id(&id), Some(label));
        }
    }

    #[test]
    fn method_id_uses_class_dot_name() {
        let id = generate_id(NodeLabel::Method, "src/auth.py", "Backend.close");
        assert_eq!(id, "method:src/auth.py:Backend.close");
    }

    #[test]
    fn label_wire_values_parse() {
        assert_eq!(NodeLabel::parse("type_alias"), Some(NodeLabel::TypeAlias));
        assert_eq!(NodeLabel::parse("view"), None);
    }

    #[test]
    fn property_accessors() {
        let mut node = GraphNode::new(NodeLabel::Class, "src/m.py", "User", "User");
        node.set_prop("is_protocol", true);
        node.set_prop("bases", serde_json::json!(["Enum"]));
        assert!(node.prop_bool("is_protocol"));
        assert_eq!(node.prop_str_list("bases"), vec!["Enum"]);
        assert_eq!(node.prop_i64("missing"), 0);
    }
}
