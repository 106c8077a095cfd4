//! Natural-language descriptions of graph nodes for embedding
//!
//! Each description is synthesised purely from graph context: a header
//! line with label, name, owner, and file, then the relationships that
//! characterise the node (callers/callees, types used, members, bases,
//! steps, …).

use std::collections::BTreeMap;

use axon_core::{GraphNode, KnowledgeGraph, NodeLabel, RelType};

/// Pre-build class name → sorted method names, so class descriptions
/// avoid a scan per class.
pub fn build_class_method_index(graph: &KnowledgeGraph) -> BTreeMap<String, Vec<String>> {
    let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for method in graph.get_nodes_by_label(NodeLabel::Method) {
        if !method.class_name.is_empty() {
            index
                .entry(method.class_name.clone())
                .or_default()
                .push(method.name.clone());
        }
    }
    for names in index.values_mut() {
        names.sort();
    }
    index
}

/// Produce the embedding text for a node.
pub fn generate_text(
    node: &GraphNode,
    graph: &KnowledgeGraph,
    class_method_index: Option<&BTreeMap<String, Vec<String>>>,
) -> String {
    match node.label {
        NodeLabel::Function | NodeLabel::Method => text_for_callable(node, graph),
        NodeLabel::Class => text_for_class(node, graph, class_method_index),
        NodeLabel::File => text_for_file(node, graph),
        NodeLabel::Folder => text_for_folder(node, graph),
        NodeLabel::Interface | NodeLabel::TypeAlias | NodeLabel::Enum => {
            text_for_type_definition(node)
        }
        NodeLabel::Community => text_for_community(node, graph),
        NodeLabel::Process => text_for_process(node, graph),
    }
}

fn text_for_callable(node: &GraphNode, graph: &KnowledgeGraph) -> String {
    let mut lines = vec![header(node)];

    if !node.signature.is_empty() {
        lines.push(format!("signature: {}", node.signature));
    }

    push_names(&mut lines, "calls", target_names(&node.id, RelType::Calls, graph));
    push_names(
        &mut lines,
        "called by",
        source_names(&node.id, RelType::Calls, graph),
    );
    push_names(
        &mut lines,
        "uses types",
        target_names(&node.id, RelType::UsesType, graph),
    );

    lines.join("\n")
}

fn text_for_class(
    node: &GraphNode,
    graph: &KnowledgeGraph,
    class_method_index: Option<&BTreeMap<String, Vec<String>>>,
) -> String {
    let mut lines = vec![header(node)];

    let method_names = match class_method_index {
        Some(index) => index.get(&node.name).cloned().unwrap_or_default(),
        None => {
            let mut names: Vec<String> = graph
                .get_nodes_by_label(NodeLabel::Method)
                .into_iter()
                .filter(|m| m.class_name == node.name)
                .map(|m| m.name.clone())
                .collect();
            names.sort();
            names
        }
    };
    push_names(&mut lines, "methods", method_names);
    push_names(
        &mut lines,
        "extends",
        target_names(&node.id, RelType::Extends, graph),
    );
    push_names(
        &mut lines,
        "implements",
        target_names(&node.id, RelType::Implements, graph),
    );

    lines.join("\n")
}

fn text_for_file(node: &GraphNode, graph: &KnowledgeGraph) -> String {
    let mut lines = vec![header(node)];
    push_names(
        &mut lines,
        "defines",
        target_names(&node.id, RelType::Defines, graph),
    );
    push_names(
        &mut lines,
        "imports",
        target_names(&node.id, RelType::Imports, graph),
    );
    lines.join("\n")
}

fn text_for_folder(node: &GraphNode, graph: &KnowledgeGraph) -> String {
    let mut lines = vec![header(node)];
    push_names(
        &mut lines,
        "contains",
        target_names(&node.id, RelType::Contains, graph),
    );
    lines.join("\n")
}

fn text_for_type_definition(node: &GraphNode) -> String {
    let mut lines = vec![header(node)];
    if !node.signature.is_empty() {
        lines.push(format!("signature: {}", node.signature));
    }
    lines.join("\n")
}

fn text_for_community(node: &GraphNode, graph: &KnowledgeGraph) -> String {
    let mut lines = vec![header(node)];
    push_names(
        &mut lines,
        "members",
        source_names(&node.id, RelType::MemberOf, graph),
    );
    lines.join("\n")
}

fn text_for_process(node: &GraphNode, graph: &KnowledgeGraph) -> String {
    let mut lines = vec![header(node)];
    push_names(
        &mut lines,
        "steps",
        source_names(&node.id, RelType::StepInProcess, graph),
    );
    lines.join("\n")
}

/// `<label> <name> [of class C] [in <file>]`.
fn header(node: &GraphNode) -> String {
    let mut parts = vec![format!("{} {}", node.label.as_str(), node.name)];
    if node.label == NodeLabel::Method && !node.class_name.is_empty() {
        parts.push(format!("of class {}", node.class_name));
    }
    if !node.file_path.is_empty() {
        parts.push(format!("in {}", node.file_path));
    }
    parts.join(" ")
}

fn push_names(lines: &mut Vec<String>, label: &str, names: Vec<String>) {
    if !names.is_empty() {
        lines.push(format!("{label}: {}", names.join(", ")));
    }
}

/// Sorted names of target nodes for outgoing edges of a type.
fn target_names(node_id: &str, rel_type: RelType, graph: &KnowledgeGraph) -> Vec<String> {
    let mut names: Vec<String> = graph
        .get_outgoing(node_id, Some(rel_type))
        .into_iter()
        .filter_map(|rel| graph.get_node(&rel.target))
        .map(|n| n.name.clone())
        .collect();
    names.sort();
    names
}

/// Sorted names of source nodes for incoming edges of a type.
fn source_names(node_id: &str, rel_type: RelType, graph: &KnowledgeGraph) -> Vec<String> {
    let mut names: Vec<String> = graph
        .get_incoming(node_id, Some(rel_type))
        .into_iter()
        .filter_map(|rel| graph.get_node(&rel.source))
        .map(|n| n.name.clone())
        .collect();
    names.sort();
    names
}
