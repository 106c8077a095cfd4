//! Parsing phase: symbol nodes and DEFINES edges
//!
//! Files are parsed in parallel through the parser pool; graph mutation
//! stays sequential (the graph is single-owner) and follows the walker's
//! file order, so every emitted id is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use axon_core::{generate_id, GraphNode, GraphRelationship, KnowledgeGraph, NodeLabel, RelType};
use tracing::warn;

use crate::languages::ParseResult;
use crate::parser_pool::ParserPool;
use crate::walker::FileEntry;

/// Parse results for a single file, kept for the resolver phases.
#[derive(Debug, Clone)]
pub struct FileParseData {
    pub file_path: String,
    pub language: String,
    pub parse_result: ParseResult,
}

/// Map an IR symbol kind onto a graph label. Unknown kinds resolve to
/// `None` and are skipped with a warning.
pub fn kind_to_label(kind: &str) -> Option<NodeLabel> {
    match kind {
        "function" => Some(NodeLabel::Function),
        "class" => Some(NodeLabel::Class),
        "method" => Some(NodeLabel::Method),
        "interface" => Some(NodeLabel::Interface),
        "type_alias" => Some(NodeLabel::TypeAlias),
        "enum" => Some(NodeLabel::Enum),
        _ => None,
    }
}

/// Graph symbol name for an IR symbol: methods are qualified as
/// `ClassName.method` to disambiguate across classes.
pub fn symbol_graph_name(kind: &str, name: &str, class_name: &str) -> String {
    if kind == "method" && !class_name.is_empty() {
        format!("{class_name}.{name}")
    } else {
        name.to_string()
    }
}

/// Parse every file and populate the graph with symbol nodes.
///
/// Each discovered symbol becomes a node with the appropriate label and a
/// `defines` edge from its File node. Returns the per-file parse data for
/// the import/call/heritage/type phases.
pub fn process_parsing(files: &[FileEntry], graph: &mut KnowledgeGraph) -> Vec<FileParseData> {
    let parse_results = ParserPool::global().parse_batch(files);

    let mut all_parse_data = Vec::with_capacity(files.len());

    for (entry, parse_result) in files.iter().zip(parse_results) {
        let file_id = generate_id(NodeLabel::File, &entry.path, "");
        let exported: BTreeSet<&str> = parse_result.exports.iter().map(String::as_str).collect();

        // Base-class names per class, stored on the class node for the
        // enum exemption in dead-code analysis.
        let mut class_bases: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for heritage in &parse_result.heritage {
            if heritage.kind == "extends" {
                class_bases
                    .entry(heritage.child.as_str())
                    .or_default()
                    .push(heritage.parent.as_str());
            }
        }

        for symbol in &parse_result.symbols {
            let Some(label) = kind_to_label(&symbol.kind) else {
                warn!(
                    "unknown symbol kind {:?} for {} in {}, skipping",
                    symbol.kind, symbol.name, entry.path
                );
                continue;
            };

            let symbol_name = symbol_graph_name(&symbol.kind, &symbol.name, &symbol.class_name);
            let symbol_id = generate_id(label, &entry.path, &symbol_name);

            let mut node = GraphNode::new(label, &entry.path, &symbol_name, &symbol.name);
            node.start_line = symbol.start_line;
            node.end_line = symbol.end_line;
            node.content = symbol.content.clone();
            node.signature = symbol.signature.clone();
            node.class_name = symbol.class_name.clone();
            node.language = entry.language.clone();
            node.is_exported = exported.contains(symbol.name.as_str());

            if !symbol.decorators.is_empty() {
                node.set_prop("decorators", serde_json::json!(symbol.decorators));
            }
            if symbol.kind == "class" {
                if let Some(bases) = class_bases.get(symbol.name.as_str()) {
                    node.set_prop("bases", serde_json::json!(bases));
                }
            }

            graph.add_node(node);

            graph.add_relationship(GraphRelationship::new(
                format!("defines:{file_id}->{symbol_id}"),
                RelType::Defines,
                file_id.clone(),
                symbol_id,
            ));
        }

        all_parse_data.push(FileParseData {
            file_path: entry.path.clone(),
            language: entry.language.clone(),
            parse_result,
        });
    }

    all_parse_data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::process_structure;

    fn entry(path: &str, content: &str, language: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            content: content.to_string(),
            language: language.to_string(),
        }
    }

    #[test]
    fn symbols_become_nodes_with_defines_edges() {
        let files = vec![entry(
            "src/auth.py",
            "__all__ = [\"validate\"]\n\ndef validate(token):\n    return token\n\nclass Session:\n    def close(self):\n        pass\n",
            "python",
        )];
        let mut graph = KnowledgeGraph::new();
        process_structure(&files, &mut graph);
        process_parsing(&files, &mut graph);

        let validate = graph.get_node("function:src/auth.py:validate").unwrap();
        assert!(validate.is_exported);
        assert_eq!(validate.language, "python");

        let close = graph.get_node("method:src/auth.py:Session.close").unwrap();
        assert_eq!(close.class_name, "Session");
        assert_eq!(close.name, "close");

        assert!(graph
            .get_relationship("defines:file:src/auth.py:->function:src/auth.py:validate")
            .is_some());
    }

    #[test]
    fn class_bases_are_recorded() {
        let files = vec![entry(
            "src/status.py",
            "class Status(Enum):\n    OPEN = 1\n",
            "python",
        )];
        let mut graph = KnowledgeGraph::new();
        process_parsing(&files, &mut graph);

        let status = graph.get_node("class:src/status.py:Status").unwrap();
        assert_eq!(status.prop_str_list("bases"), vec!["Enum"]);
    }

    #[test]
    fn rerun_produces_identical_id_sets() {
        let files = vec![entry(
            "src/app.py",
            "def main():\n    run()\n\ndef run():\n    pass\n",
            "python",
        )];

        let mut first = KnowledgeGraph::new();
        process_structure(&files, &mut first);
        process_parsing(&files, &mut first);

        let mut second = KnowledgeGraph::new();
        process_structure(&files, &mut second);
        process_parsing(&files, &mut second);

        let ids_a: Vec<&str> = first.iter_nodes().map(|n| n.id.as_str()).collect();
        let ids_b: Vec<&str> = second.iter_nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
