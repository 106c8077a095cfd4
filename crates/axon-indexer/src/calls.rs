//! Call tracing phase: CALLS edges with confidence scores
//!
//! Resolution priority for a call site:
//! 1. `self.m()` / `this.m()` to a method in the same file (1.0)
//! 2. Same-file exact-name match (1.0)
//! 3. Import-resolved match (1.0)
//! 4. Global fuzzy match, shortest file path wins (0.5)
//!
//! Additional edges come from callback-style identifier arguments
//! (scaled by 0.8), receiver lookups, and decorators as implicit calls.

use std::collections::{BTreeMap, BTreeSet};

use axon_core::{generate_id, GraphRelationship, KnowledgeGraph, NodeLabel, RelType};
use tracing::debug;

use crate::languages::CallInfo;
use crate::parsing::{kind_to_label, symbol_graph_name, FileParseData};
use crate::symbol_index::{build_name_index, FileSymbolIndex};

const CALLABLE_LABELS: [NodeLabel; 3] = [NodeLabel::Function, NodeLabel::Method, NodeLabel::Class];

type NameIndex = BTreeMap<String, Vec<String>>;

/// Resolve a call to `(target_node_id, confidence)`, or `None`.
pub fn resolve_call(
    call: &CallInfo,
    file_path: &str,
    call_index: &NameIndex,
    graph: &KnowledgeGraph,
) -> Option<(String, f64)> {
    if call.receiver == "self" || call.receiver == "this" {
        if let Some(target) = resolve_self_method(&call.name, file_path, call_index, graph) {
            return Some((target, 1.0));
        }
    }

    // Without type information the receiver does not narrow the search;
    // fall through to name-based resolution.
    let candidates = call_index.get(&call.name)?;
    if candidates.is_empty() {
        return None;
    }

    // 1. Same-file exact match.
    for nid in candidates {
        if let Some(node) = graph.get_node(nid) {
            if node.file_path == file_path {
                return Some((nid.clone(), 1.0));
            }
        }
    }

    // 2. Import-resolved match.
    if let Some(target) = resolve_via_imports(&call.name, file_path, candidates, graph) {
        return Some((target, 1.0));
    }

    // 3. Global fuzzy match, preferring the shortest file path.
    pick_closest(candidates, graph).map(|target| (target, 0.5))
}

/// A method with this name defined in the same file, for `self`/`this`
/// receivers.
fn resolve_self_method(
    method_name: &str,
    file_path: &str,
    call_index: &NameIndex,
    graph: &KnowledgeGraph,
) -> Option<String> {
    for nid in call_index.get(method_name)? {
        if let Some(node) = graph.get_node(nid) {
            if node.label == NodeLabel::Method && node.file_path == file_path {
                return Some(nid.clone());
            }
        }
    }
    None
}

/// Check whether `name` was imported into `file_path` and resolve among
/// candidates defined in the imported files. Imports without specific
/// names (star/bare-module) admit any name.
fn resolve_via_imports(
    name: &str,
    file_path: &str,
    candidates: &[String],
    graph: &KnowledgeGraph,
) -> Option<String> {
    let source_file_id = generate_id(NodeLabel::File, file_path, "");
    let import_rels = graph.get_outgoing(&source_file_id, Some(RelType::Imports));
    if import_rels.is_empty() {
        return None;
    }

    let mut imported_files: BTreeSet<String> = BTreeSet::new();
    for rel in import_rels {
        let symbols = rel.prop_str("symbols");
        let imported_names: BTreeSet<&str> = symbols
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if imported_names.is_empty() || imported_names.contains(name) {
            if let Some(target_node) = graph.get_node(&rel.target) {
                imported_files.insert(target_node.file_path.clone());
            }
        }
    }

    for nid in candidates {
        if let Some(node) = graph.get_node(nid) {
            if imported_files.contains(&node.file_path) {
                return Some(nid.clone());
            }
        }
    }
    None
}

/// Proximity heuristic: the candidate with the shortest file path.
fn pick_closest(candidates: &[String], graph: &KnowledgeGraph) -> Option<String> {
    let mut best: Option<(&String, usize)> = None;
    for nid in candidates {
        if let Some(node) = graph.get_node(nid) {
            let len = node.file_path.len();
            if best.map_or(true, |(_, best_len)| len < best_len) {
                best = Some((nid, len));
            }
        }
    }
    best.map(|(nid, _)| nid.clone())
}

fn add_calls_edge(
    graph: &mut KnowledgeGraph,
    seen: &mut BTreeSet<String>,
    source_id: &str,
    target_id: &str,
    confidence: f64,
) {
    let rel_id = format!("calls:{source_id}->{target_id}");
    if seen.insert(rel_id.clone()) {
        graph.add_relationship(
            GraphRelationship::new(rel_id, RelType::Calls, source_id, target_id)
                .with_prop("confidence", confidence),
        );
    }
}

/// `Receiver.method()`: look for a method whose `class_name` matches
/// the receiver, same file preferred, and link it at 0.8.
fn resolve_receiver_method(
    receiver: &str,
    method_name: &str,
    source_id: &str,
    file_path: &str,
    call_index: &NameIndex,
    graph: &mut KnowledgeGraph,
    seen: &mut BTreeSet<String>,
) {
    let mut same_file: Option<String> = None;
    let mut global: Option<String> = None;

    if let Some(candidates) = call_index.get(method_name) {
        for nid in candidates {
            let Some(node) = graph.get_node(nid) else {
                continue;
            };
            if node.label == NodeLabel::Method && node.class_name == receiver {
                if node.file_path == file_path {
                    same_file = Some(nid.clone());
                    break;
                }
                if global.is_none() {
                    global = Some(nid.clone());
                }
            }
        }
    }

    if let Some(target) = same_file.or(global) {
        add_calls_edge(graph, seen, source_id, &target, 0.8);
    }
}

/// Resolve every call site and create CALLS relationships.
///
/// The source symbol of a call is the smallest callable whose line range
/// contains the call's line; calls with no containing symbol are skipped
/// with a debug note.
pub fn process_calls(parse_data: &[FileParseData], graph: &mut KnowledgeGraph) {
    let call_index = build_name_index(graph, &CALLABLE_LABELS);
    let file_sym_index = FileSymbolIndex::build(graph, &CALLABLE_LABELS);
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for fpd in parse_data {
        for call in &fpd.parse_result.calls {
            let source_id = match file_sym_index.find_containing_symbol(call.line, &fpd.file_path) {
                Some(id) => id.to_string(),
                None => {
                    debug!(
                        "no containing symbol for call {} at line {} in {}",
                        call.name, call.line, fpd.file_path
                    );
                    continue;
                }
            };

            if let Some((target_id, confidence)) =
                resolve_call(call, &fpd.file_path, &call_index, graph)
            {
                add_calls_edge(graph, &mut seen, &source_id, &target_id, confidence);
            }

            // Callback arguments: bare identifiers passed as arguments
            // resolve as calls at 0.8 of their own confidence.
            for arg_name in &call.arguments {
                let arg_call = CallInfo {
                    name: arg_name.clone(),
                    line: call.line,
                    ..CallInfo::default()
                };
                if let Some((arg_id, arg_conf)) =
                    resolve_call(&arg_call, &fpd.file_path, &call_index, graph)
                {
                    add_calls_edge(graph, &mut seen, &source_id, &arg_id, arg_conf * 0.8);
                }
            }

            // Non-self receivers: link the receiver itself, then look up
            // the method on that class.
            if !call.receiver.is_empty() && call.receiver != "self" && call.receiver != "this" {
                let receiver_call = CallInfo {
                    name: call.receiver.clone(),
                    line: call.line,
                    ..CallInfo::default()
                };
                if let Some((recv_id, recv_conf)) =
                    resolve_call(&receiver_call, &fpd.file_path, &call_index, graph)
                {
                    add_calls_edge(graph, &mut seen, &source_id, &recv_id, recv_conf);
                }

                resolve_receiver_method(
                    &call.receiver,
                    &call.name,
                    &source_id,
                    &fpd.file_path,
                    &call_index,
                    graph,
                    &mut seen,
                );
            }
        }

        // Decorators are implicit calls: @wrap on a symbol is equivalent
        // to calling wrap(symbol). The short dotted segment is tried
        // first, the full dotted name as a fallback.
        for symbol in &fpd.parse_result.symbols {
            if symbol.decorators.is_empty() {
                continue;
            }
            let Some(label) = kind_to_label(&symbol.kind) else {
                continue;
            };
            let symbol_name = symbol_graph_name(&symbol.kind, &symbol.name, &symbol.class_name);
            let source_id = generate_id(label, &fpd.file_path, &symbol_name);

            for dec_name in &symbol.decorators {
                let base_name = dec_name.rsplit('.').next().unwrap_or(dec_name);
                let mut resolved = resolve_call(
                    &CallInfo {
                        name: base_name.to_string(),
                        line: symbol.start_line,
                        ..CallInfo::default()
                    },
                    &fpd.file_path,
                    &call_index,
                    graph,
                );
                if resolved.is_none() && dec_name.contains('.') {
                    resolved = resolve_call(
                        &CallInfo {
                            name: dec_name.clone(),
                            line: symbol.start_line,
                            ..CallInfo::default()
                        },
                        &fpd.file_path,
                        &call_index,
                        graph,
                    );
                }
                if let Some((target_id, confidence)) = resolved {
                    add_calls_edge(graph, &mut seen, &source_id, &target_id, confidence);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::process_parsing;
    use crate::structure::process_structure;
    use crate::walker::FileEntry;
    use crate::imports::process_imports;

    fn entry(path: &str, content: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            content: content.to_string(),
            language: "python".to_string(),
        }
    }

    fn build(files: &[FileEntry]) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        process_structure(files, &mut graph);
        let parse_data = process_parsing(files, &mut graph);
        process_imports(&parse_data, &mut graph);
        process_calls(&parse_data, &mut graph);
        graph
    }

    #[test]
    fn same_file_and_import_resolution() {
        let files = vec![
            entry(
                "src/app.py",
                "from .auth import validate\n\ndef login(token):\n    return validate(token)\n",
            ),
            entry(
                "src/auth.py",
                "def validate(token):\n    return hash_password(token)\n\ndef hash_password(token):\n    return token\n",
            ),
        ];
        let graph = build(&files);

        let login_to_validate = graph
            .get_relationship("calls:function:src/app.py:login->function:src/auth.py:validate")
            .unwrap();
        assert_eq!(login_to_validate.prop_f64("confidence"), 1.0);

        let validate_to_hash = graph
            .get_relationship(
                "calls:function:src/auth.py:validate->function:src/auth.py:hash_password",
            )
            .unwrap();
        assert_eq!(validate_to_hash.prop_f64("confidence"), 1.0);
    }

    #[test]
    fn global_fuzzy_match_scores_half() {
        let files = vec![
            entry("src/app.py", "def run():\n    helper()\n"),
            entry("src/deep/nested/util.py", "def helper():\n    pass\n"),
        ];
        let graph = build(&files);

        let edge = graph
            .get_relationship(
                "calls:function:src/app.py:run->function:src/deep/nested/util.py:helper",
            )
            .unwrap();
        assert_eq!(edge.prop_f64("confidence"), 0.5);
    }

    #[test]
    fn self_method_resolution() {
        let files = vec![entry(
            "src/session.py",
            "class Session:\n    def open(self):\n        self.close()\n\n    def close(self):\n        pass\n",
        )];
        let graph = build(&files);

        let edge = graph
            .get_relationship(
                "calls:method:src/session.py:Session.open->method:src/session.py:Session.close",
            )
            .unwrap();
        assert_eq!(edge.prop_f64("confidence"), 1.0);
    }

    #[test]
    fn callback_arguments_scaled() {
        let files = vec![entry(
            "src/jobs.py",
            "def transform(x):\n    return x\n\ndef run(items):\n    process(transform)\n",
        )];
        let graph = build(&files);

        let edge = graph
            .get_relationship("calls:function:src/jobs.py:run->function:src/jobs.py:transform")
            .unwrap();
        assert_eq!(edge.prop_f64("confidence"), 0.8);
    }

    #[test]
    fn receiver_method_lookup() {
        // Two candidates named `flush`: the name-based path resolves to
        // the closer function, the receiver lookup adds the method edge.
        let files = vec![
            entry("src/f.py", "def flush():\n    pass\n"),
            entry(
                "src/store.py",
                "class Backend:\n    def flush(self):\n        pass\n",
            ),
            entry("src/app.py", "def save(b):\n    Backend.flush()\n"),
        ];
        let graph = build(&files);

        let method_edge = graph
            .get_relationship(
                "calls:function:src/app.py:save->method:src/store.py:Backend.flush",
            )
            .unwrap();
        assert_eq!(method_edge.prop_f64("confidence"), 0.8);

        let fuzzy_edge = graph
            .get_relationship("calls:function:src/app.py:save->function:src/f.py:flush")
            .unwrap();
        assert_eq!(fuzzy_edge.prop_f64("confidence"), 0.5);
    }

    #[test]
    fn decorators_are_implicit_calls() {
        let files = vec![entry(
            "src/deco.py",
            "def wrap(f):\n    return f\n\n@wrap\ndef task():\n    pass\n",
        )];
        let graph = build(&files);

        assert!(graph
            .get_relationship("calls:function:src/deco.py:task->function:src/deco.py:wrap")
            .is_some());
    }

    #[test]
    fn unresolvable_calls_emit_nothing() {
        let files = vec![entry("src/app.py", "def run():\n    missing()\n")];
        let graph = build(&files);
        assert_eq!(graph.get_relationships_by_type(RelType::Calls).len(), 0);
    }
}
