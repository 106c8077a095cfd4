//! Process phase: entry points and execution flows
//!
//! Finds entry points among functions and methods, BFS-traces a flow
//! from each along `calls` edges (confidence-sorted, bounded branching,
//! depth, and total size), deduplicates overlapping flows, and writes
//! Process nodes with `step_in_process` edges.

use std::collections::{BTreeSet, VecDeque};

use axon_core::{
    generate_id, GraphNode, GraphRelationship, KnowledgeGraph, NodeLabel, RelType,
};
use tracing::{debug, info};

use crate::config::base_name;

const CALLABLE_LABELS: [NodeLabel; 2] = [NodeLabel::Function, NodeLabel::Method];

/// Hard cap on the number of nodes in a single flow.
pub const MAX_FLOW_SIZE: usize = 25;
/// Default BFS depth limit.
pub const MAX_DEPTH: usize = 6;
/// Default branching factor per expanded node.
pub const MAX_BRANCHING: usize = 3;

const PYTHON_DECORATOR_PATTERNS: [&str; 3] = ["@app.route", "@router", "@click.command"];

const ENTRY_POINT_NAMES: [&str; 6] = ["main", "cli", "run", "app", "handler", "entrypoint"];

const ENTRY_POINT_BASENAMES: [&str; 4] = ["__main__.py", "cli.py", "main.py", "app.py"];

/// Identify entry points, set `is_entry_point` on each, and return their
/// ids.
pub fn find_entry_points(graph: &mut KnowledgeGraph) -> Vec<String> {
    let mut entry_ids = Vec::new();

    for label in CALLABLE_LABELS {
        for id in graph.ids_by_label(label) {
            let Some(node) = graph.get_node(&id) else {
                continue;
            };
            if is_entry_point(node, graph) {
                entry_ids.push(id);
            }
        }
    }

    for id in &entry_ids {
        if let Some(node) = graph.get_node_mut(id) {
            node.is_entry_point = true;
        }
    }

    entry_ids
}

/// Framework patterns always qualify. Otherwise a node with no incoming
/// calls needs extra evidence (export status, a conventional name, or a
/// conventional file) before it counts as an entry point.
fn is_entry_point(node: &GraphNode, graph: &KnowledgeGraph) -> bool {
    if matches_framework_pattern(node) {
        return true;
    }

    if graph.has_incoming(&node.id, RelType::Calls) {
        return false;
    }

    if node.is_exported {
        return true;
    }
    if ENTRY_POINT_NAMES.contains(&node.name.as_str()) {
        return true;
    }
    if node.label == NodeLabel::Function
        && ENTRY_POINT_BASENAMES.contains(&base_name(&node.file_path))
    {
        return true;
    }

    false
}

fn matches_framework_pattern(node: &GraphNode) -> bool {
    let language = node.language.as_str();

    if language == "python" || language.is_empty() || node.file_path.ends_with(".py") {
        if node.name.starts_with("test_") {
            return true;
        }
        if node.name == "main" {
            return true;
        }
        for pattern in PYTHON_DECORATOR_PATTERNS {
            if node.content.contains(pattern) {
                return true;
            }
        }
    }

    if matches!(language, "typescript" | "javascript" | "")
        || node.file_path.ends_with(".ts")
        || node.file_path.ends_with(".tsx")
    {
        if node.name == "handler" || node.name == "middleware" {
            return true;
        }
        if node.is_exported {
            return true;
        }
    }

    false
}

/// BFS from an entry point along outgoing `calls` edges.
///
/// At each expanded node, outgoing edges are sorted by confidence
/// descending (ties break on edge id) and at most `max_branching` are
/// followed. Traversal stops at `max_depth`, at [`MAX_FLOW_SIZE`], or
/// when no unvisited callee remains. Each node appears at most once, so
/// cycles terminate.
pub fn trace_flow(
    entry_id: &str,
    graph: &KnowledgeGraph,
    max_depth: usize,
    max_branching: usize,
) -> Vec<String> {
    let mut visited: BTreeSet<String> = BTreeSet::new();
    visited.insert(entry_id.to_string());
    let mut flow = vec![entry_id.to_string()];
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((entry_id.to_string(), 0));

    while let Some((current_id, depth)) = queue.pop_front() {
        if flow.len() >= MAX_FLOW_SIZE {
            break;
        }
        if depth >= max_depth {
            continue;
        }

        let mut outgoing = graph.get_outgoing(&current_id, Some(RelType::Calls));
        outgoing.sort_by(|a, b| {
            b.prop_f64("confidence")
                .total_cmp(&a.prop_f64("confidence"))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut taken = 0usize;
        for rel in outgoing {
            if taken >= max_branching || flow.len() >= MAX_FLOW_SIZE {
                break;
            }
            if visited.contains(&rel.target) {
                continue;
            }
            if graph.get_node(&rel.target).is_none() {
                continue;
            }
            visited.insert(rel.target.clone());
            flow.push(rel.target.clone());
            queue.push_back((rel.target.clone(), depth + 1));
            taken += 1;
        }
    }

    flow
}

/// Drop flows that overlap a longer kept flow on more than half of their
/// nodes.
pub fn deduplicate_flows(mut flows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    flows.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut kept: Vec<Vec<String>> = Vec::new();
    let mut kept_sets: Vec<BTreeSet<String>> = Vec::new();

    for flow in flows {
        let flow_set: BTreeSet<String> = flow.iter().cloned().collect();
        let is_duplicate = kept_sets.iter().any(|kept_set| {
            if flow_set.is_empty() || kept_set.is_empty() {
                return false;
            }
            let intersection = flow_set.intersection(kept_set).count();
            let smaller = flow_set.len().min(kept_set.len());
            intersection as f64 / smaller as f64 > 0.5
        });

        if !is_duplicate {
            kept.push(flow);
            kept_sets.push(flow_set);
        }
    }
    kept
}

/// `A → B → C → D`, at most four names; a single step is just the name.
pub fn generate_process_label(graph: &KnowledgeGraph, steps: &[String]) -> String {
    let names: Vec<&str> = steps
        .iter()
        .take(4)
        .filter_map(|id| graph.get_node(id).map(|n| n.name.as_str()))
        .collect();
    names.join(" \u{2192} ")
}

/// `intra_community` when every step shares one community,
/// `cross_community` when they span several, `unknown` when none has a
/// community.
fn determine_kind(graph: &KnowledgeGraph, steps: &[String]) -> &'static str {
    let mut communities: BTreeSet<&str> = BTreeSet::new();
    let mut has_any = false;

    for step in steps {
        for rel in graph.get_outgoing(step, Some(RelType::MemberOf)) {
            has_any = true;
            communities.insert(rel.target.as_str());
        }
    }

    if !has_any {
        return "unknown";
    }
    if communities.len() <= 1 {
        return "intra_community";
    }
    "cross_community"
}

/// Detect execution flows and create Process nodes. Returns the number
/// created.
pub fn process_processes(graph: &mut KnowledgeGraph) -> usize {
    let entry_points = find_entry_points(graph);
    debug!("found {} entry points", entry_points.len());

    let flows: Vec<Vec<String>> = entry_points
        .iter()
        .map(|ep| trace_flow(ep, graph, MAX_DEPTH, MAX_BRANCHING))
        .collect();

    let flows: Vec<Vec<String>> = deduplicate_flows(flows)
        .into_iter()
        .filter(|f| f.len() > 1)
        .collect();

    let mut count = 0usize;
    for (i, steps) in flows.iter().enumerate() {
        let process_id = generate_id(NodeLabel::Process, &format!("process_{i}"), "");
        let label = generate_process_label(graph, steps);
        let kind = determine_kind(graph, steps);

        let mut process_node =
            GraphNode::new(NodeLabel::Process, &format!("process_{i}"), "", label);
        process_node.file_path = String::new();
        process_node.set_prop("step_count", steps.len());
        process_node.set_prop("kind", kind);
        graph.add_node(process_node);

        for (step_number, step) in steps.iter().enumerate() {
            graph.add_relationship(
                GraphRelationship::new(
                    format!("step:{step}->{process_id}:{step_number}"),
                    RelType::StepInProcess,
                    step.clone(),
                    process_id.clone(),
                )
                .with_prop("step_number", step_number),
            );
        }

        count += 1;
    }

    info!("created {count} process nodes");
    count
}
