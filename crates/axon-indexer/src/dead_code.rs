//! Dead code phase: flag unreachable symbols
//!
//! A symbol is flagged dead only when it has no incoming `calls` edge
//! and none of the exemptions apply (entry point, exported, constructor,
//! test code, dunder, type-referenced class, framework decorator,
//! property, typing stub, enum class, public package-init symbol).
//! Three suppression passes then clear false positives: overrides of
//! live base methods, structural protocol conformance, and protocol
//! stubs themselves.

use std::collections::{BTreeMap, BTreeSet};

use axon_core::{GraphNode, KnowledgeGraph, NodeLabel, RelType};
use tracing::debug;

const SYMBOL_LABELS: [NodeLabel; 3] = [NodeLabel::Function, NodeLabel::Method, NodeLabel::Class];

const CONSTRUCTOR_NAMES: [&str; 2] = ["__init__", "__new__"];

/// Functools wrappers that look like dotted framework decorators but are
/// not registration points.
const NON_FRAMEWORK_DECORATORS: [&str; 4] = [
    "functools.wraps",
    "functools.lru_cache",
    "functools.cached_property",
    "functools.cache",
];

/// Bare decorator names that register a callable with a framework.
const FRAMEWORK_DECORATOR_NAMES: [&str; 18] = [
    "task",
    "shared_task",
    "periodic_task",
    "job",
    "receiver",
    "on_event",
    "handler",
    "validator",
    "field_validator",
    "root_validator",
    "model_validator",
    "contextmanager",
    "asynccontextmanager",
    "fixture",
    "route",
    "endpoint",
    "command",
    "hybrid_property",
];

const TYPING_STUB_DECORATORS: [&str; 4] = [
    "overload",
    "typing.overload",
    "abstractmethod",
    "abc.abstractmethod",
];

const ENUM_BASES: [&str; 5] = ["Enum", "IntEnum", "StrEnum", "Flag", "IntFlag"];

/// Pytest-style class convention: `Test` followed by an uppercase letter.
fn is_test_class(name: &str) -> bool {
    name.len() > 4
        && name.starts_with("Test")
        && name.chars().nth(4).is_some_and(|c| c.is_uppercase())
}

fn is_test_file(file_path: &str) -> bool {
    file_path.contains("/tests/")
        || file_path.contains("/test_")
        || file_path.ends_with("conftest.py")
}

fn is_dunder(name: &str) -> bool {
    name.starts_with("__") && name.ends_with("__") && name.len() > 4
}

/// Classes referenced via type annotations are in use even without
/// calls. Restricted to classes; a function used only in an annotation
/// is legitimately unused.
fn is_type_referenced(graph: &KnowledgeGraph, node_id: &str, label: NodeLabel) -> bool {
    label == NodeLabel::Class && graph.has_incoming(node_id, RelType::UsesType)
}

fn has_framework_decorator(node: &GraphNode) -> bool {
    node.prop_str_list("decorators").iter().any(|dec| {
        FRAMEWORK_DECORATOR_NAMES.contains(dec)
            || (dec.contains('.') && !NON_FRAMEWORK_DECORATORS.contains(dec))
    })
}

/// `@property` methods are read as attributes, never called.
fn has_property_decorator(node: &GraphNode) -> bool {
    node.prop_str_list("decorators").contains(&"property")
}

fn has_typing_stub_decorator(node: &GraphNode) -> bool {
    node.prop_str_list("decorators")
        .iter()
        .any(|dec| TYPING_STUB_DECORATORS.contains(dec))
}

/// Enum members are accessed via dot, not by calling the class.
fn is_enum_class(node: &GraphNode, label: NodeLabel) -> bool {
    label == NodeLabel::Class
        && node
            .prop_str_list("bases")
            .iter()
            .any(|base| ENUM_BASES.contains(base))
}

fn is_public_package_init_symbol(name: &str, file_path: &str) -> bool {
    file_path.ends_with("__init__.py") && !name.starts_with('_')
}

fn is_exempt(node: &GraphNode) -> bool {
    node.is_entry_point
        || node.is_exported
        || CONSTRUCTOR_NAMES.contains(&node.name.as_str())
        || node.name.starts_with("test_")
        || is_test_class(&node.name)
        || is_test_file(&node.file_path)
        || is_dunder(&node.name)
        || is_public_package_init_symbol(&node.name, &node.file_path)
}

/// Un-flag methods that override a non-dead method on a parent class.
///
/// When `A extends B` and `B.method` is called, `A.method` has zero
/// incoming calls through dynamic dispatch; clear it.
fn clear_override_false_positives(graph: &mut KnowledgeGraph) -> usize {
    let mut alive_by_class: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for method in graph.get_nodes_by_label(NodeLabel::Method) {
        if !method.is_dead && !method.class_name.is_empty() {
            alive_by_class
                .entry(method.class_name.clone())
                .or_default()
                .insert(method.name.clone());
        }
    }

    let mut child_to_parents: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for rel in graph.get_relationships_by_type(RelType::Extends) {
        if let (Some(child), Some(parent)) =
            (graph.get_node(&rel.source), graph.get_node(&rel.target))
        {
            child_to_parents
                .entry(child.name.clone())
                .or_default()
                .push(parent.name.clone());
        }
    }

    let mut to_clear = Vec::new();
    for method in graph.get_nodes_by_label(NodeLabel::Method) {
        if !method.is_dead || method.class_name.is_empty() {
            continue;
        }
        let parents = child_to_parents.get(&method.class_name);
        let overrides_live = parents.is_some_and(|parents| {
            parents.iter().any(|parent| {
                alive_by_class
                    .get(parent)
                    .is_some_and(|alive| alive.contains(&method.name))
            })
        });
        if overrides_live {
            to_clear.push(method.id.clone());
        }
    }

    for id in &to_clear {
        if let Some(node) = graph.get_node_mut(id) {
            node.is_dead = false;
            debug!("un-flagged override: {}.{}", node.class_name, node.name);
        }
    }
    to_clear.len()
}

/// Un-flag methods on classes that structurally conform to a protocol.
///
/// Calls resolve to the protocol's stubs, so a conforming concrete
/// class's methods get flagged; any class whose method set is a superset
/// of a protocol's non-dunder interface has those methods cleared.
fn clear_protocol_conformance_false_positives(graph: &mut KnowledgeGraph) -> usize {
    let mut class_methods: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for method in graph.get_nodes_by_label(NodeLabel::Method) {
        if !method.class_name.is_empty() {
            class_methods
                .entry(method.class_name.clone())
                .or_default()
                .insert(method.name.clone());
        }
    }

    let mut protocol_methods: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for class_node in graph.get_nodes_by_label(NodeLabel::Class) {
        if !class_node.prop_bool("is_protocol") {
            continue;
        }
        let methods: BTreeSet<String> = class_methods
            .get(&class_node.name)
            .map(|methods| {
                methods
                    .iter()
                    .filter(|name| !is_dunder(name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if !methods.is_empty() {
            protocol_methods.insert(class_node.name.clone(), methods);
        }
    }
    if protocol_methods.is_empty() {
        return 0;
    }

    let mut clearable: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (proto_name, required) in &protocol_methods {
        for (class_name, methods) in &class_methods {
            if class_name == proto_name {
                continue;
            }
            if required.is_subset(methods) {
                clearable
                    .entry(class_name.clone())
                    .or_default()
                    .extend(required.iter().cloned());
            }
        }
    }
    if clearable.is_empty() {
        return 0;
    }

    let mut to_clear = Vec::new();
    for method in graph.get_nodes_by_label(NodeLabel::Method) {
        if !method.is_dead || method.class_name.is_empty() {
            continue;
        }
        if clearable
            .get(&method.class_name)
            .is_some_and(|names| names.contains(&method.name))
        {
            to_clear.push(method.id.clone());
        }
    }

    for id in &to_clear {
        if let Some(node) = graph.get_node_mut(id) {
            node.is_dead = false;
            debug!(
                "un-flagged protocol conformance: {}.{}",
                node.class_name, node.name
            );
        }
    }
    to_clear.len()
}

/// Un-flag every method on a protocol class: stubs define the contract
/// and are never called directly.
fn clear_protocol_stub_false_positives(graph: &mut KnowledgeGraph) -> usize {
    let protocol_class_names: BTreeSet<String> = graph
        .get_nodes_by_label(NodeLabel::Class)
        .into_iter()
        .filter(|c| c.prop_bool("is_protocol"))
        .map(|c| c.name.clone())
        .collect();
    if protocol_class_names.is_empty() {
        return 0;
    }

    let mut to_clear = Vec::new();
    for method in graph.get_nodes_by_label(NodeLabel::Method) {
        if method.is_dead && protocol_class_names.contains(&method.class_name) {
            to_clear.push(method.id.clone());
        }
    }

    for id in &to_clear {
        if let Some(node) = graph.get_node_mut(id) {
            node.is_dead = false;
            debug!("un-flagged protocol stub: {}.{}", node.class_name, node.name);
        }
    }
    to_clear.len()
}

/// Flag unreachable symbols. Returns the net dead count after the
/// suppression passes.
pub fn process_dead_code(graph: &mut KnowledgeGraph) -> usize {
    let mut to_flag = Vec::new();

    for label in SYMBOL_LABELS {
        for id in graph.ids_by_label(label) {
            let Some(node) = graph.get_node(&id) else {
                continue;
            };
            if is_exempt(node) {
                continue;
            }
            if graph.has_incoming(&id, RelType::Calls) {
                continue;
            }
            if is_type_referenced(graph, &id, label) {
                continue;
            }
            if has_framework_decorator(node) {
                continue;
            }
            if has_property_decorator(node) {
                continue;
            }
            if has_typing_stub_decorator(node) {
                continue;
            }
            if is_enum_class(node, label) {
                continue;
            }
            to_flag.push(id);
        }
    }

    let mut dead_count = to_flag.len();
    for id in &to_flag {
        if let Some(node) = graph.get_node_mut(id) {
            node.is_dead = true;
            debug!("dead symbol: {} ({})", node.name, node.id);
        }
    }

    dead_count -= clear_override_false_positives(graph);
    dead_count -= clear_protocol_conformance_false_positives(graph);
    dead_count -= clear_protocol_stub_false_positives(graph);

    dead_count
}
