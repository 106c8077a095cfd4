//! Import resolution phase: IMPORTS edges between File nodes
//!
//! Resolves each parsed import to a File node via language-specific path
//! rules. External modules (not in the file index) simply produce no
//! edge.

use std::collections::{BTreeMap, BTreeSet};

use axon_core::{generate_id, GraphRelationship, KnowledgeGraph, NodeLabel, RelType};

use crate::config::parent_dir;
use crate::languages::ImportInfo;
use crate::parsing::FileParseData;

const JS_TS_EXTENSIONS: [&str; 4] = [".ts", ".js", ".tsx", ".jsx"];

/// Map every File node's path to its node id.
pub fn build_file_index(graph: &KnowledgeGraph) -> BTreeMap<String, String> {
    graph
        .get_nodes_by_label(NodeLabel::File)
        .into_iter()
        .map(|n| (n.file_path.clone(), n.id.clone()))
        .collect()
}

/// Resolve an import statement to the target file's node id, or `None`
/// for external/unresolvable imports.
pub fn resolve_import_path(
    importing_file: &str,
    import: &ImportInfo,
    file_index: &BTreeMap<String, String>,
) -> Option<String> {
    if importing_file.ends_with(".py") {
        return resolve_python(importing_file, import, file_index);
    }
    if JS_TS_EXTENSIONS.iter().any(|ext| importing_file.ends_with(ext)) {
        return resolve_js_ts(importing_file, import, file_index);
    }
    None
}

/// Resolve imports and create IMPORTS relationships.
///
/// Duplicate `(importer, target)` pairs collapse to a single edge whose
/// `symbols` property carries the comma-joined imported names.
pub fn process_imports(parse_data: &[FileParseData], graph: &mut KnowledgeGraph) {
    let file_index = build_file_index(graph);
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

    for fpd in parse_data {
        let source_file_id = generate_id(NodeLabel::File, &fpd.file_path, "");

        for import in &fpd.parse_result.imports {
            let Some(target_id) = resolve_import_path(&fpd.file_path, import, &file_index) else {
                continue;
            };

            let pair = (source_file_id.clone(), target_id.clone());
            if !seen.insert(pair) {
                continue;
            }

            graph.add_relationship(
                GraphRelationship::new(
                    format!("imports:{source_file_id}->{target_id}"),
                    RelType::Imports,
                    source_file_id.clone(),
                    target_id,
                )
                .with_prop("symbols", import.names.join(",")),
            );
        }
    }
}

fn resolve_python(
    importing_file: &str,
    import: &ImportInfo,
    file_index: &BTreeMap<String, String>,
) -> Option<String> {
    if import.is_relative {
        resolve_python_relative(importing_file, import, file_index)
    } else {
        resolve_python_absolute(import, file_index)
    }
}

/// `from .utils import helper` → same directory; each extra dot walks one
/// directory further up from the importing file's parent.
fn resolve_python_relative(
    importing_file: &str,
    import: &ImportInfo,
    file_index: &BTreeMap<String, String>,
) -> Option<String> {
    let module = import.module.as_str();
    let dot_count = module.chars().take_while(|c| *c == '.').count();
    let remainder = &module[dot_count..];

    let mut base = parent_dir(importing_file).to_string();
    for _ in 1..dot_count {
        base = parent_dir(&base).to_string();
    }

    let target = if remainder.is_empty() {
        base
    } else {
        let segments = remainder.split('.').collect::<Vec<_>>().join("/");
        if base.is_empty() {
            segments
        } else {
            format!("{base}/{segments}")
        }
    };

    try_python_paths(&target, file_index)
}

/// `from mypackage.auth import validate` → dotted path rooted at the
/// repository.
fn resolve_python_absolute(
    import: &ImportInfo,
    file_index: &BTreeMap<String, String>,
) -> Option<String> {
    let target = import.module.split('.').collect::<Vec<_>>().join("/");
    try_python_paths(&target, file_index)
}

/// Module file first, then package init.
fn try_python_paths(base_path: &str, file_index: &BTreeMap<String, String>) -> Option<String> {
    let candidates = [format!("{base_path}.py"), format!("{base_path}/__init__.py")];
    candidates
        .iter()
        .find_map(|candidate| file_index.get(candidate).cloned())
}

/// Relative JS/TS specifiers resolve against the importer's directory;
/// bare specifiers are external.
fn resolve_js_ts(
    importing_file: &str,
    import: &ImportInfo,
    file_index: &BTreeMap<String, String>,
) -> Option<String> {
    if !import.module.starts_with('.') {
        return None;
    }

    let base = parent_dir(importing_file);
    let joined = if base.is_empty() {
        import.module.clone()
    } else {
        format!("{base}/{}", import.module)
    };
    let resolved = normalize_segments(&joined);

    try_js_ts_paths(&resolved, file_index)
}

/// Exact match, then each known extension, then `/index` + extension.
fn try_js_ts_paths(base_path: &str, file_index: &BTreeMap<String, String>) -> Option<String> {
    if let Some(id) = file_index.get(base_path) {
        return Some(id.clone());
    }
    for ext in JS_TS_EXTENSIONS {
        if let Some(id) = file_index.get(&format!("{base_path}{ext}")) {
            return Some(id.clone());
        }
    }
    for ext in JS_TS_EXTENSIONS {
        if let Some(id) = file_index.get(&format!("{base_path}/index{ext}")) {
            return Some(id.clone());
        }
    }
    None
}

/// Collapse `.` and `..` segments of a forward-slash path.
fn normalize_segments(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::process_structure;
    use crate::walker::FileEntry;

    fn import(module: &str, names: &[&str], is_relative: bool) -> ImportInfo {
        ImportInfo {
            module: module.to_string(),
            names: names.iter().map(|s| s.to_string()).collect(),
            is_relative,
            alias: String::new(),
        }
    }

    fn index(paths: &[&str]) -> BTreeMap<String, String> {
        paths
            .iter()
            .map(|p| {
                (
                    p.to_string(),
                    generate_id(NodeLabel::File, p, ""),
                )
            })
            .collect()
    }

    #[test]
    fn python_relative_single_dot() {
        let idx = index(&["src/auth/helpers.py", "src/auth/validate.py"]);
        let resolved = resolve_import_path(
            "src/auth/validate.py",
            &import(".helpers", &["hash"], true),
            &idx,
        );
        assert_eq!(resolved, Some("file:src/auth/helpers.py:".to_string()));
    }

    #[test]
    fn python_relative_double_dot() {
        let idx = index(&["src/models.py", "src/auth/validate.py"]);
        let resolved = resolve_import_path(
            "src/auth/validate.py",
            &import("..models", &["User"], true),
            &idx,
        );
        assert_eq!(resolved, Some("file:src/models.py:".to_string()));
    }

    #[test]
    fn python_absolute_package_init() {
        let idx = index(&["mypkg/auth/__init__.py"]);
        let resolved =
            resolve_import_path("main.py", &import("mypkg.auth", &["validate"], false), &idx);
        assert_eq!(resolved, Some("file:mypkg/auth/__init__.py:".to_string()));
    }

    #[test]
    fn python_external_returns_none() {
        let idx = index(&["src/app.py"]);
        assert_eq!(
            resolve_import_path("src/app.py", &import("requests", &["get"], false), &idx),
            None
        );
    }

    #[test]
    fn js_relative_extension_fallback() {
        let idx = index(&["src/util.ts", "src/lib/index.tsx"]);
        assert_eq!(
            resolve_import_path("src/app.ts", &import("./util", &["u"], true), &idx),
            Some("file:src/util.ts:".to_string())
        );
        assert_eq!(
            resolve_import_path("src/app.ts", &import("./lib", &["l"], true), &idx),
            Some("file:src/lib/index.tsx:".to_string())
        );
    }

    #[test]
    fn js_bare_specifier_is_external() {
        let idx = index(&["src/app.ts"]);
        assert_eq!(
            resolve_import_path("src/app.ts", &import("express", &[], false), &idx),
            None
        );
    }

    #[test]
    fn duplicate_pairs_collapse() {
        let files = vec![
            FileEntry {
                path: "src/app.py".to_string(),
                content: "x".to_string(),
                language: "python".to_string(),
            },
            FileEntry {
                path: "src/auth.py".to_string(),
                content: "y".to_string(),
                language: "python".to_string(),
            },
        ];
        let mut graph = KnowledgeGraph::new();
        process_structure(&files, &mut graph);

        let parse_data = vec![FileParseData {
            file_path: "src/app.py".to_string(),
            language: "python".to_string(),
            parse_result: crate::languages::ParseResult {
                imports: vec![
                    import(".auth", &["validate"], true),
                    import(".auth", &["hash_password"], true),
                ],
                ..Default::default()
            },
        }];

        process_imports(&parse_data, &mut graph);
        assert_eq!(
            graph.get_relationships_by_type(RelType::Imports).len(),
            1
        );
        let rel = graph
            .get_relationship("imports:file:src/app.py:->file:src/auth.py:")
            .unwrap();
        assert_eq!(rel.prop_str("symbols"), "validate");
    }
}
