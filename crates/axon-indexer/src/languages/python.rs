//! Python parser built on tree-sitter
//!
//! Extracts functions, classes, methods, imports, calls, type
//! annotations, inheritance, and `__all__` exports.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::Result;
use tree_sitter::{Node, Parser};

use super::{
    end_line, node_text, start_line, CallInfo, HeritageInfo, ImportInfo, LanguageParser,
    ParseResult, SymbolInfo, TypeRefInfo,
};

static BUILTIN_TYPES: LazyLock<BTreeSet<&'static str>> = LazyLock::new(|| {
    BTreeSet::from([
        "str", "int", "float", "bool", "None", "list", "dict", "set", "tuple", "Any",
        "Optional", "bytes", "complex", "object", "type",
    ])
});

pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        Ok(PythonParser { parser })
    }
}

impl LanguageParser for PythonParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        let Some(tree) = self.parser.parse(content, None) else {
            return result;
        };
        let root = tree.root_node();
        walk(root, content, &mut result, "");
        // Calls are collected in a single recursive sweep from the root so
        // nested scopes are not double-counted.
        extract_calls_recursive(root, content, &mut result);
        result
    }
}

/// Recursively walk the AST extracting definitions and annotations.
fn walk(node: Node, source: &str, result: &mut ParseResult, class_name: &str) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => extract_function(child, source, result, class_name),
            "class_definition" => extract_class(child, source, result),
            "import_statement" => extract_import(child, source, result),
            "import_from_statement" => extract_import_from(child, source, result),
            "decorated_definition" => extract_decorated(child, source, result, class_name),
            "expression_statement" => extract_annotations_from_expression(child, source, result),
            _ => walk(child, source, result, class_name),
        }
    }
}

fn extract_function(node: Node, source: &str, result: &mut ParseResult, class_name: &str) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let kind = if class_name.is_empty() { "function" } else { "method" };

    result.symbols.push(SymbolInfo {
        name,
        kind: kind.to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        signature: build_signature(node, source),
        class_name: class_name.to_string(),
        decorators: Vec::new(),
    });

    extract_param_types(node, source, result);

    if let Some(return_type) = node.child_by_field_name("return_type") {
        let type_name = extract_type_name(return_type, source);
        if !type_name.is_empty() && !BUILTIN_TYPES.contains(type_name.as_str()) {
            result.type_refs.push(TypeRefInfo {
                name: type_name,
                kind: "return".to_string(),
                line: start_line(return_type),
                param_name: String::new(),
            });
        }
    }

    // Nested functions and classes inside a function body are standalone
    // symbols, not methods.
    if let Some(body) = node.child_by_field_name("body") {
        walk(body, source, result, "");
    }
}

/// Build a one-line `def name(params) -> ret` signature.
fn build_signature(func_node: Node, source: &str) -> String {
    let (Some(name_node), Some(params_node)) = (
        func_node.child_by_field_name("name"),
        func_node.child_by_field_name("parameters"),
    ) else {
        return String::new();
    };

    let mut sig = format!(
        "def {}{}",
        node_text(name_node, source),
        node_text(params_node, source)
    );
    if let Some(return_type) = func_node.child_by_field_name("return_type") {
        sig.push_str(&format!(" -> {}", node_text(return_type, source)));
    }
    sig
}

/// Tree-sitter wraps decorated definitions in a `decorated_definition`
/// whose children are `decorator` nodes followed by the actual
/// function/class definition.
fn extract_decorated(node: Node, source: &str, result: &mut ParseResult, class_name: &str) {
    let mut decorators = Vec::new();
    let mut definition: Option<Node> = None;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "decorator" => {
                let dec_name = extract_decorator_name(child, source);
                if !dec_name.is_empty() {
                    decorators.push(dec_name);
                }
            }
            "function_definition" | "class_definition" => definition = Some(child),
            _ => {}
        }
    }

    let Some(definition) = definition else {
        return;
    };

    let count_before = result.symbols.len();
    if definition.kind() == "function_definition" {
        extract_function(definition, source, result, class_name);
    } else {
        extract_class(definition, source, result);
    }
    if count_before < result.symbols.len() {
        result.symbols[count_before].decorators = decorators;
    }
}

/// Decorator name at syntactic precision:
///
/// `@staticmethod` → `staticmethod`, `@app.route` → `app.route`,
/// `@server.list_tools()` → `server.list_tools`.
fn extract_decorator_name(decorator_node: Node, source: &str) -> String {
    let mut cursor = decorator_node.walk();
    for child in decorator_node.children(&mut cursor) {
        match child.kind() {
            "identifier" | "attribute" => return node_text(child, source).to_string(),
            "call" => {
                if let Some(func) = child.child_by_field_name("function") {
                    return node_text(func, source).to_string();
                }
            }
            _ => {}
        }
    }
    String::new()
}

fn extract_param_types(func_node: Node, source: &str, result: &mut ParseResult) {
    let Some(params_node) = func_node.child_by_field_name("parameters") else {
        return;
    };
    let mut cursor = params_node.walk();
    for param in params_node.children(&mut cursor) {
        if matches!(param.kind(), "typed_parameter" | "typed_default_parameter") {
            extract_typed_param(param, source, result);
        }
    }
}

fn extract_typed_param(param_node: Node, source: &str, result: &mut ParseResult) {
    let mut param_name = String::new();
    let mut cursor = param_node.walk();
    for child in param_node.children(&mut cursor) {
        if child.kind() == "identifier" {
            param_name = node_text(child, source).to_string();
            break;
        }
    }

    let Some(type_node) = param_node.child_by_field_name("type") else {
        return;
    };
    let type_name = extract_type_name(type_node, source);
    if !type_name.is_empty() && !BUILTIN_TYPES.contains(type_name.as_str()) {
        result.type_refs.push(TypeRefInfo {
            name: type_name,
            kind: "param".to_string(),
            line: start_line(type_node),
            param_name,
        });
    }
}

fn extract_class(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let class_name = node_text(name_node, source).to_string();

    result.symbols.push(SymbolInfo {
        name: class_name.clone(),
        kind: "class".to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        signature: String::new(),
        class_name: String::new(),
        decorators: Vec::new(),
    });

    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for child in superclasses.children(&mut cursor) {
            if child.is_named() && child.kind() == "identifier" {
                result.heritage.push(HeritageInfo {
                    child: class_name.clone(),
                    kind: "extends".to_string(),
                    parent: node_text(child, source).to_string(),
                });
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        walk(body, source, result, &class_name);
    }
}

/// Plain `import X` / `import X as y` statements.
fn extract_import(node: Node, source: &str, result: &mut ParseResult) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let module = node_text(child, source).to_string();
                // For `import os.path` the locally bound name is the last
                // segment; the module keeps the full dotted path.
                let last = module.rsplit('.').next().unwrap_or("").to_string();
                result.imports.push(ImportInfo {
                    module,
                    names: vec![last],
                    is_relative: false,
                    alias: String::new(),
                });
            }
            "aliased_import" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let module = node_text(name_node, source).to_string();
                let last = module.rsplit('.').next().unwrap_or("").to_string();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|a| node_text(a, source).to_string())
                    .unwrap_or_default();
                result.imports.push(ImportInfo {
                    module,
                    names: vec![last],
                    is_relative: false,
                    alias,
                });
            }
            _ => {}
        }
    }
}

/// `from X import Y, Z` statements; relative modules keep their dots.
fn extract_import_from(node: Node, source: &str, result: &mut ParseResult) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };
    let is_relative = module_node.kind() == "relative_import";
    let module = node_text(module_node, source).to_string();

    let mut names = Vec::new();
    let mut past_import = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import" {
            past_import = true;
            continue;
        }
        if past_import && child.kind() == "dotted_name" {
            names.push(node_text(child, source).to_string());
        }
    }

    result.imports.push(ImportInfo {
        module,
        names,
        is_relative,
        alias: String::new(),
    });
}

/// Variable annotations and `__all__` lists inside expression statements.
fn extract_annotations_from_expression(node: Node, source: &str, result: &mut ParseResult) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "assignment" {
            try_extract_variable_annotation(child, source, result);
            try_extract_all_exports(child, source, result);
        }
    }
}

fn try_extract_variable_annotation(assignment: Node, source: &str, result: &mut ParseResult) {
    let Some(type_node) = assignment.child_by_field_name("type") else {
        return;
    };
    let type_name = extract_type_name(type_node, source);
    if !type_name.is_empty() && !BUILTIN_TYPES.contains(type_name.as_str()) {
        result.type_refs.push(TypeRefInfo {
            name: type_name,
            kind: "variable".to_string(),
            line: start_line(type_node),
            param_name: String::new(),
        });
    }
}

/// `__all__ = [...]` or `__all__ = (...)` export lists.
fn try_extract_all_exports(assignment: Node, source: &str, result: &mut ParseResult) {
    let (Some(left), Some(right)) = (
        assignment.child_by_field_name("left"),
        assignment.child_by_field_name("right"),
    ) else {
        return;
    };
    if left.kind() != "identifier" || node_text(left, source) != "__all__" {
        return;
    }
    if !matches!(right.kind(), "list" | "tuple") {
        return;
    }

    let mut cursor = right.walk();
    for child in right.children(&mut cursor) {
        if child.kind() == "string" {
            let text = strip_quotes(node_text(child, source));
            if !text.is_empty() {
                result.exports.push(text.to_string());
            }
        }
    }
}

fn strip_quotes(text: &str) -> &str {
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if text.len() >= 2 * quote.len() && text.starts_with(quote) && text.ends_with(quote) {
            return &text[quote.len()..text.len() - quote.len()];
        }
    }
    text
}

/// Find calls plus exception references (`except E`, `raise E`), which
/// register exception classes as used.
fn extract_calls_recursive(node: Node, source: &str, result: &mut ParseResult) {
    if node.kind() == "call" {
        extract_call(node, source, result);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            extract_calls_recursive(child, source, result);
        }
        return;
    }

    if node.kind() == "except_clause" {
        extract_exception_refs(node, source, result);
    }

    if node.kind() == "raise_statement" {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "identifier" {
                result.calls.push(CallInfo {
                    name: node_text(child, source).to_string(),
                    line: start_line(child),
                    receiver: String::new(),
                    arguments: Vec::new(),
                });
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        extract_calls_recursive(child, source, result);
    }
}

/// `except E:`, `except (A, B):`, and `except E as e:` forms.
fn extract_exception_refs(node: Node, source: &str, result: &mut ParseResult) {
    let mut push = |ident: Node, result: &mut ParseResult| {
        result.calls.push(CallInfo {
            name: node_text(ident, source).to_string(),
            line: start_line(ident),
            receiver: String::new(),
            arguments: Vec::new(),
        });
    };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" => push(child, result),
            "tuple" => {
                let mut tuple_cursor = child.walk();
                for elem in child.children(&mut tuple_cursor) {
                    if elem.kind() == "identifier" {
                        push(elem, result);
                    }
                }
            }
            "as_pattern" => {
                let mut sub_cursor = child.walk();
                for sub in child.children(&mut sub_cursor) {
                    if sub.kind() == "identifier" {
                        push(sub, result);
                        break;
                    }
                    if sub.kind() == "tuple" {
                        let mut tuple_cursor = sub.walk();
                        for elem in sub.children(&mut tuple_cursor) {
                            if elem.kind() == "identifier" {
                                push(elem, result);
                            }
                        }
                        break;
                    }
                }
            }
            _ => {}
        }
    }
}

fn extract_call(call_node: Node, source: &str, result: &mut ParseResult) {
    let func_node = call_node.child_by_field_name("function").or_else(|| {
        let mut cursor = call_node.walk();
        let found = call_node.children(&mut cursor).find(|c| c.is_named());
        found
    });
    let Some(func_node) = func_node else {
        return;
    };

    let line = start_line(call_node);
    let arguments = extract_identifier_arguments(call_node, source);

    match func_node.kind() {
        "identifier" => result.calls.push(CallInfo {
            name: node_text(func_node, source).to_string(),
            line,
            receiver: String::new(),
            arguments,
        }),
        "attribute" => {
            let (name, receiver) = extract_attribute_call(func_node, source);
            result.calls.push(CallInfo {
                name,
                line,
                receiver,
                arguments,
            });
        }
        _ => {}
    }
}

/// `(method_name, receiver)` of an attribute call. For nested access like
/// `self.logger.info()` the receiver is the root identifier (`self`).
fn extract_attribute_call(attr_node: Node, source: &str) -> (String, String) {
    let mut method_name = String::new();
    let children: Vec<Node> = {
        let mut cursor = attr_node.walk();
        attr_node.children(&mut cursor).collect()
    };
    for child in children.iter().rev() {
        if child.kind() == "identifier" {
            method_name = node_text(*child, source).to_string();
            break;
        }
    }

    let receiver = match children.first() {
        Some(obj) => match obj.kind() {
            "identifier" => node_text(*obj, source).to_string(),
            "attribute" | "call" => root_identifier(*obj, source),
            _ => String::new(),
        },
        None => String::new(),
    };

    (method_name, receiver)
}

/// Bare identifier arguments: `map(transform, items)` or
/// `Depends(get_db)`. Literals and nested expressions are dropped.
fn extract_identifier_arguments(call_node: Node, source: &str) -> Vec<String> {
    let Some(args_node) = call_node.child_by_field_name("arguments") else {
        return Vec::new();
    };

    let mut identifiers = Vec::new();
    let mut cursor = args_node.walk();
    for child in args_node.children(&mut cursor) {
        match child.kind() {
            "identifier" => identifiers.push(node_text(child, source).to_string()),
            "keyword_argument" => {
                if let Some(value) = child.child_by_field_name("value") {
                    if value.kind() == "identifier" {
                        identifiers.push(node_text(value, source).to_string());
                    }
                }
            }
            _ => {}
        }
    }
    identifiers
}

/// Walk down into the leftmost identifier of an expression.
fn root_identifier(node: Node, source: &str) -> String {
    let mut current = node;
    loop {
        if current.kind() == "identifier" {
            return node_text(current, source).to_string();
        }
        match current.child(0) {
            Some(child) => current = child,
            None => return String::new(),
        }
    }
}

/// Primary type name of an annotation: `User` → `User`,
/// `list[User]` → `list`, otherwise the first identifier found by DFS.
fn extract_type_name(type_node: Node, source: &str) -> String {
    if type_node.kind() == "type" {
        if let Some(inner) = type_node.child(0) {
            if inner.kind() == "identifier" {
                return node_text(inner, source).to_string();
            }
            if inner.kind() == "generic_type" {
                let mut cursor = inner.walk();
                for child in inner.children(&mut cursor) {
                    if child.kind() == "identifier" {
                        return node_text(child, source).to_string();
                    }
                }
            }
            return find_first_identifier(inner, source);
        }
        return String::new();
    }
    if type_node.kind() == "identifier" {
        return node_text(type_node, source).to_string();
    }
    find_first_identifier(type_node, source)
}

/// DFS for the first identifier node.
fn find_first_identifier(node: Node, source: &str) -> String {
    if node.kind() == "identifier" {
        return node_text(node, source).to_string();
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let found = find_first_identifier(child, source);
        if !found.is_empty() {
            return found;
        }
    }
    String::new()
}
