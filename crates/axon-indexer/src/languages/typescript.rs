//! TypeScript / TSX / JavaScript parser built on tree-sitter
//!
//! One parser covers all three dialects; the grammar is selected at
//! construction time. Extracts functions (including arrow functions
//! assigned to variables), classes, methods, interfaces, type aliases,
//! ES-module and `require()` imports, calls, `new` expressions, type
//! annotations, heritage, and export lists.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use anyhow::Result;
use tree_sitter::{Node, Parser};

use super::{
    end_line, node_text, start_line, CallInfo, HeritageInfo, ImportInfo, LanguageParser,
    ParseResult, SymbolInfo, TypeRefInfo,
};

static BUILTIN_TYPES: LazyLock<BTreeSet<&'static str>> = LazyLock::new(|| {
    BTreeSet::from([
        "string", "number", "boolean", "void", "any", "unknown", "never", "null",
        "undefined", "object",
    ])
});

/// Which grammar the parser was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    Tsx,
    JavaScript,
}

pub struct TypeScriptParser {
    parser: Parser,
}

impl TypeScriptParser {
    pub fn new(dialect: Dialect) -> Result<Self> {
        let language = match dialect {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT,
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX,
            Dialect::JavaScript => tree_sitter_javascript::LANGUAGE,
        };
        let mut parser = Parser::new();
        parser.set_language(&language.into())?;
        Ok(TypeScriptParser { parser })
    }
}

impl LanguageParser for TypeScriptParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        let Some(tree) = self.parser.parse(content, None) else {
            return result;
        };
        let mut visited = HashSet::new();
        walk(tree.root_node(), content, &mut result, &mut visited);
        result
    }
}

/// Walk the tree, dispatching on node kind. A visited set (keyed by node
/// id) prevents subtrees reached through both an extraction helper and
/// the generic recursion from being processed twice.
fn walk(node: Node, source: &str, result: &mut ParseResult, visited: &mut HashSet<usize>) {
    if !visited.insert(node.id()) {
        return;
    }

    match node.kind() {
        "export_statement" => extract_export(node, source, result),
        "function_declaration" => extract_function_declaration(node, source, result),
        "lexical_declaration" | "variable_declaration" => {
            extract_variable_declaration(node, source, result)
        }
        "class_declaration" => extract_class(node, source, result),
        "interface_declaration" => extract_interface(node, source, result),
        "type_alias_declaration" => extract_type_alias(node, source, result),
        "import_statement" => extract_import(node, source, result),
        "call_expression" => extract_call(node, source, result),
        "new_expression" => extract_new_expression(node, source, result),
        "expression_statement" => maybe_extract_module_exports(node, source, result),
        "method_definition" => extract_method(node, source, result),
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, result, visited);
    }
}

/// `export function foo`, `export class Bar`, `export const baz = …`,
/// and `export { name1, name2 }`.
fn extract_export(node: Node, source: &str, result: &mut ParseResult) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration"
            | "class_declaration"
            | "interface_declaration"
            | "type_alias_declaration" => {
                if let Some(name) = child.child_by_field_name("name") {
                    result.exports.push(node_text(name, source).to_string());
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut decl_cursor = child.walk();
                for sub in child.children(&mut decl_cursor) {
                    if sub.kind() == "variable_declarator" {
                        if let Some(name) = sub.child_by_field_name("name") {
                            result.exports.push(node_text(name, source).to_string());
                        }
                    }
                }
            }
            "export_clause" => {
                let mut clause_cursor = child.walk();
                for spec in child.children(&mut clause_cursor) {
                    if spec.kind() == "export_specifier" {
                        if let Some(name) = spec.child_by_field_name("name") {
                            result.exports.push(node_text(name, source).to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// `module.exports = X` and `module.exports = { A, B }`.
fn maybe_extract_module_exports(node: Node, source: &str, result: &mut ParseResult) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "assignment_expression" {
            continue;
        }
        let (Some(left), Some(right)) = (
            child.child_by_field_name("left"),
            child.child_by_field_name("right"),
        ) else {
            continue;
        };

        let left_text = node_text(left, source);
        if left_text != "module.exports" && left_text != "exports" {
            continue;
        }

        match right.kind() {
            "identifier" => result.exports.push(node_text(right, source).to_string()),
            "object" => {
                let mut obj_cursor = right.walk();
                for prop in right.children(&mut obj_cursor) {
                    match prop.kind() {
                        "shorthand_property_identifier" => {
                            result.exports.push(node_text(prop, source).to_string());
                        }
                        "pair" => {
                            if let Some(key) = prop.child_by_field_name("key") {
                                result.exports.push(node_text(key, source).to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

fn extract_function_declaration(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();

    result.symbols.push(SymbolInfo {
        signature: build_function_signature(node, source, &name),
        name,
        kind: "function".to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        class_name: String::new(),
        decorators: Vec::new(),
    });

    extract_function_types(node, source, result);
}

fn extract_method(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let class_name = find_parent_class_name(node, source);

    result.symbols.push(SymbolInfo {
        signature: build_function_signature(node, source, &name),
        name,
        kind: "method".to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        class_name,
        decorators: Vec::new(),
    });

    extract_function_types(node, source, result);
}

/// Arrow functions, function expressions, and `require()` bindings.
fn extract_variable_declaration(node: Node, source: &str, result: &mut ParseResult) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "variable_declarator" {
            continue;
        }
        let (Some(name_node), Some(value_node)) = (
            child.child_by_field_name("name"),
            child.child_by_field_name("value"),
        ) else {
            continue;
        };

        let var_name = node_text(name_node, source).to_string();
        match value_node.kind() {
            "arrow_function" | "function_expression" => {
                extract_assigned_function(child, &var_name, value_node, source, result);
            }
            "call_expression" => {
                maybe_extract_require(&var_name, value_node, source, result);
            }
            _ => {}
        }

        extract_variable_type_annotation(child, source, result);
    }
}

/// An arrow function or function expression assigned to a variable.
fn extract_assigned_function(
    declarator: Node,
    name: &str,
    func_node: Node,
    source: &str,
    result: &mut ParseResult,
) {
    let outer = declarator.parent().unwrap_or(declarator);

    result.symbols.push(SymbolInfo {
        name: name.to_string(),
        kind: "function".to_string(),
        start_line: start_line(outer),
        end_line: end_line(outer),
        content: node_text(outer, source).to_string(),
        signature: build_function_signature(func_node, source, name),
        class_name: String::new(),
        decorators: Vec::new(),
    });

    extract_function_types(func_node, source, result);
}

/// `const foo = require('./foo')` becomes an import.
fn maybe_extract_require(var_name: &str, call_node: Node, source: &str, result: &mut ParseResult) {
    let Some(func_node) = call_node.child_by_field_name("function") else {
        return;
    };
    if node_text(func_node, source) != "require" {
        return;
    }
    let Some(args) = call_node.child_by_field_name("arguments") else {
        return;
    };

    let mut module = String::new();
    let mut cursor = args.walk();
    for arg in args.children(&mut cursor) {
        if arg.kind() == "string" {
            module = string_value(arg, source);
            break;
        }
    }
    if module.is_empty() {
        return;
    }

    result.imports.push(ImportInfo {
        is_relative: module.starts_with('.'),
        module,
        names: vec![var_name.to_string()],
        alias: String::new(),
    });
}

fn extract_class(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();

    result.symbols.push(SymbolInfo {
        name: name.clone(),
        kind: "class".to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        signature: String::new(),
        class_name: String::new(),
        decorators: Vec::new(),
    });

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "class_heritage" {
            extract_class_heritage(&name, child, source, result);
        }
    }
}

fn extract_class_heritage(class_name: &str, heritage: Node, source: &str, result: &mut ParseResult) {
    let mut cursor = heritage.walk();
    for child in heritage.children(&mut cursor) {
        let kind = match child.kind() {
            "extends_clause" => "extends",
            "implements_clause" => "implements",
            _ => continue,
        };
        let mut clause_cursor = child.walk();
        for sub in child.children(&mut clause_cursor) {
            if matches!(sub.kind(), "identifier" | "type_identifier") {
                result.heritage.push(HeritageInfo {
                    child: class_name.to_string(),
                    kind: kind.to_string(),
                    parent: node_text(sub, source).to_string(),
                });
            }
        }
    }
}

fn extract_interface(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();

    result.symbols.push(SymbolInfo {
        name: name.clone(),
        kind: "interface".to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        signature: String::new(),
        class_name: String::new(),
        decorators: Vec::new(),
    });

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "extends_type_clause" {
            let mut clause_cursor = child.walk();
            for sub in child.children(&mut clause_cursor) {
                if matches!(sub.kind(), "identifier" | "type_identifier") {
                    result.heritage.push(HeritageInfo {
                        child: name.clone(),
                        kind: "extends".to_string(),
                        parent: node_text(sub, source).to_string(),
                    });
                }
            }
        }
    }
}

fn extract_type_alias(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };

    result.symbols.push(SymbolInfo {
        name: node_text(name_node, source).to_string(),
        kind: "type_alias".to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        signature: String::new(),
        class_name: String::new(),
        decorators: Vec::new(),
    });
}

/// ES module import statements in all three clause shapes.
fn extract_import(node: Node, source: &str, result: &mut ParseResult) {
    let mut module = node
        .child_by_field_name("source")
        .map(|s| string_value(s, source))
        .unwrap_or_default();
    if module.is_empty() {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "string" {
                module = string_value(child, source);
                break;
            }
        }
    }
    if module.is_empty() {
        return;
    }

    let mut names = Vec::new();
    let mut alias = String::new();

    let import_clause = {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).find(|c| c.kind() == "import_clause");
        found
    };
    if let Some(clause) = import_clause {
        let mut clause_cursor = clause.walk();
        for clause_child in clause.children(&mut clause_cursor) {
            match clause_child.kind() {
                // import { A, B } from '…'
                "named_imports" => {
                    let mut spec_cursor = clause_child.walk();
                    for spec in clause_child.children(&mut spec_cursor) {
                        if spec.kind() == "import_specifier" {
                            if let Some(name) = spec.child_by_field_name("name") {
                                names.push(node_text(name, source).to_string());
                            }
                        }
                    }
                }
                // import * as utils from '…'
                "namespace_import" => {
                    let mut ns_cursor = clause_child.walk();
                    for ns_child in clause_child.children(&mut ns_cursor) {
                        if ns_child.kind() == "identifier" {
                            alias = node_text(ns_child, source).to_string();
                            names.push(alias.clone());
                            break;
                        }
                    }
                }
                // import Foo from '…'
                "identifier" => names.push(node_text(clause_child, source).to_string()),
                _ => {}
            }
        }
    }

    result.imports.push(ImportInfo {
        is_relative: module.starts_with('.'),
        module,
        names,
        alias,
    });
}

fn extract_call(node: Node, source: &str, result: &mut ParseResult) {
    let Some(func_node) = node.child_by_field_name("function") else {
        return;
    };
    let line = start_line(node);
    let arguments = extract_identifier_arguments(node, source);

    match func_node.kind() {
        "member_expression" => {
            let obj = func_node.child_by_field_name("object");
            let Some(prop) = func_node.child_by_field_name("property") else {
                return;
            };
            result.calls.push(CallInfo {
                name: node_text(prop, source).to_string(),
                line,
                receiver: obj.map(|o| receiver_root(o, source)).unwrap_or_default(),
                arguments,
            });
        }
        "identifier" => {
            let name = node_text(func_node, source);
            // require() is modelled as an import, not a call.
            if name != "require" {
                result.calls.push(CallInfo {
                    name: name.to_string(),
                    line,
                    receiver: String::new(),
                    arguments,
                });
            }
        }
        _ => {}
    }
}

/// `new ClassName(args)` is modelled as a call targeting the class.
fn extract_new_expression(node: Node, source: &str, result: &mut ParseResult) {
    let Some(constructor) = node.child_by_field_name("constructor") else {
        return;
    };
    let line = start_line(node);
    let arguments = extract_identifier_arguments(node, source);

    match constructor.kind() {
        "identifier" => result.calls.push(CallInfo {
            name: node_text(constructor, source).to_string(),
            line,
            receiver: String::new(),
            arguments,
        }),
        "member_expression" => {
            let obj = constructor.child_by_field_name("object");
            if let Some(prop) = constructor.child_by_field_name("property") {
                result.calls.push(CallInfo {
                    name: node_text(prop, source).to_string(),
                    line,
                    receiver: obj.map(|o| receiver_root(o, source)).unwrap_or_default(),
                    arguments,
                });
            }
        }
        _ => {}
    }
}

/// Root identifier of a receiver chain: `this.store.db` → `this`.
fn receiver_root(node: Node, source: &str) -> String {
    let mut current = node;
    loop {
        match current.kind() {
            "identifier" | "this" => return node_text(current, source).to_string(),
            _ => match current.child(0) {
                Some(child) => current = child,
                None => return node_text(node, source).to_string(),
            },
        }
    }
}

fn extract_identifier_arguments(call_node: Node, source: &str) -> Vec<String> {
    let Some(args_node) = call_node.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut identifiers = Vec::new();
    let mut cursor = args_node.walk();
    for child in args_node.children(&mut cursor) {
        if child.kind() == "identifier" {
            identifiers.push(node_text(child, source).to_string());
        }
    }
    identifiers
}

/// Parameter and return type annotations from a function-like node.
fn extract_function_types(func_node: Node, source: &str, result: &mut ParseResult) {
    let params = func_node.child_by_field_name("parameters").or_else(|| {
        let mut cursor = func_node.walk();
        let found = func_node
            .children(&mut cursor)
            .find(|c| c.kind() == "formal_parameters");
        found
    });

    if let Some(params) = params {
        let mut cursor = params.walk();
        for param in params.children(&mut cursor) {
            if !matches!(param.kind(), "required_parameter" | "optional_parameter") {
                continue;
            }
            let param_name_node = param.child_by_field_name("pattern").or_else(|| {
                let mut sub_cursor = param.walk();
                let found = param
                    .children(&mut sub_cursor)
                    .find(|c| c.kind() == "identifier");
                found
            });
            let Some(param_name_node) = param_name_node else {
                continue;
            };
            let param_name = node_text(param_name_node, source).to_string();

            let mut sub_cursor = param.walk();
            for sub in param.children(&mut sub_cursor) {
                if sub.kind() == "type_annotation" {
                    let type_name = type_annotation_name(sub, source);
                    if !type_name.is_empty()
                        && !BUILTIN_TYPES.contains(type_name.to_lowercase().as_str())
                    {
                        result.type_refs.push(TypeRefInfo {
                            name: type_name,
                            kind: "param".to_string(),
                            line: start_line(sub),
                            param_name: param_name.clone(),
                        });
                    }
                }
            }
        }
    }

    // Return type: a type_annotation directly on the function node.
    let mut cursor = func_node.walk();
    for child in func_node.children(&mut cursor) {
        if child.kind() == "type_annotation" {
            let type_name = type_annotation_name(child, source);
            if !type_name.is_empty() && !BUILTIN_TYPES.contains(type_name.to_lowercase().as_str()) {
                result.type_refs.push(TypeRefInfo {
                    name: type_name,
                    kind: "return".to_string(),
                    line: start_line(child),
                    param_name: String::new(),
                });
            }
        }
    }
}

/// `const x: Config = …`.
fn extract_variable_type_annotation(declarator: Node, source: &str, result: &mut ParseResult) {
    let mut cursor = declarator.walk();
    for child in declarator.children(&mut cursor) {
        if child.kind() == "type_annotation" {
            let type_name = type_annotation_name(child, source);
            if !type_name.is_empty() && !BUILTIN_TYPES.contains(type_name.to_lowercase().as_str()) {
                result.type_refs.push(TypeRefInfo {
                    name: type_name,
                    kind: "variable".to_string(),
                    line: start_line(child),
                    param_name: String::new(),
                });
            }
        }
    }
}

/// Simple type name of a `type_annotation`: the first
/// `type_identifier` / `predefined_type` / `identifier` child, which for
/// compound types (unions, generics) is the outer constructor.
fn type_annotation_name(annotation: Node, source: &str) -> String {
    let mut cursor = annotation.walk();
    for child in annotation.children(&mut cursor) {
        match child.kind() {
            "type_identifier" | "predefined_type" | "identifier" => {
                return node_text(child, source).to_string();
            }
            "generic_type" => {
                let mut generic_cursor = child.walk();
                for sub in child.children(&mut generic_cursor) {
                    if sub.kind() == "type_identifier" {
                        return node_text(sub, source).to_string();
                    }
                }
            }
            _ => {}
        }
    }
    String::new()
}

/// Raw value of a tree-sitter `string` node (quotes stripped).
fn string_value(string_node: Node, source: &str) -> String {
    let mut cursor = string_node.walk();
    for child in string_node.children(&mut cursor) {
        if child.kind() == "string_fragment" {
            return node_text(child, source).to_string();
        }
    }
    let text = node_text(string_node, source);
    if text.len() >= 2 {
        let bytes = text.as_bytes();
        if matches!(bytes[0], b'\'' | b'"' | b'`') && bytes[0] == bytes[text.len() - 1] {
            return text[1..text.len() - 1].to_string();
        }
    }
    text.to_string()
}

/// One-line `name(params): Ret` signature.
fn build_function_signature(node: Node, source: &str, name: &str) -> String {
    let mut params_text = "";
    let mut return_type = "";

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "formal_parameters" => params_text = node_text(child, source),
            "type_annotation" => return_type = node_text(child, source),
            _ => {}
        }
    }

    let mut sig = format!("{name}{params_text}");
    sig.push_str(return_type);
    sig
}

/// Walk up to the enclosing class declaration's name.
fn find_parent_class_name(node: Node, source: &str) -> String {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "class_declaration" {
            if let Some(name) = parent.child_by_field_name("name") {
                return node_text(name, source).to_string();
            }
        }
        current = parent.parent();
    }
    String::new()
}
