//! PHP parser built on tree-sitter
//!
//! Extracts functions, classes, interfaces, methods, namespace use
//! declarations, calls, and inheritance.

use anyhow::Result;
use tree_sitter::{Node, Parser};

use super::{
    end_line, node_text, start_line, CallInfo, HeritageInfo, ImportInfo, LanguageParser,
    ParseResult, SymbolInfo,
};

pub struct PhpParser {
    parser: Parser,
}

impl PhpParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_php::LANGUAGE_PHP.into())?;
        Ok(PhpParser { parser })
    }
}

impl LanguageParser for PhpParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        let Some(tree) = self.parser.parse(content, None) else {
            return result;
        };
        walk(tree.root_node(), content, &mut result, "");
        result
    }
}

fn walk(node: Node, source: &str, result: &mut ParseResult, class_name: &str) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => extract_function(child, source, result, class_name),
            "class_declaration" => extract_class(child, source, result),
            "interface_declaration" => extract_interface(child, source, result),
            "method_declaration" => extract_method(child, source, result, class_name),
            "namespace_use_declaration" => extract_use(child, source, result),
            "function_call_expression" => {
                extract_call(child, source, result);
                walk(child, source, result, class_name);
            }
            "member_call_expression" => {
                extract_member_call(child, source, result);
                walk(child, source, result, class_name);
            }
            "object_creation_expression" => {
                extract_new(child, source, result);
                walk(child, source, result, class_name);
            }
            _ => walk(child, source, result, class_name),
        }
    }
}

fn push_symbol(node: Node, source: &str, result: &mut ParseResult, kind: &str, class_name: &str) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    result.symbols.push(SymbolInfo {
        name: node_text(name_node, source).to_string(),
        kind: kind.to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        signature: String::new(),
        class_name: class_name.to_string(),
        decorators: Vec::new(),
    });
}

fn extract_function(node: Node, source: &str, result: &mut ParseResult, class_name: &str) {
    push_symbol(node, source, result, "function", class_name);
}

fn extract_method(node: Node, source: &str, result: &mut ParseResult, class_name: &str) {
    push_symbol(node, source, result, "method", class_name);
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

    // `extends A` is a base_clause; `implements I, J` a
    // class_interface_clause.
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "base_clause" => collect_heritage(child, source, &class_name, "extends", result),
            "class_interface_clause" => {
                collect_heritage(child, source, &class_name, "implements", result)
            }
            _ => {}
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        walk(body, source, result, &class_name);
    }
}

fn collect_heritage(clause: Node, source: &str, child_name: &str, kind: &str, result: &mut ParseResult) {
    let mut cursor = clause.walk();
    for sub in clause.children(&mut cursor) {
        if matches!(sub.kind(), "name" | "qualified_name") {
            let parent = node_text(sub, source);
            let parent = parent.rsplit('\\').next().unwrap_or(parent);
            result.heritage.push(HeritageInfo {
                child: child_name.to_string(),
                kind: kind.to_string(),
                parent: parent.to_string(),
            });
        }
    }
}

fn extract_interface(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let interface_name = node_text(name_node, source).to_string();

    result.symbols.push(SymbolInfo {
        name: interface_name.clone(),
        kind: "interface".to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        signature: String::new(),
        class_name: String::new(),
        decorators: Vec::new(),
    });

    if let Some(body) = node.child_by_field_name("body") {
        walk(body, source, result, &interface_name);
    }
}

/// `use Namespace\Class;`: the locally bound name is the last segment.
fn extract_use(node: Node, source: &str, result: &mut ParseResult) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "namespace_use_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for sub in child.children(&mut clause_cursor) {
            if matches!(sub.kind(), "qualified_name" | "name") {
                let module = node_text(sub, source).to_string();
                let last = module.rsplit('\\').next().unwrap_or("").to_string();
                result.imports.push(ImportInfo {
                    module,
                    names: vec![last],
                    is_relative: false,
                    alias: String::new(),
                });
                break;
            }
        }
    }
}

fn extract_call(node: Node, source: &str, result: &mut ParseResult) {
    if let Some(func) = node.child_by_field_name("function") {
        result.calls.push(CallInfo {
            name: node_text(func, source).to_string(),
            line: start_line(node),
            receiver: String::new(),
            arguments: Vec::new(),
        });
    }
}

/// `$obj->method()`: the receiver keeps the bare variable name.
fn extract_member_call(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name) = node.child_by_field_name("name") else {
        return;
    };
    let receiver = node
        .child_by_field_name("object")
        .map(|o| node_text(o, source).trim_start_matches('$').to_string())
        .unwrap_or_default();
    result.calls.push(CallInfo {
        name: node_text(name, source).to_string(),
        line: start_line(node),
        receiver,
        arguments: Vec::new(),
    });
}

/// `new Foo()` modelled as a call to the class.
fn extract_new(node: Node, source: &str, result: &mut ParseResult) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "name" | "qualified_name") {
            let name = node_text(child, source);
            let name = name.rsplit('\\').next().unwrap_or(name);
            result.calls.push(CallInfo {
                name: name.to_string(),
                line: start_line(node),
                receiver: String::new(),
                arguments: Vec::new(),
            });
            break;
        }
    }
}
