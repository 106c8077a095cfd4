//! Java parser built on tree-sitter
//!
//! Extracts classes, interfaces, enums, methods, imports, method
//! invocations, constructor calls, and inheritance.

use anyhow::Result;
use tree_sitter::{Node, Parser};

use super::{
    end_line, node_text, start_line, CallInfo, HeritageInfo, ImportInfo, LanguageParser,
    ParseResult, SymbolInfo,
};

pub struct JavaParser {
    parser: Parser,
}

impl JavaParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_java::LANGUAGE.into())?;
        Ok(JavaParser { parser })
    }
}

impl LanguageParser for JavaParser {
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
            "class_declaration" => extract_class(child, source, result),
            "interface_declaration" => extract_interface(child, source, result),
            "enum_declaration" => extract_enum(child, source, result),
            "method_declaration" => extract_method(child, source, result, class_name),
            "import_declaration" => extract_import(child, source, result),
            "method_invocation" => {
                extract_call(child, source, result);
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

fn extract_method(node: Node, source: &str, result: &mut ParseResult, class_name: &str) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    result.symbols.push(SymbolInfo {
        name: node_text(name_node, source).to_string(),
        kind: "method".to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        signature: String::new(),
        class_name: class_name.to_string(),
        decorators: Vec::new(),
    });
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

    // `extends Base`: the superclass node wraps the keyword and type.
    if let Some(superclass) = node.child_by_field_name("superclass") {
        let mut cursor = superclass.walk();
        for child in superclass.children(&mut cursor) {
            if child.kind() == "type_identifier" {
                result.heritage.push(HeritageInfo {
                    child: class_name.clone(),
                    kind: "extends".to_string(),
                    parent: node_text(child, source).to_string(),
                });
            }
        }
    }

    // `implements I, J`: super_interfaces wraps a type_list.
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        collect_type_identifiers(interfaces, source, &class_name, "implements", result);
    }

    if let Some(body) = node.child_by_field_name("body") {
        walk(body, source, result, &class_name);
    }
}

fn collect_type_identifiers(
    node: Node,
    source: &str,
    child_name: &str,
    kind: &str,
    result: &mut ParseResult,
) {
    if node.kind() == "type_identifier" {
        result.heritage.push(HeritageInfo {
            child: child_name.to_string(),
            kind: kind.to_string(),
            parent: node_text(node, source).to_string(),
        });
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_type_identifiers(child, source, child_name, kind, result);
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

fn extract_enum(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    result.symbols.push(SymbolInfo {
        name: node_text(name_node, source).to_string(),
        kind: "enum".to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        content: node_text(node, source).to_string(),
        signature: String::new(),
        class_name: String::new(),
        decorators: Vec::new(),
    });
}

/// `import a.b.C;`: the locally bound name is the last segment.
fn extract_import(node: Node, source: &str, result: &mut ParseResult) {
    let text = node_text(node, source)
        .trim_start_matches("import")
        .trim_end_matches(';')
        .trim()
        .trim_start_matches("static")
        .trim()
        .to_string();
    if text.is_empty() {
        return;
    }
    let last = text.rsplit('.').next().unwrap_or("").to_string();
    result.imports.push(ImportInfo {
        module: text,
        names: vec![last],
        is_relative: false,
        alias: String::new(),
    });
}

fn extract_call(node: Node, source: &str, result: &mut ParseResult) {
    let Some(name) = node.child_by_field_name("name") else {
        return;
    };
    let receiver = node
        .child_by_field_name("object")
        .map(|o| node_text(o, source).to_string())
        .unwrap_or_default();
    result.calls.push(CallInfo {
        name: node_text(name, source).to_string(),
        line: start_line(node),
        receiver,
        arguments: Vec::new(),
    });
}

/// `new Foo(args)` modelled as a call to the class.
fn extract_new(node: Node, source: &str, result: &mut ParseResult) {
    if let Some(type_node) = node.child_by_field_name("type") {
        result.calls.push(CallInfo {
            name: node_text(type_node, source).to_string(),
            line: start_line(node),
            receiver: String::new(),
            arguments: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult {
        JavaParser::new().unwrap().parse(source, "App.java")
    }

    #[test]
    fn classes_interfaces_enums_methods() {
        let result = parse(
            "interface Runner {}\nenum Status { OPEN, CLOSED }\nclass App {\n  void start() {}\n}\n",
        );
        let kinds: Vec<(&str, &str, &str)> = result
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind.as_str(), s.class_name.as_str()))
            .collect();
        assert!(kinds.contains(&("Runner", "interface", "")));
        assert!(kinds.contains(&("Status", "enum", "")));
        assert!(kinds.contains(&("App", "class", "")));
        assert!(kinds.contains(&("start", "method", "App")));
    }

    #[test]
    fn imports_keep_last_segment() {
        let result = parse("import java.util.List;\nclass A {}\n");
        assert_eq!(result.imports[0].module, "java.util.List");
        assert_eq!(result.imports[0].names, vec!["List"]);
    }

    #[test]
    fn heritage() {
        let result = parse("class Worker extends Thread implements Runnable {}\n");
        let tuples: Vec<(&str, &str, &str)> = result
            .heritage
            .iter()
            .map(|h| (h.child.as_str(), h.kind.as_str(), h.parent.as_str()))
            .collect();
        assert!(tuples.contains(&("Worker", "extends", "Thread")));
        assert!(tuples.contains(&("Worker", "implements", "Runnable")));
    }

    #[test]
    fn invocations_and_constructors() {
        let result = parse(
            "class A {\n  void run() {\n    helper.send();\n    A other = new A();\n  }\n}\n",
        );
        let send = result.calls.iter().find(|c| c.name == "send").unwrap();
        assert_eq!(send.receiver, "helper");
        assert!(result.calls.iter().any(|c| c.name == "A"));
    }
}
