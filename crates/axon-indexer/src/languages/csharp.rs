//! C# parser built on tree-sitter
//!
//! Extracts classes, interfaces, enums, methods, using directives,
//! invocations, constructor calls, and base lists.

use anyhow::Result;
use tree_sitter::{Node, Parser};

use super::{
    end_line, node_text, start_line, CallInfo, HeritageInfo, ImportInfo, LanguageParser,
    ParseResult, SymbolInfo,
};

pub struct CSharpParser {
    parser: Parser,
}

impl CSharpParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_c_sharp::LANGUAGE.into())?;
        Ok(CSharpParser { parser })
    }
}

impl LanguageParser for CSharpParser {
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
            "using_directive" => extract_using(child, source, result),
            "invocation_expression" => {
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

    // `class C : Base, IThing`: C# does not distinguish extends from
    // implements syntactically, so every base registers as extends.
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "base_list" {
            let mut base_cursor = child.walk();
            for base in child.children(&mut base_cursor) {
                if matches!(base.kind(), "identifier" | "qualified_name" | "generic_name") {
                    let parent = node_text(base, source);
                    let parent = parent.rsplit('.').next().unwrap_or(parent);
                    let parent = parent.split('<').next().unwrap_or(parent);
                    result.heritage.push(HeritageInfo {
                        child: class_name.clone(),
                        kind: "extends".to_string(),
                        parent: parent.to_string(),
                    });
                }
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        walk(body, source, result, &class_name);
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

/// `using System.Text;`: the locally bound name is the last segment.
fn extract_using(node: Node, source: &str, result: &mut ParseResult) {
    let name_node = node.child_by_field_name("name").or_else(|| {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor)
            .find(|c| matches!(c.kind(), "qualified_name" | "identifier"));
        found
    });
    let Some(name_node) = name_node else {
        return;
    };
    let module = node_text(name_node, source).to_string();
    let last = module.rsplit('.').next().unwrap_or("").to_string();
    result.imports.push(ImportInfo {
        module,
        names: vec![last],
        is_relative: false,
        alias: String::new(),
    });
}

fn extract_call(node: Node, source: &str, result: &mut ParseResult) {
    let func_node = node.child_by_field_name("function").or_else(|| node.child(0));
    let Some(func_node) = func_node else {
        return;
    };
    let line = start_line(node);

    if func_node.kind() == "member_access_expression" {
        let name = func_node.child_by_field_name("name");
        let obj = func_node.child_by_field_name("expression");
        if let Some(name) = name {
            result.calls.push(CallInfo {
                name: node_text(name, source).to_string(),
                line,
                receiver: obj.map(|o| node_text(o, source).to_string()).unwrap_or_default(),
                arguments: Vec::new(),
            });
        }
    } else {
        result.calls.push(CallInfo {
            name: node_text(func_node, source).to_string(),
            line,
            receiver: String::new(),
            arguments: Vec::new(),
        });
    }
}

/// `new Foo(args)` modelled as a call to the class.
fn extract_new(node: Node, source: &str, result: &mut ParseResult) {
    if let Some(type_node) = node.child_by_field_name("type") {
        let name = node_text(type_node, source);
        let name = name.split('<').next().unwrap_or(name);
        result.calls.push(CallInfo {
            name: name.to_string(),
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
        CSharpParser::new().unwrap().parse(source, "App.cs")
    }

    #[test]
    fn classes_interfaces_enums_methods() {
        let result = parse(
            "interface IRunner {}\nenum Status { Open, Closed }\nclass App {\n  void Start() {}\n}\n",
        );
        let kinds: Vec<(&str, &str, &str)> = result
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind.as_str(), s.class_name.as_str()))
            .collect();
        assert!(kinds.contains(&("IRunner", "interface", "")));
        assert!(kinds.contains(&("Status", "enum", "")));
        assert!(kinds.contains(&("App", "class", "")));
        assert!(kinds.contains(&("Start", "method", "App")));
    }

    #[test]
    fn using_directives_become_imports() {
        let result = parse("using System.Text;\nclass A {}\n");
        assert_eq!(result.imports[0].module, "System.Text");
        assert_eq!(result.imports[0].names, vec!["Text"]);
    }

    #[test]
    fn base_list_heritage() {
        let result = parse("class Worker : BackgroundService {}\n");
        assert!(result
            .heritage
            .iter()
            .any(|h| h.child == "Worker" && h.parent == "BackgroundService"));
    }

    #[test]
    fn invocations_and_constructors() {
        let result = parse(
            "class A {\n  void Run() {\n    logger.Write();\n    var x = new A();\n  }\n}\n",
        );
        let write = result.calls.iter().find(|c| c.name == "Write").unwrap();
        assert_eq!(write.receiver, "logger");
        assert!(result.calls.iter().any(|c| c.name == "A"));
    }
}
