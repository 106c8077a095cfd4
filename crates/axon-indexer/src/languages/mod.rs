//! Language parsers and the shared intermediate representation
//!
//! A parser is a pure function from `(content, path)` to a [`ParseResult`]
//! carrying symbols, imports, call sites, type references, heritage
//! tuples, and export lists. Parsers never touch the graph; the parsing
//! phase maps their output into nodes and edges.

pub mod blade;
pub mod csharp;
pub mod java;
pub mod php;
pub mod python;
pub mod typescript;

use anyhow::Result;
use tree_sitter::Node;

/// A parsed symbol (function, class, method, interface, type alias, enum).
///
/// `kind` is an open string set so that framework-specific kinds can pass
/// through; unknown kinds are skipped (with a warning) when mapped onto
/// graph labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub signature: String,
    /// For methods: the lexical owning class. Empty otherwise.
    pub class_name: String,
    /// Decorator names at syntactic precision: `staticmethod`,
    /// `app.route`, `server.list_tools`.
    pub decorators: Vec<String>,
}

/// A parsed import statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportInfo {
    /// Module path. Relative imports keep their leading dots (`..models`).
    pub module: String,
    /// Imported names; may be empty for star/bare-module imports.
    pub names: Vec<String>,
    pub is_relative: bool,
    pub alias: String,
}

/// A parsed call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallInfo {
    pub name: String,
    pub line: u32,
    /// Textual root of the call target: empty for `f()`, `self`/`this`
    /// for instance calls, otherwise the root identifier of a dotted
    /// chain.
    pub receiver: String,
    /// Bare-identifier arguments only (callback tracking).
    pub arguments: Vec<String>,
}

/// A parsed type annotation reference. `kind` is `param`, `return`, or
/// `variable`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeRefInfo {
    pub name: String,
    pub kind: String,
    pub line: u32,
    pub param_name: String,
}

/// An inheritance tuple: `(child, kind, parent)` where `kind` is
/// `extends` or `implements`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeritageInfo {
    pub child: String,
    pub kind: String,
    pub parent: String,
}

/// Complete parse result for a single file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseResult {
    pub symbols: Vec<SymbolInfo>,
    pub imports: Vec<ImportInfo>,
    pub calls: Vec<CallInfo>,
    pub type_refs: Vec<TypeRefInfo>,
    pub heritage: Vec<HeritageInfo>,
    /// Names from the module's explicit export list (`__all__`, `export`
    /// declarations, `module.exports`).
    pub exports: Vec<String>,
}

/// Interface every language parser implements.
///
/// `parse` takes `&mut self` because tree-sitter parser handles are
/// stateful; a single instance is reused across files.
pub trait LanguageParser {
    fn parse(&mut self, content: &str, file_path: &str) -> ParseResult;
}

/// Construct a parser for a language tag.
///
/// Callers cache the returned instance (the parser pool keeps one per
/// language per worker).
pub fn parser_for(language: &str) -> Result<Box<dyn LanguageParser>> {
    let parser: Box<dyn LanguageParser> = match language {
        "python" => Box::new(python::PythonParser::new()?),
        "typescript" => Box::new(typescript::TypeScriptParser::new(
            typescript::Dialect::TypeScript,
        )?),
        "javascript" => Box::new(typescript::TypeScriptParser::new(
            typescript::Dialect::JavaScript,
        )?),
        "php" => Box::new(php::PhpParser::new()?),
        "java" => Box::new(java::JavaParser::new()?),
        "csharp" => Box::new(csharp::CSharpParser::new()?),
        "blade" => Box::new(blade::BladeParser::new()),
        other => anyhow::bail!(
            "unsupported language {other:?}; expected one of: python, typescript, \
             javascript, php, java, csharp, blade"
        ),
    };
    Ok(parser)
}

/// Source text of a node, empty on any UTF-8 boundary issue.
pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-based line of a node's first byte.
pub(crate) fn start_line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based line of a node's last byte.
pub(crate) fn end_line(node: Node) -> u32 {
    node.end_position().row as u32 + 1
}
