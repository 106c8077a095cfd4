//! Blade template scanner
//!
//! No tree-sitter grammar is available for Blade, so component and view
//! references are pulled out with regular expressions. Templates
//! contribute call references only; they define no symbols in the graph's
//! label set.

use std::sync::LazyLock;

use regex::Regex;

use super::{CallInfo, LanguageParser, ParseResult};

static COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<x-([\w.-]+)").expect("component pattern compiles"));
static INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@include\(['"]([\w.-]+)['"]"#).expect("include pattern compiles"));
static COMPONENT_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@component\(['"]([\w.-]+)['"]"#).expect("component directive pattern compiles")
});

pub struct BladeParser;

impl BladeParser {
    pub fn new() -> Self {
        BladeParser
    }
}

impl LanguageParser for BladeParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();

        for m in COMPONENT.captures_iter(content) {
            if let (Some(whole), Some(name)) = (m.get(0), m.get(1)) {
                result.calls.push(CallInfo {
                    name: format!("x-{}", name.as_str()),
                    line: line_of(content, whole.start()),
                    receiver: "BladeComponent".to_string(),
                    arguments: Vec::new(),
                });
            }
        }

        for m in INCLUDE.captures_iter(content) {
            if let (Some(whole), Some(name)) = (m.get(0), m.get(1)) {
                result.calls.push(CallInfo {
                    name: name.as_str().to_string(),
                    line: line_of(content, whole.start()),
                    receiver: "BladeInclude".to_string(),
                    arguments: Vec::new(),
                });
            }
        }

        for m in COMPONENT_DIRECTIVE.captures_iter(content) {
            if let (Some(whole), Some(name)) = (m.get(0), m.get(1)) {
                result.calls.push(CallInfo {
                    name: name.as_str().to_string(),
                    line: line_of(content, whole.start()),
                    receiver: "BladeComponent".to_string(),
                    arguments: Vec::new(),
                });
            }
        }

        result
    }
}

fn line_of(content: &str, byte_offset: usize) -> u32 {
    content[..byte_offset].bytes().filter(|b| *b == b'\n').count() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_and_includes() {
        let source = "<div>\n  <x-alert type=\"error\" />\n  @include('partials.header')\n  @component('forms.button')\n</div>\n";
        let result = BladeParser::new().parse(source, "resources/views/home.blade.php");

        let calls: Vec<(&str, &str, u32)> = result
            .calls
            .iter()
            .map(|c| (c.name.as_str(), c.receiver.as_str(), c.line))
            .collect();
        assert!(calls.contains(&("x-alert", "BladeComponent", 2)));
        assert!(calls.contains(&("partials.header", "BladeInclude", 3)));
        assert!(calls.contains(&("forms.button", "BladeComponent", 4)));
        assert!(result.symbols.is_empty());
    }
}
