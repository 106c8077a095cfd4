//! Read-only query engine for the escape-hatch surface
//!
//! Supports a small Cypher-style subset over node tables:
//!
//! ```text
//! MATCH (n[:Label])
//! [WHERE n.field OP value [AND ...]]
//! RETURN n.field [, n.field ...]
//! [ORDER BY n.field [DESC]]
//! [LIMIT k]
//! ```
//!
//! Operators: `=`, `<>`, `!=`, `>`, `>=`, `<`, `<=`, `CONTAINS`,
//! `STARTS WITH`, `ENDS WITH`. Writes never parse; mutation keywords
//! are additionally rejected at the tool layer.

use std::sync::LazyLock;

use anyhow::{bail, Result};
use axon_core::{GraphNode, NodeLabel};
use regex::Regex;
use serde_json::Value;

static QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*MATCH\s*\(\s*(?P<var>\w+)(?:\s*:\s*(?P<label>\w+))?\s*\)\s*(?:WHERE\s+(?P<where>.*?)\s*)??RETURN\s+(?P<return>.+?)(?:\s+ORDER\s+BY\s+(?P<ovar>\w+)\.(?P<ofield>\w+)(?P<desc>\s+DESC)?)?(?:\s+LIMIT\s+(?P<limit>\d+))?\s*;?\s*$",
    )
    .expect("query pattern compiles")
});

static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*(?P<var>\w+)\.(?P<field>\w+)\s*(?P<op>=|<>|!=|>=|<=|>|<|CONTAINS|STARTS\s+WITH|ENDS\s+WITH)\s*(?P<value>'[^']*'|"[^"]*"|-?\d+(?:\.\d+)?|true|false)\s*$"#,
    )
    .expect("condition pattern compiles")
});

static AND_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+AND\s+").expect("and pattern compiles"));

#[derive(Debug)]
struct Condition {
    field: String,
    op: String,
    value: Value,
}

#[derive(Debug)]
struct ParsedQuery {
    label: Option<NodeLabel>,
    conditions: Vec<Condition>,
    projections: Vec<String>,
    order_by: Option<(String, bool)>,
    limit: Option<usize>,
}

/// Execute a read-only query over the node set, returning projected
/// rows.
pub fn run_query(query: &str, nodes: &[&GraphNode]) -> Result<Vec<Vec<Value>>> {
    let parsed = parse_query(query)?;

    let mut matched: Vec<&GraphNode> = nodes
        .iter()
        .copied()
        .filter(|node| parsed.label.map_or(true, |label| node.label == label))
        .filter(|node| {
            parsed
                .conditions
                .iter()
                .all(|condition| evaluate(node, condition))
        })
        .collect();

    match &parsed.order_by {
        Some((field, descending)) => {
            matched.sort_by(|a, b| {
                let ordering = compare_values(&field_value(a, field), &field_value(b, field));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        // Default ordering: node id, for deterministic output.
        None => matched.sort_by(|a, b| a.id.cmp(&b.id)),
    }

    if let Some(limit) = parsed.limit {
        matched.truncate(limit);
    }

    Ok(matched
        .into_iter()
        .map(|node| {
            parsed
                .projections
                .iter()
                .map(|field| field_value(node, field))
                .collect()
        })
        .collect())
}

fn parse_query(query: &str) -> Result<ParsedQuery> {
    let Some(captures) = QUERY_RE.captures(query) else {
        bail!(
            "unsupported query; expected MATCH (n[:Label]) [WHERE ...] RETURN n.field, ... \
             [ORDER BY n.field [DESC]] [LIMIT k]"
        );
    };

    let var = captures.name("var").map(|m| m.as_str()).unwrap_or("n");

    let label = match captures.name("label") {
        Some(token) => Some(parse_label(token.as_str())?),
        None => None,
    };

    let conditions = match captures.name("where") {
        Some(clause) => AND_SPLIT_RE
            .split(clause.as_str())
            .map(|part| parse_condition(part, var))
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let projections = captures
        .name("return")
        .map(|m| m.as_str())
        .unwrap_or_default()
        .split(',')
        .map(|item| parse_projection(item, var))
        .collect::<Result<Vec<_>>>()?;

    let order_by = match (captures.name("ovar"), captures.name("ofield")) {
        (Some(ovar), Some(ofield)) => {
            if ovar.as_str() != var {
                bail!("unknown variable {:?} in ORDER BY", ovar.as_str());
            }
            Some((
                ofield.as_str().to_lowercase(),
                captures.name("desc").is_some(),
            ))
        }
        _ => None,
    };

    let limit = captures
        .name("limit")
        .map(|m| m.as_str().parse::<usize>())
        .transpose()?;

    Ok(ParsedQuery {
        label,
        conditions,
        projections,
        order_by,
        limit,
    })
}

/// Accept both the wire form (`type_alias`) and table-style casing
/// (`TypeAlias`, `FUNCTION`).
fn parse_label(token: &str) -> Result<NodeLabel> {
    let normalized = token.to_lowercase();
    for label in NodeLabel::ALL {
        if label.as_str() == normalized || label.as_str().replace('_', "") == normalized {
            return Ok(label);
        }
    }
    bail!("unknown node label {token:?}")
}

fn parse_condition(text: &str, var: &str) -> Result<Condition> {
    let Some(captures) = CONDITION_RE.captures(text) else {
        bail!("unsupported WHERE condition {text:?}");
    };
    if captures["var"] != *var {
        bail!("unknown variable {:?} in WHERE", &captures["var"]);
    }

    let op = captures["op"]
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let raw = &captures["value"];
    let value = if let Some(stripped) = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
    {
        Value::String(stripped.to_string())
    } else if raw.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else {
        serde_json::from_str(raw)?
    };

    Ok(Condition {
        field: captures["field"].to_lowercase(),
        op,
        value,
    })
}

fn parse_projection(item: &str, var: &str) -> Result<String> {
    let trimmed = item.trim();
    let Some((item_var, field)) = trimmed.split_once('.') else {
        bail!("unsupported RETURN item {trimmed:?}; expected {var}.field");
    };
    if item_var.trim() != var {
        bail!("unknown variable {:?} in RETURN", item_var.trim());
    }
    Ok(field.trim().to_lowercase())
}

fn evaluate(node: &GraphNode, condition: &Condition) -> bool {
    let actual = field_value(node, &condition.field);
    match condition.op.as_str() {
        "=" => values_equal(&actual, &condition.value),
        "<>" | "!=" => !values_equal(&actual, &condition.value),
        ">" => compare_values(&actual, &condition.value).is_gt(),
        ">=" => compare_values(&actual, &condition.value).is_ge(),
        "<" => compare_values(&actual, &condition.value).is_lt(),
        "<=" => compare_values(&actual, &condition.value).is_le(),
        "CONTAINS" => string_op(&actual, &condition.value, |a, b| a.contains(b)),
        "STARTS WITH" => string_op(&actual, &condition.value, |a, b| a.starts_with(b)),
        "ENDS WITH" => string_op(&actual, &condition.value, |a, b| a.ends_with(b)),
        _ => false,
    }
}

fn string_op(actual: &Value, expected: &Value, op: impl Fn(&str, &str) -> bool) -> bool {
    match (actual.as_str(), expected.as_str()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}

/// Projected value of a node field; unknown names fall back to the open
/// property map.
fn field_value(node: &GraphNode, field: &str) -> Value {
    match field {
        "id" => Value::String(node.id.clone()),
        "label" => Value::String(node.label.as_str().to_string()),
        "name" => Value::String(node.name.clone()),
        "file_path" => Value::String(node.file_path.clone()),
        "start_line" => Value::from(node.start_line),
        "end_line" => Value::from(node.end_line),
        "content" => Value::String(node.content.clone()),
        "signature" => Value::String(node.signature.clone()),
        "language" => Value::String(node.language.clone()),
        "class_name" => Value::String(node.class_name.clone()),
        "is_dead" => Value::Bool(node.is_dead),
        "is_entry_point" => Value::Bool(node.is_entry_point),
        "is_exported" => Value::Bool(node.is_exported),
        other => node.properties.get(other).cloned().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_nodes() -> Vec<GraphNode> {
        let mut validate = GraphNode::new(NodeLabel::Function, "src/auth.py", "validate", "validate");
        validate.start_line = 1;
        validate.end_line = 10;

        let mut orphan = GraphNode::new(NodeLabel::Function, "src/util.py", "orphan", "orphan");
        orphan.start_line = 3;
        orphan.end_line = 5;
        orphan.is_dead = true;

        let user = GraphNode::new(NodeLabel::Class, "src/models.py", "User", "User");

        vec![validate, orphan, user]
    }

    fn run(query: &str) -> Result<Vec<Vec<Value>>> {
        let nodes = sample_nodes();
        let refs: Vec<&GraphNode> = nodes.iter().collect();
        run_query(query, &refs)
    }

    #[test]
    fn label_filter_and_projection() {
        let rows = run("MATCH (n:Function) RETURN n.name").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Value::String("validate".to_string()));
        assert_eq!(rows[1][0], Value::String("orphan".to_string()));
    }

    #[test]
    fn where_conditions() {
        let rows = run(
            "MATCH (n) WHERE n.file_path = 'src/auth.py' AND n.start_line > 0 RETURN n.id, n.start_line",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::String("function:src/auth.py:validate".to_string()));
        assert_eq!(rows[0][1], Value::from(1u32));
    }

    #[test]
    fn boolean_and_string_operators() {
        let rows = run("MATCH (n:Function) WHERE n.is_dead = true RETURN n.name").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::String("orphan".to_string()));

        let rows = run("MATCH (n) WHERE n.file_path ENDS WITH 'models.py' RETURN n.name").unwrap();
        assert_eq!(rows[0][0], Value::String("User".to_string()));

        let rows = run("MATCH (n) WHERE n.name CONTAINS 'val' RETURN n.name").unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn order_and_limit() {
        let rows = run("MATCH (n) RETURN n.name ORDER BY n.start_line DESC LIMIT 2").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Value::String("orphan".to_string()));
    }

    #[test]
    fn unsupported_shapes_error() {
        assert!(run("CREATE (n:Function)").is_err());
        assert!(run("MATCH (n) RETURN count(n)").is_err());
        assert!(run("MATCH (n:Gizmo) RETURN n.name").is_err());
    }
}
