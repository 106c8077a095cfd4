//! Query tool surface handlers
//!
//! Each handler takes a storage backend and the tool arguments, runs the
//! appropriate queries, and returns a human-readable string. The
//! transport (stdio, MCP, …) lives outside this crate; these functions
//! are the behavioural contract.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use axon_core::{hybrid_search, SearchResult, StorageBackend, TraversalDirection, DEFAULT_RRF_K};
use regex::Regex;

/// Mutation keywords rejected by the raw-query entry point. This list is
/// the compatibility contract of the read-only surface.
static WRITE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(DELETE|DROP|CREATE|SET|REMOVE|MERGE|DETACH|INSTALL|LOAD|COPY|CALL)\b")
        .expect("write keyword pattern compiles")
});

static DIFF_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^diff --git a/(.+?) b/(.+?)$").expect("diff header pattern compiles")
});

static DIFF_HUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").expect("hunk pattern compiles")
});

fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Exact name match first, full-text search second.
fn resolve_symbol(storage: &dyn StorageBackend, symbol: &str) -> Vec<SearchResult> {
    let exact = storage.exact_name_search(symbol, 1);
    if !exact.is_empty() {
        return exact;
    }
    storage.fts_search(symbol, 1)
}

/// Hybrid (lexical + semantic) search, formatted.
pub fn handle_query(storage: &dyn StorageBackend, query: &str, limit: usize) -> String {
    let results = hybrid_search(query, storage, None, limit, 1.0, 1.0, DEFAULT_RRF_K);
    if results.is_empty() {
        return format!("No results found for '{query}'.");
    }

    let mut lines = Vec::new();
    for (i, result) in results.iter().enumerate() {
        let label = title_case(&result.label);
        lines.push(format!(
            "{}. {} ({}) -- {}",
            i + 1,
            result.node_name,
            label,
            result.file_path
        ));
        if !result.snippet.is_empty() {
            let snippet: String = result.snippet.chars().take(200).collect();
            lines.push(format!("   {}", snippet.replace('\n', " ").trim()));
        }
    }
    lines.join("\n")
}

/// 360-degree view of a symbol: location, signature, dead-code status,
/// callers, callees, and type references.
pub fn handle_context(storage: &dyn StorageBackend, symbol: &str) -> String {
    let results = resolve_symbol(storage, symbol);
    let Some(node) = results
        .first()
        .and_then(|r| storage.get_node(&r.node_id))
    else {
        return format!("Symbol '{symbol}' not found.");
    };

    let mut lines = vec![
        format!("Symbol: {} ({})", node.name, title_case(node.label.as_str())),
        format!("File: {}:{}-{}", node.file_path, node.start_line, node.end_line),
    ];

    if !node.signature.is_empty() {
        lines.push(format!("Signature: {}", node.signature));
    }
    if node.is_dead {
        lines.push("Status: DEAD CODE (unreachable)".to_string());
    }

    let callers = storage.get_callers(&node.id);
    if !callers.is_empty() {
        lines.push(format!("\nCallers ({}):", callers.len()));
        for caller in &callers {
            lines.push(format!(
                "  -> {}  {}:{}",
                caller.name, caller.file_path, caller.start_line
            ));
        }
    }

    let callees = storage.get_callees(&node.id);
    if !callees.is_empty() {
        lines.push(format!("\nCallees ({}):", callees.len()));
        for callee in &callees {
            lines.push(format!(
                "  -> {}  {}:{}",
                callee.name, callee.file_path, callee.start_line
            ));
        }
    }

    let type_refs = storage.get_type_refs(&node.id);
    if !type_refs.is_empty() {
        lines.push(format!("\nType references ({}):", type_refs.len()));
        for type_ref in &type_refs {
            lines.push(format!("  -> {}  {}", type_ref.name, type_ref.file_path));
        }
    }

    lines.join("\n")
}

/// Blast radius: upstream callers up to `depth` hops.
pub fn handle_impact(storage: &dyn StorageBackend, symbol: &str, depth: usize) -> String {
    let results = resolve_symbol(storage, symbol);
    let Some(start) = results
        .first()
        .and_then(|r| storage.get_node(&r.node_id))
    else {
        return format!("Symbol '{symbol}' not found.");
    };

    let affected = storage.traverse(&start.id, depth, TraversalDirection::Callers);
    if affected.is_empty() {
        return format!("No upstream callers found for '{symbol}'.");
    }

    let mut lines = vec![
        format!(
            "Impact analysis for: {} ({})",
            start.name,
            title_case(start.label.as_str())
        ),
        format!("Depth: {depth}"),
        format!("Total affected symbols: {}", affected.len()),
        String::new(),
    ];
    for (i, node) in affected.iter().enumerate() {
        lines.push(format!(
            "  {}. {} ({}) -- {}:{}",
            i + 1,
            node.name,
            title_case(node.label.as_str()),
            node.file_path,
            node.start_line
        ));
    }
    lines.join("\n")
}

/// Downstream flow: callees up to `depth` hops.
pub fn handle_flow_trace(storage: &dyn StorageBackend, symbol: &str, depth: usize) -> String {
    let results = resolve_symbol(storage, symbol);
    let Some(start) = results
        .first()
        .and_then(|r| storage.get_node(&r.node_id))
    else {
        return format!("Symbol '{symbol}' not found.");
    };

    let downstream = storage.traverse(&start.id, depth, TraversalDirection::Callees);
    if downstream.is_empty() {
        return format!("No downstream calls found for '{symbol}'.");
    }

    let mut lines = vec![
        format!("Execution flow trace for: {}", start.name),
        format!("Max depth: {depth}"),
        format!("Total downstream symbols called: {}", downstream.len()),
        String::new(),
    ];
    for (i, node) in downstream.iter().enumerate() {
        lines.push(format!(
            "  {}. {} ({}) -- {}:{}",
            i + 1,
            node.name,
            title_case(node.label.as_str()),
            node.file_path,
            node.start_line
        ));
    }
    lines.join("\n")
}

/// All symbols flagged dead, grouped by file.
pub fn handle_dead_code(storage: &dyn StorageBackend) -> String {
    let mut by_file: BTreeMap<String, Vec<(String, String, i64)>> = BTreeMap::new();
    let mut total = 0usize;

    for label in ["function", "method", "class"] {
        let query = format!(
            "MATCH (n:{label}) WHERE n.is_dead = true RETURN n.name, n.file_path, n.start_line"
        );
        let Ok(rows) = storage.execute_raw(&query) else {
            continue;
        };
        for row in rows {
            let name = row.first().and_then(|v| v.as_str()).unwrap_or("").to_string();
            let file = row.get(1).and_then(|v| v.as_str()).unwrap_or("").to_string();
            let line = row.get(2).and_then(|v| v.as_i64()).unwrap_or(0);
            by_file
                .entry(file)
                .or_default()
                .push((name, label.to_string(), line));
            total += 1;
        }
    }

    if total == 0 {
        return "No dead code detected.".to_string();
    }

    let mut lines = vec![format!("Dead code symbols ({total}):"), String::new()];
    for (file, mut symbols) in by_file {
        symbols.sort_by_key(|(_, _, line)| *line);
        lines.push(format!("  {file}:"));
        for (name, label, line) in symbols {
            lines.push(format!("    - {name} ({}) line {line}", title_case(&label)));
        }
        lines.push(String::new());
    }
    lines.join("\n").trim_end().to_string()
}

/// Map a unified diff to the indexed symbols its hunks touch.
///
/// File headers match `diff --git a/<old> b/<new>`; the `+start,count`
/// numbers of each hunk define the affected range in the new file.
pub fn handle_detect_changes(storage: &dyn StorageBackend, diff: &str) -> String {
    if diff.trim().is_empty() {
        return "Empty diff provided.".to_string();
    }

    let mut changed_files: BTreeMap<String, Vec<(u32, u32)>> = BTreeMap::new();
    let mut current_file: Option<String> = None;

    for line in diff.lines() {
        if let Some(captures) = DIFF_FILE_RE.captures(line) {
            let file = captures[2].to_string();
            changed_files.entry(file.clone()).or_default();
            current_file = Some(file);
            continue;
        }
        if let Some(captures) = DIFF_HUNK_RE.captures(line) {
            if let Some(file) = &current_file {
                let start: u32 = captures[1].parse().unwrap_or(0);
                let count: u32 = captures
                    .get(2)
                    .map(|m| m.as_str().parse().unwrap_or(1))
                    .unwrap_or(1);
                changed_files
                    .entry(file.clone())
                    .or_default()
                    .push((start, start + count.saturating_sub(1)));
            }
        }
    }

    if changed_files.is_empty() {
        return "Could not parse any changed files from the diff.".to_string();
    }

    let mut lines = vec![format!("Changed files: {}", changed_files.len()), String::new()];
    let mut total_affected = 0usize;

    for (file_path, ranges) in &changed_files {
        let safe_path = file_path.replace('\'', "");
        let query = format!(
            "MATCH (n) WHERE n.file_path = '{safe_path}' AND n.start_line > 0 \
             RETURN n.id, n.name, n.start_line, n.end_line"
        );
        let rows = storage.execute_raw(&query).unwrap_or_default();

        let mut affected: Vec<(String, String, i64, i64)> = Vec::new();
        for row in rows {
            let node_id = row.first().and_then(|v| v.as_str()).unwrap_or("");
            let name = row.get(1).and_then(|v| v.as_str()).unwrap_or("");
            let start_line = row.get(2).and_then(|v| v.as_i64()).unwrap_or(0);
            let end_line = row.get(3).and_then(|v| v.as_i64()).unwrap_or(0);
            let label = node_id.split(':').next().unwrap_or("");

            let overlaps = ranges
                .iter()
                .any(|(start, end)| start_line <= *end as i64 && end_line >= *start as i64);
            if overlaps {
                affected.push((
                    name.to_string(),
                    title_case(label),
                    start_line,
                    end_line,
                ));
            }
        }

        lines.push(format!("  {file_path}:"));
        if affected.is_empty() {
            lines.push("    (no indexed symbols in changed lines)".to_string());
        } else {
            for (name, label, start, end) in affected {
                lines.push(format!("    - {name} ({label}) lines {start}-{end}"));
                total_affected += 1;
            }
        }
        lines.push(String::new());
    }

    lines.push(format!("Total affected symbols: {total_affected}"));
    lines.join("\n")
}

/// Raw read-only graph query. Queries containing write keywords are
/// rejected with a fixed message before touching the store.
pub fn handle_raw_query(storage: &dyn StorageBackend, query: &str) -> String {
    if WRITE_KEYWORDS.is_match(query) {
        return "Query rejected: only read-only queries (MATCH/RETURN) are allowed. \
                Write operations (DELETE, DROP, CREATE, SET, MERGE) are not permitted."
            .to_string();
    }

    let rows = match storage.execute_raw(query) {
        Ok(rows) => rows,
        Err(err) => return format!("Query failed: {err}"),
    };

    if rows.is_empty() {
        return "Query returned no results.".to_string();
    }

    let mut lines = vec![format!("Results ({} rows):", rows.len()), String::new()];
    for (i, row) in rows.iter().enumerate() {
        let formatted: Vec<String> = row
            .iter()
            .map(|value| match value {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect();
        lines.push(format!("  {}. {}", i + 1, formatted.join(" | ")));
    }
    lines.join("\n")
}

/// Symbols of a file plus their external callers and callees.
pub fn handle_file_context(storage: &dyn StorageBackend, file_path: &str) -> String {
    let safe_path = file_path.replace('\'', "");
    let query = format!(
        "MATCH (n) WHERE n.file_path ENDS WITH '{safe_path}' AND n.start_line > 0 \
         RETURN n.id, n.name, n.label ORDER BY n.start_line"
    );
    let rows = storage.execute_raw(&query).unwrap_or_default();
    if rows.is_empty() {
        return format!("No symbols found in file matching '{file_path}'.");
    }

    let mut lines = vec![format!("File context for: {file_path}"), String::new()];

    for row in rows {
        let node_id = row.first().and_then(|v| v.as_str()).unwrap_or("").to_string();
        let name = row.get(1).and_then(|v| v.as_str()).unwrap_or("");
        let label = row.get(2).and_then(|v| v.as_str()).unwrap_or("");
        lines.push(format!("Symbol: {name} ({})", title_case(label)));

        let external_callees: Vec<_> = storage
            .get_callees(&node_id)
            .into_iter()
            .filter(|n| !n.file_path.ends_with(file_path))
            .collect();
        if !external_callees.is_empty() {
            lines.push(format!("  -> Calls external ({}):", external_callees.len()));
            for callee in external_callees {
                lines.push(format!("       {} in {}", callee.name, callee.file_path));
            }
        }

        let external_callers: Vec<_> = storage
            .get_callers(&node_id)
            .into_iter()
            .filter(|n| !n.file_path.ends_with(file_path))
            .collect();
        if !external_callers.is_empty() {
            lines.push(format!("  <- Called by external ({}):", external_callers.len()));
            for caller in external_callers {
                lines.push(format!("       {} in {}", caller.name, caller.file_path));
            }
        }

        lines.push(String::new());
    }

    lines.join("\n").trim_end().to_string()
}

/// Files related through call edges, weighted by reference count.
pub fn handle_related_files(storage: &dyn StorageBackend, file_path: &str) -> String {
    let safe_path = file_path.replace('\'', "");
    let query = format!(
        "MATCH (n) WHERE n.file_path ENDS WITH '{safe_path}' AND n.start_line > 0 \
         RETURN n.id"
    );
    let rows = storage.execute_raw(&query).unwrap_or_default();

    let mut calls_out: BTreeMap<String, usize> = BTreeMap::new();
    let mut called_by: BTreeMap<String, usize> = BTreeMap::new();

    for row in rows {
        let Some(node_id) = row.first().and_then(|v| v.as_str()) else {
            continue;
        };
        for callee in storage.get_callees(node_id) {
            if !callee.file_path.ends_with(file_path) {
                *calls_out.entry(callee.file_path).or_insert(0) += 1;
            }
        }
        for caller in storage.get_callers(node_id) {
            if !caller.file_path.ends_with(file_path) {
                *called_by.entry(caller.file_path).or_insert(0) += 1;
            }
        }
    }

    if calls_out.is_empty() && called_by.is_empty() {
        return format!("No related files found for '{file_path}'.");
    }

    let ranked = |counts: &BTreeMap<String, usize>| -> Vec<(String, usize)> {
        let mut pairs: Vec<(String, usize)> =
            counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        pairs.truncate(10);
        pairs
    };

    let mut lines = vec![format!("Related files for: {file_path}"), String::new()];
    let out = ranked(&calls_out);
    if !out.is_empty() {
        lines.push("Files this file depends on (calls out to):".to_string());
        for (file, weight) in out {
            lines.push(format!("  - {file} ({weight} references)"));
        }
        lines.push(String::new());
    }
    let inbound = ranked(&called_by);
    if !inbound.is_empty() {
        lines.push("Files that depend on this file (called by):".to_string());
        for (file, weight) in inbound {
            lines.push(format!("  - {file} ({weight} references)"));
        }
    }
    lines.join("\n").trim_end().to_string()
}

/// Architecture overview: communities and execution flows.
pub fn handle_architecture(storage: &dyn StorageBackend) -> String {
    let communities = storage
        .execute_raw(
            "MATCH (n:Community) RETURN n.name, n.symbol_count, n.cohesion \
             ORDER BY n.symbol_count DESC",
        )
        .unwrap_or_default();
    let processes = storage
        .execute_raw(
            "MATCH (n:Process) RETURN n.name, n.step_count, n.kind \
             ORDER BY n.step_count DESC LIMIT 10",
        )
        .unwrap_or_default();

    if communities.is_empty() && processes.is_empty() {
        return "No architectural overview available; communities and flows have not been \
                derived yet."
            .to_string();
    }

    let mut lines = Vec::new();
    if !communities.is_empty() {
        lines.push(format!("Functional clusters ({}):", communities.len()));
        for row in &communities {
            let name = row.first().and_then(|v| v.as_str()).unwrap_or("?");
            let size = row.get(1).and_then(|v| v.as_i64()).unwrap_or(0);
            let cohesion = row.get(2).and_then(|v| v.as_f64()).unwrap_or(0.0);
            lines.push(format!(
                "  - {name}: {size} symbols (cohesion {cohesion:.3})"
            ));
        }
        lines.push(String::new());
    }
    if !processes.is_empty() {
        lines.push(format!("Execution flows (top {}):", processes.len()));
        for row in &processes {
            let name = row.first().and_then(|v| v.as_str()).unwrap_or("?");
            let steps = row.get(1).and_then(|v| v.as_i64()).unwrap_or(0);
            let kind = row.get(2).and_then(|v| v.as_str()).unwrap_or("unknown");
            lines.push(format!("  - {name} ({steps} steps, {kind})"));
        }
    }
    lines.join("\n").trim_end().to_string()
}
