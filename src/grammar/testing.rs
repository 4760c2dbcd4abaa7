//! Scan driver and token-stream rendering helpers
//!
//! The real consumer of this engine is an incremental parser that decides
//! where and how far to scan. For tests and the command-line tool a plain
//! forward scan is enough: walk the text from the start, emit every match,
//! and skip over positions nothing matches.

use serde_json::{json, Value};

use super::engine::Grammar;
use super::matched::{Boundary, Matched};
use super::repository::Repository;
use super::state::GrammarState;

/// Scan `text` from the start, collecting every match in order. Positions
/// matched by no rule are skipped one code point at a time; a zero-length
/// match also advances one code point so the scan always terminates.
pub fn scan_all(grammar: &Grammar, state: &mut GrammarState, text: &str) -> Vec<Matched> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let step = text[pos..].chars().next().map_or(1, char::len_utf8);
        match grammar.match_at(state, text, pos, pos) {
            Some(m) => {
                let advance = m.len().max(step);
                out.push(m);
                pos += advance;
            }
            None => pos += step,
        }
    }
    out
}

/// Render a token stream one match per line, children indented under their
/// parent. Structural matches (the sentinel node) render as `-`.
pub fn render(repository: &Repository, matches: &[Matched]) -> String {
    let mut out = String::new();
    for m in matches {
        render_into(repository, m, 0, &mut out);
    }
    out
}

/// Render only the top-level records of a token stream on one line,
/// separated by ` | `
pub fn render_compact(repository: &Repository, matches: &[Matched]) -> String {
    matches
        .iter()
        .map(|m| render_line(repository, m))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Token stream as JSON, with node names resolved
pub fn to_json(repository: &Repository, matches: &[Matched]) -> Value {
    Value::Array(matches.iter().map(|m| match_json(repository, m)).collect())
}

fn render_into(repository: &Repository, m: &Matched, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(&render_line(repository, m));
    out.push('\n');
    for child in &m.captures {
        render_into(repository, child, depth + 1, out);
    }
}

fn render_line(repository: &Repository, m: &Matched) -> String {
    let name = if m.node.is_none() {
        "-"
    } else {
        repository.node(m.node).name.as_str()
    };
    let boundary = match m.boundary {
        Some(Boundary::Begin) => " begin",
        Some(Boundary::End) => " end",
        None => "",
    };
    format!("{}..{} {}{} {:?}", m.from, m.to(), name, boundary, m.text)
}

fn match_json(repository: &Repository, m: &Matched) -> Value {
    let name = if m.node.is_none() {
        Value::Null
    } else {
        Value::String(repository.node(m.node).name.clone())
    };
    json!({
        "node": name,
        "from": m.from,
        "to": m.to(),
        "text": m.text,
        "boundary": match m.boundary {
            Some(Boundary::Begin) => Value::String("begin".to_string()),
            Some(Boundary::End) => Value::String("end".to_string()),
            None => Value::Null,
        },
        "captures": Value::Array(
            m.captures.iter().map(|c| match_json(repository, c)).collect()
        ),
    })
}
