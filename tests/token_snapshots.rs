//! Snapshot tests for rendered token streams
//!
//! These pin the exact shape of the renderer output, which the CLI prints
//! and which makes regressions in positions or boundary labels visible at a
//! glance.

use scopelex::grammar::{testing, Grammar};

fn scan(grammar: &Grammar, input: &str) -> String {
    let mut state = grammar.start_state();
    let tokens = testing::scan_all(grammar, &mut state, input);
    testing::render_compact(grammar.repository(), &tokens)
}

#[test]
fn test_word_stream_snapshot() {
    let grammar = Grammar::from_json(r#"{"patterns": [{"match": "[a-z]+", "type": "word"}]}"#)
        .expect("grammar should compile");
    insta::assert_snapshot!(
        scan(&grammar, "ab cd"),
        @r#"0..2 word "ab" | 3..5 word "cd""#
    );
}

#[test]
fn test_scoped_stream_snapshot() {
    let grammar = Grammar::from_json(
        r#"{
            "patterns": [{
                "begin": "\\(",
                "end": "\\)",
                "type": "paren",
                "patterns": [{"match": "[a-z]+", "type": "word"}]
            }]
        }"#,
    )
    .expect("grammar should compile");
    insta::assert_snapshot!(
        scan(&grammar, "(ab)"),
        @r#"0..1 paren begin "(" | 1..3 word "ab" | 3..4 paren end ")""#
    );
}

#[test]
fn test_capture_tree_snapshot() {
    let grammar = Grammar::from_json(
        r#"{
            "patterns": [{
                "match": "([a-z]+)(=)([0-9]+)",
                "type": "assign",
                "captures": {
                    "1": {"type": "name"},
                    "3": {"type": "value"}
                }
            }]
        }"#,
    )
    .expect("grammar should compile");
    let mut state = grammar.start_state();
    let tokens = testing::scan_all(&grammar, &mut state, "x=10");
    let rendered = testing::render(grammar.repository(), &tokens);
    insta::assert_snapshot!(rendered.trim_end(), @r#"
0..4 assign "x=10"
  0..1 name "x"
  2..4 value "10"
"#);
}
