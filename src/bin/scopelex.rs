//! Command-line interface for scopelex
//! This binary compiles grammar definitions and tokenizes input files with them.
//!
//! Usage:
//!   scopelex tokenize `<grammar>` `<input>` [--format `<format>`]  - Tokenize a file with a grammar
//!   scopelex check `<grammar>`                                 - Compile a grammar and report problems

use clap::{Arg, Command};
use std::path::Path;

use scopelex::grammar::{testing, Grammar};

fn main() {
    let matches = Command::new("scopelex")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A grammar-driven tokenizer for editor tooling")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("tokenize")
                .about("Tokenize an input file with a grammar")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar definition (.json or .yaml)")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("input")
                        .help("Path to the text file to tokenize")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format ('text' or 'json')")
                        .default_value("text"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Compile a grammar and report problems")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar definition (.json or .yaml)")
                        .required(true)
                        .index(1),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("tokenize", tokenize_matches)) => {
            let grammar = tokenize_matches.get_one::<String>("grammar").unwrap();
            let input = tokenize_matches.get_one::<String>("input").unwrap();
            let format = tokenize_matches.get_one::<String>("format").unwrap();
            handle_tokenize_command(grammar, input, format);
        }
        Some(("check", check_matches)) => {
            let grammar = check_matches.get_one::<String>("grammar").unwrap();
            handle_check_command(grammar);
        }
        _ => unreachable!(),
    }
}

/// Load and compile a grammar file, picking the format by extension
fn load_grammar(path: &str) -> Grammar {
    let source = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading grammar: {}", e);
        std::process::exit(1);
    });

    let is_yaml = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let result = if is_yaml {
        Grammar::from_yaml(&source)
    } else {
        Grammar::from_json(&source)
    };

    result.unwrap_or_else(|e| {
        eprintln!("Grammar error: {}", e);
        std::process::exit(1);
    })
}

/// Handle the tokenize command
fn handle_tokenize_command(grammar_path: &str, input_path: &str, format: &str) {
    let grammar = load_grammar(grammar_path);
    let text = std::fs::read_to_string(input_path).unwrap_or_else(|e| {
        eprintln!("Error reading input: {}", e);
        std::process::exit(1);
    });

    let mut state = grammar.start_state();
    let tokens = testing::scan_all(&grammar, &mut state, &text);

    match format {
        "text" => print!("{}", testing::render(grammar.repository(), &tokens)),
        "json" => {
            let value = testing::to_json(grammar.repository(), &tokens);
            match serde_json::to_string_pretty(&value) {
                Ok(out) => println!("{}", out),
                Err(e) => {
                    eprintln!("Serialization error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        other => {
            eprintln!("Unknown format: {}", other);
            std::process::exit(1);
        }
    }

    if state.stack.depth() > 0 {
        eprintln!("warning: {} unclosed scope(s) at end of input", state.stack.depth());
    }
}

/// Handle the check command
fn handle_check_command(grammar_path: &str) {
    let grammar = load_grammar(grammar_path);
    let repository = grammar.repository();
    println!(
        "OK: {} rule(s), {} node(s)",
        repository.rule_count(),
        repository.node_count()
    );
}
