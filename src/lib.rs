//! # scopelex
//!
//! A grammar-driven incremental tokenizer.
//!
//! Declarative grammars (match, scoped and switch rules in a named
//! repository) compile into an immutable rule graph; a stack-based state
//! machine then turns raw text into a hierarchical token tree. Compiled
//! grammars are shared freely; each document threads its own cloneable
//! [`grammar::GrammarState`] through the match loop, and the state's
//! equality contract is what allows an incremental reparser to reuse
//! unchanged regions across edits.
//!
//! The engine lives in the [`grammar`] module; see its docs for the
//! component layout.

pub mod grammar;
