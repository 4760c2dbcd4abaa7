//! Grammar-driven tokenization engine
//!
//! A grammar is authored as a declarative definition - match rules, scoped
//! begin/end regions and switch alternations organized in a named repository -
//! and compiled once into an immutable rule arena. A stack-based state machine
//! then converts raw text into a hierarchical token tree, one match call at a
//! time, for an editor's highlighting, folding and autocompletion layers.
//!
//! The moving parts, leaves first:
//!
//! - [`matcher`] - one sticky regex, with `$N`/`$ctx:name` template support
//! - [`rules`] - the three compiled rule shapes and their match behavior
//! - [`repository`] - compiles a definition into an arena of rules and nodes
//! - [`state`] - per-document cloneable state: scope stack plus context
//! - [`engine`] - the façade and the close-before-open dispatcher
//! - [`matched`] - the recursive match records the engine produces
//!
//! A typical consumer compiles one [`Grammar`] per language, creates one
//! [`GrammarState`] per open document, and feeds match results into its own
//! token-tree builder. The state's `clone`/`equals` contract is what makes
//! incremental reuse across edits possible: a cached state that still equals
//! the freshly recomputed one guarantees the region behind it tokenizes
//! identically.

pub mod definition;
pub mod engine;
pub mod error;
pub mod matched;
pub mod matcher;
pub mod repository;
pub mod rules;
pub mod state;
pub mod testing;

pub use definition::{GrammarData, IncludeRef, PatternEntry, RuleItem};
pub use engine::Grammar;
pub use error::{CompileResult, GrammarError};
pub use matched::{Boundary, Matched};
pub use matcher::PatternMatcher;
pub use repository::{CompiledRef, NodeId, ParserNode, Repository, RuleId};
pub use rules::Rule;
pub use state::{Frame, GrammarStack, GrammarState};
