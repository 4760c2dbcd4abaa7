//! Error types for grammar compilation
//!
//! Compilation errors are authoring bugs in the grammar itself, never runtime
//! input conditions: an unresolved `include`, a pattern that fails to compile,
//! or an entry that cannot be used where a matchable rule is required. A rule
//! failing to match at some position is not an error at all - it is the normal
//! outcome of trying alternatives and is reported as `None` by the match API.

use std::fmt;

/// Errors that can occur while compiling a grammar definition
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarError {
    /// An `include` or `get` referenced a name the repository does not define
    UnknownReference(String),
    /// A name resolved to a bare token node where a matchable rule was required
    NotMatchable(String),
    /// A rule pattern failed to compile as a regular expression
    InvalidPattern { pattern: String, message: String },
    /// The grammar definition itself could not be deserialized
    InvalidDefinition(String),
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::UnknownReference(name) => {
                write!(f, "Unknown repository reference: {}", name)
            }
            GrammarError::NotMatchable(name) => {
                write!(f, "`{}` does not resolve to a matchable rule", name)
            }
            GrammarError::InvalidPattern { pattern, message } => {
                write!(f, "Invalid pattern `{}`: {}", pattern, message)
            }
            GrammarError::InvalidDefinition(msg) => {
                write!(f, "Invalid grammar definition: {}", msg)
            }
        }
    }
}

impl std::error::Error for GrammarError {}

/// Result alias for grammar compilation
pub type CompileResult<T> = Result<T, GrammarError>;
