//! Grammar façade and dispatch
//!
//! [`Grammar`] owns the compiled repository and the top-level rule list and
//! drives the per-position dispatch:
//!
//! 1. If the innermost open scope registered an end rule, try it first.
//! 2. Otherwise walk the active rule list in order and take the first match.
//! 3. Nothing matched: report `None` and let the caller advance.
//!
//! Step 1 before step 2 is the close-before-open invariant: a scope can
//! always terminate itself even when its end pattern would also be a valid
//! prefix of one of its own nested patterns. Nested-scope grammars depend on
//! this ordering for correctness.
//!
//! A compiled grammar is immutable and safe to share across documents and
//! threads; all mutable matching state lives in the caller-owned
//! [`GrammarState`].

use std::sync::Arc;

use super::definition::GrammarData;
use super::error::GrammarError;
use super::matched::{Boundary, Matched};
use super::repository::{NodeId, Repository, RuleId};
use super::rules::Rule;
use super::state::GrammarState;

/// A compiled grammar: repository plus top-level rule list
#[derive(Debug)]
pub struct Grammar {
    repository: Repository,
    top: Arc<[RuleId]>,
}

impl Grammar {
    /// Compile a grammar definition
    pub fn new(data: GrammarData) -> Result<Self, GrammarError> {
        let mut repository = Repository::new(data.repository);
        let top = repository.patterns(&data.patterns, None)?;
        Ok(Grammar { repository, top })
    }

    /// Compile a grammar from a JSON document
    pub fn from_json(source: &str) -> Result<Self, GrammarError> {
        Grammar::new(GrammarData::from_json(source)?)
    }

    /// Compile a grammar from a YAML document
    pub fn from_yaml(source: &str) -> Result<Self, GrammarError> {
        Grammar::new(GrammarData::from_yaml(source)?)
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Fresh state for a newly opened document: no open scopes, an empty
    /// substitution context.
    pub fn start_state(&self) -> GrammarState {
        GrammarState::new()
    }

    /// Match at `pos` in `text`. `offset` is the document coordinate of
    /// `pos`; when the caller scans a slice of a larger document, positions
    /// in the returned tree are corrected by the difference.
    pub fn match_at(
        &self,
        state: &mut GrammarState,
        text: &str,
        pos: usize,
        offset: usize,
    ) -> Option<Matched> {
        let (rules, end, node) = match state.stack.peek() {
            Some(frame) => (Arc::clone(&frame.rules), frame.end, frame.node),
            None => (Arc::clone(&self.top), None, NodeId::NONE),
        };

        let closed = end.and_then(|end_id| match self.repository.rule(end_id) {
            Rule::Scoped(scoped) => self.repository.close_scope(scoped, text, pos, state),
            _ => self
                .repository
                .match_rule(end_id, text, pos, state)
                .map(|m| {
                    state.stack.pop();
                    m.wrap(node, Boundary::End)
                }),
        });

        let matched = closed.or_else(|| {
            rules
                .iter()
                .find_map(|id| self.repository.match_rule(*id, text, pos, state))
        })?;

        if offset == pos {
            Some(matched)
        } else {
            Some(matched.offset(offset as isize - pos as isize))
        }
    }
}
