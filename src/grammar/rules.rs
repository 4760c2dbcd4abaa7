//! Compiled rule variants and their matching behavior
//!
//! The three rule shapes form one closed union dispatched by pattern match:
//!
//! - [`MatchRule`] - one pattern, optional per-capture sub-rules
//! - [`ScopedRule`] - a begin/end region that pushes a stack frame
//! - [`SwitchRule`] - ordered alternation, first non-None wins
//!
//! All three share the same contract: match at a position, return a
//! [`Matched`] tree or `None`. `None` is the ordinary outcome of trying an
//! alternative that doesn't apply; grammars are expected to attempt and fail
//! many alternatives per successfully emitted token.
//!
//! Matching needs the arena to resolve rule handles, so the match entry
//! points live on [`Repository`].

use std::sync::Arc;

use super::matched::{Boundary, Matched};
use super::matcher::PatternMatcher;
use super::repository::{CompiledRef, NodeId, Repository, RuleId};
use super::state::{Frame, GrammarState};

/// A compiled grammar rule
#[derive(Debug)]
pub enum Rule {
    Match(MatchRule),
    Scoped(ScopedRule),
    Switch(SwitchRule),
}

impl Rule {
    pub fn name(&self) -> &str {
        match self {
            Rule::Match(r) => &r.name,
            Rule::Scoped(r) => &r.name,
            Rule::Switch(r) => &r.name,
        }
    }

    /// The node this rule emits; the sentinel for structural rules
    pub fn node(&self) -> NodeId {
        match self {
            Rule::Match(r) => r.node,
            Rule::Scoped(r) => r.node,
            Rule::Switch(r) => r.node,
        }
    }
}

/// One pattern plus a per-capture-index table of sub-rules
#[derive(Debug)]
pub struct MatchRule {
    pub name: String,
    pub node: NodeId,
    pub matcher: PatternMatcher,
    pub captures: Vec<(u32, CompiledRef)>,
}

/// A begin/end region. Entry pushes a frame carrying the nested rules and
/// this rule as the frame's `end`; exit pops it.
#[derive(Debug)]
pub struct ScopedRule {
    pub name: String,
    pub node: NodeId,
    pub id: RuleId,
    pub begin: RuleId,
    pub end: RuleId,
    pub rules: Arc<[RuleId]>,
}

/// Ordered alternation over other rules
#[derive(Debug)]
pub struct SwitchRule {
    pub name: String,
    pub node: NodeId,
    pub rules: Arc<[RuleId]>,
}

impl Repository {
    /// Match one rule at `pos`
    pub fn match_rule(
        &self,
        id: RuleId,
        text: &str,
        pos: usize,
        state: &mut GrammarState,
    ) -> Option<Matched> {
        match self.rule(id) {
            Rule::Match(rule) => self.match_match(rule, text, pos, state),
            Rule::Scoped(rule) => self.open_scope(rule, text, pos, state),
            Rule::Switch(rule) => self.match_switch(rule, text, pos, state),
        }
    }

    fn match_match(
        &self,
        rule: &MatchRule,
        text: &str,
        pos: usize,
        state: &mut GrammarState,
    ) -> Option<Matched> {
        let raw = rule.matcher.match_at(text, pos, state)?;
        // Later rules (notably scoped end patterns) substitute from these.
        state.set_last(raw.clone());

        let mut matched = Matched::token(rule.node, raw[0].clone(), pos);
        if rule.captures.is_empty() {
            return Some(matched);
        }

        // Capture 0 spans the whole match and contributes no advance; groups
        // 1..N tile the match (enforced by the matcher), so their start
        // positions are running prefix sums.
        let mut starts = vec![pos; raw.len().max(1)];
        let mut running = pos;
        for group in 1..raw.len() {
            starts[group] = running;
            running += raw[group].len();
        }

        for (index, target) in &rule.captures {
            let group = *index as usize;
            let piece = raw.get(group).map(String::as_str).unwrap_or("");
            let start = starts.get(group).copied().unwrap_or(running);
            match *target {
                CompiledRef::Rule(sub) => match self.rule(sub) {
                    Rule::Switch(switch) => {
                        matched
                            .captures
                            .extend(self.tokenize_capture(switch, piece, start, state));
                    }
                    other => {
                        matched
                            .captures
                            .push(Matched::token(other.node(), piece.to_string(), start));
                    }
                },
                CompiledRef::Node(node) => {
                    matched
                        .captures
                        .push(Matched::token(node, piece.to_string(), start));
                }
            }
        }
        Some(matched)
    }

    /// Re-tokenize one captured substring against a switch's alternatives,
    /// one code point at a time. Positions matched by no alternative become
    /// 1-code-point children carrying the switch's own node, so a single big
    /// match can still emit fine-grained per-character styling inside one
    /// capture.
    fn tokenize_capture(
        &self,
        switch: &SwitchRule,
        piece: &str,
        start: usize,
        state: &mut GrammarState,
    ) -> Vec<Matched> {
        // Temporary scope: nested rules observe a frame for this capture,
        // and whatever they push is discarded with it.
        let saved = state.stack.clone();
        state.stack.push(Frame {
            node: switch.node,
            rules: Arc::clone(&switch.rules),
            end: None,
        });

        let mut children = Vec::new();
        let mut at = 0;
        while at < piece.len() {
            match self.match_switch(switch, piece, at, state) {
                Some(m) if !m.is_empty() => {
                    let advance = m.len();
                    children.push(m.offset(start as isize));
                    at += advance;
                }
                _ => {
                    let step = piece[at..].chars().next().map_or(1, char::len_utf8);
                    children.push(Matched::token(
                        switch.node,
                        piece[at..at + step].to_string(),
                        start + at,
                    ));
                    at += step;
                }
            }
        }

        state.stack = saved;
        children
    }

    fn match_switch(
        &self,
        rule: &SwitchRule,
        text: &str,
        pos: usize,
        state: &mut GrammarState,
    ) -> Option<Matched> {
        // Declaration order is priority order: the first alternative that
        // matches wins, unmodified.
        rule.rules
            .iter()
            .find_map(|id| self.match_rule(*id, text, pos, state))
    }

    fn open_scope(
        &self,
        rule: &ScopedRule,
        text: &str,
        pos: usize,
        state: &mut GrammarState,
    ) -> Option<Matched> {
        let begin = self.match_rule(rule.begin, text, pos, state)?;
        state.stack.push(Frame {
            node: rule.node,
            rules: Arc::clone(&rule.rules),
            end: Some(rule.id),
        });
        Some(begin.wrap(rule.node, Boundary::Begin))
    }

    /// Try to close this scope at `pos`. Only the dispatcher calls this, and
    /// only while this rule is the current frame's `end`; the rule itself
    /// does not validate that.
    pub fn close_scope(
        &self,
        rule: &ScopedRule,
        text: &str,
        pos: usize,
        state: &mut GrammarState,
    ) -> Option<Matched> {
        let end = self.match_rule(rule.end, text, pos, state)?;
        state.stack.pop();
        Some(end.wrap(rule.node, Boundary::End))
    }
}
