//! Per-document matching state
//!
//! A [`GrammarState`] is created once per open document and threaded through
//! every match call. It carries three things: the stack of currently open
//! scopes, a string substitution context, and the raw captures of the most
//! recent successful match (for `$N` backreference substitution).
//!
//! The equality and cloning semantics here are load-bearing: an incremental
//! reparser compares a freshly advanced state against a cached one to decide
//! whether an unchanged region of a document can be reused after an edit.
//! To keep that comparison cheap, the stack is a persistent, structurally
//! shared list (cloning is O(1) and shares no mutable spine) and the context
//! is copy-on-write (each `set` produces a new map, so clones can keep the
//! old one by pointer).

use std::collections::HashMap;
use std::sync::Arc;

use super::matcher::substitute;
use super::repository::{NodeId, RuleId};

/// One open scope: the node it will emit, the rules active inside it, and
/// the rule that can close it.
///
/// Frames are pushed only by scoped-rule entry and popped only by matching
/// that frame's own end rule, so the stack depth always equals the current
/// nesting level.
#[derive(Debug, Clone)]
pub struct Frame {
    pub node: NodeId,
    pub rules: Arc<[RuleId]>,
    pub end: Option<RuleId>,
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
            && self.end == other.end
            && (Arc::ptr_eq(&self.rules, &other.rules) || self.rules == other.rules)
    }
}

#[derive(Debug)]
struct StackNode {
    frame: Frame,
    below: Option<Arc<StackNode>>,
}

/// A persistent stack of open scopes. Pushing and popping never mutate
/// shared nodes, so a cloned stack evolves independently of the original.
#[derive(Debug, Clone, Default)]
pub struct GrammarStack {
    top: Option<Arc<StackNode>>,
    depth: usize,
}

impl GrammarStack {
    pub fn new() -> Self {
        GrammarStack::default()
    }

    /// Number of open scopes
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// The innermost open scope, if any
    pub fn peek(&self) -> Option<&Frame> {
        self.top.as_deref().map(|node| &node.frame)
    }

    pub fn push(&mut self, frame: Frame) {
        self.top = Some(Arc::new(StackNode {
            frame,
            below: self.top.take(),
        }));
        self.depth += 1;
    }

    /// Remove and return the innermost scope.
    ///
    /// # Panics
    ///
    /// Panics with "stack underflow" when the stack is empty - a close
    /// without a matching open is a caller bug, never a normal outcome.
    pub fn pop(&mut self) -> Frame {
        let Some(node) = self.top.take() else {
            panic!("stack underflow");
        };
        self.top = node.below.clone();
        self.depth -= 1;
        node.frame.clone()
    }

    /// Frame-by-frame equality, with a pointer fast path for shared spines
    pub fn equals(&self, other: &GrammarStack) -> bool {
        if self.depth != other.depth {
            return false;
        }
        let mut a = self.top.as_ref();
        let mut b = other.top.as_ref();
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(x, y) {
                        return true;
                    }
                    if x.frame != y.frame {
                        return false;
                    }
                    a = x.below.as_ref();
                    b = y.below.as_ref();
                }
                _ => return false,
            }
        }
    }
}

/// Per-document mutable state: open scopes, substitution context, and the
/// raw captures of the most recent successful match
#[derive(Debug, Clone, Default)]
pub struct GrammarState {
    context: Arc<HashMap<String, String>>,
    pub stack: GrammarStack,
    last: Option<Arc<Vec<String>>>,
}

impl GrammarState {
    pub fn new() -> Self {
        GrammarState::default()
    }

    /// Read a context entry
    pub fn get(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    /// Write or remove a context entry. `$ctx:name` and `$N` references in
    /// the value are resolved before storing. The context map is never
    /// mutated in place; each call installs a fresh map so clones sharing
    /// the previous one are unaffected.
    pub fn set(&mut self, key: &str, value: Option<&str>) {
        let mut next = (*self.context).clone();
        match value {
            Some(raw) => {
                let resolved = substitute(
                    raw,
                    false,
                    |name| self.get(name).map(str::to_string),
                    |n| self.last_capture(n).map(str::to_string),
                );
                next.insert(key.to_string(), resolved);
            }
            None => {
                next.remove(key);
            }
        }
        self.context = Arc::new(next);
    }

    /// The raw captures of the most recent successful match
    pub fn last(&self) -> Option<&[String]> {
        self.last.as_deref().map(Vec::as_slice)
    }

    pub(crate) fn last_capture(&self, n: usize) -> Option<&str> {
        self.last.as_deref().and_then(|raw| raw.get(n)).map(String::as_str)
    }

    pub(crate) fn set_last(&mut self, raw: Vec<String>) {
        self.last = Some(Arc::new(raw));
    }

    /// The equality contract consumed by incremental reparsing: shallow
    /// key/value equality of the context plus frame-by-frame equality of
    /// the stack. `last` is transient scratch data and takes no part.
    pub fn equals(&self, other: &GrammarState) -> bool {
        let context_eq =
            Arc::ptr_eq(&self.context, &other.context) || *self.context == *other.context;
        context_eq && self.stack.equals(&other.stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(node: u32) -> Frame {
        Frame {
            node: NodeId::from_index(node),
            rules: Vec::new().into(),
            end: None,
        }
    }

    #[test]
    fn test_push_pop_depth() {
        let mut stack = GrammarStack::new();
        assert_eq!(stack.depth(), 0);
        stack.push(frame(1));
        stack.push(frame(2));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().node, NodeId::from_index(2));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    #[should_panic(expected = "stack underflow")]
    fn test_pop_empty_underflows() {
        GrammarStack::new().pop();
    }

    #[test]
    fn test_clone_evolves_independently() {
        let mut original = GrammarStack::new();
        original.push(frame(1));
        let mut cloned = original.clone();
        cloned.push(frame(2));
        assert_eq!(original.depth(), 1);
        assert_eq!(cloned.depth(), 2);
        cloned.pop();
        cloned.pop();
        assert_eq!(original.depth(), 1, "pops on the clone must not alias");
    }

    #[test]
    fn test_stack_equals_by_frames() {
        let mut a = GrammarStack::new();
        let mut b = GrammarStack::new();
        a.push(frame(1));
        b.push(frame(1));
        assert!(a.equals(&b));
        b.push(frame(2));
        assert!(!a.equals(&b));
    }

    #[test]
    fn test_context_set_and_get() {
        let mut state = GrammarState::new();
        state.set("lang", Some("js"));
        assert_eq!(state.get("lang"), Some("js"));
        state.set("lang", None);
        assert_eq!(state.get("lang"), None);
    }

    #[test]
    fn test_context_is_copy_on_write() {
        let mut state = GrammarState::new();
        state.set("a", Some("1"));
        let snapshot = state.clone();
        state.set("b", Some("2"));
        assert_eq!(snapshot.get("b"), None, "clone keeps the old map");
        assert_eq!(state.get("b"), Some("2"));
    }

    #[test]
    fn test_set_resolves_capture_reference() {
        let mut state = GrammarState::new();
        state.set_last(vec!["```js".to_string(), "js".to_string()]);
        state.set("lang", Some("$1"));
        assert_eq!(state.get("lang"), Some("js"));
    }

    #[test]
    fn test_set_resolves_context_reference() {
        let mut state = GrammarState::new();
        state.set("open", Some("%%"));
        state.set("close", Some("$ctx:open"));
        assert_eq!(state.get("close"), Some("%%"));
    }

    #[test]
    fn test_equals_after_clone() {
        let mut state = GrammarState::new();
        state.set("k", Some("v"));
        state.stack.push(frame(3));
        let cloned = state.clone();
        assert!(cloned.equals(&state));
        assert!(state.equals(&cloned));
    }

    #[test]
    fn test_equals_ignores_last() {
        let state = GrammarState::new();
        let mut other = state.clone();
        other.set_last(vec!["x".to_string()]);
        assert!(state.equals(&other));
    }

    #[test]
    fn test_equals_diverges_on_context() {
        let state = GrammarState::new();
        let mut other = state.clone();
        other.set("k", Some("v"));
        assert!(!state.equals(&other));
    }
}
