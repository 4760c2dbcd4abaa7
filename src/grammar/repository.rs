//! Rule repository and compiler
//!
//! The repository compiles authored rule items into an arena of rules and
//! token nodes addressed by integer handles. Handles rather than references
//! keep mutually recursive grammars simple: a rule's handle is registered
//! under its name before its own nested patterns are resolved, so a rule may
//! include itself (directly or through a cycle) without forward declarations.
//!
//! Compilation is reference-driven: repository entries compile when first
//! included, and `add` is idempotent by name. If two call sites register
//! different bodies under one name, the first registration wins and the
//! second body is discarded - names are global identifiers, not scopes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::definition::{normalize_match_item, PatternEntry, RuleItem};
use super::error::{CompileResult, GrammarError};
use super::matcher::PatternMatcher;
use super::rules::{MatchRule, Rule, ScopedRule, SwitchRule};

/// Handle of an emitted token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    /// The sentinel "matched, but emits no token" node
    pub const NONE: NodeId = NodeId(0);

    pub fn is_none(self) -> bool {
        self == NodeId::NONE
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: u32) -> NodeId {
        NodeId(index)
    }
}

/// Handle of a compiled rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u32);

impl RuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An emitted token kind: a stable id plus the metadata its rule item carried
#[derive(Debug, Clone, PartialEq)]
pub struct ParserNode {
    pub id: NodeId,
    pub name: String,
    pub tag: Option<String>,
    pub fold: bool,
    pub indent: bool,
    pub opened_by: Vec<String>,
    pub closed_by: Vec<String>,
    pub autocomplete: Vec<String>,
}

impl ParserNode {
    fn none() -> ParserNode {
        ParserNode {
            id: NodeId::NONE,
            name: String::new(),
            tag: None,
            fold: false,
            indent: false,
            opened_by: Vec::new(),
            closed_by: Vec::new(),
            autocomplete: Vec::new(),
        }
    }
}

/// What a name resolves to: a matchable rule or a bare token node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompiledRef {
    Node(NodeId),
    Rule(RuleId),
}

/// The name registry and arena produced by compiling a grammar definition.
/// Immutable once compilation finishes; safe to share read-only.
#[derive(Debug)]
pub struct Repository {
    raw: HashMap<String, RuleItem>,
    nodes: Vec<ParserNode>,
    rules: Vec<Rule>,
    names: HashMap<String, CompiledRef>,
    anon: u32,
}

impl Repository {
    /// Create a repository over the authored named items. Nothing compiles
    /// until a name is referenced or an item is added.
    pub fn new(raw: HashMap<String, RuleItem>) -> Self {
        Repository {
            raw,
            nodes: vec![ParserNode::none()],
            rules: Vec::new(),
            names: HashMap::new(),
            anon: 0,
        }
    }

    /// Compile one rule item. The item's `type` (or `fallback` when unset)
    /// becomes its registry name; an existing entry under that name is
    /// returned unchanged (first registration wins).
    pub fn add(&mut self, item: &RuleItem, fallback: Option<&str>) -> CompileResult<CompiledRef> {
        let had_type = item.kind.is_some() || fallback.is_some();
        let name = match item.kind.as_deref().or(fallback) {
            Some(n) => n.to_string(),
            None => {
                self.anon += 1;
                format!("_anon{}", self.anon)
            }
        };
        if let Some(&cached) = self.names.get(&name) {
            return Ok(cached);
        }

        if item.match_pattern.is_some() {
            self.compile_match(&name, item, had_type)
        } else if item.begin.is_some() {
            self.compile_scoped(&name, item, had_type)
        } else if item.patterns.is_some() {
            self.compile_switch(&name, item, had_type)
        } else {
            let id = self.new_node(&name, item);
            self.names.insert(name, CompiledRef::Node(id));
            Ok(CompiledRef::Node(id))
        }
    }

    /// Look up a compiled name. The repository must already hold it; this
    /// never compiles.
    pub fn get(&self, name: &str) -> CompileResult<CompiledRef> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| GrammarError::UnknownReference(name.to_string()))
    }

    /// Resolve a `#name` or bare-name reference into a one-element rule
    /// list, compiling the named repository item on first use.
    pub fn include(&mut self, name: &str) -> CompileResult<Vec<RuleId>> {
        let key = name.strip_prefix('#').unwrap_or(name);
        if let Some(&cached) = self.names.get(key) {
            let id = self.rule_ref(cached, key)?;
            return Ok(vec![id]);
        }
        let Some(item) = self.raw.get(key).cloned() else {
            return Err(GrammarError::UnknownReference(name.to_string()));
        };
        let compiled = self.add(&item, Some(key))?;
        // Alias the repository key as well when the item's own type differs,
        // so later includes hit the cache.
        self.names.entry(key.to_string()).or_insert(compiled);
        let id = self.rule_ref(compiled, key)?;
        Ok(vec![id])
    }

    /// Expand an ordered list of `{include}` references and inline items into
    /// a flat ordered rule list. List order becomes match-alternative priority.
    pub fn patterns(
        &mut self,
        entries: &[PatternEntry],
        fallback: Option<&str>,
    ) -> CompileResult<Arc<[RuleId]>> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                PatternEntry::Include(inc) => out.extend(self.include(&inc.include)?),
                PatternEntry::Item(item) => {
                    let compiled = self.add(item, fallback)?;
                    let shown = item.kind.as_deref().unwrap_or("inline item");
                    out.push(self.rule_ref(compiled, shown)?);
                }
            }
        }
        Ok(out.into())
    }

    pub fn node(&self, id: NodeId) -> &ParserNode {
        &self.nodes[id.index()]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn compile_match(
        &mut self,
        name: &str,
        item: &RuleItem,
        had_type: bool,
    ) -> CompileResult<CompiledRef> {
        let normalized = normalize_match_item(item);
        let node = self.emission_node(name, &normalized, had_type);
        let id = self.reserve();
        self.names.insert(name.to_string(), CompiledRef::Rule(id));

        let matcher = PatternMatcher::new(
            normalized.match_pattern.as_deref().unwrap_or_default(),
            normalized.flags.as_deref(),
        )?;
        let mut captures = Vec::with_capacity(normalized.captures.len());
        for (index, sub) in &normalized.captures {
            let capture_name = format!("{}_c{}", name, index);
            let target = self.add(sub, Some(&capture_name))?;
            captures.push((*index, target));
        }

        self.rules[id.index()] = Rule::Match(MatchRule {
            name: name.to_string(),
            node,
            matcher,
            captures,
        });
        Ok(CompiledRef::Rule(id))
    }

    fn compile_scoped(
        &mut self,
        name: &str,
        item: &RuleItem,
        had_type: bool,
    ) -> CompileResult<CompiledRef> {
        let node = self.emission_node(name, item, had_type);
        let id = self.reserve();
        self.names.insert(name.to_string(), CompiledRef::Rule(id));

        let begin_item = RuleItem {
            kind: Some(format!("{}_begin", name)),
            match_pattern: Some(item.begin.clone().unwrap_or_default()),
            flags: item.flags.clone(),
            captures: item.begin_captures.clone(),
            ..RuleItem::default()
        };
        let begin = {
            let compiled = self.add(&begin_item, None)?;
            self.rule_ref(compiled, name)?
        };

        let end_item = RuleItem {
            kind: Some(format!("{}_end", name)),
            match_pattern: Some(item.end.clone().unwrap_or_default()),
            flags: item.flags.clone(),
            captures: item.end_captures.clone(),
            ..RuleItem::default()
        };
        let end = {
            let compiled = self.add(&end_item, None)?;
            self.rule_ref(compiled, name)?
        };

        let rules = match &item.patterns {
            Some(entries) => self.patterns(entries, None)?,
            None => Vec::new().into(),
        };

        self.rules[id.index()] = Rule::Scoped(ScopedRule {
            name: name.to_string(),
            node,
            id,
            begin,
            end,
            rules,
        });
        Ok(CompiledRef::Rule(id))
    }

    fn compile_switch(
        &mut self,
        name: &str,
        item: &RuleItem,
        had_type: bool,
    ) -> CompileResult<CompiledRef> {
        let node = self.emission_node(name, item, had_type);
        let id = self.reserve();
        self.names.insert(name.to_string(), CompiledRef::Rule(id));

        let entries = item.patterns.clone().unwrap_or_default();
        let rules = self.patterns(&entries, None)?;

        self.rules[id.index()] = Rule::Switch(SwitchRule {
            name: name.to_string(),
            node,
            rules,
        });
        Ok(CompiledRef::Rule(id))
    }

    /// A node is emitted only for items with an explicit type (after fallback
    /// defaulting) that either don't suppress emission or feed autocompletion.
    /// Everything else matches structurally under the sentinel node.
    fn emission_node(&mut self, name: &str, item: &RuleItem, had_type: bool) -> NodeId {
        if had_type && (item.emit != Some(false) || !item.autocomplete.is_empty()) {
            self.new_node(name, item)
        } else {
            NodeId::NONE
        }
    }

    fn new_node(&mut self, name: &str, item: &RuleItem) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(ParserNode {
            id,
            name: name.to_string(),
            tag: item.tag.clone(),
            fold: item.fold,
            indent: item.indent,
            opened_by: item.opened_by.clone(),
            closed_by: item.closed_by.clone(),
            autocomplete: item.autocomplete.clone(),
        });
        id
    }

    /// Reserve an arena slot so the rule's handle can be registered (and
    /// referenced recursively) before its body is built. The placeholder is
    /// never matched against: rule bodies are only read once compilation has
    /// filled every reserved slot.
    fn reserve(&mut self) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(Rule::Switch(SwitchRule {
            name: String::new(),
            node: NodeId::NONE,
            rules: Vec::new().into(),
        }));
        id
    }

    fn rule_ref(&self, compiled: CompiledRef, name: &str) -> CompileResult<RuleId> {
        match compiled {
            CompiledRef::Rule(id) => Ok(id),
            CompiledRef::Node(_) => Err(GrammarError::NotMatchable(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_item(kind: &str, pattern: &str) -> RuleItem {
        RuleItem {
            kind: Some(kind.to_string()),
            match_pattern: Some(pattern.to_string()),
            ..RuleItem::default()
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut repo = Repository::new(HashMap::new());
        let item = match_item("word", "[a-z]+");
        let first = repo.add(&item, None).expect("compile");
        let second = repo.add(&item, None).expect("compile");
        assert_eq!(first, second, "same name must yield the identical handle");
    }

    #[test]
    fn test_first_registration_wins() {
        let mut repo = Repository::new(HashMap::new());
        let first = repo
            .add(&match_item("word", "[a-z]+"), None)
            .expect("compile");
        let second = repo
            .add(&match_item("word", "[0-9]+"), None)
            .expect("compile");
        assert_eq!(first, second);
        let CompiledRef::Rule(id) = first else {
            panic!("expected a rule");
        };
        let Rule::Match(rule) = repo.rule(id) else {
            panic!("expected a match rule");
        };
        assert_eq!(rule.matcher.pattern(), "[a-z]+", "second body is discarded");
    }

    #[test]
    fn test_get_unknown_name_errors() {
        let repo = Repository::new(HashMap::new());
        assert!(matches!(
            repo.get("missing"),
            Err(GrammarError::UnknownReference(_))
        ));
    }

    #[test]
    fn test_include_strips_hash_prefix() {
        let mut raw = HashMap::new();
        raw.insert("word".to_string(), match_item("word", "[a-z]+"));
        let mut repo = Repository::new(raw);
        let by_hash = repo.include("#word").expect("include");
        let bare = repo.include("word").expect("include");
        assert_eq!(by_hash, bare);
        assert_eq!(by_hash.len(), 1);
    }

    #[test]
    fn test_include_unknown_name_errors() {
        let mut repo = Repository::new(HashMap::new());
        assert!(matches!(
            repo.include("#missing"),
            Err(GrammarError::UnknownReference(_))
        ));
    }

    #[test]
    fn test_include_of_bare_node_is_not_matchable() {
        let mut raw = HashMap::new();
        raw.insert(
            "meta".to_string(),
            RuleItem {
                kind: Some("meta".to_string()),
                ..RuleItem::default()
            },
        );
        let mut repo = Repository::new(raw);
        assert!(matches!(
            repo.include("#meta"),
            Err(GrammarError::NotMatchable(_))
        ));
    }

    #[test]
    fn test_repository_key_names_untyped_items() {
        let mut raw = HashMap::new();
        raw.insert(
            "number".to_string(),
            RuleItem {
                match_pattern: Some("[0-9]+".to_string()),
                ..RuleItem::default()
            },
        );
        let mut repo = Repository::new(raw);
        let ids = repo.include("#number").expect("include");
        let Rule::Match(rule) = repo.rule(ids[0]) else {
            panic!("expected a match rule");
        };
        assert_eq!(rule.name, "number");
        assert!(!rule.node.is_none(), "repository key counts as the type");
    }

    #[test]
    fn test_patterns_preserve_order() {
        let mut repo = Repository::new(HashMap::new());
        let entries = vec![
            PatternEntry::Item(Box::new(match_item("first", "a"))),
            PatternEntry::Item(Box::new(match_item("second", "b"))),
        ];
        let rules = repo.patterns(&entries, None).expect("compile");
        assert_eq!(rules.len(), 2);
        assert_eq!(repo.rule(rules[0]).name(), "first");
        assert_eq!(repo.rule(rules[1]).name(), "second");
    }

    #[test]
    fn test_untyped_item_matches_structurally() {
        let mut repo = Repository::new(HashMap::new());
        let item = RuleItem {
            match_pattern: Some("\\s+".to_string()),
            ..RuleItem::default()
        };
        let compiled = repo.add(&item, None).expect("compile");
        let CompiledRef::Rule(id) = compiled else {
            panic!("expected a rule");
        };
        assert!(repo.rule(id).node().is_none(), "no type means no emission");
    }

    #[test]
    fn test_emit_false_suppresses_node() {
        let mut repo = Repository::new(HashMap::new());
        let item = RuleItem {
            emit: Some(false),
            ..match_item("ws", "\\s+")
        };
        let CompiledRef::Rule(id) = repo.add(&item, None).expect("compile") else {
            panic!("expected a rule");
        };
        assert!(repo.rule(id).node().is_none());
    }

    #[test]
    fn test_autocomplete_overrides_emit_false() {
        let mut repo = Repository::new(HashMap::new());
        let item = RuleItem {
            emit: Some(false),
            autocomplete: vec!["if".to_string(), "else".to_string()],
            ..match_item("keyword", "if|else")
        };
        let CompiledRef::Rule(id) = repo.add(&item, None).expect("compile") else {
            panic!("expected a rule");
        };
        let node = repo.rule(id).node();
        assert!(!node.is_none(), "autocomplete keeps the node alive");
        assert_eq!(repo.node(node).autocomplete.len(), 2);
    }

    #[test]
    fn test_node_metadata_copied() {
        let mut repo = Repository::new(HashMap::new());
        let item = RuleItem {
            kind: Some("block".to_string()),
            begin: Some("\\{".to_string()),
            end: Some("\\}".to_string()),
            fold: true,
            indent: true,
            opened_by: vec!["open".to_string()],
            closed_by: vec!["close".to_string()],
            ..RuleItem::default()
        };
        let CompiledRef::Rule(id) = repo.add(&item, None).expect("compile") else {
            panic!("expected a rule");
        };
        let node = repo.node(repo.rule(id).node());
        assert!(node.fold);
        assert!(node.indent);
        assert_eq!(node.opened_by, vec!["open".to_string()]);
        assert_eq!(node.closed_by, vec!["close".to_string()]);
    }

    #[test]
    fn test_scoped_rule_compiles_begin_and_end() {
        let mut repo = Repository::new(HashMap::new());
        let item = RuleItem {
            kind: Some("paren".to_string()),
            begin: Some("\\(".to_string()),
            end: Some("\\)".to_string()),
            ..RuleItem::default()
        };
        repo.add(&item, None).expect("compile");
        assert!(repo.get("paren_begin").is_ok());
        assert!(repo.get("paren_end").is_ok());
    }

    #[test]
    fn test_self_recursive_scoped_rule() {
        let mut raw = HashMap::new();
        raw.insert(
            "paren".to_string(),
            RuleItem {
                kind: Some("paren".to_string()),
                begin: Some("\\(".to_string()),
                end: Some("\\)".to_string()),
                patterns: Some(vec![PatternEntry::Include(
                    crate::grammar::definition::IncludeRef {
                        include: "#paren".to_string(),
                    },
                )]),
                ..RuleItem::default()
            },
        );
        let mut repo = Repository::new(raw);
        let ids = repo.include("#paren").expect("recursive include compiles");
        let Rule::Scoped(scoped) = repo.rule(ids[0]) else {
            panic!("expected a scoped rule");
        };
        assert_eq!(scoped.rules.as_ref(), &[ids[0]], "nested list points back at itself");
    }

    #[test]
    fn test_invalid_pattern_surfaces_at_compile_time() {
        let mut repo = Repository::new(HashMap::new());
        let item = match_item("broken", "(");
        assert!(matches!(
            repo.add(&item, None),
            Err(GrammarError::InvalidPattern { .. })
        ));
    }
}
