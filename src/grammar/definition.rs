//! Grammar definition data model
//!
//! A grammar is authored as a JSON-shaped document: an ordered `patterns` list
//! of rule items or `{include}` references, plus a `repository` of named rule
//! items. The shape of an item decides what it compiles to:
//!
//! - `match` present: a match rule (one regex, optional per-capture sub-rules)
//! - `begin`/`end` present: a scoped rule (a nested begin/end region)
//! - `patterns` alone: a switch rule (ordered alternation)
//! - none of the above: a bare token node (metadata only)
//!
//! All items share the optional `type`, `emit` and node-metadata fields. The
//! definition is authored once, compiled once, and never mutated afterwards.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Deserialize an integer-keyed capture map.
///
/// JSON/YAML object keys are strings; deserializing them straight into a
/// `BTreeMap<u32, _>` works for a direct deserialize but fails when the value
/// is buffered through serde's untagged-enum path (as `PatternEntry` is),
/// where keys arrive as strings the integer deserializer can't parse. Reading
/// the keys as strings here and parsing them works in both contexts.
fn deserialize_u32_keyed_map<'de, D, V>(deserializer: D) -> Result<BTreeMap<u32, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    let string_keyed: BTreeMap<String, V> = BTreeMap::deserialize(deserializer)?;
    string_keyed
        .into_iter()
        .map(|(key, value)| {
            key.parse::<u32>()
                .map(|key| (key, value))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

use super::error::GrammarError;

/// A complete grammar definition: top-level patterns plus a named repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrammarData {
    #[serde(default)]
    pub patterns: Vec<PatternEntry>,
    #[serde(default)]
    pub repository: HashMap<String, RuleItem>,
}

impl GrammarData {
    /// Load a grammar definition from a JSON document
    pub fn from_json(source: &str) -> Result<Self, GrammarError> {
        serde_json::from_str(source).map_err(|e| GrammarError::InvalidDefinition(e.to_string()))
    }

    /// Load a grammar definition from a YAML document
    pub fn from_yaml(source: &str) -> Result<Self, GrammarError> {
        serde_yaml::from_str(source).map_err(|e| GrammarError::InvalidDefinition(e.to_string()))
    }
}

/// One entry in a `patterns` list: either a reference into the repository or
/// an inline rule item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternEntry {
    Include(IncludeRef),
    Item(Box<RuleItem>),
}

/// A `{"include": "#name"}` reference into the repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeRef {
    pub include: String,
}

/// One authored rule item. The populated fields decide the compiled shape;
/// the metadata fields are copied onto the emitted token node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleItem {
    /// Token kind name; doubles as the repository key for inline items
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// `false` suppresses node emission (the match stays structural)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit: Option<bool>,

    // Node metadata, copied verbatim onto the emitted node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub indent: bool,
    #[serde(default, rename = "openedBy", skip_serializing_if = "Vec::is_empty")]
    pub opened_by: Vec<String>,
    #[serde(default, rename = "closedBy", skip_serializing_if = "Vec::is_empty")]
    pub closed_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub autocomplete: Vec<String>,

    // Match rule fields
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_u32_keyed_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub captures: BTreeMap<u32, RuleItem>,

    // Scoped rule fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(
        default,
        rename = "beginCaptures",
        deserialize_with = "deserialize_u32_keyed_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub begin_captures: BTreeMap<u32, RuleItem>,
    #[serde(
        default,
        rename = "endCaptures",
        deserialize_with = "deserialize_u32_keyed_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub end_captures: BTreeMap<u32, RuleItem>,

    // Scoped and switch rule fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternEntry>>,
}

/// Normalize a match item before compilation.
///
/// If the item declares no captures but carries a `tag`, a whole-match capture
/// at index 0 is synthesized to carry that tag, and the tag is removed from the
/// parent item. This makes "whole match becomes capture 0" an explicit one-time
/// transformation instead of an implicit default inside the matcher.
pub fn normalize_match_item(item: &RuleItem) -> RuleItem {
    let mut normalized = item.clone();
    if normalized.captures.is_empty() {
        if let Some(tag) = normalized.tag.take() {
            let capture = RuleItem {
                tag: Some(tag),
                ..RuleItem::default()
            };
            normalized.captures.insert(0, capture);
        }
    }
    normalized
}
