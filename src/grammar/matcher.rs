//! Sticky pattern matching
//!
//! [`PatternMatcher`] wraps one regular expression with sticky semantics:
//! a match is always anchored at the caller-supplied position and never
//! searches forward. Anchoring is achieved by slicing the haystack at the
//! position and compiling the pattern as `^(?:...)`.
//!
//! Two match paths exist. Patterns without capturing groups take a find-only
//! fast path that skips capture-group resolution entirely; the common case of
//! literal keyword and punctuation rules never pays for captures. Patterns
//! with groups run `find` first as a cheap pre-filter, then extract captures,
//! normalizing unparticipating optional groups to the empty string.
//!
//! Patterns may contain `$N` (capture N of the most recent match) or
//! `$ctx:name` (a context entry) placeholders. Such a pattern is a template:
//! it is resolved against the state at match time, with the substituted text
//! regex-escaped, and the resolved pattern is compiled on demand and memoized
//! process-wide. This is what lets a scoped rule's end pattern require the
//! exact delimiter its begin pattern captured.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

use super::error::GrammarError;
use super::state::GrammarState;

/// Placeholder references, plus escaped pairs which are passed through
/// untouched so `\$1` in a pattern stays literal.
static SUBST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\\.)|\$ctx:([A-Za-z_][A-Za-z0-9_-]*)|\$([0-9]+)").unwrap()
});

/// Resolved template patterns compiled once per distinct resolution
static TEMPLATE_MEMO: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// One compiled pattern with sticky matching semantics
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    /// The raw authored pattern, kept for error reporting
    pattern: String,
    kind: MatcherKind,
}

#[derive(Debug, Clone)]
enum MatcherKind {
    /// No placeholders: compiled once at grammar-compile time
    Static { re: Regex, has_groups: bool },
    /// Placeholders present: resolved and compiled per match attempt,
    /// memoized by resolved source
    Template { anchored: String },
}

impl PatternMatcher {
    /// Compile a pattern, translating authoring-time flags (`i`, `m`, `s`,
    /// `x`, `U`) into inline flags. JS-only flags (`g`, `y`, `u`, `d`) are
    /// accepted and ignored since their behavior is implied here.
    pub fn new(pattern: &str, flags: Option<&str>) -> Result<Self, GrammarError> {
        let inline = translate_flags(pattern, flags)?;
        let anchored = if inline.is_empty() {
            format!("^(?:{})", pattern)
        } else {
            format!("^(?{}:{})", inline, pattern)
        };

        if has_placeholders(pattern) {
            // Probe-compile with empty substitutions so syntax errors still
            // surface at grammar-compile time.
            let probe = substitute(&anchored, true, |_| None, |_| None);
            Regex::new(&probe).map_err(|e| GrammarError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            Ok(PatternMatcher {
                pattern: pattern.to_string(),
                kind: MatcherKind::Template { anchored },
            })
        } else {
            let re = Regex::new(&anchored).map_err(|e| GrammarError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            let has_groups = re.captures_len() > 1;
            Ok(PatternMatcher {
                pattern: pattern.to_string(),
                kind: MatcherKind::Static { re, has_groups },
            })
        }
    }

    /// The raw authored pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern matches exactly at `pos`
    pub fn test(&self, text: &str, pos: usize, state: &GrammarState) -> bool {
        match &self.kind {
            MatcherKind::Static { re, .. } => re.find(&text[pos..]).is_some(),
            MatcherKind::Template { anchored } => match resolve_template(anchored, state) {
                Some(re) => re.find(&text[pos..]).is_some(),
                None => false,
            },
        }
    }

    /// Match at `pos`. Returns the total match at index 0 followed by one
    /// entry per capturing group, or `None` if the pattern does not match
    /// exactly at `pos`.
    ///
    /// # Panics
    ///
    /// Panics with "Invalid capturing group lengths" if the capturing groups
    /// of a matching pattern do not tile the total match. The capture-offset
    /// bookkeeping above this matcher would silently misplace later tokens
    /// otherwise, so a violation is treated as a malformed-grammar defect.
    pub fn match_at(&self, text: &str, pos: usize, state: &GrammarState) -> Option<Vec<String>> {
        match &self.kind {
            MatcherKind::Static { re, has_groups } => {
                self.run(re, *has_groups, &text[pos..])
            }
            MatcherKind::Template { anchored } => {
                let re = resolve_template(anchored, state)?;
                let has_groups = re.captures_len() > 1;
                self.run(&re, has_groups, &text[pos..])
            }
        }
    }

    fn run(&self, re: &Regex, has_groups: bool, hay: &str) -> Option<Vec<String>> {
        // The `^` anchor makes a successful find start at 0, so the match
        // length falls out of the end position alone.
        let found = re.find(hay)?;
        if !has_groups {
            return Some(vec![found.as_str().to_string()]);
        }

        let caps = re.captures(hay)?;
        let total = caps.get(0).map_or(0, |g| g.as_str().len());
        let mut out = Vec::with_capacity(caps.len());
        let mut group_sum = 0;
        for i in 0..caps.len() {
            let piece = caps.get(i).map_or("", |g| g.as_str());
            if i > 0 {
                group_sum += piece.len();
            }
            out.push(piece.to_string());
        }
        assert!(
            group_sum == total,
            "Invalid capturing group lengths in `{}`",
            self.pattern
        );
        Some(out)
    }
}

/// Whether a pattern contains unescaped `$N` / `$ctx:name` placeholders
fn has_placeholders(pattern: &str) -> bool {
    SUBST_RE
        .captures_iter(pattern)
        .any(|c| c.get(2).is_some() || c.get(3).is_some())
}

/// Resolve a template's placeholders against the state and compile it,
/// memoizing by resolved source. A post-substitution compile failure is
/// reported as a non-match; substituted text is escaped, so this only
/// happens when the surrounding pattern gives it quantifier meaning.
fn resolve_template(anchored: &str, state: &GrammarState) -> Option<Regex> {
    let resolved = substitute(
        anchored,
        true,
        |name| state.get(name).map(str::to_string),
        |n| state.last_capture(n).map(str::to_string),
    );
    let mut memo = TEMPLATE_MEMO.lock().expect("template memo poisoned");
    if let Some(re) = memo.get(&resolved) {
        return Some(re.clone());
    }
    let re = Regex::new(&resolved).ok()?;
    memo.insert(resolved, re.clone());
    Some(re)
}

/// Replace `$ctx:name` and `$N` references in `input`. Missing references
/// resolve to the empty string; escaped pairs pass through untouched. With
/// `escape` set the substituted text is regex-escaped (pattern position),
/// otherwise it is inserted verbatim (value position).
pub(crate) fn substitute(
    input: &str,
    escape: bool,
    ctx: impl Fn(&str) -> Option<String>,
    capture: impl Fn(usize) -> Option<String>,
) -> String {
    SUBST_RE
        .replace_all(input, |caps: &regex::Captures| {
            if let Some(pair) = caps.get(1) {
                return pair.as_str().to_string();
            }
            let value = if let Some(name) = caps.get(2) {
                ctx(name.as_str())
            } else {
                let n: usize = caps[3].parse().unwrap_or(usize::MAX);
                capture(n)
            }
            .unwrap_or_default();
            if escape {
                regex::escape(&value)
            } else {
                value
            }
        })
        .into_owned()
}

fn translate_flags(pattern: &str, flags: Option<&str>) -> Result<String, GrammarError> {
    let mut inline = String::new();
    for c in flags.unwrap_or_default().chars() {
        match c {
            'i' | 'm' | 's' | 'x' | 'U' => inline.push(c),
            'g' | 'y' | 'u' | 'd' => {}
            other => {
                return Err(GrammarError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: format!("unsupported flag `{}`", other),
                })
            }
        }
    }
    Ok(inline)
}
