//! Suppression of accepted violations.

use std::collections::HashMap;

use tracing::warn;

use crate::config::WhitelistEntry;
use crate::error::NotFoundError;
use crate::pattern::{segments, PathPattern, PatternError};
use crate::rule::RuleSet;
use crate::types::Violation;

/// Prefix trie over path segments; a terminal node holds an entry index.
#[derive(Debug, Default)]
struct PrefixTrie {
    children: HashMap<String, PrefixTrie>,
    entry: Option<usize>,
}

impl PrefixTrie {
    fn insert(&mut self, prefix: &str, entry: usize) {
        let mut node = self;
        for segment in segments(prefix) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.entry.get_or_insert(entry);
    }

    /// Lowest entry index among the prefixes strictly above `path`.
    fn find(&self, path: &str) -> Option<usize> {
        let mut found: Option<usize> = None;
        let mut node = self;
        for (depth, part) in segments(path).enumerate() {
            if depth > 0 {
                found = match (found, node.entry) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
            match node.children.get(part) {
                Some(child) => node = child,
                None => break,
            }
        }
        found
    }
}

#[derive(Debug, Default)]
struct RuleEntries {
    exact: HashMap<String, usize>,
    prefixes: PrefixTrie,
}

/// Whitelist entries indexed by rule name.
///
/// Lookups cost O(path depth) regardless of how many entries exist.
#[derive(Debug, Default)]
pub struct WhitelistIndex {
    entries: Vec<WhitelistEntry>,
    by_rule: HashMap<String, RuleEntries>,
}

impl WhitelistIndex {
    /// Indexes `entries`.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] for a path that is not an exact path or a
    /// trailing `/**` prefix.
    pub fn build(entries: &[WhitelistEntry]) -> Result<Self, PatternError> {
        let mut index = Self {
            entries: entries.to_vec(),
            by_rule: HashMap::new(),
        };
        for (i, entry) in entries.iter().enumerate() {
            let bucket = index.by_rule.entry(entry.rule.clone()).or_default();
            match PathPattern::parse(&entry.path)? {
                PathPattern::Exact(path) => {
                    bucket.exact.entry(path).or_insert(i);
                }
                PathPattern::Prefix(prefix) => bucket.prefixes.insert(&prefix, i),
            }
        }
        Ok(index)
    }

    /// The entry that suppresses `(rule, path)`, to surface its reason.
    ///
    /// When several entries match, the one listed first wins, whether it is
    /// exact or a prefix and however deep the prefix is.
    #[must_use]
    pub fn matching_entry(&self, rule: &str, path: &str) -> Option<&WhitelistEntry> {
        let bucket = self.by_rule.get(rule)?;
        let normalized = segments(path).collect::<Vec<_>>().join("/");
        let exact = bucket.exact.get(&normalized).copied();
        let prefix = bucket.prefixes.find(&normalized);
        let index = match (exact, prefix) {
            (Some(a), Some(b)) => a.min(b),
            (a, b) => a.or(b)?,
        };
        self.entries.get(index)
    }

    /// Returns `true` if a violation of `rule` at `path` is whitelisted.
    #[must_use]
    pub fn is_suppressed(&self, rule: &str, path: &str) -> bool {
        self.matching_entry(rule, path).is_some()
    }

    /// Returns `true` if `violation` is whitelisted.
    #[must_use]
    pub fn suppresses(&self, violation: &Violation) -> bool {
        self.is_suppressed(&violation.rule, &violation.path)
    }

    /// Whitelist rule names absent from `rules`, one error per name.
    ///
    /// Each is also logged at warn level; they never fail the run.
    #[must_use]
    pub fn unknown_rules(&self, rules: &RuleSet) -> Vec<NotFoundError> {
        let mut names: Vec<&str> = self
            .by_rule
            .keys()
            .map(String::as_str)
            .filter(|name| !rules.contains_name(name))
            .collect();
        names.sort_unstable();
        names
            .into_iter()
            .map(|name| {
                let err = NotFoundError::new("whitelisted rule", name);
                warn!(code = %err.code(), "{err}");
                err
            })
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleDefinition;
    use crate::types::Severity;

    const CYCLES: &str = "no-circular-dependencies";

    fn index(entries: &[WhitelistEntry]) -> WhitelistIndex {
        WhitelistIndex::build(entries).unwrap()
    }

    #[test]
    fn prefix_suppresses_only_below_and_only_that_rule() {
        let idx = index(&[WhitelistEntry::new(CYCLES, "src/legacy/**")]);
        assert!(idx.is_suppressed(CYCLES, "src/legacy/a.ts"));
        assert!(idx.is_suppressed(CYCLES, "src/legacy/deep/b.ts"));
        assert!(!idx.is_suppressed(CYCLES, "src/legacy"));
        assert!(!idx.is_suppressed(CYCLES, "src/modern/a.ts"));
        assert!(!idx.is_suppressed("no-dead-code", "src/legacy/a.ts"));
    }

    #[test]
    fn exact_entry_suppresses_one_path() {
        let idx = index(&[WhitelistEntry::new("no-dead-code", "src/polyfill.ts")]);
        assert!(idx.is_suppressed("no-dead-code", "src/polyfill.ts"));
        assert!(!idx.is_suppressed("no-dead-code", "src/polyfill.tsx"));
    }

    #[test]
    fn matching_entry_surfaces_reason() {
        let idx = index(&[
            WhitelistEntry::new(CYCLES, "src/a/**").with_reason("outer"),
            WhitelistEntry::new(CYCLES, "src/a/b/**").with_reason("inner"),
        ]);
        let entry = idx.matching_entry(CYCLES, "src/a/b/c.ts").unwrap();
        assert_eq!(entry.reason.as_deref(), Some("outer"));
    }

    #[test]
    fn deeper_prefix_listed_first_wins() {
        let idx = index(&[
            WhitelistEntry::new(CYCLES, "src/a/b/**").with_reason("inner"),
            WhitelistEntry::new(CYCLES, "src/a/**").with_reason("outer"),
        ]);
        let entry = idx.matching_entry(CYCLES, "src/a/b/c.ts").unwrap();
        assert_eq!(entry.reason.as_deref(), Some("inner"));
        let entry = idx.matching_entry(CYCLES, "src/a/d.ts").unwrap();
        assert_eq!(entry.reason.as_deref(), Some("outer"));
    }

    #[test]
    fn earliest_entry_wins_between_exact_and_prefix() {
        let idx = index(&[
            WhitelistEntry::new(CYCLES, "src/x/**").with_reason("prefix"),
            WhitelistEntry::new(CYCLES, "src/x/y.ts").with_reason("exact"),
        ]);
        let entry = idx.matching_entry(CYCLES, "src/x/y.ts").unwrap();
        assert_eq!(entry.reason.as_deref(), Some("prefix"));
    }

    #[test]
    fn suppresses_violation_by_rule_name() {
        let idx = index(&[WhitelistEntry::new(CYCLES, "src/legacy/**")]);
        let v = Violation::new("built-in-0", CYCLES, Severity::Error, "src/legacy/x.ts", "m");
        assert!(idx.suppresses(&v));
    }

    #[test]
    fn build_rejects_unsupported_patterns() {
        let err = WhitelistIndex::build(&[WhitelistEntry::new(CYCLES, "src/*.ts")]).unwrap_err();
        assert!(matches!(err, PatternError::UnsupportedWildcard { .. }));
    }

    #[test]
    fn unknown_rules_are_reported_sorted() {
        let idx = index(&[
            WhitelistEntry::new("zeta", "a.ts"),
            WhitelistEntry::new(CYCLES, "b.ts"),
            WhitelistEntry::new("alpha", "c.ts"),
        ]);
        let rules = RuleSet::new(vec![RuleDefinition::built_in(
            "built-in-0",
            CYCLES,
            Severity::Error,
        )]);
        let unknown: Vec<_> = idx.unknown_rules(&rules).into_iter().map(|e| e.id).collect();
        assert_eq!(unknown, vec!["alpha", "zeta"]);
    }

    #[test]
    fn many_entries_still_match() {
        let entries: Vec<_> = (0..1000)
            .map(|i| WhitelistEntry::new(CYCLES, format!("src/gen{i}/**")))
            .collect();
        let idx = index(&entries);
        assert!(idx.is_suppressed(CYCLES, "src/gen999/a.ts"));
        assert!(!idx.is_suppressed(CYCLES, "src/gen1000/a.ts"));
        assert_eq!(idx.len(), 1000);
    }
}
