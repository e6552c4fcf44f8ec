//! Configuration document types and their validation.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::ConfigError;
use crate::pattern::{segments, PathPattern, PatternError};

// ────────────────────────────────────────────
// Documents
// ────────────────────────────────────────────

/// A user-authored configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Schema version; required and non-empty.
    pub version: String,
    /// Preset names to inherit from, lowest precedence first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
    /// Architectural style and layers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<ArchitectureConfig>,
    /// Rule entries in document order.
    #[serde(default, skip_serializing_if = "RuleTable::is_empty")]
    pub rules: RuleTable,
    /// Accepted exceptions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub whitelist: Vec<WhitelistEntry>,
    /// Hints passed to the graph provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryConfig>,
}

impl Configuration {
    /// Creates an empty configuration with the given version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    /// Adds a preset to `extends`.
    #[must_use]
    pub fn extend(mut self, preset: impl Into<String>) -> Self {
        self.extends.push(preset.into());
        self
    }

    /// Sets (or replaces) a rule entry.
    #[must_use]
    pub fn with_rule(mut self, name: impl Into<String>, spec: RuleSpec) -> Self {
        self.rules.insert(name, spec);
        self
    }

    /// Sets the architecture section.
    #[must_use]
    pub fn with_architecture(mut self, architecture: ArchitectureConfig) -> Self {
        self.architecture = Some(architecture);
        self
    }

    /// Appends a whitelist entry.
    #[must_use]
    pub fn with_whitelist(mut self, entry: WhitelistEntry) -> Self {
        self.whitelist.push(entry);
        self
    }

    /// Sets the discovery section.
    #[must_use]
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Collects every schema issue in this document.
    #[must_use]
    pub fn issues(&self) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();
        if self.version.trim().is_empty() {
            issues.push(SchemaIssue::new("version", IssueKind::Empty));
        }
        for (i, name) in self.extends.iter().enumerate() {
            if name.trim().is_empty() {
                issues.push(SchemaIssue::new(format!("extends[{i}]"), IssueKind::Empty));
            }
        }
        if let Some(architecture) = &self.architecture {
            check_layers(&architecture.layers, &mut issues);
        }
        check_rules(&self.rules, &mut issues);
        check_whitelist(&self.whitelist, &mut issues);
        if let Some(discovery) = &self.discovery {
            check_discovery(discovery, &mut issues);
        }
        issues
    }

    /// Checks the schema invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing every issue found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { issues })
        }
    }
}

/// A configuration fragment contributed by a preset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialConfiguration {
    /// Presets this preset inherits from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
    /// Architecture section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<ArchitectureConfig>,
    /// Rule entries in document order.
    #[serde(default, skip_serializing_if = "RuleTable::is_empty")]
    pub rules: RuleTable,
    /// Whitelist entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub whitelist: Vec<WhitelistEntry>,
    /// Discovery section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryConfig>,
}

impl PartialConfiguration {
    /// Adds a preset to `extends`.
    #[must_use]
    pub fn extend(mut self, preset: impl Into<String>) -> Self {
        self.extends.push(preset.into());
        self
    }

    /// Sets (or replaces) a rule entry.
    #[must_use]
    pub fn with_rule(mut self, name: impl Into<String>, spec: RuleSpec) -> Self {
        self.rules.insert(name, spec);
        self
    }

    /// Sets the architecture section.
    #[must_use]
    pub fn with_architecture(mut self, architecture: ArchitectureConfig) -> Self {
        self.architecture = Some(architecture);
        self
    }

    /// Appends a whitelist entry.
    #[must_use]
    pub fn with_whitelist(mut self, entry: WhitelistEntry) -> Self {
        self.whitelist.push(entry);
        self
    }

    /// Sets the discovery section.
    #[must_use]
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = Some(discovery);
        self
    }
}

/// Supported architectural styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchitectureStyle {
    /// Clean architecture.
    Clean,
    /// Classic n-tier layering.
    Layered,
    /// Feature modules.
    Modular,
    /// Independently deployed services.
    Microservices,
    /// Ports and adapters.
    Hexagonal,
}

impl fmt::Display for ArchitectureStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clean => "clean",
            Self::Layered => "layered",
            Self::Modular => "modular",
            Self::Microservices => "microservices",
            Self::Hexagonal => "hexagonal",
        };
        f.write_str(name)
    }
}

/// The `architecture` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    /// Architectural style.
    pub style: ArchitectureStyle,
    /// Ordered layers, outermost allowed dependency direction first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<Layer>,
}

impl ArchitectureConfig {
    /// Creates an architecture section without layers.
    #[must_use]
    pub fn new(style: ArchitectureStyle) -> Self {
        Self {
            style,
            layers: Vec::new(),
        }
    }

    /// Appends a layer.
    #[must_use]
    pub fn with_layer(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.layers.push(Layer {
            name: name.into(),
            path: path.into(),
        });
        self
    }
}

/// A named architectural tier bound to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Unique layer name.
    pub name: String,
    /// Path prefix of modules belonging to this layer.
    pub path: String,
}

/// A rule + path exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// Rule name the exception applies to.
    pub rule: String,
    /// Exact path or `prefix/**`.
    pub path: String,
    /// Why the exception exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WhitelistEntry {
    /// Creates an entry without a reason.
    #[must_use]
    pub fn new(rule: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            path: path.into(),
            reason: None,
        }
    }

    /// Sets the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// The `discovery` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Glob patterns of modules the graph provider should drop.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
    /// Free-form boolean hints; `entry:<path> = true` marks an entry point.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hints: BTreeMap<String, bool>,
}

// ────────────────────────────────────────────
// Rule entries
// ────────────────────────────────────────────

/// A raw, uncompiled rule entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSpec {
    /// Bare severity string (`"error"`, `"off"`, ...).
    Level(String),
    /// `[severity, parameters]`, or the array of custom rules under `custom`.
    List(Vec<Value>),
}

impl RuleSpec {
    /// Bare severity entry.
    #[must_use]
    pub fn level(severity: &str) -> Self {
        Self::Level(severity.to_string())
    }

    /// `[severity, parameters]` entry.
    #[must_use]
    pub fn with_params(severity: &str, parameters: Value) -> Self {
        Self::List(vec![Value::String(severity.to_string()), parameters])
    }
}

/// Rule entries keyed by rule name, kept in document order.
///
/// Inserting an existing key replaces its value in place; new keys append.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleTable {
    entries: Vec<(String, RuleSpec)>,
}

impl RuleTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entry, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, spec: RuleSpec) -> Option<RuleSpec> {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            return Some(std::mem::replace(&mut slot.1, spec));
        }
        self.entries.push((name, spec));
        None
    }

    /// Looks up an entry by rule name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RuleSpec> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    /// Returns `true` if the table has an entry for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleSpec)> {
        self.entries.iter().map(|(n, spec)| (n.as_str(), spec))
    }

    /// Rule names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
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

impl<S: Into<String>> FromIterator<(S, RuleSpec)> for RuleTable {
    fn from_iter<I: IntoIterator<Item = (S, RuleSpec)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, spec) in iter {
            table.insert(name, spec);
        }
        table
    }
}

impl Serialize for RuleTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, spec) in &self.entries {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RuleTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = RuleTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of rule names to severities or [severity, parameters]")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RuleTable, A::Error> {
                let mut table = RuleTable::new();
                while let Some((name, spec)) = map.next_entry::<String, RuleSpec>()? {
                    table.insert(name, spec);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

// ────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────

/// One schema violation, with the offending location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct SchemaIssue {
    /// Location in the document (e.g. `architecture.layers[1].path`).
    pub path: String,
    /// What is wrong.
    pub kind: IssueKind,
}

impl SchemaIssue {
    /// Creates a new issue.
    #[must_use]
    pub fn new(path: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Machine-readable reason of a [`SchemaIssue`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssueKind {
    /// A required string is empty.
    #[error("must not be empty")]
    Empty,

    /// Two layers share a name.
    #[error("duplicate layer name `{name}`")]
    DuplicateLayer {
        /// The repeated name.
        name: String,
    },

    /// Two layer paths are equal or one contains the other.
    #[error("path overlaps layer `{other}`")]
    OverlappingLayers {
        /// The layer it overlaps with.
        other: String,
    },

    /// A whitelist path is not a supported pattern.
    #[error("{0}")]
    InvalidPattern(#[from] PatternError),

    /// A discovery ignore pattern is not a valid glob.
    #[error("invalid glob `{pattern}`: {reason}")]
    InvalidGlob {
        /// The rejected glob.
        pattern: String,
        /// Parser message.
        reason: String,
    },
}

fn check_layers(layers: &[Layer], issues: &mut Vec<SchemaIssue>) {
    let mut names = HashSet::new();
    let mut prefixes: Vec<(String, &str)> = Vec::new();
    for (i, layer) in layers.iter().enumerate() {
        let ctx = format!("architecture.layers[{i}]");
        if layer.name.trim().is_empty() {
            issues.push(SchemaIssue::new(format!("{ctx}.name"), IssueKind::Empty));
        } else if !names.insert(layer.name.as_str()) {
            issues.push(SchemaIssue::new(
                format!("{ctx}.name"),
                IssueKind::DuplicateLayer {
                    name: layer.name.clone(),
                },
            ));
        }

        let prefix = segments(&layer.path).collect::<Vec<_>>().join("/");
        if prefix.is_empty() {
            issues.push(SchemaIssue::new(format!("{ctx}.path"), IssueKind::Empty));
            continue;
        }
        if let Some((_, other)) = prefixes
            .iter()
            .find(|(seen, _)| segment_prefix(seen, &prefix) || segment_prefix(&prefix, seen))
        {
            issues.push(SchemaIssue::new(
                format!("{ctx}.path"),
                IssueKind::OverlappingLayers {
                    other: (*other).to_string(),
                },
            ));
        }
        prefixes.push((prefix, &layer.name));
    }
}

/// `true` if `prefix` equals `path` or is an ancestor of it.
fn segment_prefix(prefix: &str, path: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn check_rules(rules: &RuleTable, issues: &mut Vec<SchemaIssue>) {
    for (i, name) in rules.names().enumerate() {
        if name.trim().is_empty() {
            issues.push(SchemaIssue::new(format!("rules[{i}]"), IssueKind::Empty));
        }
    }
}

fn check_whitelist(entries: &[WhitelistEntry], issues: &mut Vec<SchemaIssue>) {
    for (i, entry) in entries.iter().enumerate() {
        if entry.rule.trim().is_empty() {
            issues.push(SchemaIssue::new(
                format!("whitelist[{i}].rule"),
                IssueKind::Empty,
            ));
        }
        if let Err(e) = PathPattern::parse(&entry.path) {
            issues.push(SchemaIssue::new(format!("whitelist[{i}].path"), e.into()));
        }
    }
}

fn check_discovery(discovery: &DiscoveryConfig, issues: &mut Vec<SchemaIssue>) {
    for (i, pattern) in discovery.ignore.iter().enumerate() {
        if let Err(e) = glob::Pattern::new(pattern) {
            issues.push(SchemaIssue::new(
                format!("discovery.ignore[{i}]"),
                IssueKind::InvalidGlob {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                },
            ));
        }
    }
}
