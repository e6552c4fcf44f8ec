//! Compiled rule model and the traits rule implementations plug into.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::RuleContext;
use crate::error::{EvaluationError, NotFoundError};
use crate::matcher::Matcher;
use crate::types::{Severity, Violation};

/// Free-form rule parameters (the object in `[severity, {..}]`).
pub type Parameters = serde_json::Map<String, Value>;

/// Where the winning entry for a rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOrigin {
    /// Inherited from a preset.
    Preset,
    /// Written in the project configuration.
    Project,
    /// Contributed by automatic discovery.
    Discovery,
}

/// Condition of a custom rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Predicate name (e.g. `dependency`).
    #[serde(rename = "type")]
    pub predicate: String,
    /// Matcher selecting subjects; absent matches every node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    /// Matcher selecting targets; absent matches every node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
    /// `true` flags every match; otherwise subjects without a match are flagged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forbidden: Option<bool>,
}

impl RuleCondition {
    /// Polarity of the condition.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.forbidden.unwrap_or(false)
    }
}

/// Built-in rule or custom predicate rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RuleKind {
    /// Dispatched by name to a registered [`GraphRule`].
    BuiltIn,
    /// Dispatched by `condition.type` to a registered [`Predicate`].
    Custom {
        /// The condition to evaluate.
        condition: RuleCondition,
    },
}

/// A compiled rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// `built-in-<n>` or `custom-<n>`, unique within a [`RuleSet`].
    pub id: String,
    /// Rule name.
    pub name: String,
    /// Severity stamped on every violation.
    pub severity: Severity,
    /// Built-in or custom.
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Rule parameters; empty for custom rules.
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
    /// Source of the winning configuration entry.
    pub origin: RuleOrigin,
}

impl RuleDefinition {
    /// Creates a built-in rule definition with no parameters.
    #[must_use]
    pub fn built_in(id: impl Into<String>, name: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            severity,
            kind: RuleKind::BuiltIn,
            parameters: Parameters::new(),
            origin: RuleOrigin::Project,
        }
    }

    /// Creates a custom rule definition.
    #[must_use]
    pub fn custom(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        condition: RuleCondition,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            severity,
            kind: RuleKind::Custom { condition },
            parameters: Parameters::new(),
            origin: RuleOrigin::Project,
        }
    }

    /// Replaces the parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the origin.
    #[must_use]
    pub fn with_origin(mut self, origin: RuleOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Returns `true` for custom rules.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self.kind, RuleKind::Custom { .. })
    }

    /// Reads an optional string parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is present but not a string.
    pub fn param_str(&self, key: &str) -> Result<Option<&str>, EvaluationError> {
        match self.parameters.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(EvaluationError::invalid_parameter(
                key,
                format!("expected a string, got {other}"),
            )),
        }
    }

    /// Reads an optional array-of-strings parameter; absent is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is present but not an array of strings.
    pub fn param_str_list(&self, key: &str) -> Result<Vec<&str>, EvaluationError> {
        match self.parameters.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| {
                        EvaluationError::invalid_parameter(
                            key,
                            format!("expected strings, got {item}"),
                        )
                    })
                })
                .collect(),
            Some(other) => Err(EvaluationError::invalid_parameter(
                key,
                format!("expected an array, got {other}"),
            )),
        }
    }
}

/// Ordered set of compiled rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<RuleDefinition>,
}

impl RuleSet {
    /// Wraps compiled rules, keeping their order.
    #[must_use]
    pub fn new(rules: Vec<RuleDefinition>) -> Self {
        Self { rules }
    }

    /// Looks up a rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] (`NOT_FOUND`) if no rule has this id.
    pub fn get(&self, id: &str) -> Result<&RuleDefinition, NotFoundError> {
        self.rules
            .iter()
            .find(|rule| rule.id == id)
            .ok_or_else(|| NotFoundError::new("rule", id))
    }

    /// All rules with the given name, in order.
    pub fn by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RuleDefinition> + 'a {
        self.rules.iter().filter(move |rule| rule.name == name)
    }

    /// Returns `true` if any rule has this name.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.rules.iter().any(|rule| rule.name == name)
    }

    /// Rules in order.
    #[must_use]
    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    /// Iterates rules in order.
    pub fn iter(&self) -> std::slice::Iter<'_, RuleDefinition> {
        self.rules.iter()
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a RuleDefinition;
    type IntoIter = std::slice::Iter<'a, RuleDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

// ────────────────────────────────────────────
// Extension points
// ────────────────────────────────────────────

/// A built-in rule evaluated against the whole graph.
///
/// Implementations must be pure functions of the rule definition and the
/// context. Long traversals should call [`RuleContext::checkpoint`].
pub trait GraphRule: Send + Sync {
    /// Name the rule is configured under (e.g. `no-circular-dependencies`).
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str {
        ""
    }

    /// Severity used when a preset or `init` enables the rule.
    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    /// Evaluates the rule.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed parameters, missing prerequisites, or
    /// cancellation.
    fn check(
        &self,
        ctx: &RuleContext<'_>,
        rule: &RuleDefinition,
    ) -> Result<Vec<Violation>, EvaluationError>;
}

/// Boxed graph rule.
pub type GraphRuleBox = Box<dyn GraphRule>;

/// Output of a [`Predicate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateMatches {
    /// Nodes selected by the `from` matcher.
    pub subjects: Vec<String>,
    /// `(subject, target)` pairs the predicate holds for.
    pub matches: Vec<(String, String)>,
}

/// A structural relation used by custom rules.
pub trait Predicate: Send + Sync {
    /// Condition type the predicate is selected by (e.g. `dependency`).
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str {
        ""
    }

    /// Finds the subjects selected by `from` and the targets matching `to`.
    ///
    /// # Errors
    ///
    /// Returns an error on cancellation or invalid input.
    fn find(
        &self,
        ctx: &RuleContext<'_>,
        from: &Matcher,
        to: &Matcher,
    ) -> Result<PredicateMatches, EvaluationError>;
}

/// Boxed predicate.
pub type PredicateBox = Box<dyn Predicate>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_params(params: Value) -> RuleDefinition {
        let Value::Object(map) = params else {
            panic!("params must be an object");
        };
        RuleDefinition::built_in("built-in-0", "consistent-naming", Severity::Warn)
            .with_parameters(map)
    }

    #[test]
    fn param_str_reads_strings() {
        let rule = with_params(json!({"style": "snake-case"}));
        assert_eq!(rule.param_str("style").unwrap(), Some("snake-case"));
        assert_eq!(rule.param_str("missing").unwrap(), None);
    }

    #[test]
    fn param_str_rejects_other_types() {
        let rule = with_params(json!({"style": 3}));
        assert!(matches!(
            rule.param_str("style"),
            Err(EvaluationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn param_str_list_reads_arrays() {
        let rule = with_params(json!({"ignore": ["src/gen/**", "src/index.ts"]}));
        assert_eq!(
            rule.param_str_list("ignore").unwrap(),
            vec!["src/gen/**", "src/index.ts"]
        );
        assert!(rule.param_str_list("missing").unwrap().is_empty());
        let bad = with_params(json!({"ignore": [1]}));
        assert!(bad.param_str_list("ignore").is_err());
    }

    #[test]
    fn rule_set_lookup_by_id_and_name() {
        let set = RuleSet::new(vec![
            RuleDefinition::built_in("built-in-0", "no-dead-code", Severity::Warn),
            RuleDefinition::built_in("built-in-1", "no-circular-dependencies", Severity::Error),
        ]);
        assert_eq!(set.get("built-in-1").unwrap().name, "no-circular-dependencies");
        let err = set.get("built-in-7").unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::NotFound);
        assert_eq!(set.by_name("no-dead-code").count(), 1);
        assert!(!set.contains_name("layer-dependencies"));
    }

    #[test]
    fn condition_polarity_defaults_to_required() {
        let condition: RuleCondition =
            serde_json::from_value(json!({"type": "dependency"})).unwrap();
        assert!(!condition.is_forbidden());
        assert!(condition.from.is_none());
    }

    #[test]
    fn definition_serializes_kind_inline() {
        let rule = RuleDefinition::custom(
            "custom-2",
            "no-ui-to-db",
            Severity::Error,
            RuleCondition {
                predicate: "dependency".into(),
                from: Some(json!({"layer": "ui"})),
                to: Some(json!({"layer": "db"})),
                forbidden: Some(true),
            },
        );
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["kind"], "custom");
        assert_eq!(json["condition"]["type"], "dependency");
        assert_eq!(json["origin"], "project");
    }
}
