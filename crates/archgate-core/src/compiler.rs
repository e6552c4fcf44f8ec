//! Compilation of raw rule entries into a [`RuleSet`].

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{EffectiveConfiguration, RuleSpec};
use crate::error::ValidationError;
use crate::rule::{Parameters, RuleCondition, RuleDefinition, RuleKind, RuleOrigin, RuleSet};
use crate::types::Severity;

/// Reserved rule name holding the array of custom rules.
pub const CUSTOM_RULES_KEY: &str = "custom";

const OFF: &str = "off";

#[derive(Deserialize)]
struct CustomRuleEntry {
    name: String,
    severity: String,
    condition: RuleCondition,
}

/// Compiles the effective configuration's rules.
///
/// Built-in entries come first in table order, then custom entries in array
/// order. Every compiled rule takes the next value of one shared counter, so
/// ids are `built-in-<n>` / `custom-<n>`. Entries set to `off` compile to
/// nothing and take no counter value.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the first malformed entry.
pub fn compile(effective: &EffectiveConfiguration) -> Result<RuleSet, ValidationError> {
    let mut rules = Vec::new();
    let mut next_id = 0usize;

    for (name, spec) in effective.rules.iter() {
        if name == CUSTOM_RULES_KEY {
            continue;
        }
        let Some((severity, parameters)) = compile_built_in(name, spec)? else {
            debug!(rule = name, "Rule disabled");
            continue;
        };
        rules.push(
            RuleDefinition::built_in(format!("built-in-{next_id}"), name, severity)
                .with_parameters(parameters)
                .with_origin(effective.origin_of(name)),
        );
        next_id += 1;
    }

    if let Some(spec) = effective.rules.get(CUSTOM_RULES_KEY) {
        let origin = effective.origin_of(CUSTOM_RULES_KEY);
        let RuleSpec::List(entries) = spec else {
            return Err(ValidationError::MalformedRule {
                rule: CUSTOM_RULES_KEY.to_string(),
                reason: "must be an array of custom rule declarations".to_string(),
            });
        };
        for (index, entry) in entries.iter().enumerate() {
            if let Some(rule) = compile_custom(entry, index, next_id, origin)? {
                rules.push(rule);
                next_id += 1;
            }
        }
    }

    debug!(rules = rules.len(), "Compiled rule set");
    Ok(RuleSet::new(rules))
}

fn compile_built_in(
    name: &str,
    spec: &RuleSpec,
) -> Result<Option<(Severity, Parameters)>, ValidationError> {
    let malformed = |reason: &str| ValidationError::MalformedRule {
        rule: name.to_string(),
        reason: reason.to_string(),
    };
    let (level, parameters) = match spec {
        RuleSpec::Level(level) => (level.as_str(), Parameters::new()),
        RuleSpec::List(items) => match items.as_slice() {
            [level] => (severity_str(name, level)?, Parameters::new()),
            [level, Value::Object(parameters)] => (severity_str(name, level)?, parameters.clone()),
            [_, _] => return Err(malformed("parameters must be an object")),
            _ => {
                return Err(malformed(
                    "expected a severity or [severity, parameters]",
                ))
            }
        },
    };
    Ok(parse_level(name, level)?.map(|severity| (severity, parameters)))
}

fn severity_str<'v>(rule: &str, value: &'v Value) -> Result<&'v str, ValidationError> {
    value.as_str().ok_or_else(|| ValidationError::MalformedRule {
        rule: rule.to_string(),
        reason: format!("severity must be a string, got {value}"),
    })
}

/// `None` for `off`.
fn parse_level(rule: &str, level: &str) -> Result<Option<Severity>, ValidationError> {
    if level == OFF {
        return Ok(None);
    }
    Severity::parse(level)
        .map(Some)
        .ok_or_else(|| ValidationError::UnknownSeverity {
            rule: rule.to_string(),
            value: level.to_string(),
        })
}

fn compile_custom(
    entry: &Value,
    index: usize,
    id: usize,
    origin: RuleOrigin,
) -> Result<Option<RuleDefinition>, ValidationError> {
    let label = entry
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .map_or_else(|| format!("{CUSTOM_RULES_KEY}[{index}]"), str::to_string);

    let parsed: CustomRuleEntry =
        serde_json::from_value(entry.clone()).map_err(|e| ValidationError::MalformedRule {
            rule: label.clone(),
            reason: e.to_string(),
        })?;
    if parsed.name.trim().is_empty() {
        return Err(ValidationError::MalformedRule {
            rule: label,
            reason: "`name` must not be empty".to_string(),
        });
    }
    if parsed.condition.predicate.trim().is_empty() {
        return Err(ValidationError::MalformedRule {
            rule: label,
            reason: "`condition.type` must not be empty".to_string(),
        });
    }

    let Some(severity) = parse_level(&parsed.name, &parsed.severity)? else {
        debug!(rule = %parsed.name, "Custom rule disabled");
        return Ok(None);
    };
    Ok(Some(
        RuleDefinition {
            id: format!("custom-{id}"),
            name: parsed.name,
            severity,
            kind: RuleKind::Custom {
                condition: parsed.condition,
            },
            parameters: Parameters::new(),
            origin,
        },
    ))
}
