//! Rule to enforce the dependency direction between architectural layers.
//!
//! Every module is classified into the layer whose path is the longest
//! segment-boundary prefix of the module path. Modules outside all layers
//! are ignored, as are edges within one layer.
//!
//! # Configuration
//!
//! - `direction`: `"earlier-to-later"` (default) lets a layer depend on the
//!   layers listed after it; `"later-to-earlier"` flips that.
//! - `allow`: explicit `[[from, to]]` layer pairs that are always allowed.
//!
//! The rule fails to evaluate when `architecture.layers` is empty.

use std::collections::HashSet;

use archgate_core::{
    EvaluationError, GraphRule, LayerResolver, RuleContext, RuleDefinition, Severity, Violation,
};
use serde_json::Value;

/// Rule name for layer-dependencies.
pub const NAME: &str = "layer-dependencies";

/// Permitted direction of cross-layer edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// A layer may depend on layers listed after it.
    #[default]
    EarlierToLater,
    /// A layer may depend on layers listed before it.
    LaterToEarlier,
}

impl Direction {
    /// Parses the `direction` parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "earlier-to-later" => Some(Self::EarlierToLater),
            "later-to-earlier" => Some(Self::LaterToEarlier),
            _ => None,
        }
    }

    fn allows(self, from: usize, to: usize) -> bool {
        match self {
            Self::EarlierToLater => from < to,
            Self::LaterToEarlier => from > to,
        }
    }
}

/// Enforces the configured layer order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerDependencies {
    /// Direction used when the rule has no `direction` parameter.
    pub direction: Direction,
}

impl LayerDependencies {
    /// Creates the rule with the default direction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default direction.
    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    fn direction_param(self, rule: &RuleDefinition) -> Result<Direction, EvaluationError> {
        match rule.param_str("direction")? {
            None => Ok(self.direction),
            Some(raw) => Direction::parse(raw).ok_or_else(|| {
                EvaluationError::invalid_parameter(
                    "direction",
                    format!("expected `earlier-to-later` or `later-to-earlier`, got `{raw}`"),
                )
            }),
        }
    }
}

impl GraphRule for LayerDependencies {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Forbids dependencies against the configured layer order"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        rule: &RuleDefinition,
    ) -> Result<Vec<Violation>, EvaluationError> {
        let layers = ctx.require_layers()?;
        let direction = self.direction_param(rule)?;
        let allowed = allowed_pairs(rule, layers)?;

        let mut reported: HashSet<(&str, &str)> = HashSet::new();
        let mut violations = Vec::new();
        for (visited, edge) in ctx.graph.edges().enumerate() {
            ctx.checkpoint(visited)?;
            let Some((from_layer, from_pos)) = layers.resolve(&edge.from) else {
                continue;
            };
            let Some((to_layer, to_pos)) = layers.resolve(&edge.to) else {
                continue;
            };
            if from_layer == to_layer
                || direction.allows(from_pos, to_pos)
                || allowed.contains(&(from_layer, to_layer))
            {
                continue;
            }
            if !reported.insert((edge.from.as_str(), edge.to.as_str())) {
                continue;
            }
            violations.push(
                Violation::for_rule(
                    rule,
                    edge.from.as_str(),
                    format!("layer `{from_layer}` must not depend on layer `{to_layer}`"),
                )
                .with_related(edge.to.as_str()),
            );
        }
        Ok(violations)
    }
}

/// Reads `allow: [[from, to], ...]`, checking both names are known layers.
fn allowed_pairs<'r>(
    rule: &'r RuleDefinition,
    layers: &LayerResolver,
) -> Result<HashSet<(&'r str, &'r str)>, EvaluationError> {
    let Some(raw) = rule.parameters.get("allow") else {
        return Ok(HashSet::new());
    };
    let invalid = |reason: String| EvaluationError::invalid_parameter("allow", reason);
    let Value::Array(items) = raw else {
        return Err(invalid(format!("expected an array of pairs, got {raw}")));
    };
    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([Value::String(from), Value::String(to)]) => {
                for name in [from, to] {
                    if layers.position(name).is_none() {
                        return Err(invalid(format!("unknown layer `{name}`")));
                    }
                }
                Ok((from.as_str(), to.as_str()))
            }
            _ => Err(invalid(format!("expected a [from, to] pair, got {item}"))),
        })
        .collect()
}
