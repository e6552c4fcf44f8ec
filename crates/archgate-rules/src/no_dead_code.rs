//! Rule to find modules nothing depends on.
//!
//! A module with no inbound edge from another module is dead unless it is an
//! entry point. Entry points come from:
//!
//! - the node's own `entry_point` flag, set by the graph provider
//! - codebase metadata, including `entry:<path>` discovery hints
//! - the `entry_points` parameter (exact paths or `dir/**` prefixes)
//!
//! A self-import does not keep a module alive.

use archgate_core::{
    EvaluationError, GraphRule, PathPattern, RuleContext, RuleDefinition, Severity, Violation,
};

/// Rule name for no-dead-code.
pub const NAME: &str = "no-dead-code";

/// Flags modules without dependents.
#[derive(Debug, Clone, Default)]
pub struct NoDeadCode {
    /// Entry point patterns applied in addition to the `entry_points` parameter.
    pub entry_points: Vec<PathPattern>,
}

impl NoDeadCode {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry point pattern.
    #[must_use]
    pub fn entry_point(mut self, pattern: PathPattern) -> Self {
        self.entry_points.push(pattern);
        self
    }
}

impl GraphRule for NoDeadCode {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Flags modules that no other module depends on"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warn
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        rule: &RuleDefinition,
    ) -> Result<Vec<Violation>, EvaluationError> {
        let mut entry_points = self.entry_points.clone();
        for raw in rule.param_str_list("entry_points")? {
            let pattern = PathPattern::parse(raw)
                .map_err(|e| EvaluationError::invalid_parameter("entry_points", e.to_string()))?;
            entry_points.push(pattern);
        }

        let mut violations = Vec::new();
        for (visited, node) in ctx.graph.nodes().enumerate() {
            ctx.checkpoint(visited)?;
            if ctx.graph.inbound_count(&node.path) > 0
                || node.entry_point
                || ctx.meta.is_entry_point(&node.path)
                || entry_points.iter().any(|p| p.matches(&node.path))
            {
                continue;
            }
            violations.push(Violation::for_rule(
                rule,
                node.path.as_str(),
                "module is never imported and is not an entry point",
            ));
        }
        Ok(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archgate_core::config::DiscoveryConfig;
    use archgate_core::{CodebaseMeta, DependencyGraph, ModuleNode};
    use serde_json::json;

    fn graph() -> DependencyGraph {
        DependencyGraph::new()
            .with_node(ModuleNode::new("src/main.ts").entry_point())
            .with_edge("src/main.ts", "src/app.ts")
            .with_edge("src/app.ts", "src/util.ts")
            .with_edge("src/orphan.ts", "src/util.ts")
            .with_edge("src/loop.ts", "src/loop.ts")
            .with_node(ModuleNode::new("src/cli.ts"))
            .with_node(ModuleNode::new("scripts/seed.ts"))
    }

    fn dead(meta: &CodebaseMeta, rule: &RuleDefinition) -> Vec<String> {
        let graph = graph();
        let ctx = RuleContext::new(&graph, meta, None);
        NoDeadCode::new()
            .check(&ctx, rule)
            .unwrap()
            .into_iter()
            .map(|v| v.path)
            .collect()
    }

    fn rule() -> RuleDefinition {
        RuleDefinition::built_in("built-in-0", NAME, Severity::Warn)
    }

    #[test]
    fn modules_without_dependents_are_dead() {
        let found = dead(&CodebaseMeta::new(), &rule());
        assert_eq!(
            found,
            vec!["scripts/seed.ts", "src/cli.ts", "src/loop.ts", "src/orphan.ts"]
        );
    }

    #[test]
    fn meta_and_hints_declare_entry_points() {
        let discovery = DiscoveryConfig {
            ignore: Vec::new(),
            hints: [("entry:src/cli.ts".to_string(), true)].into(),
        };
        let meta = CodebaseMeta::new()
            .with_entry_point("src/orphan.ts")
            .with_discovery(&discovery);
        let found = dead(&meta, &rule());
        assert_eq!(found, vec!["scripts/seed.ts", "src/loop.ts"]);
    }

    #[test]
    fn entry_points_parameter_accepts_prefixes() {
        let serde_json::Value::Object(params) =
            json!({"entry_points": ["scripts/**", "src/loop.ts"]})
        else {
            unreachable!()
        };
        let found = dead(&CodebaseMeta::new(), &rule().with_parameters(params));
        assert_eq!(found, vec!["src/cli.ts", "src/orphan.ts"]);
    }

    #[test]
    fn builder_entry_points_apply() {
        let graph = graph();
        let meta = CodebaseMeta::new();
        let ctx = RuleContext::new(&graph, &meta, None);
        let pattern = PathPattern::parse("src/**").unwrap();
        let found = NoDeadCode::new()
            .entry_point(pattern)
            .check(&ctx, &rule())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "scripts/seed.ts");
    }

    #[test]
    fn malformed_entry_points_fail_the_rule() {
        let serde_json::Value::Object(params) = json!({"entry_points": "src/main.ts"}) else {
            unreachable!()
        };
        let graph = graph();
        let meta = CodebaseMeta::new();
        let ctx = RuleContext::new(&graph, &meta, None);
        let err = NoDeadCode::new()
            .check(&ctx, &rule().with_parameters(params))
            .unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidParameter { .. }));
    }
}
