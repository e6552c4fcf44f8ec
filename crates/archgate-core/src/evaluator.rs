//! Execution of compiled rules against a dependency graph.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::context::{RuleContext, DEFAULT_BATCH_SIZE};
use crate::error::EvaluationError;
use crate::matcher::Matcher;
use crate::rule::{
    GraphRule, GraphRuleBox, Predicate, PredicateBox, RuleCondition, RuleDefinition, RuleKind,
    RuleSet,
};
use crate::types::{EvaluationFailure, Violation};

/// Knobs for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Stop at the first failing rule.
    pub fail_fast: bool,
    /// Size of a dedicated worker pool; `None` uses the global rayon pool.
    pub parallelism: Option<usize>,
    /// Nodes visited between cancellation checks.
    pub batch_size: usize,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            fail_fast: false,
            parallelism: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Violations and per-rule failures of a completed evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationOutcome {
    /// Ordered by rule position, then path and message.
    pub violations: Vec<Violation>,
    /// Rules that failed, in rule order.
    pub failures: Vec<EvaluationFailure>,
}

/// Why an evaluation stopped without an outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationAborted {
    /// The cancellation token tripped.
    #[error("evaluation cancelled")]
    Cancelled,

    /// A rule failed while `fail_fast` was set.
    #[error("rule failed: {0}")]
    FailFast(EvaluationFailure),

    /// The dedicated worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// Builder for a [`RuleEvaluator`].
#[derive(Default)]
pub struct RuleEvaluatorBuilder {
    rules: Vec<GraphRuleBox>,
    predicates: Vec<PredicateBox>,
}

impl RuleEvaluatorBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a graph rule.
    #[must_use]
    pub fn rule<R: GraphRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Registers a boxed graph rule.
    #[must_use]
    pub fn rule_box(mut self, rule: GraphRuleBox) -> Self {
        self.rules.push(rule);
        self
    }

    /// Registers several boxed graph rules.
    #[must_use]
    pub fn rules(mut self, rules: impl IntoIterator<Item = GraphRuleBox>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Registers a predicate.
    #[must_use]
    pub fn predicate<P: Predicate + 'static>(mut self, predicate: P) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Registers a boxed predicate.
    #[must_use]
    pub fn predicate_box(mut self, predicate: PredicateBox) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Registers several boxed predicates.
    #[must_use]
    pub fn predicates(mut self, predicates: impl IntoIterator<Item = PredicateBox>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// Builds the evaluator. Later registrations replace earlier ones of the same name.
    #[must_use]
    pub fn build(self) -> RuleEvaluator {
        RuleEvaluator {
            rules: self.rules.into_iter().map(|r| (r.name(), r)).collect(),
            predicates: self.predicates.into_iter().map(|p| (p.name(), p)).collect(),
        }
    }
}

/// Dispatches compiled rules to registered implementations.
///
/// Stateless between calls; one instance can evaluate many rule sets.
#[derive(Default)]
pub struct RuleEvaluator {
    rules: HashMap<&'static str, GraphRuleBox>,
    predicates: HashMap<&'static str, PredicateBox>,
}

impl RuleEvaluator {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> RuleEvaluatorBuilder {
        RuleEvaluatorBuilder::new()
    }

    /// Registered rules, sorted by name.
    #[must_use]
    pub fn rules(&self) -> Vec<&dyn GraphRule> {
        let mut rules: Vec<&dyn GraphRule> = self.rules.values().map(AsRef::as_ref).collect();
        rules.sort_by_key(|r| r.name());
        rules
    }

    /// Registered predicates, sorted by name.
    #[must_use]
    pub fn predicates(&self) -> Vec<&dyn Predicate> {
        let mut predicates: Vec<&dyn Predicate> =
            self.predicates.values().map(AsRef::as_ref).collect();
        predicates.sort_by_key(|p| p.name());
        predicates
    }

    /// Looks up a rule implementation by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&dyn GraphRule> {
        self.rules.get(name).map(AsRef::as_ref)
    }

    /// Evaluates every rule of `rule_set` against the context.
    ///
    /// Rules run in parallel, one task per rule. Results are merged in rule
    /// order so the outcome does not depend on scheduling. A failing rule is
    /// recorded in [`EvaluationOutcome::failures`] unless `fail_fast` is set.
    ///
    /// # Errors
    ///
    /// - [`EvaluationAborted::Cancelled`] if the context's token trips.
    /// - [`EvaluationAborted::FailFast`] when `options.fail_fast` is set and a
    ///   rule fails; rules not yet started are skipped.
    /// - [`EvaluationAborted::WorkerPool`] if a dedicated pool cannot start.
    pub fn evaluate(
        &self,
        rule_set: &RuleSet,
        ctx: &RuleContext<'_>,
        options: EvaluationOptions,
    ) -> Result<EvaluationOutcome, EvaluationAborted> {
        let ctx = ctx.clone().with_batch_size(options.batch_size);
        let failed = AtomicBool::new(false);

        let run = || -> Vec<Result<Vec<Violation>, EvaluationError>> {
            rule_set
                .rules()
                .par_iter()
                .map(|rule| {
                    if ctx.is_cancelled() || (options.fail_fast && failed.load(Ordering::SeqCst))
                    {
                        return Err(EvaluationError::Cancelled);
                    }
                    let result = self.evaluate_rule(&ctx, rule);
                    if result.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    result
                })
                .collect()
        };

        let results = match options.parallelism {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads.max(1))
                .build()
                .map_err(|e| EvaluationAborted::WorkerPool(e.to_string()))?
                .install(run),
            None => run(),
        };

        if ctx.is_cancelled() {
            return Err(EvaluationAborted::Cancelled);
        }

        let mut outcome = EvaluationOutcome::default();
        for (rule, result) in rule_set.iter().zip(results) {
            match result {
                Ok(mut violations) => {
                    violations.sort_by(|a, b| {
                        a.path.cmp(&b.path).then_with(|| a.message.cmp(&b.message))
                    });
                    debug!(rule = %rule.name, violations = violations.len(), "Rule evaluated");
                    outcome.violations.extend(violations);
                }
                // skipped after an earlier failure under fail-fast
                Err(EvaluationError::Cancelled) => {}
                Err(e) => {
                    let failure = EvaluationFailure::new(rule, e.to_string());
                    warn!(rule = %rule.name, id = %rule.id, "Rule failed: {e}");
                    if options.fail_fast {
                        return Err(EvaluationAborted::FailFast(failure));
                    }
                    outcome.failures.push(failure);
                }
            }
        }
        Ok(outcome)
    }

    fn evaluate_rule(
        &self,
        ctx: &RuleContext<'_>,
        rule: &RuleDefinition,
    ) -> Result<Vec<Violation>, EvaluationError> {
        match &rule.kind {
            RuleKind::BuiltIn => self
                .rules
                .get(rule.name.as_str())
                .ok_or_else(|| EvaluationError::UnknownRule {
                    name: rule.name.clone(),
                })?
                .check(ctx, rule),
            RuleKind::Custom { condition } => self.evaluate_custom(ctx, rule, condition),
        }
    }

    fn evaluate_custom(
        &self,
        ctx: &RuleContext<'_>,
        rule: &RuleDefinition,
        condition: &RuleCondition,
    ) -> Result<Vec<Violation>, EvaluationError> {
        let predicate = self
            .predicates
            .get(condition.predicate.as_str())
            .ok_or_else(|| EvaluationError::UnknownPredicate {
                name: condition.predicate.clone(),
            })?;
        let from = Matcher::from_value("from", condition.from.as_ref())?;
        let to = Matcher::from_value("to", condition.to.as_ref())?;
        if from.needs_layers() || to.needs_layers() {
            ctx.require_layers()?;
        }

        let found = predicate.find(ctx, &from, &to)?;
        let verb = condition.predicate.as_str();
        if condition.is_forbidden() {
            Ok(found
                .matches
                .into_iter()
                .map(|(subject, target)| {
                    Violation::for_rule(
                        rule,
                        subject.as_str(),
                        format!("forbidden {verb} on `{target}`"),
                    )
                    .with_related(target)
                })
                .collect())
        } else {
            let satisfied: std::collections::HashSet<&str> =
                found.matches.iter().map(|(s, _)| s.as_str()).collect();
            Ok(found
                .subjects
                .iter()
                .filter(|subject| !satisfied.contains(subject.as_str()))
                .map(|subject| {
                    Violation::for_rule(
                        rule,
                        subject.as_str(),
                        format!("required {verb} has no matching target"),
                    )
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;
    use crate::graph::{CodebaseMeta, DependencyGraph};
    use crate::rule::PredicateMatches;
    use crate::types::Severity;
    use serde_json::json;

    /// Flags every node, in reverse order to exercise sorting.
    struct FlagAll;

    impl GraphRule for FlagAll {
        fn name(&self) -> &'static str {
            "flag-all"
        }

        fn check(
            &self,
            ctx: &RuleContext<'_>,
            rule: &RuleDefinition,
        ) -> Result<Vec<Violation>, EvaluationError> {
            let mut out: Vec<_> = ctx
                .graph
                .paths()
                .map(|p| Violation::for_rule(rule, p, "flagged"))
                .collect();
            out.reverse();
            Ok(out)
        }
    }

    struct Broken;

    impl GraphRule for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn check(
            &self,
            _ctx: &RuleContext<'_>,
            _rule: &RuleDefinition,
        ) -> Result<Vec<Violation>, EvaluationError> {
            Err(EvaluationError::invalid_parameter("x", "always broken"))
        }
    }

    /// Direct edges, enough to exercise custom polarity here.
    struct Edges;

    impl Predicate for Edges {
        fn name(&self) -> &'static str {
            "dependency"
        }

        fn find(
            &self,
            ctx: &RuleContext<'_>,
            from: &Matcher,
            to: &Matcher,
        ) -> Result<PredicateMatches, EvaluationError> {
            let mut found = PredicateMatches::default();
            for node in ctx.graph.nodes() {
                if !from.matches(node, ctx.layer_of(&node.path)) {
                    continue;
                }
                found.subjects.push(node.path.clone());
                for edge in ctx.graph.edges_from(&node.path) {
                    if let Some(target) = ctx.graph.node(&edge.to) {
                        if to.matches(target, ctx.layer_of(&target.path)) {
                            found.matches.push((node.path.clone(), edge.to.clone()));
                        }
                    }
                }
            }
            Ok(found)
        }
    }

    fn evaluator() -> RuleEvaluator {
        RuleEvaluator::builder()
            .rule(FlagAll)
            .rule(Broken)
            .predicate(Edges)
            .build()
    }

    fn graph() -> DependencyGraph {
        DependencyGraph::new()
            .with_edge("src/ui/a.ts", "src/db/b.ts")
            .with_edge("src/ui/c.ts", "src/util.ts")
    }

    fn custom(forbidden: Option<bool>) -> RuleDefinition {
        RuleDefinition::custom(
            "custom-0",
            "ui-db",
            Severity::Error,
            RuleCondition {
                predicate: "dependency".into(),
                from: Some(json!({"path": "src/ui/**"})),
                to: Some(json!({"path": "src/db/**"})),
                forbidden,
            },
        )
    }

    fn run(set: &RuleSet, options: EvaluationOptions) -> Result<EvaluationOutcome, EvaluationAborted> {
        let graph = graph();
        let meta = CodebaseMeta::new();
        let ctx = RuleContext::new(&graph, &meta, None);
        evaluator().evaluate(set, &ctx, options)
    }

    #[test]
    fn violations_follow_rule_order_then_path() {
        let set = RuleSet::new(vec![
            RuleDefinition::built_in("built-in-0", "flag-all", Severity::Warn),
            custom(Some(true)),
        ]);
        let outcome = run(&set, EvaluationOptions::default()).unwrap();
        let paths: Vec<_> = outcome
            .violations
            .iter()
            .map(|v| (v.rule_id.as_str(), v.path.as_str()))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("built-in-0", "src/db/b.ts"),
                ("built-in-0", "src/ui/a.ts"),
                ("built-in-0", "src/ui/c.ts"),
                ("built-in-0", "src/util.ts"),
                ("custom-0", "src/ui/a.ts"),
            ]
        );
    }

    #[test]
    fn results_do_not_depend_on_pool_size() {
        let set = RuleSet::new(vec![
            RuleDefinition::built_in("built-in-0", "flag-all", Severity::Warn),
            RuleDefinition::built_in("built-in-1", "flag-all", Severity::Error),
            custom(None),
        ]);
        let single = run(
            &set,
            EvaluationOptions {
                parallelism: Some(1),
                ..EvaluationOptions::default()
            },
        )
        .unwrap();
        let many = run(
            &set,
            EvaluationOptions {
                parallelism: Some(4),
                ..EvaluationOptions::default()
            },
        )
        .unwrap();
        assert_eq!(single, many);
    }

    #[test]
    fn forbidden_flags_each_match() {
        let outcome = run(&RuleSet::new(vec![custom(Some(true))]), EvaluationOptions::default())
            .unwrap();
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].path, "src/ui/a.ts");
        assert_eq!(outcome.violations[0].related_paths, vec!["src/db/b.ts"]);
    }

    #[test]
    fn required_flags_subjects_without_match() {
        for forbidden in [None, Some(false)] {
            let outcome =
                run(&RuleSet::new(vec![custom(forbidden)]), EvaluationOptions::default()).unwrap();
            let paths: Vec<_> = outcome.violations.iter().map(|v| v.path.as_str()).collect();
            assert_eq!(paths, vec!["src/ui/c.ts"]);
        }
    }

    #[test]
    fn unknown_rule_and_predicate_fail_only_that_rule() {
        let mut unknown_predicate = custom(Some(true));
        unknown_predicate.id = "custom-2".into();
        if let RuleKind::Custom { condition } = &mut unknown_predicate.kind {
            condition.predicate = "co-change".into();
        }
        let set = RuleSet::new(vec![
            RuleDefinition::built_in("built-in-0", "no-such-rule", Severity::Error),
            RuleDefinition::built_in("built-in-1", "flag-all", Severity::Info),
            unknown_predicate,
        ]);
        let outcome = run(&set, EvaluationOptions::default()).unwrap();
        assert_eq!(outcome.violations.len(), 4);
        let failed: Vec<_> = outcome.failures.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(failed, vec!["built-in-0", "custom-2"]);
        assert_eq!(outcome.failures[0].code(), crate::ErrorCode::EvaluationError);
    }

    #[test]
    fn malformed_matcher_is_an_evaluation_failure() {
        let mut rule = custom(Some(true));
        if let RuleKind::Custom { condition } = &mut rule.kind {
            condition.from = Some(json!("src/ui/**"));
        }
        let outcome = run(&RuleSet::new(vec![rule]), EvaluationOptions::default()).unwrap();
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].reason.contains("from"));
    }

    #[test]
    fn layer_matcher_without_layers_fails_rule() {
        let mut rule = custom(Some(true));
        if let RuleKind::Custom { condition } = &mut rule.kind {
            condition.from = Some(json!({"layer": "ui"}));
        }
        let outcome = run(&RuleSet::new(vec![rule]), EvaluationOptions::default()).unwrap();
        assert_eq!(outcome.failures.len(), 1);
    }

    #[test]
    fn fail_fast_returns_first_failure() {
        let set = RuleSet::new(vec![
            RuleDefinition::built_in("built-in-0", "flag-all", Severity::Info),
            RuleDefinition::built_in("built-in-1", "broken", Severity::Error),
        ]);
        let options = EvaluationOptions {
            fail_fast: true,
            ..EvaluationOptions::default()
        };
        match run(&set, options) {
            Err(EvaluationAborted::FailFast(failure)) => assert_eq!(failure.rule_id, "built-in-1"),
            other => panic!("expected fail-fast, got {other:?}"),
        }
    }

    #[test]
    fn cancelled_token_aborts() {
        let graph = graph();
        let meta = CodebaseMeta::new();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RuleContext::new(&graph, &meta, None).with_cancellation(token);
        let set = RuleSet::new(vec![RuleDefinition::built_in(
            "built-in-0",
            "flag-all",
            Severity::Info,
        )]);
        assert_eq!(
            evaluator().evaluate(&set, &ctx, EvaluationOptions::default()),
            Err(EvaluationAborted::Cancelled)
        );
    }

    #[test]
    fn rules_are_listed_by_name() {
        let names: Vec<_> = evaluator().rules().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["broken", "flag-all"]);
        assert!(evaluator().rule("flag-all").is_some());
    }
}
