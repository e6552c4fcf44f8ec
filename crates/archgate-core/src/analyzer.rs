//! Orchestration of one analysis run.

use tracing::{debug, info, warn};

use crate::compiler::compile;
use crate::config::{resolve, ConfigError, Configuration, EffectiveConfiguration, PresetRegistry, PresetStore};
use crate::context::RuleContext;
use crate::error::{ErrorCode, ValidationError};
use crate::evaluator::{EvaluationAborted, EvaluationOptions, RuleEvaluator};
use crate::graph::{CodebaseMeta, GraphError, GraphProvider};
use crate::pattern::PatternError;
use crate::rule::RuleSet;
use crate::session::{AnalysisSession, SessionReport, TransitionError};
use crate::types::{Diagnostic, EvaluationFailure, Violation};
use crate::whitelist::WhitelistIndex;

/// Errors that end an analysis run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Loading or resolving the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A rule entry could not be compiled.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A whitelist path is not a supported pattern.
    #[error("invalid whitelist: {0}")]
    Whitelist(#[from] PatternError),

    /// The graph provider failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A rule failed while `fail_fast` was set.
    #[error("rule failed: {0}")]
    Evaluation(EvaluationFailure),

    /// The run was cancelled.
    #[error("analysis aborted: {reason}")]
    Aborted {
        /// Why the run stopped.
        reason: String,
    },

    /// The rule worker pool could not start.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    /// The session was not in a state this run could drive.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl AnalysisError {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config(e) => e.code(),
            Self::Validation(e) => e.code(),
            Self::Whitelist(_) => ErrorCode::InvalidConfig,
            Self::Graph(_)
            | Self::Evaluation(_)
            | Self::Aborted { .. }
            | Self::WorkerPool(_)
            | Self::Transition(_) => ErrorCode::EvaluationError,
        }
    }
}

/// Output of the configuration half of the pipeline.
#[derive(Debug)]
pub struct PreparedRules {
    /// The resolved configuration.
    pub effective: EffectiveConfiguration,
    /// Compiled rules.
    pub rules: RuleSet,
    /// Whitelist index over `effective.whitelist`.
    pub whitelist: WhitelistIndex,
    /// Non-fatal problems, e.g. whitelist entries for rules not in `rules`.
    pub diagnostics: Vec<Diagnostic>,
}

/// Builder for an [`Analyzer`].
#[derive(Default)]
pub struct AnalyzerBuilder {
    presets: Option<Box<dyn PresetStore>>,
    evaluator: Option<RuleEvaluator>,
    options: EvaluationOptions,
    meta: CodebaseMeta,
}

impl AnalyzerBuilder {
    /// Creates a builder with no presets and no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the preset store.
    #[must_use]
    pub fn presets<S: PresetStore + 'static>(mut self, store: S) -> Self {
        self.presets = Some(Box::new(store));
        self
    }

    /// Sets a boxed preset store.
    #[must_use]
    pub fn presets_box(mut self, store: Box<dyn PresetStore>) -> Self {
        self.presets = Some(store);
        self
    }

    /// Sets the rule evaluator.
    #[must_use]
    pub fn evaluator(mut self, evaluator: RuleEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Replaces all evaluation options.
    #[must_use]
    pub fn options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    /// Stops at the first failing rule (default: false).
    #[must_use]
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.options.fail_fast = fail_fast;
        self
    }

    /// Runs rules on a dedicated pool of `threads` workers.
    #[must_use]
    pub fn parallelism(mut self, threads: usize) -> Self {
        self.options.parallelism = Some(threads);
        self
    }

    /// Nodes visited between cancellation checks.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.options.batch_size = batch_size;
        self
    }

    /// Sets codebase metadata passed to rules.
    #[must_use]
    pub fn meta(mut self, meta: CodebaseMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Builds the analyzer.
    #[must_use]
    pub fn build(self) -> Analyzer {
        Analyzer {
            presets: self
                .presets
                .unwrap_or_else(|| Box::new(PresetRegistry::new())),
            evaluator: self.evaluator.unwrap_or_default(),
            options: self.options,
            meta: self.meta,
        }
    }
}

/// Drives a run from raw configuration to a [`SessionReport`].
///
/// Use [`Analyzer::builder()`] to construct an instance. The analyzer is the
/// only writer of the session it is given. It keeps no per-run state, so one
/// instance can drive any number of sessions.
pub struct Analyzer {
    presets: Box<dyn PresetStore>,
    evaluator: RuleEvaluator,
    options: EvaluationOptions,
    meta: CodebaseMeta,
}

impl Analyzer {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::new()
    }

    /// The preset store.
    #[must_use]
    pub fn presets(&self) -> &dyn PresetStore {
        self.presets.as_ref()
    }

    /// The rule evaluator.
    #[must_use]
    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    /// Evaluation options.
    #[must_use]
    pub fn options(&self) -> EvaluationOptions {
        self.options
    }

    /// Resolves, compiles and indexes `config` without evaluating anything.
    ///
    /// # Errors
    ///
    /// Returns the first resolution, compilation or whitelist error.
    pub fn prepare(&self, config: &Configuration) -> Result<PreparedRules, AnalysisError> {
        let effective = resolve(config, self.presets.as_ref())?;
        let rules = compile(&effective)?;
        let whitelist = WhitelistIndex::build(&effective.whitelist)?;
        let diagnostics: Vec<Diagnostic> = whitelist
            .unknown_rules(&rules)
            .into_iter()
            .map(Diagnostic::from)
            .collect();
        debug!(
            rules = rules.len(),
            whitelist = whitelist.len(),
            diagnostics = diagnostics.len(),
            presets = ?effective.applied_presets,
            "Prepared rules"
        );
        Ok(PreparedRules {
            effective,
            rules,
            whitelist,
            diagnostics,
        })
    }

    /// Runs the full pipeline and writes the results into `session`.
    ///
    /// Configuration errors fail the session before any graph is built.
    /// Provider errors fail it during parsing. Cancelling the session's
    /// [`AnalysisSession::cancellation_token`] aborts it.
    /// Whatever happens, `session` ends in a terminal state unless it was
    /// handed over in the wrong state.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the run; the session's report is still
    /// available through [`AnalysisSession::report`].
    pub fn analyze(
        &self,
        config: &Configuration,
        provider: &dyn GraphProvider,
        session: &mut AnalysisSession,
    ) -> Result<SessionReport, AnalysisError> {
        info!(session = %session.id(), project = %session.project().name, "Starting analysis");

        let prepared = match self.prepare(config) {
            Ok(prepared) => prepared,
            Err(e) => return Err(fail(session, e)),
        };
        let cancel = session.cancellation_token();

        session.record_diagnostics(prepared.diagnostics.iter().cloned())?;
        session.begin_parsing()?;
        if cancel.is_cancelled() {
            return Err(abort(session));
        }
        let discovery = prepared.effective.discovery_or_default();
        let graph = match provider.build(&discovery) {
            Ok(graph) => graph,
            Err(e) => return Err(fail(session, e.into())),
        };
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Dependency graph ready"
        );

        session.begin_evaluating()?;
        let meta = self.meta.clone().with_discovery(&discovery);
        let ctx = RuleContext::new(&graph, &meta, prepared.effective.architecture.as_ref())
            .with_cancellation(cancel);
        let outcome = match self.evaluator.evaluate(&prepared.rules, &ctx, self.options) {
            Ok(outcome) => outcome,
            Err(EvaluationAborted::Cancelled) => return Err(abort(session)),
            Err(EvaluationAborted::FailFast(failure)) => {
                return Err(fail(session, AnalysisError::Evaluation(failure)))
            }
            Err(EvaluationAborted::WorkerPool(message)) => {
                return Err(fail(session, AnalysisError::WorkerPool(message)))
            }
        };

        let (suppressed, kept): (Vec<Violation>, Vec<Violation>) = outcome
            .violations
            .into_iter()
            .partition(|v| prepared.whitelist.suppresses(v));
        for v in &suppressed {
            if let Some(entry) = prepared.whitelist.matching_entry(&v.rule, &v.path) {
                debug!(
                    rule = %v.rule,
                    path = %v.path,
                    reason = entry.reason.as_deref().unwrap_or("-"),
                    "Suppressed violation"
                );
            }
        }
        session.record_violations(kept)?;
        session.record_failures(outcome.failures)?;
        session.record_suppressed(suppressed.len())?;
        session.complete();

        let report = session.report().ok_or(TransitionError {
            from: session.status(),
            action: "report",
        })?;
        let (errors, warnings, infos) = report.count_by_severity();
        info!(
            errors,
            warnings,
            infos,
            suppressed = report.suppressed,
            failures = report.evaluation_failures.len(),
            "Analysis complete"
        );
        Ok(report)
    }
}

fn fail(session: &mut AnalysisSession, error: AnalysisError) -> AnalysisError {
    warn!(code = %error.code(), "Analysis failed: {error}");
    session.fail(error.to_string());
    error
}

fn abort(session: &mut AnalysisSession) -> AnalysisError {
    let reason = "cancelled".to_string();
    info!(session = %session.id(), "Analysis aborted");
    session.abort(reason.clone());
    AnalysisError::Aborted { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Preset, PartialConfiguration, RuleSpec, WhitelistEntry};
    use crate::error::{ErrorCode, EvaluationError};
    use crate::graph::DependencyGraph;
    use crate::rule::{GraphRule, RuleDefinition};
    use crate::session::{ProjectRef, SessionMetadata, SessionStatus};
    use crate::types::Severity;

    /// Flags every node with an outgoing edge.
    struct HasImports;

    impl GraphRule for HasImports {
        fn name(&self) -> &'static str {
            "has-imports"
        }

        fn check(
            &self,
            ctx: &RuleContext<'_>,
            rule: &RuleDefinition,
        ) -> Result<Vec<Violation>, EvaluationError> {
            let mut out = Vec::new();
            for (i, node) in ctx.graph.nodes().enumerate() {
                ctx.checkpoint(i)?;
                if !ctx.graph.edges_from(&node.path).is_empty() {
                    out.push(Violation::for_rule(rule, &node.path, "imports something"));
                }
            }
            Ok(out)
        }
    }

    fn analyzer() -> Analyzer {
        let registry = PresetRegistry::new().with(Preset::new(
            "@t/base",
            PartialConfiguration::default().with_rule("has-imports", RuleSpec::level("warn")),
        ));
        Analyzer::builder()
            .presets(registry)
            .evaluator(RuleEvaluator::builder().rule(HasImports).build())
            .build()
    }

    fn graph() -> DependencyGraph {
        DependencyGraph::new()
            .with_edge("src/legacy/a.ts", "src/b.ts")
            .with_edge("src/c.ts", "src/b.ts")
    }

    fn session() -> AnalysisSession {
        AnalysisSession::new(ProjectRef::new("demo", "."), SessionMetadata::default())
    }

    #[test]
    fn full_run_completes_and_filters_whitelist() {
        let config = Configuration::new("1")
            .extend("@t/base")
            .with_whitelist(WhitelistEntry::new("has-imports", "src/legacy/**"));
        let mut session = session();
        let report = analyzer().analyze(&config, &graph(), &mut session).unwrap();
        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(report.suppressed, 1);
        let paths: Vec<_> = report.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["src/c.ts"]);
        assert_eq!(report.violations[0].severity, Severity::Warn);
    }

    #[test]
    fn config_error_fails_session_before_parsing() {
        let config = Configuration::new("1").extend("@t/missing");
        let mut session = session();
        let err = analyzer().analyze(&config, &graph(), &mut session).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert_eq!(session.status(), SessionStatus::Failed);
        assert!(session.failure_reason().unwrap().contains("@t/missing"));
    }

    #[test]
    fn validation_error_fails_session() {
        let config = Configuration::new("1").with_rule("has-imports", RuleSpec::level("loud"));
        let mut session = session();
        let err = analyzer().analyze(&config, &graph(), &mut session).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(session.status(), SessionStatus::Failed);
    }

    #[test]
    fn provider_error_fails_session() {
        struct Broken;
        impl GraphProvider for Broken {
            fn build(
                &self,
                _discovery: &crate::config::DiscoveryConfig,
            ) -> Result<DependencyGraph, GraphError> {
                Err(GraphError::Provider("parser crashed".into()))
            }
        }
        let mut session = session();
        let err = analyzer()
            .analyze(&Configuration::new("1"), &Broken, &mut session)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Graph(_)));
        assert_eq!(session.failure_reason(), Some("parser crashed"));
        assert!(session.report().is_some());
    }

    #[test]
    fn cancellation_aborts_session() {
        let analyzer = analyzer();
        let mut session = session();
        session.cancellation_token().cancel();
        let err = analyzer
            .analyze(&Configuration::new("1").extend("@t/base"), &graph(), &mut session)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Aborted { .. }));
        assert_eq!(session.status(), SessionStatus::Aborted);
    }

    #[test]
    fn cancelled_session_does_not_affect_the_next_one() {
        let analyzer = analyzer();
        let config = Configuration::new("1").extend("@t/base");

        let mut first = session();
        first.cancellation_token().cancel();
        assert!(analyzer.analyze(&config, &graph(), &mut first).is_err());
        assert_eq!(first.status(), SessionStatus::Aborted);

        let mut second = session();
        let report = analyzer.analyze(&config, &graph(), &mut second).unwrap();
        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(report.violations.len(), 2);
    }

    #[test]
    fn whitelist_for_unknown_rule_is_reported() {
        let config = Configuration::new("1")
            .extend("@t/base")
            .with_whitelist(WhitelistEntry::new("no-such-rule", "src/**"));
        let mut session = session();
        let report = analyzer().analyze(&config, &graph(), &mut session).unwrap();

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].code, ErrorCode::NotFound);
        assert!(report.diagnostics[0].message.contains("no-such-rule"));
        assert!(report.evaluation_failures.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["diagnostics"][0]["code"], "NOT_FOUND");
    }

    #[test]
    fn unknown_rule_is_recorded_not_fatal() {
        let config = Configuration::new("1")
            .with_rule("has-imports", RuleSpec::level("error"))
            .with_rule("not-registered", RuleSpec::level("error"));
        let mut session = session();
        let report = analyzer().analyze(&config, &graph(), &mut session).unwrap();
        assert_eq!(report.evaluation_failures.len(), 1);
        assert_eq!(report.evaluation_failures[0].rule, "not-registered");
        assert_eq!(report.violations.len(), 2);
    }

    #[test]
    fn session_in_wrong_state_is_rejected() {
        let mut session = session();
        session.begin_parsing().unwrap();
        let err = analyzer()
            .analyze(&Configuration::new("1"), &graph(), &mut session)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Transition(_)));
    }

    #[test]
    fn prepare_exposes_effective_configuration() {
        let prepared = analyzer()
            .prepare(&Configuration::new("1").extend("@t/base"))
            .unwrap();
        assert_eq!(prepared.effective.applied_presets, vec!["@t/base"]);
        assert_eq!(prepared.rules.len(), 1);
        assert!(prepared.whitelist.is_empty());
        assert!(prepared.diagnostics.is_empty());
    }
}
