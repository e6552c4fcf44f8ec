//! # archgate-core
//!
//! Core engine for architecture compliance checks over a module dependency graph.
//!
//! This crate provides the configuration pipeline and the evaluation engine:
//!
//! - [`config`] for the configuration model, preset stores and [`config::resolve`]
//! - [`compile`] for turning an effective configuration into a [`RuleSet`]
//! - [`WhitelistIndex`] for suppressing accepted violations
//! - [`RuleEvaluator`] with the [`GraphRule`] and [`Predicate`] traits
//! - [`AnalysisSession`] and the [`Analyzer`] that drives a whole run
//!
//! ## Example
//!
//! ```ignore
//! use archgate_core::{Analyzer, AnalysisSession, DependencyGraph, ProjectRef};
//!
//! let analyzer = Analyzer::builder()
//!     .presets(registry)
//!     .evaluator(evaluator)
//!     .build();
//!
//! let mut session = AnalysisSession::new(ProjectRef::new("web", "."), Default::default());
//! let report = analyzer.analyze(&config, &graph, &mut session)?;
//! println!("{}", report.format_report(Severity::Error));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod analyzer;
mod compiler;
mod context;
mod error;
mod evaluator;
mod graph;
mod matcher;
mod pattern;
mod rule;
mod session;
mod types;
mod whitelist;

/// Configuration model, presets, resolution and loading.
pub mod config;

pub use analyzer::{AnalysisError, Analyzer, AnalyzerBuilder, PreparedRules};
pub use compiler::{compile, CUSTOM_RULES_KEY};
pub use context::{CancellationToken, LayerResolver, RuleContext, DEFAULT_BATCH_SIZE};
pub use error::{ErrorCode, EvaluationError, NotFoundError, ValidationError};
pub use evaluator::{
    EvaluationAborted, EvaluationOptions, EvaluationOutcome, RuleEvaluator, RuleEvaluatorBuilder,
};
pub use graph::{
    CodebaseMeta, DependencyGraph, Edge, EdgeKind, GraphDocument, GraphError, GraphProvider,
    JsonGraphProvider, ModuleNode, ENTRY_HINT_PREFIX,
};
pub use matcher::Matcher;
pub use pattern::{PathPattern, PatternError};
pub use rule::{
    GraphRule, GraphRuleBox, Parameters, Predicate, PredicateBox, PredicateMatches,
    RuleCondition, RuleDefinition, RuleKind, RuleOrigin, RuleSet,
};
pub use session::{
    AnalysisSession, ProjectRef, SessionMetadata, SessionReport, SessionStatus, TransitionError,
    Trigger,
};
pub use types::{Diagnostic, EvaluationFailure, Severity, Violation};
pub use whitelist::WhitelistIndex;
