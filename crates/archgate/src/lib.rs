//! # archgate
//!
//! Architecture compliance checks over a module dependency graph.
//!
//! This is the facade crate that re-exports the core model and the built-in rules.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! // tests/architecture.rs
//! #[test]
//! fn architecture() {
//!     let report = archgate::check_project(env!("CARGO_MANIFEST_DIR")).unwrap();
//!     assert!(!report.fails(archgate::Severity::Error), "{}", report.format_report(archgate::Severity::Error));
//! }
//! ```
//!
//! The project directory holds `archgate.toml` (or `.archgate.toml`, `archgate.json`)
//! and the exported graph in `archgate-graph.json`.
//!
//! ## Programmatic Usage
//!
//! ```rust,ignore
//! use archgate::{AnalysisSession, ProjectRef, SessionMetadata};
//!
//! let analyzer = archgate::analyzer().fail_fast(true).build();
//! let mut session = AnalysisSession::new(ProjectRef::new("web", "."), SessionMetadata::default());
//! let report = analyzer.analyze(&config, &graph, &mut session)?;
//! ```

#![forbid(unsafe_code)]

// Re-export core types and traits
pub use archgate_core::*;

/// Built-in rules, predicates and presets.
pub mod rules {
    pub use archgate_rules::*;
}

mod runner;

pub use runner::{check_project, CONFIG_CANDIDATES, GRAPH_FILE};

/// Analyzer builder wired with the built-in presets and the default evaluator.
#[must_use]
pub fn analyzer() -> AnalyzerBuilder {
    Analyzer::builder()
        .presets(archgate_rules::builtin_presets())
        .evaluator(archgate_rules::default_evaluator())
}
