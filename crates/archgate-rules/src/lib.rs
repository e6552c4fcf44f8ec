//! # archgate-rules
//!
//! Built-in graph rules, custom-rule predicates and presets for archgate.
//!
//! ## Available Rules
//!
//! | Name | Default severity | Description |
//! |------|------------------|-------------|
//! | `no-circular-dependencies` | error | Forbids import cycles |
//! | `layer-dependencies` | error | Enforces the configured layer order |
//! | `consistent-naming` | warn | Requires one file naming style |
//! | `no-dead-code` | warn | Flags modules nothing depends on |
//!
//! ## Predicates
//!
//! | `condition.type` | Description |
//! |------------------|-------------|
//! | `dependency` | Direct edge from subject to target |
//! | `transitive-dependency` | Target reachable from subject |
//!
//! ## Presets
//!
//! `@c3/recommended`, `@c3/strict` and `@c3/minimal`; see [`builtin_presets`].
//!
//! ## Usage
//!
//! ```ignore
//! use archgate_core::Analyzer;
//! use archgate_rules::{builtin_presets, default_evaluator};
//!
//! let analyzer = Analyzer::builder()
//!     .presets(builtin_presets())
//!     .evaluator(default_evaluator())
//!     .build();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consistent_naming;
pub mod layer_dependencies;
pub mod no_circular_dependencies;
pub mod no_dead_code;
mod predicates;
mod presets;

pub use consistent_naming::{ConsistentNaming, NamingStyle};
pub use layer_dependencies::{Direction, LayerDependencies};
pub use no_circular_dependencies::NoCircularDependencies;
pub use no_dead_code::NoDeadCode;
pub use predicates::{
    DependencyPredicate, TransitiveDependencyPredicate, DEPENDENCY, TRANSITIVE_DEPENDENCY,
};
pub use presets::{
    builtin_presets, minimal, recommended, register_builtin_presets, strict, MINIMAL,
    RECOMMENDED, STRICT,
};

use archgate_core::{GraphRuleBox, PredicateBox, RuleEvaluator};

/// Re-export core types for convenience.
pub use archgate_core::{GraphRule, Predicate, Severity, Violation};

/// Returns every built-in rule with default settings.
#[must_use]
pub fn all_rules() -> Vec<GraphRuleBox> {
    vec![
        Box::new(NoCircularDependencies::new()),
        Box::new(LayerDependencies::new()),
        Box::new(ConsistentNaming::new()),
        Box::new(NoDeadCode::new()),
    ]
}

/// Returns every built-in predicate.
#[must_use]
pub fn all_predicates() -> Vec<PredicateBox> {
    vec![
        Box::new(DependencyPredicate),
        Box::new(TransitiveDependencyPredicate),
    ]
}

/// An evaluator with all built-in rules and predicates registered.
#[must_use]
pub fn default_evaluator() -> RuleEvaluator {
    RuleEvaluator::builder()
        .rules(all_rules())
        .predicates(all_predicates())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_evaluator_registers_everything() {
        let evaluator = default_evaluator();
        let rules: Vec<_> = evaluator.rules().iter().map(|r| r.name()).collect();
        assert_eq!(
            rules,
            vec![
                "consistent-naming",
                "layer-dependencies",
                "no-circular-dependencies",
                "no-dead-code",
            ]
        );
        let predicates: Vec<_> = evaluator.predicates().iter().map(|p| p.name()).collect();
        assert_eq!(predicates, vec![DEPENDENCY, TRANSITIVE_DEPENDENCY]);
    }

    #[test]
    fn rules_have_descriptions() {
        for rule in all_rules() {
            assert!(!rule.description().is_empty(), "{}", rule.name());
        }
    }
}
