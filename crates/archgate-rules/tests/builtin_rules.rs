//! Integration test: built-in rules and presets driven through `Analyzer`.

use archgate_core::config::{
    ArchitectureConfig, ArchitectureStyle, Configuration, RuleSpec, WhitelistEntry,
};
use archgate_core::{
    AnalysisSession, Analyzer, DependencyGraph, ProjectRef, SessionMetadata, SessionReport,
    SessionStatus, Severity,
};
use archgate_rules::{builtin_presets, default_evaluator, RECOMMENDED, STRICT};
use serde_json::json;

fn analyze(config: &Configuration, graph: &DependencyGraph) -> SessionReport {
    let analyzer = Analyzer::builder()
        .presets(builtin_presets())
        .evaluator(default_evaluator())
        .build();
    let mut session = AnalysisSession::new(ProjectRef::new("web", "."), SessionMetadata::default());
    analyzer
        .analyze(config, graph, &mut session)
        .expect("analysis should succeed")
}

fn cycle() -> DependencyGraph {
    DependencyGraph::new()
        .with_edge("src/a.ts", "src/b.ts")
        .with_edge("src/b.ts", "src/c.ts")
        .with_edge("src/c.ts", "src/a.ts")
}

fn layered() -> ArchitectureConfig {
    ArchitectureConfig::new(ArchitectureStyle::Clean)
        .with_layer("domain", "src/domain")
        .with_layer("application", "src/application")
        .with_layer("infrastructure", "src/infrastructure")
}

// ── Cycles ──

#[test]
fn three_module_cycle_reported_once_at_smallest_path() {
    let config =
        Configuration::new("1").with_rule("no-circular-dependencies", RuleSpec::level("error"));
    let report = analyze(&config, &cycle());

    assert_eq!(report.violations.len(), 1);
    let v = &report.violations[0];
    assert_eq!(v.path, "src/a.ts");
    assert_eq!(v.related_paths, vec!["src/b.ts", "src/c.ts"]);
    assert_eq!(v.rule_id, "built-in-0");
    assert!(report.has_errors());
}

#[test]
fn cycle_under_whitelisted_prefix_is_suppressed() {
    let graph = DependencyGraph::new()
        .with_edge("src/legacy/a.ts", "src/legacy/b.ts")
        .with_edge("src/legacy/b.ts", "src/legacy/a.ts")
        .with_edge("src/new/a.ts", "src/new/b.ts")
        .with_edge("src/new/b.ts", "src/new/a.ts");
    let config = Configuration::new("1")
        .with_rule("no-circular-dependencies", RuleSpec::level("error"))
        .with_rule("no-dead-code", RuleSpec::level("warn"))
        .with_whitelist(WhitelistEntry::new("no-circular-dependencies", "src/legacy/**"));
    let report = analyze(&config, &graph);

    let paths: Vec<&str> = report.violations.iter().map(|v| v.path.as_str()).collect();
    assert_eq!(paths, vec!["src/new/a.ts"]);
    assert_eq!(report.suppressed, 1);
}

#[test]
fn local_off_override_silences_preset_cycle_rule() {
    let config = Configuration::new("1")
        .extend(RECOMMENDED)
        .with_rule("no-circular-dependencies", RuleSpec::level("off"));
    let report = analyze(&config, &cycle());
    assert!(report
        .violations
        .iter()
        .all(|v| v.rule != "no-circular-dependencies"));
}

// ── Layers ──

#[test]
fn infrastructure_to_domain_is_flagged_but_not_the_reverse() {
    let graph = DependencyGraph::new()
        .with_edge("src/infrastructure/db.ts", "src/domain/order.ts")
        .with_edge("src/domain/order.ts", "src/infrastructure/db.ts");
    let config = Configuration::new("1")
        .with_architecture(layered())
        .with_rule("layer-dependencies", RuleSpec::level("error"));
    let report = analyze(&config, &graph);

    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].path, "src/infrastructure/db.ts");
    assert_eq!(
        report.violations[0].related_paths,
        vec!["src/domain/order.ts"]
    );
}

#[test]
fn strict_without_layers_records_a_failure() {
    let config = Configuration::new("1").extend(STRICT);
    let report = analyze(&config, &cycle());

    assert_eq!(report.status, SessionStatus::Completed);
    assert_eq!(report.evaluation_failures.len(), 1);
    assert_eq!(report.evaluation_failures[0].rule, "layer-dependencies");
    assert!(report
        .violations
        .iter()
        .any(|v| v.rule == "no-circular-dependencies"));
}

// ── Custom rules ──

#[test]
fn forbidden_custom_dependency_between_layers() {
    let graph = DependencyGraph::new()
        .with_edge("src/domain/order.ts", "src/infrastructure/db.ts")
        .with_edge("src/application/svc.ts", "src/domain/order.ts");
    let config = Configuration::new("1")
        .with_architecture(layered())
        .with_rule(
            "custom",
            RuleSpec::List(vec![json!({
                "name": "domain-is-pure",
                "severity": "error",
                "condition": {
                    "type": "transitive-dependency",
                    "from": {"layer": "application"},
                    "to": {"layer": "infrastructure"},
                    "forbidden": true
                }
            })]),
        );
    let report = analyze(&config, &graph);

    assert_eq!(report.violations.len(), 1);
    let v = &report.violations[0];
    assert_eq!(v.rule, "domain-is-pure");
    assert_eq!(v.rule_id, "custom-0");
    assert_eq!(v.path, "src/application/svc.ts");
    assert_eq!(v.related_paths, vec!["src/infrastructure/db.ts"]);
}

#[test]
fn required_custom_dependency_flags_subjects_without_match() {
    let graph = DependencyGraph::new()
        .with_edge("src/features/a/index.ts", "src/shared/logger.ts")
        .with_edge("src/features/b/index.ts", "src/features/a/index.ts");
    let config = Configuration::new("1").with_rule(
        "custom",
        RuleSpec::List(vec![json!({
            "name": "features-log",
            "severity": "warn",
            "condition": {
                "type": "dependency",
                "from": {"path": "src/features/**"},
                "to": {"path": "src/shared/logger.ts"}
            }
        })]),
    );
    let report = analyze(&config, &graph);

    let paths: Vec<&str> = report.violations.iter().map(|v| v.path.as_str()).collect();
    assert_eq!(paths, vec!["src/features/b/index.ts"]);
    assert!(!report.fails(Severity::Error));
    assert!(report.fails(Severity::Warn));
}

// ── Determinism ──

#[test]
fn repeated_runs_produce_identical_violations() {
    let graph = cycle()
        .with_edge("src/UtilHelper.ts", "src/a.ts")
        .with_edge("src/x.ts", "src/x.ts");
    let config = Configuration::new("1").extend(RECOMMENDED);
    let first = analyze(&config, &graph);
    for _ in 0..5 {
        assert_eq!(analyze(&config, &graph).violations, first.violations);
    }
}
