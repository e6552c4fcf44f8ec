//! Shared output formatting for session reports.

use anyhow::Result;
use archgate_core::{SessionReport, SessionStatus, Severity};
use std::fmt::Write;

use crate::OutputFormat;

/// Print a session report in the specified format.
pub fn print(report: &SessionReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", render_text(report)),
        OutputFormat::Json => return print_json(report),
        OutputFormat::Compact => print!("{}", render_compact(report)),
    }
    Ok(())
}

fn render_text(report: &SessionReport) -> String {
    let (errors, warnings, infos) = report.count_by_severity();
    let mut out = String::new();

    for violation in &report.violations {
        let severity_indicator = match violation.severity {
            Severity::Error => "\x1b[31merror\x1b[0m",
            Severity::Warn => "\x1b[33mwarning\x1b[0m",
            Severity::Info => "\x1b[34minfo\x1b[0m",
        };

        let _ = writeln!(
            out,
            "{} [{}] at {}",
            violation.rule, violation.rule_id, violation.path
        );
        let _ = writeln!(out, "  {}: {}", severity_indicator, violation.message);
        for related in &violation.related_paths {
            let _ = writeln!(out, "  = related: {related}");
        }
        let _ = writeln!(out);
    }

    for failure in &report.evaluation_failures {
        let _ = writeln!(
            out,
            "\x1b[33mrule {} [{}] could not be evaluated\x1b[0m: {}",
            failure.rule, failure.rule_id, failure.reason
        );
    }

    for diagnostic in &report.diagnostics {
        let _ = writeln!(out, "\x1b[33mnote\x1b[0m: {diagnostic}");
    }

    if report.status != SessionStatus::Completed {
        let _ = writeln!(
            out,
            "\x1b[31msession {}\x1b[0m: {}",
            report.status,
            report.failure_reason.as_deref().unwrap_or("no reason recorded")
        );
    }

    let summary_color = if errors > 0 {
        "\x1b[31m"
    } else if warnings > 0 {
        "\x1b[33m"
    } else {
        "\x1b[32m"
    };

    let _ = writeln!(
        out,
        "{}Found {} error(s), {} warning(s), {} info(s); {} suppressed\x1b[0m",
        summary_color, errors, warnings, infos, report.suppressed
    );
    out
}

fn print_json(report: &SessionReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{json}");
    Ok(())
}

fn render_compact(report: &SessionReport) -> String {
    let mut out = String::new();
    for violation in &report.violations {
        let _ = writeln!(out, "{violation}");
    }
    for failure in &report.evaluation_failures {
        let _ = writeln!(out, "{failure}");
    }
    for diagnostic in &report.diagnostics {
        let _ = writeln!(out, "{diagnostic}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use archgate_core::{
        AnalysisSession, Diagnostic, EvaluationFailure, NotFoundError, ProjectRef, RuleDefinition,
        SessionMetadata, Violation,
    };

    fn report() -> SessionReport {
        let rule = RuleDefinition::built_in("built-in-0", "no-circular-dependencies", Severity::Error);
        let mut session = AnalysisSession::new(ProjectRef::new("web", "."), SessionMetadata::default());
        session
            .record_diagnostics([Diagnostic::from(NotFoundError::new(
                "whitelisted rule",
                "no-such-rule",
            ))])
            .unwrap();
        session.begin_parsing().unwrap();
        session.begin_evaluating().unwrap();
        session
            .record_violations(vec![Violation::for_rule(&rule, "src/a.ts", "circular dependency")
                .with_related("src/b.ts")])
            .unwrap();
        let broken = RuleDefinition::built_in("built-in-1", "layer-dependencies", Severity::Error);
        session
            .record_failures(vec![EvaluationFailure::new(&broken, "no layers configured")])
            .unwrap();
        session.record_suppressed(2).unwrap();
        session.complete();
        session.report().unwrap()
    }

    #[test]
    fn text_lists_violations_failures_diagnostics_and_summary() {
        let text = render_text(&report());
        assert!(text.contains("no-circular-dependencies [built-in-0] at src/a.ts"));
        assert!(text.contains("= related: src/b.ts"));
        assert!(text.contains("layer-dependencies [built-in-1] could not be evaluated"));
        assert!(text.contains("NOT_FOUND: whitelisted rule `no-such-rule` not found"));
        assert!(text.contains("Found 1 error(s), 0 warning(s), 0 info(s); 2 suppressed"));
        assert!(!text.contains("session "));
    }

    #[test]
    fn compact_is_one_line_per_entry() {
        let compact = render_compact(&report());
        assert_eq!(compact.lines().count(), 3);
        assert!(compact.starts_with("src/a.ts: "));
        assert_eq!(
            compact.lines().last(),
            Some("NOT_FOUND: whitelisted rule `no-such-rule` not found")
        );
    }

    #[test]
    fn json_round_trips() {
        let original = report();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
