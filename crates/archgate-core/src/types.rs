//! Core types for compliance violations.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, NotFoundError};
use crate::rule::RuleDefinition;

/// Severity level attached to a compiled rule and its violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational finding, never fails a build.
    Info,
    /// Warning that should be addressed.
    #[serde(alias = "warning")]
    Warn,
    /// Error that must be fixed.
    Error,
}

impl Severity {
    /// Parses a severity level as written in configuration files.
    ///
    /// Accepts `warning` as an alias of `warn`. Returns `None` for anything
    /// else, including `off`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single instance of a rule being broken at a module path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Id of the compiled rule that produced this violation (e.g. `built-in-0`).
    pub rule_id: String,
    /// Rule name (e.g. `no-circular-dependencies`).
    pub rule: String,
    /// Severity copied from the rule definition.
    pub severity: Severity,
    /// Module path the violation is reported at.
    pub path: String,
    /// Human-readable message.
    pub message: String,
    /// Other modules involved (cycle members, dependency targets).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_paths: Vec<String>,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(
        rule_id: impl Into<String>,
        rule: impl Into<String>,
        severity: Severity,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            rule: rule.into(),
            severity,
            path: path.into(),
            message: message.into(),
            related_paths: Vec::new(),
        }
    }

    /// Creates a violation stamped with the id, name and severity of `rule`.
    #[must_use]
    pub fn for_rule(
        rule: &RuleDefinition,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(&rule.id, &rule.name, rule.severity, path, message)
    }

    /// Adds one related path.
    #[must_use]
    pub fn with_related(mut self, path: impl Into<String>) -> Self {
        self.related_paths.push(path.into());
        self
    }

    /// Adds several related paths, keeping their order.
    #[must_use]
    pub fn with_related_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Formats the violation for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = format!("{} [{}] at {}\n", self.rule, self.rule_id, self.path);
        let _ = writeln!(output, "  {}: {}", self.severity, self.message);
        if !self.related_paths.is_empty() {
            let _ = writeln!(output, "  = related: {}", self.related_paths.join(", "));
        }
        output
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} [{}] {}",
            self.path, self.severity, self.rule, self.message
        )
    }
}

/// A rule whose evaluation failed, recorded next to the violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    /// Id of the failed rule.
    pub rule_id: String,
    /// Name of the failed rule.
    pub rule: String,
    /// Why the evaluation failed.
    pub reason: String,
}

impl EvaluationFailure {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(rule: &RuleDefinition, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule: rule.name.clone(),
            reason: reason.into(),
        }
    }

    /// Always [`ErrorCode::EvaluationError`].
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        ErrorCode::EvaluationError
    }
}

impl std::fmt::Display for EvaluationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.code(),
            self.rule_id,
            self.rule,
            self.reason
        )
    }
}

/// A non-fatal problem found while preparing a run, kept on the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl From<NotFoundError> for Diagnostic {
    fn from(err: NotFoundError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
