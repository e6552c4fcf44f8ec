//! Lifecycle of one analysis run.
//!
//! ```text
//! pending → parsing → evaluating → completed
//!    └─────────┴──────────┴──────→ failed | aborted
//! ```

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::CancellationToken;
use crate::types::{Diagnostic, EvaluationFailure, Severity, Violation};

/// State of an [`AnalysisSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, nothing started yet.
    Pending,
    /// Building the dependency graph.
    Parsing,
    /// Running rules.
    Evaluating,
    /// Finished normally.
    Completed,
    /// Stopped by an error.
    Failed,
    /// Stopped by cancellation.
    Aborted,
}

impl SessionStatus {
    /// Returns `true` for `completed`, `failed` and `aborted`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Parsing => "parsing",
            Self::Evaluating => "evaluating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// What started the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// The command-line tool.
    Cli,
    /// A library caller.
    #[default]
    Api,
    /// A scheduled job.
    Scheduled,
}

/// Bookkeeping about who started a session and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// User or service that started the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_by: Option<String>,
    /// What started the run.
    pub triggered_by: Trigger,
    /// Free-form environment name (`local`, `ci`, ...).
    pub environment: String,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            started_by: None,
            triggered_by: Trigger::default(),
            environment: "local".to_string(),
        }
    }
}

impl SessionMetadata {
    /// Metadata for the given trigger.
    #[must_use]
    pub fn new(triggered_by: Trigger) -> Self {
        Self {
            triggered_by,
            ..Self::default()
        }
    }

    /// Sets who started the run.
    #[must_use]
    pub fn started_by(mut self, who: impl Into<String>) -> Self {
        self.started_by = Some(who.into());
        self
    }

    /// Sets the environment name.
    #[must_use]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }
}

/// The project being analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    /// Stable identifier; defaults to the name.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Project root.
    pub root: PathBuf,
}

impl ProjectRef {
    /// Creates a reference whose id is its name.
    #[must_use]
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            root: root.into(),
        }
    }

    /// Overrides the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A forward transition requested from the wrong state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} while session is {from}")]
pub struct TransitionError {
    /// State the session was in.
    pub from: SessionStatus,
    /// The refused action.
    pub action: &'static str,
}

/// One analysis run: its state, violations and timestamps.
///
/// Terminal writes (`complete`, `fail`, `abort`) are accepted once; later
/// calls return `false` and change nothing.
///
/// Each session owns the token that cancels its run; clones share it.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    id: Uuid,
    project: ProjectRef,
    metadata: SessionMetadata,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    violations: Vec<Violation>,
    evaluation_failures: Vec<EvaluationFailure>,
    diagnostics: Vec<Diagnostic>,
    suppressed: usize,
    cancel: CancellationToken,
}

impl AnalysisSession {
    /// Creates a pending session with a fresh v4 id.
    #[must_use]
    pub fn new(project: ProjectRef, metadata: SessionMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            project,
            metadata,
            status: SessionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
            violations: Vec::new(),
            evaluation_failures: Vec::new(),
            diagnostics: Vec::new(),
            suppressed: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The analyzed project.
    #[must_use]
    pub fn project(&self) -> &ProjectRef {
        &self.project
    }

    /// Who started the run and where.
    #[must_use]
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Creation time.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time the session reached a terminal state.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Reason given to `fail` or `abort`.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Recorded violations, in recording order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Recorded rule failures.
    #[must_use]
    pub fn evaluation_failures(&self) -> &[EvaluationFailure] {
        &self.evaluation_failures
    }

    /// Non-fatal problems found while preparing the run.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of whitelisted violations.
    #[must_use]
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// Token that aborts this session's run. Clone it before handing the
    /// session to the analyzer to cancel from another thread.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns `true` once the session completed normally.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Returns `true` in any terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time from start to the terminal state.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    // ── transitions ─────────────────────────

    /// `pending → parsing`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] from any other state.
    pub fn begin_parsing(&mut self) -> Result<(), TransitionError> {
        self.advance(SessionStatus::Pending, SessionStatus::Parsing, "begin parsing")
    }

    /// `parsing → evaluating`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] from any other state.
    pub fn begin_evaluating(&mut self) -> Result<(), TransitionError> {
        self.advance(
            SessionStatus::Parsing,
            SessionStatus::Evaluating,
            "begin evaluating",
        )
    }

    fn advance(
        &mut self,
        expected: SessionStatus,
        next: SessionStatus,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError {
                from: self.status,
                action,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Appends violations.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] unless the session is evaluating.
    pub fn record_violations(
        &mut self,
        violations: impl IntoIterator<Item = Violation>,
    ) -> Result<(), TransitionError> {
        self.ensure_evaluating("record violations")?;
        self.violations.extend(violations);
        Ok(())
    }

    /// Appends rule failures.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] unless the session is evaluating.
    pub fn record_failures(
        &mut self,
        failures: impl IntoIterator<Item = EvaluationFailure>,
    ) -> Result<(), TransitionError> {
        self.ensure_evaluating("record failures")?;
        self.evaluation_failures.extend(failures);
        Ok(())
    }

    /// Adds to the suppressed count.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] unless the session is evaluating.
    pub fn record_suppressed(&mut self, count: usize) -> Result<(), TransitionError> {
        self.ensure_evaluating("record suppressions")?;
        self.suppressed += count;
        Ok(())
    }

    /// Appends preparation diagnostics.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] once the session is terminal.
    pub fn record_diagnostics(
        &mut self,
        diagnostics: impl IntoIterator<Item = Diagnostic>,
    ) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError {
                from: self.status,
                action: "record diagnostics",
            });
        }
        self.diagnostics.extend(diagnostics);
        Ok(())
    }

    fn ensure_evaluating(&self, action: &'static str) -> Result<(), TransitionError> {
        if self.status == SessionStatus::Evaluating {
            Ok(())
        } else {
            Err(TransitionError {
                from: self.status,
                action,
            })
        }
    }

    /// `evaluating → completed`. Returns `false` from any other state.
    pub fn complete(&mut self) -> bool {
        if self.status != SessionStatus::Evaluating {
            return false;
        }
        self.finish(SessionStatus::Completed, None);
        true
    }

    /// Moves a non-terminal session to `failed`. Returns `false` if already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.finish(SessionStatus::Failed, Some(reason.into()));
        true
    }

    /// Moves a non-terminal session to `aborted`. Returns `false` if already terminal.
    pub fn abort(&mut self, reason: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.finish(SessionStatus::Aborted, Some(reason.into()));
        true
    }

    fn finish(&mut self, status: SessionStatus, reason: Option<String>) {
        self.status = status;
        self.failure_reason = reason;
        self.completed_at = Some(Utc::now());
    }

    /// Snapshot of a terminal session; `None` while the run is in progress.
    #[must_use]
    pub fn report(&self) -> Option<SessionReport> {
        if !self.is_terminal() {
            return None;
        }
        Some(SessionReport {
            session_id: self.id,
            project: self.project.clone(),
            metadata: self.metadata.clone(),
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_ms: self.duration().map(|d| d.num_milliseconds()),
            failure_reason: self.failure_reason.clone(),
            violations: self.violations.clone(),
            evaluation_failures: self.evaluation_failures.clone(),
            diagnostics: self.diagnostics.clone(),
            suppressed: self.suppressed,
        })
    }
}

// ────────────────────────────────────────────
// Report
// ────────────────────────────────────────────

/// Terminal snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session id.
    pub session_id: Uuid,
    /// The analyzed project.
    pub project: ProjectRef,
    /// Session metadata.
    pub metadata: SessionMetadata,
    /// Terminal state.
    pub status: SessionStatus,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Time the terminal state was reached.
    pub completed_at: Option<DateTime<Utc>>,
    /// Run time in milliseconds.
    pub duration_ms: Option<i64>,
    /// Why the run failed or was aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Violations that survived the whitelist.
    pub violations: Vec<Violation>,
    /// Rules that could not be evaluated.
    pub evaluation_failures: Vec<EvaluationFailure>,
    /// Non-fatal configuration problems, such as whitelist entries for unknown rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    /// Number of whitelisted violations.
    pub suppressed: usize,
}

impl SessionReport {
    /// Returns `true` if the run completed normally.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Returns `true` if any violation is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.has_violations_at(Severity::Error)
    }

    /// Checks if any violation meets or exceeds the threshold.
    #[must_use]
    pub fn has_violations_at(&self, severity: Severity) -> bool {
        self.violations.iter().any(|v| v.severity >= severity)
    }

    /// Returns `true` if the run should fail a build at threshold `fail_on`.
    #[must_use]
    pub fn fails(&self, fail_on: Severity) -> bool {
        !self.is_complete() || self.has_violations_at(fail_on)
    }

    /// Violations with exactly this severity.
    #[must_use]
    pub fn by_severity(&self, severity: Severity) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .collect()
    }

    /// `(errors, warnings, infos)`.
    #[must_use]
    pub fn count_by_severity(&self) -> (usize, usize, usize) {
        let count = |severity| self.violations.iter().filter(|v| v.severity == severity).count();
        (
            count(Severity::Error),
            count(Severity::Warn),
            count(Severity::Info),
        )
    }

    /// Human-readable report of violations at or above `fail_on`.
    ///
    /// Suitable for `panic!()` messages in architecture tests.
    #[must_use]
    pub fn format_report(&self, fail_on: Severity) -> String {
        use std::fmt::Write;

        let failing: Vec<&Violation> = self
            .violations
            .iter()
            .filter(|v| v.severity >= fail_on)
            .collect();

        let mut report = String::new();
        let _ = writeln!(
            report,
            "\n=== archgate: {} violation(s) ===\n",
            failing.len()
        );
        for v in &failing {
            let _ = writeln!(report, "{}", v.format());
        }
        for failure in &self.evaluation_failures {
            let _ = writeln!(report, "{failure}");
        }
        for diagnostic in &self.diagnostics {
            let _ = writeln!(report, "{diagnostic}");
        }
        if let Some(reason) = &self.failure_reason {
            let _ = writeln!(report, "session {}: {reason}", self.status);
        }

        let (errors, warnings, infos) = self.count_by_severity();
        let _ = writeln!(
            report,
            "Total: {errors} error(s), {warnings} warning(s), {infos} info(s), {} suppressed",
            self.suppressed
        );
        report
    }
}
