//! Error codes and the error types shared by the compiler and evaluator.
//!
//! Configuration errors live next to the configuration model in
//! [`crate::config::ConfigError`].

use serde::{Deserialize, Serialize};

/// Stable, machine-readable error codes exposed by every error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The configuration file does not exist.
    ConfigNotFound,
    /// The configuration failed to parse, validate or resolve.
    InvalidConfig,
    /// A raw rule entry is malformed.
    ValidationError,
    /// A rule failed while being evaluated.
    EvaluationError,
    /// A rule id or whitelist rule does not exist.
    NotFound,
}

impl ErrorCode {
    /// Returns the code as written in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigNotFound => "CONFIG_NOT_FOUND",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::EvaluationError => "EVALUATION_ERROR",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw rule entry that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The entry has the wrong shape (arity, types, missing fields).
    #[error("rule `{rule}`: {reason}")]
    MalformedRule {
        /// Name of the offending rule (or `custom[i]` for unnamed custom rules).
        rule: String,
        /// What is wrong with the entry.
        reason: String,
    },

    /// The severity string is not one of the accepted levels.
    #[error("rule `{rule}`: unknown severity `{value}`, expected: error, warn, info, off")]
    UnknownSeverity {
        /// Name of the offending rule.
        rule: String,
        /// The invalid value.
        value: String,
    },
}

impl ValidationError {
    /// Name of the rule the error refers to.
    #[must_use]
    pub fn rule(&self) -> &str {
        match self {
            Self::MalformedRule { rule, .. } | Self::UnknownSeverity { rule, .. } => rule,
        }
    }

    /// Always [`ErrorCode::ValidationError`].
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        ErrorCode::ValidationError
    }
}

/// Failure of a single rule during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// No graph rule is registered under this name.
    #[error("no rule named `{name}` is registered")]
    UnknownRule {
        /// The unknown rule name.
        name: String,
    },

    /// No predicate is registered for this condition type.
    #[error("no predicate registered for condition type `{name}`")]
    UnknownPredicate {
        /// The unknown condition type.
        name: String,
    },

    /// A parameter has the wrong type or value.
    #[error("invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        parameter: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The rule needs `architecture.layers` but none are configured.
    #[error("`architecture.layers` must be configured")]
    MissingLayers,

    /// The run was cancelled while the rule was traversing the graph.
    #[error("evaluation cancelled")]
    Cancelled,
}

impl EvaluationError {
    /// Shorthand for [`EvaluationError::InvalidParameter`].
    #[must_use]
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Always [`ErrorCode::EvaluationError`].
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        ErrorCode::EvaluationError
    }
}

/// A lookup by id or name that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{resource} `{id}` not found")]
pub struct NotFoundError {
    /// Kind of thing looked up (e.g. `rule`).
    pub resource: &'static str,
    /// The id or name that was looked up.
    pub id: String,
}

impl NotFoundError {
    /// Creates a new error.
    #[must_use]
    pub fn new(resource: &'static str, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: id.into(),
        }
    }

    /// Always [`ErrorCode::NotFound`].
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        ErrorCode::NotFound
    }
}
