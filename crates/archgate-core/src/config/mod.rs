//! Configuration model and the resolution pipeline.
//!
//! # Architecture
//!
//! ```text
//! JSON / TOML text
//!   ↓ ConfigLoader (serde)
//! Configuration (validated)
//!   ↓ resolve() against a PresetStore
//! EffectiveConfiguration (re-validated)
//!   ↓ crate::compile()
//! RuleSet
//! ```

use std::path::PathBuf;

mod loader;
mod preset;
mod resolver;
mod schema;
mod watcher;

pub use loader::{ConfigFormat, ConfigLoader};
pub use preset::{Preset, PresetRegistry, PresetStore};
pub use resolver::{resolve, EffectiveConfiguration};
pub use schema::{
    ArchitectureConfig, ArchitectureStyle, Configuration, DiscoveryConfig, IssueKind, Layer,
    PartialConfiguration, RuleSpec, RuleTable, SchemaIssue, WhitelistEntry,
};
pub use watcher::{ConfigWatcher, Subscription};

use crate::error::ErrorCode;

/// Errors from loading, validating and resolving configurations.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {}", .path.display())]
    #[diagnostic(
        code(archgate::config::not_found),
        help("run `archgate init` to create a starter configuration")
    )]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The configuration file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    #[diagnostic(code(archgate::config::io))]
    Io {
        /// The unreadable path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not valid JSON/TOML or does not match the schema.
    #[error("failed to parse {origin}: {message}")]
    #[diagnostic(code(archgate::config::parse))]
    Parse {
        /// File path or other description of the document.
        origin: String,
        /// Parser message.
        message: String,
    },

    /// The file extension is neither `.json` nor `.toml`.
    #[error("unsupported configuration format: {}", .path.display())]
    #[diagnostic(
        code(archgate::config::unsupported_format),
        help("use a `.toml` or `.json` file")
    )]
    UnsupportedFormat {
        /// The offending path.
        path: PathBuf,
    },

    /// The `extends` chain loops back on itself.
    #[error("cyclic extends: {}", .cycle.join(" -> "))]
    #[diagnostic(code(archgate::config::cyclic_extends))]
    CyclicExtends {
        /// Preset names along the cycle, first name repeated at the end.
        cycle: Vec<String>,
    },

    /// A preset named in `extends` is not registered.
    #[error("preset `{name}` extended by {referenced_by} is not registered")]
    #[diagnostic(
        code(archgate::config::missing_preset),
        help("run `archgate list-presets` to see the registered presets")
    )]
    MissingPreset {
        /// The unknown preset.
        name: String,
        /// Who referenced it (`the project configuration` or a preset name).
        referenced_by: String,
    },

    /// Schema invariants do not hold.
    #[error("invalid configuration:\n{}", format_issues(.issues))]
    #[diagnostic(code(archgate::config::invalid))]
    Invalid {
        /// Every issue found.
        issues: Vec<SchemaIssue>,
    },
}

impl ConfigError {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::ConfigNotFound,
            _ => ErrorCode::InvalidConfig,
        }
    }
}

fn format_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}
