//! Whitelist-style path patterns.
//!
//! A pattern is either an exact module path or a prefix followed by a single
//! trailing `/**`, which matches every path strictly below the prefix.

use std::fmt;

/// Errors from parsing a [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// The pattern is empty.
    #[error("pattern must not be empty")]
    Empty,

    /// The pattern uses `*` anywhere other than a trailing `/**`.
    #[error("pattern `{pattern}` may only use `*` as a trailing `/**`")]
    UnsupportedWildcard {
        /// The rejected pattern.
        pattern: String,
    },
}

/// A validated path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathPattern {
    /// Matches exactly one path.
    Exact(String),
    /// Matches every path strictly below the prefix.
    Prefix(String),
}

impl PathPattern {
    /// Parses a pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is empty, is a bare `**`, or contains
    /// `*` anywhere except a trailing `/**`.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        let unsupported = || PatternError::UnsupportedWildcard {
            pattern: raw.to_string(),
        };
        if let Some(prefix) = raw.strip_suffix("/**") {
            let prefix = normalize(prefix);
            if prefix.is_empty() || prefix.contains('*') {
                return Err(unsupported());
            }
            return Ok(Self::Prefix(prefix));
        }
        if raw.contains('*') {
            return Err(unsupported());
        }
        Ok(Self::Exact(normalize(raw)))
    }

    /// Tests whether `path` matches this pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        match self {
            Self::Exact(exact) => *exact == path,
            Self::Prefix(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1),
        }
    }

    /// The path (exact) or prefix (for `/**` patterns) without decoration.
    #[must_use]
    pub fn base(&self) -> &str {
        match self {
            Self::Exact(path) | Self::Prefix(path) => path,
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(path) => write!(f, "{path}"),
            Self::Prefix(prefix) => write!(f, "{prefix}/**"),
        }
    }
}

/// Splits a module path into its non-empty `/`-separated segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

fn normalize(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}
