//! Rule to enforce one naming convention for module file names.
//!
//! The final extension is dropped and leading dots are ignored; the rest of
//! the file name is split on `.` and every part must match the style, so
//! `order-service.spec.ts` passes as kebab-case.
//!
//! # Configuration
//!
//! - `style`: `kebab-case` (default), `snake-case`, `camel-case` or `pascal-case`
//! - `ignore`: paths to skip, as exact paths or `dir/**` prefixes

use archgate_core::{
    EvaluationError, GraphRule, PathPattern, RuleContext, RuleDefinition, Severity, Violation,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Rule name for consistent-naming.
pub const NAME: &str = "consistent-naming";

#[allow(clippy::expect_used)]
static KEBAB_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("kebab-case regex is valid"));

#[allow(clippy::expect_used)]
static SNAKE_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(_[a-z0-9]+)*$").expect("snake-case regex is valid"));

#[allow(clippy::expect_used)]
static CAMEL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-zA-Z0-9]*$").expect("camel-case regex is valid"));

#[allow(clippy::expect_used)]
static PASCAL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*$").expect("pascal-case regex is valid"));

/// Supported naming conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingStyle {
    /// `order-service`
    #[default]
    KebabCase,
    /// `order_service`
    SnakeCase,
    /// `orderService`
    CamelCase,
    /// `OrderService`
    PascalCase,
}

impl NamingStyle {
    /// Parses a `style` parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "kebab-case" => Some(Self::KebabCase),
            "snake-case" => Some(Self::SnakeCase),
            "camel-case" => Some(Self::CamelCase),
            "pascal-case" => Some(Self::PascalCase),
            _ => None,
        }
    }

    /// The parameter spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KebabCase => "kebab-case",
            Self::SnakeCase => "snake-case",
            Self::CamelCase => "camel-case",
            Self::PascalCase => "pascal-case",
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            Self::KebabCase => &KEBAB_CASE,
            Self::SnakeCase => &SNAKE_CASE,
            Self::CamelCase => &CAMEL_CASE,
            Self::PascalCase => &PASCAL_CASE,
        }
    }

    /// Returns `true` if every dot-separated part of `name` follows the style.
    #[must_use]
    pub fn accepts(self, name: &str) -> bool {
        let regex = self.regex();
        name.split('.').all(|part| regex.is_match(part))
    }
}

impl std::fmt::Display for NamingStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The checked part of a module path: file name without leading dots and
/// without its final extension.
fn checked_name(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    let file = file.trim_start_matches('.');
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}

/// Enforces a file naming convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistentNaming {
    /// Style used when the rule has no `style` parameter.
    pub style: NamingStyle,
}

impl ConsistentNaming {
    /// Creates the rule with kebab-case as the default style.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default style.
    #[must_use]
    pub fn style(mut self, style: NamingStyle) -> Self {
        self.style = style;
        self
    }
}

impl GraphRule for ConsistentNaming {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Requires module file names to follow one naming style"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warn
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        rule: &RuleDefinition,
    ) -> Result<Vec<Violation>, EvaluationError> {
        let style = match rule.param_str("style")? {
            None => self.style,
            Some(raw) => NamingStyle::parse(raw).ok_or_else(|| {
                EvaluationError::invalid_parameter("style", format!("unknown style `{raw}`"))
            })?,
        };
        let ignore = rule
            .param_str_list("ignore")?
            .into_iter()
            .map(|raw| {
                PathPattern::parse(raw)
                    .map_err(|e| EvaluationError::invalid_parameter("ignore", e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut violations = Vec::new();
        for (visited, node) in ctx.graph.nodes().enumerate() {
            ctx.checkpoint(visited)?;
            if ignore.iter().any(|p| p.matches(&node.path)) {
                continue;
            }
            let name = checked_name(&node.path);
            if !style.accepts(name) {
                violations.push(Violation::for_rule(
                    rule,
                    node.path.as_str(),
                    format!("file name `{name}` is not {style}"),
                ));
            }
        }
        Ok(violations)
    }
}
