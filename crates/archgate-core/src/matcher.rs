//! Node selectors used by custom rule conditions.

use serde_json::Value;

use crate::error::EvaluationError;
use crate::graph::ModuleNode;

/// Selects graph nodes by path glob, layer name and tag.
///
/// Every field that is set must match. An empty matcher selects every node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matcher {
    path: Option<(String, glob::Pattern)>,
    layer: Option<String>,
    tag: Option<String>,
}

impl Matcher {
    /// A matcher that selects every node.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Restricts to paths matching a glob.
    ///
    /// # Errors
    ///
    /// Returns an error if the glob does not parse.
    pub fn with_path(mut self, pattern: &str) -> Result<Self, EvaluationError> {
        let compiled = glob::Pattern::new(pattern).map_err(|e| {
            EvaluationError::invalid_parameter("path", format!("invalid glob `{pattern}`: {e}"))
        })?;
        self.path = Some((pattern.to_string(), compiled));
        Ok(self)
    }

    /// Restricts to nodes in a layer.
    #[must_use]
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Restricts to nodes carrying a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Parses the raw `from` / `to` value of a condition.
    ///
    /// `None` and `null` give [`Matcher::any`].
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::InvalidParameter`] naming `field` if the value
    /// is not an object of optional strings `path`, `layer`, `tag`.
    pub fn from_value(field: &str, value: Option<&Value>) -> Result<Self, EvaluationError> {
        let object = match value {
            None | Some(Value::Null) => return Ok(Self::any()),
            Some(Value::Object(object)) => object,
            Some(other) => {
                return Err(EvaluationError::invalid_parameter(
                    field,
                    format!("expected an object, got {other}"),
                ))
            }
        };

        let mut matcher = Self::any();
        for (key, value) in object {
            let Some(text) = value.as_str() else {
                return Err(EvaluationError::invalid_parameter(
                    format!("{field}.{key}"),
                    format!("expected a string, got {value}"),
                ));
            };
            matcher = match key.as_str() {
                "path" => matcher.with_path(text).map_err(|_| {
                    EvaluationError::invalid_parameter(
                        format!("{field}.path"),
                        format!("invalid glob `{text}`"),
                    )
                })?,
                "layer" => matcher.with_layer(text),
                "tag" => matcher.with_tag(text),
                other => {
                    return Err(EvaluationError::invalid_parameter(
                        format!("{field}.{other}"),
                        "unknown matcher field, expected path, layer or tag",
                    ))
                }
            };
        }
        Ok(matcher)
    }

    /// Returns `true` if this matcher selects by layer.
    #[must_use]
    pub fn needs_layers(&self) -> bool {
        self.layer.is_some()
    }

    /// Tests a node; `layer` is the node's resolved layer, if any.
    #[must_use]
    pub fn matches(&self, node: &ModuleNode, layer: Option<&str>) -> bool {
        if let Some((raw, pattern)) = &self.path {
            if !glob_matches(raw, pattern, &node.path) {
                return false;
            }
        }
        if let Some(expected) = &self.layer {
            if layer != Some(expected.as_str()) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !node.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}

fn glob_matches(raw: &str, pattern: &glob::Pattern, path: &str) -> bool {
    if pattern.matches(path) {
        return true;
    }
    // `dir/**` also matches anything below `dir`
    raw.strip_suffix("/**").is_some_and(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(path: &str, tags: &[&str]) -> ModuleNode {
        ModuleNode::new(path).with_tags(tags.iter().copied())
    }

    #[test]
    fn absent_matcher_selects_everything() {
        let m = Matcher::from_value("from", None).unwrap();
        assert!(m.matches(&node("anything.ts", &[]), None));
        let m = Matcher::from_value("from", Some(&Value::Null)).unwrap();
        assert!(m.matches(&node("x", &[]), Some("ui")));
    }

    #[test]
    fn all_given_fields_must_match() {
        let value = json!({"path": "src/ui/**", "layer": "ui", "tag": "public"});
        let m = Matcher::from_value("from", Some(&value)).unwrap();
        assert!(m.needs_layers());
        assert!(m.matches(&node("src/ui/button.ts", &["public"]), Some("ui")));
        assert!(!m.matches(&node("src/ui/button.ts", &[]), Some("ui")));
        assert!(!m.matches(&node("src/ui/button.ts", &["public"]), Some("db")));
        assert!(!m.matches(&node("src/db/table.ts", &["public"]), Some("ui")));
    }

    #[test]
    fn path_glob_matches_nested_files() {
        let m = Matcher::any().with_path("src/db/**").unwrap();
        assert!(m.matches(&node("src/db/a/b.ts", &[]), None));
        assert!(!m.matches(&node("src/dbx/a.ts", &[]), None));
    }

    #[test]
    fn rejects_unknown_fields_and_types() {
        let err = Matcher::from_value("to", Some(&json!({"module": "x"}))).unwrap_err();
        assert!(err.to_string().contains("to.module"));
        assert!(Matcher::from_value("to", Some(&json!("src/**"))).is_err());
        assert!(Matcher::from_value("to", Some(&json!({"tag": 1}))).is_err());
    }

    #[test]
    fn rejects_bad_glob() {
        let err = Matcher::from_value("from", Some(&json!({"path": "src/[" }))).unwrap_err();
        assert!(err.to_string().contains("from.path"));
    }
}
