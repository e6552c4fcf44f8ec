//! Named, reusable partial configurations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::schema::PartialConfiguration;

/// A named partial configuration that can be inherited via `extends`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Preset name, conventionally `@scope/name`.
    pub name: String,
    /// One-line description for listings.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// The contributed configuration.
    pub config: PartialConfiguration,
}

impl Preset {
    /// Creates a preset.
    #[must_use]
    pub fn new(name: impl Into<String>, config: PartialConfiguration) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            config,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Storage backend for presets.
///
/// The resolver only reads through [`PresetStore::lookup`]; registration is
/// done up front by whoever assembles the analyzer.
pub trait PresetStore: Send + Sync {
    /// Adds a preset, returning the one it replaced if the name was taken.
    fn register(&mut self, preset: Preset) -> Option<Preset>;

    /// Looks up a preset by name.
    fn lookup(&self, name: &str) -> Option<&Preset>;

    /// All registered names, sorted.
    fn names(&self) -> Vec<String>;
}

/// In-process preset table.
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: BTreeMap<String, Preset>,
}

impl PresetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a preset and returns `self` for chaining.
    #[must_use]
    pub fn with(mut self, preset: Preset) -> Self {
        self.register(preset);
        self
    }

    /// Iterates presets sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }

    /// Number of registered presets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl PresetStore for PresetRegistry {
    fn register(&mut self, preset: Preset) -> Option<Preset> {
        self.presets.insert(preset.name.clone(), preset)
    }

    fn lookup(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    fn names(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }
}

impl FromIterator<Preset> for PresetRegistry {
    fn from_iter<I: IntoIterator<Item = Preset>>(iter: I) -> Self {
        let mut registry = Self::new();
        for preset in iter {
            registry.register(preset);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleSpec;

    fn preset(name: &str) -> Preset {
        Preset::new(
            name,
            PartialConfiguration::default().with_rule("no-dead-code", RuleSpec::level("warn")),
        )
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = PresetRegistry::new();
        assert!(registry.register(preset("@acme/base")).is_none());
        assert!(registry.lookup("@acme/base").is_some());
        assert!(registry.lookup("@acme/other").is_none());
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = PresetRegistry::new().with(preset("@acme/base"));
        let replaced = registry.register(preset("@acme/base").with_description("v2"));
        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup("@acme/base").map(|p| p.description.as_str()),
            Some("v2")
        );
    }

    #[test]
    fn names_are_sorted() {
        let registry: PresetRegistry = ["@z/last", "@a/first", "@m/mid"]
            .into_iter()
            .map(preset)
            .collect();
        assert_eq!(registry.names(), vec!["@a/first", "@m/mid", "@z/last"]);
    }

    #[test]
    fn usable_as_trait_object() {
        let mut store: Box<dyn PresetStore> = Box::new(PresetRegistry::new());
        store.register(preset("@acme/base"));
        assert_eq!(store.names(), vec!["@acme/base"]);
    }
}
