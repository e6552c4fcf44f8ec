//! Resolution of `extends` chains into one effective configuration.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::debug;

use super::preset::PresetStore;
use super::schema::{
    ArchitectureConfig, Configuration, DiscoveryConfig, PartialConfiguration, RuleTable,
    WhitelistEntry,
};
use super::ConfigError;
use crate::rule::RuleOrigin;

const PROJECT: &str = "the project configuration";

/// A configuration with every preset merged in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfiguration {
    /// Version of the project configuration.
    pub version: String,
    /// Architecture from the most specific source that defines one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<ArchitectureConfig>,
    /// Merged rule entries.
    pub rules: RuleTable,
    /// Concatenated whitelist entries.
    pub whitelist: Vec<WhitelistEntry>,
    /// Merged discovery section, present if any source defines one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryConfig>,
    /// Origin of the winning entry for each rule name.
    pub rule_origins: BTreeMap<String, RuleOrigin>,
    /// Presets applied, in merge order.
    pub applied_presets: Vec<String>,
}

impl EffectiveConfiguration {
    /// Origin of the entry that won for `rule`; `Project` if unknown.
    #[must_use]
    pub fn origin_of(&self, rule: &str) -> RuleOrigin {
        self.rule_origins
            .get(rule)
            .copied()
            .unwrap_or(RuleOrigin::Project)
    }

    /// The discovery section, or an empty one.
    #[must_use]
    pub fn discovery_or_default(&self) -> DiscoveryConfig {
        self.discovery.clone().unwrap_or_default()
    }

    /// Converts back into a flat [`Configuration`] with no `extends`.
    #[must_use]
    pub fn to_configuration(&self) -> Configuration {
        Configuration {
            version: self.version.clone(),
            extends: Vec::new(),
            architecture: self.architecture.clone(),
            rules: self.rules.clone(),
            whitelist: self.whitelist.clone(),
            discovery: self.discovery.clone(),
        }
    }
}

/// Resolves `config.extends` against `store` and merges the result.
///
/// Presets are expanded depth first, left to right, so each preset's own
/// `extends` is applied before the preset itself. A preset reached twice
/// through different branches is applied once, at its first occurrence. The
/// local configuration is applied last.
///
/// # Errors
///
/// - [`ConfigError::CyclicExtends`] if a preset extends itself transitively.
/// - [`ConfigError::MissingPreset`] if a name is not in the store.
/// - [`ConfigError::Invalid`] if the merged result breaks a schema invariant.
pub fn resolve(
    config: &Configuration,
    store: &dyn PresetStore,
) -> Result<EffectiveConfiguration, ConfigError> {
    let mut merger = Merger::default();
    let mut active = Vec::new();
    for name in &config.extends {
        expand(name, PROJECT, store, &mut active, &mut merger)?;
    }
    merger.apply(Contribution::from(config), RuleOrigin::Project);

    let effective = merger.finish(config.version.clone());
    effective.to_configuration().validate()?;
    debug!(
        presets = effective.applied_presets.len(),
        rules = effective.rules.len(),
        "Resolved configuration"
    );
    Ok(effective)
}

fn expand(
    name: &str,
    referenced_by: &str,
    store: &dyn PresetStore,
    active: &mut Vec<String>,
    merger: &mut Merger,
) -> Result<(), ConfigError> {
    if let Some(start) = active.iter().position(|n| n == name) {
        let mut cycle = active[start..].to_vec();
        cycle.push(name.to_string());
        return Err(ConfigError::CyclicExtends { cycle });
    }
    if merger.applied.contains(name) {
        debug!(preset = name, "Preset already applied, skipping");
        return Ok(());
    }
    let preset = store
        .lookup(name)
        .ok_or_else(|| ConfigError::MissingPreset {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })?;

    active.push(name.to_string());
    let referrer = format!("`{name}`");
    for parent in &preset.config.extends {
        expand(parent, &referrer, store, active, merger)?;
    }
    active.pop();

    debug!(preset = name, "Applying preset");
    merger.apply(Contribution::from(&preset.config), RuleOrigin::Preset);
    merger.applied.insert(name.to_string());
    merger.order.push(name.to_string());
    Ok(())
}

// ────────────────────────────────────────────
// Merging
// ────────────────────────────────────────────

/// The fields a single source contributes.
struct Contribution<'a> {
    architecture: Option<&'a ArchitectureConfig>,
    rules: &'a RuleTable,
    whitelist: &'a [WhitelistEntry],
    discovery: Option<&'a DiscoveryConfig>,
}

impl<'a> From<&'a Configuration> for Contribution<'a> {
    fn from(config: &'a Configuration) -> Self {
        Self {
            architecture: config.architecture.as_ref(),
            rules: &config.rules,
            whitelist: &config.whitelist,
            discovery: config.discovery.as_ref(),
        }
    }
}

impl<'a> From<&'a PartialConfiguration> for Contribution<'a> {
    fn from(config: &'a PartialConfiguration) -> Self {
        Self {
            architecture: config.architecture.as_ref(),
            rules: &config.rules,
            whitelist: &config.whitelist,
            discovery: config.discovery.as_ref(),
        }
    }
}

#[derive(Default)]
struct Merger {
    architecture: Option<ArchitectureConfig>,
    rules: RuleTable,
    whitelist: Vec<WhitelistEntry>,
    discovery: Option<DiscoveryConfig>,
    origins: BTreeMap<String, RuleOrigin>,
    applied: HashSet<String>,
    order: Vec<String>,
}

impl Merger {
    fn apply(&mut self, source: Contribution<'_>, origin: RuleOrigin) {
        if let Some(architecture) = source.architecture {
            self.architecture = Some(architecture.clone());
        }
        for (name, spec) in source.rules.iter() {
            self.rules.insert(name, spec.clone());
            self.origins.insert(name.to_string(), origin);
        }
        self.whitelist.extend_from_slice(source.whitelist);
        if let Some(discovery) = source.discovery {
            let merged = self.discovery.get_or_insert_with(DiscoveryConfig::default);
            // dedup against earlier sources only; a lone source passes through as-is
            let inherited = merged.ignore.len();
            for pattern in &discovery.ignore {
                if !merged.ignore[..inherited].contains(pattern) {
                    merged.ignore.push(pattern.clone());
                }
            }
            for (key, value) in &discovery.hints {
                merged.hints.insert(key.clone(), *value);
            }
        }
    }

    fn finish(self, version: String) -> EffectiveConfiguration {
        EffectiveConfiguration {
            version,
            architecture: self.architecture,
            rules: self.rules,
            whitelist: self.whitelist,
            discovery: self.discovery,
            rule_origins: self.origins,
            applied_presets: self.order,
        }
    }
}
