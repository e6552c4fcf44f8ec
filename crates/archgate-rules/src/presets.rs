//! Built-in presets.

use archgate_core::config::{PartialConfiguration, Preset, PresetRegistry, PresetStore, RuleSpec};

use crate::{consistent_naming, layer_dependencies, no_circular_dependencies, no_dead_code};

/// Name of the recommended preset.
pub const RECOMMENDED: &str = "@c3/recommended";
/// Name of the strict preset.
pub const STRICT: &str = "@c3/strict";
/// Name of the minimal preset.
pub const MINIMAL: &str = "@c3/minimal";

/// Cycle checks as errors, naming and dead code as warnings.
#[must_use]
pub fn recommended() -> Preset {
    Preset::new(
        RECOMMENDED,
        PartialConfiguration::default()
            .with_rule(no_circular_dependencies::NAME, RuleSpec::level("error"))
            .with_rule(consistent_naming::NAME, RuleSpec::level("warn"))
            .with_rule(no_dead_code::NAME, RuleSpec::level("warn")),
    )
    .with_description("Cycles are errors; naming and dead code are warnings")
}

/// Every built-in rule as an error, including layer order.
///
/// `layer-dependencies` needs `architecture.layers`; without them that rule
/// is reported as an evaluation failure.
#[must_use]
pub fn strict() -> Preset {
    Preset::new(
        STRICT,
        PartialConfiguration::default()
            .with_rule(no_circular_dependencies::NAME, RuleSpec::level("error"))
            .with_rule(layer_dependencies::NAME, RuleSpec::level("error"))
            .with_rule(consistent_naming::NAME, RuleSpec::level("error"))
            .with_rule(no_dead_code::NAME, RuleSpec::level("error")),
    )
    .with_description("Every built-in rule is an error, including layer order")
}

/// Only cycle checks, for gradual adoption.
#[must_use]
pub fn minimal() -> Preset {
    Preset::new(
        MINIMAL,
        PartialConfiguration::default()
            .with_rule(no_circular_dependencies::NAME, RuleSpec::level("error")),
    )
    .with_description("Only circular dependencies, for gradual adoption")
}

/// A registry holding the three built-in presets.
#[must_use]
pub fn builtin_presets() -> PresetRegistry {
    let mut registry = PresetRegistry::new();
    register_builtin_presets(&mut registry);
    registry
}

/// Registers the built-in presets into any store, replacing same-named ones.
pub fn register_builtin_presets(store: &mut dyn PresetStore) {
    for preset in [recommended(), strict(), minimal()] {
        store.register(preset);
    }
}
