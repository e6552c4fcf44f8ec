//! List presets command implementation.

use archgate_core::config::RuleSpec;
use archgate_rules::builtin_presets;
use serde_json::Value;

/// Runs the list-presets command.
pub fn run() {
    println!("Built-in presets:\n");

    for preset in builtin_presets().iter() {
        println!("{}", preset.name);
        if !preset.description.is_empty() {
            println!("  {}", preset.description);
        }
        for (rule, spec) in preset.config.rules.iter() {
            println!("    {:<28} {}", rule, level_of(spec));
        }
        println!();
    }

    println!("Inherit a preset with `extends = [\"{}\"]`.", archgate_rules::RECOMMENDED);
}

/// Short label for a rule entry: its severity, or the custom rule count.
fn level_of(spec: &RuleSpec) -> String {
    match spec {
        RuleSpec::Level(level) => level.clone(),
        RuleSpec::List(items) => match items.first() {
            Some(Value::String(level)) => level.clone(),
            _ => format!("{} custom rule(s)", items.len()),
        },
    }
}
