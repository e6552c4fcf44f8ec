//! List rules command implementation.

use archgate_rules::default_evaluator;

/// Runs the list-rules command.
pub fn run() {
    let evaluator = default_evaluator();

    println!("Available rules:\n");
    println!("{:<28} {:<9} Description", "Name", "Severity");
    println!("{}", "-".repeat(80));

    for rule in evaluator.rules() {
        println!(
            "{:<28} {:<9} {}",
            rule.name(),
            rule.default_severity().to_string(),
            rule.description()
        );
    }

    println!("\nPredicates for custom rules:\n");
    for predicate in evaluator.predicates() {
        println!("  {:<26} {}", predicate.name(), predicate.description());
    }

    println!("\nEnable a rule in archgate.toml, e.g.:");
    println!("  [rules]");
    println!("  no-circular-dependencies = \"error\"");
    println!("  consistent-naming = [\"warn\", {{ style = \"kebab-case\" }}]");
}
