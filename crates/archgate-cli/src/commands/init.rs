//! Init command implementation.

use anyhow::{bail, Result};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# archgate configuration
version = "1"

# Presets to inherit; local settings win
extends = ["@c3/recommended"]

# Earlier layers may depend on later ones, never the reverse
[architecture]
style = "clean"

[[architecture.layers]]
name = "infrastructure"
path = "src/infrastructure"

[[architecture.layers]]
name = "application"
path = "src/application"

[[architecture.layers]]
name = "domain"
path = "src/domain"

[rules]
layer-dependencies = "error"
# consistent-naming = ["warn", { style = "kebab-case" }]
# no-dead-code = ["warn", { entry_points = ["src/main.ts"] }]

# [[whitelist]]
# rule = "no-circular-dependencies"
# path = "src/legacy/**"
# reason = "being untangled"

[discovery]
ignore = ["node_modules/**", "dist/**"]
"#;

/// Runs the init command.
pub fn run(force: bool) -> Result<()> {
    let config_path = Path::new("archgate.toml");

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(config_path, DEFAULT_CONFIG)?;

    println!("Created archgate.toml");
    println!("\nNext steps:");
    println!("  1. Adjust the layers to your source tree");
    println!("  2. Export the dependency graph to archgate-graph.json");
    println!("  3. Run: archgate check");

    Ok(())
}
