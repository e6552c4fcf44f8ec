//! One-call project check for test suites and scripts.

use archgate_core::config::{ConfigLoader, Configuration};
use archgate_core::{
    AnalysisError, AnalysisSession, JsonGraphProvider, ProjectRef, SessionMetadata,
    SessionReport, Trigger,
};
use std::path::Path;

/// Config file names to search for, in priority order.
pub const CONFIG_CANDIDATES: &[&str] = &["archgate.toml", ".archgate.toml", "archgate.json"];

/// Graph file read from the project directory.
pub const GRAPH_FILE: &str = "archgate-graph.json";

/// Checks the project rooted at `root`.
///
/// The first file in [`CONFIG_CANDIDATES`] is used; without one the project
/// extends `@c3/recommended`. The graph is read from [`GRAPH_FILE`].
///
/// # Errors
///
/// Returns an [`AnalysisError`] if the configuration is invalid or the run
/// fails or is aborted. Violations are not errors; inspect the report.
pub fn check_project(root: impl AsRef<Path>) -> Result<SessionReport, AnalysisError> {
    let root = root.as_ref();
    let config = read_config(root)?;

    let analyzer = crate::analyzer().build();
    let provider = JsonGraphProvider::new(root.join(GRAPH_FILE));
    let name = root
        .file_name()
        .map_or_else(|| "project".to_string(), |n| n.to_string_lossy().into_owned());
    let mut session = AnalysisSession::new(
        ProjectRef::new(name, root),
        SessionMetadata::new(Trigger::Api),
    );

    analyzer.analyze(&config, &provider, &mut session)
}

fn read_config(root: &Path) -> Result<Configuration, AnalysisError> {
    for candidate in CONFIG_CANDIDATES {
        let path = root.join(candidate);
        if path.exists() {
            tracing::debug!("Using config {}", path.display());
            return Ok(ConfigLoader::load(&path)?);
        }
    }
    Ok(Configuration::new("1").extend(archgate_rules::RECOMMENDED))
}
