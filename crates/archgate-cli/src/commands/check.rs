//! Check command implementation.

use anyhow::{anyhow, Result};
use archgate_core::config::ConfigError;
use archgate_core::{
    AnalysisError, AnalysisSession, Analyzer, JsonGraphProvider, ProjectRef, SessionMetadata,
    Severity, Trigger,
};
use archgate_rules::{builtin_presets, default_evaluator};
use std::path::{Path, PathBuf};

use crate::config_resolver::ConfigSource;
use crate::OutputFormat;

/// Graph file looked up in the project directory when `--graph` is absent.
pub const DEFAULT_GRAPH_FILE: &str = "archgate-graph.json";

/// Flags of the check command.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Dependency graph file.
    pub graph: Option<PathBuf>,
    /// Output format.
    pub format: OutputFormat,
    /// Lowest severity that fails the run.
    pub fail_on: Severity,
    /// Stop at the first failing rule.
    pub fail_fast: bool,
    /// Rule worker threads.
    pub jobs: Option<usize>,
    /// Environment recorded on the session.
    pub environment: String,
}

/// Runs the check command.
pub fn run(path: &Path, source: &ConfigSource, options: &CheckOptions) -> Result<()> {
    tracing::info!(kind = source.kind(), "Using {source}");
    let config = source.load().map_err(render_config_error)?;

    let graph_path = options
        .graph
        .clone()
        .unwrap_or_else(|| path.join(DEFAULT_GRAPH_FILE));
    let provider = JsonGraphProvider::new(&graph_path);

    let mut builder = Analyzer::builder()
        .presets(builtin_presets())
        .evaluator(default_evaluator())
        .fail_fast(options.fail_fast);
    if let Some(jobs) = options.jobs {
        builder = builder.parallelism(jobs);
    }
    let analyzer = builder.build();

    let metadata = SessionMetadata::new(Trigger::Cli).environment(options.environment.as_str());
    let mut session = AnalysisSession::new(project_ref(path), metadata);

    tracing::info!(
        "Checking {} against {}",
        path.display(),
        graph_path.display()
    );

    let report = match analyzer.analyze(&config, &provider, &mut session) {
        Ok(report) => report,
        Err(AnalysisError::Config(e)) => return Err(render_config_error(e)),
        Err(e) => {
            if let Some(report) = session.report() {
                super::output::print(&report, options.format)?;
            }
            return Err(anyhow::Error::new(e).context("Analysis failed"));
        }
    };

    super::output::print(&report, options.format)?;

    if report.fails(options.fail_on) {
        std::process::exit(1);
    }

    Ok(())
}

fn project_ref(path: &Path) -> ProjectRef {
    let name = path
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".to_string());
    ProjectRef::new(name, path)
}

/// Prints a configuration error as a diagnostic and returns a short error.
fn render_config_error(err: ConfigError) -> anyhow::Error {
    let code = err.code();
    eprintln!("{:?}", miette::Report::new(err));
    anyhow!("configuration rejected ({code})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_name_comes_from_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("billing-service");
        std::fs::create_dir(&dir).unwrap();
        let project = project_ref(&dir);
        assert_eq!(project.name, "billing-service");
        assert_eq!(project.root, dir);
    }

    #[test]
    fn missing_directory_falls_back_to_generic_name() {
        let project = project_ref(Path::new("/nonexistent/dir"));
        assert_eq!(project.name, "project");
    }
}
