//! archgate CLI tool.
//!
//! Usage:
//! ```bash
//! archgate check [OPTIONS] [PATH]
//! archgate list-rules
//! archgate list-presets
//! archgate init
//! ```

use anyhow::Result;
use archgate_core::Severity;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Architecture compliance checks over a module dependency graph
#[derive(Parser)]
#[command(name = "archgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a project against its architecture rules
    Check {
        /// Project directory (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Dependency graph JSON file (default: <PATH>/archgate-graph.json)
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Lowest severity that fails the run
        #[arg(long, default_value = "error")]
        fail_on: FailOn,

        /// Stop at the first rule that cannot be evaluated
        #[arg(long)]
        fail_fast: bool,

        /// Number of rule worker threads (default: one per CPU)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Environment name recorded on the session
        #[arg(long, env = "ARCHGATE_ENVIRONMENT", default_value = "local")]
        environment: String,
    },

    /// List available rules and predicates
    ListRules,

    /// List built-in presets
    ListPresets,

    /// Initialize configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Output format for session reports.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-violation compact format.
    Compact,
}

/// Severity threshold for the exit code.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum FailOn {
    /// Fail on errors only.
    #[default]
    Error,
    /// Fail on warnings and errors.
    Warn,
    /// Fail on any violation.
    Info,
}

impl From<FailOn> for Severity {
    fn from(value: FailOn) -> Self {
        match value {
            FailOn::Error => Self::Error,
            FailOn::Warn => Self::Warn,
            FailOn::Info => Self::Info,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check {
            path,
            graph,
            format,
            fail_on,
            fail_fast,
            jobs,
            environment,
        } => {
            let source = config_resolver::resolve(&path, cli.config.as_deref());
            let options = commands::check::CheckOptions {
                graph,
                format,
                fail_on: fail_on.into(),
                fail_fast,
                jobs,
                environment,
            };
            commands::check::run(&path, &source, &options)
        }
        Commands::ListRules => {
            commands::list_rules::run();
            Ok(())
        }
        Commands::ListPresets => {
            commands::list_presets::run();
            Ok(())
        }
        Commands::Init { force } => commands::init::run(force),
    }
}
