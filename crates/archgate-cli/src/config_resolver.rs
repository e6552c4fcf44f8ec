//! Locating the configuration a command runs against.
//!
//! Lookup order, first hit wins:
//!
//! 1. the `--config` path, taken as given
//! 2. `archgate.toml`, `.archgate.toml`, then `archgate.json` in the project
//! 3. `config.toml` under `$ARCHGATE_CONFIG_DIR`, else under `~/.archgate`
//! 4. a built-in configuration extending `@c3/recommended`
//!
//! Only regular files count as hits.

use archgate_core::config::{ConfigError, ConfigLoader, Configuration};
use std::fmt;
use std::path::{Path, PathBuf};

/// Project-level file names, in lookup order.
const PROJECT_CONFIG_NAMES: &[&str] = &["archgate.toml", ".archgate.toml", "archgate.json"];

/// File name inside the global directory.
const GLOBAL_CONFIG_NAME: &str = "config.toml";

/// Overrides the global directory.
const CONFIG_DIR_ENV: &str = "ARCHGATE_CONFIG_DIR";

/// Schema version written by `init` and used for the default configuration.
pub const CONFIG_VERSION: &str = "1";

/// Where a command's configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Given on the command line; not checked for existence.
    Explicit(PathBuf),
    /// A file in the project directory.
    Project(PathBuf),
    /// A file in the global directory.
    Global(PathBuf),
    /// Nothing found; [`default_configuration`] applies.
    Default,
}

impl ConfigSource {
    /// The file behind this source, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Project(p) | Self::Global(p) => Some(p),
            Self::Default => None,
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Explicit(_) => "explicit",
            Self::Project(_) => "project",
            Self::Global(_) => "global",
            Self::Default => "default",
        }
    }

    /// Reads and validates the configuration. The format follows the file
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is missing, unreadable or invalid.
    pub fn load(&self) -> Result<Configuration, ConfigError> {
        self.path()
            .map_or_else(|| Ok(default_configuration()), ConfigLoader::load)
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "{} config {}", self.kind(), path.display()),
            None => f.write_str("built-in defaults"),
        }
    }
}

/// Configuration used when no file is found.
#[must_use]
pub fn default_configuration() -> Configuration {
    Configuration::new(CONFIG_VERSION).extend(archgate_rules::RECOMMENDED)
}

/// Finds the configuration for `project_dir`.
#[must_use]
pub fn resolve(project_dir: &Path, explicit: Option<&Path>) -> ConfigSource {
    locate(project_dir, explicit, global_config_dir().as_deref())
}

/// The global directory: `$ARCHGATE_CONFIG_DIR` when set and non-empty,
/// otherwise `~/.archgate`.
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    std::env::var_os(CONFIG_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home::home_dir().map(|home| home.join(".archgate")))
}

fn locate(project_dir: &Path, explicit: Option<&Path>, global_dir: Option<&Path>) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    let project = PROJECT_CONFIG_NAMES
        .iter()
        .map(|name| ConfigSource::Project(project_dir.join(name)));
    let global = global_dir.map(|dir| ConfigSource::Global(dir.join(GLOBAL_CONFIG_NAME)));

    let found = project
        .chain(global)
        .find(|source| source.path().is_some_and(Path::is_file))
        .unwrap_or(ConfigSource::Default);
    tracing::debug!(kind = found.kind(), "Located {found}");
    found
}
