//! Reading configuration documents from disk.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::preset::Preset;
use super::schema::Configuration;
use super::ConfigError;

/// Document format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Picks the format from the file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Some(Self::Toml),
            _ => None,
        }
    }

    fn parse<T: DeserializeOwned>(self, content: &str, origin: &str) -> Result<T, ConfigError> {
        let parsed = match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            origin: origin.to_string(),
            message,
        })
    }
}

/// Loads configuration and preset documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist, and
    /// `INVALID_CONFIG` errors for unreadable, unparsable or invalid documents.
    pub fn load(path: &Path) -> Result<Configuration, ConfigError> {
        let config: Configuration = Self::read(path)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates a configuration from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or is invalid.
    pub fn parse_str(content: &str, format: ConfigFormat) -> Result<Configuration, ConfigError> {
        let config: Configuration = format.parse(content, "<string>")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a preset document (`{name, description?, config}`).
    ///
    /// # Errors
    ///
    /// Same as [`ConfigLoader::load`].
    pub fn load_preset(path: &Path) -> Result<Preset, ConfigError> {
        Self::read(path)
    }

    fn read<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        format.parse(&content, &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleSpec;
    use crate::ErrorCode;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn loads_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archgate.toml");
        fs::write(
            &path,
            r#"
version = "1.0"
extends = ["@c3/recommended"]

[rules]
no-dead-code = "off"

[[whitelist]]
rule = "no-circular-dependencies"
path = "src/legacy/**"
reason = "pending rewrite"
"#,
        )
        .unwrap();

        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.extends, vec!["@c3/recommended"]);
        assert_eq!(config.rules.get("no-dead-code"), Some(&RuleSpec::level("off")));
        assert_eq!(config.whitelist[0].reason.as_deref(), Some("pending rewrite"));
    }

    #[test]
    fn loads_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archgate.json");
        fs::write(
            &path,
            r#"{"version":"1","rules":{"consistent-naming":["warn",{"style":"snake-case"}]}}"#,
        )
        .unwrap();
        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let dir = TempDir::new().unwrap();
        let err = ConfigLoader::load(&dir.path().join("archgate.toml")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigNotFound);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archgate.yaml");
        fs::write(&path, "version: 1").unwrap();
        let err = ConfigLoader::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn parse_error_is_invalid_config() {
        let err = ConfigLoader::parse_str("version = ", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn schema_issues_fail_loading() {
        let err = ConfigLoader::parse_str(r#"{"version":""}"#, ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn loads_preset_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("team.toml");
        fs::write(
            &path,
            r#"
name = "@team/base"
description = "team defaults"

[config]
extends = ["@c3/minimal"]

[config.rules]
no-dead-code = "warn"
"#,
        )
        .unwrap();
        let preset = ConfigLoader::load_preset(&path).unwrap();
        assert_eq!(preset.name, "@team/base");
        assert_eq!(preset.config.extends, vec!["@c3/minimal"]);
    }
}
