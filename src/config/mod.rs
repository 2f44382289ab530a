//! Configuration management for Tailstat
//!
//! Loads the TOML config file, applies `TAILSTAT_*` environment overrides and
//! validates the result. Window thresholds, tick period and queue capacity are
//! constants, not configuration.

use crate::error::{Result, TailstatError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Schema version written by `config init` and accepted by the validator
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Kind of log source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Stdin,
    File,
}

/// Log source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// File to follow, required when `kind = "file"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Display configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Include the queue-depth diagnostic in each snapshot
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TailstatError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| TailstatError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| TailstatError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Point the source at a file to follow
    pub fn follow_file(&mut self, path: PathBuf) {
        self.source.kind = SourceKind::File;
        self.source.path = Some(path);
    }

    /// Apply environment variable overrides
    /// Environment variables in format: TAILSTAT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `TAILSTAT_*` overrides from an explicit set of variables
    pub fn apply_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("TAILSTAT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "SOURCE__KIND" => {
                self.source.kind = match value.to_ascii_lowercase().as_str() {
                    "stdin" => SourceKind::Stdin,
                    "file" => SourceKind::File,
                    _ => {
                        return Err(TailstatError::InvalidConfigValue {
                            path: path.to_string(),
                            message: format!("Expected 'stdin' or 'file', got '{}'", value),
                        })
                    }
                };
            }
            "SOURCE__PATH" => {
                self.source.path = Some(PathBuf::from(value));
            }
            "DISPLAY__DEBUG" => {
                self.display.debug =
                    value.parse().map_err(|_| TailstatError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as boolean", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            TailstatError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("tailstat").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
            },
            source: SourceConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.follow_file(PathBuf::from("/var/log/app.log"));
        config.display.debug = true;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.source.kind, SourceKind::File);
        assert_eq!(loaded.source.path, Some(PathBuf::from("/var/log/app.log")));
        assert!(loaded.display.debug);
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[_meta]\nschema_version = \"1.0.0\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.source.kind, SourceKind::Stdin);
        assert!(!config.display.debug);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/tailstat.toml"));
        assert!(matches!(result, Err(TailstatError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("TAILSTAT_SOURCE__KIND", "file"),
            ("TAILSTAT_SOURCE__PATH", "/tmp/x.log"),
            ("TAILSTAT_DISPLAY__DEBUG", "true"),
            ("HOME", "/root"),
        ]));

        assert_eq!(config.source.kind, SourceKind::File);
        assert_eq!(config.source.path, Some(PathBuf::from("/tmp/x.log")));
        assert!(config.display.debug);
    }

    #[test]
    fn test_bad_env_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("TAILSTAT_DISPLAY__DEBUG", "maybe"),
            ("TAILSTAT_SOURCE__KIND", "socket"),
        ]));
        assert!(!config.display.debug);
        assert_eq!(config.source.kind, SourceKind::Stdin);
    }
}
