use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Tailstat
#[derive(Error, Debug)]
pub enum TailstatError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// The log source could not be opened or followed. Fatal: there is
    /// nothing left to aggregate.
    #[error("Log source unavailable ({source_desc}): {reason}")]
    SourceUnavailable { source_desc: String, reason: String },

    /// Ingestion queue or snapshot hand-off closed underneath us
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Tailstat operations
pub type Result<T> = std::result::Result<T, TailstatError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_context_flows_into_other() {
        let failed: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "no threads left",
        ));
        let err: TailstatError = failed.context("Failed to create tokio runtime").unwrap_err().into();

        assert!(matches!(err, TailstatError::Other(_)));
        assert_eq!(err.to_string(), "Failed to create tokio runtime");
    }
}
