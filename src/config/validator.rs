use crate::config::{Config, SourceKind, SCHEMA_VERSION};
use crate::error::{Result, TailstatError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_source(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TailstatError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_source(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when the file is opened; a missing file is a
        // runtime SourceUnavailable, not a config error
        if config.source.kind == SourceKind::File {
            match &config.source.path {
                None => errors.push(ValidationError::new(
                    "source.path",
                    "A path is required when source.kind = \"file\"",
                )),
                Some(path) if path.as_os_str().is_empty() => errors.push(ValidationError::new(
                    "source.path",
                    "Source path cannot be empty",
                )),
                Some(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_file_source_without_path() {
        let mut config = Config::default();
        config.source.kind = SourceKind::File;
        assert!(ConfigValidator::validate(&config).is_err());

        config.source.path = Some(PathBuf::new());
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.meta.schema_version = "0.9".to_string();
        config.source.kind = SourceKind::File;

        match ConfigValidator::validate(&config) {
            Err(TailstatError::ConfigValidation { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }
}
