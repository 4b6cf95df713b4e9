//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    let config: GateConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let config = parse_config(
            r#"
            [upstream]
            address = "10.0.0.5:4000"

            [identity_store]
            remote_url = "http://identity.internal/v1"
            deadline_ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.address, "10.0.0.5:4000");
        assert_eq!(config.identity_store.deadline_ms, 1500);
    }

    #[test]
    fn test_validation_error_display() {
        let err = parse_config("[rate_limit]\nburst_size = 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: rate_limit.burst_size: must be at least 1"
        );
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[rate_limit\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = parse_config(include_str!("../../config/gate.toml")).unwrap();
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].permission.as_deref(), Some("movies:read"));
    }
}
