//! Errors raised while finding, reading, writing or applying configuration.

use std::path::PathBuf;
use thiserror::Error;

use crate::port::PortError;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to write configuration file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A section's line settings would be refused when opening a port
    #[error("Invalid port settings in [{section}]: {source}")]
    InvalidSettings {
        section: &'static str,
        #[source]
        source: PortError,
    },

    /// An override variable holds a value that does not parse
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl ConfigError {
    pub fn invalid_settings(section: &'static str, source: PortError) -> Self {
        Self::InvalidSettings { section, source }
    }

    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }

    /// The port error behind an [`InvalidSettings`](Self::InvalidSettings).
    pub fn port_error(&self) -> Option<&PortError> {
        match self {
            Self::InvalidSettings { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_invalid_settings_keeps_port_error() {
        let err = ConfigError::invalid_settings(
            "serial",
            PortError::InvalidParameter("baud rate must be non-zero".to_string()),
        );
        assert!(err.to_string().starts_with("Invalid port settings in [serial]"));
        assert!(matches!(err.port_error(), Some(PortError::InvalidParameter(_))));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_env_parse_display() {
        let err = ConfigError::env_parse("TEST_BAUD", "Invalid baud rate");
        assert!(err.to_string().contains("TEST_BAUD"));
        assert!(err.port_error().is_none());
    }
}
