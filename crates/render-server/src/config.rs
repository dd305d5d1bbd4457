//! Render server configuration.

use std::path::PathBuf;

use render_observability::{LogFormat, LogLevel};
use serde::{Deserialize, Serialize};

/// Errors loading or applying configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Render server configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderServerConfig {
    /// Service name attached to log entries.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Inline template for the default error body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_error_response: Option<String>,

    /// File holding the template for the default error body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_error_response_path: Option<PathBuf>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_service_name() -> String {
    "render-server".to_string()
}

impl Default for RenderServerConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            default_error_response: None,
            default_error_response_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level (default: info).
    #[serde(default = "default_level")]
    pub level: LogLevel,

    /// Output format (default: json).
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl RenderServerConfig {
    /// Check settings that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid("service_name must not be empty".into()));
        }
        if self.default_error_response.is_some() && self.default_error_response_path.is_some() {
            return Err(ConfigError::Invalid(
                "set only one of default_error_response and default_error_response_path".into(),
            ));
        }
        Ok(())
    }

    /// The default error template, reading it from disk if configured by path.
    pub fn resolve_default_error_response(&self) -> Result<Option<String>, ConfigError> {
        self.validate()?;
        match (&self.default_error_response, &self.default_error_response_path) {
            (Some(inline), _) => Ok(Some(inline.clone())),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                }),
            (None, None) => Ok(None),
        }
    }
}
