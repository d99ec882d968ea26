//! Error types for wikisnap-core

use thiserror::Error;

/// Result type alias using wikisnap-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for wikisnap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid construction input (bad options, out-of-range values)
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// External tool exited with an unexpected status or could not be spawned
    #[error("{program} failed ({status}): {stderr}")]
    Process {
        program: String,
        status: String,
        stderr: String,
    },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Invalid glob pattern
    #[error("Invalid pattern: {0}")]
    Glob(#[from] globset::Error),

    /// Directory walk error
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a process error from a program name, exit status and captured stderr
    pub fn process(
        program: impl Into<String>,
        status: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Process {
            program: program.into(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns true for errors raised while validating construction input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::MissingField { .. })
    }
}
