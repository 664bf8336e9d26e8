//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML policy file at {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse JSON policy file at {path}: {source}")]
    JsonError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Unsupported policy file format at {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Logging setup failed: {0}")]
    LoggingError(String),

    #[error("XDG directory error: {0}")]
    XdgError(String),
}
