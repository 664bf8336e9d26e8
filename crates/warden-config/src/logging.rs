//! Logging initialisation.
//!
//! Installs a global `tracing` subscriber. `RUST_LOG`, when set, overrides
//! the configured level.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `warn,warden_abac=debug`.
    pub level: String,
    pub format: LogFormat,
    /// Include the event target (module path) in each line.
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            with_target: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Installs the global subscriber described by `config`.
///
/// Fails if the filter is invalid or a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_filter(&config.level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| ConfigError::LoggingError(e.to_string()))
}

/// Builds the filter from `RUST_LOG` if set, else from `configured`.
pub fn build_filter(configured: &str) -> Result<EnvFilter, ConfigError> {
    let directive = effective_directive(configured, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    EnvFilter::try_new(&directive)
        .map_err(|e| ConfigError::ValidationError(format!("invalid log filter '{directive}': {e}")))
}

fn effective_directive(configured: &str, from_env: Option<String>) -> String {
    match from_env {
        Some(env) if !env.trim().is_empty() => env,
        _ => configured.to_string(),
    }
}
