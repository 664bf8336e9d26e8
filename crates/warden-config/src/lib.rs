//! Configuration management for Warden
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (WARDEN_* prefix, `__` between keys)
//! 2. warden.local.toml (gitignored, local overrides)
//! 3. warden.toml (git-tracked, project config)
//! 4. ~/.config/warden/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! Policies themselves live in separate policy files (see [`policy_file`])
//! listed under `[policies]`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use warden_abac::{DataLoader, EngineOptions, Policy, PolicyEngine, RequirementCheck};

mod error;
mod loader;
pub mod logging;
mod paths;
pub mod policy_file;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use logging::{LogFormat, LoggingConfig};
pub use paths::Paths;

/// Main Warden configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub engine: EngineConfig,
    pub policies: PoliciesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log every decision (grant at info, deny at warn).
    pub audit_enabled: bool,
    /// `off`, `warn` or `reject` for policies whose guard reads undeclared
    /// tables.
    pub requirement_check: RequirementCheck,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            requirement_check: RequirementCheck::Warn,
        }
    }
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        EngineOptions {
            audit_enabled: config.audit_enabled,
            requirement_check: config.requirement_check,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoliciesConfig {
    /// Directory scanned for `.toml`/`.json` policy files.
    pub directory: PathBuf,
    /// Additional policy files, loaded after the directory.
    pub files: Vec<PathBuf>,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("policies"),
            files: Vec::new(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Create a development configuration: verbose, strict about policy
    /// declarations
    pub fn development() -> Self {
        Self {
            engine: EngineConfig {
                audit_enabled: true,
                requirement_check: RequirementCheck::Reject,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create a production configuration
    pub fn production() -> Self {
        Self {
            logging: LoggingConfig {
                format: LogFormat::Json,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.policies.directory.is_relative() {
            self.policies.directory = base.join(&self.policies.directory);
        }

        for file in &mut self.policies.files {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }

    /// Engine options described by the `[engine]` section
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::from(&self.engine)
    }

    /// Read every configured policy file, directory first, in name order
    pub fn load_policies(&self) -> Result<Vec<Policy>> {
        let mut files = policy_file::discover_policy_files(&self.policies.directory)
            .context("Failed to scan policy directory")?;
        files.extend(self.policies.files.iter().cloned());

        let mut policies = Vec::new();
        for file in &files {
            let loaded = policy_file::load_policy_file(file)
                .with_context(|| format!("Failed to load policies from {}", file.display()))?;
            policies.extend(loaded);
        }
        Ok(policies)
    }

    /// Assemble an engine around `loader` with the configured options and
    /// policies
    pub fn build_engine<L: DataLoader>(&self, loader: L) -> Result<PolicyEngine<L>> {
        let policies = self.load_policies()?;
        let count = policies.len();

        let engine = PolicyEngine::new(loader).with_options(self.engine_options());
        engine
            .add_policies(policies)
            .context("Failed to register configured policies")?;

        info!(policies = count, "Policy engine ready");
        Ok(engine)
    }
}
