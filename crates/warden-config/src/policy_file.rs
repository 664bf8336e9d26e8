//! Policy set files.
//!
//! A policy file holds a list of policies under the `policy` key, either as
//! TOML `[[policy]]` tables or as a JSON object `{"policy": [...]}`. The
//! format is chosen by file extension.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_abac::Policy;

use crate::ConfigError;

/// On-disk shape of a policy file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyFile {
    #[serde(default)]
    pub policy: Vec<Policy>,
}

/// Reads the policies in `path`.
pub fn load_policy_file(path: impl AsRef<Path>) -> Result<Vec<Policy>, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    let file: PolicyFile = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?,
        Some("json") => {
            serde_json::from_str(&contents).map_err(|source| ConfigError::JsonError {
                path: path.to_path_buf(),
                source,
            })?
        }
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };

    debug!(path = %path.display(), count = file.policy.len(), "Loaded policy file");
    Ok(file.policy)
}

/// Lists `.toml` and `.json` files directly inside `dir`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn discover_policy_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ConfigError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let read_error = |source| ConfigError::ReadError {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let is_policy = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "toml" | "json"));
        if path.is_file() && is_policy {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
