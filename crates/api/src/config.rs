//! Runtime configuration.

use std::path::{Path, PathBuf};
use labman_submission::LifecycleConfig;
use serde::{Deserialize, Serialize};

/// Errors reading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// LabMan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabmanConfig {
    /// Storage path for LabMan data
    pub storage_path: PathBuf,
    /// Submission lifecycle policy
    pub lifecycle: LifecycleConfig,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for LabmanConfig {
    fn default() -> Self {
        Self {
            storage_path: ".labman".into(),
            lifecycle: LifecycleConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl LabmanConfig {
    /// Read a JSON config file; a missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path.as_ref()).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.as_ref().display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
