//! Run configuration file.

use super::tilt::TiltConfig;
use hobart_attribution::StrategyConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    /// The file could not be read.
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    /// The file is not a valid configuration.
    #[error("Invalid config {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Settings of one attribution run.
///
/// Every field is optional in the file; command-line flags override it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RunConfig {
    /// Strategy selection and execution.
    pub strategy: StrategyConfig,
    /// Built-in optimizer settings.
    pub tilt: TiltConfig,
}

impl RunConfig {
    /// Load a JSON configuration file.
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: display,
            source,
        })
    }
}
