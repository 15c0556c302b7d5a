//! Companion configuration, loaded from `talekeeper.toml`.
//!
//! Every field has a default so a missing file is not an error; a present
//! but malformed file is. The backend URL can be overridden with the
//! `TALEKEEPER_BACKEND_URL` environment variable, which wins over the file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::CompanionError;
use crate::gateway::GatewayConfig;

/// Default config file path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "talekeeper.toml";

/// Environment variable that overrides the configured backend URL.
pub const BACKEND_URL_ENV: &str = "TALEKEEPER_BACKEND_URL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Base URL of the session backend.
    pub backend_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Top-level folder name inside the export archive.
    pub export_folder: String,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        CompanionConfig {
            backend_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout_secs: 3,
            request_timeout_secs: 60,
            export_folder: "story-archive".to_string(),
        }
    }
}

impl CompanionConfig {
    /// Load from `path`, falling back to defaults when the file is absent,
    /// then apply the environment override.
    pub fn load(path: &Path) -> Result<Self, CompanionError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            CompanionConfig::default()
        };
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend_url = url;
            }
        }
        Ok(config)
    }

    /// Project onto the gateway's connection settings.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.backend_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
