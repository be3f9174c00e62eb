//! Overlay network configuration file.
//!
//! The file is JSON owned by the network provider. Only the fields below are
//! read; anything else in the document is ignored.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

fn default_connect_timeout() -> u64 {
    30
}

/// Parsed overlay network configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    /// Name of the local identity, informational only
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

/// A service advertised to this identity
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    /// Dials are refused unless a bearer token is attached to the context
    #[serde(default)]
    pub require_token: bool,
    /// Target identity -> stream endpoint the overlay routes it to
    #[serde(default)]
    pub terminators: BTreeMap<String, String>,
}

impl OverlayConfig {
    /// Load the configuration from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.name == name)
    }
}
