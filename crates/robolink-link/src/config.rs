//! YAML link configuration.
//!
//! ```yaml
//! device: sphero-7
//! protocol: sphero2
//! queue:
//!   auto_start: true
//! reader:
//!   headers: ["ff ff", "ff fe"]
//!   minimum_size: 7
//!   max_pending: 512
//! ```

use std::path::Path;

use robolink_metrics::LinkLabels;
use robolink_stack::QueueConfig;
use robolink_stream::ReaderConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for one [`crate::DeviceLink`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Device name used in logs and metric labels.
    pub device: String,
    /// Protocol family used in logs and metric labels.
    pub protocol: String,
    pub queue: QueueConfig,
    pub reader: ReaderConfig,
}

impl LinkConfig {
    /// Parses a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text)?;
        log::debug!("loaded link config for '{}' from {}", config.device, path.display());
        Ok(config)
    }

    /// Serializes the configuration to YAML.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Metric labels for this link.
    pub fn labels(&self) -> LinkLabels {
        LinkLabels::new(self.device.as_str(), self.protocol.as_str())
    }
}
