// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::connector::SPP_UUID;
use crate::session::{SessionOptions, DEFAULT_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE};

const APP_DIR: &str = "sppchat";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Stream session settings.
    pub session: SessionConfig,

    /// Chat display settings.
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Service class UUID to connect to.
    pub service_uuid: Uuid,

    /// Fixed RFCOMM channel. When unset the channel is resolved from the
    /// remote service record.
    pub rfcomm_channel: Option<u8>,

    /// How long `scan` listens for devices.
    pub discovery_secs: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            service_uuid: SPP_UUID,
            rfcomm_channel: None,
            discovery_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bytes requested per read.
    pub read_buffer_size: usize,

    /// Upper bound on a connection attempt. No bound when unset.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            connect_timeout_secs: Some(30),
        }
    }
}

impl SessionConfig {
    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            read_buffer_size: self.read_buffer_size,
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Prefix for lines we sent.
    pub local_label: String,

    /// Prefix for lines the peer sent.
    pub remote_label: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            local_label: "You".to_string(),
            remote_label: "Friend".to_string(),
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default location or create it.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_READ_BUFFER_SIZE).contains(&self.session.read_buffer_size) {
            return Err(ConfigError::Invalid {
                field: "session.read_buffer_size",
                reason: format!("must be between 1 and {}", MAX_READ_BUFFER_SIZE),
            });
        }
        if self.session.connect_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "session.connect_timeout_secs",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        if let Some(channel) = self.bluetooth.rfcomm_channel {
            if !(1..=30).contains(&channel) {
                return Err(ConfigError::Invalid {
                    field: "bluetooth.rfcomm_channel",
                    reason: format!("{} is outside 1..=30", channel),
                });
            }
        }
        Ok(())
    }
}
