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
//! Handles loading and saving server settings.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bluetooth::{ServiceInfo, ServiceUuid};

/// Directory name under the user config dir.
const APP_DIR: &str = "rfcomm-serial-server";

/// Valid RFCOMM server channels.
pub const CHANNEL_RANGE: std::ops::RangeInclusive<u8> = 1..=30;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Advertised service settings.
    pub service: ServiceConfig,
}

/// Settings of the advertised RFCOMM service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service UUID: 4 or 8 hex digits, or the dashed 128-bit form.
    pub uuid: String,

    /// RFCOMM channel to listen on.
    pub channel: u8,

    /// Service name in the SDP record.
    pub name: String,

    /// Provider name in the SDP record.
    pub provider: String,

    /// Description in the SDP record.
    pub description: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let info = ServiceInfo::default();
        Self {
            // Serial Port Profile
            uuid: "1101".to_string(),
            channel: 1,
            name: info.name,
            provider: info.provider,
            description: info.description,
        }
    }
}

impl ServiceConfig {
    /// Descriptive strings for the service record.
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: self.name.clone(),
            provider: self.provider.clone(),
            description: self.description.clone(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing the defaults there if absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if !CHANNEL_RANGE.contains(&self.service.channel) {
            bail!(
                "RFCOMM channel {} out of range {}..={}",
                self.service.channel,
                CHANNEL_RANGE.start(),
                CHANNEL_RANGE.end()
            );
        }
        ServiceUuid::parse(&self.service.uuid)?;
        Ok(())
    }
}
