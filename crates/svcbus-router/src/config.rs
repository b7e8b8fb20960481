// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Router configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! [router]
//! name = "svcbus-router"
//! max_connections = 256
//! max_message_size = 16777216
//! log_level = "info"
//!
//! [connection.tcpip]
//! enabled = true
//! address = "0.0.0.0"
//! port = 8181
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use svcbus::config::{ConnectionSettings, DEFAULT_MAX_MESSAGE_SIZE, MAX_BUFFER_SIZE};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Router configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Router process settings.
    #[serde(default)]
    pub router: RouterSettings,

    /// Listening connections, one section per connection type.
    #[serde(default)]
    pub connection: Connections,
}

/// `[router]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Router name (for identification).
    #[serde(default = "default_router_name")]
    pub name: String,

    /// Maximum number of connected processes.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Largest accepted message payload (bytes).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// `[connection.*]` sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connections {
    #[serde(default)]
    pub tcpip: ConnectionSettings,
}

fn default_router_name() -> String {
    "svcbus-router".to_string()
}

fn default_max_connections() -> usize {
    256
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            name: default_router_name(),
            max_connections: default_max_connections(),
            max_message_size: default_max_message_size(),
            log_level: default_log_level(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Listen on `address:port` with default limits.
    pub fn listen(address: &str, port: u16) -> Self {
        let mut config = Self::default();
        config.connection.tcpip.address = address.to_string();
        config.connection.tcpip.port = port;
        config
    }

    /// Settings of the listening TCP/IP connection.
    pub fn tcpip(&self) -> &ConnectionSettings {
        &self.connection.tcpip
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.name.is_empty() {
            return Err(ConfigError::Invalid("Router name is empty".into()));
        }
        if self.router.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.router.max_message_size == 0 || self.router.max_message_size > MAX_BUFFER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max_message_size must be within 1..={} (got {})",
                MAX_BUFFER_SIZE, self.router.max_message_size
            )));
        }

        let tcpip = &self.connection.tcpip;
        if !tcpip.enabled {
            return Err(ConfigError::Invalid(
                "No connection enabled ([connection.tcpip] enabled = false)".into(),
            ));
        }
        if tcpip.address.is_empty() {
            return Err(ConfigError::Invalid(
                "[connection.tcpip] address is empty".into(),
            ));
        }

        Ok(())
    }
}
