// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client configuration.
//!
//! Supports both programmatic and file-based configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::table::DEFAULT_CAPACITY;

/// Largest pending-table capacity. One token value must always stay free.
pub const MAX_PENDING_LIMIT: usize = 254;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Datapond client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host name or address.
    #[serde(default = "default_server_addr")]
    pub server_addr: String,

    /// Server UDP port.
    #[serde(default = "default_port")]
    pub server_port: u16,

    /// Local UDP port to bind.
    #[serde(default = "default_port")]
    pub local_port: u16,

    /// Account e-mail used by `login`.
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Message id of the first request.
    #[serde(default = "default_message_id")]
    pub initial_message_id: u16,

    /// Maximum number of outstanding transactions.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

fn default_server_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5683
}

fn default_message_id() -> u16 {
    1
}

fn default_max_pending() -> usize {
    DEFAULT_CAPACITY
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            server_port: default_port(),
            local_port: default_port(),
            username: String::new(),
            password: String::new(),
            initial_message_id: default_message_id(),
            max_pending: default_max_pending(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the account used by `login`.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_addr.is_empty() {
            return Err(ConfigError::Invalid("server_addr is empty".into()));
        }
        if self.server_port == 0 {
            return Err(ConfigError::Invalid("server_port must be > 0".into()));
        }
        if self.max_pending == 0 || self.max_pending > MAX_PENDING_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_pending must be in 1..={}, got {}",
                MAX_PENDING_LIMIT, self.max_pending
            )));
        }
        Ok(())
    }
}
