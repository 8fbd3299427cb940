//! Connection Configuration
//!
//! Credentials and server address for the store gateway.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::errors::{StoreError, StoreResult};

/// Store connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Bucket user, or the administrator for multi-bucket access
    pub username: String,

    pub password: String,

    /// Server host (default: "localhost")
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 8091)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8091
}

impl ConnectionConfig {
    /// Credentials against the default host and port.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            host: default_host(),
            port: default_port(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn from_json_str(content: &str) -> StoreResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        if config.host.is_empty() {
            return Err(StoreError::InvalidConfig("host must not be empty".into()));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
