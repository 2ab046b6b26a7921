//! Server configuration
//!
//! The relay takes a single startup parameter, the TCP port, read from an
//! optional JSON file.

use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Port used when no config file is given or it omits `port`
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl ServerConfig {
    /// Parse a config from JSON text
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}
