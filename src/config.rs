// src/config.rs
//! Client configuration
//!
//! Loaded from JSON; every field has a default so partial files are accepted.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error_handling::{OriError, OriResult};

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Compare the local commitment with the ledger before every state-changing submission
    pub check_sync: bool,

    /// Lock the suspect before submitting a fraud proof
    pub lock_before_proving: bool,

    /// `env_logger` filter, e.g. `"info"` or `"oprollups=debug"`
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            check_sync: true,
            lock_before_proving: true,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document
    pub fn from_json(json: &str) -> OriResult<Self> {
        serde_json::from_str(json).map_err(|e| OriError::Configuration(e.to_string()))
    }

    /// Read a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> OriResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| OriError::Configuration(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Install the global logger; returns false if one was already installed
    pub fn init_logging(&self) -> bool {
        env_logger::Builder::new()
            .parse_filters(&self.log_level)
            .try_init()
            .is_ok()
    }
}
