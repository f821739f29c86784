//! Kernel configuration
//!
//! Limits that shape the file-descriptor layer. Every field has a default,
//! so a configuration file only needs to name what it changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest transfer limit that still fits the two meld chunks
pub const MIN_TRANSFER: usize = 8;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// File-descriptor layer limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Descriptor slots per process
    pub open_max: usize,
    /// Longest path accepted from user space, terminator included
    pub path_max: usize,
    /// Largest single read or write; bigger requests fail with `NoMemory`
    pub max_transfer: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            open_max: 128,
            path_max: 1024,
            max_transfer: 1024 * 1024,
        }
    }
}

impl KernelConfig {
    /// Parses a JSON configuration and validates it
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: KernelConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the number of descriptor slots per process
    pub fn with_open_max(mut self, open_max: usize) -> Self {
        self.open_max = open_max;
        self
    }

    /// Sets the path length limit
    pub fn with_path_max(mut self, path_max: usize) -> Self {
        self.path_max = path_max;
        self
    }

    /// Sets the single-transfer limit
    pub fn with_max_transfer(mut self, max_transfer: usize) -> Self {
        self.max_transfer = max_transfer;
        self
    }

    /// Checks that every limit is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.open_max == 0 {
            return Err(ConfigError::Invalid {
                field: "open_max",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.path_max < 2 {
            return Err(ConfigError::Invalid {
                field: "path_max",
                reason: "must leave room for one byte and a terminator".to_string(),
            });
        }
        if self.max_transfer < MIN_TRANSFER {
            return Err(ConfigError::Invalid {
                field: "max_transfer",
                reason: format!("must be at least {}", MIN_TRANSFER),
            });
        }
        Ok(())
    }
}
