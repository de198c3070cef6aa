// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Configuration file types and parsing for logd.
//!
//! JSON5 configuration format supporting:
//! - History capacity and the sink write-failure policy
//! - Per-source settings, applied in file order
//! - Comments and trailing commas

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::logging::{
    enable_mask, LoggingContext, LoggingSettings, SourceUpdate, WriteFailurePolicy,
    HISTORY_CAPACITY,
};

/// Startup configuration (JSON5 file format)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    /// Number of recent entries kept in memory (default 1000)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_capacity: Option<usize>,

    /// What to do when a sink write fails
    #[serde(default)]
    pub write_failure: WriteFailurePolicy,

    /// Source settings; DEFAULT may appear like any other module
    #[serde(default)]
    pub log: Vec<SourceUpdate>,
}

impl Config {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to JSON5 string (with pretty formatting)
    pub fn to_json5(&self) -> String {
        // JSON is valid JSON5; json5 has no pretty printer
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5();
        std::fs::write(path, content)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))
    }

    /// Validate the configuration
    ///
    /// Sink outputs are not opened here; `apply` reports those failures.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == Some(0) {
            return Err(ConfigError::InvalidHistoryCapacity);
        }

        let mut seen_modules: HashMap<String, usize> = HashMap::new();
        for (idx, update) in self.log.iter().enumerate() {
            let module = update.module.trim();
            if module.is_empty() {
                return Err(ConfigError::EmptyModule { index: idx });
            }
            if let Some(prev_idx) = seen_modules.insert(module.to_ascii_lowercase(), idx) {
                return Err(ConfigError::DuplicateModule {
                    module: update.module.clone(),
                    entry_indices: (prev_idx, idx),
                });
            }

            if let Some(enable) = &update.enable {
                if !enable.trim().eq_ignore_ascii_case("default") {
                    enable_mask(enable).map_err(|e| ConfigError::InvalidEnable {
                        module: update.module.clone(),
                        value: enable.clone(),
                        reason: e.to_string(),
                    })?;
                }
            }
        }

        Ok(())
    }

    /// Context settings derived from this configuration
    pub fn settings(&self) -> LoggingSettings {
        LoggingSettings {
            history_capacity: self.history_capacity.unwrap_or(HISTORY_CAPACITY),
            write_failure: self.write_failure,
        }
    }

    /// Apply every source entry to `context`, stopping at the first failure
    pub fn apply(&self, context: &LoggingContext) -> Result<usize, ConfigError> {
        for update in &self.log {
            context
                .apply_update(update)
                .map_err(|e| ConfigError::UpdateFailed(e.to_string()))?;
        }
        Ok(self.log.len())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    IoError(std::path::PathBuf, String),
    ParseError(String),
    InvalidHistoryCapacity,
    EmptyModule {
        index: usize,
    },
    DuplicateModule {
        module: String,
        entry_indices: (usize, usize),
    },
    InvalidEnable {
        module: String,
        value: String,
        reason: String,
    },
    UpdateFailed(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, msg) => {
                write!(
                    f,
                    "failed to read config file '{}': {}",
                    path.display(),
                    msg
                )
            }
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::InvalidHistoryCapacity => {
                write!(f, "history_capacity must be greater than zero")
            }
            ConfigError::EmptyModule { index } => {
                write!(f, "log entry {} has an empty module name", index)
            }
            ConfigError::DuplicateModule {
                module,
                entry_indices,
            } => write!(
                f,
                "duplicate log entry for module '{}' (entries {} and {})",
                module, entry_indices.0, entry_indices.1
            ),
            ConfigError::InvalidEnable {
                module,
                value,
                reason,
            } => write!(
                f,
                "invalid enable '{}' for module '{}': {}",
                value, module, reason
            ),
            ConfigError::UpdateFailed(msg) => write!(f, "failed to apply config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
