// SPDX-License-Identifier: Apache-2.0 OR MIT

use serde::{Deserialize, Serialize};

#[macro_use]
pub mod logging;
pub mod config;
pub mod control;
pub mod management;

pub use config::{Config, ConfigError};
pub use logging::{
    Level, Logger, LoggingContext, RecentEntry, SourceSettings, SourceStats, SourceUpdate,
};

/// Commands accepted on the management interface
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ManagementCommand {
    /// Change a source's output, enable mask, timestamp or call-site flags
    UpdateSource(SourceUpdate),
    ResetSource {
        module: String,
    },
    GetSource {
        module: String,
    },
    /// Recent history entries, oldest first; `limit <= 0` returns everything
    RecentEntries {
        #[serde(default)]
        limit: i64,
    },
    SourceStats {
        module: String,
    },
    ListSourceStats,
    LevelNames,
    /// Emit a line through the pipeline on behalf of an operator
    Log {
        module: String,
        level: Level,
        text: String,
    },
    Ping,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Response {
    Success(String),
    Error(String),
    Source(SourceSettings),
    Entries(Vec<RecentEntry>),
    Stats(SourceStats),
    AllStats(Vec<SourceStats>),
    LevelNames(Vec<String>),
}
