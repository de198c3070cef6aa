// SPDX-License-Identifier: Apache-2.0 OR MIT
// Error types for level resolution, sink opening and source updates

use thiserror::Error;

use super::level::valid_level_names;

/// Errors raised while resolving levels or sinks
#[derive(Error, Debug)]
pub enum LogError {
    #[error("'{name}' is not a valid log level. Should be one of {{{valid}}}.")]
    UnknownLevel { name: String, valid: String },

    #[error("'{0}' is not a valid log level bit.")]
    UnknownLevelBit(u32),

    #[error("Failed to open log file '{name}': {source}")]
    SinkOpen {
        name: String,
        source: std::io::Error,
    },
}

impl LogError {
    pub(crate) fn unknown_level(name: &str) -> Self {
        LogError::UnknownLevel {
            name: name.to_string(),
            valid: valid_level_names(),
        }
    }
}

/// Field of a source update that can be rejected
///
/// Timestamp and call-site display are plain booleans and always apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateField {
    Output,
    Enable,
}

impl UpdateField {
    pub const fn as_str(self) -> &'static str {
        match self {
            UpdateField::Output => "output",
            UpdateField::Enable => "enable",
        }
    }
}

impl std::fmt::Display for UpdateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected field of a source update
///
/// Fields applied before `field` stay applied.
#[derive(Error, Debug)]
#[error("log source '{module}': invalid {field} '{value}': {cause}")]
pub struct UpdateError {
    pub module: String,
    pub field: UpdateField,
    pub value: String,
    #[source]
    pub cause: LogError,
}
