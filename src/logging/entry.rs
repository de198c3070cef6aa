// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log entry: one emitted, filter-passing event

use super::level::Level;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum length of an entry's text, in bytes
pub const TEXT_MAX: usize = 2048;

/// Timestamp layout used on rendered lines (`2024-03-01 12:00:00.123 +0100`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %z";

/// A recorded log event, owned by the history buffer
#[derive(Debug, Clone)]
pub struct Entry {
    module: Arc<str>,
    level: Level,
    file: Option<String>,
    line: Option<u32>,
    time: DateTime<Local>,
    text: String,
}

impl Entry {
    /// Create a new entry, truncating `text` to `TEXT_MAX` bytes
    pub fn new(
        module: Arc<str>,
        level: Level,
        file: Option<&str>,
        line: Option<u32>,
        time: DateTime<Local>,
        mut text: String,
    ) -> Self {
        truncate_text(&mut text, TEXT_MAX);
        Self {
            module,
            level,
            file: file.map(str::to_string),
            // A line number means nothing without its file
            line: file.and(line),
            time,
            text,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn time(&self) -> DateTime<Local> {
        self.time
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Render the output line for a sink
    ///
    /// Format: `[<timestamp> ]<module> (<level>) <text>[ (<file>:<line>)]\n`
    pub fn render(&self, timestamp: bool, call_site: bool) -> String {
        let mut out = String::with_capacity(self.text.len() + self.module.len() + 64);
        if timestamp {
            out.push_str(&self.time.format(TIMESTAMP_FORMAT).to_string());
            out.push(' ');
        }
        out.push_str(&self.module);
        out.push_str(" (");
        out.push_str(self.level.name());
        out.push_str(") ");
        out.push_str(&self.text);
        if call_site {
            if let Some(file) = &self.file {
                out.push_str(&format!(" ({}:{})", file, self.line.unwrap_or(0)));
            }
        }
        out.push('\n');
        out
    }

    /// Convert to the record returned by recent-entry queries
    pub fn to_record(&self) -> RecentEntry {
        RecentEntry {
            module: self.module.to_string(),
            level: Some(self.level.name().to_string()),
            text: self.text.clone(),
            file: self.file.clone(),
            line: self.line,
            timestamp: self.time.timestamp(),
        }
    }
}

/// Snapshot of one history entry as exposed to management clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub module: String,
    pub level: Option<String>,
    pub text: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
}

/// Truncate to at most `max` bytes without splitting a UTF-8 sequence
pub fn truncate_text(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
