// SPDX-License-Identifier: Apache-2.0 OR MIT
// Severity levels, bit masks and the enable-spec parser

use super::error::LogError;
use serde::{Deserialize, Serialize};

/// Union of level bits, used as a "set of enabled levels"
pub type LevelMask = u32;

/// Log severity levels, each identified by a distinct power-of-two bit
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Matches nothing; emitting at this level is a no-op
    None = 0,
    /// Finest-grained tracing (no syslog equivalent, mapped to LOG_DEBUG)
    Trace = 1,
    /// Debug-level messages
    Debug = 2,
    /// Informational
    Info = 4,
    /// Significant normal condition
    Notice = 8,
    /// Warning conditions
    Warning = 16,
    /// Error conditions
    Error = 32,
    /// Critical conditions
    Critical = 64,
}

/// Every level bit OR-ed together
pub const ALL_LEVELS: LevelMask = Level::Critical.bit() | (Level::Critical.bit() - 1);

/// Number of histogram buckets (TRACE..CRITICAL)
pub const HISTOGRAM_BUCKETS: usize = 7;

/// Levels that own a histogram bucket, in bucket order
pub const HISTOGRAM_LEVELS: [Level; HISTOGRAM_BUCKETS] = [
    Level::Trace,
    Level::Debug,
    Level::Info,
    Level::Notice,
    Level::Warning,
    Level::Error,
    Level::Critical,
];

/// Separators accepted between enable-spec tokens
const SEPARATORS: &[char] = &[',', ' ', ';', ':'];

/// Static description of one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelDescriptor {
    pub level: Level,
    pub name: &'static str,
    pub bit: LevelMask,
    /// This level and everything more severe
    pub mask: LevelMask,
    /// Priority handed to syslog(3); `None` for the NONE level
    pub syslog_priority: Option<libc::c_int>,
}

const fn descriptor(
    level: Level,
    name: &'static str,
    syslog_priority: libc::c_int,
) -> LevelDescriptor {
    let bit = level as LevelMask;
    LevelDescriptor {
        level,
        name,
        bit,
        mask: ALL_LEVELS & !(bit - 1),
        syslog_priority: Some(syslog_priority),
    }
}

static LEVELS: [LevelDescriptor; 8] = [
    LevelDescriptor {
        level: Level::None,
        name: "none",
        bit: 0,
        mask: 0,
        syslog_priority: None,
    },
    descriptor(Level::Trace, "trace", libc::LOG_DEBUG),
    descriptor(Level::Debug, "debug", libc::LOG_DEBUG),
    descriptor(Level::Info, "info", libc::LOG_INFO),
    descriptor(Level::Notice, "notice", libc::LOG_NOTICE),
    descriptor(Level::Warning, "warning", libc::LOG_WARNING),
    descriptor(Level::Error, "error", libc::LOG_ERR),
    descriptor(Level::Critical, "critical", libc::LOG_CRIT),
];

/// The full level table, least to most severe
pub fn descriptors() -> &'static [LevelDescriptor] {
    &LEVELS
}

/// Valid level names in table order
pub fn level_names() -> Vec<&'static str> {
    LEVELS.iter().map(|d| d.name).collect()
}

/// Valid level names joined for error messages
pub fn valid_level_names() -> String {
    level_names().join(", ")
}

impl Level {
    /// Get the level's bit flag
    #[inline]
    pub const fn bit(self) -> LevelMask {
        self as LevelMask
    }

    /// Get the "at-or-above" mask: this level's bit plus every more severe bit
    #[inline]
    pub const fn at_or_above(self) -> LevelMask {
        match self {
            Level::None => 0,
            _ => ALL_LEVELS & !(self.bit() - 1),
        }
    }

    /// Get level name as static string
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn descriptor(self) -> &'static LevelDescriptor {
        // Table is indexed by bit position, NONE first
        let index = match self {
            Level::None => 0,
            _ => self.bit().trailing_zeros() as usize + 1,
        };
        &LEVELS[index]
    }

    pub fn syslog_priority(self) -> Option<libc::c_int> {
        self.descriptor().syslog_priority
    }

    /// Histogram bucket for this level, `None` for the NONE level
    pub fn histogram_index(self) -> Option<usize> {
        match self {
            Level::None => None,
            _ => Some(self.bit().trailing_zeros() as usize),
        }
    }

    /// Resolve a single bit flag to its level
    pub fn from_bit(bit: LevelMask) -> Result<Self, LogError> {
        LEVELS
            .iter()
            .find(|d| d.bit == bit)
            .map(|d| d.level)
            .ok_or(LogError::UnknownLevelBit(bit))
    }

    /// Resolve a level name, case-insensitively
    ///
    /// A non-empty prefix of a level name is accepted ("inf" resolves to INFO);
    /// the first match in table order wins.
    pub fn from_name(name: &str) -> Result<Self, LogError> {
        lookup_prefix(name)
            .map(|d| d.level)
            .ok_or_else(|| LogError::unknown_level(name))
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::from_name(s)
    }
}

fn lookup_prefix(name: &str) -> Option<&'static LevelDescriptor> {
    let wanted = name.as_bytes();
    if wanted.is_empty() {
        return None;
    }
    LEVELS.iter().find(|d| {
        let candidate = d.name.as_bytes();
        candidate.len() >= wanted.len() && candidate[..wanted.len()].eq_ignore_ascii_case(wanted)
    })
}

/// One token of an enable spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableToken {
    /// `info` - just this level
    Exact(Level),
    /// `info+` - this level and everything more severe
    AtOrAbove(Level),
}

impl EnableToken {
    pub fn mask(self) -> LevelMask {
        match self {
            EnableToken::Exact(level) => level.bit(),
            EnableToken::AtOrAbove(level) => level.at_or_above(),
        }
    }
}

/// Tokenize an enable spec such as `"debug, warning+"`
///
/// Fails on the first token that does not name a level.
pub fn parse_enable(spec: &str) -> Result<Vec<EnableToken>, LogError> {
    spec.split(SEPARATORS)
        .filter(|token| !token.is_empty())
        .map(|token| {
            let (name, plus) = match token.strip_suffix('+') {
                Some(name) => (name, true),
                None => (token, false),
            };
            let level = lookup_prefix(name)
                .map(|d| d.level)
                .ok_or_else(|| LogError::unknown_level(token))?;
            Ok(if plus {
                EnableToken::AtOrAbove(level)
            } else {
                EnableToken::Exact(level)
            })
        })
        .collect()
}

/// Compute the mask for an enable spec (OR of every token's contribution)
pub fn enable_mask(spec: &str) -> Result<LevelMask, LogError> {
    Ok(parse_enable(spec)?
        .into_iter()
        .fold(0, |mask, token| mask | token.mask()))
}
