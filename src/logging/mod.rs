// SPDX-License-Identifier: Apache-2.0 OR MIT
// Process-wide logging: named sources, shared sinks and recent-entry history
//
// Layout:
// - level   - severity table, masks and enable-spec parsing
// - sink    - reference-counted output destinations
// - source  - named sources with tri-state settings and histograms
// - history - bounded buffer of recent entries
// - context - the LoggingContext that ties them together

#[macro_use]
mod macros;
mod context;
mod entry;
mod error;
mod history;
mod level;
mod sink;
mod source;

// Public exports
pub use context::{Logger, LoggingContext, LoggingSettings, ShutdownSummary, WriteFailurePolicy};
pub use entry::{truncate_text, Entry, RecentEntry, TEXT_MAX, TIMESTAMP_FORMAT};
pub use error::{LogError, UpdateError, UpdateField};
pub use history::{HistoryBuffer, HISTORY_CAPACITY};
pub use level::{
    descriptors, enable_mask, level_names, parse_enable, valid_level_names, EnableToken, Level,
    LevelDescriptor, LevelMask, ALL_LEVELS, HISTOGRAM_BUCKETS, HISTOGRAM_LEVELS,
};
pub use sink::{Sink, SinkKind, SinkRegistry, SINK_STDERR, SINK_STDOUT, SINK_SYSLOG};
pub use source::{
    histogram_pairs, Histogram, SourceHandle, SourceRegistry, SourceSettings, SourceStats,
    SourceUpdate, LOG_STATS_TYPE, SOURCE_DEFAULT, SOURCE_LOGGING,
};
