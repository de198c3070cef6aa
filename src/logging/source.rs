// SPDX-License-Identifier: Apache-2.0 OR MIT
// Named log sources with tri-state settings and per-level event counts

use super::error::{UpdateError, UpdateField};
use super::level::{enable_mask, Level, LevelMask, HISTOGRAM_BUCKETS, HISTOGRAM_LEVELS};
use super::sink::{Sink, SinkRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Reserved name of the source that supplies fallback settings
pub const SOURCE_DEFAULT: &str = "DEFAULT";
/// Source the logging system uses to report on itself
pub const SOURCE_LOGGING: &str = "LOGGING";
/// Prefix of a source statistics identity
pub const LOG_STATS_TYPE: &str = "logStats";

/// Enable value that clears a source's mask back to "inherit from DEFAULT"
///
/// DEFAULT itself goes back to `DEFAULT_MASK`.
const ENABLE_INHERIT: &str = "default";

/// DEFAULT's mask at startup and after a reset: info and above
pub const DEFAULT_MASK: LevelMask = Level::Info.at_or_above();

/// Event counts per level, TRACE..CRITICAL
pub type Histogram = [u64; HISTOGRAM_BUCKETS];

/// Handle to a registered source
///
/// Cheap to clone; carries no settings, only the identity the registry uses
/// to find the source. A handle is only meaningful to the registry that
/// issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceHandle {
    registry: u64,
    id: usize,
    module: Arc<str>,
}

impl SourceHandle {
    /// Module name as first registered
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_ID
    }
}

const DEFAULT_ID: usize = 0;

/// A multi-field update from the management layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUpdate {
    pub module: String,
    /// Sink name: "stdout", "stderr", "syslog" or a file path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Enable spec, e.g. "info+" or "trace,error+"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<bool>,
    /// Call-site (file:line) display
    #[serde(default, rename = "source", skip_serializing_if = "Option::is_none")]
    pub source_display: Option<bool>,
}

impl SourceUpdate {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Default::default()
        }
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn enable(mut self, enable: impl Into<String>) -> Self {
        self.enable = Some(enable.into());
        self
    }

    pub fn timestamp(mut self, timestamp: bool) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn source_display(mut self, source_display: bool) -> Self {
        self.source_display = Some(source_display);
        self
    }
}

/// Tri-state view of a source's own settings (unset fields are `None`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSettings {
    pub module: String,
    pub mask: Option<LevelMask>,
    pub timestamp: Option<bool>,
    #[serde(rename = "source")]
    pub source_display: Option<bool>,
    pub output: Option<String>,
}

/// Per-source event counts as reported to management clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    pub identity: String,
    pub name: String,
    pub trace_count: u64,
    pub debug_count: u64,
    pub info_count: u64,
    pub notice_count: u64,
    pub warning_count: u64,
    pub error_count: u64,
    pub critical_count: u64,
}

impl SourceStats {
    fn new(module: &str, histogram: &Histogram) -> Self {
        Self {
            identity: format!("{}/{}", LOG_STATS_TYPE, module),
            name: module.to_string(),
            trace_count: histogram[0],
            debug_count: histogram[1],
            info_count: histogram[2],
            notice_count: histogram[3],
            warning_count: histogram[4],
            error_count: histogram[5],
            critical_count: histogram[6],
        }
    }

    /// Count for one level (always 0 for NONE)
    pub fn count(&self, level: Level) -> u64 {
        match level {
            Level::None => 0,
            Level::Trace => self.trace_count,
            Level::Debug => self.debug_count,
            Level::Info => self.info_count,
            Level::Notice => self.notice_count,
            Level::Warning => self.warning_count,
            Level::Error => self.error_count,
            Level::Critical => self.critical_count,
        }
    }
}

/// Concrete settings used for one emission
#[derive(Debug, Clone)]
pub(crate) struct EmitPlan {
    pub module: Arc<str>,
    pub timestamp: bool,
    pub call_site: bool,
    pub sink: Option<Arc<Sink>>,
}

struct SourceState {
    module: Arc<str>,
    mask: Option<LevelMask>,
    timestamp: Option<bool>,
    source_display: Option<bool>,
    sink: Option<Arc<Sink>>,
    histogram: Histogram,
}

impl SourceState {
    fn new(module: &str) -> Self {
        Self {
            module: Arc::from(module),
            mask: None,
            timestamp: None,
            source_display: None,
            sink: None,
            histogram: [0; HISTOGRAM_BUCKETS],
        }
    }

    /// Clear settings and counts; hands back the sink reference to release
    fn clear(&mut self) -> Option<Arc<Sink>> {
        self.mask = None;
        self.timestamp = None;
        self.source_display = None;
        self.histogram = [0; HISTOGRAM_BUCKETS];
        self.sink.take()
    }

    fn settings(&self) -> SourceSettings {
        SourceSettings {
            module: self.module.to_string(),
            mask: self.mask,
            timestamp: self.timestamp,
            source_display: self.source_display,
            output: self.sink.as_ref().map(|sink| sink.name().to_string()),
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats::new(&self.module, &self.histogram)
    }
}

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Registry of named sources
///
/// Lookup is case-insensitive. Sources are never removed before shutdown,
/// so handles stay valid for the registry's lifetime. Handles issued by
/// another registry resolve to nothing: they are never counted or emitted.
pub struct SourceRegistry {
    id: u64,
    sources: Vec<SourceState>,
    index: HashMap<String, usize>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    /// Create a registry holding only the (unconfigured) DEFAULT source
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(key(SOURCE_DEFAULT), DEFAULT_ID);
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            sources: vec![SourceState::new(SOURCE_DEFAULT)],
            index,
        }
    }

    /// Look up a source by module name, creating it if needed
    pub fn get_or_create(&mut self, module: &str) -> SourceHandle {
        let id = self.id_for(module);
        self.handle(id)
    }

    fn id_for(&mut self, module: &str) -> usize {
        let k = key(module);
        if let Some(&id) = self.index.get(&k) {
            return id;
        }
        let id = self.sources.len();
        self.sources.push(SourceState::new(module));
        self.index.insert(k, id);
        id
    }

    /// Look up a source without creating it
    pub fn find(&self, module: &str) -> Option<SourceHandle> {
        self.index.get(&key(module)).map(|&id| self.handle(id))
    }

    pub fn default_source(&self) -> SourceHandle {
        self.handle(DEFAULT_ID)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn handle(&self, id: usize) -> SourceHandle {
        SourceHandle {
            registry: self.id,
            id,
            module: Arc::clone(&self.sources[id].module),
        }
    }

    fn state(&self, handle: &SourceHandle) -> Option<&SourceState> {
        if handle.registry != self.id {
            return None;
        }
        self.sources.get(handle.id)
    }

    fn state_mut(&mut self, handle: &SourceHandle) -> Option<&mut SourceState> {
        if handle.registry != self.id {
            return None;
        }
        self.sources.get_mut(handle.id)
    }

    /// Restore a source to unset settings, release its sink and zero its
    /// histogram; identity and registration are kept
    pub fn reset(&mut self, handle: &SourceHandle, sinks: &mut SinkRegistry) {
        if let Some(sink) = self.state_mut(handle).and_then(SourceState::clear) {
            sinks.release(&sink);
        }
    }

    /// Apply an update field by field: output, enable, timestamp, source
    ///
    /// The first failing field aborts the rest; fields before it stay applied.
    pub fn apply_update(
        &mut self,
        update: &SourceUpdate,
        sinks: &mut SinkRegistry,
    ) -> Result<SourceHandle, UpdateError> {
        let handle = self.get_or_create(&update.module);
        let fail = |field, value: &str, cause| UpdateError {
            module: update.module.clone(),
            field,
            value: value.to_string(),
            cause,
        };

        if let Some(output) = &update.output {
            let sink = sinks
                .acquire(output)
                .map_err(|cause| fail(UpdateField::Output, output, cause))?;
            self.set_sink(&handle, sink, sinks);
        }

        if let Some(enable) = &update.enable {
            let mask = if !enable.trim().eq_ignore_ascii_case(ENABLE_INHERIT) {
                Some(enable_mask(enable).map_err(|cause| fail(UpdateField::Enable, enable, cause))?)
            } else if handle.is_default() {
                // DEFAULT has nothing to inherit from
                Some(DEFAULT_MASK)
            } else {
                None
            };
            self.set_mask(&handle, mask);
        }

        if let Some(timestamp) = update.timestamp {
            self.set_timestamp(&handle, Some(timestamp));
        }
        if let Some(source_display) = update.source_display {
            self.set_source_display(&handle, Some(source_display));
        }
        Ok(handle)
    }

    /// Point a source at an already-acquired sink, releasing the previous one
    ///
    /// Syslog adds its own timestamps, so selecting it turns ours off. A
    /// foreign handle releases `sink` straight away.
    pub fn set_sink(&mut self, handle: &SourceHandle, sink: Arc<Sink>, sinks: &mut SinkRegistry) {
        let Some(state) = self.state_mut(handle) else {
            sinks.release(&sink);
            return;
        };
        if sink.is_syslog() {
            state.timestamp = Some(false);
        }
        if let Some(previous) = state.sink.replace(sink) {
            sinks.release(&previous);
        }
    }

    pub fn set_mask(&mut self, handle: &SourceHandle, mask: Option<LevelMask>) {
        if let Some(state) = self.state_mut(handle) {
            state.mask = mask;
        }
    }

    pub fn set_timestamp(&mut self, handle: &SourceHandle, timestamp: Option<bool>) {
        if let Some(state) = self.state_mut(handle) {
            state.timestamp = timestamp;
        }
    }

    pub fn set_source_display(&mut self, handle: &SourceHandle, source_display: Option<bool>) {
        if let Some(state) = self.state_mut(handle) {
            state.source_display = source_display;
        }
    }

    /// Effective mask: the source's own, else DEFAULT's (0 for a foreign handle)
    pub fn effective_mask(&self, handle: &SourceHandle) -> LevelMask {
        self.state(handle).map_or(0, |state| {
            state.mask.or(self.sources[DEFAULT_ID].mask).unwrap_or(0)
        })
    }

    pub fn is_enabled(&self, handle: &SourceHandle, level: Level) -> bool {
        level.bit() & self.effective_mask(handle) != 0
    }

    /// Count the event, then resolve everything an emission needs
    ///
    /// Returns `None` when the level is filtered out or the handle belongs to
    /// another registry.
    pub(crate) fn prepare_emit(&mut self, handle: &SourceHandle, level: Level) -> Option<EmitPlan> {
        let state = self.state_mut(handle)?;
        if let Some(bucket) = level.histogram_index() {
            state.histogram[bucket] += 1;
        }
        if !self.is_enabled(handle, level) {
            return None;
        }
        let state = self.state(handle)?;
        let default = &self.sources[DEFAULT_ID];
        Some(EmitPlan {
            module: Arc::clone(&state.module),
            timestamp: state.timestamp.or(default.timestamp).unwrap_or(false),
            call_site: state
                .source_display
                .or(default.source_display)
                .unwrap_or(false),
            sink: state.sink.as_ref().or(default.sink.as_ref()).cloned(),
        })
    }

    pub fn settings(&self, handle: &SourceHandle) -> Option<SourceSettings> {
        self.state(handle).map(SourceState::settings)
    }

    pub fn stats(&self, handle: &SourceHandle) -> Option<SourceStats> {
        self.state(handle).map(SourceState::stats)
    }

    pub fn histogram(&self, handle: &SourceHandle) -> Option<Histogram> {
        self.state(handle).map(|state| state.histogram)
    }

    /// Settings of `module`, registering it if needed
    pub fn settings_for(&mut self, module: &str) -> SourceSettings {
        let id = self.id_for(module);
        self.sources[id].settings()
    }

    /// Statistics of `module`, registering it if needed
    pub fn stats_for(&mut self, module: &str) -> SourceStats {
        let id = self.id_for(module);
        self.sources[id].stats()
    }

    /// Statistics for every registered source, in creation order
    pub fn all_stats(&self) -> Vec<SourceStats> {
        self.sources.iter().map(SourceState::stats).collect()
    }

    /// Remove every source, releasing their sinks; returns how many were removed
    pub fn drain(&mut self, sinks: &mut SinkRegistry) -> usize {
        let count = self.sources.len();
        for mut state in self.sources.drain(..) {
            if let Some(sink) = state.sink.take() {
                sinks.release(&sink);
            }
        }
        self.index.clear();
        count
    }
}

fn key(module: &str) -> String {
    module.to_ascii_lowercase()
}

/// Histogram levels paired with their counts, for display
pub fn histogram_pairs(histogram: &Histogram) -> impl Iterator<Item = (Level, u64)> + '_ {
    HISTOGRAM_LEVELS.iter().copied().zip(histogram.iter().copied())
}
