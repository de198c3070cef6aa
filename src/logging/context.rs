// SPDX-License-Identifier: Apache-2.0 OR MIT
// Process-wide logging context: registries, emission pipeline and history

use super::entry::{Entry, RecentEntry};
use super::error::UpdateError;
use super::history::{HistoryBuffer, HISTORY_CAPACITY};
use super::level::Level;
use super::sink::{SinkRegistry, SINK_STDERR};
use super::source::{
    SourceHandle, SourceRegistry, SourceSettings, SourceStats, SourceUpdate, DEFAULT_MASK,
    SOURCE_LOGGING,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What to do when a stream or file sink rejects a write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Report on stderr and terminate the process with status 1
    #[default]
    Exit,
    /// Write the line to stderr instead and count the failure
    FallbackStderr,
}

/// Construction-time settings of a `LoggingContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingSettings {
    pub history_capacity: usize,
    pub write_failure: WriteFailurePolicy,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            history_capacity: HISTORY_CAPACITY,
            write_failure: WriteFailurePolicy::default(),
        }
    }
}

/// Returned by `LoggingContext::shutdown`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Sources torn down, DEFAULT included
    pub sources: usize,
    /// History entries discarded
    pub entries: usize,
    /// Sinks still registered after every source released its reference
    pub orphaned_sinks: usize,
}

struct Registries {
    sources: SourceRegistry,
    sinks: SinkRegistry,
}

/// Owner of all logging state
///
/// Holds two locks, one for the source and sink registries and one for the
/// history buffer. They are never held at the same time, and sink I/O
/// happens with neither held.
pub struct LoggingContext {
    registries: Mutex<Registries>,
    history: Mutex<HistoryBuffer>,
    settings: LoggingSettings,
    write_failures: AtomicU64,
    logging_source: SourceHandle,
}

impl LoggingContext {
    /// Create a context with default settings
    ///
    /// DEFAULT starts at info+ with timestamps, no call-site display, and
    /// writes to stderr. The LOGGING source is created for the context's own
    /// diagnostics.
    pub fn initialize() -> Self {
        Self::with_settings(LoggingSettings::default())
    }

    pub fn with_settings(settings: LoggingSettings) -> Self {
        let mut sources = SourceRegistry::new();
        let mut sinks = SinkRegistry::new();
        configure_default(&mut sources, &mut sinks);
        let logging_source = sources.get_or_create(SOURCE_LOGGING);
        Self {
            registries: Mutex::new(Registries { sources, sinks }),
            history: Mutex::new(HistoryBuffer::with_capacity(settings.history_capacity)),
            settings,
            write_failures: AtomicU64::new(0),
            logging_source,
        }
    }

    /// Tear down every source, discard history and close remaining sinks
    pub fn shutdown(self) -> ShutdownSummary {
        let mut registries = self.lock_registries();
        let Registries { sources, sinks } = &mut *registries;
        let source_count = sources.drain(sinks);
        let orphaned_sinks = sinks.drain();
        drop(registries);

        let mut history = self.lock_history();
        let entries = history.len();
        history.clear();

        ShutdownSummary {
            sources: source_count,
            entries,
            orphaned_sinks,
        }
    }

    pub fn settings(&self) -> LoggingSettings {
        self.settings
    }

    fn lock_registries(&self) -> MutexGuard<'_, Registries> {
        self.registries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> MutexGuard<'_, HistoryBuffer> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a source by module name, creating it if needed
    pub fn source(&self, module: &str) -> SourceHandle {
        self.lock_registries().sources.get_or_create(module)
    }

    pub fn find_source(&self, module: &str) -> Option<SourceHandle> {
        self.lock_registries().sources.find(module)
    }

    /// A cloneable logging handle for `module`
    pub fn logger(self: &Arc<Self>, module: &str) -> Logger {
        Logger {
            source: self.source(module),
            context: Arc::clone(self),
        }
    }

    /// Restore a source to inherit everything from DEFAULT
    ///
    /// Resetting DEFAULT itself restores its initial configuration.
    pub fn reset_source(&self, module: &str) -> SourceHandle {
        let handle = {
            let mut registries = self.lock_registries();
            let Registries { sources, sinks } = &mut *registries;
            let handle = sources.get_or_create(module);
            sources.reset(&handle, sinks);
            if handle.is_default() {
                configure_default(sources, sinks);
            }
            handle
        };
        self.diagnostic(Level::Debug, format_args!("Log source '{}' reset", handle.module()));
        handle
    }

    /// Apply a multi-field update; see `SourceRegistry::apply_update`
    pub fn apply_update(&self, update: &SourceUpdate) -> Result<SourceHandle, UpdateError> {
        let result = {
            let mut registries = self.lock_registries();
            let Registries { sources, sinks } = &mut *registries;
            sources.apply_update(update, sinks)
        };
        match &result {
            Ok(handle) => self.diagnostic(
                Level::Debug,
                format_args!("Log source '{}' updated: {:?}", handle.module(), update),
            ),
            Err(err) => self.diagnostic(Level::Warning, format_args!("{}", err)),
        }
        result
    }

    /// Whether `level` passes the source's effective mask
    pub fn is_enabled(&self, source: &SourceHandle, level: Level) -> bool {
        self.lock_registries().sources.is_enabled(source, level)
    }

    /// Emit one event
    ///
    /// The histogram is bumped even when the level is filtered out. Passing
    /// events are written to the effective sink and recorded in history. A
    /// handle from another context is ignored.
    pub fn emit(
        &self,
        source: &SourceHandle,
        level: Level,
        file: Option<&str>,
        line: Option<u32>,
        args: fmt::Arguments<'_>,
    ) {
        let Some(plan) = self.lock_registries().sources.prepare_emit(source, level) else {
            return;
        };

        let entry = Entry::new(plan.module, level, file, line, Local::now(), fmt::format(args));
        if let Some(sink) = &plan.sink {
            let rendered = entry.render(plan.timestamp, plan.call_site);
            if let Err(err) = sink.write_line(level, &rendered) {
                self.write_failed(sink.name(), &rendered, &err);
            }
        }

        self.lock_history().append(entry);
    }

    fn write_failed(&self, sink: &str, rendered: &str, err: &io::Error) {
        match self.settings.write_failure {
            WriteFailurePolicy::Exit => {
                eprintln!("Cannot write log output to '{}': {}", sink, err);
                std::process::exit(1);
            }
            WriteFailurePolicy::FallbackStderr => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                let mut stderr = io::stderr().lock();
                // Nowhere left to report a failing stderr
                let _ = stderr.write_all(rendered.as_bytes());
                let _ = stderr.flush();
            }
        }
    }

    fn diagnostic(&self, level: Level, args: fmt::Arguments<'_>) {
        self.emit(&self.logging_source, level, None, None, args);
    }

    /// Most recent `limit` history entries, oldest first (0 = all)
    pub fn recent(&self, limit: usize) -> Vec<RecentEntry> {
        self.lock_history().recent(limit)
    }

    pub fn history_len(&self) -> usize {
        self.lock_history().len()
    }

    pub fn history_capacity(&self) -> usize {
        self.lock_history().capacity()
    }

    pub fn source_settings(&self, module: &str) -> SourceSettings {
        self.lock_registries().sources.settings_for(module)
    }

    pub fn source_stats(&self, module: &str) -> SourceStats {
        self.lock_registries().sources.stats_for(module)
    }

    /// Statistics for every registered source, in creation order
    pub fn all_source_stats(&self) -> Vec<SourceStats> {
        self.lock_registries().sources.all_stats()
    }

    /// Number of writes redirected under `WriteFailurePolicy::FallbackStderr`
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn sink_refcount(&self, name: &str) -> Option<usize> {
        self.lock_registries().sinks.refcount(name)
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.lock_registries().sinks.names()
    }
}

impl fmt::Debug for LoggingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingContext")
            .field("settings", &self.settings)
            .field("write_failures", &self.write_failures())
            .finish_non_exhaustive()
    }
}

fn configure_default(sources: &mut SourceRegistry, sinks: &mut SinkRegistry) {
    let default = sources.default_source();
    sources.set_mask(&default, Some(DEFAULT_MASK));
    sources.set_timestamp(&default, Some(true));
    sources.set_source_display(&default, Some(false));
    // Opening stderr cannot fail
    if let Ok(stderr) = sinks.acquire(SINK_STDERR) {
        sources.set_sink(&default, stderr, sinks);
    }
}

/// Logger handle for one source
///
/// Cheap to clone and share across threads.
#[derive(Clone)]
pub struct Logger {
    context: Arc<LoggingContext>,
    source: SourceHandle,
}

impl Logger {
    pub fn module(&self) -> &str {
        self.source.module()
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn context(&self) -> &Arc<LoggingContext> {
        &self.context
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        self.context.is_enabled(&self.source, level)
    }

    /// Emit with an optional call site; used by the `log_*!` macros
    #[inline]
    pub fn log(&self, level: Level, file: Option<&str>, line: Option<u32>, args: fmt::Arguments<'_>) {
        self.context.emit(&self.source, level, file, line, args);
    }

    #[inline]
    pub fn trace(&self, message: &str) {
        self.log(Level::Trace, None, None, format_args!("{}", message));
    }

    #[inline]
    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, None, None, format_args!("{}", message));
    }

    #[inline]
    pub fn info(&self, message: &str) {
        self.log(Level::Info, None, None, format_args!("{}", message));
    }

    #[inline]
    pub fn notice(&self, message: &str) {
        self.log(Level::Notice, None, None, format_args!("{}", message));
    }

    #[inline]
    pub fn warning(&self, message: &str) {
        self.log(Level::Warning, None, None, format_args!("{}", message));
    }

    #[inline]
    pub fn error(&self, message: &str) {
        self.log(Level::Error, None, None, format_args!("{}", message));
    }

    #[inline]
    pub fn critical(&self, message: &str) {
        self.log(Level::Critical, None, None, format_args!("{}", message));
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("module", &self.module()).finish()
    }
}
