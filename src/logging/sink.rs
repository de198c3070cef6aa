// SPDX-License-Identifier: Apache-2.0 OR MIT
// Reference-counted output sinks shared between log sources

use super::error::LogError;
use super::level::Level;
use std::collections::HashMap;
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

pub const SINK_STDOUT: &str = "stdout";
pub const SINK_STDERR: &str = "stderr";
pub const SINK_SYSLOG: &str = "syslog";

/// What a sink writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Stdout,
    Stderr,
    Syslog,
    File,
}

impl SinkKind {
    /// Classify a sink name; anything that is not a reserved name is a file path
    pub fn for_name(name: &str) -> Self {
        match name {
            SINK_STDOUT => SinkKind::Stdout,
            SINK_STDERR => SinkKind::Stderr,
            SINK_SYSLOG => SinkKind::Syslog,
            _ => SinkKind::File,
        }
    }
}

/// Open syslog facility; closed when dropped
struct Syslog;

impl Syslog {
    fn open() -> Self {
        // SAFETY: a null ident makes syslog use the program name
        unsafe { libc::openlog(std::ptr::null(), 0, libc::LOG_DAEMON) };
        Syslog
    }

    fn send(&self, priority: libc::c_int, line: &str) {
        let trimmed = line.trim_end_matches('\n');
        let message = match CString::new(trimmed) {
            Ok(message) => message,
            Err(_) => match CString::new(trimmed.replace('\0', " ")) {
                Ok(message) => message,
                Err(_) => return,
            },
        };
        // SAFETY: both pointers are valid NUL-terminated strings and the
        // format consumes exactly one string argument
        unsafe { libc::syslog(priority, c"%s".as_ptr(), message.as_ptr()) };
    }
}

impl Drop for Syslog {
    fn drop(&mut self) {
        // SAFETY: closelog has no preconditions
        unsafe { libc::closelog() };
    }
}

enum SinkOutput {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    Syslog(Syslog),
    File(File),
}

/// A named output destination
///
/// Writes are serialized by the sink's own lock, so concurrent emitters
/// never interleave partial lines.
pub struct Sink {
    name: String,
    kind: SinkKind,
    output: Mutex<SinkOutput>,
}

impl Sink {
    fn open(name: &str) -> Result<Self, LogError> {
        let kind = SinkKind::for_name(name);
        let output = match kind {
            SinkKind::Stdout => SinkOutput::Stdout(io::stdout()),
            SinkKind::Stderr => SinkOutput::Stderr(io::stderr()),
            SinkKind::Syslog => SinkOutput::Syslog(Syslog::open()),
            SinkKind::File => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(name)
                    .map_err(|source| LogError::SinkOpen {
                        name: name.to_string(),
                        source,
                    })?;
                SinkOutput::File(file)
            }
        };
        Ok(Self {
            name: name.to_string(),
            kind,
            output: Mutex::new(output),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn is_syslog(&self) -> bool {
        self.kind == SinkKind::Syslog
    }

    /// Write one rendered line
    ///
    /// Stream and file sinks are flushed immediately. Syslog sinks map the
    /// level to its syslog priority and never report failure.
    pub fn write_line(&self, level: Level, line: &str) -> io::Result<()> {
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *output {
            SinkOutput::Stdout(stdout) => {
                let mut handle = stdout.lock();
                handle.write_all(line.as_bytes())?;
                handle.flush()
            }
            SinkOutput::Stderr(stderr) => {
                let mut handle = stderr.lock();
                handle.write_all(line.as_bytes())?;
                handle.flush()
            }
            SinkOutput::File(file) => {
                file.write_all(line.as_bytes())?;
                file.flush()
            }
            SinkOutput::Syslog(syslog) => {
                if let Some(priority) = level.syslog_priority() {
                    syslog.send(priority, line);
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

struct SinkSlot {
    sink: Arc<Sink>,
    refcount: usize,
}

/// Lookup-or-create pool of sinks keyed by name
///
/// Not internally locked: the owning context guards it with the registry lock.
/// A released sink's resource closes once the last in-flight handle drops,
/// which is immediate unless an emitter is mid-write.
#[derive(Default)]
pub struct SinkRegistry {
    sinks: HashMap<String, SinkSlot>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a sink by name, opening it on first use
    ///
    /// Each successful call must be matched by one `release`.
    pub fn acquire(&mut self, name: &str) -> Result<Arc<Sink>, LogError> {
        if let Some(slot) = self.sinks.get_mut(name) {
            slot.refcount += 1;
            return Ok(Arc::clone(&slot.sink));
        }
        let sink = Arc::new(Sink::open(name)?);
        self.sinks.insert(
            name.to_string(),
            SinkSlot {
                sink: Arc::clone(&sink),
                refcount: 1,
            },
        );
        Ok(sink)
    }

    /// Drop one reference; returns true if this was the last one and the
    /// sink was removed from the registry
    pub fn release(&mut self, sink: &Arc<Sink>) -> bool {
        let Some(slot) = self.sinks.get_mut(sink.name()) else {
            return false;
        };
        if !Arc::ptr_eq(&slot.sink, sink) {
            // Stale handle to a sink that was already closed and reopened
            return false;
        }
        debug_assert!(slot.refcount > 0);
        slot.refcount -= 1;
        if slot.refcount == 0 {
            self.sinks.remove(sink.name());
            true
        } else {
            false
        }
    }

    /// Current reference count, `None` if not registered
    pub fn refcount(&self, name: &str) -> Option<usize> {
        self.sinks.get(name).map(|slot| slot.refcount)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Names of all registered sinks, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sinks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Forget every sink regardless of reference count; returns how many
    /// were still registered
    pub fn drain(&mut self) -> usize {
        let count = self.sinks.len();
        self.sinks.clear();
        count
    }
}
