// SPDX-License-Identifier: Apache-2.0 OR MIT
// Bounded buffer of recently emitted entries

use super::entry::{Entry, RecentEntry};
use std::collections::VecDeque;

/// Default number of entries kept
pub const HISTORY_CAPACITY: usize = 1000;

/// Oldest-first FIFO of emitted entries
///
/// Only entries that passed the filter are recorded. Once full, each append
/// evicts the oldest entry.
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: VecDeque<Entry>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Create a buffer bounded to `capacity` entries (at least one)
    ///
    /// Storage grows with use; the bound only limits it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, returning the one evicted to make room
    pub fn append(&mut self, entry: Entry) -> Option<Entry> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// The most recent `limit` entries, oldest first; 0 returns all
    pub fn recent(&self, limit: usize) -> Vec<RecentEntry> {
        let skip = if limit == 0 {
            0
        } else {
            self.entries.len().saturating_sub(limit)
        };
        self.entries.iter().skip(skip).map(Entry::to_record).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
