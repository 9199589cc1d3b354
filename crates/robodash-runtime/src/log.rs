//! [`ActivityLog`] – the user-visible, bounded activity log.
//!
//! Keeps the most recent [`MAX_LOG_ENTRIES`] lines; the oldest line is
//! dropped first.  Every appended line is mirrored to `tracing`.

use std::collections::VecDeque;

use robodash_types::{LogEntry, LogLevel};
use tracing::{info, warn};

/// Capacity of the activity log.
pub const MAX_LOG_ENTRIES: usize = 50;

pub struct ActivityLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
    /// Bumped on every append; lets observers skip unchanged snapshots.
    version: u64,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(MAX_LOG_ENTRIES)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            version: 0,
        }
    }

    /// Append a line and return a copy of it.
    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(level, message);
        match level {
            LogLevel::Warn | LogLevel::Bad => warn!(target: "robodash::activity", level = ?level, "{}", entry.message),
            _ => info!(target: "robodash::activity", level = ?level, "{}", entry.message),
        }
        self.entries.push_back(entry.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.version = self.version.wrapping_add(1);
        entry
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of lines whose message contains `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.entries.iter().filter(|e| e.message.contains(needle)).count()
    }
}
