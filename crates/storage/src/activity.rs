//! Bounded activity log.
//!
//! Human-readable progress and error messages for display. Newest entries
//! come first; only the most recent `capacity` are kept. Nothing in the
//! control path reads this log back.

use std::collections::VecDeque;
use std::sync::Mutex;

use rackflow_core::{LogEntry, Severity};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Default number of retained entries.
pub const DEFAULT_CAPACITY: usize = 50;

/// Append-only, most-recent-N activity log.
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    tx: broadcast::Sender<LogEntry>,
}

impl ActivityLog {
    /// Create a log keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            tx,
        }
    }

    /// Append a message. A message identical to the newest entry is dropped.
    /// Returns whether the entry was kept.
    pub fn push(&self, severity: Severity, message: impl Into<String>) -> bool {
        let message = message.into();
        match severity {
            Severity::Error => error!(target: "activity", "{}", message),
            Severity::Warning => warn!(target: "activity", "{}", message),
            _ => info!(target: "activity", "{}", message),
        }

        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if entries.front().is_some_and(|newest| newest.message == message) {
                return false;
            }
            let entry = LogEntry::new(severity, message);
            entries.push_front(entry.clone());
            entries.truncate(self.capacity);
            entry
        };

        // No subscribers is fine.
        let _ = self.tx.send(entry);
        true
    }

    /// Shorthand for [`Severity::Info`].
    pub fn info(&self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    /// Shorthand for [`Severity::Error`].
    pub fn error(&self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Retained entries, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Whether any retained entry contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|e| e.message.contains(needle))
    }

    /// Drop every retained entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Receive entries as they are appended.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    /// Maximum retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_first_and_bounded() {
        let log = ActivityLog::new(3);
        for i in 0..5 {
            log.info(format!("message {i}"));
        }
        let messages: Vec<_> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["message 4", "message 3", "message 2"]);
    }

    #[test]
    fn drops_consecutive_duplicates() {
        let log = ActivityLog::default();
        assert!(log.push(Severity::Move, "SHUTTLE_1 moving"));
        assert!(!log.push(Severity::Move, "SHUTTLE_1 moving"));
        assert!(log.push(Severity::Success, "arrived"));
        assert!(log.push(Severity::Move, "SHUTTLE_1 moving"));
        assert_eq!(log.entries().len(), 3);
    }

    #[tokio::test]
    async fn subscribers_see_new_entries() {
        let log = ActivityLog::default();
        let mut rx = log.subscribe();
        log.push(Severity::Error, "boom");
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.severity, Severity::Error);
        assert_eq!(entry.message, "boom");
    }
}
