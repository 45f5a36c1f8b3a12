//! Activity log entries.

use serde::{Deserialize, Serialize};

use crate::id::EntryId;
use crate::Time;

/// Severity tag of an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// A request started
    Start,
    /// A discrete actuator action
    Action,
    /// Motion
    Move,
    /// Something finished
    Success,
    /// Soft failure, work continues
    Warning,
    /// Failure
    Error,
}

/// One human-readable progress or error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier
    pub id: EntryId,
    /// When it was appended
    pub timestamp: Time,
    /// Severity tag
    pub severity: Severity,
    /// Message
    pub message: String,
}

impl LogEntry {
    /// Create a new entry stamped now.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: EntryId::new(),
            timestamp: chrono::Utc::now(),
            severity,
            message: message.into(),
        }
    }
}
