//! Log entries
//!
//! A [`LogRecord`] is what a caller hands to the store; the store stamps it
//! with an id and timestamp under its write lock and returns the immutable
//! [`LogEntry`].

use aegis_core::{Context, EntryId, LogLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Unstamped log record
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Entry level
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Caller context
    pub context: Context,
    /// Trace for entries derived from a fault
    pub stack_trace: Option<String>,
    /// Logger-attached metadata
    pub metadata: BTreeMap<String, Value>,
}

impl LogRecord {
    /// Create record
    #[inline]
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>, context: Context) -> Self {
        Self {
            level,
            message: message.into(),
            context,
            stack_trace: None,
            metadata: BTreeMap::new(),
        }
    }

    /// With stack trace
    #[inline]
    #[must_use]
    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    /// With metadata field
    #[inline]
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stamp into an immutable entry
    #[inline]
    #[must_use]
    pub fn stamp(self, id: EntryId, timestamp: DateTime<Utc>) -> LogEntry {
        LogEntry {
            id,
            timestamp,
            level: self.level,
            message: self.message,
            context: self.context,
            stack_trace: self.stack_trace,
            metadata: self.metadata,
        }
    }
}

/// Immutable stored log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Store-assigned id, increasing in insertion order
    pub id: EntryId,
    /// Time the entry was stored
    pub timestamp: DateTime<Utc>,
    /// Entry level
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Caller context
    pub context: Context,
    /// Trace, only for ERROR/CRITICAL entries derived from a fault
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Logger-attached metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl LogEntry {
    /// Component the entry is attributed to: plugin id, else component
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.context.origin()
    }
}
