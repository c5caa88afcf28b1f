//! Log sinks
//!
//! A [`LogSink`] is any destination the recovery layer can route a log line
//! to. The structured logger is the primary sink; [`BufferedSink`] and
//! [`JsonLinesSink`] serve as fallback paths when it fails. The [`console`]
//! module is the last resort behind both.

use aegis_core::{AegisError, Context, LogLevel};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for log lines
pub trait LogSink: Send + Sync + Debug {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    /// Write one line
    ///
    /// # Errors
    /// Returns a sink failure if the line could not be recorded
    fn write(&self, level: LogLevel, message: &str, context: &Context) -> Result<(), AegisError>;

    /// Whether the sink currently accepts writes
    fn is_healthy(&self) -> bool {
        true
    }
}

/// A line as recorded by a fallback sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    /// Time the line was written
    pub timestamp: DateTime<Utc>,
    /// Line level
    pub level: LogLevel,
    /// Line text
    pub message: String,
    /// Caller context
    pub context: Context,
}

impl SinkRecord {
    fn now(level: LogLevel, message: &str, context: &Context) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            context: context.clone(),
        }
    }
}

/// Bounded in-memory fallback sink
#[derive(Debug)]
pub struct BufferedSink {
    capacity: usize,
    records: RwLock<VecDeque<SinkRecord>>,
}

impl BufferedSink {
    /// Create sink retaining at most `capacity` lines
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: RwLock::new(VecDeque::new()),
        }
    }

    /// Snapshot of retained lines, oldest first
    #[must_use]
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.read().iter().cloned().collect()
    }

    /// Number of retained lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether nothing is retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every retained line
    pub fn drain(&self) -> Vec<SinkRecord> {
        self.records.write().drain(..).collect()
    }
}

impl LogSink for BufferedSink {
    fn name(&self) -> &str {
        "buffer"
    }

    fn write(&self, level: LogLevel, message: &str, context: &Context) -> Result<(), AegisError> {
        let mut records = self.records.write();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(SinkRecord::now(level, message, context));
        Ok(())
    }
}

/// Append-only newline-delimited JSON file sink
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// Open (or create) the file for appending
    ///
    /// # Errors
    /// Returns `AegisError::Io` if the file cannot be opened
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AegisError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for JsonLinesSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn write(&self, level: LogLevel, message: &str, context: &Context) -> Result<(), AegisError> {
        let mut line = serde_json::to_vec(&SinkRecord::now(level, message, context))?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

/// Last-resort console output
///
/// Writes straight to stderr, bypassing any tracing subscriber: this path
/// runs when the logging system itself is failing. Write errors are dropped.
pub mod console {
    use aegis_core::{Context, LogLevel};
    use chrono::Utc;
    use std::io::Write;

    /// Write one line to stderr
    pub fn write(level: LogLevel, message: &str, context: &Context) {
        let ctx = serde_json::to_string(context).unwrap_or_default();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "{} [{level}] {message} {ctx}",
            Utc::now().to_rfc3339()
        );
    }
}
