//! Structured logger
//!
//! Appends immutable entries to a bounded [`LogStore`], mirrors them into
//! `tracing`, and answers search and analysis queries from a consistent
//! store snapshot. The `log_*` family never fails: when the store rejects a
//! write the line goes to the console instead and the logger reports itself
//! unhealthy until a write or health probe succeeds.

use crate::category::ErrorCategory;
use crate::entry::{LogEntry, LogRecord};
use crate::query::LogQuery;
use crate::sink::{console, LogSink};
use crate::stats::{aggregate_errors, AggregatedError, ErrorStatistics};
use crate::store::{LogStore, MemoryStore};
use crate::suggest::{suggestions_for, ErrorSuggestion};
use aegis_core::{AegisError, Context, EntryId, Fault, LogLevel, LoggerConfig};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Bounded, queryable structured logger
#[derive(Debug)]
pub struct StructuredLogger {
    config: LoggerConfig,
    store: Arc<dyn LogStore>,
    healthy: AtomicBool,
    write_failures: AtomicU64,
}

impl StructuredLogger {
    /// Create logger over an in-memory store sized from config
    #[must_use]
    pub fn new(config: LoggerConfig) -> Self {
        let store = Arc::new(MemoryStore::new(config.max_entries));
        Self::with_store(config, store)
    }

    /// Create logger over a custom store
    #[must_use]
    pub fn with_store(config: LoggerConfig, store: Arc<dyn LogStore>) -> Self {
        Self {
            config,
            store,
            healthy: AtomicBool::new(true),
            write_failures: AtomicU64::new(0),
        }
    }

    /// Logger configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Append a record, surfacing store failures
    ///
    /// # Errors
    /// Returns `AegisError::StoreWrite` (or the store's own error) if the
    /// entry was not stored. A panicking store is reported the same way.
    pub fn try_log(&self, record: LogRecord) -> Result<LogEntry, AegisError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.store.append(record)))
            .unwrap_or_else(|_| Err(AegisError::StoreWrite("log store panicked".into())));

        match outcome {
            Ok(entry) => {
                self.healthy.store(true, Ordering::Release);
                if self.config.mirror_to_tracing {
                    mirror(&entry);
                }
                Ok(entry)
            }
            Err(e) => {
                self.healthy.store(false, Ordering::Release);
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn append_or_console(&self, record: LogRecord) -> Option<EntryId> {
        let (level, message, context) =
            (record.level, record.message.clone(), record.context.clone());

        match self.try_log(record) {
            Ok(entry) => Some(entry.id),
            Err(e) => {
                console::write(level, &message, &context);
                console::write(
                    LogLevel::Warning,
                    &format!("log store write failed: {e}"),
                    &Context::new().with_component("aegis-log"),
                );
                None
            }
        }
    }

    /// Log a line at any level
    ///
    /// Returns the stored entry id, or `None` if the line went to the console.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, context: Context) -> Option<EntryId> {
        self.append_or_console(LogRecord::new(level, message, context))
    }

    /// Log a debug line
    pub fn log_debug(&self, message: impl Into<String>, context: Context) -> Option<EntryId> {
        self.log(LogLevel::Debug, message, context)
    }

    /// Log an informational line
    pub fn log_info(&self, message: impl Into<String>, context: Context) -> Option<EntryId> {
        self.log(LogLevel::Info, message, context)
    }

    /// Log a warning
    pub fn log_warning(&self, message: impl Into<String>, context: Context) -> Option<EntryId> {
        self.log(LogLevel::Warning, message, context)
    }

    /// Log a fault at ERROR, capturing its stack trace
    pub fn log_error(&self, fault: &Fault, context: Context) -> Option<EntryId> {
        self.append_or_console(fault_record(LogLevel::Error, fault, context))
    }

    /// Log a fault at CRITICAL, capturing its stack trace
    pub fn log_critical(&self, fault: &Fault, context: Context) -> Option<EntryId> {
        self.append_or_console(fault_record(LogLevel::Critical, fault, context))
    }

    /// Entries matching every populated query field, in insertion order
    #[must_use]
    pub fn search_logs(&self, query: &LogQuery) -> Vec<LogEntry> {
        self.store
            .entries()
            .into_iter()
            .filter(|e| query.matches(e))
            .collect()
    }

    /// Error counts by type, component and level
    #[must_use]
    pub fn error_statistics(&self) -> ErrorStatistics {
        ErrorStatistics::from_entries(&self.store.entries())
    }

    /// Error entries grouped by identical message
    #[must_use]
    pub fn aggregated_errors(&self) -> Vec<AggregatedError> {
        aggregate_errors(&self.store.entries())
    }

    /// Remediation hints for stored errors with a known signature
    #[must_use]
    pub fn error_suggestions(&self) -> Vec<ErrorSuggestion> {
        suggestions_for(&self.aggregated_errors())
    }

    /// The `n` most recent entries, oldest first
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.store.entries();
        let skip = entries.len().saturating_sub(n);
        entries.into_iter().skip(skip).collect()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop every stored entry
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Serialize all entries as a JSON array in insertion order
    ///
    /// # Errors
    /// Returns `AegisError::Serialization` if an entry cannot be encoded
    pub fn export_json(&self) -> Result<String, AegisError> {
        Ok(serde_json::to_string_pretty(&self.store.entries())?)
    }

    /// Whether the last write (or probe) succeeded
    #[inline]
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Probe the store and refresh the health flag
    pub fn health_check(&self) -> bool {
        let ok = catch_unwind(AssertUnwindSafe(|| self.store.health_check()))
            .map_or(false, |r| r.is_ok());
        self.healthy.store(ok, Ordering::Release);
        ok
    }

    /// Writes rejected by the store since creation
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}

impl LogSink for StructuredLogger {
    fn name(&self) -> &str {
        "structured"
    }

    fn write(&self, level: LogLevel, message: &str, context: &Context) -> Result<(), AegisError> {
        self.try_log(LogRecord::new(level, message, context.clone()))
            .map(|_| ())
    }

    /// Probes the store, so a recovered store reports healthy again
    fn is_healthy(&self) -> bool {
        self.health_check()
    }
}

fn fault_record(level: LogLevel, fault: &Fault, context: Context) -> LogRecord {
    let mut record = LogRecord::new(level, fault.summary(), context)
        .with_stack_trace(stack_trace(fault))
        .with_meta("category", ErrorCategory::classify(fault).as_str());
    if let Some(name) = &fault.name {
        record = record.with_meta("errorName", name.as_str());
    }
    record
}

fn stack_trace(fault: &Fault) -> String {
    if let Some(stack) = &fault.stack {
        return stack.clone();
    }
    let trace = Backtrace::capture();
    match trace.status() {
        BacktraceStatus::Captured => trace.to_string(),
        _ => format!("{fault}\n    (backtrace not captured; set RUST_BACKTRACE=1)"),
    }
}

fn mirror(entry: &LogEntry) {
    let ctx = &entry.context;
    let id = entry.id.0;
    let plugin_id = ctx.plugin_id.as_deref().unwrap_or("");
    let component = ctx.component.as_deref().unwrap_or("");
    let message = entry.message.as_str();

    match entry.level {
        LogLevel::Debug => {
            tracing::debug!(target: "aegis::log", id, plugin_id, component, "{message}");
        }
        LogLevel::Info => {
            tracing::info!(target: "aegis::log", id, plugin_id, component, "{message}");
        }
        LogLevel::Warning => {
            tracing::warn!(target: "aegis::log", id, plugin_id, component, "{message}");
        }
        LogLevel::Error => {
            tracing::error!(target: "aegis::log", id, plugin_id, component, "{message}");
        }
        LogLevel::Critical => {
            tracing::error!(target: "aegis::log", id, plugin_id, component, critical = true, "{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug)]
    struct BrokenStore {
        broken: Mutex<bool>,
        inner: MemoryStore,
    }

    impl BrokenStore {
        fn new() -> Self {
            Self {
                broken: Mutex::new(true),
                inner: MemoryStore::new(10),
            }
        }
    }

    impl LogStore for BrokenStore {
        fn append(&self, record: LogRecord) -> Result<LogEntry, AegisError> {
            if *self.broken.lock() {
                return Err(AegisError::StoreWrite("disk full".into()));
            }
            self.inner.append(record)
        }
        fn entries(&self) -> Vec<LogEntry> {
            self.inner.entries()
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
        fn clear(&self) {
            self.inner.clear();
        }
        fn health_check(&self) -> Result<(), AegisError> {
            if *self.broken.lock() {
                Err(AegisError::StoreWrite("disk full".into()))
            } else {
                Ok(())
            }
        }
    }

    fn logger(max_entries: usize) -> StructuredLogger {
        StructuredLogger::new(LoggerConfig::default().with_max_entries(max_entries))
    }

    #[test]
    fn log_error_captures_stack_trace() {
        let logger = logger(10);
        logger.log_error(&Fault::named("TypeError", "a"), Context::new());
        logger.log_info("hello", Context::new());

        let entries = logger.recent(10);
        assert_eq!(entries[0].message, "TypeError: a");
        assert!(entries[0].stack_trace.is_some());
        assert_eq!(entries[0].metadata["errorName"], "TypeError");
        assert!(entries[1].stack_trace.is_none());
    }

    #[test]
    fn provided_stack_is_kept() {
        let logger = logger(10);
        logger.log_critical(&Fault::new("boom").with_stack("at main.rs:1"), Context::new());
        assert_eq!(logger.recent(1)[0].stack_trace.as_deref(), Some("at main.rs:1"));
        assert_eq!(logger.recent(1)[0].level, LogLevel::Critical);
    }

    #[test]
    fn eviction_keeps_most_recent() {
        let logger = logger(3);
        for n in 0..5 {
            logger.log_info(format!("m{n}"), Context::new());
        }
        let messages: Vec<_> = logger.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn store_failure_degrades_to_console() {
        let store = Arc::new(BrokenStore::new());
        let logger = StructuredLogger::with_store(LoggerConfig::default(), store.clone());

        assert_eq!(logger.log_warning("lost", Context::new()), None);
        assert!(!logger.is_healthy());
        assert_eq!(logger.write_failures(), 1);

        *store.broken.lock() = false;
        assert!(logger.health_check());
        assert!(logger.log_info("back", Context::new()).is_some());
        assert_eq!(logger.len(), 1);
    }

    #[test]
    fn sink_write_surfaces_failure() {
        let logger = StructuredLogger::with_store(LoggerConfig::default(), Arc::new(BrokenStore::new()));
        let err = LogSink::write(&logger, LogLevel::Info, "x", &Context::new()).unwrap_err();
        assert!(err.is_sink_failure());
    }

    #[test]
    fn search_in_insertion_order() {
        let logger = logger(10);
        logger.log_info("a", Context::new().with_plugin("p1"));
        logger.log_info("b", Context::new().with_plugin("p2"));
        logger.log_info("c", Context::new().with_plugin("p1"));

        let found: Vec<_> = logger
            .search_logs(&LogQuery::new().plugin("p1"))
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(found, vec!["a", "c"]);
    }

    #[test]
    fn export_json_is_array() {
        let logger = logger(10);
        logger.log_info("a", Context::new());
        let json: serde_json::Value = serde_json::from_str(&logger.export_json().unwrap()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(1));
        assert_eq!(json[0]["level"], "INFO");
    }
}
