//! Testing utilities for the Aegis workspace
//!
//! Shared fakes and fixtures for the collaborator seams.

#![allow(missing_docs)]

use aegis_core::{AegisError, Context, Fault, LogLevel, LoggerConfig, Severity};
use aegis_log::{LogEntry, LogRecord, LogSink, LogStore, StructuredLogger};
use aegis_recovery::{ComponentFailureHandler, DeveloperNotifier, FailureDisposition, Notification};
use aegis_widget::{WidgetErrorRecord, WidgetFailureHandler};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Notifier that keeps everything it is handed
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.seen.lock().iter().filter(|n| n.kind() == kind).count()
    }
}

#[async_trait::async_trait]
impl DeveloperNotifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), AegisError> {
        self.seen.lock().push(notification);
        Ok(())
    }
}

/// Sink that fails every write while `down` is set
#[derive(Debug, Default)]
pub struct FlakySink {
    down: AtomicBool,
    attempts: AtomicUsize,
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl FlakySink {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn broken() -> Arc<Self> {
        let sink = Self::default();
        sink.down.store(true, Ordering::SeqCst);
        Arc::new(sink)
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines.lock().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl LogSink for FlakySink {
    fn name(&self) -> &str {
        "flaky"
    }

    fn write(&self, level: LogLevel, message: &str, _context: &Context) -> Result<(), AegisError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(AegisError::SinkUnavailable("flaky sink is down".into()));
        }
        self.lines.lock().push((level, message.to_string()));
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }
}

/// Sink whose writes panic
#[derive(Debug, Default)]
pub struct PanickingSink;

impl LogSink for PanickingSink {
    fn name(&self) -> &str {
        "panicking"
    }

    fn write(&self, _level: LogLevel, _message: &str, _context: &Context) -> Result<(), AegisError> {
        panic!("sink exploded")
    }

    fn is_healthy(&self) -> bool {
        false
    }
}

/// Log store that rejects every append
#[derive(Debug, Default)]
pub struct FailingStore;

impl LogStore for FailingStore {
    fn append(&self, _record: LogRecord) -> Result<LogEntry, AegisError> {
        Err(AegisError::StoreWrite("store offline".into()))
    }

    fn entries(&self) -> Vec<LogEntry> {
        Vec::new()
    }

    fn len(&self) -> usize {
        0
    }

    fn clear(&self) {}

    fn health_check(&self) -> Result<(), AegisError> {
        Err(AegisError::StoreWrite("store offline".into()))
    }
}

/// Component handler driven by a fixed script
///
/// Every failure gets `disposition`; restoration attempts pop results from
/// `restore_script` and fail once it is empty.
#[derive(Debug)]
pub struct ScriptedComponentHandler {
    disposition: FailureDisposition,
    fallback: Option<String>,
    restore_script: Mutex<VecDeque<Result<bool, String>>>,
    pub failures: Mutex<Vec<String>>,
    pub unhealthy: Mutex<Vec<String>>,
    pub restore_attempts: AtomicUsize,
}

impl ScriptedComponentHandler {
    pub fn new(disposition: FailureDisposition) -> Self {
        Self {
            disposition,
            fallback: None,
            restore_script: Mutex::new(VecDeque::new()),
            failures: Mutex::new(Vec::new()),
            unhealthy: Mutex::new(Vec::new()),
            restore_attempts: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = Some(fallback.to_string());
        self
    }

    #[must_use]
    pub fn with_restore_script(self, script: impl IntoIterator<Item = Result<bool, String>>) -> Self {
        self.restore_script.lock().extend(script);
        self
    }

    pub fn attempts(&self) -> usize {
        self.restore_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ComponentFailureHandler for ScriptedComponentHandler {
    fn handle_component_failure(
        &self,
        component_id: &str,
        _fault: &Fault,
        _context: &Context,
    ) -> Result<FailureDisposition, AegisError> {
        self.failures.lock().push(component_id.to_string());
        Ok(self.disposition.clone())
    }

    fn get_fallback_component(&self, _component_id: &str) -> Option<String> {
        self.fallback.clone()
    }

    fn mark_component_unhealthy(&self, component_id: &str) {
        self.unhealthy.lock().push(component_id.to_string());
    }

    async fn restore_component(&self, component_id: &str) -> Result<bool, AegisError> {
        self.restore_attempts.fetch_add(1, Ordering::SeqCst);
        match self.restore_script.lock().pop_front() {
            Some(Ok(restored)) => Ok(restored),
            Some(Err(reason)) => Err(AegisError::restore(component_id, reason)),
            None => Err(AegisError::restore(component_id, "script exhausted")),
        }
    }
}

pub fn network_fault() -> Fault {
    Fault::named("NetworkError", "ECONNREFUSED 127.0.0.1:5432")
}

pub fn type_fault(message: &str) -> Fault {
    Fault::named("TypeError", message)
}

pub fn plugin_context(plugin_id: &str) -> Context {
    Context::new().with_plugin(plugin_id)
}

pub fn severe_context(component: &str) -> Context {
    Context::new().with_component(component).with_severity(Severity::High)
}

pub fn small_logger(max_entries: usize) -> StructuredLogger {
    StructuredLogger::new(LoggerConfig::default().with_max_entries(max_entries))
}

/// Fail `widget_id` `times` times and return every record observed
pub fn fail_widget(
    handler: &WidgetFailureHandler,
    widget_id: &str,
    plugin_id: &str,
    times: usize,
) -> Vec<WidgetErrorRecord> {
    (0..times)
        .map(|n| handler.handle_widget_error(widget_id, plugin_id, &Fault::new(format!("render failed #{n}"))))
        .collect()
}
