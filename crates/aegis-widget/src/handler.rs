//! Widget failure handler
//!
//! Keeps one [`WidgetErrorRecord`] per failing widget and drives the
//! escalation state machine on every reported failure:
//! - first failure creates the record at LOW
//! - each further failure bumps `retry_count` and re-evaluates severity
//! - the failure whose index equals `auto_remove_after_failures` fires the
//!   auto-remove hook once and retires the record
//!
//! All ledger mutations happen under one mutex, so concurrent failures for
//! the same widget are applied one at a time. Hooks and callbacks always run
//! after the lock is released; their panics are contained.

use crate::fallback::{Fallback, FallbackAction, FallbackCallbacks};
use crate::record::{severity_for, WidgetErrorRecord};
use crate::render;
use aegis_core::{FallbackId, Fault, Severity, WidgetConfig};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Called once when a widget crosses the auto-remove threshold
pub trait AutoRemoveHook: Send + Sync {
    /// Remove the widget from its host
    fn on_auto_remove(&self, record: &WidgetErrorRecord);
}

impl<F> AutoRemoveHook for F
where
    F: Fn(&WidgetErrorRecord) + Send + Sync,
{
    fn on_auto_remove(&self, record: &WidgetErrorRecord) {
        self(record);
    }
}

/// Observes every recorded widget failure
///
/// Lets a coordinator see widget faults without this crate depending on it.
pub trait WidgetFailureListener: Send + Sync {
    /// A failure was recorded; `record` reflects the state after the update
    fn on_widget_failure(&self, record: &WidgetErrorRecord);
}

impl<F> WidgetFailureListener for F
where
    F: Fn(&WidgetErrorRecord) + Send + Sync,
{
    fn on_widget_failure(&self, record: &WidgetErrorRecord) {
        self(record);
    }
}

/// Aggregate view over the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetStatistics {
    /// Failure events observed since construction or last cleanup
    pub total_errors: u64,
    /// Widgets currently failing
    pub failed_widgets: usize,
    /// Currently failing widgets per plugin
    pub by_plugin: BTreeMap<String, usize>,
    /// Currently failing widgets per severity
    pub by_severity: BTreeMap<Severity, usize>,
    /// Widgets retired by the auto-remove policy
    pub auto_removed: u64,
    /// Currently failing widget with the highest retry count
    pub most_failing: Option<String>,
}

struct Slot {
    fallback: Fallback,
    record: WidgetErrorRecord,
    callbacks: FallbackCallbacks,
}

#[derive(Default)]
struct Ledger {
    records: HashMap<String, WidgetErrorRecord>,
    /// Auto-removed widgets that keep failing; never re-fire the hook
    retired: HashMap<String, WidgetErrorRecord>,
    fallbacks: HashMap<FallbackId, Slot>,
    total_failures: u64,
    auto_removed: u64,
}

impl Ledger {
    fn drop_fallbacks_for(&mut self, widget_id: &str) -> usize {
        let before = self.fallbacks.len();
        self.fallbacks.retain(|_, slot| slot.fallback.widget_id != widget_id);
        before - self.fallbacks.len()
    }
}

/// Per-widget failure ledger with escalation, fallbacks and auto-removal
pub struct WidgetFailureHandler {
    config: WidgetConfig,
    ledger: Mutex<Ledger>,
    auto_remove: RwLock<Option<Arc<dyn AutoRemoveHook>>>,
    listener: RwLock<Option<Arc<dyn WidgetFailureListener>>>,
}

impl std::fmt::Debug for WidgetFailureHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.ledger.lock();
        f.debug_struct("WidgetFailureHandler")
            .field("config", &self.config)
            .field("records", &ledger.records.len())
            .field("fallbacks", &ledger.fallbacks.len())
            .finish_non_exhaustive()
    }
}

impl Default for WidgetFailureHandler {
    fn default() -> Self {
        Self::new(WidgetConfig::default())
    }
}

impl WidgetFailureHandler {
    /// Create handler with the given thresholds
    #[must_use]
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            config,
            ledger: Mutex::new(Ledger::default()),
            auto_remove: RwLock::new(None),
            listener: RwLock::new(None),
        }
    }

    /// Active thresholds
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Register the auto-remove hook, replacing any previous one
    pub fn set_auto_remove_callback(&self, hook: impl AutoRemoveHook + 'static) {
        *self.auto_remove.write() = Some(Arc::new(hook));
    }

    /// Register a failure listener, replacing any previous one
    pub fn set_failure_listener(&self, listener: Arc<dyn WidgetFailureListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Record a failure and return the updated record
    ///
    /// Never panics outward; hook panics are contained and logged.
    pub fn handle_widget_error(&self, widget_id: &str, plugin_id: &str, fault: &Fault) -> WidgetErrorRecord {
        let (record, auto_removed) = {
            let mut guard = self.ledger.lock();
            let ledger = &mut *guard;
            ledger.total_failures = ledger.total_failures.saturating_add(1);

            if let Some(retired) = ledger.retired.get_mut(widget_id) {
                self.bump(retired, plugin_id, fault);
                (retired.clone(), false)
            } else {
                let record = match ledger.records.get_mut(widget_id) {
                    Some(existing) => {
                        self.bump(existing, plugin_id, fault);
                        existing.clone()
                    }
                    None => {
                        let fresh = WidgetErrorRecord::first(widget_id, plugin_id, fault);
                        ledger.records.insert(widget_id.to_string(), fresh.clone());
                        fresh
                    }
                };

                let crossed = self.config.auto_remove_after_failures > 0
                    && record.failure_count() == self.config.auto_remove_after_failures;
                if crossed {
                    ledger.records.remove(widget_id);
                    ledger.retired.insert(widget_id.to_string(), record.clone());
                    ledger.drop_fallbacks_for(widget_id);
                    ledger.auto_removed = ledger.auto_removed.saturating_add(1);
                }
                (record, crossed)
            }
        };

        tracing::debug!(
            widget_id = %record.widget_id,
            plugin_id = %record.plugin_id,
            retry_count = record.retry_count,
            severity = %record.severity,
            "widget failure recorded"
        );

        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            if catch_unwind(AssertUnwindSafe(|| listener.on_widget_failure(&record))).is_err() {
                tracing::error!(widget_id = %record.widget_id, "widget failure listener panicked");
            }
        }

        if auto_removed {
            tracing::warn!(
                widget_id = %record.widget_id,
                plugin_id = %record.plugin_id,
                failures = record.failure_count(),
                "widget auto-removed after repeated failures"
            );
            let hook = self.auto_remove.read().clone();
            if let Some(hook) = hook {
                if catch_unwind(AssertUnwindSafe(|| hook.on_auto_remove(&record))).is_err() {
                    tracing::error!(widget_id = %record.widget_id, "auto-remove callback panicked");
                }
            }
        }

        record
    }

    fn bump(&self, record: &mut WidgetErrorRecord, plugin_id: &str, fault: &Fault) {
        record.retry_count = record.retry_count.saturating_add(1);
        record.severity = record
            .severity
            .max(severity_for(record.retry_count, self.config.escalation_threshold));
        record.last_error = fault.clone();
        record.timestamp = Utc::now();
        if record.plugin_id != plugin_id {
            record.plugin_id = plugin_id.to_string();
        }
    }

    /// Whether retry may still be offered for the widget
    ///
    /// Widgets with no record have nothing to retry against and report true.
    #[must_use]
    pub fn can_retry(&self, widget_id: &str) -> bool {
        let ledger = self.ledger.lock();
        ledger
            .records
            .get(widget_id)
            .or_else(|| ledger.retired.get(widget_id))
            .map_or(true, |record| record.retry_count < self.config.max_retries)
    }

    /// Build and retain a fallback for the record
    pub fn create_fallback(&self, record: &WidgetErrorRecord, callbacks: FallbackCallbacks) -> Fallback {
        let retries_left = record.retry_count < self.config.max_retries;
        let fallback = Fallback::build(record, retries_left, callbacks.can_report());

        self.ledger.lock().fallbacks.insert(
            fallback.id,
            Slot {
                fallback: fallback.clone(),
                record: record.clone(),
                callbacks,
            },
        );

        tracing::debug!(
            widget_id = %fallback.widget_id,
            fallback_id = %fallback.id,
            show_retry = fallback.show_retry,
            "fallback created"
        );
        fallback
    }

    /// Dispatch a fallback action to its callback
    ///
    /// Returns whether a callback ran. Unknown fallbacks, unknown action
    /// names and `report` without a report callback are ignored.
    pub fn execute_fallback_action(&self, fallback_id: FallbackId, action: &str) -> bool {
        let Ok(action) = action.parse::<FallbackAction>() else {
            tracing::debug!(%fallback_id, action, "ignoring unknown fallback action");
            return false;
        };

        let (widget_id, record, callbacks) = {
            let ledger = self.ledger.lock();
            let Some(slot) = ledger.fallbacks.get(&fallback_id) else {
                tracing::debug!(%fallback_id, "ignoring action for unknown fallback");
                return false;
            };
            let widget_id = slot.fallback.widget_id.clone();
            let record = ledger
                .records
                .get(&widget_id)
                .or_else(|| ledger.retired.get(&widget_id))
                .unwrap_or(&slot.record)
                .clone();
            (widget_id, record, slot.callbacks.clone())
        };

        let outcome = match action {
            FallbackAction::Retry => {
                catch_unwind(AssertUnwindSafe(|| (callbacks.on_retry)(&widget_id)))
            }
            FallbackAction::Remove => {
                catch_unwind(AssertUnwindSafe(|| (callbacks.on_remove)(&widget_id)))
            }
            FallbackAction::Report => match &callbacks.on_report {
                Some(on_report) => catch_unwind(AssertUnwindSafe(|| on_report(&record))),
                None => return false,
            },
        };

        if outcome.is_err() {
            tracing::error!(%widget_id, action = %action, "fallback action callback panicked");
        }
        true
    }

    /// Forget a widget's failure history
    ///
    /// The next failure starts fresh at LOW. Returns whether a record existed.
    pub fn clear_widget_error(&self, widget_id: &str) -> bool {
        let mut ledger = self.ledger.lock();
        let live = ledger.records.remove(widget_id).is_some();
        let retired = ledger.retired.remove(widget_id).is_some();
        ledger.drop_fallbacks_for(widget_id);
        if live || retired {
            tracing::debug!(%widget_id, "widget error cleared");
        }
        live || retired
    }

    /// Render a retained fallback, or the generic fragment for unknown ids
    #[must_use]
    pub fn render_fallback(&self, fallback_id: FallbackId) -> String {
        self.ledger
            .lock()
            .fallbacks
            .get(&fallback_id)
            .map_or_else(render::render_generic, |slot| render::render(&slot.fallback))
    }

    /// Aggregate counts over the ledger
    #[must_use]
    pub fn error_statistics(&self) -> WidgetStatistics {
        let ledger = self.ledger.lock();
        let mut stats = WidgetStatistics {
            total_errors: ledger.total_failures,
            failed_widgets: ledger.records.len(),
            auto_removed: ledger.auto_removed,
            ..WidgetStatistics::default()
        };

        for record in ledger.records.values() {
            *stats.by_plugin.entry(record.plugin_id.clone()).or_default() += 1;
            *stats.by_severity.entry(record.severity).or_default() += 1;
        }

        stats.most_failing = ledger
            .records
            .values()
            .max_by(|a, b| {
                a.retry_count
                    .cmp(&b.retry_count)
                    .then_with(|| b.widget_id.cmp(&a.widget_id))
            })
            .map(|record| record.widget_id.clone());

        stats
    }

    /// Currently failing widgets of one plugin, ordered by widget id
    #[must_use]
    pub fn failed_widgets_by_plugin(&self, plugin_id: &str) -> Vec<WidgetErrorRecord> {
        let ledger = self.ledger.lock();
        let mut records: Vec<_> = ledger
            .records
            .values()
            .filter(|record| record.plugin_id == plugin_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.widget_id.cmp(&b.widget_id));
        records
    }

    /// Current record for a widget, including auto-removed ones
    #[must_use]
    pub fn record(&self, widget_id: &str) -> Option<WidgetErrorRecord> {
        let ledger = self.ledger.lock();
        ledger
            .records
            .get(widget_id)
            .or_else(|| ledger.retired.get(widget_id))
            .cloned()
    }

    /// Whether the widget was retired by the auto-remove policy
    #[must_use]
    pub fn is_auto_removed(&self, widget_id: &str) -> bool {
        self.ledger.lock().retired.contains_key(widget_id)
    }

    /// Retained fallback by id
    #[must_use]
    pub fn fallback(&self, fallback_id: FallbackId) -> Option<Fallback> {
        self.ledger
            .lock()
            .fallbacks
            .get(&fallback_id)
            .map(|slot| slot.fallback.clone())
    }

    /// Drop every fallback for a widget; returns how many were dropped
    pub fn remove_fallbacks_for(&self, widget_id: &str) -> usize {
        self.ledger.lock().drop_fallbacks_for(widget_id)
    }

    /// Reset all records, fallbacks and counters
    pub fn cleanup(&self) {
        let mut ledger = self.ledger.lock();
        *ledger = Ledger::default();
        tracing::debug!("widget failure ledger cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fault() -> Fault {
        Fault::new("Chart data failed to load")
    }

    fn noop_callbacks() -> FallbackCallbacks {
        FallbackCallbacks::new(|_| {}, |_| {})
    }

    #[test]
    fn five_consecutive_failures() {
        let handler = WidgetFailureHandler::default();
        let removed = Arc::new(AtomicUsize::new(0));
        let on_removed = removed.clone();
        handler.set_auto_remove_callback(move |_: &WidgetErrorRecord| {
            on_removed.fetch_add(1, Ordering::SeqCst);
        });

        let mut severities = Vec::new();
        let mut retryable = Vec::new();
        let mut removed_after = Vec::new();
        for _ in 0..5 {
            let record = handler.handle_widget_error("w1", "p1", &fault());
            severities.push(record.severity);
            retryable.push(handler.can_retry("w1"));
            removed_after.push(removed.load(Ordering::SeqCst));
        }

        assert_eq!(
            severities,
            vec![Severity::Low, Severity::Medium, Severity::Medium, Severity::High, Severity::High]
        );
        assert_eq!(retryable, vec![true, true, true, false, false]);
        assert_eq!(removed_after, vec![0, 0, 0, 0, 1]);
    }

    #[test]
    fn auto_remove_not_refired() {
        let handler = WidgetFailureHandler::default();
        let removed = Arc::new(AtomicUsize::new(0));
        let on_removed = removed.clone();
        handler.set_auto_remove_callback(move |_: &WidgetErrorRecord| {
            on_removed.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..12 {
            handler.handle_widget_error("w1", "p1", &fault());
        }
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert!(handler.is_auto_removed("w1"));
        assert_eq!(handler.record("w1").map(|r| r.retry_count), Some(11));

        handler.clear_widget_error("w1");
        for _ in 0..5 {
            handler.handle_widget_error("w1", "p1", &fault());
        }
        assert_eq!(removed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_starts_fresh() {
        let handler = WidgetFailureHandler::default();
        handler.handle_widget_error("w1", "p1", &fault());
        handler.handle_widget_error("w1", "p1", &fault());
        assert!(handler.clear_widget_error("w1"));
        assert!(!handler.clear_widget_error("w1"));

        let record = handler.handle_widget_error("w1", "p1", &fault());
        assert_eq!(record.retry_count, 0);
        assert_eq!(record.severity, Severity::Low);
    }

    #[test]
    fn unknown_widget_can_retry() {
        assert!(WidgetFailureHandler::default().can_retry("never-failed"));
    }

    #[test]
    fn fallback_actions_dispatch() {
        let handler = WidgetFailureHandler::default();
        let record = handler.handle_widget_error("w1", "p1", &fault());

        let retried = Arc::new(Mutex::new(Vec::new()));
        let reported = Arc::new(AtomicUsize::new(0));
        let on_retry = retried.clone();
        let on_report = reported.clone();
        let callbacks = FallbackCallbacks::new(move |id| on_retry.lock().push(id.to_string()), |_| {})
            .with_report(move |r: &WidgetErrorRecord| {
                assert_eq!(r.widget_id, "w1");
                on_report.fetch_add(1, Ordering::SeqCst);
            });

        let fallback = handler.create_fallback(&record, callbacks);
        assert!(handler.execute_fallback_action(fallback.id, "retry"));
        assert!(handler.execute_fallback_action(fallback.id, "report"));
        assert!(!handler.execute_fallback_action(fallback.id, "explode"));
        assert!(!handler.execute_fallback_action(FallbackId::new(), "retry"));

        assert_eq!(*retried.lock(), vec!["w1".to_string()]);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn report_without_callback_ignored() {
        let handler = WidgetFailureHandler::default();
        let record = handler.handle_widget_error("w1", "p1", &fault());
        let fallback = handler.create_fallback(&record, noop_callbacks());
        assert!(!handler.execute_fallback_action(fallback.id, "report"));
    }

    #[test]
    fn panicking_callback_contained() {
        let handler = WidgetFailureHandler::default();
        let record = handler.handle_widget_error("w1", "p1", &fault());
        let fallback = handler.create_fallback(&record, FallbackCallbacks::new(|_| panic!("boom"), |_| {}));
        assert!(handler.execute_fallback_action(fallback.id, "retry"));
    }

    #[test]
    fn render_roundtrip() {
        let handler = WidgetFailureHandler::default();
        let record = handler.handle_widget_error("w1", "p1", &fault());
        let fallback = handler.create_fallback(&record, noop_callbacks());

        let html = handler.render_fallback(fallback.id);
        assert!(html.contains(render::CONTAINER_MARKER));
        assert!(html.contains("Chart data failed to load"));

        let generic = handler.render_fallback(FallbackId::new());
        assert!(generic.contains(render::GENERIC_MESSAGE));
    }

    #[test]
    fn fallback_dropped_on_clear() {
        let handler = WidgetFailureHandler::default();
        let record = handler.handle_widget_error("w1", "p1", &fault());
        let fallback = handler.create_fallback(&record, noop_callbacks());
        handler.clear_widget_error("w1");
        assert!(handler.fallback(fallback.id).is_none());
    }

    #[test]
    fn statistics_count_cumulative_failures() {
        let handler = WidgetFailureHandler::default();
        for _ in 0..3 {
            handler.handle_widget_error("w1", "p1", &fault());
        }
        handler.handle_widget_error("w2", "p1", &fault());
        handler.handle_widget_error("w3", "p2", &fault());
        handler.clear_widget_error("w3");

        let stats = handler.error_statistics();
        assert_eq!(stats.total_errors, 5);
        assert_eq!(stats.failed_widgets, 2);
        assert_eq!(stats.by_plugin.get("p1"), Some(&2));
        assert_eq!(stats.by_plugin.get("p2"), None);
        assert_eq!(stats.by_severity.get(&Severity::Medium), Some(&1));
        assert_eq!(stats.by_severity.get(&Severity::Low), Some(&1));
        assert_eq!(stats.most_failing.as_deref(), Some("w1"));

        let p1 = handler.failed_widgets_by_plugin("p1");
        assert_eq!(p1.iter().map(|r| r.widget_id.as_str()).collect::<Vec<_>>(), vec!["w1", "w2"]);
    }

    #[test]
    fn cleanup_on_empty_and_full() {
        let handler = WidgetFailureHandler::default();
        handler.cleanup();
        handler.handle_widget_error("w1", "p1", &fault());
        handler.cleanup();
        assert_eq!(handler.error_statistics(), WidgetStatistics::default());
    }

    #[test]
    fn listener_sees_every_failure() {
        let handler = WidgetFailureHandler::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        handler.set_failure_listener(Arc::new(move |_: &WidgetErrorRecord| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        for _ in 0..3 {
            handler.handle_widget_error("w1", "p1", &fault());
        }
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn concurrent_failures_serialized() {
        let handler = Arc::new(WidgetFailureHandler::new(
            WidgetConfig::default().with_auto_remove_after(0),
        ));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handler = handler.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        handler.handle_widget_error("w1", "p1", &fault());
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(handler.record("w1").map(|r| r.retry_count), Some(399));
        assert_eq!(handler.error_statistics().total_errors, 400);
    }

    proptest! {
        #[test]
        fn retry_count_and_severity_monotonic(failures in 1usize..40, threshold in 1u32..6) {
            let handler = WidgetFailureHandler::new(
                WidgetConfig::default().with_escalation_threshold(threshold),
            );
            let mut last = Severity::Low;
            for n in 1..=failures {
                let record = handler.handle_widget_error("w", "p", &fault());
                prop_assert_eq!(record.retry_count as usize, n - 1);
                prop_assert!(record.severity >= last);
                last = record.severity;
            }
        }
    }
}
