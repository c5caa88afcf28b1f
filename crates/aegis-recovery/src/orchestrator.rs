//! Recovery orchestrator
//!
//! Coordinates system-wide reactions to failures:
//! - Safe logging that degrades primary → fallback sink → console
//! - Component and plugin isolation through the host's lifecycle handler
//! - Background restoration retries with backoff
//! - Developer notifications, recurring-fault issues and escalation
//! - The single [`SystemHealthStatus`] value
//!
//! No entry point returns an error or lets a collaborator panic escape.
//! Callers report a failure and move on; slow work (retries, notification
//! delivery) runs on background tasks.

use crate::component::{ComponentFailureHandler, DefaultComponentHandler, FailureDisposition};
use crate::health::{SystemHealthStatus, SystemStatus};
use crate::notify::{
    DeveloperNotifier, Dispatcher, ErrorNotification, EscalationLevel, EscalationNotification,
    Notification, TracingNotifier, TrackingIssue,
};
use crate::retry::{restore_with_backoff, RetryOutcome};
use crate::tracking::{EscalationCheck, Trackers};
use aegis_core::{AegisError, Context, Fault, LogLevel, RecoveryConfig, RetryOptions, Severity};
use aegis_log::{console, BufferedSink, LogSink, StructuredLogger};
use aegis_widget::{WidgetErrorRecord, WidgetFailureListener};
use chrono::Utc;
use dashmap::DashSet;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

const SELF_COMPONENT: &str = "aegis-recovery";

/// Builder for [`RecoveryOrchestrator`]
#[derive(Default)]
pub struct RecoveryOrchestratorBuilder {
    config: RecoveryConfig,
    primary: Option<Arc<dyn LogSink>>,
    fallback: Option<Arc<dyn LogSink>>,
    components: Option<Arc<dyn ComponentFailureHandler>>,
    notifier: Option<Arc<dyn DeveloperNotifier>>,
}

impl RecoveryOrchestratorBuilder {
    /// Recovery thresholds and retry defaults
    #[must_use]
    pub fn config(mut self, config: RecoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Primary log sink; defaults to an in-memory [`StructuredLogger`]
    #[must_use]
    pub fn primary_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.primary = Some(sink);
        self
    }

    /// Fallback log sink; defaults to a [`BufferedSink`]
    #[must_use]
    pub fn fallback_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.fallback = Some(sink);
        self
    }

    /// Host component lifecycle handler
    #[must_use]
    pub fn component_handler(mut self, handler: Arc<dyn ComponentFailureHandler>) -> Self {
        self.components = Some(handler);
        self
    }

    /// Developer notification transport; defaults to tracing output
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn DeveloperNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build on the current tokio runtime
    ///
    /// # Errors
    /// Returns `AegisError::Runtime` when called outside a tokio runtime.
    pub fn build(self) -> Result<RecoveryOrchestrator, AegisError> {
        let runtime = Handle::try_current().map_err(|e| AegisError::Runtime(e.to_string()))?;
        Ok(self.build_on(runtime))
    }

    /// Build on an explicit runtime handle
    #[must_use]
    pub fn build_on(self, runtime: Handle) -> RecoveryOrchestrator {
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let (dispatcher, _task) = Dispatcher::spawn(&runtime, notifier);
        let fallback_capacity = self.config.fallback_buffer_capacity;
        let tracked_capacity = self.config.max_tracked_errors;

        RecoveryOrchestrator {
            inner: Arc::new(Inner {
                config: self.config,
                primary: self
                    .primary
                    .unwrap_or_else(|| Arc::new(StructuredLogger::default())),
                fallback: self
                    .fallback
                    .unwrap_or_else(|| Arc::new(BufferedSink::new(fallback_capacity))),
                components: self
                    .components
                    .unwrap_or_else(|| Arc::new(DefaultComponentHandler::new())),
                health: RwLock::new(SystemHealthStatus::default()),
                isolated: DashSet::new(),
                trackers: Trackers::new(tracked_capacity),
                dispatcher,
                runtime,
            }),
        }
    }
}

struct Inner {
    config: RecoveryConfig,
    primary: Arc<dyn LogSink>,
    fallback: Arc<dyn LogSink>,
    components: Arc<dyn ComponentFailureHandler>,
    health: RwLock<SystemHealthStatus>,
    isolated: DashSet<String>,
    trackers: Trackers,
    dispatcher: Dispatcher,
    runtime: Handle,
}

/// System-wide failure coordinator
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct RecoveryOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RecoveryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryOrchestrator")
            .field("config", &self.inner.config)
            .field("primary", &self.inner.primary.name())
            .field("fallback", &self.inner.fallback.name())
            .field("status", &self.inner.health.read().status)
            .finish_non_exhaustive()
    }
}

impl RecoveryOrchestrator {
    /// Start building an orchestrator
    #[must_use]
    pub fn builder() -> RecoveryOrchestratorBuilder {
        RecoveryOrchestratorBuilder::default()
    }

    /// Orchestrator with default collaborators on the current runtime
    ///
    /// # Errors
    /// Returns `AegisError::Runtime` when called outside a tokio runtime.
    pub fn new(config: RecoveryConfig) -> Result<Self, AegisError> {
        Self::builder().config(config).build()
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RecoveryConfig {
        &self.inner.config
    }

    /// Log without ever failing
    ///
    /// Uses the primary sink unless fallback logging is active. A primary
    /// failure switches to the fallback sink for this and later calls; if the
    /// fallback fails too the line goes to stderr.
    pub fn safe_log(&self, level: LogLevel, message: &str, context: &Context) {
        let inner = &self.inner;
        if !inner.health.read().fallback_logging_active {
            let primary = catch_unwind(AssertUnwindSafe(|| inner.primary.write(level, message, context)));
            let failure = match primary {
                Ok(Ok(())) => return,
                Ok(Err(e)) => Fault::from_error(&e),
                Err(_) => Fault::named("LogSinkPanic", "primary log sink panicked"),
            };
            self.handle_logging_system_failure(&failure);
        }
        self.write_fallback(level, message, context);
    }

    fn write_fallback(&self, level: LogLevel, message: &str, context: &Context) {
        let fallback = catch_unwind(AssertUnwindSafe(|| self.inner.fallback.write(level, message, context)));
        if !matches!(fallback, Ok(Ok(()))) {
            console::write(level, message, context);
        }
    }

    /// Route logging to the fallback sink
    pub fn handle_logging_system_failure(&self, fault: &Fault) {
        let switched = {
            let mut health = self.inner.health.write();
            let was_active = health.fallback_logging_active;
            health.set_fallback_logging(true);
            !was_active
        };

        if switched {
            tracing::warn!(error = %fault, "primary logging failed; switched to fallback sink");
            self.write_fallback(
                LogLevel::Warning,
                &format!("Primary logging system failed: {fault}"),
                &Context::new().with_component(SELF_COMPONENT),
            );
        }
    }

    /// Switch back to the primary sink if it reports healthy
    ///
    /// Returns whether the primary sink is active after the call.
    pub fn check_and_restore_main_logging(&self) -> bool {
        if !self.inner.health.read().fallback_logging_active {
            return true;
        }

        let healthy = catch_unwind(AssertUnwindSafe(|| self.inner.primary.is_healthy())).unwrap_or(false);
        if healthy {
            self.inner.health.write().set_fallback_logging(false);
            tracing::info!(sink = self.inner.primary.name(), "primary logging restored");
            self.safe_log(
                LogLevel::Info,
                "Primary logging system restored",
                &Context::new().with_component(SELF_COMPONENT),
            );
        }
        healthy
    }

    /// React to a failed component
    ///
    /// Logs the failure, applies the host's disposition, marks the component
    /// failed and notifies developers for HIGH and CRITICAL faults.
    pub fn handle_component_failure(
        &self,
        component_id: &str,
        fault: &Fault,
        context: &Context,
    ) -> FailureDisposition {
        let mut context = context.clone();
        if context.component.is_none() {
            context.component = Some(component_id.to_string());
        }
        let level = if context.critical {
            LogLevel::Critical
        } else {
            LogLevel::Error
        };
        self.safe_log(level, &format!("Component {component_id} failed: {fault}"), &context);

        let components = &self.inner.components;
        let disposition = match catch_unwind(AssertUnwindSafe(|| {
            components.handle_component_failure(component_id, fault, &context)
        })) {
            Ok(Ok(disposition)) => disposition,
            Ok(Err(e)) => {
                tracing::warn!(component = component_id, error = %e, "component handler failed");
                FailureDisposition::None
            }
            Err(_) => {
                tracing::error!(component = component_id, "component handler panicked");
                FailureDisposition::None
            }
        };

        // Before any restore task is spawned
        self.inner
            .health
            .write()
            .record_failure(component_id, context.critical);

        match &disposition {
            FailureDisposition::Isolate => {
                self.mark_unhealthy(component_id);
                let replacement =
                    catch_unwind(AssertUnwindSafe(|| components.get_fallback_component(component_id)))
                        .ok()
                        .flatten();
                if let Some(replacement) = replacement {
                    self.safe_log(
                        LogLevel::Info,
                        &format!("Routing {component_id} to fallback component {replacement}"),
                        &context,
                    );
                }
            }
            FailureDisposition::Retry => {
                // Fire and forget; the task reports its own outcome
                drop(self.schedule_component_retry(component_id, fault, self.inner.config.retry));
            }
            FailureDisposition::Fallback(replacement) => {
                self.safe_log(
                    LogLevel::Info,
                    &format!("Routing {component_id} to fallback component {replacement}"),
                    &context,
                );
            }
            FailureDisposition::None => {}
        }

        self.handle_recurring_error(fault, &context);
        if context.critical || context.severity_or_default() >= Severity::High {
            self.notify_developers_of_error(fault, &context);
            self.check_error_escalation(fault, &context);
        }

        disposition
    }

    /// Isolate a failing plugin instead of repairing it in place
    pub fn handle_plugin_failure(&self, plugin_id: &str, fault: &Fault, context: &Context) {
        let mut context = context.clone();
        if context.plugin_id.is_none() {
            context.plugin_id = Some(plugin_id.to_string());
        }

        self.mark_unhealthy(plugin_id);
        let newly_isolated = self.inner.isolated.insert(plugin_id.to_string());
        self.inner
            .health
            .write()
            .record_failure(plugin_id, context.critical);

        if newly_isolated {
            self.safe_log(
                LogLevel::Warning,
                &format!("Plugin {plugin_id} isolated after failure: {fault}"),
                &context,
            );
        }

        self.handle_recurring_error(fault, &context);
        if context.critical || context.severity_or_default() >= Severity::High {
            self.notify_developers_of_error(fault, &context);
        }
    }

    fn mark_unhealthy(&self, component_id: &str) {
        let components = &self.inner.components;
        if catch_unwind(AssertUnwindSafe(|| components.mark_component_unhealthy(component_id))).is_err() {
            tracing::error!(component = component_id, "mark_component_unhealthy panicked");
        }
    }

    /// Whether the plugin is excluded from dispatch
    #[must_use]
    pub fn is_isolated(&self, plugin_id: &str) -> bool {
        self.inner.isolated.contains(plugin_id)
    }

    /// Isolated plugins, sorted
    #[must_use]
    pub fn isolated_plugins(&self) -> Vec<String> {
        let mut plugins: Vec<_> = self.inner.isolated.iter().map(|p| p.key().clone()).collect();
        plugins.sort();
        plugins
    }

    /// Restore a component in the background with backoff
    ///
    /// Returns immediately. On success the component leaves
    /// `failed_components` (and the isolation set); on exhaustion the
    /// failure is logged and the component stays failed.
    pub fn schedule_component_retry(
        &self,
        component_id: &str,
        fault: &Fault,
        options: RetryOptions,
    ) -> JoinHandle<RetryOutcome> {
        let this = self.clone();
        let component_id = component_id.to_string();
        let fault = fault.clone();

        self.inner.runtime.spawn(async move {
            let outcome =
                restore_with_backoff(this.inner.components.as_ref(), &component_id, options).await;
            let context = Context::new().with_component(component_id.clone());

            match outcome {
                RetryOutcome::Restored { attempt } => {
                    this.inner.health.write().record_restored(&component_id);
                    this.inner.isolated.remove(&component_id);
                    this.safe_log(
                        LogLevel::Info,
                        &format!("Component {component_id} restored on attempt {attempt}"),
                        &context,
                    );
                }
                RetryOutcome::Exhausted { attempts } => {
                    this.safe_log(
                        LogLevel::Error,
                        &format!(
                            "Component {component_id} not restored after {attempts} attempts: {fault}"
                        ),
                        &context,
                    );
                }
            }
            outcome
        })
    }

    /// Queue a fault report for developers
    pub fn notify_developers_of_error(&self, fault: &Fault, context: &Context) {
        let severity = if context.critical {
            Severity::Critical
        } else {
            context.severity_or_default()
        };
        self.inner.dispatcher.send(Notification::Error(ErrorNotification {
            error: fault.clone(),
            context: context.clone(),
            severity,
            timestamp: Utc::now(),
            requires_immediate_attention: severity >= Severity::High,
        }));
    }

    /// Count an occurrence; opens a tracking issue once it keeps recurring
    ///
    /// Returns the occurrence count so far.
    pub fn handle_recurring_error(&self, fault: &Fault, context: &Context) -> u32 {
        let config = &self.inner.config;
        let occurrence = self.inner.trackers.record_occurrence(
            fault,
            context,
            config.recurring_error_threshold,
            config.create_issue_for_recurring,
        );
        let tracker = occurrence.snapshot;

        if occurrence.open_issue {
            self.safe_log(
                LogLevel::Warning,
                &format!("Recurring error ({} occurrences): {fault}", tracker.count),
                context,
            );
            self.inner.dispatcher.send(Notification::TrackingIssue(TrackingIssue {
                title: format!("Recurring error: {}", fault.summary()),
                error: fault.clone(),
                occurrences: tracker.count,
                affected_components: tracker.components,
                first_seen: tracker.first_seen,
                last_seen: tracker.last_seen,
            }));
        }
        tracker.count
    }

    /// Raise the escalation level of an unresolved fault once due
    ///
    /// The threshold is `context.escalation_threshold`, else the configured
    /// default. Returns the new level when it was raised by this call.
    pub fn check_error_escalation(&self, fault: &Fault, context: &Context) -> Option<EscalationLevel> {
        let threshold = context
            .escalation_threshold()
            .unwrap_or_else(|| self.inner.config.escalation_threshold());
        let check = self.inner.trackers.check_escalation(fault, context, threshold);
        if !check.raised {
            return None;
        }
        let level = check.level;
        self.dispatch_escalation(fault, check);
        Some(level)
    }

    fn dispatch_escalation(&self, fault: &Fault, check: EscalationCheck) {
        tracing::warn!(
            level = %check.level,
            unresolved_ms = u64::try_from(check.elapsed.as_millis()).unwrap_or(u64::MAX),
            error = %fault,
            "escalating unresolved error"
        );
        self.inner.dispatcher.send(Notification::Escalation(EscalationNotification {
            error: fault.clone(),
            original_context: check.original_context,
            escalation_level: check.level,
            time_unresolved: check.elapsed,
            timestamp: Utc::now(),
        }));
    }

    /// Occurrences of a fault since tracking started or it was resolved
    #[must_use]
    pub fn error_occurrences(&self, fault: &Fault) -> u32 {
        self.inner.trackers.occurrences(fault)
    }

    /// Stop tracking a fault; returns whether it was tracked
    pub fn resolve_error(&self, fault: &Fault) -> bool {
        self.inner.trackers.resolve(fault)
    }

    /// Wait until every notification queued so far was handled
    pub async fn flush_notifications(&self) {
        self.inner.dispatcher.flush().await;
    }

    /// Terminal failure path
    ///
    /// Marks the system critical, forces fallback logging, handles the fault
    /// at component level and escalates straight to the top of the ladder.
    pub fn handle_system_wide_failure(&self, fault: &Fault, context: &Context) {
        {
            let mut health = self.inner.health.write();
            health.set_fallback_logging(true);
            health.raise(SystemStatus::Critical);
            health.critical_systems_operational = false;
            health.recovery_mechanisms_active = true;
        }
        tracing::error!(error = %fault, "system-wide failure");

        let context = context.clone().critical();
        self.safe_log(LogLevel::Critical, &format!("System-wide failure: {fault}"), &context);

        let component = context.origin().unwrap_or("system").to_string();
        self.handle_component_failure(&component, fault, &context);

        let check = self.inner.trackers.force_escalation(fault, &context);
        self.dispatch_escalation(fault, check);
    }

    /// Snapshot of system health; refreshes `last_health_check`
    pub fn get_system_health(&self) -> SystemHealthStatus {
        let mut health = self.inner.health.write();
        health.last_health_check = Utc::now();
        health.clone()
    }
}

impl WidgetFailureListener for RecoveryOrchestrator {
    /// HIGH widget failures are handled as component failures; lower ones
    /// are only logged.
    fn on_widget_failure(&self, record: &WidgetErrorRecord) {
        let context = Context::new()
            .with_plugin(record.plugin_id.clone())
            .with_component(record.widget_id.clone())
            .with_severity(record.severity)
            .with_meta("retryCount", record.retry_count);

        if record.severity >= Severity::High {
            self.handle_component_failure(&record.widget_id, &record.last_error, &context);
        } else {
            self.safe_log(
                LogLevel::Warning,
                &format!("Widget {} failed: {}", record.widget_id, record.last_error),
                &context,
            );
        }
    }
}
