//! Developer notifications
//!
//! Payloads are queued on an unbounded channel and delivered by a background
//! task, so failure-reporting paths never wait on the notification transport.

use aegis_core::{AegisError, Context, Fault, Severity};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Who an unresolved error is escalated to
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    /// Owning developer
    #[default]
    Developer,
    /// Team lead
    TeamLead,
    /// Engineering manager
    Manager,
    /// Executive on call
    Executive,
}

impl EscalationLevel {
    const LADDER: [Self; 4] = [Self::Developer, Self::TeamLead, Self::Manager, Self::Executive];

    /// Level reached after `steps` elapsed thresholds, capped at the top
    #[must_use]
    pub fn after_steps(steps: u64) -> Self {
        let index = usize::try_from(steps).unwrap_or(usize::MAX).min(Self::LADDER.len() - 1);
        Self::LADDER[index]
    }

    /// Lower-case name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::TeamLead => "team_lead",
            Self::Manager => "manager",
            Self::Executive => "executive",
        }
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fault report for developers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotification {
    /// Raw fault
    pub error: Fault,
    /// Caller context
    pub context: Context,
    /// Resolved severity
    pub severity: Severity,
    /// Time of report
    pub timestamp: DateTime<Utc>,
    /// Set for HIGH and CRITICAL faults
    pub requires_immediate_attention: bool,
}

/// An unresolved fault moved up the escalation ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationNotification {
    /// Raw fault
    pub error: Fault,
    /// Context of the first report
    pub original_context: Context,
    /// Level reached
    pub escalation_level: EscalationLevel,
    /// Time since the fault was first seen
    pub time_unresolved: Duration,
    /// Time of escalation
    pub timestamp: DateTime<Utc>,
}

/// Tracking issue opened for a recurring fault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingIssue {
    /// Issue title
    pub title: String,
    /// Raw fault
    pub error: Fault,
    /// Occurrences so far
    pub occurrences: u32,
    /// Components that reported it
    pub affected_components: BTreeSet<String>,
    /// First occurrence
    pub first_seen: DateTime<Utc>,
    /// Latest occurrence
    pub last_seen: DateTime<Utc>,
}

/// Payload delivered to a [`DeveloperNotifier`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Fault report
    Error(ErrorNotification),
    /// Escalation
    Escalation(EscalationNotification),
    /// Recurring-fault issue
    TrackingIssue(TrackingIssue),
}

impl Notification {
    /// Fault the notification is about
    #[must_use]
    pub fn error(&self) -> &Fault {
        match self {
            Self::Error(n) => &n.error,
            Self::Escalation(n) => &n.error,
            Self::TrackingIssue(n) => &n.error,
        }
    }

    /// Payload kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::Escalation(_) => "escalation",
            Self::TrackingIssue(_) => "tracking_issue",
        }
    }
}

/// Outbound developer-notification transport
#[async_trait::async_trait]
pub trait DeveloperNotifier: Send + Sync {
    /// Deliver one notification
    ///
    /// # Errors
    /// Delivery failures are logged by the dispatcher and dropped.
    async fn notify(&self, notification: Notification) -> Result<(), AegisError>;
}

/// Notifier that only emits tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait::async_trait]
impl DeveloperNotifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), AegisError> {
        match &notification {
            Notification::Error(n) => tracing::warn!(
                target: "aegis::notify",
                severity = %n.severity,
                immediate = n.requires_immediate_attention,
                error = %n.error,
                "developer notification"
            ),
            Notification::Escalation(n) => tracing::error!(
                target: "aegis::notify",
                level = %n.escalation_level,
                unresolved_ms = u64::try_from(n.time_unresolved.as_millis()).unwrap_or(u64::MAX),
                error = %n.error,
                "error escalated"
            ),
            Notification::TrackingIssue(n) => tracing::warn!(
                target: "aegis::notify",
                occurrences = n.occurrences,
                title = %n.title,
                "tracking issue opened"
            ),
        }
        Ok(())
    }
}

enum Command {
    Deliver(Notification),
    Flush(oneshot::Sender<()>),
}

/// Queue feeding the background delivery task
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<Command>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deliver(n) => write!(f, "Deliver({})", n.kind()),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl Dispatcher {
    /// Start the delivery task on `runtime`
    pub(crate) fn spawn(
        runtime: &tokio::runtime::Handle,
        notifier: Arc<dyn DeveloperNotifier>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(deliver_loop(notifier, rx));
        (Self { tx }, task)
    }

    /// Queue a notification; never blocks
    pub(crate) fn send(&self, notification: Notification) {
        if let Err(e) = self.tx.send(Command::Deliver(notification)) {
            tracing::warn!(command = ?e.0, "notification dispatcher stopped; dropping");
        }
    }

    /// Resolve once everything queued before this call was handled
    pub(crate) async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn deliver_loop(notifier: Arc<dyn DeveloperNotifier>, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Deliver(notification) => {
                let kind = notification.kind();
                match AssertUnwindSafe(notifier.notify(notification)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(kind, error = %e, "developer notification failed"),
                    Err(_) => tracing::error!(kind, "developer notifier panicked"),
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Notification>>);

    #[async_trait::async_trait]
    impl DeveloperNotifier for Collect {
        async fn notify(&self, notification: Notification) -> Result<(), AegisError> {
            if notification.error().message == "refuse" {
                return Err(AegisError::Notification("transport down".into()));
            }
            if notification.error().message == "panic" {
                panic!("notifier bug");
            }
            self.0.lock().push(notification);
            Ok(())
        }
    }

    fn error_notification(message: &str) -> Notification {
        Notification::Error(ErrorNotification {
            error: Fault::new(message),
            context: Context::new(),
            severity: Severity::High,
            timestamp: Utc::now(),
            requires_immediate_attention: true,
        })
    }

    #[test]
    fn ladder_caps_at_executive() {
        assert_eq!(EscalationLevel::after_steps(0), EscalationLevel::Developer);
        assert_eq!(EscalationLevel::after_steps(2), EscalationLevel::Manager);
        assert_eq!(EscalationLevel::after_steps(40), EscalationLevel::Executive);
    }

    #[tokio::test]
    async fn dispatcher_survives_failing_notifier() {
        let collect = Arc::new(Collect::default());
        let (dispatcher, _task) = Dispatcher::spawn(&tokio::runtime::Handle::current(), collect.clone());

        dispatcher.send(error_notification("refuse"));
        dispatcher.send(error_notification("panic"));
        dispatcher.send(error_notification("delivered"));
        dispatcher.flush().await;

        let seen = collect.0.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].error().message, "delivered");
    }

    #[test]
    fn notification_tagged_by_kind() {
        let json = serde_json::to_value(error_notification("x")).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["requiresImmediateAttention"], true);
    }
}
