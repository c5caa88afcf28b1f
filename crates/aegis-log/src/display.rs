//! User-facing error translation
//!
//! Maps raw faults onto a fixed vocabulary of sanitized messages and
//! recovery actions. The message shown to users is always one of the
//! canned texts below; raw fault text, type names, stack frames and line
//! numbers never reach it. CRITICAL faults are additionally pushed to the
//! registered admin notifier.

use crate::category::ErrorCategory;
use crate::logger::StructuredLogger;
use aegis_core::{Context, Fault, Severity};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// What a recovery action does when the user picks it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Repeat the failed operation
    Retry,
    /// Check network connectivity
    CheckConnection,
    /// Sign in again
    SignIn,
    /// Ask an administrator for access
    ContactAdmin,
    /// Correct the submitted input
    ReviewInput,
    /// Reload the view
    Reload,
    /// Hide the message
    Dismiss,
    /// Contact support
    ContactSupport,
}

/// A recovery action offered to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryAction {
    /// Action kind
    pub kind: ActionKind,
    /// Button label
    pub label: String,
}

impl RecoveryAction {
    fn new(kind: ActionKind, label: &str) -> Self {
        Self {
            kind,
            label: label.to_string(),
        }
    }
}

/// Sanitized error as delivered to the display callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    /// Canned, user-safe message
    pub message: String,
    /// Recovery actions, most useful first
    pub actions: Vec<RecoveryAction>,
    /// Resolved severity
    pub severity: Severity,
    /// Matched category
    pub category: ErrorCategory,
    /// Raw fault summary; omitted when the context is user-facing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Payload pushed to the admin notifier for CRITICAL faults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminNotification {
    /// Raw fault
    pub error: Fault,
    /// Caller context
    pub context: Context,
    /// Resolved severity
    pub severity: Severity,
    /// Time of translation
    pub timestamp: DateTime<Utc>,
    /// Always true for payloads sent by the pipeline
    pub requires_immediate_attention: bool,
}

/// Receives sanitized errors for display
pub trait UserErrorDisplay: Send + Sync {
    /// Show an error to the user
    fn display(&self, error: &UserError);
}

impl<F> UserErrorDisplay for F
where
    F: Fn(&UserError) + Send + Sync,
{
    fn display(&self, error: &UserError) {
        self(error);
    }
}

/// Receives CRITICAL fault notifications
pub trait AdminNotifier: Send + Sync {
    /// Notify administrators
    fn notify(&self, notification: &AdminNotification);
}

impl<F> AdminNotifier for F
where
    F: Fn(&AdminNotification) + Send + Sync,
{
    fn notify(&self, notification: &AdminNotification) {
        self(notification);
    }
}

/// Error display pipeline attached to a structured logger
pub struct ErrorDisplayPipeline {
    logger: Arc<StructuredLogger>,
    display: RwLock<Option<Arc<dyn UserErrorDisplay>>>,
    admin: RwLock<Option<Arc<dyn AdminNotifier>>>,
}

impl std::fmt::Debug for ErrorDisplayPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorDisplayPipeline")
            .field("display", &self.display.read().is_some())
            .field("admin", &self.admin.read().is_some())
            .finish_non_exhaustive()
    }
}

impl ErrorDisplayPipeline {
    /// Attach pipeline to a logger
    #[must_use]
    pub fn new(logger: Arc<StructuredLogger>) -> Self {
        Self {
            logger,
            display: RwLock::new(None),
            admin: RwLock::new(None),
        }
    }

    /// Register the user display callback, replacing any previous one
    pub fn set_user_error_display_callback(&self, callback: impl UserErrorDisplay + 'static) {
        *self.display.write() = Some(Arc::new(callback));
    }

    /// Register the admin notification callback, replacing any previous one
    pub fn set_admin_notification_callback(&self, callback: impl AdminNotifier + 'static) {
        *self.admin.write() = Some(Arc::new(callback));
    }

    /// Translate, log and dispatch a fault
    ///
    /// Never fails; callback panics are contained and logged.
    pub fn handle_error(&self, fault: &Fault, context: &Context) -> UserError {
        let category = ErrorCategory::classify(fault);
        let severity = context
            .severity
            .unwrap_or_else(|| category.default_severity());

        let log_ctx = context.clone().with_meta("category", category.as_str());
        match severity {
            Severity::Low => {
                self.logger.log_warning(fault.summary(), log_ctx);
            }
            Severity::Medium | Severity::High => {
                self.logger.log_error(fault, log_ctx);
            }
            Severity::Critical => {
                self.logger.log_critical(fault, log_ctx);
            }
        }

        let user_error = translate(fault, category, severity, context.user_facing);

        let display = self.display.read().clone();
        if let Some(display) = display {
            if catch_unwind(AssertUnwindSafe(|| display.display(&user_error))).is_err() {
                tracing::error!(category = %category, "user error display callback panicked");
            }
        }

        if severity == Severity::Critical {
            let admin = self.admin.read().clone();
            if let Some(admin) = admin {
                let notification = AdminNotification {
                    error: fault.clone(),
                    context: context.clone(),
                    severity,
                    timestamp: Utc::now(),
                    requires_immediate_attention: true,
                };
                if catch_unwind(AssertUnwindSafe(|| admin.notify(&notification))).is_err() {
                    tracing::error!(category = %category, "admin notification callback panicked");
                }
            } else {
                tracing::warn!(category = %category, "critical fault with no admin notifier registered");
            }
        }

        user_error
    }
}

fn translate(fault: &Fault, category: ErrorCategory, severity: Severity, user_facing: bool) -> UserError {
    use ActionKind::{
        CheckConnection, ContactAdmin, ContactSupport, Dismiss, Reload, Retry, ReviewInput, SignIn,
    };

    let (message, actions) = match category {
        ErrorCategory::Network => (
            "We couldn't reach the server. Check your connection and try again.",
            vec![
                RecoveryAction::new(Retry, "Try again"),
                RecoveryAction::new(CheckConnection, "Check connection"),
            ],
        ),
        ErrorCategory::Permission => (
            "You don't have permission to do that, or your session has expired.",
            vec![
                RecoveryAction::new(SignIn, "Sign in again"),
                RecoveryAction::new(ContactAdmin, "Request access"),
            ],
        ),
        ErrorCategory::Validation => (
            "Some of the information provided isn't valid. Please review it and try again.",
            vec![RecoveryAction::new(ReviewInput, "Review input")],
        ),
        ErrorCategory::Rendering => (
            "Part of this page failed to display.",
            vec![
                RecoveryAction::new(Reload, "Reload"),
                RecoveryAction::new(Dismiss, "Dismiss"),
            ],
        ),
        ErrorCategory::Unknown => (
            "Something went wrong. Please try again.",
            vec![
                RecoveryAction::new(Retry, "Try again"),
                RecoveryAction::new(ContactSupport, "Contact support"),
            ],
        ),
    };

    UserError {
        message: message.to_string(),
        actions,
        severity,
        category,
        detail: (!user_facing).then(|| fault.summary()),
    }
}
