//! Fallback UI artifacts
//!
//! A [`Fallback`] is the degraded-but-functional stand-in shown where a
//! failed widget used to render. Its actions dispatch to host callbacks.

use crate::record::WidgetErrorRecord;
use aegis_core::{FallbackId, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Action offered by a fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackAction {
    /// Re-render the widget
    Retry,
    /// Remove the widget from the dashboard
    Remove,
    /// Send a failure report
    Report,
}

impl FallbackAction {
    /// Action marker name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Remove => "remove",
            Self::Report => "report",
        }
    }

    /// Button label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Retry => "Retry",
            Self::Remove => "Remove widget",
            Self::Report => "Report problem",
        }
    }
}

impl fmt::Display for FallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FallbackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retry" => Ok(Self::Retry),
            "remove" => Ok(Self::Remove),
            "report" => Ok(Self::Report),
            other => Err(format!("unknown fallback action: {other}")),
        }
    }
}

/// Callback taking the widget id
pub type WidgetCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback taking the failure record
pub type ReportCallback = Arc<dyn Fn(&WidgetErrorRecord) + Send + Sync>;

/// Host callbacks wired to a fallback's actions
#[derive(Clone)]
pub struct FallbackCallbacks {
    pub(crate) on_retry: WidgetCallback,
    pub(crate) on_remove: WidgetCallback,
    pub(crate) on_report: Option<ReportCallback>,
}

impl FallbackCallbacks {
    /// Create with retry and remove callbacks
    pub fn new(
        on_retry: impl Fn(&str) + Send + Sync + 'static,
        on_remove: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_retry: Arc::new(on_retry),
            on_remove: Arc::new(on_remove),
            on_report: None,
        }
    }

    /// With report callback; adds the report action to fallbacks
    #[must_use]
    pub fn with_report(mut self, on_report: impl Fn(&WidgetErrorRecord) + Send + Sync + 'static) -> Self {
        self.on_report = Some(Arc::new(on_report));
        self
    }

    /// Whether a report callback was supplied
    #[inline]
    #[must_use]
    pub fn can_report(&self) -> bool {
        self.on_report.is_some()
    }
}

impl fmt::Debug for FallbackCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackCallbacks")
            .field("on_report", &self.on_report.is_some())
            .finish_non_exhaustive()
    }
}

/// UI fallback derived from a failure record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fallback {
    /// Unique per creation call
    pub id: FallbackId,
    /// Widget it stands in for
    pub widget_id: String,
    /// Severity-aware message
    pub content: String,
    /// Original fault text
    pub error_message: String,
    /// Severity at creation
    pub severity: Severity,
    /// Whether retry should be offered
    pub show_retry: bool,
    /// Whether remove should be offered
    pub show_remove: bool,
    /// Available actions
    pub actions: SmallVec<[FallbackAction; 3]>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Message shown in a fallback for the given severity
#[must_use]
pub fn content_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "This widget failed to load.",
        Severity::Medium => "This widget is having trouble loading. Retrying may help.",
        Severity::High | Severity::Critical => {
            "This widget encountered a critical error and has been disabled."
        }
    }
}

impl Fallback {
    pub(crate) fn build(record: &WidgetErrorRecord, retries_left: bool, can_report: bool) -> Self {
        let mut actions: SmallVec<[FallbackAction; 3]> =
            SmallVec::from_slice(&[FallbackAction::Retry, FallbackAction::Remove]);
        if can_report {
            actions.push(FallbackAction::Report);
        }

        Self {
            id: FallbackId::new(),
            widget_id: record.widget_id.clone(),
            content: content_for(record.severity).to_string(),
            error_message: record.last_error.message.clone(),
            severity: record.severity,
            show_retry: retries_left && record.severity < Severity::High,
            show_remove: true,
            actions,
            created_at: Utc::now(),
        }
    }

    /// Whether the fallback offers the action
    #[inline]
    #[must_use]
    pub fn has_action(&self, action: FallbackAction) -> bool {
        self.actions.contains(&action)
    }
}
