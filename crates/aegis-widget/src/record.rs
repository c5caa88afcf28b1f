//! Widget failure records

use aegis_core::{Fault, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Failure ledger entry for one currently-failing widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetErrorRecord {
    /// Widget identifier
    pub widget_id: String,
    /// Owning plugin
    pub plugin_id: String,
    /// Most recent fault
    pub last_error: Fault,
    /// Current severity (LOW, MEDIUM or HIGH)
    pub severity: Severity,
    /// Failures recorded since creation or last clear, minus one
    pub retry_count: u32,
    /// Time of the most recent failure
    pub timestamp: DateTime<Utc>,
    /// Time of the first failure
    pub first_failure: DateTime<Utc>,
}

impl WidgetErrorRecord {
    pub(crate) fn first(widget_id: &str, plugin_id: &str, fault: &Fault) -> Self {
        let now = Utc::now();
        Self {
            widget_id: widget_id.to_string(),
            plugin_id: plugin_id.to_string(),
            last_error: fault.clone(),
            severity: Severity::Low,
            retry_count: 0,
            timestamp: now,
            first_failure: now,
        }
    }

    /// Number of failures this record has seen (1-based)
    #[inline]
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }
}

/// Severity for a given retry count
///
/// LOW on the first failure, MEDIUM from the first retry, HIGH once the
/// retry count passes `escalation_threshold`.
#[inline]
#[must_use]
pub fn severity_for(retry_count: u32, escalation_threshold: u32) -> Severity {
    if retry_count > escalation_threshold {
        Severity::High
    } else if retry_count >= 1 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
