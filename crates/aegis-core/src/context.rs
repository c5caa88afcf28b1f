//! Structured fault context
//!
//! Callers describe where a fault happened and how urgent it is. Known keys
//! map onto typed fields; anything else is kept verbatim in `metadata` so
//! hosts can attach their own fields without losing them.

use crate::types::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Context attached to a log call or fault report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// User that triggered the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Plugin that owns the failing code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,
    /// Component, widget or service identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Operation being performed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Reported urgency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Failure affects a critical system
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub critical: bool,
    /// Message will be shown to an end user
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub user_facing: bool,
    /// Unresolved time after which the fault escalates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_threshold_ms: Option<u64>,
    /// Free-form fields, including any unknown keys
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl Context {
    /// Create empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With user ID
    #[inline]
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// With plugin ID
    #[inline]
    #[must_use]
    pub fn with_plugin(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    /// With component
    #[inline]
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// With action
    #[inline]
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// With severity
    #[inline]
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Mark as affecting a critical system
    #[inline]
    #[must_use]
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Mark as shown to an end user
    #[inline]
    #[must_use]
    pub fn user_facing(mut self) -> Self {
        self.user_facing = true;
        self
    }

    /// With escalation threshold
    #[inline]
    #[must_use]
    pub fn with_escalation_threshold(mut self, threshold: Duration) -> Self {
        self.escalation_threshold_ms = Some(u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Add a metadata field
    #[inline]
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Identifier the fault is attributed to: plugin if present, else component
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.plugin_id.as_deref().or(self.component.as_deref())
    }

    /// Escalation threshold as a duration
    #[inline]
    #[must_use]
    pub fn escalation_threshold(&self) -> Option<Duration> {
        self.escalation_threshold_ms.map(Duration::from_millis)
    }

    /// Severity, defaulting to `Low` when unreported
    #[inline]
    #[must_use]
    pub fn severity_or_default(&self) -> Severity {
        self.severity.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn origin_prefers_plugin() {
        let ctx = Context::new().with_component("card");
        assert_eq!(ctx.origin(), Some("card"));

        let ctx = ctx.with_plugin("weather");
        assert_eq!(ctx.origin(), Some("weather"));

        assert_eq!(Context::new().origin(), None);
    }

    #[test]
    fn unknown_fields_preserved_in_metadata() {
        let ctx: Context = serde_json::from_value(json!({
            "pluginId": "p1",
            "severity": "high",
            "critical": true,
            "requestId": "abc-123",
            "attempt": 2
        }))
        .unwrap();

        assert_eq!(ctx.plugin_id.as_deref(), Some("p1"));
        assert_eq!(ctx.severity, Some(Severity::High));
        assert!(ctx.critical);
        assert_eq!(ctx.metadata.get("requestId"), Some(&json!("abc-123")));
        assert_eq!(ctx.metadata.get("attempt"), Some(&json!(2)));

        let back = serde_json::to_value(&ctx).unwrap();
        assert_eq!(back["requestId"], json!("abc-123"));
    }

    #[test]
    fn escalation_threshold_roundtrip() {
        let ctx = Context::new().with_escalation_threshold(Duration::from_secs(90));
        assert_eq!(ctx.escalation_threshold_ms, Some(90_000));
        assert_eq!(ctx.escalation_threshold(), Some(Duration::from_secs(90)));
    }
}
