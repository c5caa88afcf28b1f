//! Log search queries
//!
//! All populated fields must match (logical AND); empty fields impose no
//! constraint.

use crate::entry::LogEntry;
use aegis_core::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search filter over stored entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogQuery {
    /// Exact level
    pub level: Option<LogLevel>,
    /// Exact user id
    pub user_id: Option<String>,
    /// Exact plugin id
    pub plugin_id: Option<String>,
    /// Component name, or a prefix of the plugin id
    pub component: Option<String>,
    /// Inclusive lower time bound
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper time bound
    pub end: Option<DateTime<Utc>>,
    /// Case-insensitive message substring
    pub message_contains: Option<String>,
}

impl LogQuery {
    /// Create empty query (matches everything)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With level
    #[inline]
    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// With user id
    #[inline]
    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// With plugin id
    #[inline]
    #[must_use]
    pub fn plugin(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    /// With component
    #[inline]
    #[must_use]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// With time range
    #[inline]
    #[must_use]
    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// With message substring
    #[inline]
    #[must_use]
    pub fn containing(mut self, text: impl Into<String>) -> Self {
        self.message_contains = Some(text.into());
        self
    }

    /// Check entry against every populated field
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        let ctx = &entry.context;

        if self.level.is_some_and(|level| level != entry.level) {
            return false;
        }
        if let Some(user) = &self.user_id {
            if ctx.user_id.as_deref() != Some(user.as_str()) {
                return false;
            }
        }
        if let Some(plugin) = &self.plugin_id {
            if ctx.plugin_id.as_deref() != Some(plugin.as_str()) {
                return false;
            }
        }
        if let Some(component) = &self.component {
            let by_component = ctx.component.as_deref() == Some(component.as_str());
            let by_plugin_prefix = ctx
                .plugin_id
                .as_deref()
                .is_some_and(|p| p.starts_with(component.as_str()));
            if !by_component && !by_plugin_prefix {
                return false;
            }
        }
        if self.start.is_some_and(|start| entry.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| entry.timestamp > end) {
            return false;
        }
        if let Some(needle) = &self.message_contains {
            if !entry
                .message
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogRecord;
    use aegis_core::{Context, EntryId};
    use chrono::Duration;

    fn entry(level: LogLevel, message: &str, ctx: Context) -> LogEntry {
        LogRecord::new(level, message, ctx).stamp(EntryId(1), Utc::now())
    }

    #[test]
    fn empty_query_matches_all() {
        let e = entry(LogLevel::Debug, "x", Context::new());
        assert!(LogQuery::new().matches(&e));
    }

    #[test]
    fn fields_combine_with_and() {
        let e = entry(
            LogLevel::Error,
            "Connection refused by upstream",
            Context::new().with_user("u1").with_plugin("weather"),
        );

        assert!(LogQuery::new().level(LogLevel::Error).user("u1").matches(&e));
        assert!(!LogQuery::new().level(LogLevel::Error).user("u2").matches(&e));
        assert!(!LogQuery::new().level(LogLevel::Info).user("u1").matches(&e));
        assert!(LogQuery::new().plugin("weather").containing("REFUSED").matches(&e));
    }

    #[test]
    fn component_matches_name_or_plugin_prefix() {
        let by_component = entry(LogLevel::Info, "a", Context::new().with_component("chart"));
        let by_plugin = entry(LogLevel::Info, "b", Context::new().with_plugin("chart-pro"));
        let neither = entry(LogLevel::Info, "c", Context::new().with_plugin("weather"));

        let q = LogQuery::new().component("chart");
        assert!(q.matches(&by_component));
        assert!(q.matches(&by_plugin));
        assert!(!q.matches(&neither));
    }

    #[test]
    fn date_range_inclusive() {
        let e = entry(LogLevel::Info, "a", Context::new());
        let q = LogQuery::new().between(e.timestamp, e.timestamp);
        assert!(q.matches(&e));

        let later = e.timestamp + Duration::seconds(1);
        assert!(!LogQuery::new().between(later, later + Duration::seconds(1)).matches(&e));
    }
}
