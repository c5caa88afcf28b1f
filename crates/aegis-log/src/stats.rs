//! Error statistics and aggregation
//!
//! Both views are derived on demand from a store snapshot; nothing here
//! holds state of its own.

use crate::entry::LogEntry;
use aegis_core::LogLevel;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bucket for entries with neither plugin id nor component
pub const UNKNOWN_COMPONENT: &str = "unknown";

/// Fallback error type when a message carries no leading identifier
pub const DEFAULT_ERROR_TYPE: &str = "Error";

const RECENT_ERRORS: usize = 10;

static ERROR_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_$][A-Za-z0-9_$.]*)\s*:").expect("static pattern compiles")
});

/// Error type of a message: the identifier before the first colon
///
/// `"TypeError: x is undefined"` yields `TypeError`; messages without a
/// leading `Identifier:` yield `Error`.
#[must_use]
pub fn error_type_of(message: &str) -> &str {
    ERROR_TYPE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map_or(DEFAULT_ERROR_TYPE, |m| m.as_str())
}

/// Counts over ERROR and CRITICAL entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStatistics {
    /// Number of error entries currently stored
    pub total_errors: usize,
    /// Count per leading error type
    pub by_type: BTreeMap<String, usize>,
    /// Count per plugin id, else component
    pub by_component: BTreeMap<String, usize>,
    /// Count per level (ERROR, CRITICAL)
    pub by_level: BTreeMap<LogLevel, usize>,
    /// Most recent error entries, newest last
    pub recent_errors: Vec<LogEntry>,
}

impl ErrorStatistics {
    /// Compute statistics from entries in insertion order
    #[must_use]
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let mut stats = Self::default();
        let errors: Vec<&LogEntry> = entries.iter().filter(|e| e.level.is_error()).collect();

        for entry in &errors {
            stats.total_errors += 1;
            *stats
                .by_type
                .entry(error_type_of(&entry.message).to_string())
                .or_default() += 1;
            *stats
                .by_component
                .entry(entry.origin().unwrap_or(UNKNOWN_COMPONENT).to_string())
                .or_default() += 1;
            *stats.by_level.entry(entry.level).or_default() += 1;
        }

        let skip = errors.len().saturating_sub(RECENT_ERRORS);
        stats.recent_errors = errors.into_iter().skip(skip).cloned().collect();
        stats
    }
}

/// Error entries grouped by identical message text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedError {
    /// Shared message text
    pub message: String,
    /// Number of entries
    pub count: usize,
    /// Distinct plugin ids / components that produced it, sorted
    pub affected_components: BTreeSet<String>,
    /// Most severe level seen
    pub level: LogLevel,
    /// First occurrence
    pub first_seen: DateTime<Utc>,
    /// Last occurrence
    pub last_seen: DateTime<Utc>,
}

/// Group ERROR/CRITICAL entries by exact message
///
/// Result is ordered by descending count; ties keep first-occurrence order.
#[must_use]
pub fn aggregate_errors(entries: &[LogEntry]) -> Vec<AggregatedError> {
    let mut groups: IndexMap<&str, AggregatedError> = IndexMap::new();

    for entry in entries.iter().filter(|e| e.level.is_error()) {
        let group = groups
            .entry(entry.message.as_str())
            .or_insert_with(|| AggregatedError {
                message: entry.message.clone(),
                count: 0,
                affected_components: BTreeSet::new(),
                level: entry.level,
                first_seen: entry.timestamp,
                last_seen: entry.timestamp,
            });

        group.count += 1;
        group.level = group.level.max(entry.level);
        group.last_seen = entry.timestamp;
        if let Some(origin) = entry.origin() {
            group.affected_components.insert(origin.to_string());
        }
    }

    let mut aggregated: Vec<AggregatedError> = groups.into_values().collect();
    aggregated.sort_by(|a, b| b.count.cmp(&a.count));
    aggregated
}
