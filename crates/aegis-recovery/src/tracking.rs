//! Recurring-fault and escalation bookkeeping
//!
//! Faults are keyed by their summary text, so the same failure reported by
//! different components lands on one tracker. Both tables are bounded: once
//! full, the least recently seen fault is forgotten.

use crate::notify::EscalationLevel;
use aegis_core::{Context, Fault};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

/// Tracker key for a fault
#[must_use]
pub(crate) fn fault_key(fault: &Fault) -> String {
    fault.summary()
}

#[derive(Debug, Clone)]
pub(crate) struct Recurrence {
    pub(crate) count: u32,
    pub(crate) components: BTreeSet<String>,
    pub(crate) first_seen: DateTime<Utc>,
    pub(crate) last_seen: DateTime<Utc>,
    pub(crate) issue_opened: bool,
}

/// Outcome of recording one occurrence
#[derive(Debug, Clone)]
pub(crate) struct Occurrence {
    pub(crate) snapshot: Recurrence,
    /// True exactly once per tracker, when the threshold is first reached
    pub(crate) open_issue: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Unresolved {
    first_seen: Instant,
    level: EscalationLevel,
    original_context: Context,
}

/// Result of an escalation check
#[derive(Debug, Clone)]
pub(crate) struct EscalationCheck {
    pub(crate) level: EscalationLevel,
    pub(crate) raised: bool,
    pub(crate) elapsed: Duration,
    pub(crate) original_context: Context,
}

/// Keyed table ordered by last access; the front is evicted first
#[derive(Debug)]
struct Recency<V> {
    entries: IndexMap<String, V>,
    capacity: usize,
}

impl<V> Recency<V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Fetch or create `key`, moving it to the most-recent end
    fn touch(&mut self, key: String, init: impl FnOnce() -> V) -> &mut V {
        let value = self.entries.shift_remove(&key).unwrap_or_else(init);
        while self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                tracing::debug!(fault = %evicted, "forgetting least recently seen fault");
            }
        }
        let (index, _) = self.entries.insert_full(key, value);
        &mut self.entries[index]
    }
}

#[derive(Debug)]
pub(crate) struct Trackers {
    recurring: Mutex<Recency<Recurrence>>,
    unresolved: Mutex<Recency<Unresolved>>,
}

impl Trackers {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            recurring: Mutex::new(Recency::new(capacity)),
            unresolved: Mutex::new(Recency::new(capacity)),
        }
    }

    /// Faults currently tracked for recurrence
    pub(crate) fn tracked(&self) -> usize {
        self.recurring.lock().entries.len()
    }

    pub(crate) fn record_occurrence(
        &self,
        fault: &Fault,
        context: &Context,
        threshold: u32,
        open_issues: bool,
    ) -> Occurrence {
        let now = Utc::now();
        let mut recurring = self.recurring.lock();
        let tracker = recurring.touch(fault_key(fault), || Recurrence {
            count: 0,
            components: BTreeSet::new(),
            first_seen: now,
            last_seen: now,
            issue_opened: false,
        });

        tracker.count = tracker.count.saturating_add(1);
        tracker.last_seen = now;
        if let Some(origin) = context.origin() {
            tracker.components.insert(origin.to_string());
        }

        let open_issue = open_issues && !tracker.issue_opened && tracker.count >= threshold;
        if open_issue {
            tracker.issue_opened = true;
        }

        Occurrence {
            snapshot: tracker.clone(),
            open_issue,
        }
    }

    pub(crate) fn occurrences(&self, fault: &Fault) -> u32 {
        self.recurring
            .lock()
            .entries
            .get(&fault_key(fault))
            .map_or(0, |t| t.count)
    }

    /// Start tracking if new; raise the level by elapsed thresholds
    pub(crate) fn check_escalation(&self, fault: &Fault, context: &Context, threshold: Duration) -> EscalationCheck {
        let now = Instant::now();
        let mut unresolved = self.unresolved.lock();
        let tracker = unresolved.touch(fault_key(fault), || Unresolved {
            first_seen: now,
            level: EscalationLevel::Developer,
            original_context: context.clone(),
        });

        let elapsed = now.saturating_duration_since(tracker.first_seen);
        let steps = if threshold.is_zero() {
            u64::MAX
        } else {
            u64::try_from(elapsed.as_nanos() / threshold.as_nanos()).unwrap_or(u64::MAX)
        };

        let target = EscalationLevel::after_steps(steps);
        let raised = target > tracker.level;
        if raised {
            tracker.level = target;
        }

        EscalationCheck {
            level: tracker.level,
            raised,
            elapsed,
            original_context: tracker.original_context.clone(),
        }
    }

    /// Jump straight to the top of the ladder
    pub(crate) fn force_escalation(&self, fault: &Fault, context: &Context) -> EscalationCheck {
        let now = Instant::now();
        let mut unresolved = self.unresolved.lock();
        let tracker = unresolved.touch(fault_key(fault), || Unresolved {
            first_seen: now,
            level: EscalationLevel::Developer,
            original_context: context.clone(),
        });
        let raised = tracker.level < EscalationLevel::Executive;
        tracker.level = EscalationLevel::Executive;

        EscalationCheck {
            level: tracker.level,
            raised,
            elapsed: now.saturating_duration_since(tracker.first_seen),
            original_context: tracker.original_context.clone(),
        }
    }

    pub(crate) fn resolve(&self, fault: &Fault) -> bool {
        let key = fault_key(fault);
        let recurring = self.recurring.lock().entries.shift_remove(&key).is_some();
        let unresolved = self.unresolved.lock().entries.shift_remove(&key).is_some();
        recurring || unresolved
    }
}
