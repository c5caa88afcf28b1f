//! Bounded log storage
//!
//! Stores are the single mutual-exclusion point for log entries: id
//! assignment, append and eviction all happen under one write lock, so
//! entries never interleave out of id order and no eviction is lost.

use crate::entry::{LogEntry, LogRecord};
use aegis_core::{AegisError, EntryId};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::fmt::Debug;

/// Backing store for the structured logger
pub trait LogStore: Send + Sync + Debug {
    /// Stamp and append a record, evicting the oldest entry when full
    ///
    /// # Errors
    /// Returns `AegisError::StoreWrite` if the store cannot accept the entry
    fn append(&self, record: LogRecord) -> Result<LogEntry, AegisError>;

    /// Consistent snapshot of all entries in insertion order
    fn entries(&self) -> Vec<LogEntry>;

    /// Number of stored entries
    fn len(&self) -> usize;

    /// Whether the store is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all entries
    fn clear(&self);

    /// Probe whether the store can currently accept writes
    ///
    /// # Errors
    /// Returns the failure the next write would hit
    fn health_check(&self) -> Result<(), AegisError> {
        Ok(())
    }
}

#[derive(Debug)]
struct Ledger {
    next_id: u64,
    entries: VecDeque<LogEntry>,
    evicted: u64,
}

/// In-memory FIFO ring of the most recent entries
#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    inner: RwLock<Ledger>,
}

impl MemoryStore {
    /// Create store holding at most `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: RwLock::new(Ledger {
                next_id: 1,
                entries: VecDeque::with_capacity(capacity.min(4096)),
                evicted: 0,
            }),
        }
    }

    /// Maximum number of retained entries
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries evicted since creation
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.inner.read().evicted
    }
}

impl LogStore for MemoryStore {
    fn append(&self, record: LogRecord) -> Result<LogEntry, AegisError> {
        let mut guard = self.inner.write();

        while guard.entries.len() >= self.capacity {
            guard.entries.pop_front();
            guard.evicted += 1;
        }

        let id = EntryId(guard.next_id);
        guard.next_id += 1;

        let entry = record.stamp(id, Utc::now());
        guard.entries.push_back(entry.clone());
        Ok(entry)
    }

    fn entries(&self) -> Vec<LogEntry> {
        self.inner.read().entries.iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    fn clear(&self) {
        self.inner.write().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::{Context, LogLevel};
    use proptest::prelude::*;

    fn record(n: usize) -> LogRecord {
        LogRecord::new(LogLevel::Info, format!("message {n}"), Context::new())
    }

    #[test]
    fn ids_follow_insertion_order() {
        let store = MemoryStore::new(10);
        let a = store.append(record(0)).unwrap();
        let b = store.append(record(1)).unwrap();
        assert!(a.id < b.id);
        assert_eq!(store.entries()[0].id, a.id);
    }

    #[test]
    fn evicts_oldest_first() {
        let store = MemoryStore::new(3);
        for n in 0..5 {
            store.append(record(n)).unwrap();
        }

        let messages: Vec<_> = store.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["message 2", "message 3", "message 4"]);
        assert_eq!(store.evicted(), 2);
    }

    #[test]
    fn zero_capacity_clamped() {
        let store = MemoryStore::new(0);
        store.append(record(0)).unwrap();
        store.append(record(1)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.capacity(), 1);
    }

    #[test]
    fn clear_keeps_id_sequence() {
        let store = MemoryStore::new(5);
        let first = store.append(record(0)).unwrap();
        store.clear();
        assert!(store.is_empty());
        let second = store.append(record(1)).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn concurrent_appends_keep_count() {
        let store = std::sync::Arc::new(MemoryStore::new(1000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for n in 0..50 {
                        store.append(record(t * 100 + n)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let entries = store.entries();
        assert_eq!(entries.len(), 400);
        assert!(entries.windows(2).all(|w| w[0].id < w[1].id));
    }

    proptest! {
        #[test]
        fn most_recent_capacity_entries_survive(capacity in 1usize..50, extra in 1usize..50) {
            let store = MemoryStore::new(capacity);
            let total = capacity + extra;
            for n in 0..total {
                store.append(record(n)).unwrap();
            }

            let messages: Vec<_> = store.entries().into_iter().map(|e| e.message).collect();
            let expected: Vec<_> = (extra..total).map(|n| format!("message {n}")).collect();
            prop_assert_eq!(messages, expected);
        }
    }
}
