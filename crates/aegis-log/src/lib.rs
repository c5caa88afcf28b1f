//! Aegis Log - bounded, queryable structured logging
//!
//! Provides:
//! - A FIFO-evicting log store with consistent snapshot reads
//! - Search by level, user, plugin, component, time range and text
//! - Error statistics, aggregation and remediation suggestions
//! - A user-facing error translation pipeline
//! - The [`LogSink`] seam used by the recovery layer, with fallback sinks
//!
//! # Example
//!
//! ```rust
//! use aegis_core::{Context, Fault, LoggerConfig};
//! use aegis_log::{LogQuery, StructuredLogger};
//!
//! let logger = StructuredLogger::new(LoggerConfig::default().with_max_entries(100));
//! logger.log_error(&Fault::named("TypeError", "a"), Context::new().with_plugin("p1"));
//! logger.log_info("widget mounted", Context::new().with_plugin("p1"));
//!
//! let errors = logger.search_logs(&LogQuery::new().plugin("p1").containing("typeerror"));
//! assert_eq!(errors.len(), 1);
//! assert_eq!(logger.error_statistics().by_type["TypeError"], 1);
//! ```

#![warn(unreachable_pub)]

pub mod category;
pub mod display;
pub mod entry;
pub mod logger;
pub mod query;
pub mod sink;
pub mod stats;
pub mod store;
pub mod suggest;

pub use category::ErrorCategory;
pub use display::{
    ActionKind, AdminNotification, AdminNotifier, ErrorDisplayPipeline, RecoveryAction, UserError,
    UserErrorDisplay,
};
pub use entry::{LogEntry, LogRecord};
pub use logger::StructuredLogger;
pub use query::LogQuery;
pub use sink::{console, BufferedSink, JsonLinesSink, LogSink, SinkRecord};
pub use stats::{aggregate_errors, error_type_of, AggregatedError, ErrorStatistics};
pub use store::{LogStore, MemoryStore};
pub use suggest::{suggestions_for, ErrorSuggestion};
