//! Aegis Widget - per-widget failure ledger
//!
//! Tracks failing dashboard widgets and decides how the host should react:
//! - Severity escalation LOW → MEDIUM → HIGH as failures repeat
//! - Bounded retry policy via [`WidgetFailureHandler::can_retry`]
//! - One-shot auto-removal once a widget keeps failing
//! - Fallback artifacts with retry/remove/report actions and markup
//!
//! # Example
//!
//! ```rust
//! use aegis_core::{Fault, Severity, WidgetConfig};
//! use aegis_widget::{FallbackCallbacks, WidgetFailureHandler};
//!
//! let handler = WidgetFailureHandler::new(WidgetConfig::default());
//! let record = handler.handle_widget_error("clock", "time-plugin", &Fault::new("tick failed"));
//! assert_eq!(record.severity, Severity::Low);
//!
//! let fallback = handler.create_fallback(&record, FallbackCallbacks::new(|_| {}, |_| {}));
//! let html = handler.render_fallback(fallback.id);
//! assert!(html.contains("tick failed"));
//! ```

#![warn(unreachable_pub)]

pub mod fallback;
pub mod handler;
pub mod record;
pub mod render;

pub use fallback::{content_for, Fallback, FallbackAction, FallbackCallbacks};
pub use handler::{AutoRemoveHook, WidgetFailureHandler, WidgetFailureListener, WidgetStatistics};
pub use record::{severity_for, WidgetErrorRecord};
pub use render::{escape_html, escape_text, CONTAINER_MARKER, GENERIC_MESSAGE};
