//! Aegis Core - shared vocabulary for the resilience subsystem
//!
//! Every other Aegis crate speaks in these types:
//! - [`Fault`]: an application error object describing a failed operation
//! - [`Context`]: structured metadata attached to every fault report
//! - [`LogLevel`] and [`Severity`]: urgency rankings
//! - [`AegisError`]: the library error type for collaborator seams
//! - [`AegisConfig`]: the optional configuration surface with its defaults
//!
//! # Example
//!
//! ```rust
//! use aegis_core::{Context, Fault, Severity};
//!
//! let fault = Fault::named("TypeError", "cannot read property 'x' of undefined");
//! let ctx = Context::new()
//!     .with_plugin("weather")
//!     .with_component("forecast-card")
//!     .with_severity(Severity::High);
//!
//! assert_eq!(fault.to_string(), "TypeError: cannot read property 'x' of undefined");
//! assert_eq!(ctx.origin(), Some("weather"));
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use config::{AegisConfig, LoggerConfig, RecoveryConfig, RetryOptions, WidgetConfig};
pub use context::Context;
pub use error::AegisError;
pub use types::{EntryId, FallbackId, Fault, LogLevel, Severity};

/// Convenience alias for results carrying [`AegisError`]
pub type Result<T> = std::result::Result<T, AegisError>;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
