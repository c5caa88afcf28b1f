//! Aegis Recovery - system-wide failure coordination
//!
//! Provides:
//! - [`RecoveryOrchestrator`]: isolation, safe logging, retries, escalation
//! - [`ComponentFailureHandler`]: the host's component lifecycle seam
//! - [`DeveloperNotifier`]: outbound notification transport
//! - [`SystemHealthStatus`]: the process-wide health snapshot
//!
//! # Example
//!
//! ```rust
//! use aegis_core::{Context, Fault, RecoveryConfig};
//! use aegis_recovery::{RecoveryOrchestrator, SystemStatus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), aegis_core::AegisError> {
//! let orchestrator = RecoveryOrchestrator::new(RecoveryConfig::default())?;
//! orchestrator.handle_plugin_failure("weather", &Fault::new("sandbox crashed"), &Context::new());
//!
//! assert!(orchestrator.is_isolated("weather"));
//! assert_eq!(orchestrator.get_system_health().status, SystemStatus::Degraded);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod component;
pub mod health;
pub mod notify;
pub mod orchestrator;
pub mod retry;
mod tracking;

pub use component::{ComponentFailureHandler, DefaultComponentHandler, FailureDisposition};
pub use health::{SystemHealthStatus, SystemStatus};
pub use notify::{
    DeveloperNotifier, ErrorNotification, EscalationLevel, EscalationNotification, Notification,
    TracingNotifier, TrackingIssue,
};
pub use orchestrator::{RecoveryOrchestrator, RecoveryOrchestratorBuilder};
pub use retry::RetryOutcome;
