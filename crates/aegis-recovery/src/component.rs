//! Component lifecycle seam
//!
//! The orchestrator decides *when* to act on a failing component; the host
//! (typically its plugin manager) decides *how*, through
//! [`ComponentFailureHandler`].

use aegis_core::{AegisError, Context, Fault};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};

/// What the host wants done with a failing component
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDisposition {
    /// Mark unhealthy and stop dispatching to it
    Isolate,
    /// Schedule background restoration with backoff
    Retry,
    /// Swap in the named replacement component
    Fallback(String),
    /// Record only
    #[default]
    None,
}

/// Host-side component lifecycle directives
#[async_trait::async_trait]
pub trait ComponentFailureHandler: Send + Sync {
    /// Decide how to react to a component failure
    ///
    /// # Errors
    /// Errors are logged by the orchestrator and treated as
    /// [`FailureDisposition::None`].
    fn handle_component_failure(
        &self,
        component_id: &str,
        fault: &Fault,
        context: &Context,
    ) -> Result<FailureDisposition, AegisError>;

    /// Replacement component for `component_id`, if one exists
    fn get_fallback_component(&self, component_id: &str) -> Option<String>;

    /// Exclude a component from further dispatch
    fn mark_component_unhealthy(&self, component_id: &str);

    /// Attempt to bring a component back
    ///
    /// Returns `Ok(true)` once the component is serving again.
    ///
    /// # Errors
    /// Any error counts as a failed attempt. Errors that are not
    /// [`AegisError::is_retryable`] (such as
    /// [`AegisError::ComponentNotFound`]) also end the retry run.
    async fn restore_component(&self, component_id: &str) -> Result<bool, AegisError>;
}

/// Handler used when the host supplies none
///
/// Asks for a retry on every failure, tracks unhealthy components itself and
/// treats every restoration attempt as successful.
#[derive(Debug, Default)]
pub struct DefaultComponentHandler {
    unhealthy: DashSet<String>,
}

impl DefaultComponentHandler {
    /// Create handler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the component is currently marked unhealthy
    #[must_use]
    pub fn is_unhealthy(&self, component_id: &str) -> bool {
        self.unhealthy.contains(component_id)
    }
}

#[async_trait::async_trait]
impl ComponentFailureHandler for DefaultComponentHandler {
    fn handle_component_failure(
        &self,
        _component_id: &str,
        _fault: &Fault,
        _context: &Context,
    ) -> Result<FailureDisposition, AegisError> {
        Ok(FailureDisposition::Retry)
    }

    fn get_fallback_component(&self, _component_id: &str) -> Option<String> {
        None
    }

    fn mark_component_unhealthy(&self, component_id: &str) {
        self.unhealthy.insert(component_id.to_string());
    }

    async fn restore_component(&self, component_id: &str) -> Result<bool, AegisError> {
        self.unhealthy.remove(component_id);
        Ok(true)
    }
}
