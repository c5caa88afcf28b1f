//! System health
//!
//! One process-wide [`SystemHealthStatus`] lives behind the orchestrator's
//! lock. Callers only ever receive snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Overall system state
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    /// Everything operational
    #[default]
    Healthy,
    /// Some components failed; the system still serves
    Degraded,
    /// Critical systems affected; sticky until restart
    Critical,
}

impl SystemStatus {
    /// Lower-case name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of system health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealthStatus {
    /// Overall state
    pub status: SystemStatus,
    /// False once a critical failure was reported
    pub critical_systems_operational: bool,
    /// Components currently marked failed
    pub failed_components: BTreeSet<String>,
    /// Whether any recovery path is engaged
    pub recovery_mechanisms_active: bool,
    /// Whether logging is routed to the fallback sink
    pub fallback_logging_active: bool,
    /// Refreshed on every health query
    pub last_health_check: DateTime<Utc>,
}

impl Default for SystemHealthStatus {
    fn default() -> Self {
        Self {
            status: SystemStatus::Healthy,
            critical_systems_operational: true,
            failed_components: BTreeSet::new(),
            recovery_mechanisms_active: false,
            fallback_logging_active: false,
            last_health_check: Utc::now(),
        }
    }
}

impl SystemHealthStatus {
    /// Whether the system reports healthy
    #[inline]
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == SystemStatus::Healthy
    }

    /// Raise status, never lowering it
    pub(crate) fn raise(&mut self, status: SystemStatus) {
        self.status = self.status.max(status);
    }

    pub(crate) fn record_failure(&mut self, component: &str, critical: bool) {
        self.failed_components.insert(component.to_string());
        self.recovery_mechanisms_active = true;
        if critical {
            self.critical_systems_operational = false;
            self.raise(SystemStatus::Critical);
        } else {
            self.raise(SystemStatus::Degraded);
        }
    }

    /// Drop a restored component and relax a degraded status if possible
    pub(crate) fn record_restored(&mut self, component: &str) -> bool {
        let removed = self.failed_components.remove(component);
        self.settle();
        removed
    }

    pub(crate) fn set_fallback_logging(&mut self, active: bool) {
        self.fallback_logging_active = active;
        if active {
            self.recovery_mechanisms_active = true;
            self.raise(SystemStatus::Degraded);
        } else {
            self.settle();
        }
    }

    fn settle(&mut self) {
        if self.status == SystemStatus::Critical {
            return;
        }
        let engaged = !self.failed_components.is_empty() || self.fallback_logging_active;
        self.recovery_mechanisms_active = engaged;
        if !engaged {
            self.status = SystemStatus::Healthy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_degrades_then_restores() {
        let mut health = SystemHealthStatus::default();
        health.record_failure("chart", false);
        assert_eq!(health.status, SystemStatus::Degraded);
        assert!(health.recovery_mechanisms_active);

        assert!(health.record_restored("chart"));
        assert_eq!(health.status, SystemStatus::Healthy);
        assert!(!health.recovery_mechanisms_active);
    }

    #[test]
    fn critical_is_sticky() {
        let mut health = SystemHealthStatus::default();
        health.record_failure("db", true);
        health.record_failure("chart", false);
        assert_eq!(health.status, SystemStatus::Critical);
        assert!(!health.critical_systems_operational);

        health.record_restored("db");
        health.record_restored("chart");
        assert_eq!(health.status, SystemStatus::Critical);
    }

    #[test]
    fn fallback_logging_keeps_degraded() {
        let mut health = SystemHealthStatus::default();
        health.set_fallback_logging(true);
        health.record_failure("chart", false);
        health.record_restored("chart");
        assert_eq!(health.status, SystemStatus::Degraded);

        health.set_fallback_logging(false);
        assert!(health.is_healthy());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&SystemStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
