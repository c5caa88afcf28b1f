//! Error types for Aegis
//!
//! Fault-handling entry points never surface these to their callers. They
//! travel across the collaborator seams instead:
//! - Log stores and sinks that fail to accept a write
//! - Notification transports that fail to deliver
//! - Component lifecycle handlers that cannot restore a component
//! - Configuration that fails to parse or validate

use std::path::PathBuf;

/// Main Aegis error type
#[derive(Debug, thiserror::Error)]
pub enum AegisError {
    /// A log sink refused or failed a write
    #[error("log sink unavailable: {0}")]
    SinkUnavailable(String),

    /// The log store failed to persist an entry
    #[error("log store write failed: {0}")]
    StoreWrite(String),

    /// Outbound notification could not be delivered
    #[error("notification delivery failed: {0}")]
    Notification(String),

    /// Component is not known to the lifecycle handler
    #[error("component not found: {0}")]
    ComponentNotFound(String),

    /// Restoration attempt failed
    #[error("failed to restore {component}: {reason}")]
    Restore {
        /// Component that stayed down
        component: String,
        /// Why the attempt failed
        reason: String,
    },

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("invalid configuration in {path}: {source}")]
    ConfigParse {
        /// File (or `<inline>`) that failed to parse
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// IO failure in a file-backed sink or config load
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization of a log record failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No async runtime available for background work
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

impl AegisError {
    /// Check if error came from a log sink or store
    #[inline]
    #[must_use]
    pub fn is_sink_failure(&self) -> bool {
        matches!(
            self,
            Self::SinkUnavailable(_) | Self::StoreWrite(_) | Self::Io(_) | Self::Serialization(_)
        )
    }

    /// Check if the operation is worth retrying
    ///
    /// Restoration retries stop early on anything that is not.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SinkUnavailable(_) | Self::Notification(_) | Self::Restore { .. } | Self::Io(_)
        )
    }

    /// Create restore error for a component
    pub fn restore(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Restore {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Create config parse error for a path
    pub fn config_parse(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ConfigParse {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = AegisError::restore("chart-widget", "still crashing");
        assert_eq!(err.to_string(), "failed to restore chart-widget: still crashing");
    }

    #[test]
    fn sink_failures_classified() {
        assert!(AegisError::SinkUnavailable("disk full".into()).is_sink_failure());
        assert!(AegisError::StoreWrite("poisoned".into()).is_sink_failure());
        assert!(!AegisError::Config("bad".into()).is_sink_failure());
    }

    #[test]
    fn retryable_errors() {
        assert!(AegisError::Notification("502".into()).is_retryable());
        assert!(AegisError::restore("a", "b").is_retryable());
        assert!(!AegisError::ComponentNotFound("x".into()).is_retryable());
        assert!(!AegisError::Config("x".into()).is_retryable());
    }
}
