//! Aegis configuration
//!
//! Every knob is optional; the defaults reproduce the observed product
//! behaviour (escalate at 2 failures, stop retrying at 3, auto-remove at 5).

use crate::error::AegisError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AegisConfig {
    /// Structured logger settings
    pub logger: LoggerConfig,
    /// Widget failure handler settings
    pub widget: WidgetConfig,
    /// Recovery orchestrator settings
    pub recovery: RecoveryConfig,
}

impl AegisConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// - `AegisError::ConfigParse` if the text is not valid TOML for this schema
    /// - `AegisError::Config` if a value fails validation
    pub fn from_toml_str(text: &str) -> Result<Self, AegisError> {
        let config: Self =
            toml::from_str(text).map_err(|e| AegisError::config_parse("<inline>", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// - `AegisError::Io` if the file cannot be read
    /// - `AegisError::ConfigParse` / `AegisError::Config` as for [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AegisError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text).map_err(|e| AegisError::config_parse(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns `AegisError::Config` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, AegisError> {
        toml::to_string_pretty(self).map_err(|e| AegisError::Config(e.to_string()))
    }

    /// Reject values that would disable the policies outright
    ///
    /// # Errors
    /// Returns `AegisError::Config` naming the offending field
    pub fn validate(&self) -> Result<(), AegisError> {
        if self.logger.max_entries == 0 {
            return Err(AegisError::Config("logger.max_entries must be at least 1".into()));
        }
        if self.widget.max_retries == 0 {
            return Err(AegisError::Config("widget.max_retries must be at least 1".into()));
        }
        if self.widget.escalation_threshold == 0 {
            return Err(AegisError::Config(
                "widget.escalation_threshold must be at least 1".into(),
            ));
        }
        if self.widget.auto_remove_after_failures == 0 {
            return Err(AegisError::Config(
                "widget.auto_remove_after_failures must be at least 1".into(),
            ));
        }
        if self.recovery.fallback_buffer_capacity == 0 {
            return Err(AegisError::Config(
                "recovery.fallback_buffer_capacity must be at least 1".into(),
            ));
        }
        if self.recovery.max_tracked_errors == 0 {
            return Err(AegisError::Config(
                "recovery.max_tracked_errors must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// With logger config
    #[inline]
    #[must_use]
    pub fn with_logger(mut self, logger: LoggerConfig) -> Self {
        self.logger = logger;
        self
    }

    /// With widget config
    #[inline]
    #[must_use]
    pub fn with_widget(mut self, widget: WidgetConfig) -> Self {
        self.widget = widget;
        self
    }

    /// With recovery config
    #[inline]
    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }
}

/// Structured logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Store capacity; the oldest entry is evicted beyond this
    pub max_entries: usize,
    /// Re-emit every stored entry as a `tracing` event
    pub mirror_to_tracing: bool,
}

impl LoggerConfig {
    /// With max entries
    #[inline]
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            mirror_to_tracing: true,
        }
    }
}

/// Widget failure handler configuration
///
/// The thresholds are product decisions carried over from the dashboard's
/// observed behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Retry count at which severity is forced to HIGH
    pub escalation_threshold: u32,
    /// Retry count at which retry stops being offered
    pub max_retries: u32,
    /// Suggested delay before the UI retries a widget
    pub retry_delay_ms: u64,
    /// Failure index on which the auto-remove hook fires
    pub auto_remove_after_failures: u32,
}

impl WidgetConfig {
    /// With escalation threshold
    #[inline]
    #[must_use]
    pub fn with_escalation_threshold(mut self, threshold: u32) -> Self {
        self.escalation_threshold = threshold;
        self
    }

    /// With max retries
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With auto-remove threshold
    #[inline]
    #[must_use]
    pub fn with_auto_remove_after(mut self, failures: u32) -> Self {
        self.auto_remove_after_failures = failures;
        self
    }

    /// Retry delay as a duration
    #[inline]
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 2,
            max_retries: 3,
            retry_delay_ms: 1000,
            auto_remove_after_failures: 5,
        }
    }
}

/// Retry scheduling options for component restoration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Maximum restoration attempts
    pub max_retries: u32,
    /// Wait before the first attempt
    pub initial_delay_ms: u64,
    /// Double the wait after each failed attempt
    pub exponential_backoff: bool,
}

impl RetryOptions {
    /// Create retry options
    #[inline]
    #[must_use]
    pub fn new(max_retries: u32, initial_delay: Duration, exponential_backoff: bool) -> Self {
        Self {
            max_retries,
            initial_delay_ms: u64::try_from(initial_delay.as_millis()).unwrap_or(u64::MAX),
            exponential_backoff,
        }
    }

    /// Wait before the first attempt
    #[inline]
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Wait before the given attempt (1-based)
    ///
    /// With backoff the wait is `initial * 2^(attempt-1)`, saturating.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms;
        if !self.exponential_backoff || attempt <= 1 {
            return Duration::from_millis(base);
        }
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor))
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            exponential_backoff: true,
        }
    }
}

/// Recovery orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Retry policy used when the component handler asks for a retry
    pub retry: RetryOptions,
    /// Occurrences after which an error counts as recurring
    pub recurring_error_threshold: u32,
    /// Open a tracking issue for recurring errors
    pub create_issue_for_recurring: bool,
    /// Default unresolved time before escalation
    pub escalation_threshold_ms: u64,
    /// Capacity of the in-memory fallback log buffer
    pub fallback_buffer_capacity: usize,
    /// Distinct faults tracked for recurrence and escalation; the least
    /// recently seen is forgotten first
    pub max_tracked_errors: usize,
}

impl RecoveryConfig {
    /// With retry options
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// With recurring threshold
    #[inline]
    #[must_use]
    pub fn with_recurring_threshold(mut self, threshold: u32) -> Self {
        self.recurring_error_threshold = threshold;
        self
    }

    /// With default escalation threshold
    #[inline]
    #[must_use]
    pub fn with_escalation_threshold(mut self, threshold: Duration) -> Self {
        self.escalation_threshold_ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With tracked-fault capacity
    #[inline]
    #[must_use]
    pub fn with_max_tracked_errors(mut self, max: usize) -> Self {
        self.max_tracked_errors = max;
        self
    }

    /// Default escalation threshold as a duration
    #[inline]
    #[must_use]
    pub fn escalation_threshold(&self) -> Duration {
        Duration::from_millis(self.escalation_threshold_ms)
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            recurring_error_threshold: 3,
            create_issue_for_recurring: true,
            escalation_threshold_ms: 3_600_000,
            fallback_buffer_capacity: 500,
            max_tracked_errors: 1000,
        }
    }
}
