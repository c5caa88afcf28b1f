//! Fault categorisation by message pattern

use aegis_core::{Fault, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad class of a fault, chosen by pattern-matching its text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Connectivity, DNS, timeouts
    Network,
    /// Authentication or authorisation
    Permission,
    /// Bad input
    Validation,
    /// UI render failure
    Rendering,
    /// Anything else
    Unknown,
}

static NETWORK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)network|fetch|connection|econnrefused|econnreset|enotfound|etimedout|timed? ?out|offline|socket|\bdns\b")
        .expect("static pattern compiles")
});

static PERMISSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)permission|unauthori[sz]ed|forbidden|access denied|eacces|\b40[13]\b|not allowed|token expired|auth")
        .expect("static pattern compiles")
});

static VALIDATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)validation|invalid|required field|must be|malformed|\b422\b|schema")
        .expect("static pattern compiles")
});

static RENDERING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)render|component|widget|undefined is not|cannot read propert|hydrat|\bdom\b")
        .expect("static pattern compiles")
});

impl ErrorCategory {
    /// Classify a fault by its name and message
    ///
    /// Patterns are tried in a fixed priority order: network, permission,
    /// validation, rendering.
    #[must_use]
    pub fn classify(fault: &Fault) -> Self {
        Self::classify_text(&fault.to_string())
    }

    /// Classify raw error text
    #[must_use]
    pub fn classify_text(text: &str) -> Self {
        if NETWORK.is_match(text) {
            Self::Network
        } else if PERMISSION.is_match(text) {
            Self::Permission
        } else if VALIDATION.is_match(text) {
            Self::Validation
        } else if RENDERING.is_match(text) {
            Self::Rendering
        } else {
            Self::Unknown
        }
    }

    /// Severity assumed when the caller does not report one
    #[inline]
    #[must_use]
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::Validation => Severity::Low,
            Self::Network | Self::Rendering | Self::Unknown => Severity::Medium,
            Self::Permission => Severity::High,
        }
    }

    /// Lower-case name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Permission => "permission",
            Self::Validation => "validation",
            Self::Rendering => "rendering",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
