//! Remediation hints for known error signatures

use crate::stats::AggregatedError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A remediation hint for a matched error signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSuggestion {
    /// Human-readable remediation
    pub suggestion: String,
    /// Machine-readable action key
    pub action: String,
    /// Messages that matched this signature
    pub matched: Vec<String>,
}

struct Signature {
    pattern: Regex,
    suggestion: &'static str,
    action: &'static str,
}

fn signature(pattern: &str, suggestion: &'static str, action: &'static str) -> Signature {
    Signature {
        pattern: Regex::new(pattern).expect("static pattern compiles"),
        suggestion,
        action,
    }
}

// Short tokens carry word boundaries so ports and longer words do not match
static SIGNATURES: Lazy<Vec<Signature>> = Lazy::new(|| {
    vec![
        signature(
            r"(?i)econnrefused|connection refused",
            "Check that the target service is running and reachable",
            "check_service_status",
        ),
        signature(
            r"(?i)timeout|timed out|etimedout",
            "Increase the request timeout or investigate upstream latency",
            "increase_timeout",
        ),
        signature(
            r"(?i)enotfound|getaddrinfo|\bdns\b",
            "Verify the host name and DNS configuration",
            "check_dns",
        ),
        signature(
            r"(?i)eacces|permission denied|forbidden|unauthorized",
            "Review the credentials and permissions granted to the plugin",
            "check_permissions",
        ),
        signature(
            r"(?i)out of memory|heap limit|allocation failed",
            "Reduce memory pressure or raise the plugin's memory limit",
            "increase_memory",
        ),
        signature(
            r"(?i)rate limit|too many requests|\b429\b",
            "Throttle outgoing requests or add backoff",
            "add_rate_limiting",
        ),
        signature(
            r"(?i)cannot read property|undefined is not|of undefined|of null",
            "Guard against missing data before rendering",
            "add_null_checks",
        ),
    ]
});

/// Match aggregated errors against the known signature table
///
/// One suggestion per matched signature, in table order. Unmatched error
/// text yields nothing.
#[must_use]
pub fn suggestions_for(errors: &[AggregatedError]) -> Vec<ErrorSuggestion> {
    SIGNATURES
        .iter()
        .filter_map(|sig| {
            let matched: Vec<String> = errors
                .iter()
                .filter(|err| sig.pattern.is_match(&err.message))
                .map(|err| err.message.clone())
                .collect();

            (!matched.is_empty()).then(|| ErrorSuggestion {
                suggestion: sig.suggestion.to_string(),
                action: sig.action.to_string(),
                matched,
            })
        })
        .collect()
}
