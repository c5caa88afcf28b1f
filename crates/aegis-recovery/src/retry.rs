//! Restoration retries with backoff

use crate::component::ComponentFailureHandler;
use aegis_core::RetryOptions;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;

/// How a scheduled retry run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetryOutcome {
    /// Component restored on the given attempt (1-based)
    Restored {
        /// Attempt that succeeded
        attempt: u32,
    },
    /// Attempts ran out or a non-retryable error ended the run
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
}

impl RetryOutcome {
    /// Whether the component came back
    #[inline]
    #[must_use]
    pub fn is_restored(&self) -> bool {
        matches!(self, Self::Restored { .. })
    }
}

/// Try to restore `component_id` up to `options.max_retries` times
///
/// Sleeps `options.delay_for(attempt)` before each attempt and returns on the
/// first success without waiting further. A non-retryable error ends the run
/// early.
pub(crate) async fn restore_with_backoff(
    handler: &dyn ComponentFailureHandler,
    component_id: &str,
    options: RetryOptions,
) -> RetryOutcome {
    for attempt in 1..=options.max_retries {
        let delay = options.delay_for(attempt);
        tracing::debug!(
            component = component_id,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before restoration attempt"
        );
        tokio::time::sleep(delay).await;

        match AssertUnwindSafe(handler.restore_component(component_id))
            .catch_unwind()
            .await
        {
            Ok(Ok(true)) => return RetryOutcome::Restored { attempt },
            Ok(Ok(false)) => {
                tracing::debug!(component = component_id, attempt, "component not restored yet");
            }
            Ok(Err(e)) if !e.is_retryable() => {
                tracing::warn!(component = component_id, attempt, error = %e, "restoration abandoned");
                return RetryOutcome::Exhausted { attempts: attempt };
            }
            Ok(Err(e)) => {
                tracing::warn!(component = component_id, attempt, error = %e, "restoration attempt failed");
            }
            Err(_) => {
                tracing::error!(component = component_id, attempt, "restoration attempt panicked");
            }
        }
    }

    RetryOutcome::Exhausted {
        attempts: options.max_retries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::{AegisError, Context, Fault};
    use crate::component::FailureDisposition;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Restores on the given attempt; records when each attempt ran
    struct SucceedOn {
        on: u32,
        calls: AtomicU32,
        at: parking_lot::Mutex<Vec<Instant>>,
    }

    impl SucceedOn {
        fn new(on: u32) -> Self {
            Self {
                on,
                calls: AtomicU32::new(0),
                at: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ComponentFailureHandler for SucceedOn {
        fn handle_component_failure(&self, _: &str, _: &Fault, _: &Context) -> Result<FailureDisposition, AegisError> {
            Ok(FailureDisposition::Retry)
        }

        fn get_fallback_component(&self, _: &str) -> Option<String> {
            None
        }

        fn mark_component_unhealthy(&self, _: &str) {}

        async fn restore_component(&self, id: &str) -> Result<bool, AegisError> {
            self.at.lock().push(Instant::now());
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.on {
                Ok(true)
            } else {
                Err(AegisError::restore(id, "still down"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_delays() {
        let handler = SucceedOn::new(u32::MAX);
        let start = Instant::now();
        let options = RetryOptions::new(3, Duration::from_millis(100), true);

        let outcome = restore_with_backoff(&handler, "chart", options).await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });
        let offsets: Vec<_> = handler.at.lock().iter().map(|t| (*t - start).as_millis()).collect();
        assert_eq!(offsets, vec![100, 300, 700]);
    }

    #[tokio::test(start_paused = true)]
    async fn constant_delays_without_backoff() {
        let handler = SucceedOn::new(u32::MAX);
        let start = Instant::now();
        let options = RetryOptions::new(3, Duration::from_millis(100), false);

        restore_with_backoff(&handler, "chart", options).await;

        let offsets: Vec<_> = handler.at.lock().iter().map(|t| (*t - start).as_millis()).collect();
        assert_eq!(offsets, vec![100, 200, 300]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_success() {
        let handler = SucceedOn::new(2);
        let start = Instant::now();
        let options = RetryOptions::new(5, Duration::from_millis(100), true);

        let outcome = restore_with_backoff(&handler, "chart", options).await;

        assert_eq!(outcome, RetryOutcome::Restored { attempt: 2 });
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert_eq!((Instant::now() - start).as_millis(), 300);
    }

    struct Unknown(AtomicU32);

    #[async_trait::async_trait]
    impl ComponentFailureHandler for Unknown {
        fn handle_component_failure(&self, _: &str, _: &Fault, _: &Context) -> Result<FailureDisposition, AegisError> {
            Ok(FailureDisposition::Retry)
        }

        fn get_fallback_component(&self, _: &str) -> Option<String> {
            None
        }

        fn mark_component_unhealthy(&self, _: &str) {}

        async fn restore_component(&self, id: &str) -> Result<bool, AegisError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(AegisError::ComponentNotFound(id.to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_component_stops_retrying() {
        let handler = Unknown(AtomicU32::new(0));
        let options = RetryOptions::new(5, Duration::from_millis(100), true);

        let outcome = restore_with_backoff(&handler, "ghost", options).await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 1 });
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_retries_exhaust_immediately() {
        let handler = SucceedOn::new(1);
        let outcome = restore_with_backoff(&handler, "chart", RetryOptions::new(0, Duration::ZERO, true)).await;
        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 0 });
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }
}
