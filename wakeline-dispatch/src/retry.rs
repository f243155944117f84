//! Bounded-retry wrapper for handler invocations.

use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use wakeline_domain::ChangeEvent;

use crate::handler::{EventHandler, HandlerError};

/// Retry policy for a single handler invocation.
///
/// A handler is attempted at most `max_retries + 1` times; the delay before
/// retry `n` is `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// A policy that never retries.
    pub fn no_retries() -> Self {
        Self { max_retries: 0, base_delay: Duration::ZERO }
    }

    /// Total attempts allowed per event.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff delay after a failed attempt (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_millis(100) }
    }
}

/// Invoke a handler with the policy's bounded exponential backoff.
///
/// Returns the final error once retries are exhausted; intermediate
/// failures are logged at warn level.
pub async fn invoke_with_retry(
    policy: RetryPolicy,
    handler: &dyn EventHandler,
    event: &ChangeEvent,
) -> Result<(), HandlerError> {
    let mut attempt = 0;
    loop {
        match handler.handle(event).await {
            Ok(()) => return Ok(()),
            Err(error) if attempt < policy.max_retries => {
                warn!(
                    handler = handler.name(),
                    event_type = %event.event_type(),
                    attempt,
                    error = %error,
                    "Handler failed, retrying"
                );
                sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wakeline_domain::{ChangeOp, StreamPosition, Table};

    /// Fails the first `failures` attempts, then succeeds.
    struct FlakyHandler {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyHandler {
        fn new(failures: u32) -> Self {
            Self { failures, calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl EventHandler for FlakyHandler {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn handle(&self, _event: &ChangeEvent) -> Result<(), HandlerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(HandlerError::Unavailable("not yet".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn event() -> ChangeEvent {
        ChangeEvent::new(ChangeOp::Insert, Table::Messages, json!({}), StreamPosition::new(1))
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));

        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(80));
        assert_eq!(policy.max_attempts(), 6);
    }

    #[tokio::test]
    async fn test_eventual_success_within_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let handler = FlakyHandler::new(2);

        invoke_with_retry(policy, &handler, &event()).await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_failing_handler_bounded() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let handler = FlakyHandler::new(u32::MAX);

        let result = invoke_with_retry(policy, &handler, &event()).await;
        assert!(result.is_err());
        // max_retries + 1 invocations, then abandoned.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_no_retries_policy() {
        let policy = RetryPolicy::no_retries();
        let handler = FlakyHandler::new(u32::MAX);

        assert!(invoke_with_retry(policy, &handler, &event()).await.is_err());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }
}
