//! Retry logic with exponential backoff.
//!
//! Only idempotent requests (reads and role grants) go through here.
//! Creations are sent exactly once by their callers.

use std::{
    future::Future,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use backon::{ExponentialBuilder, Retryable};
use rand::Rng;

use crate::{
    config::RetryPolicy,
    error::{Result, SdkError},
};

/// Execute an async operation with retry using exponential backoff.
///
/// The operation is retried according to `policy` while it fails with an
/// error for which [`SdkError::is_retryable`] holds. `label` names the
/// operation in log output.
///
/// - **Exponential backoff**: `initial_backoff * multiplier^(attempt-1)`, capped at `max_backoff`
/// - **Jitter**: each sleep is scaled by a random factor in `1 ± jitter`
/// - **Termination**: after `max_attempts` failed attempts the last error is wrapped in
///   [`SdkError::RetryExhausted`]
///
/// Non-retryable errors are returned unchanged on first occurrence.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, label: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    // backon counts retries, not attempts.
    let max_retries = policy.max_attempts.saturating_sub(1) as usize;

    let backoff = ExponentialBuilder::new()
        .with_min_delay(policy.initial_backoff)
        .with_max_delay(policy.max_backoff)
        .with_factor(policy.multiplier as f32)
        .with_max_times(max_retries);

    let retries = AtomicU32::new(0);
    let jitter = policy.jitter;

    operation
        .retry(backoff)
        .sleep(move |dur: Duration| tokio::time::sleep(apply_jitter(dur, jitter)))
        .when(|e: &SdkError| e.is_retryable())
        .notify(|err: &SdkError, dur: Duration| {
            let attempt = retries.fetch_add(1, Ordering::SeqCst) + 1;

            tracing::debug!(
                operation = label,
                attempt,
                backoff_ms = dur.as_millis() as u64,
                error = %err,
                "retrying after backoff"
            );
        })
        .await
        .map_err(|e| {
            let retried = retries.load(Ordering::SeqCst);
            if e.is_retryable() && retried > 0 {
                tracing::warn!(
                    operation = label,
                    attempts = retried + 1,
                    error = %e,
                    "retries exhausted"
                );
                SdkError::RetryExhausted { attempts: retried + 1, last_error: e.to_string() }
            } else {
                e
            }
        })
}

/// Scales `dur` by a random factor in `[1 - factor, 1 + factor]`.
///
/// Factors outside `0.0..=1.0` are clamped; non-positive factors disable jitter.
fn apply_jitter(dur: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return dur;
    }

    let factor = factor.clamp(0.0, 1.0);
    let mut rng = rand::rng();

    let base_nanos = dur.as_nanos() as f64;
    let min_nanos = base_nanos * (1.0 - factor);
    let max_nanos = base_nanos * (1.0 + factor);

    let jittered_nanos = rng.random_range(min_nanos..=max_nanos);
    Duration::from_nanos(jittered_nanos as u64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use proptest::prelude::*;

    use super::*;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = with_retry(&test_policy(), "list_users", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SdkError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_failure_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = with_retry(&test_policy(), "user_summary", || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SdkError::api(503, None, "unavailable"))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returned_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = with_retry(&test_policy(), "find_organizations", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SdkError::api(404, Some("CF-NotFound"), "missing"))
            }
        })
        .await;

        assert!(matches!(result, Err(SdkError::Api { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = with_retry(&test_policy(), "grant_space_role", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SdkError::api(502, None, "bad gateway"))
            }
        })
        .await;

        match result {
            Err(SdkError::RetryExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("bad gateway"));
            },
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_policy_returns_original_error() {
        let result: Result<()> = with_retry(&RetryPolicy::no_retry(), "list_users", || async {
            Err(SdkError::api(503, None, "unavailable"))
        })
        .await;

        assert!(matches!(result, Err(SdkError::Api { status: 503, .. })));
    }

    proptest! {
        #[test]
        fn prop_jitter_within_bounds(base_ms in 1u64..10_000, factor in 0.0f64..=1.0) {
            let dur = Duration::from_millis(base_ms);
            let jittered = apply_jitter(dur, factor);

            let max = Duration::from_nanos((dur.as_nanos() as f64 * (1.0 + factor)).ceil() as u64);
            let min = Duration::from_nanos((dur.as_nanos() as f64 * (1.0 - factor)).floor() as u64);
            prop_assert!(jittered <= max);
            prop_assert!(jittered >= min);
        }

        #[test]
        fn prop_non_positive_jitter_is_identity(base_ms in 1u64..10_000, factor in -10.0f64..=0.0) {
            let dur = Duration::from_millis(base_ms);
            prop_assert_eq!(apply_jitter(dur, factor), dur);
        }
    }
}
