// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrying platform calls for a single target.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use ferry_config::model::{DeliveryConfig, SessionConfig};
use ferry_core::FerryError;
use ferry_core::types::ChatId;

/// How sends towards one target are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    /// Added to every platform-reported wait.
    pub rate_limit_buffer: Duration,
}

impl RetryPolicy {
    pub fn from_config(delivery: &DeliveryConfig, session: &SessionConfig) -> Self {
        Self {
            attempts: delivery.send_attempts.max(1),
            base: delivery.retry_base(),
            rate_limit_buffer: session.rate_limit_buffer(),
        }
    }

    /// Exponential delay before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// The wait before retrying after `error`, or `None` if it must not be retried.
    pub fn wait_for(&self, error: &FerryError, attempt: u32) -> Option<Duration> {
        match error.retry_after() {
            Some(wait) => Some(wait + self.rate_limit_buffer),
            None if error.is_retryable() => Some(self.backoff(attempt)),
            None => None,
        }
    }
}

/// Runs `op` until it succeeds, a non-retryable error occurs, or attempts run out.
///
/// Rate limits sleep the exact reported wait plus the buffer; transient
/// failures back off exponentially. Permission and validation failures are
/// returned immediately so the caller can skip the target.
pub async fn send_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    target: ChatId,
    mut op: F,
) -> Result<T, FerryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FerryError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                let wait = match policy.wait_for(&e, attempt - 1) {
                    Some(wait) if attempt < policy.attempts => wait,
                    _ => return Err(e),
                };
                if e.retry_after().is_some() {
                    warn!(
                        target = %target,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, waiting"
                    );
                } else {
                    debug!(target = %target, attempt, error = %e, "retrying send");
                }
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base: Duration::from_millis(100),
            rate_limit_buffer: Duration::from_secs(2),
        }
    }

    #[test]
    fn backoff_doubles() {
        let p = policy();
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(400));
    }

    #[test]
    fn rate_limit_wait_is_exact_plus_buffer() {
        let p = policy();
        let e = FerryError::RateLimited {
            retry_after: Duration::from_secs(7),
        };
        assert_eq!(p.wait_for(&e, 5), Some(Duration::from_secs(9)));
        let denied = FerryError::Permission {
            chat: 1,
            message: "no rights".into(),
        };
        assert_eq!(p.wait_for(&denied, 0), None);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = send_with_retry(&policy(), ChatId(1), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FerryError::network("reset"))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_sleeps_reported_duration() {
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = send_with_retry(&policy(), ChatId(1), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FerryError::RateLimited {
                    retry_after: Duration::from_secs(5),
                })
            } else {
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn permission_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = send_with_retry(&policy(), ChatId(1), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FerryError::Permission {
                chat: 1,
                message: "read only".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(FerryError::Permission { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_bounded() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = send_with_retry(&policy(), ChatId(1), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FerryError::network("down"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
