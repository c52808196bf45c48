//! HTTP Retry Engine.
//!
//! Wraps any single provider call with exponential backoff, jitter, and
//! `Retry-After` handling. A backoff helper tied directly to one backend
//! trait is generalized here into a policy object plus a free function
//! that retries an arbitrary fallible async closure, so both
//! [`crate::adapter`] implementations and direct callers can share it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::error::{ErrorKind, PipelineError, Result};

/// Jitter strategy applied to the computed base delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// No jitter — delay is exactly the computed value.
    None,
    /// Random value in `[0, computed]`. AWS-recommended default.
    Full,
    /// `computed/2 + random in [0, computed/2]`.
    Equal,
    /// `random in [initial_delay, previous_delay * 3]`.
    Decorrelated,
}

/// Retry policy: how many attempts, how delays grow, which errors qualify.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter: JitterStrategy,
    pub retryable_statuses: Vec<u16>,
    pub respect_retry_after: bool,
}

impl RetryPolicy {
    /// No retry. Used for local backends that fail fast.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// Default cloud-provider policy: 3 retries, 1s initial, 2x growth,
    /// 60s cap, full jitter, honors `Retry-After`.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: JitterStrategy::Full,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            respect_retry_after: true,
        }
    }

    /// Conservative policy for interactive sessions: 2 retries, 10s cap.
    pub fn interactive() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            multiplier: 1.5,
            max_delay: Duration::from_secs(10),
            jitter: JitterStrategy::Full,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            respect_retry_after: true,
        }
    }

    /// Compute the delay before attempt `attempt` (0-indexed: the Nth retry).
    pub fn delay_for_attempt(&self, attempt: u32, previous: Option<Duration>) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let seconds = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
            JitterStrategy::Decorrelated => {
                let floor = self.initial_delay.as_secs_f64();
                let ceiling = previous.map(|p| p.as_secs_f64() * 3.0).unwrap_or(capped);
                let ceiling = ceiling.max(floor);
                floor + fastrand::f64() * (ceiling - floor)
            }
        };

        Duration::from_secs_f64(seconds.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Whether `error` qualifies for retry under `policy`.
///
/// `RateLimitError` and `ServiceUnavailable` retry when their originating
/// status is in `policy.retryable_statuses`; `NetworkError` always retries
/// (connection-level failures are rarely caused by the request itself).
pub fn is_retryable(error: &PipelineError, policy: &RetryPolicy) -> bool {
    match error {
        PipelineError::HttpError { status, .. } => policy.retryable_statuses.contains(status),
        PipelineError::Request(_) => true,
        PipelineError::Classified { kind, .. } => {
            matches!(kind, ErrorKind::NetworkError | ErrorKind::ServerUnreachable)
        }
        _ => false,
    }
}

fn retry_after_of(error: &PipelineError) -> Option<Duration> {
    match error {
        PipelineError::HttpError { retry_after, .. } => *retry_after,
        _ => None,
    }
}

/// Retry an arbitrary fallible async operation under `policy`.
///
/// `op` is called once per attempt; it must be re-invokable (a closure
/// returning a fresh future each call), since a failed HTTP call can't be
/// replayed from a consumed body. `cancel`, when set, is checked before
/// each attempt and after each sleep so a cancelled task doesn't fire one
/// more HTTP request after the caller gave up.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: Option<&AtomicBool>,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<PipelineError> = None;
    let mut last_delay: Option<Duration> = None;

    for attempt in 0..=policy.max_retries {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(PipelineError::Cancelled);
            }
        }

        if attempt > 0 {
            let delay = match last_error.as_ref().and_then(retry_after_of) {
                Some(ra) if policy.respect_retry_after => ra,
                _ => policy.delay_for_attempt(attempt - 1, last_delay),
            };
            last_delay = Some(delay);

            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                "retrying after transient failure"
            );

            tokio::time::sleep(delay).await;

            if let Some(flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    return Err(PipelineError::Cancelled);
                }
            }
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < policy.max_retries && is_retryable(&e, policy) {
                    last_error = Some(e);
                    continue;
                }
                return Err(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| PipelineError::Other("retry loop exited unexpectedly".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn test_delay_exponential_growth() {
        let policy = RetryPolicy {
            jitter: JitterStrategy::None,
            ..RetryPolicy::standard()
        };
        assert_eq!(policy.delay_for_attempt(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2, None), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy {
            jitter: JitterStrategy::None,
            max_delay: Duration::from_secs(5),
            ..RetryPolicy::standard()
        };
        assert_eq!(policy.delay_for_attempt(10, None), Duration::from_secs(5));
    }

    #[test]
    fn test_is_retryable_status_based() {
        let policy = RetryPolicy::standard();
        let err = PipelineError::HttpError {
            status: 429,
            body: String::new(),
            retry_after: None,
        };
        assert!(is_retryable(&err, &policy));

        let err = PipelineError::HttpError {
            status: 400,
            body: String::new(),
            retry_after: None,
        };
        assert!(!is_retryable(&err, &policy));
    }

    #[test]
    fn test_is_retryable_network_error_classified() {
        let policy = RetryPolicy::standard();
        let err = PipelineError::classified(ErrorKind::NetworkError);
        assert!(is_retryable(&err, &policy));

        let err = PipelineError::classified(ErrorKind::AuthenticationError);
        assert!(!is_retryable(&err, &policy));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: JitterStrategy::None,
            ..RetryPolicy::standard()
        };

        let a = attempts.clone();
        let result = retry(&policy, None, move |_attempt| {
            let a = a.clone();
            async move {
                let n = a.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(PipelineError::HttpError {
                        status: 503,
                        body: "busy".into(),
                        retry_after: None,
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_non_retryable() {
        let attempts = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::standard();
        let a = attempts.clone();

        let result: Result<()> = retry(&policy, None, move |_| {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::HttpError {
                    status: 400,
                    body: "bad".into(),
                    retry_after: None,
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_respects_cancellation() {
        let cancel = AtomicBool::new(true);
        let policy = RetryPolicy::standard();

        let result: Result<()> = retry(&policy, Some(&cancel), |_| async { Ok(()) }).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_retry_exhausts_all_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: JitterStrategy::None,
            ..RetryPolicy::standard()
        };
        let a = attempts.clone();

        let result: Result<()> = retry(&policy, None, move |_| {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::HttpError {
                    status: 503,
                    body: "busy".into(),
                    retry_after: None,
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // initial + 2 retries
    }
}
