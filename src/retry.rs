//! Bounded retry with exponential backoff around a single network call.
//!
//! Only transient (connection-level) failures are retried. Everything else,
//! and exhaustion of the retry budget, turns into `None`: callers treat a
//! missing result as a normal outcome and never retry on their own.

use crate::config::RetryPolicy;
use crate::error::FetchError;
use crate::stats::RunStats;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Progress of one logical operation through its retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub next_wait: Duration,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_retries,
            next_wait: Duration::ZERO,
        }
    }

    /// Records a transient failure. Returns the wait before the next attempt,
    /// or `None` once the budget is spent.
    pub fn record_failure(&mut self, unit: Duration) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        self.next_wait = unit.saturating_mul(factor);
        Some(self.next_wait)
    }
}

#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    stats: Arc<RunStats>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy, stats: Arc<RunStats>) -> Self {
        Self { policy, stats }
    }

    /// Runs `op` until it succeeds, fails non-transiently, or exhausts the policy.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut state = RetryState::new(&self.policy);
        loop {
            debug!(target_label = label, attempt = state.attempt + 1, "Sending request");
            match op().await {
                Ok(value) => return Some(value),
                Err(e) if e.is_transient() => match state.record_failure(self.policy.unit) {
                    Some(wait) => {
                        warn!(
                            target_label = label,
                            attempt = state.attempt,
                            wait_secs = wait.as_secs_f64(),
                            error = %e,
                            "Connection error, retrying"
                        );
                        self.stats.inc_retries();
                        tokio::time::sleep(wait).await;
                    }
                    None => {
                        warn!(
                            target_label = label,
                            attempts = state.attempt,
                            error = %e,
                            "Max retries reached, skipping"
                        );
                        self.stats.inc_requests_skipped();
                        return None;
                    }
                },
                Err(e) => {
                    warn!(target_label = label, error = %e, "Request produced no data");
                    self.stats.inc_requests_skipped();
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn retrier(max_retries: u32) -> Retrier {
        Retrier::new(
            RetryPolicy {
                max_retries,
                unit: Duration::from_secs(1),
            },
            Arc::new(RunStats::new()),
        )
    }

    #[test]
    fn waits_double_from_two_units() {
        let policy = RetryPolicy {
            max_retries: 5,
            unit: Duration::from_secs(1),
        };
        let mut state = RetryState::new(&policy);
        let waits: Vec<_> = std::iter::from_fn(|| state.record_failure(policy.unit))
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(waits, vec![2, 4, 8, 16]);
        assert_eq!(state.attempt, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_transient_failures() {
        let retrier = retrier(5);
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = retrier
            .run("page 1", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= 3 {
                        Err(FetchError::Transient("refused".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Some(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 2 + 4 + 8
        assert_eq!(start.elapsed(), Duration::from_secs(14));
        assert_eq!(retrier.stats.retry_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn always_transient_gives_up_after_max_attempts() {
        let retrier = retrier(5);
        let calls = AtomicU32::new(0);

        let result: Option<()> = retrier
            .run("page 2", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Transient("reset".into())) }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(retrier.stats.skipped_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_success_status_is_not_retried() {
        let retrier = retrier(5);
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Option<()> = retrier
            .run("page 3", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Status(503)) }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(retrier.stats.retry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_content_type_is_not_retried() {
        let retrier = retrier(3);
        let calls = AtomicU32::new(0);

        let result: Option<()> = retrier
            .run("page 4", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::ContentType(Some("text/html".into()))) }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_sleeps() {
        let retrier = retrier(1);
        let start = Instant::now();
        let result: Option<()> = retrier
            .run("once", || async { Err(FetchError::Transient("down".into())) })
            .await;
        assert_eq!(result, None);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
