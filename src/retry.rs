// src/retry.rs
//! Explicit retry policy for calls to flaky collaborators.
//!
//! Applied at the call site (the channel worker wraps the extraction call
//! with it); the HTTP clients themselves stay single-attempt so the policy
//! is visible in one place.

use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff: `base_delay * multiplier^(attempt-1)`,
/// capped at `max_delay`, at most `max_attempts` tries in total.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// 3 attempts, 4s -> 8s waits capped at 10s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay applied after the given 1-based attempt fails.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30) as i32;
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }

    /// Run `op`, retrying while `is_transient` holds and attempts remain.
    /// Permanent errors and the final transient error propagate unchanged.
    pub async fn run<T, E, F, Fut, P>(&self, is_transient: P, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, backing off before retry"
                    );
                    metrics::counter!("monitor_extraction_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 2.0,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn delays_grow_exponentially_and_cap() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1), Duration::from_secs(4));
        assert_eq!(p.delay_for(2), Duration::from_secs(8));
        assert_eq!(p.delay_for(3), Duration::from_secs(10)); // capped, not 16
        assert_eq!(p.delay_for(10), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_up_to_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: Result<(), &str> = instant_policy(3)
            .run(
                |_e| true,
                move || {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err("unavailable")
                    }
                },
            )
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: Result<(), &str> = instant_policy(3)
            .run(
                |_e| false,
                move || {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err("malformed")
                    }
                },
            )
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_after_transient_failure_returns_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: Result<u32, &str> = instant_policy(3)
            .run(
                |_e| true,
                move || {
                    let c = c.clone();
                    async move {
                        if c.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err("unavailable")
                        } else {
                            Ok(7)
                        }
                    }
                },
            )
            .await;
        assert_eq!(out, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
