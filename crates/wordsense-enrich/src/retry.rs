//! Retry as an explicit per-attempt outcome.
//!
//! Each attempt reports what should happen next; the loop holds no flag that
//! a failure path might leave unset.

use crate::error::EnrichError;
use std::future::Future;
use std::time::Duration;

/// What one producer attempt concluded.
#[derive(Debug)]
pub enum Attempt<T> {
    Accepted(T),
    /// Malformed or transient; try again after the backoff.
    Retry(String),
    /// Give up immediately.
    Abort(EnrichError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Run `op` up to `max_retries + 1` times. The delay before retry `n`
    /// (1-based) is `initial_delay * 2^(n-1)`.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, EnrichError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let attempts = self.max_retries.saturating_add(1);
        let mut delay = self.initial_delay;
        let mut last = String::from("no attempt made");

        for attempt in 1..=attempts {
            match op(attempt).await {
                Attempt::Accepted(value) => {
                    if attempt > 1 {
                        tracing::info!(what, attempt, "producer output accepted after retry");
                    }
                    return Ok(value);
                }
                Attempt::Abort(err) => {
                    tracing::warn!(what, attempt, error = %err, "aborting producer call");
                    return Err(err);
                }
                Attempt::Retry(reason) => {
                    if attempt < attempts {
                        tracing::warn!(
                            what,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            %reason,
                            "retrying producer call"
                        );
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2);
                    }
                    last = reason;
                }
            }
        }

        Err(EnrichError::Producer { attempts, last })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::ZERO)
    }

    #[tokio::test]
    async fn accepts_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let out = instant(2)
            .run("test", |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Attempt::Retry(format!("attempt {n} garbled"))
                    } else {
                        Attempt::Accepted(n)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_with_last_reason() {
        let err = instant(2)
            .run::<(), _, _>("test", |n| async move { Attempt::Retry(format!("bad {n}")) })
            .await
            .unwrap_err();
        match err {
            EnrichError::Producer { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "bad 3");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[tokio::test]
    async fn abort_stops_immediately() {
        let calls = AtomicU32::new(0);
        let err = instant(5)
            .run::<(), _, _>("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Attempt::Abort(EnrichError::unparseable("refused")) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::UnparseableInput { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles() {
        let start = tokio::time::Instant::now();
        let _ = instant(0).run::<(), _, _>("test", |_| async { Attempt::Retry("x".into()) }).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        let policy = RetryPolicy::new(2, Duration::from_millis(100));
        let _ = policy
            .run::<(), _, _>("test", |_| async { Attempt::Retry("x".into()) })
            .await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
