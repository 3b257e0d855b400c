//! Timeout and exponential-backoff retry
//!
//! A single policy shared by every retrying caller: backend requests use it
//! with the network constants, the sign-up flow with its own attempt count
//! and backoff. A policy carries no state between calls.

use crate::backend::error::BackendError;
use crate::consts::cli_consts::{network, registration};
use std::future::Future;
use std::time::Duration;

/// Attempt count, first backoff and optional per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            timeout: None,
        }
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 3 attempts, 300ms doubling backoff, 30s per attempt.
    pub const fn backend_request() -> Self {
        Self::new(network::MAX_ATTEMPTS, network::initial_backoff())
            .with_timeout(network::request_timeout())
    }

    /// Policy for one step of the sign-up flow.
    pub const fn registration_step(max_attempts: u32) -> Self {
        Self::new(max_attempts, registration::initial_backoff())
    }

    /// A single attempt: no retries, same timeout.
    pub const fn single_attempt(self) -> Self {
        Self {
            max_attempts: 1,
            ..self
        }
    }

    /// The delays slept between attempts when every attempt fails.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts.saturating_sub(1))
            .map(|n| self.initial_backoff.saturating_mul(1 << n.min(31)))
            .collect()
    }

    /// Runs `attempt` until it succeeds, the error is not retryable, or the
    /// attempts are used up. The last error is returned unchanged.
    pub async fn run<T, F, Fut, P>(
        &self,
        operation: &str,
        mut attempt: F,
        should_retry: P,
    ) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
        P: Fn(&BackendError) -> bool,
    {
        let schedule = self.backoff_schedule();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = match self.timeout {
                Some(limit) => tokio::time::timeout(limit, attempt())
                    .await
                    .unwrap_or(Err(BackendError::Timeout(limit))),
                None => attempt().await,
            };

            match result {
                Ok(value) => {
                    if attempts > 1 {
                        log::debug!("{} succeeded on attempt {}", operation, attempts);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let backoff = match schedule.get(attempts as usize - 1) {
                        Some(delay) if should_retry(&e) => *delay,
                        _ => return Err(e),
                    };
                    log::warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        operation,
                        attempts,
                        self.max_attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::backend_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn flaky(failures: u32) -> impl FnMut() -> std::future::Ready<Result<u32, BackendError>> {
        let mut calls = 0;
        move || {
            calls += 1;
            let result = if calls <= failures {
                Err(BackendError::Http {
                    status: 503,
                    message: format!("failure {calls}"),
                })
            } else {
                Ok(calls)
            };
            std::future::ready(result)
        }
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(
            RetryPolicy::backend_request().backoff_schedule(),
            vec![Duration::from_millis(300), Duration::from_millis(600)]
        );
        assert_eq!(
            RetryPolicy::new(4, Duration::from_millis(300)).backoff_schedule(),
            vec![
                Duration::from_millis(300),
                Duration::from_millis(600),
                Duration::from_millis(1200)
            ]
        );
        assert!(RetryPolicy::new(1, Duration::from_secs(1)).backoff_schedule().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_needs_no_backoff() {
        let start = Instant::now();
        let result = RetryPolicy::backend_request()
            .run("test", flaky(0), |_| true)
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_one_failure() {
        let start = Instant::now();
        let result = RetryPolicy::backend_request()
            .run("test", flaky(1), |_| true)
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures() {
        let start = Instant::now();
        let result = RetryPolicy::backend_request()
            .run("test", flaky(2), |_| true)
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(300 + 600));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_surface_last_error() {
        let start = Instant::now();
        let result = RetryPolicy::backend_request()
            .run("test", flaky(10), |_| true)
            .await;
        match result {
            Err(BackendError::Http { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "failure 3");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(start.elapsed(), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_stops_immediately() {
        let start = Instant::now();
        let result = RetryPolicy::backend_request()
            .run("test", flaky(10), |_| false)
            .await;
        match result {
            Err(BackendError::Http { message, .. }) => assert_eq!(message, "failure 1"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out() {
        let start = Instant::now();
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::backend_request()
            .run(
                "test",
                || {
                    calls += 1;
                    async {
                        tokio::time::sleep(Duration::from_secs(45)).await;
                        Ok(())
                    }
                },
                BackendError::is_network,
            )
            .await;
        assert!(matches!(result, Err(BackendError::Timeout(d)) if d == Duration::from_secs(30)));
        assert_eq!(calls, 3);
        assert_eq!(
            start.elapsed(),
            Duration::from_secs(90) + Duration::from_millis(900)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_retries() {
        let result = RetryPolicy::backend_request()
            .single_attempt()
            .run("test", flaky(1), |_| true)
            .await;
        assert!(result.is_err());
    }
}
