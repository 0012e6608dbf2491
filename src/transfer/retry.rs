//! Bounded retry with a fixed delay
//!
//! An operation either fails hard (propagated at once, never retried) or
//! produces a value that is accepted or rejected. Rejected values are retried
//! until `max_attempts` is reached.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Source of delays, shared by the retry policy and the poller
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and remembers every requested delay
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
    }
}

/// Why a retried operation did not produce an accepted value
#[derive(Debug)]
pub enum RetryError<T, E> {
    /// Every attempt ran but none was accepted; `last` is the final result
    Exhausted { attempts: u32, last: T },
    /// An attempt could not run; no further attempts were made
    Hard(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one attempt
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until `accept` approves its value
    ///
    /// `op` receives the 1-based attempt number. The delay is slept between
    /// attempts only, never after the last one.
    pub async fn execute<T, E, F, Fut, A>(
        &self,
        sleeper: &dyn Sleeper,
        mut op: F,
        accept: A,
    ) -> Result<T, RetryError<T, E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Fn(&T) -> bool,
    {
        let mut attempt = 1;
        loop {
            let value = op(attempt).await.map_err(RetryError::Hard)?;
            if accept(&value) {
                return Ok(value);
            }
            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: value,
                });
            }
            log::debug!(
                "attempt {}/{} rejected, next in {:?}",
                attempt,
                self.max_attempts,
                self.delay
            );
            sleeper.sleep(self.delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_accepts_first_attempt_without_sleeping() {
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::default();

        let result: Result<u64, RetryError<u64, String>> = policy
            .execute(&sleeper, |_| async { Ok(1000) }, |size| *size == 1000)
            .await;

        assert_eq!(result.unwrap(), 1000);
        assert!(sleeper.slept().is_empty());
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(5, Duration::from_secs(5));
        let calls = Cell::new(0u32);

        let result: Result<u64, RetryError<u64, String>> = policy
            .execute(
                &sleeper,
                |attempt| {
                    calls.set(calls.get() + 1);
                    assert_eq!(attempt, calls.get());
                    async { Ok(900) }
                },
                |size| *size == 1000,
            )
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 5);
                assert_eq!(last, 900);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(calls.get(), 5);
        // four gaps between five attempts
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(5); 4]);
    }

    #[tokio::test]
    async fn test_hard_error_stops_immediately() {
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::default();
        let calls = Cell::new(0u32);

        let result: Result<u64, RetryError<u64, String>> = policy
            .execute(
                &sleeper,
                |attempt| {
                    calls.set(calls.get() + 1);
                    async move {
                        if attempt == 2 {
                            Err("connection reset".to_string())
                        } else {
                            Ok(900)
                        }
                    }
                },
                |size| *size == 1000,
            )
            .await;

        assert!(matches!(result, Err(RetryError::Hard(ref e)) if e == "connection reset"));
        assert_eq!(calls.get(), 2);
        assert_eq!(sleeper.slept().len(), 1);
    }

    #[tokio::test]
    async fn test_match_on_later_attempt() {
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result: Result<u32, RetryError<u32, String>> = policy
            .execute(&sleeper, |attempt| async move { Ok(attempt) }, |n| *n == 3)
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(sleeper.slept().len(), 2);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, DEFAULT_DELAY).max_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(), 5);
        assert_eq!(RetryPolicy::default().delay(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_waits_between_attempts() {
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();

        let result: Result<u64, RetryError<u64, String>> = policy
            .execute(&TokioSleeper, |_| async { Ok(900) }, |size| *size == 1000)
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 5, .. })));
        assert!(start.elapsed() >= Duration::from_secs(20));
    }
}
