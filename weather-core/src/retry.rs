//! Bounded retry with a fixed delay between attempts.
//!
//! The same [`RetryPolicy`] drives two explicit modes:
//! - [`RetryPolicy::retry_blocking`] for synchronous operations; the delay
//!   blocks the calling thread.
//! - [`RetryPolicy::retry_async`] for futures; the delay is a tokio sleep, so
//!   other tasks keep running while an attempt waits.
//!
//! Any `Err` is treated as retryable. Once every attempt has failed the last
//! error is returned inside [`RetryExhausted`], unchanged.

use std::{error::Error, fmt, future::Future, thread, time::Duration};

use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay: Self::DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

    /// `max_attempts` below 1 is raised to 1: the operation always runs at least once.
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

    /// Run `op` until it succeeds or `max_attempts` is reached, sleeping the thread in between.
    pub fn retry_blocking<T, E, F>(&self, op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: fmt::Display,
    {
        self.retry_blocking_with(op, thread::sleep)
    }

    fn retry_blocking_with<T, E, F, S>(
        &self,
        mut op: F,
        mut sleep: S,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Result<T, E>,
        S: FnMut(Duration),
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            debug!(attempt, max_attempts = self.max_attempts, "Starting attempt");

            match op() {
                Ok(value) => {
                    self.log_success(attempt);
                    return Ok(value);
                }
                Err(err) => self.check_exhausted(attempt, err)?,
            }

            sleep(self.delay);
            attempt += 1;
        }
    }

    /// Await `op()` until it succeeds or `max_attempts` is reached, yielding to the runtime
    /// in between.
    pub async fn retry_async<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            debug!(attempt, max_attempts = self.max_attempts, "Starting attempt");

            match op().await {
                Ok(value) => {
                    self.log_success(attempt);
                    return Ok(value);
                }
                Err(err) => self.check_exhausted(attempt, err)?,
            }

            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }

    fn log_success(&self, attempt: u32) {
        if attempt > 1 {
            info!(attempt, "Succeeded after retrying");
        } else {
            debug!(attempt, "Succeeded on first attempt");
        }
    }

    fn check_exhausted<E: fmt::Display>(
        &self,
        attempt: u32,
        err: E,
    ) -> Result<(), RetryExhausted<E>> {
        warn!(attempt, max_attempts = self.max_attempts, error = %err, "Attempt failed");

        if attempt >= self.max_attempts {
            error!(attempts = attempt, "All attempts failed");
            return Err(RetryExhausted::new(attempt, err));
        }

        debug!(delay_ms = self.delay.as_millis() as u64, "Retrying after delay");
        Ok(())
    }
}

/// Every attempt failed; carries the error from the final one.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    attempts: u32,
    last_error: E,
}

impl<E> RetryExhausted<E> {
    pub fn new(attempts: u32, last_error: E) -> Self {
        Self {
            attempts,
            last_error,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> &E {
        &self.last_error
    }

    pub fn into_inner(self) -> E {
        self.last_error
    }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "all {} attempt(s) failed, last error: {}",
            self.attempts, self.last_error
        )
    }
}

impl<E> Error for RetryExhausted<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.last_error)
    }
}
