//! Bounded exponential backoff for completion requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;

use crate::error::LlmError;

/// 3 total attempts, base 1s, max 30s.
pub const MAX_ATTEMPTS: u32 = 3;
const INITIAL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERVAL: Duration = Duration::from_secs(30);
const CANCEL_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Once set, no further attempt is made and pending waits end early.
    pub cancel: Arc<AtomicBool>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: MAX_ATTEMPTS,
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl RetryPolicy {
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Sleep for `wait`, waking early on cancellation. Returns false if cancelled.
    fn pause(&self, wait: Duration) -> bool {
        let until = Instant::now() + wait;
        while !self.cancelled() {
            let now = Instant::now();
            if now >= until {
                return true;
            }
            thread::sleep(CANCEL_POLL.min(until - now));
        }
        false
    }
}

/// Call `attempt` until it succeeds, fails permanently, or the policy runs out.
///
/// Only errors for which [`LlmError::is_retryable`] holds are retried; the
/// rest are returned as-is on first sight. When every attempt fails with a
/// retryable error the last one is wrapped in `RetriesExhausted`. A set
/// cancel flag stops the loop with [`LlmError::Cancelled`].
pub fn retry_with_backoff<T, F>(policy: &RetryPolicy, mut attempt: F) -> Result<T, LlmError>
where
    F: FnMut() -> Result<T, LlmError>,
{
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_interval)
        .with_max_interval(policy.max_interval)
        .with_max_elapsed_time(None)
        .build();

    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        if policy.cancelled() {
            return Err(LlmError::Cancelled);
        }
        attempts += 1;

        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempts >= max_attempts => {
                return Err(LlmError::RetriesExhausted {
                    attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let wait = backoff.next_backoff().unwrap_or(policy.max_interval);
                log::warn!(
                    "{e}; retrying in {:.1}s (attempt {}/{})",
                    wait.as_secs_f32(),
                    attempts + 1,
                    max_attempts
                );
                if !policy.pause(wait) {
                    return Err(LlmError::Cancelled);
                }
            }
        }
    }
}
