//! Bounded, strictly sequential retry combinator.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, RetrievalError};

/// Attempt budget and backoff for [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: usize,
    /// Delay before the second attempt; doubles for each later attempt.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Policy with `max_attempts` attempts and no delay between them.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    fn delay_after(&self, attempt: usize) -> Duration {
        let capped = attempt.saturating_sub(1).min(5) as u32;
        self.backoff.saturating_mul(1 << capped)
    }
}

/// Runs `op` until it succeeds, fails with an error `is_retryable` rejects, or the attempt
/// budget runs out.
///
/// `op` receives the 1-based attempt number. Exhaustion yields
/// [`RetrievalError::RetrievalExhausted`] carrying the last failure's message.
pub fn with_retry<T, F, C>(policy: RetryPolicy, is_retryable: C, mut op: F) -> Result<T>
where
    F: FnMut(usize) -> Result<T>,
    C: Fn(&RetrievalError) -> bool,
{
    if policy.max_attempts == 0 {
        return Err(RetrievalError::Configuration(
            "retry budget must allow at least one attempt".into(),
        ));
    }
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(err),
            Err(err) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    kind = err.kind(),
                    error = %err,
                    "attempt failed"
                );
                last_error = Some(err);
                if attempt < policy.max_attempts {
                    let delay = policy.delay_after(attempt);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
            }
        }
    }
    Err(RetrievalError::RetrievalExhausted {
        attempts: policy.max_attempts,
        last_error: last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string()),
    })
}
