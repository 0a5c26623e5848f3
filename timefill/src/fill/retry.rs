use std::thread;
use std::time::Duration;
use tracing::trace;

/// Result of a single attempt, as seen by the retry combinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// Done; stop retrying
    Success(T),
    /// Transient failure; try again if attempts remain
    Retryable(String),
    /// Permanent failure; stop without further attempts
    Abandoned(String),
}

/// Final result of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_reason: String },
    Abandoned { attempts: u32, reason: String },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Abandoned { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }
}

/// Bounded retry with an optional pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `attempt` until it succeeds, abandons, or `max_attempts` is reached.
    /// The closure receives the 1-based attempt number.
    pub fn run<T>(&self, mut attempt: impl FnMut(u32) -> Attempt<T>) -> RetryOutcome<T> {
        let max = self.max_attempts.max(1);
        let mut last_reason = String::new();

        for n in 1..=max {
            match attempt(n) {
                Attempt::Success(value) => {
                    return RetryOutcome::Succeeded { value, attempts: n }
                }
                Attempt::Abandoned(reason) => {
                    return RetryOutcome::Abandoned {
                        attempts: n,
                        reason,
                    }
                }
                Attempt::Retryable(reason) => {
                    trace!(attempt = n, max, %reason, "Attempt failed");
                    last_reason = reason;
                }
            }
            if n < max && !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }

        RetryOutcome::Exhausted {
            attempts: max,
            last_reason,
        }
    }
}
