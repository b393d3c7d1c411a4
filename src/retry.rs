//! Retry policy for store inserts.
//!
//! A [`RetryPolicy`] is a plain value: how many attempts to make, how long to
//! wait between them, and which failures are worth another attempt. The
//! publisher consults it; nothing here performs I/O except [`ThreadSleeper`].

use std::fmt;
use std::time::Duration;

use crate::store::StoreError;

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
/// Default upper bound for any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Delay schedule between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial * factor^(n-1)` before retry `n`, capped at `max`.
    Exponential {
        initial: Duration,
        factor: u32,
        max: Duration,
    },
}

impl Backoff {
    /// Delay to wait after the `failed_attempt`-th attempt (1-based).
    ///
    /// Non-decreasing in `failed_attempt` and never above [`Backoff::max_delay`].
    pub fn delay(&self, failed_attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                initial,
                factor,
                max,
            } => {
                let exponent = failed_attempt.saturating_sub(1);
                let multiplier = factor.max(1).saturating_pow(exponent);
                initial.saturating_mul(multiplier).min(max)
            }
        }
    }

    /// Largest delay this schedule can produce.
    pub fn max_delay(&self) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { max, .. } => max,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            initial: DEFAULT_INITIAL_DELAY,
            factor: 2,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

/// Bounded retry policy for a single insert.
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    retryable: fn(&StoreError) -> bool,
}

impl RetryPolicy {
    /// Create a policy making at most `max_attempts` attempts.
    ///
    /// Every publish makes at least one attempt, so `0` is raised to `1`.
    /// Configuration read from the pipeline rejects `0` before reaching here
    /// (see [`crate::config::PublishConfigBuilder::build`]).
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            retryable: StoreError::is_transient,
        }
    }

    /// Replace the predicate deciding which failures are retried.
    pub fn with_retryable(mut self, predicate: fn(&StoreError) -> bool) -> Self {
        self.retryable = predicate;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn is_retryable(&self, error: &StoreError) -> bool {
        (self.retryable)(error)
    }

    /// Delay before the attempt following `failed_attempt`.
    ///
    /// A throttling hint from the store wins over the schedule when it is
    /// longer, but is still capped at the schedule's maximum.
    pub fn delay_after(&self, failed_attempt: u32, error: &StoreError) -> Duration {
        let scheduled = self.backoff.delay(failed_attempt);
        match error.retry_after() {
            Some(hint) => scheduled.max(hint.min(self.backoff.max_delay())),
            None => scheduled,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Backoff::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// Waits out the backoff between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
