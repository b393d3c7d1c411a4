//! Retry-guarded, idempotent publication of a [`BuildRecord`].
//!
//! The publisher makes one atomic insert per attempt. Transient failures are
//! retried according to the [`RetryPolicy`]; anything else ends the publish.
//! Because the record id is the commit id, a conflict means an earlier attempt
//! (possibly one whose acknowledgement was lost) already stored the record, so
//! it counts as success.

use std::time::Duration;

use crate::error::{PublishError, Result};
use crate::logging::Logger;
use crate::record::BuildRecord;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::store::DocumentStore;

/// How a successful publish ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// This run's insert created the document.
    Created,
    /// The store already held a document with this id.
    AlreadyExisted,
}

/// Summary of a successful publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Number of inserts attempted, including the successful one
    pub attempts: u32,
    pub outcome: PublishOutcome,
}

/// Publishes a record with bounded retries.
#[derive(Debug)]
pub struct RetryingPublisher<Z = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: Z,
    log: Logger,
}

impl RetryingPublisher<ThreadSleeper> {
    /// Create a publisher that sleeps the current thread between attempts.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: ThreadSleeper,
            log: Logger::silent(),
        }
    }
}

impl<Z: Sleeper> RetryingPublisher<Z> {
    /// Replace how backoff delays are waited out.
    pub fn with_sleeper<Y: Sleeper>(self, sleeper: Y) -> RetryingPublisher<Y> {
        RetryingPublisher {
            policy: self.policy,
            sleeper,
            log: self.log,
        }
    }

    /// Report attempts and retries through `log`.
    pub fn with_logger(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Insert `record` into its partition, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Fatal`] on the first non-retryable failure
    /// - [`PublishError::Exhausted`] once every attempt failed transiently
    pub fn publish<S: DocumentStore>(
        &self,
        record: &BuildRecord,
        store: &S,
    ) -> Result<PublishReceipt> {
        let partition = record.partition_key();
        let max_attempts = self.policy.max_attempts();
        let mut previous_delay = Duration::ZERO;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.log.verbose(
                1,
                format!(
                    "Attempt {attempt}/{max_attempts}: inserting build {} into '{partition}'",
                    record.id()
                ),
            );

            let error = match store.atomic_insert(partition, record) {
                Ok(()) => {
                    return Ok(PublishReceipt {
                        attempts: attempt,
                        outcome: PublishOutcome::Created,
                    });
                }
                Err(error) => error,
            };

            if error.is_conflict() {
                self.log.verbose(
                    1,
                    format!("Build {} is already in '{partition}'", record.id()),
                );
                return Ok(PublishReceipt {
                    attempts: attempt,
                    outcome: PublishOutcome::AlreadyExisted,
                });
            }

            if !self.policy.is_retryable(&error) {
                return Err(PublishError::Fatal {
                    partition: partition.to_string(),
                    source: error,
                });
            }

            if attempt >= max_attempts {
                return Err(PublishError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            // Never wait less than last time, even if a throttle hint shrinks.
            let delay = self.policy.delay_after(attempt, &error).max(previous_delay);
            previous_delay = delay;

            self.log.info(format!(
                "Warning: attempt {attempt}/{max_attempts} failed: {error}; retrying in {}ms",
                delay.as_millis()
            ));
            self.sleeper.sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests;
