//! State of one retry session, shared by both drivers.
use std::fmt::Debug;
use std::mem;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{Labels, RetryConfig};
use crate::error::RetryError;
use crate::log::{Attempt, AttemptLog};

/// What a driver does after an attempt failed.
pub(crate) enum Step<E> {
    /// Wait, then make the next attempt.
    Retry(Duration),
    /// The attempt budget is spent.
    Exhausted,
    /// The error is not eligible for another attempt.
    Abort(RetryError<E>),
}

pub(crate) struct Session<E> {
    labels: Labels,
    attempt: u32,
    log: AttemptLog<E>,
}

impl<E: Debug> Session<E> {
    pub(crate) fn new(labels: Labels) -> Self {
        Session {
            labels,
            attempt: 0,
            log: AttemptLog::default(),
        }
    }

    pub(crate) fn is_exhausted(&self, config: &RetryConfig<E>) -> bool {
        self.attempt >= config.max_retry()
    }

    /// Record a failed attempt and decide how the session goes on.
    pub(crate) fn fail(&mut self, config: &RetryConfig<E>, elapsed: Duration, error: E) -> Step<E> {
        let attempt = self.attempt;
        self.attempt += 1;

        debug!(
            actor = %self.labels.actor,
            activity = %self.labels.activity,
            attempt = self.attempt,
            max_retry = config.max_retry(),
            elapsed_ms = elapsed.as_millis() as u64,
            error = ?error,
            "attempt failed"
        );

        let retryable = config.is_retryable(&error);
        self.log.push(Attempt { elapsed, error });

        if !retryable {
            warn!(
                actor = %self.labels.actor,
                activity = %self.labels.activity,
                attempts = self.log.len(),
                "error is not retryable, giving up"
            );
            return Step::Abort(RetryError::CannotRetry {
                actor: mem::take(&mut self.labels.actor),
                activity: mem::take(&mut self.labels.activity),
                log: mem::take(&mut self.log),
            });
        }

        if self.is_exhausted(config) {
            return Step::Exhausted;
        }

        let delay = config.delay().next(attempt, config.max_retry(), &self.log);
        debug!(
            activity = %self.labels.activity,
            delay_ms = delay.as_millis() as u64,
            "retrying after delay"
        );
        Step::Retry(delay)
    }

    pub(crate) fn reached_max_retry(self) -> RetryError<E> {
        warn!(
            actor = %self.labels.actor,
            activity = %self.labels.activity,
            attempts = self.log.len(),
            "reached max retry, giving up"
        );
        RetryError::ReachedMaxRetry {
            actor: self.labels.actor,
            activity: self.labels.activity,
            log: self.log,
        }
    }
}
