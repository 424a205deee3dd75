//! Errors that end a retry session without success.
use thiserror::Error;

use crate::log::AttemptLog;

/// A configuration value rejected before the first attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A parameter is outside its accepted range.
    #[error("param `{param}` expects {expected}, but received {received}")]
    InvalidArgument {
        param: &'static str,
        expected: &'static str,
        received: String,
    },

    /// The callback driver was started outside of a tokio runtime, so it has
    /// nowhere to schedule delayed retries.
    #[error("callback retry must be started from within a tokio runtime")]
    MissingRuntime,
}

impl ConfigError {
    pub(crate) fn invalid(
        param: &'static str,
        expected: &'static str,
        received: impl std::fmt::Debug,
    ) -> Self {
        ConfigError::InvalidArgument {
            param,
            expected,
            received: format!("{received:?}"),
        }
    }
}

/// The outcome of a session that did not succeed.
///
/// The underlying operation error is never returned on its own: it is kept in
/// the [`AttemptLog`] carried by [`RetryError::CannotRetry`] and
/// [`RetryError::ReachedMaxRetry`], together with every earlier failure.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The configuration was rejected before any attempt was made.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The eligibility predicate rejected an error before the attempt budget
    /// ran out.
    #[error("{activity} by `{actor}` cannot be retried after {} attempt(s)", .log.len())]
    CannotRetry {
        actor: String,
        activity: String,
        log: AttemptLog<E>,
    },

    /// Every attempt failed with a retryable error.
    #[error("{activity} by `{actor}` reached max retry after {} attempt(s)", .log.len())]
    ReachedMaxRetry {
        actor: String,
        activity: String,
        log: AttemptLog<E>,
    },
}

impl<E> RetryError<E> {
    /// A stable code identifying the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            RetryError::InvalidConfig(_) => "ERR_INVALID_ARGUMENT",
            RetryError::CannotRetry { .. } => "ERR_CANNOT_RETRY",
            RetryError::ReachedMaxRetry { .. } => "ERR_REACHED_MAX_RETRY",
        }
    }

    pub fn is_cannot_retry(&self) -> bool {
        matches!(self, RetryError::CannotRetry { .. })
    }

    pub fn is_reached_max_retry(&self) -> bool {
        matches!(self, RetryError::ReachedMaxRetry { .. })
    }

    /// Who performed the activity. `None` for configuration errors.
    pub fn actor(&self) -> Option<&str> {
        match self {
            RetryError::InvalidConfig(_) => None,
            RetryError::CannotRetry { actor, .. } | RetryError::ReachedMaxRetry { actor, .. } => {
                Some(actor)
            }
        }
    }

    /// What was being attempted. `None` for configuration errors.
    pub fn activity(&self) -> Option<&str> {
        match self {
            RetryError::InvalidConfig(_) => None,
            RetryError::CannotRetry { activity, .. }
            | RetryError::ReachedMaxRetry { activity, .. } => Some(activity),
        }
    }

    /// The failed attempts of the session, oldest first.
    pub fn log(&self) -> Option<&AttemptLog<E>> {
        match self {
            RetryError::InvalidConfig(_) => None,
            RetryError::CannotRetry { log, .. } | RetryError::ReachedMaxRetry { log, .. } => {
                Some(log)
            }
        }
    }

    pub fn into_log(self) -> Option<AttemptLog<E>> {
        match self {
            RetryError::InvalidConfig(_) => None,
            RetryError::CannotRetry { log, .. } | RetryError::ReachedMaxRetry { log, .. } => {
                Some(log)
            }
        }
    }
}
