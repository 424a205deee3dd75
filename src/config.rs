//! Caller-supplied configuration of a retry session.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::log::AttemptLog;
use crate::strategy::Exponential;

/// Number of attempts made when none is configured.
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// Delay between attempts when none is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

/// Decides whether a failed attempt may be followed by another one.
pub type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Computes the delay from `(attempt, max_retry, log)`.
pub type DelayFn<E> = Arc<dyn Fn(u32, u32, &AttemptLog<E>) -> Duration + Send + Sync>;

/// How long to wait before the next attempt.
///
/// The attempt index handed to [`Delay::Backoff`] and [`Delay::Policy`] is the
/// number of failed attempts before the one that just failed: `0` after the
/// first failure, `1` after the second, and so on.
pub enum Delay<E> {
    /// The same delay before every retry.
    Fixed(Duration),
    /// Exponential backoff indexed by attempt.
    Backoff(Exponential),
    /// Any function of `(attempt, max_retry, log)`.
    Policy(DelayFn<E>),
}

impl<E> Delay<E> {
    /// Wrap a function of `(attempt, max_retry, log)` as a delay policy.
    pub fn policy<F>(policy: F) -> Self
    where
        F: Fn(u32, u32, &AttemptLog<E>) -> Duration + Send + Sync + 'static,
    {
        Delay::Policy(Arc::new(policy))
    }

    pub(crate) fn next(&self, attempt: u32, max_retry: u32, log: &AttemptLog<E>) -> Duration {
        match self {
            Delay::Fixed(duration) => *duration,
            Delay::Backoff(backoff) => backoff.delay(attempt),
            Delay::Policy(policy) => policy(attempt, max_retry, log),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Delay::Fixed(duration) if duration.is_zero() => Err(ConfigError::invalid(
                "delay",
                "a positive duration or a function",
                duration,
            )),
            Delay::Backoff(backoff) => backoff.validate(),
            _ => Ok(()),
        }
    }
}

impl<E> Clone for Delay<E> {
    fn clone(&self) -> Self {
        match self {
            Delay::Fixed(duration) => Delay::Fixed(*duration),
            Delay::Backoff(backoff) => Delay::Backoff(*backoff),
            Delay::Policy(policy) => Delay::Policy(Arc::clone(policy)),
        }
    }
}

impl<E> fmt::Debug for Delay<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::Fixed(duration) => f.debug_tuple("Fixed").field(duration).finish(),
            Delay::Backoff(backoff) => f.debug_tuple("Backoff").field(backoff).finish(),
            Delay::Policy(_) => f.write_str("Policy(..)"),
        }
    }
}

impl<E> From<Duration> for Delay<E> {
    fn from(duration: Duration) -> Self {
        Delay::Fixed(duration)
    }
}

impl<E> From<Exponential> for Delay<E> {
    fn from(backoff: Exponential) -> Self {
        Delay::Backoff(backoff)
    }
}

/// A receiver that can name itself.
///
/// Its name is the default `actor` label of a session driven through
/// [`unsync::retry_on`](crate::unsync::retry_on) or
/// [`callback::retry_on`](crate::callback::retry_on).
pub trait Actor {
    fn actor_name(&self) -> &str {
        ""
    }
}

impl Actor for () {}

impl<T: Actor + ?Sized> Actor for Arc<T> {
    fn actor_name(&self) -> &str {
        (**self).actor_name()
    }
}

/// Configuration of a retry session.
///
/// Built with [`RetryConfig::builder`]. Values are checked by
/// [`RetryConfig::validate`] when a driver starts a session, not when the
/// configuration is built.
pub struct RetryConfig<E> {
    max_retry: u32,
    delay: Delay<E>,
    is_retry: Option<Predicate<E>>,
    actor: Option<String>,
    activity: Option<String>,
}

impl<E> RetryConfig<E> {
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder {
            config: RetryConfig::default(),
        }
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    pub fn delay(&self) -> &Delay<E> {
        &self.delay
    }

    /// Whether `error` permits another attempt. Without a predicate every
    /// error does.
    pub fn is_retryable(&self, error: &E) -> bool {
        self.is_retry.as_ref().is_none_or(|is_retry| is_retry(error))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retry == 0 {
            return Err(ConfigError::invalid(
                "max_retry",
                "a positive number",
                self.max_retry,
            ));
        }
        self.delay.validate()
    }

    pub(crate) fn labels<OP: ?Sized>(&self, receiver: &str) -> Labels {
        Labels {
            actor: self
                .actor
                .clone()
                .unwrap_or_else(|| receiver.to_string()),
            activity: self
                .activity
                .clone()
                .unwrap_or_else(operation_name::<OP>),
        }
    }
}

impl<E> Default for RetryConfig<E> {
    fn default() -> Self {
        RetryConfig {
            max_retry: DEFAULT_MAX_RETRY,
            delay: Delay::Fixed(DEFAULT_DELAY),
            is_retry: None,
            actor: None,
            activity: None,
        }
    }
}

impl<E> Clone for RetryConfig<E> {
    fn clone(&self) -> Self {
        RetryConfig {
            max_retry: self.max_retry,
            delay: self.delay.clone(),
            is_retry: self.is_retry.clone(),
            actor: self.actor.clone(),
            activity: self.activity.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retry", &self.max_retry)
            .field("delay", &self.delay)
            .field("is_retry", &self.is_retry.as_ref().map(|_| ".."))
            .field("actor", &self.actor)
            .field("activity", &self.activity)
            .finish()
    }
}

/// Builder for [`RetryConfig`].
///
/// ```
/// use std::time::Duration;
/// use reattempt::{RetryConfig, strategy::Exponential};
///
/// let config = RetryConfig::<std::io::Error>::builder()
///     .max_retry(5)
///     .delay(Exponential::from_millis(10).max_timeout(Duration::from_secs(1)))
///     .is_retry(|error| error.kind() != std::io::ErrorKind::PermissionDenied)
///     .activity("sync_inbox")
///     .build();
///
/// assert!(config.validate().is_ok());
/// ```
pub struct RetryConfigBuilder<E> {
    config: RetryConfig<E>,
}

impl<E> RetryConfigBuilder<E> {
    /// Maximum number of attempts, the first one included. Default: 3.
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.config.max_retry = max_retry;
        self
    }

    /// Delay between attempts: a [`Duration`], an [`Exponential`] or a
    /// [`Delay`]. Default: 200ms.
    pub fn delay(mut self, delay: impl Into<Delay<E>>) -> Self {
        self.config.delay = delay.into();
        self
    }

    /// Compute the delay from `(attempt, max_retry, log)`.
    pub fn delay_with<F>(mut self, policy: F) -> Self
    where
        F: Fn(u32, u32, &AttemptLog<E>) -> Duration + Send + Sync + 'static,
    {
        self.config.delay = Delay::policy(policy);
        self
    }

    /// Only retry errors for which `is_retry` returns `true`.
    pub fn is_retry<F>(mut self, is_retry: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.config.is_retry = Some(Arc::new(is_retry));
        self
    }

    /// Who performs the activity. Defaults to the receiver's name, or empty.
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.config.actor = Some(actor.into());
        self
    }

    /// What is being attempted. Defaults to the operation's name.
    pub fn activity(mut self, activity: impl Into<String>) -> Self {
        self.config.activity = Some(activity.into());
        self
    }

    pub fn build(self) -> RetryConfig<E> {
        self.config
    }
}

/// The resolved `actor` and `activity` of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Labels {
    pub(crate) actor: String,
    pub(crate) activity: String,
}

/// The last path segment of `OP`'s type name, without generics or closure
/// markers: `my_crate::client::fetch::<u8>` becomes `fetch`, and a closure
/// defined in `fetch` becomes `fetch` too.
fn operation_name<OP: ?Sized>() -> String {
    let mut path = String::new();
    let mut depth = 0usize;
    for c in std::any::type_name::<OP>().chars() {
        match c {
            '<' => depth += 1,
            '>' if depth > 0 => depth -= 1,
            _ if depth == 0 => path.push(c),
            _ => {}
        }
    }

    let mut path = path.as_str();
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    path.trim_end_matches("::")
        .rsplit("::")
        .next()
        .unwrap_or(path)
        .to_string()
}
