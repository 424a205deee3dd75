//! Retry driver for operations that are awaited directly.
use std::fmt::Debug;
use std::future::Future;

use tokio::time::{Instant, sleep};

use crate::config::{Actor, Labels, RetryConfig};
use crate::error::RetryError;
use crate::session::{Session, Step};

/// Execute an asynchronous operation and retry it according to `config` if it fails.
///
/// The operation is called up to `config.max_retry()` times. Its first success is
/// returned as is. After each failure the error is recorded in the session's
/// [`AttemptLog`](crate::AttemptLog); if the configured predicate rejects the
/// error the session ends with [`RetryError::CannotRetry`], otherwise the driver
/// waits for the configured delay and tries again. Once every attempt has
/// failed the session ends with [`RetryError::ReachedMaxRetry`]. No delay is
/// spent after the final attempt.
///
/// The configuration is validated before the first attempt; an invalid one is
/// reported as [`RetryError::InvalidConfig`] without calling the operation.
///
/// The `actor` label defaults to empty and the `activity` label to the name of
/// the operation's type.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
/// use reattempt::{RetryConfig, unsync::retry};
///
/// # #[tokio::main]
/// # async fn main() {
/// let calls = &AtomicU32::new(0);
/// let config = RetryConfig::builder()
///     .max_retry(3)
///     .delay(Duration::from_millis(1))
///     .is_retry(|status: &u16| *status >= 500)
///     .build();
///
/// let result = retry(&config, || async move {
///     if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///         Err(503)
///     } else {
///         Ok("hello")
///     }
/// })
/// .await;
///
/// assert_eq!(result.unwrap(), "hello");
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # }
/// ```
pub async fn retry<OP, F, R, T, E>(config: &RetryConfig<E>, operation: OP) -> Result<T, RetryError<E>>
where
    OP: FnMut() -> F,
    F: Future<Output = R>,
    R: Into<Result<T, E>>,
    E: Debug,
{
    config.validate()?;
    let labels = config.labels::<OP>("");
    drive(config, labels, operation).await
}

/// Execute an asynchronous operation on a receiver with positional arguments,
/// retrying it according to `config` if it fails.
///
/// Behaves like [`retry`], except that every attempt calls
/// `operation(receiver, args.clone())`: the caller's arguments are never
/// changed between attempts. The `actor` label defaults to the receiver's
/// [`Actor::actor_name`].
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
/// use reattempt::{Actor, RetryConfig, unsync::retry_on};
///
/// struct Greeter {
///     calls: AtomicU32,
/// }
///
/// impl Actor for Greeter {
///     fn actor_name(&self) -> &str {
///         "Greeter"
///     }
/// }
///
/// impl Greeter {
///     async fn greet(&self, name: String) -> Result<String, &'static str> {
///         if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
///             Err("busy")
///         } else {
///             Ok(format!("hello {name}"))
///         }
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let greeter = Greeter { calls: AtomicU32::new(0) };
/// let config = RetryConfig::builder().delay(Duration::from_millis(1)).build();
///
/// let greeting = retry_on(&config, &greeter, "bob".to_string(), Greeter::greet).await;
/// assert_eq!(greeting.unwrap(), "hello bob");
/// # }
/// ```
pub async fn retry_on<'r, C, A, OP, F, R, T, E>(
    config: &RetryConfig<E>,
    receiver: &'r C,
    args: A,
    mut operation: OP,
) -> Result<T, RetryError<E>>
where
    C: Actor + ?Sized,
    A: Clone,
    OP: FnMut(&'r C, A) -> F,
    F: Future<Output = R>,
    R: Into<Result<T, E>>,
    E: Debug,
{
    config.validate()?;
    let labels = config.labels::<OP>(receiver.actor_name());
    drive(config, labels, || operation(receiver, args.clone())).await
}

async fn drive<OP, F, R, T, E>(
    config: &RetryConfig<E>,
    labels: Labels,
    mut operation: OP,
) -> Result<T, RetryError<E>>
where
    OP: FnMut() -> F,
    F: Future<Output = R>,
    R: Into<Result<T, E>>,
    E: Debug,
{
    let mut session = Session::new(labels);

    loop {
        let started = Instant::now();
        // Invoke the factory to obtain a new Future for this attempt.
        match operation().await.into() {
            Ok(result) => return Ok(result),
            Err(err) => match session.fail(config, started.elapsed(), err) {
                Step::Retry(delay) => sleep(delay).await,
                Step::Exhausted => return Err(session.reached_max_retry()),
                Step::Abort(err) => return Err(err),
            },
        }
    }
}
