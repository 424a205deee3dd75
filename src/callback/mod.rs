//! Retry driver for operations that report completion through a callback.
//!
//! The driver never waits. It calls the operation with a fresh [`Completion`]
//! as the last argument and returns. Everything else happens when the
//! operation settles that completion: on failure the next attempt is
//! scheduled on the tokio runtime after the configured delay, carrying the
//! session (attempt count and log) along with it.
use std::fmt::{self, Debug};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::time::{Instant, sleep};

use crate::config::{Actor, Labels, RetryConfig};
use crate::error::{ConfigError, RetryError};
use crate::session::{Session, Step};

/// Handle through which an operation reports the outcome of one attempt.
///
/// It is consumed when used, so an attempt settles at most once. Dropping it
/// without settling leaves the session pending forever.
pub struct Completion<T, E> {
    settle: Box<dyn FnOnce(Result<T, E>) + Send>,
}

impl<T, E> Completion<T, E> {
    fn new(settle: impl FnOnce(Result<T, E>) + Send + 'static) -> Self {
        Completion {
            settle: Box::new(settle),
        }
    }

    pub fn complete(self, result: Result<T, E>) {
        (self.settle)(result)
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value))
    }

    pub fn fail(self, error: E) {
        self.complete(Err(error))
    }
}

impl<T, E> Debug for Completion<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Call an operation that reports through a [`Completion`], retrying it
/// according to `config` if it fails, and hand the final outcome to `callback`.
///
/// `callback` is invoked exactly once per session, with the operation's value
/// on success or with [`RetryError::CannotRetry`] / [`RetryError::ReachedMaxRetry`]
/// otherwise. It may run on the caller's stack (when the operation settles
/// synchronously) or on a tokio worker.
///
/// Must be called from within a tokio runtime. Configuration problems and a
/// missing runtime are returned right away, before the first attempt, and
/// `callback` is not invoked.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use reattempt::{RetryConfig, callback::{Completion, retry}};
/// use tokio::sync::oneshot;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = RetryConfig::builder().delay(Duration::from_millis(1)).build();
/// let (tx, rx) = oneshot::channel();
///
/// retry(
///     config,
///     |done: Completion<&'static str, &'static str>| {
///         tokio::spawn(async move { done.succeed("hello") });
///     },
///     move |result| {
///         let _ = tx.send(result);
///     },
/// )
/// .unwrap();
///
/// assert_eq!(rx.await.unwrap().unwrap(), "hello");
/// # }
/// ```
pub fn retry<OP, T, E, CB>(config: RetryConfig<E>, operation: OP, callback: CB) -> Result<(), ConfigError>
where
    OP: Fn(Completion<T, E>) + Send + Sync + 'static,
    T: Send + 'static,
    E: Debug + Send + 'static,
    CB: FnOnce(Result<T, RetryError<E>>) + Send + 'static,
{
    let labels = config.labels::<OP>("");
    start(
        config,
        labels,
        Arc::new(()),
        (),
        move |_: &(), _: (), done| operation(done),
        callback,
    )
}

/// Call an operation on a receiver with positional arguments and a trailing
/// [`Completion`], retrying it according to `config` if it fails.
///
/// Behaves like [`retry`], except that every attempt calls
/// `operation(&receiver, args.clone(), completion)`. The caller's arguments
/// are never changed, and each attempt gets its own completion. The `actor`
/// label defaults to the receiver's [`Actor::actor_name`].
pub fn retry_on<C, A, OP, T, E, CB>(
    config: RetryConfig<E>,
    receiver: Arc<C>,
    args: A,
    operation: OP,
    callback: CB,
) -> Result<(), ConfigError>
where
    C: Actor + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    OP: Fn(&C, A, Completion<T, E>) + Send + Sync + 'static,
    T: Send + 'static,
    E: Debug + Send + 'static,
    CB: FnOnce(Result<T, RetryError<E>>) + Send + 'static,
{
    let labels = config.labels::<OP>(receiver.actor_name());
    start(config, labels, receiver, args, operation, callback)
}

fn start<C, A, OP, T, E, CB>(
    config: RetryConfig<E>,
    labels: Labels,
    receiver: Arc<C>,
    args: A,
    operation: OP,
    callback: CB,
) -> Result<(), ConfigError>
where
    C: Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    OP: Fn(&C, A, Completion<T, E>) + Send + Sync + 'static,
    T: Send + 'static,
    E: Debug + Send + 'static,
    CB: FnOnce(Result<T, RetryError<E>>) + Send + 'static,
{
    config.validate()?;
    let runtime = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;

    Reentry {
        shared: Arc::new(Shared {
            config,
            receiver,
            args,
            operation,
            runtime,
        }),
        session: Session::new(labels),
        callback: Box::new(callback),
    }
    .enter();
    Ok(())
}

/// Everything that stays the same across the attempts of a session.
struct Shared<C, A, OP, E> {
    config: RetryConfig<E>,
    receiver: Arc<C>,
    args: A,
    operation: OP,
    runtime: Handle,
}

/// A session between attempts. Owned by exactly one of: the running
/// [`Completion`], the delay task, or the driver entry point.
struct Reentry<C, A, OP, T, E> {
    shared: Arc<Shared<C, A, OP, E>>,
    session: Session<E>,
    callback: Box<dyn FnOnce(Result<T, RetryError<E>>) + Send>,
}

impl<C, A, OP, T, E> Reentry<C, A, OP, T, E>
where
    C: Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    OP: Fn(&C, A, Completion<T, E>) + Send + Sync + 'static,
    T: Send + 'static,
    E: Debug + Send + 'static,
{
    fn enter(self) {
        if self.session.is_exhausted(&self.shared.config) {
            (self.callback)(Err(self.session.reached_max_retry()));
            return;
        }

        let started = Instant::now();
        let shared = Arc::clone(&self.shared);
        let done = Completion::new(move |outcome| self.settle(started, outcome));
        (shared.operation)(&*shared.receiver, shared.args.clone(), done);
    }

    fn settle(mut self, started: Instant, outcome: Result<T, E>) {
        let err = match outcome {
            Ok(value) => return (self.callback)(Ok(value)),
            Err(err) => err,
        };

        match self.session.fail(&self.shared.config, started.elapsed(), err) {
            Step::Retry(delay) => {
                let runtime = self.shared.runtime.clone();
                runtime.spawn(async move {
                    sleep(delay).await;
                    self.enter();
                });
            }
            // Re-enter right away; the exhaustion check there ends the session.
            Step::Exhausted => self.enter(),
            Step::Abort(err) => (self.callback)(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::strategy::Exponential;

    type Outcome<T> = Result<T, RetryError<&'static str>>;

    fn config(max_retry: u32) -> RetryConfig<&'static str> {
        RetryConfig::builder()
            .max_retry(max_retry)
            .delay(Duration::from_millis(1))
            .build()
    }

    fn channel<T>() -> (impl FnOnce(T) + Send + 'static, oneshot::Receiver<T>)
    where
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        (
            move |outcome| {
                let _ = tx.send(outcome);
            },
            rx,
        )
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let (callback, rx) = channel::<Outcome<&str>>();

        retry(
            config(3),
            move |done: Completion<&'static str, &'static str>| {
                if calls_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    done.fail("busy")
                } else {
                    done.succeed("hello")
                }
            },
            callback,
        )
        .unwrap();

        assert_eq!(rx.await.unwrap().unwrap(), "hello");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn settles_from_another_task() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let (callback, rx) = channel::<Outcome<u32>>();

        retry(
            config(3),
            move |done: Completion<u32, &'static str>| {
                let attempt = calls_clone.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    sleep(Duration::from_millis(2)).await;
                    if attempt == 0 {
                        done.fail("busy")
                    } else {
                        done.succeed(attempt)
                    }
                });
            },
            callback,
        )
        .unwrap();

        assert_eq!(rx.await.unwrap().unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reaches_max_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let (callback, rx) = channel::<Outcome<()>>();

        retry(
            config(4),
            move |done: Completion<(), &'static str>| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                done.fail("busy")
            },
            callback,
        )
        .unwrap();

        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_reached_max_retry());
        assert_eq!(err.log().map(|log| log.len()), Some(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn stops_on_ineligible_error() {
        let errors = Arc::new(Mutex::new(vec!["busy", "bad request", "busy"].into_iter()));
        let errors_clone = errors.clone();
        let config = RetryConfig::<&'static str>::builder()
            .max_retry(10)
            .delay(Duration::from_millis(1))
            .is_retry(|err| *err != "bad request")
            .build();
        let (callback, rx) = channel::<Outcome<()>>();

        retry(
            config,
            move |done: Completion<(), &'static str>| {
                let next = errors_clone.lock().unwrap().next();
                done.fail(next.unwrap_or("exhausted"))
            },
            callback,
        )
        .unwrap();

        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_cannot_retry());
        let logged: Vec<_> = err.log().unwrap().iter().map(|attempt| attempt.error).collect();
        assert_eq!(logged, vec!["busy", "bad request"]);
        assert_eq!(errors.lock().unwrap().next(), Some("busy"));
    }

    #[tokio::test]
    async fn invalid_config_is_reported_synchronously() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let (callback, _rx) = channel::<Outcome<()>>();

        let res = retry(
            config(0),
            move |done: Completion<(), &'static str>| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                done.succeed(())
            },
            callback,
        );

        assert!(matches!(
            res,
            Err(ConfigError::InvalidArgument { param: "max_retry", .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn requires_a_runtime() {
        let (callback, _rx) = channel::<Outcome<()>>();

        let res = retry(
            config(3),
            |done: Completion<(), &'static str>| done.succeed(()),
            callback,
        );

        assert_eq!(res, Err(ConfigError::MissingRuntime));
    }

    #[tokio::test]
    async fn one_attempt_in_flight_at_a_time() {
        let in_flight = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));
        let (in_flight_clone, peak_clone) = (in_flight.clone(), peak.clone());
        let (callback, rx) = channel::<Outcome<()>>();

        retry(
            config(5),
            move |done: Completion<(), &'static str>| {
                let now = in_flight_clone.fetch_add(1, Ordering::SeqCst) + 1;
                peak_clone.fetch_max(now, Ordering::SeqCst);
                let in_flight = in_flight_clone.clone();
                tokio::spawn(async move {
                    sleep(Duration::from_millis(3)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    done.fail("busy")
                });
            },
            callback,
        )
        .unwrap();

        assert!(rx.await.unwrap().unwrap_err().is_reached_max_retry());
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts_but_not_after_the_last() {
        let config = RetryConfig::builder()
            .max_retry(4)
            .delay(Exponential::from_millis(100).randomize(false))
            .build();
        let (callback, rx) = channel::<Outcome<()>>();
        let started = Instant::now();

        retry(
            config,
            |done: Completion<(), &'static str>| done.fail("busy"),
            callback,
        )
        .unwrap();

        assert!(rx.await.unwrap().is_err());
        // 100 + 200 + 400
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(700));
        assert!(elapsed < Duration::from_millis(1_000));
    }

    struct Adder {
        calls: AtomicU32,
    }

    impl Actor for Adder {
        fn actor_name(&self) -> &str {
            "Adder"
        }
    }

    impl Adder {
        fn add(&self, (a, b): (u32, u32), done: Completion<u32, &'static str>) {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                done.fail("busy")
            } else {
                done.succeed(a + b)
            }
        }
    }

    #[tokio::test]
    async fn retry_on_passes_receiver_and_fresh_args() {
        let adder = Arc::new(Adder {
            calls: AtomicU32::new(0),
        });
        let (callback, rx) = channel::<Outcome<u32>>();

        retry_on(config(3), adder.clone(), (2, 3), Adder::add, callback).unwrap();

        assert_eq!(rx.await.unwrap().unwrap(), 5);
        assert_eq!(adder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_on_names_actor_after_receiver() {
        let adder = Arc::new(Adder {
            calls: AtomicU32::new(0),
        });
        let (callback, rx) = channel::<Outcome<u32>>();

        retry_on(config(1), adder, (2, 3), Adder::add, callback).unwrap();

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.actor(), Some("Adder"));
        assert_eq!(err.activity(), Some("add"));
    }
}
