//! History of the failed attempts of one retry session.
use std::time::Duration;

/// One failed attempt: how long the operation ran and what it failed with.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt<E> {
    pub elapsed: Duration,
    pub error: E,
}

/// The failed attempts of a session, in the order they happened.
///
/// Only ever appended to while the session runs; handed to the caller inside
/// the terminal [`RetryError`](crate::RetryError).
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptLog<E> {
    attempts: Vec<Attempt<E>>,
}

impl<E> AttemptLog<E> {
    pub(crate) fn push(&mut self, attempt: Attempt<E>) {
        self.attempts.push(attempt);
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// The most recent failure, i.e. the one that ended the session.
    pub fn last(&self) -> Option<&Attempt<E>> {
        self.attempts.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attempt<E>> {
        self.attempts.iter()
    }

    pub fn as_slice(&self) -> &[Attempt<E>] {
        &self.attempts
    }

    /// Total time spent inside the operation, delays excluded.
    pub fn elapsed(&self) -> Duration {
        self.attempts.iter().map(|attempt| attempt.elapsed).sum()
    }

    pub fn into_vec(self) -> Vec<Attempt<E>> {
        self.attempts
    }
}

impl<E> Default for AttemptLog<E> {
    fn default() -> Self {
        AttemptLog {
            attempts: Vec::new(),
        }
    }
}

impl<E> IntoIterator for AttemptLog<E> {
    type Item = Attempt<E>;
    type IntoIter = std::vec::IntoIter<Attempt<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.attempts.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a AttemptLog<E> {
    type Item = &'a Attempt<E>;
    type IntoIter = std::slice::Iter<'a, Attempt<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.attempts.iter()
    }
}

#[test]
fn log_keeps_order_and_sums_elapsed() {
    let mut log = AttemptLog::default();
    assert!(log.is_empty());

    log.push(Attempt {
        elapsed: Duration::from_millis(5),
        error: "first",
    });
    log.push(Attempt {
        elapsed: Duration::from_millis(7),
        error: "second",
    });

    assert_eq!(log.len(), 2);
    assert_eq!(log.elapsed(), Duration::from_millis(12));
    assert_eq!(log.last().map(|attempt| attempt.error), Some("second"));
    let errors: Vec<_> = log.into_iter().map(|attempt| attempt.error).collect();
    assert_eq!(errors, vec!["first", "second"]);
}
