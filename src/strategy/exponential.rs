use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Randomized exponential backoff.
///
/// The delay for attempt index `n` is
/// `min(jitter * min_timeout * factor^n, max_timeout)`, where `jitter` is drawn
/// uniformly from `[1, 2)` when randomization is on and is exactly `1` when it
/// is off. The index counts the failed attempts that came before the one being
/// delayed, so the first retry uses index `0`.
///
/// An [`Exponential`] is also an iterator yielding the delays for index `0`,
/// `1`, `2`, and so on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exponential {
    min_timeout: Duration,
    max_timeout: Duration,
    factor: f64,
    randomize: bool,
    next_attempt: u32,
}

impl Exponential {
    /// Create a new [`Exponential`] using the given millisecond duration as the minimum delay,
    /// a factor of `2.0`, no upper bound and randomization on.
    pub fn from_millis(min_timeout: u64) -> Self {
        Exponential {
            min_timeout: Duration::from_millis(min_timeout),
            ..Exponential::default()
        }
    }

    /// Create a new [`Exponential`] using the given millisecond duration as the minimum delay
    /// and the given growth factor.
    pub fn from_millis_with_factor(min_timeout: u64, factor: f64) -> Self {
        Exponential {
            min_timeout: Duration::from_millis(min_timeout),
            factor,
            ..Exponential::default()
        }
    }

    /// Cap every delay at `max_timeout`.
    pub fn max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Turn jitter on or off. With jitter off the delays are deterministic.
    pub fn randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Compute the delay for the given attempt index.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.randomize {
            rand::rng().random_range(1.0..2.0)
        } else {
            1.0
        };

        let raw = self.min_timeout.as_secs_f64() * jitter * self.factor.powf(f64::from(attempt));
        if raw.is_nan() || raw >= self.max_timeout.as_secs_f64() {
            return self.max_timeout;
        }

        Duration::try_from_secs_f64(raw)
            .unwrap_or(self.max_timeout)
            .max(self.min_timeout)
            .min(self.max_timeout)
    }

    /// Turn this backoff into a plain `attempt -> delay` function.
    pub fn generator(self) -> impl Fn(u32) -> Duration + Send + Sync + 'static {
        move |attempt| self.delay(attempt)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.min_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "min_timeout",
                "a positive duration",
                self.min_timeout,
            ));
        }
        if self.max_timeout < self.min_timeout {
            return Err(ConfigError::invalid(
                "max_timeout",
                "a duration no shorter than min_timeout",
                self.max_timeout,
            ));
        }
        if !(self.factor.is_finite() && self.factor >= 1.0) {
            return Err(ConfigError::invalid(
                "factor",
                "a finite number of at least 1",
                self.factor,
            ));
        }
        Ok(())
    }
}

impl Default for Exponential {
    /// 20ms minimum delay, unbounded, doubling, randomized.
    fn default() -> Self {
        Exponential {
            min_timeout: Duration::from_millis(20),
            max_timeout: Duration::MAX,
            factor: 2.0,
            randomize: true,
            next_attempt: 0,
        }
    }
}

impl Iterator for Exponential {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let duration = self.delay(self.next_attempt);
        self.next_attempt = self.next_attempt.saturating_add(1);
        Some(duration)
    }
}

impl From<Duration> for Exponential {
    fn from(duration: Duration) -> Self {
        Exponential {
            min_timeout: duration,
            ..Exponential::default()
        }
    }
}
