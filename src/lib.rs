//! # Reattempt
//!
//! A retry harness for operations that may fail.
//!
//! `reattempt` calls an operation up to a bounded number of times, waits between
//! attempts according to a delay policy, and gives up early when a caller-supplied
//! predicate declares an error not worth retrying. Every failed attempt is kept in
//! an [`AttemptLog`] that travels with the final error.
//!
//! ## Features
//!
//! - Awaited operations through the `unsync` module
//! - Callback-driven operations through the `callback` module
//! - Fixed, custom or exponential backoff delays (see `strategy`)
//! - Two distinct terminal errors: [`RetryError::CannotRetry`] when the predicate
//!   rejects an error, [`RetryError::ReachedMaxRetry`] when every attempt failed
//!
//! ## Usage Examples
//!
//! ### Awaited operations
//!
//! ```rust
//! use std::time::Duration;
//! use reattempt::{RetryConfig, RetryError, strategy::Exponential, unsync::retry};
//!
//! #[derive(Debug)]
//! struct HttpError {
//!     status: u16,
//! }
//!
//! async fn fetch() -> Result<String, HttpError> {
//!     Err(HttpError { status: 400 })
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = RetryConfig::builder()
//!     .max_retry(5)
//!     .delay(Exponential::from_millis(20).max_timeout(Duration::from_secs(2)))
//!     .is_retry(|error: &HttpError| error.status >= 500)
//!     .build();
//!
//! match retry(&config, fetch).await {
//!     Ok(body) => println!("fetched {body}"),
//!     Err(RetryError::CannotRetry { log, .. }) => {
//!         assert_eq!(log.len(), 1);
//!     }
//!     Err(error) => println!("gave up: {error}"),
//! }
//! # }
//! ```
//!
//! ### Callback-driven operations
//!
//! ```rust
//! use std::time::Duration;
//! use reattempt::{RetryConfig, callback::{Completion, retry}};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = RetryConfig::builder().delay(Duration::from_millis(1)).build();
//! let (tx, rx) = tokio::sync::oneshot::channel();
//!
//! retry(
//!     config,
//!     |done: Completion<u32, &'static str>| done.succeed(42),
//!     move |result| {
//!         let _ = tx.send(result);
//!     },
//! )
//! .expect("valid configuration");
//!
//! assert_eq!(rx.await.unwrap().unwrap(), 42);
//! # }
//! ```
//!
//! ## Logging
//!
//! Failed attempts are reported as `tracing` events at `debug` level, and the
//! end of an unsuccessful session at `warn` level. No subscriber is installed.
pub mod callback;
pub mod config;
pub mod error;
pub mod log;
mod session;
pub mod strategy;
pub mod unsync;

pub use config::{Actor, Delay, RetryConfig, RetryConfigBuilder};
pub use error::{ConfigError, RetryError};
pub use log::{Attempt, AttemptLog};
