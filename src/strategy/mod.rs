//! Delay strategies for retryable operations.

/// Randomized exponential backoff, capped at a maximum delay.
pub mod exponential;
pub use exponential::Exponential;
