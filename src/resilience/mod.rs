//! Resilience primitives for talking to rate-limited scholarly APIs.

pub mod retry;

pub use retry::{retry_with_config, RetryConfig};
