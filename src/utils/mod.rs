//! Common utilities and helpers

pub mod retry;

pub use retry::{with_retry, RetryConfig};
