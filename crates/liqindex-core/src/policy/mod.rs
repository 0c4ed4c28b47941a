//! Reliability policy for provider calls.
//!
//! ```text
//! call → [RetryPolicy: rate limited? sleep 2^n s + jitter, up to N times] → provider
//! ```

pub mod retry;

pub use retry::{RecordingSleeper, RetryConfig, RetryPolicy, Sleeper, TokioSleeper};
