//! Error types for the liquidation indexer.

use thiserror::Error;

/// Errors that can occur while scanning, decoding or persisting.
///
/// None of these abort a run on their own: the orchestrator logs them and
/// degrades (skip the network, skip the chunk, skip the log, fall back to a
/// default). Only startup (config loading) treats them as fatal.
#[derive(Debug, Error)]
pub enum ScanError {
    /// JSON-RPC or HTTP failure that is not a rate limit.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The provider rejected the call because of its request budget.
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimited { endpoint: String },

    /// The endpoint could not be reached at all.
    #[error("Cannot connect to {network}: {reason}")]
    Connectivity { network: String, reason: String },

    /// A call did not finish within the configured timeout.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// A log or call result did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl ScanError {
    /// Returns `true` if the provider asked us to back off.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns `true` if the error is transient and worth retrying.
    ///
    /// Only rate limits qualify: other RPC failures degrade immediately.
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limited()
    }
}

impl From<std::io::Error> for ScanError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
