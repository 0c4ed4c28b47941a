//! JSON-RPC 2.0 wire types and provider error classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use liqindex_core::error::ScanError;

/// JSON-RPC error codes providers use to signal throttling.
pub const RATE_LIMIT_CODES: [i64; 2] = [429, -32005];

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &'static str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The result value, or the classified error.
    pub fn into_result(self, endpoint: &str) -> Result<Value, ScanError> {
        match self.error {
            Some(err) => Err(classify_rpc_error(&err, endpoint)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Returns `true` if a provider message reads as throttling.
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit")
}

/// Map a JSON-RPC error object to a `ScanError`.
pub fn classify_rpc_error(err: &JsonRpcError, endpoint: &str) -> ScanError {
    if RATE_LIMIT_CODES.contains(&err.code) || is_rate_limit_message(&err.message) {
        ScanError::RateLimited {
            endpoint: endpoint.to_string(),
        }
    } else {
        ScanError::Rpc(err.to_string())
    }
}
