//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! One request per call, no internal retry: throttling surfaces as
//! [`ScanError::RateLimited`] and the caller's retry policy decides.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use liqindex_core::error::ScanError;
use liqindex_core::types::{BlockSummary, EventFilter};

use crate::client::{block_from_json, decode_hex, parse_hex_u64, EvmRpcClient, RawLog};
use crate::request::{is_rate_limit_message, JsonRpcRequest, JsonRpcResponse};

/// JSON-RPC client for one network endpoint.
pub struct HttpEvmClient {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl HttpEvmClient {
    /// Create a client for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, ScanError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ScanError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(&self, method: &'static str, params: Vec<Value>) -> Result<Value, ScanError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(self.rate_limited());
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if is_rate_limit_message(&body) {
                return Err(self.rate_limited());
            }
            return Err(ScanError::Rpc(format!("HTTP {}: {body}", status.as_u16())));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| ScanError::Rpc(format!("{method}: malformed response: {e}")))?
            .into_result(&self.url)
    }

    fn transport_error(&self, e: reqwest::Error) -> ScanError {
        if e.is_timeout() {
            ScanError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            self.rate_limited()
        } else {
            ScanError::Rpc(e.to_string())
        }
    }

    fn rate_limited(&self) -> ScanError {
        ScanError::RateLimited {
            endpoint: self.url.clone(),
        }
    }
}

/// `eth_getLogs` filter object for a block range.
pub(crate) fn logs_filter(from: u64, to: u64, filter: &EventFilter) -> Value {
    let mut obj = json!({
        "fromBlock": format!("0x{from:x}"),
        "toBlock": format!("0x{to:x}"),
    });
    if !filter.addresses.is_empty() {
        obj["address"] = json!(filter.addresses);
    }
    match filter.topic0_values.len() {
        0 => {}
        1 => obj["topics"] = json!([filter.topic0_values[0]]),
        _ => obj["topics"] = json!([filter.topic0_values]),
    }
    obj
}

#[async_trait]
impl EvmRpcClient for HttpEvmClient {
    async fn get_block_number(&self) -> Result<u64, ScanError> {
        let v = self.request("eth_blockNumber", vec![]).await?;
        let hex = v
            .as_str()
            .ok_or_else(|| ScanError::Rpc("eth_blockNumber: expected hex string".into()))?;
        parse_hex_u64(hex)
    }

    async fn get_block(&self, number: u64) -> Result<Option<BlockSummary>, ScanError> {
        let v = self
            .request(
                "eth_getBlockByNumber",
                vec![json!(format!("0x{number:x}")), json!(false)],
            )
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        block_from_json(&v).map(Some)
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &EventFilter,
    ) -> Result<Vec<RawLog>, ScanError> {
        let v = self
            .request("eth_getLogs", vec![logs_filter(from, to, filter)])
            .await?;
        serde_json::from_value(v).map_err(|e| ScanError::Rpc(format!("eth_getLogs: {e}")))
    }

    async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, ScanError> {
        let v = self
            .request(
                "eth_call",
                vec![
                    json!({ "to": to, "data": format!("0x{}", hex::encode(data)) }),
                    json!("latest"),
                ],
            )
            .await?;
        let hex = v
            .as_str()
            .ok_or_else(|| ScanError::Rpc("eth_call: expected hex string".into()))?;
        decode_hex(hex)
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
