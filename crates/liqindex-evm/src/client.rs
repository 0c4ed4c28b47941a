//! The node capabilities the scanner consumes, and the raw log shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use liqindex_core::error::ScanError;
use liqindex_core::types::{BlockSummary, EventFilter};

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    #[serde(rename = "data")]
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "removed")]
    pub removed: Option<bool>,
}

impl RawLog {
    /// Returns the block number as u64.
    pub fn block_number_u64(&self) -> Result<u64, ScanError> {
        parse_hex_u64(&self.block_number)
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }

    /// Transaction hash, lower-cased.
    pub fn tx_hash_lower(&self) -> String {
        self.tx_hash.to_ascii_lowercase()
    }
}

/// Read-only access to one chain.
///
/// Implementations must be `Send + Sync`; several networks may be scanned
/// concurrently, each through its own client.
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    /// Current head block number.
    async fn get_block_number(&self) -> Result<u64, ScanError>;

    /// Block header by number; `None` if the node does not know the block.
    async fn get_block(&self, number: u64) -> Result<Option<BlockSummary>, ScanError>;

    /// Logs in `[from, to]` matching the filter.
    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &EventFilter,
    ) -> Result<Vec<RawLog>, ScanError>;

    /// `eth_call` against `to` at the latest block, returning the raw result.
    async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, ScanError>;

    /// Endpoint identifier for logs.
    fn endpoint(&self) -> &str;
}

/// Parse a hex-encoded quantity (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Result<u64, ScanError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ScanError::Decode(format!("invalid hex quantity {s:?}: {e}")))
}

/// Decode `0x…` hex into bytes.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, ScanError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| ScanError::Decode(format!("invalid hex: {e}")))
}

/// Convert a `Value` JSON block response to `BlockSummary`.
pub fn block_from_json(v: &Value) -> Result<BlockSummary, ScanError> {
    let field = |name: &str| {
        v[name]
            .as_str()
            .ok_or_else(|| ScanError::Decode(format!("block is missing {name}")))
            .and_then(parse_hex_u64)
    };
    let timestamp = field("timestamp")?;
    Ok(BlockSummary {
        number: field("number")?,
        timestamp: i64::try_from(timestamp)
            .map_err(|_| ScanError::Decode(format!("block timestamp {timestamp} out of range")))?,
    })
}
