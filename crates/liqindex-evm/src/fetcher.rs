//! Retrying provider access and the chunk log fetcher.
//!
//! [`EvmFetcher`] wraps every provider call in the run's [`RetryPolicy`], so
//! a throttled call is retried with jittered exponential backoff before the
//! error reaches the caller. [`LogFetcher`] sits on top of it and never
//! fails: a chunk whose logs cannot be fetched comes back empty, flagged as
//! degraded.

use std::sync::Arc;

use liqindex_core::error::ScanError;
use liqindex_core::policy::RetryPolicy;
use liqindex_core::types::{BlockSummary, EventFilter};

use crate::client::{EvmRpcClient, RawLog};

/// Provider access with rate-limit retry on every call.
pub struct EvmFetcher {
    client: Arc<dyn EvmRpcClient>,
    retry: RetryPolicy,
}

impl EvmFetcher {
    pub fn new(client: Arc<dyn EvmRpcClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub async fn head_block_number(&self) -> Result<u64, ScanError> {
        self.retry
            .run("eth_blockNumber", || self.client.get_block_number())
            .await
    }

    pub async fn block(&self, number: u64) -> Result<Option<BlockSummary>, ScanError> {
        self.retry
            .run("eth_getBlockByNumber", || self.client.get_block(number))
            .await
    }

    pub async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, ScanError> {
        self.retry.run("eth_call", || self.client.call(to, data)).await
    }

    pub async fn logs(
        &self,
        from: u64,
        to: u64,
        filter: &EventFilter,
    ) -> Result<Vec<RawLog>, ScanError> {
        self.retry
            .run("eth_getLogs", || self.client.get_logs(from, to, filter))
            .await
    }
}

/// Logs for one chunk.
#[derive(Debug, Default)]
pub struct FetchedLogs {
    pub logs: Vec<RawLog>,
    /// The query failed and `logs` is empty regardless of what the chain holds.
    pub degraded: bool,
}

/// Fetches one event type's logs for a block range and a set of emitters.
pub struct LogFetcher {
    fetcher: Arc<EvmFetcher>,
    topic0: String,
}

impl LogFetcher {
    pub fn new(fetcher: Arc<EvmFetcher>, topic0: impl Into<String>) -> Self {
        Self {
            fetcher,
            topic0: topic0.into(),
        }
    }

    /// Logs in `[from, to]` emitted by any of `addresses`.
    ///
    /// Exhausted retries and provider errors are logged and yield an empty,
    /// degraded result. The caller still treats the range as scanned.
    pub async fn fetch(&self, from: u64, to: u64, addresses: &[String]) -> FetchedLogs {
        let filter = EventFilter::addresses(addresses.iter().cloned()).topic0(self.topic0.clone());

        match self.fetcher.logs(from, to, &filter).await {
            Ok(logs) => {
                tracing::debug!(from, to, count = logs.len(), "logs fetched");
                FetchedLogs {
                    logs,
                    degraded: false,
                }
            }
            Err(e) if e.is_rate_limited() => {
                tracing::error!(
                    from,
                    to,
                    endpoint = self.fetcher.endpoint(),
                    "rate limit persisted after all retries, chunk left empty"
                );
                FetchedLogs {
                    logs: Vec::new(),
                    degraded: true,
                }
            }
            Err(e) => {
                tracing::error!(from, to, error = %e, "log query failed, chunk left empty");
                FetchedLogs {
                    logs: Vec::new(),
                    degraded: true,
                }
            }
        }
    }
}
