//! UTC timestamp → block number.
//!
//! Binary search over `[1, head]` on block timestamps. Any probed block
//! within the tolerance of the target is accepted, so the answer is not
//! necessarily the first block at or after the target.
//!
//! The resolver never fails a scan once the head is known: if the search
//! collapses without a match, or a block lookup errors (some PoA chains
//! return headers the client cannot parse), it answers with the chain head.

use std::sync::Arc;

use liqindex_core::error::ScanError;

use crate::fetcher::EvmFetcher;

pub struct BlockTimestampResolver {
    fetcher: Arc<EvmFetcher>,
    tolerance_secs: i64,
}

impl BlockTimestampResolver {
    pub fn new(fetcher: Arc<EvmFetcher>, tolerance_secs: u64) -> Self {
        Self {
            fetcher,
            tolerance_secs: tolerance_secs as i64,
        }
    }

    /// A block whose timestamp is within the tolerance of `target_ts`, or the
    /// head if none is found.
    ///
    /// Fails only when the head itself cannot be read.
    pub async fn resolve(&self, target_ts: i64) -> Result<u64, ScanError> {
        let head = self.fetcher.head_block_number().await?;
        let mut low = 1u64;
        let mut high = head;
        let mut last_probed = head;

        while low <= high {
            let mid = low + (high - low) / 2;
            let block = match self.fetcher.block(mid).await {
                Ok(Some(block)) => block,
                Ok(None) => {
                    tracing::warn!(block = mid, "block missing during timestamp search");
                    return Ok(self.head_or(head).await);
                }
                Err(e) => {
                    tracing::warn!(
                        block = mid,
                        error = %e,
                        "block lookup failed during timestamp search, using head"
                    );
                    return Ok(self.head_or(head).await);
                }
            };
            last_probed = mid;

            if (block.timestamp - target_ts).abs() <= self.tolerance_secs {
                tracing::debug!(target_ts, block = mid, "timestamp resolved");
                return Ok(mid);
            }
            if block.timestamp < target_ts {
                low = mid + 1;
            } else {
                high = mid - 1;
            }
        }

        tracing::warn!(target_ts, "no block within tolerance, using head");
        Ok(self.head_or(last_probed).await)
    }

    /// Fresh head, or `fallback` if that read fails too.
    async fn head_or(&self, fallback: u64) -> u64 {
        match self.fetcher.head_block_number().await {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!(error = %e, fallback, "head unavailable, using last known block");
                fallback
            }
        }
    }
}
