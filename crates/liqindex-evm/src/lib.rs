//! liqindex-evm: everything that talks to an EVM node.
//!
//! - [`client`]: the `EvmRpcClient` capability trait and raw log type
//! - [`http`]: JSON-RPC over HTTP via `reqwest`
//! - [`fetcher`]: retrying provider access and the chunk log fetcher
//! - [`resolver`]: UTC timestamp → block number
//! - [`metadata`]: per-controller collateral decimals and discount cache
//! - [`decoder`]: `Liquidate` log → `LiquidationEvent`
//! - [`scanner`]: the multi-network, checkpointed scan loop

pub mod client;
pub mod decoder;
pub mod fetcher;
pub mod http;
pub mod metadata;
pub mod request;
pub mod resolver;
pub mod scanner;
pub mod signature;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{EvmRpcClient, RawLog};
pub use decoder::{Decoded, LiquidationDecoder, SkipReason};
pub use fetcher::{EvmFetcher, FetchedLogs, LogFetcher};
pub use http::HttpEvmClient;
pub use metadata::{BlockTimeCache, ControllerMetadataCache};
pub use resolver::BlockTimestampResolver;
pub use scanner::{ChainScanner, NetworkReport, NetworkStatus, ScanSummary, ScanWindow};
