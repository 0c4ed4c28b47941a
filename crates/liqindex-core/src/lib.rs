//! liqindex-core: foundation for the multi-chain liquidation indexer.
//!
//! # Architecture
//!
//! ```text
//! ChainScanner (liqindex-evm)
//!     ├── BlockTimestampResolver  (date → block bounds)
//!     ├── LogFetcher + RetryPolicy (chunked eth_getLogs)
//!     ├── LiquidationDecoder      (raw log → LiquidationEvent)
//!     ├── CheckpointBook          (per-controller resume points)
//!     └── LedgerStore             (append-only, deduplicated by tx hash)
//! ```
//!
//! This crate holds everything that does not talk to a node: configuration,
//! domain records, the cursor, the storage traits and the retry policy.

pub mod checkpoint;
pub mod config;
pub mod cursor;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod types;

pub use checkpoint::{checkpoint_key, CheckpointBook, CheckpointMap, CheckpointStore, MemoryCheckpointStore};
pub use config::{ControllerConfig, IndexerConfig, NetworkConfig, ScannerSettings};
pub use cursor::ScanCursor;
pub use error::ScanError;
pub use ledger::{LedgerStore, MemoryLedger};
pub use policy::{RetryConfig, RetryPolicy, Sleeper, TokioSleeper};
pub use types::{BlockSummary, EventFilter, LiquidationEvent, LossBreakdown};
