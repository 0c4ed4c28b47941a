//! liqindex-storage: durable backends for the ledger and the checkpoints.
//!
//! Backends:
//! - [`json`]: two pretty-printed JSON files, rewritten atomically
//! - [`sqlite`]: SQLite via `sqlx` (feature `sqlite`)
//!
//! In-memory implementations live next to the traits in `liqindex-core`.

pub mod json;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use json::{JsonCheckpointStore, JsonLedger};
