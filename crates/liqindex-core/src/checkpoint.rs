//! Checkpoints: the last fully scanned block per (network, controller).
//!
//! The whole map is read once when a run starts and rewritten after every
//! processed chunk, so an interrupted run loses at most the chunk in flight.
//! On disk it is a flat JSON object:
//!
//! ```json
//! { "ethereum_0xA920De414eA4Ab66b97dA1bFE9e6EcA7d4219635": 19000000 }
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::ScanError;

/// `"{network}_{controller}"` → last scanned block.
pub type CheckpointMap = BTreeMap<String, u64>;

/// Key under which a controller's checkpoint is stored.
pub fn checkpoint_key(network: &str, controller: &str) -> String {
    format!("{network}_{controller}")
}

/// Durable storage for the checkpoint map.
///
/// No merge semantics: `save` replaces whatever was stored.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the stored map (empty if nothing was saved yet).
    async fn load(&self) -> Result<CheckpointMap, ScanError>;

    /// Replace the stored map.
    async fn save(&self, map: &CheckpointMap) -> Result<(), ScanError>;
}

// ─── CheckpointBook ──────────────────────────────────────────────────────────

/// The authoritative in-memory checkpoint map for a run.
///
/// Networks scanned concurrently share one book; the lock covers both the
/// map update and the write-back so saves never interleave.
pub struct CheckpointBook {
    map: tokio::sync::Mutex<CheckpointMap>,
    store: Arc<dyn CheckpointStore>,
}

impl CheckpointBook {
    /// Read the stored map once and wrap it.
    pub async fn open(store: Arc<dyn CheckpointStore>) -> Result<Self, ScanError> {
        let map = store.load().await?;
        tracing::debug!(entries = map.len(), "checkpoints loaded");
        Ok(Self {
            map: tokio::sync::Mutex::new(map),
            store,
        })
    }

    /// Last scanned block for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<u64> {
        self.map.lock().await.get(key).copied()
    }

    /// Mark `block` as scanned for every key and persist the whole map.
    ///
    /// A key never moves backwards: rescanning an older range keeps the
    /// higher checkpoint.
    pub async fn advance(&self, keys: &[String], block: u64) -> Result<(), ScanError> {
        let mut map = self.map.lock().await;
        for key in keys {
            let entry = map.entry(key.clone()).or_insert(block);
            *entry = (*entry).max(block);
        }
        self.store.save(&map).await
    }

    /// Copy of the current map.
    pub async fn snapshot(&self) -> CheckpointMap {
        self.map.lock().await.clone()
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory checkpoint store for tests and dry runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<CheckpointMap>,
    saves: Mutex<usize>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing map.
    pub fn with_entries(map: CheckpointMap) -> Self {
        Self {
            data: Mutex::new(map),
            saves: Mutex::new(0),
        }
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<CheckpointMap, ScanError> {
        self.data
            .lock()
            .map(|m| m.clone())
            .map_err(|e| ScanError::Storage(e.to_string()))
    }

    async fn save(&self, map: &CheckpointMap) -> Result<(), ScanError> {
        *self.data.lock().map_err(|e| ScanError::Storage(e.to_string()))? = map.clone();
        if let Ok(mut n) = self.saves.lock() {
            *n += 1;
        }
        Ok(())
    }
}
