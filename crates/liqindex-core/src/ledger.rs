//! The liquidation ledger: append-only, deduplicated by transaction hash.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::ScanError;
use crate::types::LiquidationEvent;

/// Persistent store of accepted liquidation events.
///
/// Records are never mutated or removed. `tx_hash` is the only dedup key.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append the events whose `tx_hash` is not stored yet.
    ///
    /// Returns how many were actually added.
    async fn append(&self, events: &[LiquidationEvent]) -> Result<usize, ScanError>;

    /// All stored events, in insertion order.
    async fn load(&self) -> Result<Vec<LiquidationEvent>, ScanError>;
}

/// Append to `existing` every event of `incoming` with an unseen `tx_hash`.
///
/// Duplicates inside `incoming` are collapsed too. Returns the number added.
pub fn merge_new(existing: &mut Vec<LiquidationEvent>, incoming: &[LiquidationEvent]) -> usize {
    let mut seen: HashSet<String> = existing
        .iter()
        .map(|e| e.tx_hash.to_ascii_lowercase())
        .collect();
    let before = existing.len();
    for event in incoming {
        if seen.insert(event.tx_hash.to_ascii_lowercase()) {
            existing.push(event.clone());
        }
    }
    existing.len() - before
}

// ─── In-memory ledger ─────────────────────────────────────────────────────────

/// In-memory ledger. All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryLedger {
    events: Mutex<Vec<LiquidationEvent>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events.
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn append(&self, events: &[LiquidationEvent]) -> Result<usize, ScanError> {
        let mut stored = self
            .events
            .lock()
            .map_err(|e| ScanError::Storage(e.to_string()))?;
        Ok(merge_new(&mut stored, events))
    }

    async fn load(&self) -> Result<Vec<LiquidationEvent>, ScanError> {
        self.events
            .lock()
            .map(|e| e.clone())
            .map_err(|e| ScanError::Storage(e.to_string()))
    }
}
