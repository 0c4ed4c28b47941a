//! JSON file backends.
//!
//! The checkpoint file is a flat object of `"{network}_{controller}"` →
//! last scanned block; the ledger file is an array of liquidation records.
//! Both are replaced by writing a sibling temp file and renaming it over the
//! target, so a crash mid-write leaves the previous version intact.
//!
//! An unreadable checkpoint file is logged and treated as empty (the scan
//! restarts from creation blocks and the ledger dedups). An unreadable
//! ledger is an error: appending to it would drop every stored record.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use liqindex_core::checkpoint::{CheckpointMap, CheckpointStore};
use liqindex_core::error::ScanError;
use liqindex_core::ledger::{merge_new, LedgerStore};
use liqindex_core::types::LiquidationEvent;

// ─── File helpers ─────────────────────────────────────────────────────────────

/// Parse `path`, or `None` if it does not exist or is blank.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ScanError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ScanError::Storage(format!("{}: {e}", path.display()))),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ScanError::Storage(format!("{}: {e}", path.display())))
}

/// Write `value` to `path` via a temp file + rename.
async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ScanError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = temp_path(path);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| ScanError::Storage(format!("{}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| ScanError::Storage(format!("{}: {e}", path.display())))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ─── Checkpoints ──────────────────────────────────────────────────────────────

pub struct JsonCheckpointStore {
    path: PathBuf,
    write: Mutex<()>,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }
}

#[async_trait]
impl CheckpointStore for JsonCheckpointStore {
    async fn load(&self) -> Result<CheckpointMap, ScanError> {
        match read_json::<CheckpointMap>(&self.path).await {
            Ok(map) => Ok(map.unwrap_or_default()),
            Err(e) => {
                tracing::error!(error = %e, "checkpoint file unreadable, starting from creation blocks");
                Ok(CheckpointMap::new())
            }
        }
    }

    async fn save(&self, map: &CheckpointMap) -> Result<(), ScanError> {
        let _guard = self.write.lock().await;
        write_json_atomic(&self.path, map).await
    }
}

// ─── Ledger ───────────────────────────────────────────────────────────────────

pub struct JsonLedger {
    path: PathBuf,
    write: Mutex<()>,
}

impl JsonLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<LiquidationEvent>, ScanError> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl LedgerStore for JsonLedger {
    async fn append(&self, events: &[LiquidationEvent]) -> Result<usize, ScanError> {
        let _guard = self.write.lock().await;
        let mut stored = self.read_all().await?;
        let added = merge_new(&mut stored, events);
        if added > 0 {
            write_json_atomic(&self.path, &stored).await?;
            tracing::debug!(added, total = stored.len(), "ledger written");
        }
        Ok(added)
    }

    async fn load(&self) -> Result<Vec<LiquidationEvent>, ScanError> {
        let _guard = self.write.lock().await;
        self.read_all().await
    }
}
