//! SQLite storage backend.
//!
//! One file holds both the ledger (`liquidations`, unique on `tx_hash`) and
//! the checkpoints (`checkpoints`, keyed like the JSON file).
//!
//! # Usage
//! ```rust,no_run
//! use liqindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStorage::open("./liquidations.db").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use liqindex_core::checkpoint::{CheckpointMap, CheckpointStore};
use liqindex_core::error::ScanError;
use liqindex_core::ledger::LedgerStore;
use liqindex_core::types::LiquidationEvent;

fn storage_err(e: sqlx::Error) -> ScanError {
    ScanError::Storage(e.to_string())
}

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a database at `path`.
    ///
    /// The path may be a plain file path (`"./liquidations.db"`) or a full
    /// SQLite URL (`"sqlite:./liquidations.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, ScanError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// In-memory database; everything is lost when the pool is dropped.
    pub async fn in_memory() -> Result<Self, ScanError> {
        // Every connection to `:memory:` is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), ScanError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                key          TEXT    PRIMARY KEY,
                block_number INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS liquidations (
                id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                tx_hash              TEXT    NOT NULL UNIQUE,
                network              TEXT    NOT NULL,
                controller           TEXT    NOT NULL,
                block_number         INTEGER NOT NULL,
                liquidation_time     TEXT    NOT NULL,
                liquidator           TEXT    NOT NULL,
                user                 TEXT    NOT NULL,
                collateral_received  REAL    NOT NULL,
                stablecoin_received  REAL    NOT NULL,
                debt_repaid          REAL    NOT NULL,
                liquidation_discount REAL    NOT NULL,
                user_loss_amount     REAL    NOT NULL,
                total_loss_value     REAL    NOT NULL,
                user_loss_percent    REAL    NOT NULL,
                collateral_token     TEXT    NOT NULL,
                platform             TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_liquidations_network ON liquidations (network);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    /// Number of stored liquidations.
    pub async fn event_count(&self) -> Result<u64, ScanError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM liquidations")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }
}

fn event_from_row(row: &SqliteRow) -> Result<LiquidationEvent, ScanError> {
    let time: String = row.get("liquidation_time");
    let liquidation_time = DateTime::parse_from_rfc3339(&time)
        .map_err(|e| ScanError::Storage(format!("bad liquidation_time {time:?}: {e}")))?
        .with_timezone(&Utc);

    Ok(LiquidationEvent {
        network: row.get("network"),
        controller: row.get("controller"),
        block_number: row.get::<i64, _>("block_number") as u64,
        liquidation_time,
        tx_hash: row.get("tx_hash"),
        liquidator: row.get("liquidator"),
        user: row.get("user"),
        collateral_received: row.get("collateral_received"),
        stablecoin_received: row.get("stablecoin_received"),
        debt_repaid: row.get("debt_repaid"),
        liquidation_discount: row.get("liquidation_discount"),
        user_loss_amount: row.get("user_loss_amount"),
        total_loss_value: row.get("total_loss_value"),
        user_loss_percent: row.get("user_loss_percent"),
        collateral_token: row.get("collateral_token"),
        platform: row.get("platform"),
    })
}

// ─── LedgerStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl LedgerStore for SqliteStorage {
    async fn append(&self, events: &[LiquidationEvent]) -> Result<usize, ScanError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let mut added = 0usize;
        for ev in events {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO liquidations (
                    tx_hash, network, controller, block_number, liquidation_time,
                    liquidator, user, collateral_received, stablecoin_received,
                    debt_repaid, liquidation_discount, user_loss_amount,
                    total_loss_value, user_loss_percent, collateral_token, platform
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(ev.tx_hash.to_ascii_lowercase())
            .bind(&ev.network)
            .bind(&ev.controller)
            .bind(ev.block_number as i64)
            .bind(ev.liquidation_time.to_rfc3339())
            .bind(&ev.liquidator)
            .bind(&ev.user)
            .bind(ev.collateral_received)
            .bind(ev.stablecoin_received)
            .bind(ev.debt_repaid)
            .bind(ev.liquidation_discount)
            .bind(ev.user_loss_amount)
            .bind(ev.total_loss_value)
            .bind(ev.user_loss_percent)
            .bind(&ev.collateral_token)
            .bind(&ev.platform)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
            added += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(storage_err)?;
        debug!(added, "liquidations stored");
        Ok(added)
    }

    async fn load(&self) -> Result<Vec<LiquidationEvent>, ScanError> {
        let rows = sqlx::query("SELECT * FROM liquidations ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(event_from_row).collect()
    }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn load(&self) -> Result<CheckpointMap, ScanError> {
        let rows = sqlx::query("SELECT key, block_number FROM checkpoints")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("key"), r.get::<i64, _>("block_number") as u64))
            .collect())
    }

    async fn save(&self, map: &CheckpointMap) -> Result<(), ScanError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        sqlx::query("DELETE FROM checkpoints")
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        for (key, block) in map {
            sqlx::query("INSERT INTO checkpoints (key, block_number) VALUES (?, ?)")
                .bind(key)
                .bind(*block as i64)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)
    }
}
