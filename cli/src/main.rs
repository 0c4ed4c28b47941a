//! liqindex: record hard liquidations from EVM lending controllers.
//!
//! ```text
//! liqindex                                   resume every controller from its checkpoint
//! liqindex --start-date 2024-01-01           rescan from a date (checkpoints still advance)
//! liqindex --start-date 2024-01-01 --end-date 2024-02-01
//! ```

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use liqindex_core::checkpoint::{CheckpointBook, CheckpointStore};
use liqindex_core::config::IndexerConfig;
use liqindex_core::ledger::LedgerStore;
use liqindex_evm::{ChainScanner, HttpEvmClient, NetworkStatus, ScanSummary, ScanWindow};
use liqindex_storage::{JsonCheckpointStore, JsonLedger};

mod tracing_setup;

use tracing_setup::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "liqindex",
    about = "Scan EVM lending controllers for hard liquidations",
    long_about = "
Scans every controller in the config for Liquidate events, appends new ones to
the ledger and records per-controller checkpoints after every chunk.

ENVIRONMENT VARIABLES:
  LIQINDEX_RPC_<NETWORK>   RPC URL for <NETWORK>, overriding the config file
  RUST_LOG                 tracing filter, overriding --log-level
",
    version
)]
struct Cli {
    /// First day to scan (YYYY-MM-DD, from 00:00 UTC)
    #[arg(long, value_parser = parse_date)]
    start_date: Option<NaiveDate>,

    /// Day to stop at (YYYY-MM-DD, up to 00:00 UTC)
    #[arg(long, value_parser = parse_date)]
    end_date: Option<NaiveDate>,

    /// Networks and controllers to scan
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Checkpoint file
    #[arg(long, default_value = "liquidation_history.json")]
    checkpoints: PathBuf,

    /// Ledger file
    #[arg(long, default_value = "liquidations_db.json")]
    ledger: PathBuf,

    /// Keep ledger and checkpoints in this SQLite database instead of JSON files
    #[cfg(feature = "sqlite")]
    #[arg(long)]
    sqlite: Option<String>,

    /// Scan networks concurrently
    #[arg(long)]
    parallel: bool,

    /// Default log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

type Stores = (Arc<dyn LedgerStore>, Arc<dyn CheckpointStore>);

async fn open_stores(cli: &Cli) -> Result<Stores> {
    #[cfg(feature = "sqlite")]
    if let Some(path) = &cli.sqlite {
        let db = Arc::new(
            liqindex_storage::sqlite::SqliteStorage::open(path)
                .await
                .with_context(|| format!("opening {path}"))?,
        );
        let ledger: Arc<dyn LedgerStore> = db.clone();
        let checkpoints: Arc<dyn CheckpointStore> = db;
        return Ok((ledger, checkpoints));
    }

    let ledger: Arc<dyn LedgerStore> = Arc::new(JsonLedger::new(&cli.ledger));
    let checkpoints: Arc<dyn CheckpointStore> = Arc::new(JsonCheckpointStore::new(&cli.checkpoints));
    Ok((ledger, checkpoints))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    if let (Some(start), Some(end)) = (cli.start_date, cli.end_date) {
        if end < start {
            bail!("--end-date {end} is before --start-date {start}");
        }
    }

    let config = IndexerConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let (ledger, checkpoints) = open_stores(&cli).await?;
    let existing = ledger.load().await.context("reading the ledger")?;
    let book = Arc::new(
        CheckpointBook::open(checkpoints)
            .await
            .context("reading checkpoints")?,
    );
    tracing::info!(
        networks = config.networks.len(),
        existing_events = existing.len(),
        "starting"
    );

    let mut scanner =
        ChainScanner::new(config.settings.clone(), ledger, book).parallel(cli.parallel);
    for network in config.networks {
        match HttpEvmClient::new(&network.rpc_endpoint, config.settings.request_timeout()) {
            Ok(client) => scanner.add_network(network, Arc::new(client)),
            Err(e) => tracing::error!(network = %network.name, error = %e, "skipping network"),
        }
    }

    let stop = scanner.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current chunk");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let window = ScanWindow::from_dates(cli.start_date, cli.end_date);
    match scanner.scan(window).await {
        Ok(summary) => log_summary(&summary),
        Err(e) => tracing::error!(error = %e, "scan finished but the ledger could not be read back"),
    }
    Ok(())
}

fn log_summary(summary: &ScanSummary) {
    for report in &summary.reports {
        let status = match report.status {
            NetworkStatus::Completed => "completed",
            NetworkStatus::Unreachable => "unreachable",
            NetworkStatus::NothingToScan => "up to date",
            NetworkStatus::NoControllers => "no controllers",
            NetworkStatus::Interrupted => "interrupted",
        };
        tracing::info!(
            network = %report.network,
            status,
            from = ?report.from_block,
            to = ?report.to_block,
            chunks = report.chunks,
            degraded_chunks = report.degraded_chunks,
            new_events = report.accepted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            failed = report.failed,
            "network summary"
        );
    }
    tracing::info!(
        total_events = summary.events.len(),
        unique_users = summary.unique_users(),
        new_events = summary.new_events(),
        "done"
    );
}
