//! The scan loop: every configured network, every controller, chunk by chunk.
//!
//! # Per network
//! 1. Probe the endpoint by reading the head; skip the network if it fails.
//! 2. Work out the block range. With a start date every controller begins
//!    at the resolved block (never before its creation block); otherwise at
//!    its checkpoint, or its creation block if it has none. The end is the
//!    resolved end date or the head.
//! 3. Walk the range in fixed chunks. A controller only joins the query once
//!    the chunk reaches its start. For each chunk: fetch logs → decode →
//!    append accepted events → advance and save checkpoints.
//!
//! Nothing here returns an error for a single network; failures are logged
//! and reflected in its [`NetworkReport`].

use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use liqindex_core::checkpoint::{checkpoint_key, CheckpointBook};
use liqindex_core::config::{ControllerConfig, NetworkConfig, ScannerSettings};
use liqindex_core::cursor::ScanCursor;
use liqindex_core::error::ScanError;
use liqindex_core::ledger::LedgerStore;
use liqindex_core::policy::RetryPolicy;
use liqindex_core::types::LiquidationEvent;

use crate::client::EvmRpcClient;
use crate::decoder::{Decoded, LiquidationDecoder};
use crate::fetcher::{EvmFetcher, LogFetcher};
use crate::metadata::{BlockTimeCache, ControllerMetadataCache};
use crate::resolver::BlockTimestampResolver;
use crate::signature::liquidate_topic;

// ─── Window ───────────────────────────────────────────────────────────────────

/// Optional UTC bounds of a run, as unix timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanWindow {
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
}

impl ScanWindow {
    /// Both dates are taken at 00:00:00 UTC.
    pub fn from_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start_ts: start.map(midnight_utc),
            end_ts: end.map(midnight_utc),
        }
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

// ─── Reports ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Completed,
    /// The endpoint could not be reached.
    Unreachable,
    /// Every controller is already at or past the end block.
    NothingToScan,
    NoControllers,
    /// A stop was requested between chunks.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkReport {
    pub network: String,
    pub status: NetworkStatus,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub chunks: u64,
    /// Chunks whose log query failed and were recorded as scanned anyway.
    pub degraded_chunks: u64,
    pub logs_seen: usize,
    /// Events newly written to the ledger.
    pub accepted: usize,
    /// Events decoded but already in the ledger.
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl NetworkReport {
    fn new(network: &str, status: NetworkStatus) -> Self {
        Self {
            network: network.to_string(),
            status,
            from_block: None,
            to_block: None,
            chunks: 0,
            degraded_chunks: 0,
            logs_seen: 0,
            accepted: 0,
            duplicates: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub reports: Vec<NetworkReport>,
    /// The full ledger after the run, old records included.
    pub events: Vec<LiquidationEvent>,
}

impl ScanSummary {
    /// Events written by this run.
    pub fn new_events(&self) -> usize {
        self.reports.iter().map(|r| r.accepted).sum()
    }

    /// Distinct liquidated users across the ledger, case-insensitive.
    pub fn unique_users(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.user.to_ascii_lowercase())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn report(&self, network: &str) -> Option<&NetworkReport> {
        self.reports.iter().find(|r| r.network == network)
    }
}

// ─── ChainScanner ─────────────────────────────────────────────────────────────

struct ScanTarget {
    config: NetworkConfig,
    client: Arc<dyn EvmRpcClient>,
}

/// A controller being scanned in the current run.
struct ControllerScan<'a> {
    config: &'a ControllerConfig,
    key: String,
    cursor: ScanCursor,
}

pub struct ChainScanner {
    settings: ScannerSettings,
    retry: RetryPolicy,
    ledger: Arc<dyn LedgerStore>,
    checkpoints: Arc<CheckpointBook>,
    targets: Vec<ScanTarget>,
    parallel: bool,
    stop: Arc<AtomicBool>,
}

impl ChainScanner {
    pub fn new(
        settings: ScannerSettings,
        ledger: Arc<dyn LedgerStore>,
        checkpoints: Arc<CheckpointBook>,
    ) -> Self {
        Self {
            retry: RetryPolicy::new(settings.retry_config()),
            settings,
            ledger,
            checkpoints,
            targets: Vec::new(),
            parallel: false,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the retry policy built from the settings.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scan networks concurrently instead of one after another.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Networks are scanned in the order they are added.
    pub fn add_network(&mut self, config: NetworkConfig, client: Arc<dyn EvmRpcClient>) {
        self.targets.push(ScanTarget { config, client });
    }

    /// Set to `true` to stop after the chunk in flight.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Scan every network, then return the full ledger.
    ///
    /// Fails only if the ledger cannot be read back at the end.
    pub async fn scan(&self, window: ScanWindow) -> Result<ScanSummary, ScanError> {
        tracing::info!(
            networks = self.targets.len(),
            parallel = self.parallel,
            start_ts = ?window.start_ts,
            end_ts = ?window.end_ts,
            "scan started"
        );

        let reports = if self.parallel {
            join_all(self.targets.iter().map(|t| self.scan_network(t, window))).await
        } else {
            let mut reports = Vec::with_capacity(self.targets.len());
            for target in &self.targets {
                reports.push(self.scan_network(target, window).await);
            }
            reports
        };

        let events = self.ledger.load().await?;
        let summary = ScanSummary { reports, events };
        tracing::info!(
            total_events = summary.events.len(),
            new_events = summary.new_events(),
            unique_users = summary.unique_users(),
            "scan finished"
        );
        Ok(summary)
    }

    async fn scan_network(&self, target: &ScanTarget, window: ScanWindow) -> NetworkReport {
        let network = target.config.name.as_str();
        if target.config.controllers.is_empty() {
            tracing::warn!(network, "no controllers configured, skipping");
            return NetworkReport::new(network, NetworkStatus::NoControllers);
        }

        let fetcher = Arc::new(EvmFetcher::new(target.client.clone(), self.retry.clone()));
        let head = match fetcher.head_block_number().await {
            Ok(head) => head,
            Err(e) => {
                let err = ScanError::Connectivity {
                    network: network.to_string(),
                    reason: e.to_string(),
                };
                tracing::error!(network, error = %err, "network unreachable, skipping");
                return NetworkReport::new(network, NetworkStatus::Unreachable);
            }
        };
        tracing::info!(network, head, endpoint = fetcher.endpoint(), "connected");

        let resolver =
            BlockTimestampResolver::new(fetcher.clone(), self.settings.timestamp_tolerance_secs);
        let start_block = match window.start_ts {
            Some(ts) => match resolver.resolve(ts).await {
                Ok(block) => Some(block),
                Err(e) => {
                    tracing::error!(network, error = %e, "could not resolve start date, skipping");
                    return NetworkReport::new(network, NetworkStatus::Unreachable);
                }
            },
            None => None,
        };
        let to_block = match window.end_ts {
            Some(ts) => match resolver.resolve(ts).await {
                Ok(block) => block,
                Err(e) => {
                    tracing::error!(network, error = %e, "could not resolve end date, skipping");
                    return NetworkReport::new(network, NetworkStatus::Unreachable);
                }
            },
            None => head,
        };

        let mut controllers = Vec::with_capacity(target.config.controllers.len());
        for config in &target.config.controllers {
            let key = checkpoint_key(network, &config.address);
            let creation = ScanCursor::from_creation_block(config.creation_block);
            let start = match start_block {
                Some(block) => block.max(creation.effective_start),
                None => match self.checkpoints.get(&key).await {
                    Some(last) => last.max(creation.effective_start),
                    None => creation.effective_start,
                },
            };
            controllers.push(ControllerScan {
                config,
                key,
                cursor: ScanCursor::new(start),
            });
        }

        let global_min = controllers
            .iter()
            .map(|c| c.cursor.effective_start)
            .min()
            .unwrap_or(1);

        let mut report = NetworkReport::new(network, NetworkStatus::Completed);
        report.from_block = Some(global_min);
        report.to_block = Some(to_block);

        if global_min >= to_block {
            tracing::info!(network, from = global_min, to = to_block, "nothing to scan");
            report.status = NetworkStatus::NothingToScan;
            return report;
        }
        tracing::info!(
            network,
            from = global_min,
            to = to_block,
            controllers = controllers.len(),
            "scanning"
        );

        self.scan_range(&target.config, &fetcher, &mut controllers, global_min, to_block, &mut report)
            .await;
        report
    }

    async fn scan_range(
        &self,
        network: &NetworkConfig,
        fetcher: &Arc<EvmFetcher>,
        controllers: &mut [ControllerScan<'_>],
        from: u64,
        to: u64,
        report: &mut NetworkReport,
    ) {
        let name = network.name.as_str();
        let chunk_size = self.settings.chunk_size.max(1);
        let logs = LogFetcher::new(fetcher.clone(), liquidate_topic());
        let decoder = LiquidationDecoder::new(name, self.settings.min_debt_usd);
        let mut metadata = ControllerMetadataCache::from_settings(&self.settings);
        let mut block_times = BlockTimeCache::new();

        let mut current = from;
        while current <= to {
            if self.stop.load(Ordering::SeqCst) {
                tracing::warn!(network = name, at = current, "stop requested, leaving network");
                report.status = NetworkStatus::Interrupted;
                return;
            }
            let chunk_end = current.saturating_add(chunk_size - 1).min(to);

            let eligible: Vec<usize> = controllers
                .iter()
                .enumerate()
                .filter(|(_, c)| c.cursor.includes(chunk_end))
                .map(|(i, _)| i)
                .collect();
            if eligible.is_empty() {
                current = chunk_end + 1;
                continue;
            }

            let addresses: Vec<String> = eligible
                .iter()
                .map(|&i| controllers[i].config.address.clone())
                .collect();
            let batch = logs.fetch(current, chunk_end, &addresses).await;
            if batch.degraded {
                report.degraded_chunks += 1;
            }
            report.logs_seen += batch.logs.len();

            let mut accepted_here = 0usize;
            for log in &batch.logs {
                if log.is_removed() {
                    continue;
                }
                let Some(controller) = network.controller(&log.address) else {
                    tracing::debug!(network = name, address = %log.address, "log from unknown emitter");
                    continue;
                };
                let decoded = decoder
                    .decode(log, controller, fetcher, &mut metadata, &mut block_times)
                    .await;
                match decoded {
                    Ok(Decoded::Accepted(event)) => {
                        match self.ledger.append(std::slice::from_ref(&event)).await {
                            Ok(0) => {
                                tracing::debug!(tx = %event.tx_hash, "already in ledger");
                                report.duplicates += 1;
                            }
                            Ok(_) => {
                                tracing::info!(
                                    network = name,
                                    block = event.block_number,
                                    tx = %event.tx_hash,
                                    user = %event.user,
                                    debt = event.debt_repaid,
                                    "liquidation recorded"
                                );
                                report.accepted += 1;
                                accepted_here += 1;
                            }
                            Err(e) => {
                                tracing::error!(tx = %event.tx_hash, error = %e, "ledger append failed");
                                report.failed += 1;
                            }
                        }
                    }
                    Ok(Decoded::Skipped(reason)) => {
                        tracing::debug!(tx = %log.tx_hash, ?reason, "log skipped");
                        report.skipped += 1;
                    }
                    Err(e) => {
                        tracing::error!(tx = %log.tx_hash, error = %e, "could not process log");
                        report.failed += 1;
                    }
                }
            }

            let keys: Vec<String> = eligible
                .iter()
                .map(|&i| {
                    controllers[i].cursor.advance(chunk_end);
                    controllers[i].key.clone()
                })
                .collect();
            if let Err(e) = self.checkpoints.advance(&keys, chunk_end).await {
                tracing::error!(network = name, block = chunk_end, error = %e, "checkpoint save failed");
            }

            report.chunks += 1;
            tracing::info!(
                network = name,
                from = current,
                to = chunk_end,
                logs = batch.logs.len(),
                accepted = accepted_here,
                "chunk scanned"
            );
            current = chunk_end + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;
    use liqindex_core::checkpoint::{CheckpointStore, MemoryCheckpointStore};
    use liqindex_core::ledger::MemoryLedger;
    use liqindex_core::policy::{RecordingSleeper, RetryConfig};

    const E18: u128 = 1_000_000_000_000_000_000;

    fn controller(address: &str, creation_block: u64) -> ControllerConfig {
        ControllerConfig {
            address: address.into(),
            creation_block,
            collateral_token_symbol: "WETH".into(),
            platform: "crvUSD".into(),
        }
    }

    fn network(name: &str, controllers: Vec<ControllerConfig>) -> NetworkConfig {
        NetworkConfig {
            name: name.into(),
            rpc_endpoint: "mock://chain".into(),
            controllers,
        }
    }

    fn settings() -> ScannerSettings {
        ScannerSettings {
            chunk_size: 100,
            ..Default::default()
        }
    }

    struct Env {
        ledger: Arc<MemoryLedger>,
        store: Arc<MemoryCheckpointStore>,
        sleeper: Arc<RecordingSleeper>,
    }

    impl Env {
        fn new() -> Self {
            Self {
                ledger: Arc::new(MemoryLedger::new()),
                store: Arc::new(MemoryCheckpointStore::new()),
                sleeper: Arc::new(RecordingSleeper::new()),
            }
        }

        async fn scanner(&self, settings: ScannerSettings) -> ChainScanner {
            let book = Arc::new(CheckpointBook::open(self.store.clone()).await.unwrap());
            ChainScanner::new(settings, self.ledger.clone(), book).with_retry_policy(
                RetryPolicy::with_sleeper(RetryConfig::default(), self.sleeper.clone()),
            )
        }

        async fn checkpoint(&self, network: &str, controller: &str) -> Option<u64> {
            self.store
                .load()
                .await
                .unwrap()
                .get(&checkpoint_key(network, controller))
                .copied()
        }
    }

    #[tokio::test]
    async fn scans_in_chunks_and_checkpoints_each() {
        let env = Env::new();
        let chain = Arc::new(MockChain::new(350));
        chain.push_liquidation(MockChain::CONTROLLER_A, 120, "0xAA01", 1_000 * E18);
        chain.push_liquidation(MockChain::CONTROLLER_A, 349, "0xaa02", 2_000 * E18);

        let mut scanner = env.scanner(settings()).await;
        scanner.add_network(network("ethereum", vec![controller(MockChain::CONTROLLER_A, 1)]), chain.clone());
        let summary = scanner.scan(ScanWindow::default()).await.unwrap();

        assert_eq!(chain.log_ranges(), vec![(1, 100), (101, 200), (201, 300), (301, 350)]);
        assert_eq!(env.store.save_count(), 4);
        assert_eq!(env.checkpoint("ethereum", MockChain::CONTROLLER_A).await, Some(350));

        let report = summary.report("ethereum").unwrap();
        assert_eq!(report.status, NetworkStatus::Completed);
        assert_eq!(report.accepted, 2);
        assert_eq!(summary.events.len(), 2);
        assert_eq!(summary.events[0].tx_hash, "0xaa01");
        assert_eq!(summary.unique_users(), 1);
    }

    #[tokio::test]
    async fn rescan_adds_nothing() {
        let env = Env::new();
        let chain = Arc::new(MockChain::new(250));
        chain.push_liquidation(MockChain::CONTROLLER_A, 10, "0x01", 1_000 * E18);
        chain.push_liquidation(MockChain::CONTROLLER_A, 20, "0x02", 1_000 * E18);
        let net = network("ethereum", vec![controller(MockChain::CONTROLLER_A, 1)]);

        let mut first = env.scanner(settings()).await;
        first.add_network(net.clone(), chain.clone());
        first.scan(ScanWindow::default()).await.unwrap();
        assert_eq!(env.ledger.len(), 2);

        // From checkpoints: already at the head.
        let mut second = env.scanner(settings()).await;
        second.add_network(net.clone(), chain.clone());
        let summary = second.scan(ScanWindow::default()).await.unwrap();
        assert_eq!(summary.reports[0].status, NetworkStatus::NothingToScan);

        // Forced from genesis by date: same logs, no new records.
        let exact = ScannerSettings {
            timestamp_tolerance_secs: 0,
            ..settings()
        };
        let mut third = env.scanner(exact).await;
        third.add_network(net, chain.clone());
        let window = ScanWindow {
            start_ts: Some(MockChain::timestamp_of(1)),
            end_ts: None,
        };
        let summary = third.scan(window).await.unwrap();
        assert_eq!(summary.reports[0].duplicates, 2);
        assert_eq!(summary.new_events(), 0);
        assert_eq!(env.ledger.len(), 2);
    }

    #[tokio::test]
    async fn older_window_never_moves_checkpoint_back() {
        let env = Env::new();
        let chain = Arc::new(MockChain::new(300));
        chain.push_liquidation(MockChain::CONTROLLER_A, 10, "0x01", 1_000 * E18);
        chain.push_liquidation(MockChain::CONTROLLER_A, 120, "0x02", 1_000 * E18);
        chain.push_liquidation(MockChain::CONTROLLER_A, 250, "0x03", 1_000 * E18);
        let net = network("ethereum", vec![controller(MockChain::CONTROLLER_A, 1)]);
        let key = format!("ethereum_{}", MockChain::CONTROLLER_A);

        let mut first = env.scanner(settings()).await;
        first.add_network(net.clone(), chain.clone());
        first.scan(ScanWindow::default()).await.unwrap();
        assert_eq!(env.store.load().await.unwrap().get(&key), Some(&300));
        assert_eq!(env.ledger.len(), 3);

        let exact = ScannerSettings {
            timestamp_tolerance_secs: 0,
            ..settings()
        };
        let mut second = env.scanner(exact).await;
        second.add_network(net, chain.clone());
        let window = ScanWindow {
            start_ts: Some(MockChain::timestamp_of(1)),
            end_ts: Some(MockChain::timestamp_of(150)),
        };
        let summary = second.scan(window).await.unwrap();

        let report = summary.report("ethereum").unwrap();
        assert_eq!(report.to_block, Some(150));
        assert_eq!(report.duplicates, 2);
        assert_eq!(summary.new_events(), 0);
        assert_eq!(env.store.load().await.unwrap().get(&key), Some(&300));
        assert_eq!(env.ledger.len(), 3);
    }

    #[tokio::test]
    async fn controllers_join_at_their_creation_block() {
        let env = Env::new();
        let chain = Arc::new(MockChain::new(300));
        chain.push_liquidation(MockChain::CONTROLLER_B, 150, "0x0b01", 1_000 * E18);
        chain.push_liquidation(MockChain::CONTROLLER_B, 260, "0x0b02", 1_000 * E18);

        let mut scanner = env.scanner(settings()).await;
        scanner.add_network(
            network(
                "ethereum",
                vec![
                    controller(MockChain::CONTROLLER_A, 0),
                    controller(MockChain::CONTROLLER_B, 250),
                ],
            ),
            chain.clone(),
        );
        let summary = scanner.scan(ScanWindow::default()).await.unwrap();

        // creation block 0 is scanned from 1
        assert_eq!(chain.log_ranges()[0], (1, 100));
        let hashes: Vec<_> = summary.events.iter().map(|e| e.tx_hash.as_str()).collect();
        assert_eq!(hashes, ["0x0b02"]);
        assert_eq!(env.checkpoint("ethereum", MockChain::CONTROLLER_B).await, Some(300));
    }

    #[tokio::test]
    async fn exhausted_rate_limit_still_advances_checkpoint() {
        let env = Env::new();
        let chain = Arc::new(MockChain::new(200));
        chain.push_liquidation(MockChain::CONTROLLER_A, 50, "0x01", 1_000 * E18);
        chain.push_liquidation(MockChain::CONTROLLER_A, 150, "0x02", 1_000 * E18);
        chain.rate_limit_logs(6);

        let mut scanner = env.scanner(settings()).await;
        scanner.add_network(network("base", vec![controller(MockChain::CONTROLLER_A, 1)]), chain.clone());
        let summary = scanner.scan(ScanWindow::default()).await.unwrap();

        assert_eq!(env.sleeper.delays().len(), 5);
        let report = summary.report("base").unwrap();
        assert_eq!(report.degraded_chunks, 1);
        assert_eq!(report.chunks, 2);
        let hashes: Vec<_> = summary.events.iter().map(|e| e.tx_hash.as_str()).collect();
        assert_eq!(hashes, ["0x02"]);
        assert_eq!(env.checkpoint("base", MockChain::CONTROLLER_A).await, Some(200));
    }

    #[tokio::test]
    async fn filters_dust_and_self_liquidation() {
        let env = Env::new();
        let chain = Arc::new(MockChain::new(100));
        chain.push_liquidation(MockChain::CONTROLLER_A, 10, "0x01", 2 * E18);
        chain.push_log(crate::mock::liquidate_log(
            MockChain::CONTROLLER_A,
            11,
            "0x02",
            MockChain::USER,
            MockChain::USER,
            alloy_primitives::U256::from(E18),
            alloy_primitives::U256::ZERO,
            alloy_primitives::U256::from(1_000 * E18),
        ));
        chain.push_liquidation(MockChain::CONTROLLER_A, 12, "0x03", 5 * E18);

        let mut scanner = env.scanner(settings()).await;
        scanner.add_network(network("ethereum", vec![controller(MockChain::CONTROLLER_A, 1)]), chain);
        let summary = scanner.scan(ScanWindow::default()).await.unwrap();

        let report = summary.report("ethereum").unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.accepted, 1);
        assert_eq!(summary.events[0].tx_hash, "0x03");
    }

    #[tokio::test]
    async fn unreachable_network_is_skipped() {
        let env = Env::new();
        let down = Arc::new(MockChain::new(100));
        down.fail_head();
        let up = Arc::new(MockChain::new(100));
        up.push_liquidation(MockChain::CONTROLLER_A, 5, "0x01", 1_000 * E18);

        let mut scanner = env.scanner(settings()).await;
        scanner.add_network(network("fraxtal", vec![controller(MockChain::CONTROLLER_A, 1)]), down.clone());
        scanner.add_network(network("ethereum", vec![controller(MockChain::CONTROLLER_A, 1)]), up);
        let summary = scanner.scan(ScanWindow::default()).await.unwrap();

        assert_eq!(summary.report("fraxtal").unwrap().status, NetworkStatus::Unreachable);
        assert_eq!(down.get_logs_calls(), 0);
        assert_eq!(summary.report("ethereum").unwrap().accepted, 1);
        assert!(env.checkpoint("fraxtal", MockChain::CONTROLLER_A).await.is_none());
    }

    #[tokio::test]
    async fn date_window_bounds_the_range() {
        let env = Env::new();
        let chain = Arc::new(MockChain::new(1_000));
        chain.push_liquidation(MockChain::CONTROLLER_A, 150, "0x01", 1_000 * E18);
        chain.push_liquidation(MockChain::CONTROLLER_A, 450, "0x02", 1_000 * E18);
        chain.push_liquidation(MockChain::CONTROLLER_A, 700, "0x03", 1_000 * E18);

        let exact = ScannerSettings {
            timestamp_tolerance_secs: 0,
            ..settings()
        };
        let mut scanner = env.scanner(exact).await;
        scanner.add_network(network("ethereum", vec![controller(MockChain::CONTROLLER_A, 1)]), chain.clone());
        let window = ScanWindow {
            start_ts: Some(MockChain::timestamp_of(400)),
            end_ts: Some(MockChain::timestamp_of(600)),
        };
        let summary = scanner.scan(window).await.unwrap();

        let report = summary.report("ethereum").unwrap();
        assert_eq!(report.from_block, Some(400));
        assert_eq!(report.to_block, Some(600));
        assert_eq!(chain.log_ranges(), vec![(400, 499), (500, 599), (600, 600)]);
        let hashes: Vec<_> = summary.events.iter().map(|e| e.tx_hash.as_str()).collect();
        assert_eq!(hashes, ["0x02"]);
    }

    #[tokio::test]
    async fn stop_request_leaves_before_next_chunk() {
        let env = Env::new();
        let chain = Arc::new(MockChain::new(500));
        let mut scanner = env.scanner(settings()).await;
        scanner.add_network(network("ethereum", vec![controller(MockChain::CONTROLLER_A, 1)]), chain.clone());

        scanner.stop_handle().store(true, Ordering::SeqCst);
        let summary = scanner.scan(ScanWindow::default()).await.unwrap();

        assert_eq!(summary.reports[0].status, NetworkStatus::Interrupted);
        assert_eq!(chain.get_logs_calls(), 0);
        assert_eq!(env.store.save_count(), 0);
    }

    #[tokio::test]
    async fn parallel_networks_share_one_checkpoint_map() {
        let env = Env::new();
        let eth = Arc::new(MockChain::new(300));
        eth.push_liquidation(MockChain::CONTROLLER_A, 5, "0x01", 1_000 * E18);
        let arb = Arc::new(MockChain::new(300));
        arb.push_liquidation(MockChain::CONTROLLER_B, 205, "0x02", 1_000 * E18);

        let mut scanner = env.scanner(settings()).await.parallel(true);
        scanner.add_network(network("ethereum", vec![controller(MockChain::CONTROLLER_A, 1)]), eth);
        scanner.add_network(network("arbitrum", vec![controller(MockChain::CONTROLLER_B, 1)]), arb);
        let summary = scanner.scan(ScanWindow::default()).await.unwrap();

        assert_eq!(summary.new_events(), 2);
        assert_eq!(env.checkpoint("ethereum", MockChain::CONTROLLER_A).await, Some(300));
        assert_eq!(env.checkpoint("arbitrum", MockChain::CONTROLLER_B).await, Some(300));
    }

    #[test]
    fn dates_are_midnight_utc() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let window = ScanWindow::from_dates(Some(d), None);
        assert_eq!(window.start_ts, Some(1_709_251_200));
        assert_eq!(window.end_ts, None);
    }
}
