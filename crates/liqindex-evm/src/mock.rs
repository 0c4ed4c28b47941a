//! In-process chain used by the crate's tests.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use liqindex_core::error::ScanError;
use liqindex_core::types::{BlockSummary, EventFilter};

use crate::client::{parse_hex_u64, EvmRpcClient, RawLog};
use crate::signature::{liquidate_topic, selector};

/// Deterministic chain: block `n` is stamped `GENESIS_TS + n * BLOCK_TIME`.
pub(crate) struct MockChain {
    head: u64,
    logs: Mutex<Vec<RawLog>>,
    calls: Mutex<HashMap<(String, [u8; 4]), Vec<u8>>>,
    log_ranges: Mutex<Vec<(u64, u64)>>,
    rate_limited_logs: AtomicU32,
    logs_rpc_error: AtomicBool,
    blocks_fail: AtomicBool,
    head_fails: AtomicBool,
    get_logs_calls: AtomicU32,
    get_block_calls: AtomicU32,
    eth_calls: AtomicU32,
}

impl MockChain {
    pub const GENESIS_TS: i64 = 1_700_000_000;
    pub const BLOCK_TIME: i64 = 12;
    pub const CONTROLLER_A: &'static str = "0x1000000000000000000000000000000000000001";
    pub const CONTROLLER_B: &'static str = "0x2000000000000000000000000000000000000002";
    pub const LIQUIDATOR: &'static str = "0x3000000000000000000000000000000000000003";
    pub const USER: &'static str = "0x4000000000000000000000000000000000000004";

    pub fn new(head: u64) -> Self {
        Self {
            head,
            logs: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            log_ranges: Mutex::new(Vec::new()),
            rate_limited_logs: AtomicU32::new(0),
            logs_rpc_error: AtomicBool::new(false),
            blocks_fail: AtomicBool::new(false),
            head_fails: AtomicBool::new(false),
            get_logs_calls: AtomicU32::new(0),
            get_block_calls: AtomicU32::new(0),
            eth_calls: AtomicU32::new(0),
        }
    }

    pub fn timestamp_of(block: u64) -> i64 {
        Self::GENESIS_TS + block as i64 * Self::BLOCK_TIME
    }

    pub fn push_log(&self, log: RawLog) {
        self.logs.lock().unwrap().push(log);
    }

    /// A `Liquidate` by `LIQUIDATOR` against `USER`, 1 collateral unit paid out.
    pub fn push_liquidation(&self, controller: &str, block: u64, tx: &str, debt: u128) {
        self.push_log(liquidate_log(
            controller,
            block,
            tx,
            Self::LIQUIDATOR,
            Self::USER,
            U256::from(10_u128.pow(18)),
            U256::ZERO,
            U256::from(debt),
        ));
    }

    /// Answer `eth_call(to, selector(signature))` with `ret`.
    pub fn set_call(&self, to: &str, signature: &str, ret: Vec<u8>) {
        self.calls
            .lock()
            .unwrap()
            .insert((to.to_ascii_lowercase(), selector(signature)), ret);
    }

    /// The next `n` log queries fail with a rate limit.
    pub fn rate_limit_logs(&self, n: u32) {
        self.rate_limited_logs.store(n, Ordering::SeqCst);
    }

    pub fn fail_logs_with_rpc_error(&self) {
        self.logs_rpc_error.store(true, Ordering::SeqCst);
    }

    pub fn fail_blocks(&self) {
        self.blocks_fail.store(true, Ordering::SeqCst);
    }

    pub fn fail_head(&self) {
        self.head_fails.store(true, Ordering::SeqCst);
    }

    pub fn get_logs_calls(&self) -> u32 {
        self.get_logs_calls.load(Ordering::SeqCst)
    }

    pub fn get_block_calls(&self) -> u32 {
        self.get_block_calls.load(Ordering::SeqCst)
    }

    pub fn eth_calls(&self) -> u32 {
        self.eth_calls.load(Ordering::SeqCst)
    }

    /// Every `(from, to)` passed to `get_logs`, in order.
    pub fn log_ranges(&self) -> Vec<(u64, u64)> {
        self.log_ranges.lock().unwrap().clone()
    }
}

/// 32-byte ABI word for an address.
pub(crate) fn address_word(addr: &str) -> String {
    format!("0x{:0>64}", addr.trim_start_matches("0x").to_ascii_lowercase())
}

/// 32-byte ABI word for an unsigned integer.
pub(crate) fn uint_word(v: U256) -> Vec<u8> {
    v.to_be_bytes::<32>().to_vec()
}

/// A `Liquidate` log with indexed liquidator and user.
#[allow(clippy::too_many_arguments)]
pub(crate) fn liquidate_log(
    controller: &str,
    block: u64,
    tx: &str,
    liquidator: &str,
    user: &str,
    collateral: U256,
    stablecoin: U256,
    debt: U256,
) -> RawLog {
    let mut data = Vec::with_capacity(96);
    data.extend(uint_word(collateral));
    data.extend(uint_word(stablecoin));
    data.extend(uint_word(debt));
    RawLog {
        address: controller.to_string(),
        topics: vec![
            liquidate_topic().to_string(),
            address_word(liquidator),
            address_word(user),
        ],
        data: format!("0x{}", hex::encode(data)),
        block_number: format!("0x{block:x}"),
        tx_hash: tx.to_string(),
        removed: None,
    }
}

#[async_trait]
impl EvmRpcClient for MockChain {
    async fn get_block_number(&self) -> Result<u64, ScanError> {
        if self.head_fails.load(Ordering::SeqCst) {
            return Err(ScanError::Rpc("connection refused".into()));
        }
        Ok(self.head)
    }

    async fn get_block(&self, number: u64) -> Result<Option<BlockSummary>, ScanError> {
        self.get_block_calls.fetch_add(1, Ordering::SeqCst);
        if self.blocks_fail.load(Ordering::SeqCst) {
            return Err(ScanError::Rpc(
                "extraData is 97 bytes, but should be 32".into(),
            ));
        }
        if number > self.head {
            return Ok(None);
        }
        Ok(Some(BlockSummary {
            number,
            timestamp: Self::timestamp_of(number),
        }))
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &EventFilter,
    ) -> Result<Vec<RawLog>, ScanError> {
        self.get_logs_calls.fetch_add(1, Ordering::SeqCst);
        self.log_ranges.lock().unwrap().push((from, to));

        let pending = self.rate_limited_logs.load(Ordering::SeqCst);
        if pending > 0 {
            self.rate_limited_logs.store(pending - 1, Ordering::SeqCst);
            return Err(ScanError::RateLimited {
                endpoint: self.endpoint().into(),
            });
        }
        if self.logs_rpc_error.load(Ordering::SeqCst) {
            return Err(ScanError::Rpc("query returned more than 10000 results".into()));
        }

        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| {
                let in_range = parse_hex_u64(&l.block_number)
                    .is_ok_and(|n| n >= from && n <= to);
                let address_ok = filter.addresses.is_empty()
                    || filter.addresses.iter().any(|a| a.eq_ignore_ascii_case(&l.address));
                let topic_ok = filter.topic0_values.is_empty()
                    || l.topics.first().is_some_and(|t| {
                        filter.topic0_values.iter().any(|v| v.eq_ignore_ascii_case(t))
                    });
                in_range && address_ok && topic_ok
            })
            .cloned()
            .collect())
    }

    async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, ScanError> {
        self.eth_calls.fetch_add(1, Ordering::SeqCst);
        let sel: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| ScanError::Rpc("short calldata".into()))?;
        self.calls
            .lock()
            .unwrap()
            .get(&(to.to_ascii_lowercase(), sel))
            .cloned()
            .ok_or_else(|| ScanError::Rpc("execution reverted".into()))
    }

    fn endpoint(&self) -> &str {
        "mock://chain"
    }
}
