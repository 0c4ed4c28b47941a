//! Per-run caches for values read from the chain once and reused.
//!
//! Controller metadata (collateral decimals, liquidation discount) is read
//! through view calls the first time a controller produces an event. A
//! failed read falls back to the configured default, and the default is
//! cached as well so a broken controller costs one call per run.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::U256;
use std::collections::HashMap;

use liqindex_core::config::ScannerSettings;
use liqindex_core::error::ScanError;

use crate::decoder::scale_units;
use crate::fetcher::EvmFetcher;
use crate::signature::{selector, COLLATERAL_TOKEN_FN, DECIMALS_FN, LIQUIDATION_DISCOUNT_FN};

// ─── Controller metadata ──────────────────────────────────────────────────────

pub struct ControllerMetadataCache {
    default_decimals: u8,
    default_discount_percent: f64,
    decimals: HashMap<String, u8>,
    discounts: HashMap<String, f64>,
}

impl ControllerMetadataCache {
    pub fn new(default_decimals: u8, default_discount_percent: f64) -> Self {
        Self {
            default_decimals,
            default_discount_percent,
            decimals: HashMap::new(),
            discounts: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &ScannerSettings) -> Self {
        Self::new(
            settings.default_collateral_decimals,
            settings.default_discount_percent,
        )
    }

    /// Decimals of the controller's collateral token.
    pub async fn collateral_decimals(&mut self, fetcher: &EvmFetcher, controller: &str) -> u8 {
        let key = controller.to_ascii_lowercase();
        if let Some(d) = self.decimals.get(&key) {
            return *d;
        }
        let decimals = match read_collateral_decimals(fetcher, controller).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    controller,
                    error = %e,
                    default = self.default_decimals,
                    "could not read collateral decimals, using default"
                );
                self.default_decimals
            }
        };
        self.decimals.insert(key, decimals);
        decimals
    }

    /// Liquidation discount of the controller, in percent.
    pub async fn liquidation_discount_percent(
        &mut self,
        fetcher: &EvmFetcher,
        controller: &str,
    ) -> f64 {
        let key = controller.to_ascii_lowercase();
        if let Some(d) = self.discounts.get(&key) {
            return *d;
        }
        let discount = match read_discount_percent(fetcher, controller).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    controller,
                    error = %e,
                    default = self.default_discount_percent,
                    "could not read liquidation discount, using default"
                );
                self.default_discount_percent
            }
        };
        self.discounts.insert(key, discount);
        discount
    }
}

async fn read_collateral_decimals(fetcher: &EvmFetcher, controller: &str) -> Result<u8, ScanError> {
    let ret = fetcher.call(controller, &selector(COLLATERAL_TOKEN_FN)).await?;
    let token = decode_address_word(&ret)?;
    let ret = fetcher.call(&token, &selector(DECIMALS_FN)).await?;
    let decimals = decode_uint_word(&ret)?;
    if decimals > U256::from(u8::MAX) {
        return Err(ScanError::Decode(format!("decimals out of range: {decimals}")));
    }
    Ok(decimals.as_limbs()[0] as u8)
}

async fn read_discount_percent(fetcher: &EvmFetcher, controller: &str) -> Result<f64, ScanError> {
    let ret = fetcher
        .call(controller, &selector(LIQUIDATION_DISCOUNT_FN))
        .await?;
    Ok(scale_units(decode_uint_word(&ret)?, 18) * 100.0)
}

/// A single ABI-encoded address, returned EIP-55 checksummed.
pub(crate) fn decode_address_word(bytes: &[u8]) -> Result<String, ScanError> {
    match DynSolType::Address.abi_decode(bytes) {
        Ok(DynSolValue::Address(a)) => Ok(a.to_checksum(None)),
        Ok(other) => Err(ScanError::Decode(format!("expected address, got {other:?}"))),
        Err(e) => Err(ScanError::Decode(format!("address word: {e}"))),
    }
}

/// A single ABI-encoded uint256.
pub(crate) fn decode_uint_word(bytes: &[u8]) -> Result<U256, ScanError> {
    match DynSolType::Uint(256).abi_decode(bytes) {
        Ok(DynSolValue::Uint(v, _)) => Ok(v),
        Ok(other) => Err(ScanError::Decode(format!("expected uint256, got {other:?}"))),
        Err(e) => Err(ScanError::Decode(format!("uint word: {e}"))),
    }
}

// ─── Block timestamps ─────────────────────────────────────────────────────────

/// Block number → unix timestamp, for blocks already looked up this run.
#[derive(Default)]
pub struct BlockTimeCache {
    times: HashMap<u64, i64>,
}

impl BlockTimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn timestamp(&mut self, fetcher: &EvmFetcher, block: u64) -> Result<i64, ScanError> {
        if let Some(ts) = self.times.get(&block) {
            return Ok(*ts);
        }
        let summary = fetcher
            .block(block)
            .await?
            .ok_or_else(|| ScanError::Rpc(format!("block {block} not found")))?;
        self.times.insert(block, summary.timestamp);
        Ok(summary.timestamp)
    }
}
