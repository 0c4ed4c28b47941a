//! Indexer configuration: networks, controllers and scanner tunables.
//!
//! The file keeps the layout used by the existing deployments:
//!
//! ```json
//! {
//!   "networks": {
//!     "ethereum": {
//!       "RPC_URL": "https://eth.llamarpc.com",
//!       "controller_contracts": [
//!         { "address": "0xa920de414ea4ab66b97da1bfe9e6eca7d4219635",
//!           "creation_block": 17562530,
//!           "collateral_token": "WETH",
//!           "platform": "crvUSD" }
//!       ]
//!     }
//!   },
//!   "scanner": { "chunk_size": 10000 }
//! }
//! ```
//!
//! Everything is validated here, once, so the scan path never sees a
//! half-formed controller.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::policy::RetryConfig;

/// Prefix of the per-network RPC override, e.g. `LIQINDEX_RPC_ETHEREUM`.
pub const RPC_ENV_PREFIX: &str = "LIQINDEX_RPC_";

/// One lending controller whose `Liquidate` events are indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// EIP-55 checksum address.
    pub address: String,
    /// No events exist below this block. Never 0 (clamped to 1).
    pub creation_block: u64,
    pub collateral_token_symbol: String,
    pub platform: String,
}

/// A chain and the controllers deployed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_endpoint: String,
    pub controllers: Vec<ControllerConfig>,
}

impl NetworkConfig {
    /// Case-insensitive lookup of a controller by address.
    pub fn controller(&self, address: &str) -> Option<&ControllerConfig> {
        self.controllers
            .iter()
            .find(|c| c.address.eq_ignore_ascii_case(address))
    }
}

/// Scanner tunables. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerSettings {
    /// Blocks per `eth_getLogs` call.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Liquidations repaying less debt than this (USD) are dust.
    #[serde(default = "default_min_debt_usd")]
    pub min_debt_usd: f64,
    /// Acceptable distance between a resolved block and the target time.
    #[serde(default = "default_tolerance_secs")]
    pub timestamp_tolerance_secs: u64,
    /// Collateral decimals used when the token cannot be queried.
    #[serde(default = "default_decimals")]
    pub default_collateral_decimals: u8,
    /// Liquidation discount (percent) used when the controller cannot be queried.
    #[serde(default = "default_discount_percent")]
    pub default_discount_percent: f64,
    /// Rate-limit retries per provider call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first rate-limit retry (doubles each time).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound of the random jitter added to each retry delay.
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_chunk_size() -> u64 { 10_000 }
fn default_min_debt_usd() -> f64 { 5.0 }
fn default_tolerance_secs() -> u64 { 3_600 }
fn default_decimals() -> u8 { 18 }
fn default_discount_percent() -> f64 { 6.0 }
fn default_max_retries() -> u32 { 5 }
fn default_initial_backoff_ms() -> u64 { 2_000 }
fn default_max_jitter_ms() -> u64 { 2_000 }
fn default_request_timeout_secs() -> u64 { 30 }

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            min_debt_usd: default_min_debt_usd(),
            timestamp_tolerance_secs: default_tolerance_secs(),
            default_collateral_decimals: default_decimals(),
            default_discount_percent: default_discount_percent(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ScannerSettings {
    /// Retry policy configuration derived from these settings.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
            ..Default::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Fully validated configuration for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    /// Networks in file order.
    pub networks: Vec<NetworkConfig>,
    pub settings: ScannerSettings,
}

// ─── File shape ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    networks: IndexMap<String, RawNetwork>,
    #[serde(default)]
    scanner: ScannerSettings,
}

#[derive(Deserialize)]
struct RawNetwork {
    #[serde(rename = "RPC_URL", alias = "rpc_url", default)]
    rpc_url: Option<String>,
    #[serde(alias = "controllers", default)]
    controller_contracts: Vec<RawController>,
}

#[derive(Deserialize)]
struct RawController {
    address: String,
    #[serde(default)]
    creation_block: i64,
    #[serde(alias = "collateral_token_symbol", default)]
    collateral_token: Option<String>,
    #[serde(default)]
    platform: Option<String>,
}

impl IndexerConfig {
    /// Read and validate a config file, applying `LIQINDEX_RPC_*` overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text, |key| std::env::var(key).ok())
    }

    /// Parse and validate config JSON. `env` resolves RPC override variables.
    pub fn from_json_str(
        text: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ScanError> {
        let raw: RawConfig =
            serde_json::from_str(text).map_err(|e| ScanError::Config(e.to_string()))?;

        if raw.scanner.chunk_size == 0 {
            return Err(ScanError::Config("scanner.chunk_size must be positive".into()));
        }

        let mut networks = Vec::with_capacity(raw.networks.len());
        for (name, net) in raw.networks {
            let override_key = format!("{RPC_ENV_PREFIX}{}", name.to_ascii_uppercase());
            let rpc = env(&override_key)
                .or(net.rpc_url)
                .filter(|url| !url.trim().is_empty());
            let Some(rpc_endpoint) = rpc else {
                tracing::warn!(network = %name, "no RPC endpoint configured, network skipped");
                continue;
            };

            let mut seen = HashSet::new();
            let mut controllers = Vec::with_capacity(net.controller_contracts.len());
            for raw_ctrl in net.controller_contracts {
                let ctrl = validate_controller(&name, raw_ctrl)?;
                if !seen.insert(ctrl.address.clone()) {
                    return Err(ScanError::Config(format!(
                        "{name}: controller {} listed twice",
                        ctrl.address
                    )));
                }
                controllers.push(ctrl);
            }

            networks.push(NetworkConfig {
                name,
                rpc_endpoint,
                controllers,
            });
        }

        Ok(Self {
            networks,
            settings: raw.scanner,
        })
    }
}

fn validate_controller(network: &str, raw: RawController) -> Result<ControllerConfig, ScanError> {
    let address = Address::from_str(raw.address.trim()).map_err(|e| {
        ScanError::Config(format!("{network}: invalid controller address {:?}: {e}", raw.address))
    })?;
    if raw.creation_block < 0 {
        return Err(ScanError::Config(format!(
            "{network}: controller {} has negative creation_block {}",
            raw.address, raw.creation_block
        )));
    }
    Ok(ControllerConfig {
        address: address.to_checksum(None),
        creation_block: (raw.creation_block as u64).max(1),
        collateral_token_symbol: raw.collateral_token.unwrap_or_else(|| "N/A".into()),
        platform: raw.platform.unwrap_or_else(|| "N/A".into()),
    })
}
