//! Shared types for the scanning pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

// ─── BlockSummary ─────────────────────────────────────────────────────────────

/// The parts of a block header the scanner needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// Block number.
    pub number: u64,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
}

// ─── EventFilter ─────────────────────────────────────────────────────────────

/// Address + topic0 filter for an `eth_getLogs` query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only logs from these contract addresses (empty = all addresses).
    pub addresses: Vec<String>,
    /// Only logs with this topic[0] value (empty = all events).
    pub topic0_values: Vec<String>,
}

impl EventFilter {
    /// Filter for a set of contract addresses.
    pub fn addresses<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addrs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Add a topic0 filter (event signature hash).
    pub fn topic0(mut self, topic: impl Into<String>) -> Self {
        self.topic0_values.push(topic.into());
        self
    }
}

// ─── LossBreakdown ────────────────────────────────────────────────────────────

/// Economic cost of a liquidation to the position owner.
///
/// The liquidator repays `debt_repaid` and is paid the discount on top, so the
/// user loses the discount share in addition to the debt itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossBreakdown {
    /// Discount paid to the liquidator, in USD.
    pub user_loss_amount: f64,
    /// Debt plus discount, in USD.
    pub total_loss_value: f64,
    /// The discount as a percentage of the debt.
    pub user_loss_percent: f64,
}

impl LossBreakdown {
    pub fn from_debt(debt_repaid: f64, discount_percent: f64) -> Self {
        let user_loss_amount = debt_repaid * (discount_percent / 100.0);
        Self {
            user_loss_amount,
            total_loss_value: debt_repaid + user_loss_amount,
            user_loss_percent: discount_percent,
        }
    }
}

// ─── LiquidationEvent ─────────────────────────────────────────────────────────

/// One hard liquidation, normalised. The ledger's record type.
///
/// Field names and shapes are the on-disk format consumed by reporting tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub network: String,
    /// Controller address (EIP-55).
    pub controller: String,
    pub block_number: u64,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub liquidation_time: DateTime<Utc>,
    /// Transaction hash, lower-case `0x…`. Unique across the ledger.
    pub tx_hash: String,
    pub liquidator: String,
    pub user: String,
    /// Collateral paid out, scaled by the collateral token's decimals.
    pub collateral_received: f64,
    /// Stablecoin paid out, scaled by 1e18.
    pub stablecoin_received: f64,
    /// Debt repaid, in USD.
    pub debt_repaid: f64,
    /// Liquidator discount, in percent.
    pub liquidation_discount: f64,
    pub user_loss_amount: f64,
    pub total_loss_value: f64,
    pub user_loss_percent: f64,
    pub collateral_token: String,
    pub platform: String,
}

/// `2024-03-01T12:00:00+00:00` rather than chrono's default `Z` suffix.
fn serialize_rfc3339<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&dt.to_rfc3339())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
