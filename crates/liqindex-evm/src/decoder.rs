//! `Liquidate` log → [`LiquidationEvent`].
//!
//! Two encodings are accepted. The controller emits `liquidator` and `user`
//! as indexed topics with the three amounts in `data`; older deployments put
//! all five fields in `data`. `debt` may be missing from short payloads, in
//! which case the log is skipped.
//!
//! Filters, in order: missing debt, dust (debt below the USD threshold),
//! self-liquidation. Only logs that survive trigger metadata reads.

use alloy_primitives::U256;
use chrono::DateTime;

use liqindex_core::config::ControllerConfig;
use liqindex_core::error::ScanError;
use liqindex_core::types::{LiquidationEvent, LossBreakdown};

use crate::client::{decode_hex, RawLog};
use crate::fetcher::EvmFetcher;
use crate::metadata::{decode_address_word, decode_uint_word, BlockTimeCache, ControllerMetadataCache};
use crate::signature::liquidate_topic;

/// Raw fields of a `Liquidate` log.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidateLog {
    pub liquidator: String,
    pub user: String,
    pub collateral_received: U256,
    pub stablecoin_received: U256,
    pub debt: Option<U256>,
}

/// Why a well-formed log produced no event.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingDebt,
    Dust { debt_usd: f64 },
    SelfLiquidation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Accepted(LiquidationEvent),
    Skipped(SkipReason),
}

/// `value / 10^decimals` as a float.
pub fn scale_units(value: U256, decimals: u8) -> f64 {
    let raw: f64 = value.to_string().parse().unwrap_or(f64::INFINITY);
    raw / 10f64.powi(decimals as i32)
}

/// Split a `Liquidate` log into its fields.
pub fn decode_liquidate(log: &RawLog) -> Result<LiquidateLog, ScanError> {
    let topic0 = log
        .topics
        .first()
        .ok_or_else(|| ScanError::Decode("log has no topics".into()))?;
    if !topic0.eq_ignore_ascii_case(liquidate_topic()) {
        return Err(ScanError::Decode(format!("unexpected topic0 {topic0}")));
    }

    let data = decode_hex(&log.data)?;
    if data.len() % 32 != 0 {
        return Err(ScanError::Decode(format!(
            "Liquidate data is {} bytes, not a whole number of words",
            data.len()
        )));
    }
    let words: Vec<&[u8]> = data.chunks_exact(32).collect();

    let (liquidator, user, amounts) = match log.topics.len() {
        n if n >= 3 => (
            decode_address_word(&decode_hex(&log.topics[1])?)?,
            decode_address_word(&decode_hex(&log.topics[2])?)?,
            &words[..],
        ),
        1 if words.len() >= 2 => (
            decode_address_word(words[0])?,
            decode_address_word(words[1])?,
            &words[2..],
        ),
        n => {
            return Err(ScanError::Decode(format!(
                "unsupported Liquidate layout: {n} topics, {} data words",
                words.len()
            )))
        }
    };

    if amounts.len() < 2 {
        return Err(ScanError::Decode(format!(
            "Liquidate data too short: {} amount words",
            amounts.len()
        )));
    }

    Ok(LiquidateLog {
        liquidator,
        user,
        collateral_received: decode_uint_word(amounts[0])?,
        stablecoin_received: decode_uint_word(amounts[1])?,
        debt: amounts.get(2).map(|w| decode_uint_word(w)).transpose()?,
    })
}

/// Turns raw logs of one network into ledger records.
pub struct LiquidationDecoder {
    network: String,
    min_debt_usd: f64,
}

impl LiquidationDecoder {
    pub fn new(network: impl Into<String>, min_debt_usd: f64) -> Self {
        Self {
            network: network.into(),
            min_debt_usd,
        }
    }

    /// Decode, filter and normalise one log emitted by `controller`.
    ///
    /// Errors mean the log itself could not be turned into a record; the
    /// caller logs and moves on.
    pub async fn decode(
        &self,
        log: &RawLog,
        controller: &ControllerConfig,
        fetcher: &EvmFetcher,
        metadata: &mut ControllerMetadataCache,
        block_times: &mut BlockTimeCache,
    ) -> Result<Decoded, ScanError> {
        let raw = decode_liquidate(log)?;

        let Some(debt) = raw.debt else {
            return Ok(Decoded::Skipped(SkipReason::MissingDebt));
        };
        let debt_usd = scale_units(debt, 18);
        if debt_usd < self.min_debt_usd {
            return Ok(Decoded::Skipped(SkipReason::Dust { debt_usd }));
        }
        if raw.liquidator.eq_ignore_ascii_case(&raw.user) {
            return Ok(Decoded::Skipped(SkipReason::SelfLiquidation));
        }

        let decimals = metadata
            .collateral_decimals(fetcher, &controller.address)
            .await;
        let discount = metadata
            .liquidation_discount_percent(fetcher, &controller.address)
            .await;
        let loss = LossBreakdown::from_debt(debt_usd, discount);

        let block_number = log.block_number_u64()?;
        let ts = block_times.timestamp(fetcher, block_number).await?;
        let liquidation_time = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| ScanError::Decode(format!("block {block_number}: bad timestamp {ts}")))?;

        Ok(Decoded::Accepted(LiquidationEvent {
            network: self.network.clone(),
            controller: controller.address.clone(),
            block_number,
            liquidation_time,
            tx_hash: log.tx_hash_lower(),
            liquidator: raw.liquidator,
            user: raw.user,
            collateral_received: scale_units(raw.collateral_received, decimals),
            stablecoin_received: scale_units(raw.stablecoin_received, 18),
            debt_repaid: debt_usd,
            liquidation_discount: discount,
            user_loss_amount: loss.user_loss_amount,
            total_loss_value: loss.total_loss_value,
            user_loss_percent: loss.user_loss_percent,
            collateral_token: controller.collateral_token_symbol.clone(),
            platform: controller.platform.clone(),
        }))
    }
}
