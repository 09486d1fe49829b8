//! Gas tracking
//!
//! Projects the next-block base fee per EIP-1559 from each new header and
//! augments it with priority/max fee estimates from the Blocknative gas
//! oracle. Oracle failures degrade to zero estimates, which downstream
//! treats as "cannot fund" — the conservative direction.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::error::{EngineError, Result};
use crate::stream::source::NewBlock;
use crate::types::GasInfo;
use rand::Rng;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Advisory history depth of retained gas tuples.
const GAS_HISTORY_LEN: usize = 100;

/// Next-block base fee per the EIP-1559 adjustment rule (integer math):
/// target is half the gas limit (floor 1); the fee moves by
/// `base * |gasUsed - target| / target / 8` toward usage.
pub fn next_base_fee(base_fee: u128, gas_used: u64, gas_limit: u64) -> u128 {
    let target = ((gas_limit / 2) as u128).max(1);
    let gas_used = gas_used as u128;

    if gas_used > target {
        base_fee + base_fee * (gas_used - target) / target / 8
    } else {
        base_fee - base_fee * (target - gas_used) / target / 8
    }
}

/// Projection with a small random jitter in [0, 9] wei added to break ties
/// between concurrent readers of the same header.
pub fn next_base_fee_jittered(base_fee: u128, gas_used: u64, gas_limit: u64) -> u128 {
    next_base_fee(base_fee, gas_used, gas_limit) + rand::thread_rng().gen_range(0..10)
}

/// Blocknative block-prices client. Without an API key every estimate is
/// zero and pending opportunities are discarded at the funding check.
pub struct GasOracle {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GasOracle {
    pub fn new(api_key: Option<String>) -> Self {
        GasOracle {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            api_key,
        }
    }

    /// (max_priority_fee_per_gas, max_fee_per_gas) in wei for the given
    /// numeric chain id. The chain id is always the caller's — never a
    /// hardcoded network.
    pub async fn estimate(&self, chain_id: u64) -> Result<(u128, u128)> {
        let Some(api_key) = &self.api_key else {
            return Err(EngineError::OracleUnavailable("no API key".to_string()));
        };

        let url = format!("https://api.blocknative.com/gasprices/blockprices?chainId={chain_id}");
        let response = self
            .client
            .get(&url)
            .header("Authorization", api_key)
            .send()
            .await
            .map_err(|e| EngineError::OracleUnavailable(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| EngineError::OracleUnavailable(e.to_string()))?;

        parse_block_prices(&body)
    }
}

/// Extracts the first estimated price of the next block. Fees arrive in
/// gwei as floats and are converted to wei.
fn parse_block_prices(body: &Value) -> Result<(u128, u128)> {
    let estimated = body
        .get("blockPrices")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("estimatedPrices"))
        .and_then(|v| v.get(0))
        .ok_or_else(|| EngineError::OracleUnavailable("malformed block prices".to_string()))?;

    let priority_gwei = estimated
        .get("maxPriorityFeePerGas")
        .and_then(Value::as_f64)
        .ok_or_else(|| EngineError::OracleUnavailable("missing maxPriorityFeePerGas".to_string()))?;
    let max_gwei = estimated
        .get("maxFeePerGas")
        .and_then(Value::as_f64)
        .ok_or_else(|| EngineError::OracleUnavailable("missing maxFeePerGas".to_string()))?;

    Ok(((priority_gwei * 1e9) as u128, (max_gwei * 1e9) as u128))
}

/// Builds the gas context for a new head, consulting the oracle when
/// available. Advisory only beyond the fees: block number and chain ride
/// along for the detector's block-gating.
pub async fn gas_info_for_block(
    oracle: &GasOracle,
    chain_id: Option<u64>,
    block: &NewBlock,
) -> GasInfo {
    let base_fee = next_base_fee_jittered(block.base_fee, block.gas_used, block.gas_limit);

    let (max_priority_fee_per_gas, max_fee_per_gas) = match chain_id {
        Some(id) => match oracle.estimate(id).await {
            Ok(fees) => fees,
            Err(e) => {
                debug!("gas oracle fallback for {}: {e}", block.chain);
                (0, 0)
            }
        },
        None => (0, 0),
    };

    GasInfo {
        chain: block.chain.clone(),
        block: block.number,
        base_fee,
        max_priority_fee_per_gas,
        max_fee_per_gas,
    }
}

/// Fixed-depth ring of recent gas tuples, one per chain subscription.
#[derive(Debug, Default)]
pub struct GasHistory {
    ring: VecDeque<GasInfo>,
}

impl GasHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, info: GasInfo) {
        if self.ring.len() == GAS_HISTORY_LEN {
            self.ring.pop_front();
        }
        self.ring.push_back(info);
    }

    pub fn latest(&self) -> Option<&GasInfo> {
        self.ring.back()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
