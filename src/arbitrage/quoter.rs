//! Quote oracle
//!
//! Builds the ordered swap-leg parameter list for a cyclic trade and
//! simulates its output amount on-chain through a deployed simulator
//! contract. Buy legs run in path order; sell legs traverse the sell path
//! backwards with each hop's tokens flipped, because enumerated paths always
//! point in the buy (QUOTE → BASE) direction.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::contracts::ISwapSimulator;
use crate::error::{EngineError, Result};
use crate::pool::PoolRegistry;
use crate::types::{SwapPath, SwapStep};
use alloy::primitives::{aliases::U24, Address, U256};
use alloy::providers::DynProvider;
use async_trait::async_trait;
use std::collections::HashMap;

/// On-chain swap output simulation. Implementations are expected to be
/// conservative: any revert maps to `SimulationError`.
#[async_trait]
pub trait QuoteOracle: Send + Sync {
    async fn simulate(&self, chain: &str, params: Vec<SwapStep>) -> Result<U256>;
}

/// Builds simulator params for a buy path followed by a sell path.
/// Only the very first leg carries the input amount.
pub fn make_params(
    registry: &PoolRegistry,
    chain: &str,
    handlers: &HashMap<String, Address>,
    amount_in: U256,
    buy_path: &SwapPath,
    sell_path: &SwapPath,
    buy_pools: &[usize],
    sell_pools: &[usize],
) -> Result<Vec<SwapStep>> {
    let mut params = Vec::new();

    for (i, hop) in buy_path.real_hops().enumerate() {
        let ordinal = *buy_pools
            .get(i)
            .ok_or_else(|| EngineError::Simulation("buy pool list too short".to_string()))?;
        let amount = if i == 0 { amount_in } else { U256::ZERO };
        params.push(make_step(registry, chain, handlers, ordinal, hop.token_in, hop.token_out, amount)?);
    }

    let mut sell_legs = Vec::new();
    for (i, hop) in sell_path.real_hops().enumerate() {
        let ordinal = *sell_pools
            .get(i)
            .ok_or_else(|| EngineError::Simulation("sell pool list too short".to_string()))?;
        // Token order flipped: the sell leg walks the path backwards.
        sell_legs.push(make_step(
            registry,
            chain,
            handlers,
            ordinal,
            hop.token_out,
            hop.token_in,
            U256::ZERO,
        )?);
    }
    sell_legs.reverse();
    params.extend(sell_legs);

    Ok(params)
}

fn make_step(
    registry: &PoolRegistry,
    chain: &str,
    handlers: &HashMap<String, Address>,
    ordinal: usize,
    token_in_id: u16,
    token_out_id: u16,
    amount: U256,
) -> Result<SwapStep> {
    let desc = registry
        .descriptor(ordinal)
        .ok_or_else(|| EngineError::Simulation(format!("unknown pool ordinal {ordinal}")))?;

    let handler_key = format!("{}_v{}", desc.exchange, desc.version.as_digit());
    let handler = *handlers.get(&handler_key).ok_or_else(|| {
        EngineError::Simulation(format!("no simulation handler for {handler_key} on {chain}"))
    })?;

    let token_in = registry
        .token_address(chain, token_in_id)
        .ok_or_else(|| EngineError::Simulation(format!("no address for token {token_in_id}")))?;
    let token_out = registry
        .token_address(chain, token_out_id)
        .ok_or_else(|| EngineError::Simulation(format!("no address for token {token_out_id}")))?;

    Ok(SwapStep {
        protocol: desc.version.protocol_id(),
        handler,
        token_in,
        token_out,
        fee: desc.fee,
        amount,
    })
}

/// Quote oracle backed by a deployed simulator contract per chain.
pub struct OnlineQuoter {
    providers: HashMap<String, DynProvider>,
    contracts: HashMap<String, Address>,
}

impl OnlineQuoter {
    pub fn new(providers: HashMap<String, DynProvider>, contracts: HashMap<String, Address>) -> Self {
        OnlineQuoter {
            providers,
            contracts,
        }
    }
}

#[async_trait]
impl QuoteOracle for OnlineQuoter {
    async fn simulate(&self, chain: &str, params: Vec<SwapStep>) -> Result<U256> {
        let provider = self
            .providers
            .get(chain)
            .ok_or_else(|| EngineError::Simulation(format!("no provider for chain {chain}")))?;
        let contract = *self
            .contracts
            .get(chain)
            .ok_or_else(|| EngineError::Simulation(format!("no simulator contract on {chain}")))?;

        let params: Vec<ISwapSimulator::SwapParams> = params
            .into_iter()
            .map(|step| ISwapSimulator::SwapParams {
                protocol: step.protocol,
                handler: step.handler,
                tokenIn: step.token_in,
                tokenOut: step.token_out,
                fee: U24::from(step.fee),
                amount: step.amount,
            })
            .collect();

        let simulator = ISwapSimulator::new(contract, provider.clone());
        simulator
            .simulateSwapIn(params)
            .call()
            .await
            .map_err(|e| EngineError::Simulation(e.to_string()))
    }
}
