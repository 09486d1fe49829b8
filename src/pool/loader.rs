//! Bulk pool state loader
//!
//! At startup the store is populated with a single Multicall3 `aggregate3`
//! eth_call per chain, batching `getReserves()` for V2 pools and `slot0()`
//! for V3 pools. A failed sub-call leaves that pool's cells zeroed and
//! unusable; live events will populate them later.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::contracts::{aggregate3Call, Call3, IUniswapV2Pair, IUniswapV3Pool, MULTICALL3_ADDRESS};
use crate::error::{EngineError, Result};
use crate::pool::{PoolRegistry, PriceStore};
use crate::types::{PoolDescriptor, PoolVersion};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Bytes, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use tracing::{debug, warn};

/// Loads the state of every registered pool on `chain` into the store.
/// Returns the number of pools successfully populated.
pub async fn load_chain(
    provider: &DynProvider,
    chain: &str,
    registry: &PoolRegistry,
    store: &PriceStore,
) -> Result<usize> {
    let pools: Vec<&PoolDescriptor> = registry
        .descriptors()
        .iter()
        .filter(|d| d.chain == chain)
        .collect();

    if pools.is_empty() {
        return Ok(0);
    }

    let calls: Vec<Call3> = pools
        .iter()
        .map(|desc| {
            let calldata = match desc.version {
                PoolVersion::V2 => IUniswapV2Pair::getReservesCall {}.abi_encode(),
                PoolVersion::V3 => IUniswapV3Pool::slot0Call {}.abi_encode(),
            };
            Call3 {
                target: desc.address,
                allowFailure: true,
                callData: calldata.into(),
            }
        })
        .collect();

    let tx = TransactionRequest::default()
        .with_to(MULTICALL3_ADDRESS)
        .with_input(Bytes::from(aggregate3Call { calls }.abi_encode()));

    let raw = provider
        .call(tx)
        .await
        .map_err(|e| EngineError::Rpc(format!("multicall on {chain} failed: {e}")))?;

    let results = aggregate3Call::abi_decode_returns(&raw)
        .map_err(|e| EngineError::Decode(format!("multicall response on {chain}: {e}")))?;

    if results.len() != pools.len() {
        return Err(EngineError::Decode(format!(
            "multicall on {chain}: {} results for {} calls",
            results.len(),
            pools.len()
        )));
    }

    let mut populated = 0usize;
    for (desc, result) in pools.iter().zip(results.iter()) {
        if !result.success {
            warn!(
                "pool state load failed for {} {} {} on {} — cell left unusable",
                desc.exchange, desc.version, desc.name, chain
            );
            continue;
        }

        match apply_result(desc, &result.returnData, store) {
            Ok(()) => populated += 1,
            Err(e) => warn!(
                "pool state decode failed for {} {} {} on {}: {e}",
                desc.exchange, desc.version, desc.name, chain
            ),
        }
    }

    debug!("loaded {populated}/{} pools on {chain}", pools.len());
    Ok(populated)
}

fn apply_result(desc: &PoolDescriptor, data: &[u8], store: &PriceStore) -> Result<()> {
    match desc.version {
        PoolVersion::V2 => {
            let reserves = IUniswapV2Pair::getReservesCall::abi_decode_returns(data)
                .map_err(|e| EngineError::Decode(format!("getReserves: {e}")))?;
            store.update_reserves(
                desc.chain_id,
                desc.exchange_id,
                desc.token0_id,
                desc.token1_id,
                reserves.reserve0.to::<U256>(),
                reserves.reserve1.to::<U256>(),
            )
        }
        PoolVersion::V3 => {
            let slot0 = IUniswapV3Pool::slot0Call::abi_decode_returns(data)
                .map_err(|e| EngineError::Decode(format!("slot0: {e}")))?;
            store.update_sqrt_price(
                desc.chain_id,
                desc.exchange_id,
                desc.token0_id,
                desc.token1_id,
                slot0.sqrtPriceX96.to::<U256>(),
            )
        }
    }
}
