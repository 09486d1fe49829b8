//! Event source abstraction
//!
//! The engine consumes three raw event streams per chain: V2 Sync logs, V3
//! Swap logs, and new block headers. `EventSource` hides the transport; the
//! production implementation subscribes over websocket, decodes log payloads
//! and yields normalized events. Everything downstream of the trait is
//! transport-free and unit-testable.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::error::{EngineError, Result};
use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::pin::Pin;

/// topic0 of `Sync(uint112,uint112)`, emitted by every V2 pair on reserve change.
pub static SYNC_TOPIC: Lazy<B256> = Lazy::new(|| keccak256(b"Sync(uint112,uint112)"));

/// topic0 of `Swap(address,address,int256,int256,uint160,uint128,int24)`,
/// emitted by every V3 pool on swap.
pub static SWAP_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"Swap(address,address,int256,int256,uint160,uint128,int24)"));

/// Decoded V2 reserve update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolUpdateV2 {
    pub chain: String,
    pub pool_address: Address,
    pub block_number: u64,
    pub reserve0: U256,
    pub reserve1: U256,
}

/// Decoded V3 swap: only the post-swap sqrt price matters here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolUpdateV3 {
    pub chain: String,
    pub pool_address: Address,
    pub block_number: u64,
    pub sqrt_price_x96: U256,
}

/// New chain head with the fields needed for EIP-1559 base fee projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    pub chain: String,
    pub number: u64,
    pub base_fee: u128,
    pub gas_used: u64,
    pub gas_limit: u64,
}

pub type EventStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// Produces the three raw event streams of one chain. A returned stream
/// ending (None) means the transport closed; the supervisor resubscribes.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn sync_events(&self, chain: &str) -> Result<EventStream<PoolUpdateV2>>;
    async fn swap_events(&self, chain: &str) -> Result<EventStream<PoolUpdateV3>>;
    async fn new_blocks(&self, chain: &str) -> Result<EventStream<NewBlock>>;
}

/// Decodes a Sync log: data is two 32-byte words (reserve0, reserve1).
pub fn decode_sync_log(chain: &str, log: &Log) -> Result<PoolUpdateV2> {
    let data = log.data().data.as_ref();
    if data.len() < 64 {
        return Err(EngineError::Decode(format!(
            "sync log from {}: {} data bytes, need 64",
            log.address(),
            data.len()
        )));
    }

    Ok(PoolUpdateV2 {
        chain: chain.to_string(),
        pool_address: log.address(),
        block_number: log.block_number.unwrap_or_default(),
        reserve0: U256::from_be_slice(&data[0..32]),
        reserve1: U256::from_be_slice(&data[32..64]),
    })
}

/// Decodes a V3 Swap log: sqrtPriceX96 is the third data word
/// (amount0, amount1, sqrtPriceX96, liquidity, tick).
pub fn decode_swap_log(chain: &str, log: &Log) -> Result<PoolUpdateV3> {
    let data = log.data().data.as_ref();
    if data.len() < 160 {
        return Err(EngineError::Decode(format!(
            "swap log from {}: {} data bytes, need 160",
            log.address(),
            data.len()
        )));
    }

    Ok(PoolUpdateV3 {
        chain: chain.to_string(),
        pool_address: log.address(),
        block_number: log.block_number.unwrap_or_default(),
        sqrt_price_x96: U256::from_be_slice(&data[64..96]),
    })
}

/// Websocket-backed event source. One fresh connection per subscription, so
/// a dead V2 stream never takes the block stream down with it.
pub struct WsEventSource {
    ws_endpoints: HashMap<String, String>,
}

impl WsEventSource {
    pub fn new(ws_endpoints: HashMap<String, String>) -> Self {
        WsEventSource { ws_endpoints }
    }

    fn endpoint(&self, chain: &str) -> Result<&str> {
        self.ws_endpoints
            .get(chain)
            .map(|s| s.as_str())
            .ok_or_else(|| EngineError::Config(format!("no WS endpoint for chain {chain}")))
    }

    async fn connect(&self, chain: &str) -> Result<DynProvider> {
        let url = self.endpoint(chain)?;
        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(url))
            .await
            .map_err(|e| EngineError::TransportClosed(format!("ws connect to {chain}: {e}")))?;
        Ok(provider.erased())
    }
}

#[async_trait]
impl EventSource for WsEventSource {
    async fn sync_events(&self, chain: &str) -> Result<EventStream<PoolUpdateV2>> {
        let provider = self.connect(chain).await?;
        let filter = Filter::new().event_signature(*SYNC_TOPIC);
        let sub = provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| EngineError::TransportClosed(format!("sync subscribe: {e}")))?;

        let chain = chain.to_string();
        let stream = sub.into_stream().map(move |log| {
            let _keepalive = &provider;
            decode_sync_log(&chain, &log)
        });
        Ok(Box::pin(stream))
    }

    async fn swap_events(&self, chain: &str) -> Result<EventStream<PoolUpdateV3>> {
        let provider = self.connect(chain).await?;
        let filter = Filter::new().event_signature(*SWAP_TOPIC);
        let sub = provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| EngineError::TransportClosed(format!("swap subscribe: {e}")))?;

        let chain = chain.to_string();
        let stream = sub.into_stream().map(move |log| {
            let _keepalive = &provider;
            decode_swap_log(&chain, &log)
        });
        Ok(Box::pin(stream))
    }

    async fn new_blocks(&self, chain: &str) -> Result<EventStream<NewBlock>> {
        let provider = self.connect(chain).await?;
        let sub = provider
            .subscribe_blocks()
            .await
            .map_err(|e| EngineError::TransportClosed(format!("newHeads subscribe: {e}")))?;

        let chain = chain.to_string();
        let stream = sub.into_stream().map(move |header| {
            let _keepalive = &provider;
            Ok(NewBlock {
                chain: chain.clone(),
                number: header.number,
                base_fee: header.base_fee_per_gas.unwrap_or_default() as u128,
                gas_used: header.gas_used,
                gas_limit: header.gas_limit,
            })
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, LogData};

    fn make_log(address: Address, topic: B256, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address,
                data: LogData::new_unchecked(vec![topic], Bytes::from(data)),
            },
            block_number: Some(19_000_000),
            ..Default::default()
        }
    }

    fn word(value: u64) -> [u8; 32] {
        U256::from(value).to_be_bytes()
    }

    #[test]
    fn test_event_topics() {
        // Well-known selector hashes from the Uniswap deployments
        assert_eq!(
            format!("{:x}", *SYNC_TOPIC),
            "1c411e9a96e071241c2f21f7726b17ae89e3cab4c78be50e062b03a9fffbbad1"
        );
        assert_eq!(
            format!("{:x}", *SWAP_TOPIC),
            "c42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67"
        );
    }

    #[test]
    fn test_decode_sync_log() {
        let mut data = Vec::new();
        data.extend_from_slice(&word(1_000_000));
        data.extend_from_slice(&word(2_000_000));

        let log = make_log(Address::repeat_byte(0x11), *SYNC_TOPIC, data);
        let update = decode_sync_log("ethereum", &log).unwrap();

        assert_eq!(update.chain, "ethereum");
        assert_eq!(update.pool_address, Address::repeat_byte(0x11));
        assert_eq!(update.block_number, 19_000_000);
        assert_eq!(update.reserve0, U256::from(1_000_000u64));
        assert_eq!(update.reserve1, U256::from(2_000_000u64));
    }

    #[test]
    fn test_decode_sync_log_truncated() {
        let log = make_log(Address::repeat_byte(0x11), *SYNC_TOPIC, vec![0u8; 32]);
        assert!(matches!(
            decode_sync_log("ethereum", &log),
            Err(EngineError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_swap_log_third_word() {
        let mut data = Vec::new();
        data.extend_from_slice(&word(111)); // amount0
        data.extend_from_slice(&word(222)); // amount1
        data.extend_from_slice(&word(3_401_400)); // sqrtPriceX96
        data.extend_from_slice(&word(444)); // liquidity
        data.extend_from_slice(&word(555)); // tick

        let log = make_log(Address::repeat_byte(0x22), *SWAP_TOPIC, data);
        let update = decode_swap_log("polygon", &log).unwrap();

        assert_eq!(update.sqrt_price_x96, U256::from(3_401_400u64));
        assert_eq!(update.chain, "polygon");
    }

    #[test]
    fn test_decode_swap_log_truncated() {
        let log = make_log(Address::repeat_byte(0x22), *SWAP_TOPIC, vec![0u8; 96]);
        assert!(matches!(
            decode_swap_log("ethereum", &log),
            Err(EngineError::Decode(_))
        ));
    }
}
