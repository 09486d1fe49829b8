//! Configuration management
//!
//! Endpoints and trading parameters come from the environment (.env),
//! the market definition (tokens, pools, symbols, simulator handlers)
//! from a TOML file.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::error::{EngineError, Result};
use crate::types::GasCosts;
use alloy::primitives::Address;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Token table entry: on-chain address plus ERC20 decimals.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub decimals: u8,
}

/// Pool descriptor as written in the market file.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolEntry {
    pub chain: String,
    pub exchange: String,
    /// 2 or 3.
    pub version: u8,
    /// Pair name, e.g. "ETH/USDT".
    pub name: String,
    pub address: Address,
    /// Hundredths of a basis point (500 = 0.05%).
    pub fee: u32,
    pub token0: String,
    pub token1: String,
}

/// Per-chain simulator contract plus protocol handler addresses.
/// Handler keys look like "uniswap_v2" / "sushiswap_v3".
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorEntry {
    pub contract: Address,
    #[serde(default)]
    pub handlers: BTreeMap<String, Address>,
}

/// The market definition file.
#[derive(Debug, Clone, Deserialize)]
struct MarketFile {
    trading_symbols: Vec<String>,
    /// chain name → numeric chain id (for the gas oracle).
    #[serde(default)]
    chains: BTreeMap<String, u64>,
    /// chain → token symbol → info.
    tokens: BTreeMap<String, BTreeMap<String, TokenInfo>>,
    #[serde(default)]
    pools: Vec<PoolEntry>,
    #[serde(default)]
    simulator: BTreeMap<String, SimulatorEntry>,
}

/// Fully resolved engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub rpc_endpoints: BTreeMap<String, String>,
    pub ws_endpoints: BTreeMap<String, String>,
    pub chain_ids: BTreeMap<String, u64>,
    pub tokens: BTreeMap<String, BTreeMap<String, TokenInfo>>,
    pub pools: Vec<PoolEntry>,
    pub trading_symbols: Vec<String>,
    pub max_swaps: usize,
    /// Maximum order size in quote-token units.
    pub max_bet_size: f64,
    /// Minimum net spread (percent) that opens a pending opportunity.
    pub target_spread: f64,
    pub gas_costs: GasCosts,
    pub order_retry: u32,
    pub blocknative_api_key: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub simulator: BTreeMap<String, SimulatorEntry>,
    /// Debug mode: detect and simulate, never submit orders.
    pub debug: bool,
}

impl EngineConfig {
    /// Chains that actually carry configured pools, in name order.
    pub fn active_chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self
            .pools
            .iter()
            .map(|p| p.chain.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        chains.sort();
        chains
    }

    /// Numeric chain id for the gas oracle; the mapping comes from the
    /// market file's `[chains]` table.
    pub fn numeric_chain_id(&self, chain: &str) -> Option<u64> {
        self.chain_ids.get(chain).copied()
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| EngineError::Config(format!("{key} not set")))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| EngineError::Config(format!("{key} is not a valid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

/// Loads the full engine configuration. Every chain referenced by the market
/// file must have both an HTTP and a WS endpoint in the environment.
pub fn load_config(market_path: &Path, debug: bool) -> Result<EngineConfig> {
    dotenv::dotenv().ok();

    let raw = std::fs::read_to_string(market_path).map_err(|e| {
        EngineError::Config(format!(
            "failed to read market file {}: {e}",
            market_path.display()
        ))
    })?;
    let market: MarketFile = toml::from_str(&raw)
        .map_err(|e| EngineError::Config(format!("failed to parse market file: {e}")))?;

    validate_market(&market)?;

    let mut rpc_endpoints = BTreeMap::new();
    let mut ws_endpoints = BTreeMap::new();
    for chain in market.tokens.keys() {
        let upper = chain.to_uppercase();
        rpc_endpoints.insert(chain.clone(), env_var(&format!("{upper}_HTTP_RPC_URL"))?);
        ws_endpoints.insert(chain.clone(), env_var(&format!("{upper}_WS_RPC_URL"))?);
    }

    let gas_costs = GasCosts {
        base: env_parse("GAS_COST_BASE", GasCosts::default().base)?,
        v2_hop: env_parse("GAS_COST_V2_HOP", GasCosts::default().v2_hop)?,
        v3_hop: env_parse("GAS_COST_V3_HOP", GasCosts::default().v3_hop)?,
    };

    Ok(EngineConfig {
        rpc_endpoints,
        ws_endpoints,
        chain_ids: market.chains,
        tokens: market.tokens,
        pools: market.pools,
        trading_symbols: market.trading_symbols,
        max_swaps: env_parse("MAX_SWAPS", 3usize)?,
        max_bet_size: env_parse("MAX_BET_SIZE", 20_000.0)?,
        target_spread: env_parse("TARGET_SPREAD", 0.15)?,
        gas_costs,
        order_retry: env_parse("ORDER_RETRY", 2u32)?,
        blocknative_api_key: std::env::var("BLOCKNATIVE_API_KEY").ok(),
        notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL").ok(),
        simulator: market.simulator,
        debug,
    })
}

/// Structural checks that do not need the registry: every pool must name a
/// known chain and known tokens, and every symbol must be BASE/QUOTE shaped.
fn validate_market(market: &MarketFile) -> Result<()> {
    for pool in &market.pools {
        let tokens = market.tokens.get(&pool.chain).ok_or_else(|| {
            EngineError::Config(format!(
                "pool {} references unknown chain {}",
                pool.name, pool.chain
            ))
        })?;
        for token in [&pool.token0, &pool.token1] {
            if !tokens.contains_key(token) {
                return Err(EngineError::Config(format!(
                    "pool {} on {} references unknown token {}",
                    pool.name, pool.chain, token
                )));
            }
        }
        if pool.version != 2 && pool.version != 3 {
            return Err(EngineError::Config(format!(
                "pool {} has unsupported version {}",
                pool.name, pool.version
            )));
        }
    }

    for symbol in &market.trading_symbols {
        if symbol.split('/').count() != 2 {
            return Err(EngineError::Config(format!(
                "trading symbol {symbol} is not BASE/QUOTE shaped"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET_TOML: &str = r#"
        trading_symbols = ["ETH/USDT"]

        [chains]
        ethereum = 1

        [tokens.ethereum]
        ETH = { address = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", decimals = 18 }
        USDT = { address = "0xdAC17F958D2ee523a2206206994597C13D831ec7", decimals = 6 }

        [[pools]]
        chain = "ethereum"
        exchange = "uniswap"
        version = 3
        name = "ETH/USDT"
        address = "0x11b815efB8f581194ae79006d24E0d814B7697F6"
        fee = 500
        token0 = "ETH"
        token1 = "USDT"
    "#;

    #[test]
    fn test_market_file_parses() {
        let market: MarketFile = toml::from_str(MARKET_TOML).unwrap();
        assert_eq!(market.trading_symbols, vec!["ETH/USDT"]);
        assert_eq!(market.chains.get("ethereum"), Some(&1));
        assert_eq!(market.pools.len(), 1);
        assert_eq!(market.pools[0].fee, 500);
        assert_eq!(market.tokens["ethereum"]["USDT"].decimals, 6);
        validate_market(&market).unwrap();
    }

    #[test]
    fn test_unknown_token_rejected() {
        let bad = MARKET_TOML.replace("token0 = \"ETH\"", "token0 = \"WBTC\"");
        let market: MarketFile = toml::from_str(&bad).unwrap();
        let err = validate_market(&market).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_bad_version_rejected() {
        let bad = MARKET_TOML.replace("version = 3", "version = 4");
        let market: MarketFile = toml::from_str(&bad).unwrap();
        assert!(validate_market(&market).is_err());
    }

    #[test]
    fn test_bad_symbol_rejected() {
        let bad = MARKET_TOML.replace("[\"ETH/USDT\"]", "[\"ETHUSDT\"]");
        let market: MarketFile = toml::from_str(&bad).unwrap();
        assert!(validate_market(&market).is_err());
    }
}
