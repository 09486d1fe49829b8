//! Pool Registry
//!
//! Static descriptor table built once at startup. Chains, exchanges and
//! tokens are sorted lexicographically and assigned dense integer IDs by
//! position, so every directional pool reference is a small-integer tuple.
//! Also keeps the per-chain directional key lists the path builder samples
//! from, and the address → descriptor lookup the event streams use.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::config::{PoolEntry, TokenInfo};
use crate::error::{EngineError, Result};
use crate::types::{PoolDescriptor, PoolRef, PoolVersion};
use alloy::primitives::Address;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
pub struct PoolRegistry {
    chains: Vec<String>,
    exchanges: Vec<String>,
    tokens: Vec<String>,
    chain_to_id: HashMap<String, u16>,
    exchange_to_id: HashMap<String, u16>,
    token_to_id: HashMap<String, u16>,
    /// Per-chain token tables (addresses and decimals), as configured.
    token_info: BTreeMap<String, BTreeMap<String, TokenInfo>>,
    /// Descriptors indexed by pool ordinal (registration order).
    descriptors: Vec<PoolDescriptor>,
    /// Both directional refs of every pool, grouped by chain name.
    chain_keys: HashMap<String, Vec<PoolRef>>,
    /// Directional ref → pool ordinal (both directions map to the same pool).
    ordinal_by_ref: HashMap<PoolRef, usize>,
    /// (chain name, pool address) → pool ordinal, for event stream lookups.
    ordinal_by_address: HashMap<(String, Address), usize>,
}

impl PoolRegistry {
    pub fn new(
        token_info: BTreeMap<String, BTreeMap<String, TokenInfo>>,
        pools: &[PoolEntry],
    ) -> Result<Self> {
        let mut chains: Vec<String> = token_info.keys().cloned().collect();
        chains.sort();

        let mut exchanges: Vec<String> = pools
            .iter()
            .map(|p| p.exchange.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        exchanges.sort();

        let mut tokens: Vec<String> = token_info
            .values()
            .flat_map(|t| t.keys().cloned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        tokens.sort();

        let chain_to_id: HashMap<String, u16> = chains
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i as u16))
            .collect();
        let exchange_to_id: HashMap<String, u16> = exchanges
            .iter()
            .enumerate()
            .map(|(i, e)| (e.clone(), i as u16))
            .collect();
        let token_to_id: HashMap<String, u16> = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u16))
            .collect();

        let mut registry = PoolRegistry {
            chains,
            exchanges,
            tokens,
            chain_to_id,
            exchange_to_id,
            token_to_id,
            token_info,
            descriptors: Vec::with_capacity(pools.len()),
            chain_keys: HashMap::new(),
            ordinal_by_ref: HashMap::new(),
            ordinal_by_address: HashMap::new(),
        };

        for pool in pools {
            registry.register(pool)?;
        }

        Ok(registry)
    }

    fn register(&mut self, pool: &PoolEntry) -> Result<()> {
        let version = PoolVersion::from_config(pool.version).ok_or_else(|| {
            EngineError::Config(format!(
                "pool {} has unsupported version {}",
                pool.name, pool.version
            ))
        })?;

        let chain_id = *self
            .chain_to_id
            .get(&pool.chain)
            .ok_or_else(|| EngineError::Config(format!("unknown chain {}", pool.chain)))?;
        let exchange_id = self.exchange_to_id[&pool.exchange];

        let chain_tokens = &self.token_info[&pool.chain];
        let token0_info = chain_tokens.get(&pool.token0).ok_or_else(|| {
            EngineError::Config(format!(
                "pool {} on {}: token {} missing from token table",
                pool.name, pool.chain, pool.token0
            ))
        })?;
        let token1_info = chain_tokens.get(&pool.token1).ok_or_else(|| {
            EngineError::Config(format!(
                "pool {} on {}: token {} missing from token table",
                pool.name, pool.chain, pool.token1
            ))
        })?;

        let token0_id = self.token_to_id[&pool.token0];
        let token1_id = self.token_to_id[&pool.token1];

        let ordinal = self.descriptors.len();
        let forward = PoolRef {
            chain: chain_id,
            exchange: exchange_id,
            token_in: token0_id,
            token_out: token1_id,
            version,
        };

        // Every (chain, exchange, token0, token1, version) combination must
        // be unique; the reversed direction covers swapped token order too.
        if self.ordinal_by_ref.contains_key(&forward)
            || self.ordinal_by_ref.contains_key(&forward.reversed())
        {
            return Err(EngineError::Config(format!(
                "duplicate pool registration: {} {} {} {}/{}",
                pool.chain, pool.exchange, version, pool.token0, pool.token1
            )));
        }

        self.descriptors.push(PoolDescriptor {
            ordinal,
            chain: pool.chain.clone(),
            exchange: pool.exchange.clone(),
            version,
            name: pool.name.clone(),
            address: pool.address,
            fee: pool.fee,
            token0: pool.token0.clone(),
            token1: pool.token1.clone(),
            token0_decimals: token0_info.decimals,
            token1_decimals: token1_info.decimals,
            chain_id,
            exchange_id,
            token0_id,
            token1_id,
        });

        self.ordinal_by_ref.insert(forward, ordinal);
        self.ordinal_by_ref.insert(forward.reversed(), ordinal);
        self.ordinal_by_address
            .insert((pool.chain.clone(), pool.address), ordinal);

        let keys = self.chain_keys.entry(pool.chain.clone()).or_default();
        keys.push(forward);
        keys.push(forward.reversed());

        Ok(())
    }

    pub fn chains(&self) -> &[String] {
        &self.chains
    }

    pub fn exchanges(&self) -> &[String] {
        &self.exchanges
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn descriptors(&self) -> &[PoolDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, ordinal: usize) -> Option<&PoolDescriptor> {
        self.descriptors.get(ordinal)
    }

    pub fn chain_id(&self, chain: &str) -> Option<u16> {
        self.chain_to_id.get(chain).copied()
    }

    pub fn chain_name(&self, chain_id: u16) -> Option<&str> {
        self.chains.get(chain_id as usize).map(|s| s.as_str())
    }

    pub fn token_id(&self, token: &str) -> Option<u16> {
        self.token_to_id.get(token).copied()
    }

    pub fn token_name(&self, token_id: u16) -> Option<&str> {
        self.tokens.get(token_id as usize).map(|s| s.as_str())
    }

    /// Token address on a given chain, by dense token id.
    pub fn token_address(&self, chain: &str, token_id: u16) -> Option<Address> {
        let name = self.token_name(token_id)?;
        self.token_info.get(chain)?.get(name).map(|t| t.address)
    }

    pub fn token_decimals(&self, chain: &str, token: &str) -> Option<u8> {
        self.token_info.get(chain)?.get(token).map(|t| t.decimals)
    }

    /// Both directional refs of every pool on `chain`, in registration order.
    pub fn directional_keys(&self, chain: &str) -> &[PoolRef] {
        self.chain_keys
            .get(chain)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Pool ordinal behind a directional ref.
    pub fn ordinal_of(&self, key: &PoolRef) -> Option<usize> {
        self.ordinal_by_ref.get(key).copied()
    }

    /// Descriptor of the pool at `address` on `chain`, if registered.
    pub fn pool_at(&self, chain: &str, address: Address) -> Option<&PoolDescriptor> {
        self.ordinal_by_address
            .get(&(chain.to_string(), address))
            .and_then(|&ordinal| self.descriptors.get(ordinal))
    }

    /// Dense (input, output) token ids for a BASE/QUOTE symbol. Buying BASE
    /// means the QUOTE token goes in, so the order is reversed.
    pub fn symbol_in_out(&self, symbol: &str) -> Result<(u16, u16)> {
        let mut parts = symbol.split('/');
        let (Some(base), Some(quote), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(EngineError::NoSuchSymbol(symbol.to_string()));
        };
        let base_id = self
            .token_id(base)
            .ok_or_else(|| EngineError::NoSuchSymbol(symbol.to_string()))?;
        let quote_id = self
            .token_id(quote)
            .ok_or_else(|| EngineError::NoSuchSymbol(symbol.to_string()))?;
        Ok((quote_id, base_id))
    }
}
