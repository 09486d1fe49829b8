//! Price Graph
//!
//! Per-symbol table of enumerated swap paths plus parallel price/fee arrays.
//! Paths, pool ordinals, tags and the token set are fixed at startup; price
//! and fee are recomputed incrementally whenever a pool on the relevant
//! chain updates.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

pub mod builder;

pub use builder::PathBuilder;

use crate::error::{EngineError, Result};
use crate::pool::{PoolRegistry, PriceStore};
use crate::types::{SwapPath, SymbolSnapshot};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Everything the engine holds for one trading symbol.
#[derive(Debug)]
pub struct SymbolPaths {
    /// Enumerated paths, zero-padded, concatenated across chains.
    pub paths: Arc<Vec<SwapPath>>,
    /// Per-path pool ordinals of the real hops (for order construction).
    pub pool_ordinals: Arc<Vec<Vec<usize>>>,
    /// Per-path display tags: "<chain>-<i>" with a per-chain counter.
    pub tags: Arc<Vec<String>>,
    /// Dense ids of every token appearing anywhere in `paths`.
    pub tokens: HashSet<u16>,
    /// Cumulative quoted price per path (BASE per QUOTE). 0.0 = unpriceable.
    pub price: Vec<f64>,
    /// Cumulative effective fee per path: 1 - Π(1 - fee_i).
    pub fee: Vec<f64>,
}

pub struct PriceGraph {
    store: PriceStore,
    symbols: DashMap<String, SymbolPaths>,
    symbol_order: Vec<String>,
}

impl PriceGraph {
    /// Enumerates paths for every trading symbol. Prices start at zero until
    /// the first `update_price` pass.
    pub fn new(
        registry: &PoolRegistry,
        store: PriceStore,
        trading_symbols: &[String],
        max_swaps: usize,
    ) -> Result<Self> {
        let builder = PathBuilder::new(registry, max_swaps);
        let symbols = DashMap::new();

        for symbol in trading_symbols {
            let paths = builder.build(symbol)?;

            let pool_ordinals: Vec<Vec<usize>> = paths
                .iter()
                .map(|path| {
                    path.real_hops()
                        .map(|hop| {
                            registry
                                .ordinal_of(hop)
                                .ok_or(EngineError::NoSuchPool(*hop))
                        })
                        .collect::<Result<Vec<usize>>>()
                })
                .collect::<Result<Vec<_>>>()?;

            let mut chain_counter: HashMap<u16, usize> = HashMap::new();
            let tags: Vec<String> = paths
                .iter()
                .map(|path| {
                    let chain_id = path.first_hop().map(|h| h.chain).unwrap_or(0);
                    let counter = chain_counter.entry(chain_id).or_insert(0);
                    let chain = registry.chain_name(chain_id).unwrap_or("unknown");
                    let tag = format!("{chain}-{counter}");
                    *counter += 1;
                    tag
                })
                .collect();

            let tokens: HashSet<u16> = paths
                .iter()
                .flat_map(|path| path.real_hops())
                .flat_map(|hop| [hop.token_in, hop.token_out])
                .collect();

            let count = paths.len();
            debug!("{symbol}: {count} swap paths enumerated");

            symbols.insert(
                symbol.clone(),
                SymbolPaths {
                    paths: Arc::new(paths),
                    pool_ordinals: Arc::new(pool_ordinals),
                    tags: Arc::new(tags),
                    tokens,
                    price: vec![0.0; count],
                    fee: vec![0.0; count],
                },
            );
        }

        Ok(PriceGraph {
            store,
            symbols,
            symbol_order: trading_symbols.to_vec(),
        })
    }

    /// Recomputes price and fee for every path of `symbol` whose first hop is
    /// on `chain_id`. Paths on other chains are untouched.
    ///
    /// Per hop the reciprocal of the directional quote is accumulated so the
    /// composite price reads in exchange convention: buying BASE with QUOTE
    /// quotes QUOTE-per-BASE, i.e. 1 / (BASE received per QUOTE spent).
    pub fn update_price(&self, chain_id: u16, symbol: &str) -> Result<()> {
        let mut entry = self
            .symbols
            .get_mut(symbol)
            .ok_or_else(|| EngineError::NoSuchSymbol(symbol.to_string()))?;
        let entry = entry.value_mut();

        let paths = Arc::clone(&entry.paths);
        for (i, path) in paths.iter().enumerate() {
            match path.first_hop() {
                Some(first) if first.chain == chain_id => {}
                _ => continue,
            }

            let mut price = 1.0f64;
            let mut fee_mul = 1.0f64;
            let mut priceable = true;

            for hop in path.real_hops() {
                match self.store.get_price(hop) {
                    Ok((hop_price, hop_fee)) if hop_price > 0.0 => {
                        price *= 1.0 / hop_price;
                        fee_mul *= 1.0 - hop_fee;
                    }
                    // Unloaded or zero-state pool: the whole path is
                    // unpriceable until its state arrives.
                    _ => {
                        priceable = false;
                        break;
                    }
                }
            }

            if priceable {
                entry.price[i] = price;
                entry.fee[i] = 1.0 - fee_mul;
            } else {
                entry.price[i] = 0.0;
                entry.fee[i] = 0.0;
            }
        }

        Ok(())
    }

    /// Trading symbols whose token set intersects {token0, token1}. Drives
    /// selective recomputation after a pool update.
    pub fn symbols_affected(&self, token0: u16, token1: u16) -> Vec<String> {
        self.symbol_order
            .iter()
            .filter(|symbol| {
                self.symbols
                    .get(symbol.as_str())
                    .map(|sp| sp.tokens.contains(&token0) || sp.tokens.contains(&token1))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Consistent copy of the current per-path arrays for publication.
    pub fn snapshot(&self, symbol: &str, chain: &str, block: u64) -> Result<SymbolSnapshot> {
        let entry = self
            .symbols
            .get(symbol)
            .ok_or_else(|| EngineError::NoSuchSymbol(symbol.to_string()))?;

        Ok(SymbolSnapshot {
            symbol: symbol.to_string(),
            chain: chain.to_string(),
            block,
            paths: Arc::clone(&entry.paths),
            pool_ordinals: Arc::clone(&entry.pool_ordinals),
            tags: Arc::clone(&entry.tags),
            price: entry.price.clone(),
            fee: entry.fee.clone(),
        })
    }

    /// Read access to one symbol's static tables (edge precompute).
    pub fn with_symbol<R>(&self, symbol: &str, f: impl FnOnce(&SymbolPaths) -> R) -> Result<R> {
        let entry = self
            .symbols
            .get(symbol)
            .ok_or_else(|| EngineError::NoSuchSymbol(symbol.to_string()))?;
        Ok(f(entry.value()))
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbol_order
    }
}
