//! Price Store
//!
//! Concurrent per-pool state keyed by the directional 5-tuple, two cells per
//! pool. Reads and writes are O(1) through DashMap, and mutation from
//! concurrent ingestion tasks is serialized per cell.
//!
//! Cell fields other than reserves / sqrt price are write-once at load time.
//! A registered cell stays unusable (`loaded = false`) until the bulk loader
//! or a live event populates its state; `get_price` treats unusable cells the
//! same as unknown keys.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::error::{EngineError, Result};
use crate::pool::math;
use crate::types::{PoolDescriptor, PoolRef, PoolVersion};
use alloy::primitives::U256;
use dashmap::DashMap;
use std::sync::Arc;

/// Fixed-width state record for one directional cell.
#[derive(Debug, Clone, Default)]
pub struct PoolCell {
    pub decimals0: u8,
    pub decimals1: u8,
    pub reserve0: U256,
    pub reserve1: U256,
    pub sqrt_price_x96: U256,
    /// Unit fraction, e.g. 0.0005 for a raw fee of 500.
    pub fee_rate: f64,
    pub token0_is_input: bool,
    pub pool_ordinal: usize,
    pub version: PoolVersion,
    /// False until the first state write. Unusable cells fail price reads.
    pub loaded: bool,
}

/// Cloning shares the underlying map; ingestion tasks and the price graph
/// all hold cheap handles to the same cells.
#[derive(Debug, Default)]
pub struct PriceStore {
    cells: Arc<DashMap<PoolRef, PoolCell>>,
}

impl Clone for PriceStore {
    fn clone(&self) -> Self {
        Self {
            cells: Arc::clone(&self.cells),
        }
    }
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers both directional cells of a pool with zeroed state.
    pub fn register(&self, desc: &PoolDescriptor) {
        let forward = PoolRef {
            chain: desc.chain_id,
            exchange: desc.exchange_id,
            token_in: desc.token0_id,
            token_out: desc.token1_id,
            version: desc.version,
        };

        let cell = PoolCell {
            decimals0: desc.token0_decimals,
            decimals1: desc.token1_decimals,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            sqrt_price_x96: U256::ZERO,
            fee_rate: desc.fee_rate(),
            token0_is_input: true,
            pool_ordinal: desc.ordinal,
            version: desc.version,
            loaded: false,
        };

        let mut reverse_cell = cell.clone();
        reverse_cell.token0_is_input = false;

        self.cells.insert(forward, cell);
        self.cells.insert(forward.reversed(), reverse_cell);
    }

    /// Directional refs of a pool from its descriptor, (token0→token1, token1→token0).
    fn directional_pair(
        chain: u16,
        exchange: u16,
        token0: u16,
        token1: u16,
        version: PoolVersion,
    ) -> (PoolRef, PoolRef) {
        let forward = PoolRef {
            chain,
            exchange,
            token_in: token0,
            token_out: token1,
            version,
        };
        (forward, forward.reversed())
    }

    fn write_both<F>(&self, forward: PoolRef, mut apply: F) -> Result<()>
    where
        F: FnMut(&mut PoolCell),
    {
        for key in [forward, forward.reversed()] {
            let mut cell = self
                .cells
                .get_mut(&key)
                .ok_or(EngineError::NoSuchPool(key))?;
            apply(&mut cell);
            cell.loaded = true;
        }
        Ok(())
    }

    /// V2 mutator: writes reserves into both directional cells.
    pub fn update_reserves(
        &self,
        chain: u16,
        exchange: u16,
        token0: u16,
        token1: u16,
        reserve0: U256,
        reserve1: U256,
    ) -> Result<()> {
        let (forward, _) =
            Self::directional_pair(chain, exchange, token0, token1, PoolVersion::V2);
        self.write_both(forward, |cell| {
            cell.reserve0 = reserve0;
            cell.reserve1 = reserve1;
        })
    }

    /// V3 mutator: writes the post-swap sqrt price into both directional cells.
    pub fn update_sqrt_price(
        &self,
        chain: u16,
        exchange: u16,
        token0: u16,
        token1: u16,
        sqrt_price_x96: U256,
    ) -> Result<()> {
        let (forward, _) =
            Self::directional_pair(chain, exchange, token0, token1, PoolVersion::V3);
        self.write_both(forward, |cell| {
            cell.sqrt_price_x96 = sqrt_price_x96;
        })
    }

    /// Directional mid-price and fee rate for one cell.
    ///
    /// No fee is applied to the price here; callers accumulate fees
    /// separately. Fails with `NoSuchPool` when the key was never registered
    /// or its state was never populated.
    pub fn get_price(&self, key: &PoolRef) -> Result<(f64, f64)> {
        let cell = self.cells.get(key).ok_or(EngineError::NoSuchPool(*key))?;
        if !cell.loaded {
            return Err(EngineError::NoSuchPool(*key));
        }

        let price = match cell.version {
            PoolVersion::V2 => math::reserves_to_price(
                cell.reserve0,
                cell.reserve1,
                cell.decimals0,
                cell.decimals1,
                cell.token0_is_input,
            ),
            PoolVersion::V3 => math::sqrtx96_to_price(
                cell.sqrt_price_x96,
                cell.decimals0,
                cell.decimals1,
                cell.token0_is_input,
            ),
        };

        Ok((price, cell.fee_rate))
    }

    /// Snapshot of one cell (diagnostics and tests).
    pub fn cell(&self, key: &PoolRef) -> Option<PoolCell> {
        self.cells.get(key).map(|c| c.clone())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
