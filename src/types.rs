// Core data structures shared across the engine.
// Identifier conventions: chains, exchanges and tokens are mapped to dense
// integer IDs at startup (lexicographic enumeration, see pool::registry).

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Uniswap family version of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PoolVersion {
    #[default]
    V2 = 0,
    V3 = 1,
}

impl PoolVersion {
    /// Maps the on-disk config value (2 or 3) to the version enum.
    pub fn from_config(version: u8) -> Option<Self> {
        match version {
            2 => Some(PoolVersion::V2),
            3 => Some(PoolVersion::V3),
            _ => None,
        }
    }

    /// The digit used in display names and simulator handler keys ("uniswap_v3").
    pub fn as_digit(&self) -> u8 {
        match self {
            PoolVersion::V2 => 2,
            PoolVersion::V3 => 3,
        }
    }

    /// Protocol family id used by the swap simulator contract.
    /// V2 variants simulate through the Factory, V3 variants through QuoterV2.
    pub fn protocol_id(&self) -> u8 {
        match self {
            PoolVersion::V2 => 0,
            PoolVersion::V3 => 1,
        }
    }
}

impl fmt::Display for PoolVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "V{}", self.as_digit())
    }
}

/// Directional reference to one pool: the composite key of the price store.
///
/// Every pool contributes two refs (token0→token1 and token1→token0). A real
/// pool never has `token_in == token_out`, so the all-zero value doubles as
/// the sentinel for unused path slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolRef {
    pub chain: u16,
    pub exchange: u16,
    pub token_in: u16,
    pub token_out: u16,
    pub version: PoolVersion,
}

impl PoolRef {
    pub const SENTINEL: PoolRef = PoolRef {
        chain: 0,
        exchange: 0,
        token_in: 0,
        token_out: 0,
        version: PoolVersion::V2,
    };

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    /// The same pool traversed in the opposite direction.
    pub fn reversed(&self) -> PoolRef {
        PoolRef {
            chain: self.chain,
            exchange: self.exchange,
            token_in: self.token_out,
            token_out: self.token_in,
            version: self.version,
        }
    }
}

impl fmt::Display for PoolRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.chain, self.exchange, self.token_in, self.token_out, self.version
        )
    }
}

/// An ordered sequence of at most `max_swaps` directional pool traversals.
/// Unused trailing slots hold the sentinel ref, so every path in a symbol
/// table has the same width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPath {
    pub hops: Vec<PoolRef>,
}

impl SwapPath {
    /// Builds a path from its real hops, zero-padded to `max_swaps` slots.
    pub fn padded(mut hops: Vec<PoolRef>, max_swaps: usize) -> Self {
        hops.resize(max_swaps, PoolRef::SENTINEL);
        SwapPath { hops }
    }

    /// The non-sentinel prefix of the path.
    pub fn real_hops(&self) -> impl Iterator<Item = &PoolRef> {
        self.hops.iter().take_while(|h| !h.is_sentinel())
    }

    pub fn hop_count(&self) -> usize {
        self.real_hops().count()
    }

    pub fn first_hop(&self) -> Option<&PoolRef> {
        self.hops.first().filter(|h| !h.is_sentinel())
    }
}

/// Immutable pool descriptor as registered at startup.
#[derive(Debug, Clone)]
pub struct PoolDescriptor {
    /// Index of this pool in the registry (registration order).
    pub ordinal: usize,
    pub chain: String,
    pub exchange: String,
    pub version: PoolVersion,
    /// Pair name as configured, e.g. "ETH/USDT".
    pub name: String,
    pub address: Address,
    /// Fee in hundredths of a basis point (500 = 0.05%).
    pub fee: u32,
    pub token0: String,
    pub token1: String,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    // Dense IDs assigned by the registry.
    pub chain_id: u16,
    pub exchange_id: u16,
    pub token0_id: u16,
    pub token1_id: u16,
}

impl PoolDescriptor {
    /// Fee as a unit fraction (500 → 0.0005).
    pub fn fee_rate(&self) -> f64 {
        self.fee as f64 / 1_000_000.0
    }

    /// Short display code used in cycle names, e.g. "UNI3ETHUSDT".
    pub fn short_code(&self) -> String {
        let exchange: String = self.exchange.chars().take(3).collect();
        format!(
            "{}{}{}",
            exchange.to_uppercase(),
            self.version.as_digit(),
            self.name.replace('/', "")
        )
    }
}

/// Gas context from the most recent block of one chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GasInfo {
    pub chain: String,
    pub block: u64,
    /// Next-block base fee per EIP-1559, in wei.
    pub base_fee: u128,
    /// Oracle estimates, in wei. Zero when the oracle is unavailable.
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
}

/// Per-trade gas unit estimates used when sizing a pending opportunity.
/// Overestimated on purpose so the funding check stays conservative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GasCosts {
    pub base: u64,
    pub v2_hop: u64,
    pub v3_hop: u64,
}

impl Default for GasCosts {
    fn default() -> Self {
        GasCosts {
            base: 100_000,
            v2_hop: 40_000,
            v3_hop: 50_000,
        }
    }
}

impl GasCosts {
    pub fn hop_cost(&self, version: PoolVersion) -> u64 {
        match version {
            PoolVersion::V2 => self.v2_hop,
            PoolVersion::V3 => self.v3_hop,
        }
    }
}

/// Lifecycle state of the single in-flight opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Detected,
    OrderProcessing,
}

/// At most one of these is live at any time (owned by the detector).
#[derive(Debug, Clone)]
pub struct PendingOpportunity {
    /// Directed edge name, e.g. "UNI3ETHUSDT/UNI2ETHUSDT" (sell leg first).
    pub edge_key: String,
    pub symbol: String,
    pub chain: String,
    /// Block at which the edge was detected. Finalization waits for the gas
    /// context of this exact block.
    pub block_seen: u64,
    pub buy_price: f64,
    pub sell_price: f64,
    pub buy_path: SwapPath,
    pub sell_path: SwapPath,
    pub buy_pools: Vec<usize>,
    pub sell_pools: Vec<usize>,
    pub estimated_gas_units: u64,
    pub status: PendingStatus,
}

/// One leg of a quote-oracle or order call.
/// protocol 0 = V2 family (Factory handler), 1 = V3 family (QuoterV2 handler).
/// Only the first leg of a params list carries a non-zero amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapStep {
    pub protocol: u8,
    pub handler: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub fee: u32,
    pub amount: U256,
}

/// Full order request handed to an `OrderSubmitter`.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub chain: String,
    pub params: Vec<SwapStep>,
    pub min_amount_out: U256,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub retry: u32,
    pub target_block: u64,
}

/// Per-symbol snapshot published to the detector after a pool update.
/// The static arrays (paths, pool ordinals, tags) are shared; price and fee
/// are copied at publish time so the detector reads a consistent view.
#[derive(Debug, Clone)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub chain: String,
    pub block: u64,
    pub paths: Arc<Vec<SwapPath>>,
    pub pool_ordinals: Arc<Vec<Vec<usize>>>,
    pub tags: Arc<Vec<String>>,
    pub price: Vec<f64>,
    pub fee: Vec<f64>,
}

/// Messages carried on the ingestion → detector queue.
#[derive(Debug, Clone)]
pub enum EngineMessage {
    /// Edge table for one chain, sent once after initialization.
    Setup {
        chain: String,
        /// symbol → directed-pair name → (path index i, path index j)
        compare_paths: HashMap<String, HashMap<String, (usize, usize)>>,
    },
    /// New-block gas context.
    Block(GasInfo),
    /// Pool-update snapshot for one symbol.
    Event(SymbolSnapshot),
}

/// Messages fanned out to downstream sinks (telemetry, chat).
#[derive(Debug, Clone)]
pub enum SinkMessage {
    /// Edge table announcement, once per chain after initialization.
    Setup {
        chain: String,
        compare_paths: HashMap<String, HashMap<String, (usize, usize)>>,
    },
    /// Gas context of each new block.
    Block(GasInfo),
    /// Per-symbol price snapshot after a pool update.
    Event(SymbolSnapshot),
    /// Directed spreads recomputed for one symbol.
    Spreads {
        symbol: String,
        block: u64,
        spreads: HashMap<String, f64>,
    },
    /// Human-readable detector outcome (pending created / settled / dropped).
    Note(String),
}
