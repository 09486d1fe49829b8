//! Multi-chain DEX arbitrage detection engine
//!
//! Ingests pool state updates from EVM chains, maintains a price graph over
//! Uniswap V2/V3-family liquidity venues, and detects profitable cyclic
//! arbitrage between path pairs sharing the same endpoint tokens.
//!
//! Dataflow: event source → demultiplexer → price store → price graph →
//! detector → submitter/sinks.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

pub mod arbitrage;
pub mod config;
pub mod contracts;
pub mod error;
pub mod external;
pub mod graph;
pub mod pipeline;
pub mod pool;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use config::{load_config, EngineConfig};
pub use error::{EngineError, Result};
pub use graph::PriceGraph;
pub use pool::{PoolRegistry, PriceStore};
pub use types::{GasInfo, PendingOpportunity, PoolRef, PoolVersion, SwapPath};
