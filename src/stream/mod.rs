//! Event Demultiplexer
//!
//! Per chain, three long-lived subscription loops (V2 Sync logs, V3 Swap
//! logs, new heads) translate raw chain events into store mutations, price
//! recomputation, and normalized queue messages for the detector.
//!
//! Each loop runs under a reconnecting supervisor: transport closures and
//! read timeouts trigger a resubscribe after a fixed 2 s backoff; anything
//! else is fatal and aborts the task. Events of one chain are processed in
//! arrival order; no cross-chain ordering is implied.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

pub mod gas;
pub mod source;

pub use source::{EventSource, NewBlock, PoolUpdateV2, PoolUpdateV3, WsEventSource};

use crate::error::{EngineError, Result};
use crate::graph::PriceGraph;
use crate::pool::{PoolRegistry, PriceStore};
use crate::types::{EngineMessage, PoolVersion};
use gas::{gas_info_for_block, GasHistory, GasOracle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Fixed backoff between resubscription attempts.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// A subscription that stays silent this long is assumed dead.
const READ_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    SyncV2,
    SwapV3,
    Blocks,
}

impl StreamKind {
    fn tag(&self) -> &'static str {
        match self {
            StreamKind::SyncV2 => "V2",
            StreamKind::SwapV3 => "V3",
            StreamKind::Blocks => "BLOCKS",
        }
    }
}

/// Ingestion side of the pipeline. Shared by reference across all
/// subscription tasks; the price store serializes concurrent cell writes.
pub struct DexStream {
    registry: Arc<PoolRegistry>,
    store: PriceStore,
    graph: Arc<PriceGraph>,
    source: Arc<dyn EventSource>,
    oracle: Arc<GasOracle>,
    /// chain name → numeric chain id for the gas oracle.
    chain_ids: HashMap<String, u64>,
    publisher: mpsc::Sender<EngineMessage>,
}

impl DexStream {
    pub fn new(
        registry: Arc<PoolRegistry>,
        store: PriceStore,
        graph: Arc<PriceGraph>,
        source: Arc<dyn EventSource>,
        oracle: Arc<GasOracle>,
        chain_ids: HashMap<String, u64>,
        publisher: mpsc::Sender<EngineMessage>,
    ) -> Self {
        DexStream {
            registry,
            store,
            graph,
            source,
            oracle,
            chain_ids,
            publisher,
        }
    }

    /// Spawns the three supervised loops for every chain into one task set.
    pub fn spawn(self: &Arc<Self>, chains: &[String]) -> JoinSet<Result<()>> {
        let mut tasks = JoinSet::new();
        for chain in chains {
            for kind in [StreamKind::SyncV2, StreamKind::SwapV3, StreamKind::Blocks] {
                let this = Arc::clone(self);
                let chain = chain.clone();
                tasks.spawn(async move { this.supervise(kind, &chain).await });
            }
        }
        tasks
    }

    /// Reconnecting supervisor. Branches on explicit error variants rather
    /// than unwinding: clean stream end and transport closures reconnect,
    /// anything else aborts the task.
    async fn supervise(&self, kind: StreamKind, chain: &str) -> Result<()> {
        let tag = format!("{}_{}", chain.to_uppercase(), kind.tag());
        loop {
            let outcome = match kind {
                StreamKind::SyncV2 => self.run_sync_loop(chain).await,
                StreamKind::SwapV3 => self.run_swap_loop(chain).await,
                StreamKind::Blocks => self.run_block_loop(chain).await,
            };

            match outcome {
                Ok(()) => info!("{tag} stream closed, reconnecting"),
                Err(e) if e.is_transport() => warn!("{tag} {e}, reconnecting"),
                Err(e) => {
                    error!("{tag} fatal stream error: {e}");
                    return Err(e);
                }
            }

            tokio::time::sleep(RECONNECT_BACKOFF).await;
        }
    }

    /// One websocket session of Sync events. Ok(()) on clean close.
    async fn run_sync_loop(&self, chain: &str) -> Result<()> {
        let stream = self.source.sync_events(chain).await?;
        let stream = stream.timeout(READ_TIMEOUT);
        tokio::pin!(stream);

        while let Some(item) = stream.next().await {
            match item {
                Ok(Ok(update)) => self.handle_v2(chain, update).await?,
                Ok(Err(e)) if e.is_transport() => return Err(e),
                Ok(Err(e)) => warn!("skipping bad sync event on {chain}: {e}"),
                Err(_) => {
                    return Err(EngineError::TransportClosed(format!(
                        "sync read timeout on {chain}"
                    )))
                }
            }
        }
        Ok(())
    }

    /// One websocket session of V3 Swap events.
    async fn run_swap_loop(&self, chain: &str) -> Result<()> {
        let stream = self.source.swap_events(chain).await?;
        let stream = stream.timeout(READ_TIMEOUT);
        tokio::pin!(stream);

        while let Some(item) = stream.next().await {
            match item {
                Ok(Ok(update)) => self.handle_v3(chain, update).await?,
                Ok(Err(e)) if e.is_transport() => return Err(e),
                Ok(Err(e)) => warn!("skipping bad swap event on {chain}: {e}"),
                Err(_) => {
                    return Err(EngineError::TransportClosed(format!(
                        "swap read timeout on {chain}"
                    )))
                }
            }
        }
        Ok(())
    }

    /// One websocket session of new heads: base fee projection, oracle
    /// estimates, gas history, and one Block message per head.
    async fn run_block_loop(&self, chain: &str) -> Result<()> {
        let stream = self.source.new_blocks(chain).await?;
        let stream = stream.timeout(READ_TIMEOUT);
        tokio::pin!(stream);

        let numeric_id = self.chain_ids.get(chain).copied();
        let mut history = GasHistory::new();

        while let Some(item) = stream.next().await {
            match item {
                Ok(Ok(block)) => {
                    let info = gas_info_for_block(&self.oracle, numeric_id, &block).await;
                    debug!(
                        "[{chain}] block {} next base fee {:.2} gwei",
                        info.block,
                        info.base_fee as f64 / 1e9
                    );
                    history.push(info.clone());
                    self.publish(EngineMessage::Block(info)).await?;
                }
                Ok(Err(e)) if e.is_transport() => return Err(e),
                Ok(Err(e)) => warn!("skipping bad head on {chain}: {e}"),
                Err(_) => {
                    return Err(EngineError::TransportClosed(format!(
                        "head read timeout on {chain}"
                    )))
                }
            }
        }
        Ok(())
    }

    async fn handle_v2(&self, chain: &str, update: PoolUpdateV2) -> Result<()> {
        let Some(desc) = self.registry.pool_at(chain, update.pool_address) else {
            // Log subscriptions are topic-filtered, not address-filtered;
            // most events belong to pools outside the registry.
            return Ok(());
        };
        if desc.version != PoolVersion::V2 {
            return Ok(());
        }
        let desc = desc.clone();

        self.store.update_reserves(
            desc.chain_id,
            desc.exchange_id,
            desc.token0_id,
            desc.token1_id,
            update.reserve0,
            update.reserve1,
        )?;

        debug!(
            "[{chain}] {} V2 {} reserves ({}, {})",
            desc.exchange, desc.name, update.reserve0, update.reserve1
        );

        self.refresh_symbols(chain, desc.chain_id, desc.token0_id, desc.token1_id, update.block_number)
            .await
    }

    async fn handle_v3(&self, chain: &str, update: PoolUpdateV3) -> Result<()> {
        let Some(desc) = self.registry.pool_at(chain, update.pool_address) else {
            return Ok(());
        };
        if desc.version != PoolVersion::V3 {
            return Ok(());
        }
        let desc = desc.clone();

        self.store.update_sqrt_price(
            desc.chain_id,
            desc.exchange_id,
            desc.token0_id,
            desc.token1_id,
            update.sqrt_price_x96,
        )?;

        debug!(
            "[{chain}] {} V3 {} sqrtPriceX96 {}",
            desc.exchange, desc.name, update.sqrt_price_x96
        );

        self.refresh_symbols(chain, desc.chain_id, desc.token0_id, desc.token1_id, update.block_number)
            .await
    }

    /// Recomputes and publishes every symbol whose token set touches the
    /// updated pool.
    async fn refresh_symbols(
        &self,
        chain: &str,
        chain_id: u16,
        token0: u16,
        token1: u16,
        block: u64,
    ) -> Result<()> {
        for symbol in self.graph.symbols_affected(token0, token1) {
            self.graph.update_price(chain_id, &symbol)?;
            let snapshot = self.graph.snapshot(&symbol, chain, block)?;
            self.publish(EngineMessage::Event(snapshot)).await?;
        }
        Ok(())
    }

    async fn publish(&self, message: EngineMessage) -> Result<()> {
        self.publisher
            .send(message)
            .await
            .map_err(|_| EngineError::ChannelClosed("detector queue".to_string()))
    }
}
