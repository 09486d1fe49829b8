//! Pipeline Coordinator
//!
//! Single-producer-group / single-consumer dataflow: the ingestion task set
//! (event demultiplexer) publishes Setup/Block/Event messages onto one
//! bounded queue; the detector consumes them serially, so all pending-state
//! mutation happens on one task. Sink fan-out happens after each message is
//! handled.
//!
//! Failure policy: ingestion supervisors absorb transport faults internally;
//! an ingestion task returning an error, or any detector error, unwinds the
//! whole pipeline.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::arbitrage::{build_compare_paths, ArbDetector};
use crate::error::{EngineError, Result};
use crate::graph::PriceGraph;
use crate::pool::PoolRegistry;
use crate::stream::gas::GasOracle;
use crate::stream::{DexStream, EventSource};
use crate::types::{EngineMessage, SinkMessage};
use crate::PriceStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Bounded depth of the ingestion → detector queue.
const QUEUE_CAPACITY: usize = 512;

/// Downstream consumer of engine messages (telemetry, chat, ...).
/// Sink failures are logged and never stall the detector.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, message: &SinkMessage) -> Result<()>;
}

/// Default sink: structured log lines.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &SinkMessage) -> Result<()> {
        match message {
            SinkMessage::Setup {
                chain,
                compare_paths,
            } => {
                let edges: usize = compare_paths.values().map(|e| e.len()).sum();
                info!("[{chain}] setup: {edges} cyclic edges across {} symbols", compare_paths.len());
            }
            SinkMessage::Block(gas) => {
                debug!(
                    "[{}] block {}: base {:.2} gwei, max {:.2} gwei",
                    gas.chain,
                    gas.block,
                    gas.base_fee as f64 / 1e9,
                    gas.max_fee_per_gas as f64 / 1e9
                );
            }
            SinkMessage::Event(snap) => {
                debug!(
                    "[{}] {} updated at block {} ({} paths)",
                    snap.chain,
                    snap.symbol,
                    snap.block,
                    snap.price.len()
                );
            }
            SinkMessage::Spreads { symbol, block, spreads } => {
                debug!("[{symbol}] block {block}: {} directed spreads", spreads.len());
            }
            SinkMessage::Note(note) => info!("{note}"),
        }
        Ok(())
    }
}

pub struct Pipeline {
    registry: Arc<PoolRegistry>,
    store: PriceStore,
    graph: Arc<PriceGraph>,
    detector: ArbDetector,
    source: Arc<dyn EventSource>,
    oracle: Arc<GasOracle>,
    chain_ids: HashMap<String, u64>,
    chains: Vec<String>,
    sinks: Vec<Arc<dyn Sink>>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<PoolRegistry>,
        store: PriceStore,
        graph: Arc<PriceGraph>,
        detector: ArbDetector,
        source: Arc<dyn EventSource>,
        oracle: Arc<GasOracle>,
        chain_ids: HashMap<String, u64>,
        chains: Vec<String>,
    ) -> Self {
        Pipeline {
            registry,
            store,
            graph,
            detector,
            source,
            oracle,
            chain_ids,
            chains,
            sinks: vec![Arc::new(LogSink)],
        }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.push(sink);
    }

    /// Runs until a fatal error or until every ingestion task is gone.
    pub async fn run(mut self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<EngineMessage>(QUEUE_CAPACITY);

        // Edge tables are enqueued ahead of stream startup so the detector
        // has installed them before the first pool update arrives.
        for chain in &self.chains {
            let compare_paths = build_compare_paths(&self.registry, &self.graph, chain)?;
            tx.send(EngineMessage::Setup {
                chain: chain.clone(),
                compare_paths,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed("detector queue".to_string()))?;
        }

        let stream = Arc::new(DexStream::new(
            Arc::clone(&self.registry),
            self.store.clone(),
            Arc::clone(&self.graph),
            Arc::clone(&self.source),
            Arc::clone(&self.oracle),
            self.chain_ids.clone(),
            tx,
        ));
        let mut ingestion = stream.spawn(&self.chains);
        info!(
            "pipeline running: {} chains, {} ingestion tasks",
            self.chains.len(),
            3 * self.chains.len()
        );

        loop {
            tokio::select! {
                maybe_message = rx.recv() => {
                    let Some(message) = maybe_message else {
                        // Every producer dropped; drain is over.
                        break;
                    };
                    let outbound = self.dispatch(message).await?;
                    for sink_message in &outbound {
                        self.publish(sink_message).await;
                    }
                }
                Some(joined) = ingestion.join_next() => {
                    match joined {
                        Ok(Ok(())) => debug!("ingestion task finished"),
                        Ok(Err(e)) => {
                            error!("ingestion task failed fatally: {e}");
                            return Err(e);
                        }
                        Err(e) => {
                            return Err(EngineError::ChannelClosed(format!(
                                "ingestion task aborted: {e}"
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Routes one queue message through the detector. Detector errors are
    /// fatal by policy; everything recoverable was already absorbed upstream.
    async fn dispatch(&mut self, message: EngineMessage) -> Result<Vec<SinkMessage>> {
        match message {
            EngineMessage::Setup {
                chain,
                compare_paths,
            } => {
                self.detector.install_edges(compare_paths.clone());
                Ok(vec![SinkMessage::Setup {
                    chain,
                    compare_paths,
                }])
            }
            EngineMessage::Block(gas) => self.detector.on_block(gas).await,
            EngineMessage::Event(snapshot) => {
                let mut outbound = vec![SinkMessage::Event(snapshot.clone())];
                outbound.extend(self.detector.on_event(&snapshot).await?);
                Ok(outbound)
            }
        }
    }

    async fn publish(&self, message: &SinkMessage) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(message).await {
                warn!("sink {} failed: {e}", sink.name());
            }
        }
    }
}
