//! Arbitrage Detector
//!
//! Precomputes the cyclic path-pair ("edge") table per symbol, recomputes
//! directed spreads on every pool-update snapshot, and owns the single
//! pending opportunity. Finalization is block-gated: a pending detected at
//! block N is simulated only once the gas context of block N arrives, and
//! expires when a later block shows up first.
//!
//! Buy/sell semantics: both legs of an edge quote BASE in QUOTE terms, so
//! the buy leg is always the path with the lower composite price.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::arbitrage::quoter::{make_params, QuoteOracle};
use crate::arbitrage::submitter::OrderSubmitter;
use crate::error::{EngineError, Result};
use crate::graph::PriceGraph;
use crate::pool::math::u256_to_f64;
use crate::pool::PoolRegistry;
use crate::types::{
    GasCosts, GasInfo, OrderRequest, PendingOpportunity, PendingStatus, SinkMessage,
    SymbolSnapshot,
};
use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Trading thresholds and execution knobs.
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Minimum net spread (percent) that opens a pending opportunity.
    pub target_spread: f64,
    /// Maximum order size in quote-token units (no flashloans: the bet must
    /// be covered by on-contract inventory).
    pub max_bet_size: f64,
    pub gas_costs: GasCosts,
    pub order_retry: u32,
    /// Simulate but never submit.
    pub debug: bool,
}

/// Display name for a path pair, e.g. "UNI3USDCUSDT-UNI3USDCETH/SUS3ETHUSDT".
/// Logging only; detection logic never parses it back.
pub fn cycle_name(registry: &PoolRegistry, pools_a: &[usize], pools_b: &[usize]) -> String {
    let leg = |pools: &[usize]| {
        pools
            .iter()
            .filter_map(|&ordinal| registry.descriptor(ordinal))
            .map(|desc| desc.short_code())
            .collect::<Vec<_>>()
            .join("-")
    };
    format!("{}/{}", leg(pools_a), leg(pools_b))
}

/// Edge table for one chain: every unordered pair of same-chain paths whose
/// first pools differ and whose last pools differ. Those two conditions make
/// the pair a cyclic arbitrage candidate (buy through one path, sell back
/// through the other without touching the same pool twice at the ends).
pub fn build_compare_paths(
    registry: &PoolRegistry,
    graph: &PriceGraph,
    chain: &str,
) -> Result<HashMap<String, HashMap<String, (usize, usize)>>> {
    let chain_id = registry
        .chain_id(chain)
        .ok_or_else(|| EngineError::Config(format!("unknown chain {chain}")))?;

    let mut result = HashMap::new();
    for symbol in graph.symbols() {
        let edges = graph.with_symbol(symbol, |sp| {
            let mut edges: HashMap<String, (usize, usize)> = HashMap::new();
            let on_chain = |index: usize| {
                sp.paths[index]
                    .first_hop()
                    .map(|h| h.chain == chain_id)
                    .unwrap_or(false)
            };

            for i in 0..sp.pool_ordinals.len() {
                if !on_chain(i) {
                    continue;
                }
                let pools_i = &sp.pool_ordinals[i];
                for j in (i + 1)..sp.pool_ordinals.len() {
                    if !on_chain(j) {
                        continue;
                    }
                    let pools_j = &sp.pool_ordinals[j];
                    let distinct_first = pools_i.first() != pools_j.first();
                    let distinct_last = pools_i.last() != pools_j.last();
                    if distinct_first && distinct_last {
                        edges.insert(cycle_name(registry, pools_i, pools_j), (i, j));
                    }
                }
            }
            edges
        })?;
        result.insert(symbol.clone(), edges);
    }
    Ok(result)
}

/// Best directed spread seen while scanning a snapshot.
#[derive(Debug, Clone)]
struct BestSpread {
    key: String,
    spread: f64,
    buy_index: usize,
    sell_index: usize,
    buy_price: f64,
    sell_price: f64,
}

pub struct ArbDetector {
    registry: Arc<PoolRegistry>,
    settings: DetectorSettings,
    oracle: Arc<dyn QuoteOracle>,
    submitter: Arc<dyn OrderSubmitter>,
    /// chain → "exchange_vN" → simulation handler address.
    sim_handlers: HashMap<String, HashMap<String, Address>>,
    /// symbol → directed pair name → (path index i, path index j).
    compare_paths: HashMap<String, HashMap<String, (usize, usize)>>,
    /// directed edge name → latest spread (percent, net of fees).
    spreads: HashMap<String, f64>,
    /// Latest gas context per chain.
    gas_info: HashMap<String, GasInfo>,
    pending: Option<PendingOpportunity>,
}

impl ArbDetector {
    pub fn new(
        registry: Arc<PoolRegistry>,
        settings: DetectorSettings,
        sim_handlers: HashMap<String, HashMap<String, Address>>,
        oracle: Arc<dyn QuoteOracle>,
        submitter: Arc<dyn OrderSubmitter>,
    ) -> Self {
        ArbDetector {
            registry,
            settings,
            oracle,
            submitter,
            sim_handlers,
            compare_paths: HashMap::new(),
            spreads: HashMap::new(),
            gas_info: HashMap::new(),
            pending: None,
        }
    }

    /// Installs the edge table of one chain (Setup message).
    pub fn install_edges(
        &mut self,
        compare_paths: HashMap<String, HashMap<String, (usize, usize)>>,
    ) {
        for (symbol, edges) in compare_paths {
            let count = edges.len();
            self.compare_paths.entry(symbol.clone()).or_default().extend(edges);
            debug!("{symbol}: {count} edges installed");
        }
    }

    pub fn pending(&self) -> Option<&PendingOpportunity> {
        self.pending.as_ref()
    }

    pub fn spreads(&self) -> &HashMap<String, f64> {
        &self.spreads
    }

    /// Pool-update snapshot: recompute directed spreads for every edge of
    /// the symbol, revalidate the live pending, possibly open a new one.
    pub async fn on_event(&mut self, snap: &SymbolSnapshot) -> Result<Vec<SinkMessage>> {
        let mut out = Vec::new();
        let Some(edges) = self.compare_paths.get(&snap.symbol) else {
            return Ok(out);
        };

        let mut best: Option<BestSpread> = None;
        let mut fresh: HashMap<String, f64> = HashMap::new();

        for (name, &(i, j)) in edges {
            let price_i = snap.price.get(i).copied().unwrap_or(0.0);
            let price_j = snap.price.get(j).copied().unwrap_or(0.0);
            // Unpriceable legs (pool state not yet loaded) produce no spread.
            if price_i <= 0.0 || price_j <= 0.0 {
                continue;
            }

            let total_fee = snap.fee.get(i).copied().unwrap_or(0.0)
                + snap.fee.get(j).copied().unwrap_or(0.0);
            let Some((name_i, name_j)) = name.split_once('/') else {
                continue;
            };

            // Directed keys read "<sell leg>/<buy leg>".
            let key_ij = name.clone();
            let key_ji = format!("{name_j}/{name_i}");
            let spread_ij = ((price_i / price_j - 1.0) - total_fee) * 100.0;
            let spread_ji = ((price_j / price_i - 1.0) - total_fee) * 100.0;

            if best.as_ref().map_or(true, |b| spread_ij > b.spread) {
                best = Some(BestSpread {
                    key: key_ij.clone(),
                    spread: spread_ij,
                    buy_index: j,
                    sell_index: i,
                    buy_price: price_j,
                    sell_price: price_i,
                });
            }
            if best.as_ref().map_or(true, |b| spread_ji > b.spread) {
                best = Some(BestSpread {
                    key: key_ji.clone(),
                    spread: spread_ji,
                    buy_index: i,
                    sell_index: j,
                    buy_price: price_i,
                    sell_price: price_j,
                });
            }

            fresh.insert(key_ij, spread_ij);
            fresh.insert(key_ji, spread_ji);
        }

        self.spreads.extend(fresh);

        out.push(SinkMessage::Spreads {
            symbol: snap.symbol.clone(),
            block: snap.block,
            spreads: self.spreads.clone(),
        });

        if let Some(best) = &best {
            debug!(
                "[{}] block {} best spread {}: {:.4}%",
                snap.symbol, snap.block, best.key, best.spread
            );
        }

        // Spread revaluation: a Detected pending whose edge no longer clears
        // the target dies here, before any new candidate is considered.
        if let Some(pending) = &self.pending {
            if pending.status == PendingStatus::Detected {
                let current = self.spreads.get(&pending.edge_key).copied();
                if current.map_or(true, |s| s <= self.settings.target_spread) {
                    info!("pending {} dropped: spread no longer clears target", pending.edge_key);
                    self.pending = None;
                }
            }
        }

        if self.pending.is_none() {
            if let Some(best) = best {
                if best.spread > self.settings.target_spread {
                    let pending = self.open_pending(snap, best);
                    out.push(SinkMessage::Note(format!(
                        "block #{} {} ({:.3}%): pending opportunity, est. {} gas",
                        pending.block_seen, pending.edge_key, self.spreads[&pending.edge_key],
                        pending.estimated_gas_units
                    )));
                    info!(
                        "🎯 pending {} at block {} — buy @{:.4}, sell @{:.4}",
                        pending.edge_key, pending.block_seen, pending.buy_price, pending.sell_price
                    );
                    self.pending = Some(pending);
                }
            }
        }

        out.extend(self.process_pending().await?);
        Ok(out)
    }

    /// New-block gas context: expire stale pendings, finalize the matching one.
    pub async fn on_block(&mut self, gas: GasInfo) -> Result<Vec<SinkMessage>> {
        let mut out = Vec::new();
        let chain = gas.chain.clone();
        self.gas_info.insert(chain.clone(), gas.clone());
        out.push(SinkMessage::Block(gas.clone()));

        // A Detected pending waits for the gas context of its own block; if
        // the chain moved past it, the opportunity is gone.
        if let Some(pending) = &self.pending {
            if pending.status == PendingStatus::Detected
                && pending.chain == chain
                && gas.block > pending.block_seen
            {
                info!(
                    "pending {} expired: block {} arrived before gas context of {}",
                    pending.edge_key, gas.block, pending.block_seen
                );
                out.push(SinkMessage::Note(format!(
                    "block #{} {}: expired unfilled",
                    pending.block_seen, pending.edge_key
                )));
                self.pending = None;
            }
        }

        out.extend(self.process_pending().await?);
        Ok(out)
    }

    fn open_pending(&self, snap: &SymbolSnapshot, best: BestSpread) -> PendingOpportunity {
        let buy_path = snap.paths[best.buy_index].clone();
        let sell_path = snap.paths[best.sell_index].clone();

        // base + per-hop units; sentinel slots contribute nothing
        let mut estimated_gas_units = self.settings.gas_costs.base;
        for path in [&buy_path, &sell_path] {
            for hop in path.real_hops() {
                estimated_gas_units += self.settings.gas_costs.hop_cost(hop.version);
            }
        }

        PendingOpportunity {
            edge_key: best.key,
            symbol: snap.symbol.clone(),
            chain: snap.chain.clone(),
            block_seen: snap.block,
            buy_price: best.buy_price,
            sell_price: best.sell_price,
            buy_path,
            sell_path,
            buy_pools: snap.pool_ordinals[best.buy_index].clone(),
            sell_pools: snap.pool_ordinals[best.sell_index].clone(),
            estimated_gas_units,
            status: PendingStatus::Detected,
        }
    }

    /// Block-gated finalization: funding check at worst-case gas, then an
    /// on-chain simulation with 10% input headroom, then submit-or-discard.
    /// The pending is always cleared after a terminal decision.
    async fn process_pending(&mut self) -> Result<Vec<SinkMessage>> {
        let mut out = Vec::new();

        let Some(pending) = self.pending.clone() else {
            return Ok(out);
        };
        if pending.status != PendingStatus::Detected {
            return Ok(out);
        }
        let Some(gas) = self.gas_info.get(&pending.chain).cloned() else {
            return Ok(out);
        };
        if gas.block != pending.block_seen {
            return Ok(out);
        }

        let spread = self.spreads.get(&pending.edge_key).copied().unwrap_or(0.0);
        if spread <= self.settings.target_spread {
            self.pending = None;
            return Ok(out);
        }

        // Gas priced at max_fee_per_gas and converted at the sell quote:
        // both overestimate, so the funding requirement is conservative.
        let gas_cost_native =
            pending.estimated_gas_units as f64 * gas.max_fee_per_gas as f64 * 1e-18;
        let gas_cost_quote = gas_cost_native * pending.sell_price;
        let quote_profit_per_unit = pending.buy_price * (spread / 100.0);
        if quote_profit_per_unit <= 0.0 {
            self.pending = None;
            return Ok(out);
        }
        let min_input_quote = (gas_cost_quote / quote_profit_per_unit) * pending.buy_price;

        if min_input_quote > self.settings.max_bet_size {
            out.push(SinkMessage::Note(format!(
                "block #{} {} ({:.2}%): needs {:.3} quote units to cover gas, over the {:.0} cap",
                pending.block_seen,
                pending.edge_key,
                spread,
                min_input_quote,
                self.settings.max_bet_size
            )));
            self.pending = None;
            return Ok(out);
        }

        match self.simulate_and_submit(&pending, &gas, spread, min_input_quote).await {
            Ok(messages) => out.extend(messages),
            Err(e) => {
                warn!("pending {} dropped: {e}", pending.edge_key);
                out.push(SinkMessage::Note(format!(
                    "block #{} {}: simulation failed ({e})",
                    pending.block_seen, pending.edge_key
                )));
            }
        }

        self.pending = None;
        Ok(out)
    }

    async fn simulate_and_submit(
        &mut self,
        pending: &PendingOpportunity,
        gas: &GasInfo,
        spread: f64,
        min_input_quote: f64,
    ) -> Result<Vec<SinkMessage>> {
        let mut out = Vec::new();

        let quote_token = pending
            .symbol
            .split('/')
            .nth(1)
            .ok_or_else(|| EngineError::Simulation(format!("malformed symbol {}", pending.symbol)))?;
        let decimals = self
            .registry
            .token_decimals(&pending.chain, quote_token)
            .ok_or_else(|| {
                EngineError::Simulation(format!("no decimals for {quote_token} on {}", pending.chain))
            })?;

        // 10% headroom over the break-even input, scaled to raw units.
        let amount_units = (min_input_quote * 1.1).ceil() as u128;
        let amount_in = U256::from(amount_units) * U256::from(10u64).pow(U256::from(decimals));

        let handlers = self
            .sim_handlers
            .get(&pending.chain)
            .ok_or_else(|| EngineError::Simulation(format!("no handlers for {}", pending.chain)))?;

        let params = make_params(
            &self.registry,
            &pending.chain,
            handlers,
            amount_in,
            &pending.buy_path,
            &pending.sell_path,
            &pending.buy_pools,
            &pending.sell_pools,
        )?;

        let amount_out = self.oracle.simulate(&pending.chain, params.clone()).await?;

        let gas_cost_quote = pending.estimated_gas_units as f64
            * gas.max_fee_per_gas as f64
            * 1e-18
            * pending.sell_price;
        let gross_quote =
            (u256_to_f64(amount_out) - u256_to_f64(amount_in)) / 10f64.powi(decimals as i32);
        let final_profit = gross_quote - gas_cost_quote;

        info!(
            "simulated {}: in {} out {} → net {:.4} quote units",
            pending.edge_key, amount_in, amount_out, final_profit
        );
        out.push(SinkMessage::Note(format!(
            "block #{} {} ({:.2}%): {:.4} quote units net",
            pending.block_seen, pending.edge_key, spread, final_profit
        )));

        if final_profit > 0.0 {
            if let Some(live) = self.pending.as_mut() {
                live.status = PendingStatus::OrderProcessing;
            }

            // 0.1% slippage tolerance on the simulated output
            let min_amount_out = amount_out * U256::from(999) / U256::from(1000);
            let order = OrderRequest {
                chain: pending.chain.clone(),
                params,
                min_amount_out,
                max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
                max_fee_per_gas: gas.max_fee_per_gas,
                retry: self.settings.order_retry,
                target_block: gas.block,
            };

            if self.settings.debug {
                info!("debug mode: order for {} not submitted", pending.edge_key);
            } else {
                match self.submitter.send_order(order).await {
                    Ok(receipts) if receipts.is_empty() => {
                        out.push(SinkMessage::Note(format!(
                            "{}: bundle dropped by relay",
                            pending.edge_key
                        )));
                    }
                    Ok(receipts) => {
                        out.push(SinkMessage::Note(format!(
                            "{}: executed, {} receipt(s)",
                            pending.edge_key,
                            receipts.len()
                        )));
                    }
                    Err(e) => {
                        warn!("order submission failed for {}: {e}", pending.edge_key);
                        out.push(SinkMessage::Note(format!(
                            "{}: submit failed ({e})",
                            pending.edge_key
                        )));
                    }
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PriceGraph;
    use crate::pool::registry::test_fixtures::s2_market;
    use crate::pool::PriceStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockOracle {
        /// Fixed simulated output, or None to revert.
        amount_out: Option<U256>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl QuoteOracle for MockOracle {
        async fn simulate(&self, _chain: &str, _params: Vec<crate::types::SwapStep>) -> Result<U256> {
            *self.calls.lock().unwrap() += 1;
            self.amount_out
                .ok_or_else(|| EngineError::Simulation("reverted".to_string()))
        }
    }

    #[derive(Default)]
    struct MockSubmitter {
        orders: Mutex<Vec<OrderRequest>>,
    }

    #[async_trait]
    impl OrderSubmitter for MockSubmitter {
        async fn send_order(&self, order: OrderRequest) -> Result<Vec<String>> {
            self.orders.lock().unwrap().push(order);
            Ok(vec!["0xreceipt".to_string()])
        }
    }

    struct Fixture {
        detector: ArbDetector,
        graph: Arc<PriceGraph>,
        oracle: Arc<MockOracle>,
        submitter: Arc<MockSubmitter>,
    }

    fn fixture(target_spread: f64, amount_out: Option<U256>) -> Fixture {
        let (tokens, pools) = s2_market();
        let registry = Arc::new(PoolRegistry::new(tokens, &pools).unwrap());
        let store = PriceStore::new();
        for desc in registry.descriptors() {
            store.register(desc);
        }
        let graph = Arc::new(
            PriceGraph::new(&registry, store, &["ETH/USDT".to_string()], 2).unwrap(),
        );

        let oracle = Arc::new(MockOracle {
            amount_out,
            calls: Mutex::new(0),
        });
        let submitter = Arc::new(MockSubmitter::default());

        let mut handlers = HashMap::new();
        let mut eth_handlers = HashMap::new();
        eth_handlers.insert("uniswap_v3".to_string(), Address::repeat_byte(0xd1));
        eth_handlers.insert("sushiswap_v3".to_string(), Address::repeat_byte(0xd2));
        handlers.insert("ethereum".to_string(), eth_handlers);

        let mut detector = ArbDetector::new(
            Arc::clone(&registry),
            DetectorSettings {
                target_spread,
                max_bet_size: 20_000.0,
                gas_costs: GasCosts::default(),
                order_retry: 2,
                debug: false,
            },
            handlers,
            Arc::clone(&oracle) as Arc<dyn QuoteOracle>,
            Arc::clone(&submitter) as Arc<dyn OrderSubmitter>,
        );
        detector.install_edges(build_compare_paths(&registry, &graph, "ethereum").unwrap());

        Fixture {
            detector,
            graph,
            oracle,
            submitter,
        }
    }

    /// Snapshot with hand-set prices: [uni 1-hop, sushi 1-hop, 2-hop].
    fn snapshot(fixture: &Fixture, block: u64, prices: [f64; 3], fees: [f64; 3]) -> SymbolSnapshot {
        let mut snap = fixture.graph.snapshot("ETH/USDT", "ethereum", block).unwrap();
        snap.price = prices.to_vec();
        snap.fee = fees.to_vec();
        snap
    }

    fn gas(block: u64, max_fee_gwei: u64) -> GasInfo {
        GasInfo {
            chain: "ethereum".to_string(),
            block,
            base_fee: 30_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            max_fee_per_gas: max_fee_gwei as u128 * 1_000_000_000,
        }
    }

    #[test]
    fn test_edge_discovery() {
        let fixture = fixture(0.15, None);
        let edges = &fixture.detector.compare_paths["ETH/USDT"];

        // Three paths, all pairwise distinct at both ends → 3 edges, which
        // is exactly the n(n-1)/2 ceiling.
        assert_eq!(edges.len(), 3);
        let pairs: Vec<(usize, usize)> = edges.values().copied().collect();
        assert!(pairs.contains(&(0, 1)));
        assert!(pairs.contains(&(0, 2)));
        assert!(pairs.contains(&(1, 2)));

        // Names are built from pool short codes
        assert!(edges.keys().any(|k| k.contains("UNI3ETHUSDT")));
        assert!(edges.keys().any(|k| k.contains("SUS3ETHUSDT")));
        assert!(edges.keys().any(|k| k.contains("UNI3USDCUSDT-UNI3USDCETH")));
    }

    #[test]
    fn test_edges_share_endpoint_excluded() {
        // Two paths ending in the same pool must not form an edge: selling
        // back through the pool just bought from is the U-turn this guards.
        let (tokens, pools) = s2_market();
        let registry = Arc::new(PoolRegistry::new(tokens, &pools).unwrap());
        let store = PriceStore::new();
        for desc in registry.descriptors() {
            store.register(desc);
        }
        // Single-hop graph: paths [uni], [sushi] — distinct first and last.
        let graph =
            PriceGraph::new(&registry, store, &["ETH/USDT".to_string()], 1).unwrap();
        let edges = build_compare_paths(&registry, &graph, "ethereum").unwrap();
        assert_eq!(edges["ETH/USDT"].len(), 1);
    }

    #[test]
    fn test_paths_sharing_last_pool_form_no_edge() {
        use crate::pool::registry::test_fixtures::{pool, token};
        use std::collections::BTreeMap;

        // Two 2-hop routes that converge on the same USDC/ETH pool: selling
        // back through the pool just bought from is never a cycle.
        let mut eth_tokens = BTreeMap::new();
        eth_tokens.insert("ETH".to_string(), token(18, 0xaa));
        eth_tokens.insert("USDT".to_string(), token(6, 0xbb));
        eth_tokens.insert("USDC".to_string(), token(6, 0xcc));
        let mut tokens = BTreeMap::new();
        tokens.insert("ethereum".to_string(), eth_tokens);

        let pools = vec![
            pool("ethereum", "uniswap", 3, "USDC/USDT", 100, "USDC", "USDT", 0x01),
            pool("ethereum", "sushiswap", 3, "USDC/USDT", 100, "USDC", "USDT", 0x02),
            pool("ethereum", "uniswap", 3, "USDC/ETH", 500, "USDC", "ETH", 0x03),
        ];
        let registry = Arc::new(PoolRegistry::new(tokens, &pools).unwrap());
        let store = PriceStore::new();
        for desc in registry.descriptors() {
            store.register(desc);
        }
        let graph =
            PriceGraph::new(&registry, store, &["ETH/USDT".to_string()], 2).unwrap();

        graph
            .with_symbol("ETH/USDT", |sp| assert_eq!(sp.paths.len(), 2))
            .unwrap();
        let edges = build_compare_paths(&registry, &graph, "ethereum").unwrap();
        assert!(edges["ETH/USDT"].is_empty());
    }

    #[tokio::test]
    async fn test_spread_computation_s4() {
        let mut fixture = fixture(10.0, None); // high target: no pending
        // Only the (uni, sushi) edge is priceable
        let snap = snapshot(&fixture, 100, [1850.0, 1855.0, 0.0], [0.0005, 0.0005, 0.0]);

        let out = fixture.detector.on_event(&snap).await.unwrap();
        assert!(matches!(out[0], SinkMessage::Spreads { .. }));

        let spreads = fixture.detector.spreads();
        // Directed spreads of the single live edge
        let uni_sell = spreads["UNI3ETHUSDT/SUS3ETHUSDT"];
        let sushi_sell = spreads["SUS3ETHUSDT/UNI3ETHUSDT"];

        // price_uni/price_sushi - 1 - 0.001, percent scaled
        assert!((uni_sell - ((1850.0 / 1855.0 - 1.0) - 0.001) * 100.0).abs() < 1e-9);
        assert!((sushi_sell - ((1855.0 / 1850.0 - 1.0) - 0.001) * 100.0).abs() < 1e-9);
        assert!(sushi_sell > 0.0 && uni_sell < 0.0);
        assert!(fixture.detector.pending().is_none());
    }

    #[tokio::test]
    async fn test_pending_created_with_gas_estimate() {
        let mut fixture = fixture(0.15, None);
        let snap = snapshot(&fixture, 100, [1850.0, 1860.0, 0.0], [0.0005, 0.0005, 0.0]);

        fixture.detector.on_event(&snap).await.unwrap();

        let pending = fixture.detector.pending().expect("pending should open");
        assert_eq!(pending.status, PendingStatus::Detected);
        assert_eq!(pending.block_seen, 100);
        // Buy the cheaper uni leg, sell the richer sushi leg
        assert_eq!(pending.buy_price, 1850.0);
        assert_eq!(pending.sell_price, 1860.0);
        // base 100k + two V3 single-hop legs at 50k each
        assert_eq!(pending.estimated_gas_units, 200_000);
    }

    #[tokio::test]
    async fn test_only_one_pending_at_a_time() {
        let mut fixture = fixture(0.15, None);
        let snap = snapshot(&fixture, 100, [1850.0, 1860.0, 0.0], [0.0005, 0.0005, 0.0]);
        fixture.detector.on_event(&snap).await.unwrap();
        let first_key = fixture.detector.pending().unwrap().edge_key.clone();

        // A bigger spread at the next block does not replace the live pending
        let snap2 = snapshot(&fixture, 101, [1850.0, 1900.0, 0.0], [0.0005, 0.0005, 0.0]);
        fixture.detector.on_event(&snap2).await.unwrap();
        assert_eq!(fixture.detector.pending().unwrap().edge_key, first_key);
    }

    #[tokio::test]
    async fn test_pending_lifecycle_s5() {
        let mut fixture = fixture(0.15, Some(U256::from(1u64)));

        // Block N: positive spread opens a pending
        let snap = snapshot(&fixture, 100, [1850.0, 1860.0, 0.0], [0.0005, 0.0005, 0.0]);
        fixture.detector.on_event(&snap).await.unwrap();
        assert!(fixture.detector.pending().is_some());

        // Same block, spread collapses: the revaluation deletes the pending
        let snap = snapshot(&fixture, 100, [1855.0, 1855.5, 0.0], [0.0005, 0.0005, 0.0]);
        fixture.detector.on_event(&snap).await.unwrap();
        assert!(fixture.detector.pending().is_none());

        // Gas for block N+1 arrives: nothing left to simulate
        fixture.detector.on_block(gas(101, 50)).await.unwrap();
        assert_eq!(*fixture.oracle.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pending_expires_on_later_block() {
        let mut fixture = fixture(0.15, Some(U256::from(1u64)));
        let snap = snapshot(&fixture, 100, [1850.0, 1860.0, 0.0], [0.0005, 0.0005, 0.0]);
        fixture.detector.on_event(&snap).await.unwrap();
        assert!(fixture.detector.pending().is_some());

        // Gas context for a later block: the window is gone
        let out = fixture.detector.on_block(gas(102, 50)).await.unwrap();
        assert!(fixture.detector.pending().is_none());
        assert!(out
            .iter()
            .any(|m| matches!(m, SinkMessage::Note(n) if n.contains("expired"))));
        assert_eq!(*fixture.oracle.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_gas_underfunded_discard_s6() {
        let mut fixture = fixture(0.0, Some(U256::from(1u64)));

        // Spread ≈ 0.02% after fees: prices 1850 / 1850.74, fees zeroed so
        // the arithmetic stays on the S6 numbers.
        let spread_target = 0.02f64;
        let sell = 1850.0 * (1.0 + spread_target / 100.0);
        let snap = snapshot(&fixture, 100, [1850.0, sell, 0.0], [0.0, 0.0, 0.0]);
        fixture.detector.on_event(&snap).await.unwrap();

        let pending = fixture.detector.pending().unwrap();
        assert_eq!(pending.estimated_gas_units, 200_000);

        // max_fee = 50 gwei → gas ≈ 200k * 50e9 * 1e-18 * sell ≈ 18.5 quote;
        // profit/unit = 1850 * 0.0002 = 0.37 → min input ≈ 92.5k > 20k cap.
        let out = fixture.detector.on_block(gas(100, 50)).await.unwrap();
        assert!(fixture.detector.pending().is_none());
        assert!(out
            .iter()
            .any(|m| matches!(m, SinkMessage::Note(n) if n.contains("over the 20000 cap"))));
        // Never reached simulation
        assert_eq!(*fixture.oracle.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_profitable_pending_submits_order() {
        // Big spread so min funding input is tiny; simulator returns a fat
        // amount_out so the post-simulation profit is positive.
        let amount_out = U256::from(10_000_000_000_000u128); // 10M USDT raw
        let mut fixture = fixture(0.15, Some(amount_out));

        let snap = snapshot(&fixture, 100, [1850.0, 1940.0, 0.0], [0.0005, 0.0005, 0.0]);
        fixture.detector.on_event(&snap).await.unwrap();
        assert!(fixture.detector.pending().is_some());

        let out = fixture.detector.on_block(gas(100, 50)).await.unwrap();

        assert_eq!(*fixture.oracle.calls.lock().unwrap(), 1);
        let orders = fixture.submitter.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].target_block, 100);
        assert_eq!(orders[0].retry, 2);
        // min_amount_out carries the 0.1% slippage haircut
        assert_eq!(
            orders[0].min_amount_out,
            amount_out * U256::from(999) / U256::from(1000)
        );
        assert!(out
            .iter()
            .any(|m| matches!(m, SinkMessage::Note(n) if n.contains("executed"))));
        // Cleared after the terminal decision
        assert!(fixture.detector.pending().is_none());
    }

    #[tokio::test]
    async fn test_simulation_revert_discards_pending() {
        let mut fixture = fixture(0.15, None); // oracle reverts
        let snap = snapshot(&fixture, 100, [1850.0, 1940.0, 0.0], [0.0005, 0.0005, 0.0]);
        fixture.detector.on_event(&snap).await.unwrap();

        let out = fixture.detector.on_block(gas(100, 50)).await.unwrap();
        assert!(fixture.detector.pending().is_none());
        assert!(out
            .iter()
            .any(|m| matches!(m, SinkMessage::Note(n) if n.contains("simulation failed"))));
        assert!(fixture.submitter.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_debug_mode_never_submits() {
        let amount_out = U256::from(10_000_000_000_000u128);
        let mut fixture = fixture(0.15, Some(amount_out));
        fixture.detector.settings.debug = true;

        let snap = snapshot(&fixture, 100, [1850.0, 1940.0, 0.0], [0.0005, 0.0005, 0.0]);
        fixture.detector.on_event(&snap).await.unwrap();
        fixture.detector.on_block(gas(100, 50)).await.unwrap();

        assert_eq!(*fixture.oracle.calls.lock().unwrap(), 1);
        assert!(fixture.submitter.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unpriced_paths_produce_no_spreads() {
        let mut fixture = fixture(0.15, None);
        let snap = snapshot(&fixture, 100, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let out = fixture.detector.on_event(&snap).await.unwrap();

        let SinkMessage::Spreads { spreads, .. } = &out[0] else {
            panic!("expected spreads message");
        };
        assert!(spreads.is_empty());
        assert!(fixture.detector.pending().is_none());
    }
}
