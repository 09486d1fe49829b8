// Multi-chain cyclic arbitrage engine
// Entry point: config, bulk state load, pipeline startup

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use anyhow::{Context, Result};
use clap::Parser;
use dexarb_engine::arbitrage::{
    ArbDetector, DetectorSettings, NoopSubmitter, OnlineQuoter, QuoteOracle,
};
use dexarb_engine::external::WebhookNotifier;
use dexarb_engine::graph::PriceGraph;
use dexarb_engine::pipeline::Pipeline;
use dexarb_engine::pool::loader;
use dexarb_engine::stream::gas::GasOracle;
use dexarb_engine::stream::WsEventSource;
use dexarb_engine::{load_config, PoolRegistry, PriceStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dexarb-engine",
    about = "Real-time cyclic arbitrage detection across Uniswap V2/V3 venues"
)]
struct Args {
    /// Market definition file (tokens, pools, symbols, handlers)
    #[arg(long, default_value = "markets.toml", env = "MARKET_CONFIG")]
    market_config: PathBuf,

    /// Detect and simulate, but never submit orders
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config =
        load_config(&args.market_config, args.debug).context("failed to load configuration")?;
    let chains = config.active_chains();

    info!("engine starting");
    info!("  chains: {:?}", chains);
    info!("  symbols: {:?}", config.trading_symbols);
    info!("  pools: {}", config.pools.len());
    info!("  max swaps: {}", config.max_swaps);
    if config.debug {
        info!("  debug mode: orders will not be submitted");
    }

    let registry = Arc::new(PoolRegistry::new(config.tokens.clone(), &config.pools)?);
    let store = PriceStore::new();
    for desc in registry.descriptors() {
        store.register(desc);
    }

    // One multicall per chain fills the store; pools that fail stay
    // unusable until their first live event.
    let mut providers: HashMap<String, DynProvider> = HashMap::new();
    for (chain, url) in &config.rpc_endpoints {
        let parsed = url
            .parse()
            .with_context(|| format!("bad RPC URL for {chain}"))?;
        providers.insert(
            chain.clone(),
            ProviderBuilder::new().connect_http(parsed).erased(),
        );
    }
    for chain in &chains {
        let loaded = loader::load_chain(&providers[chain], chain, &registry, &store).await?;
        info!("[{chain}] {loaded} pools loaded");
    }

    let graph = Arc::new(PriceGraph::new(
        &registry,
        store.clone(),
        &config.trading_symbols,
        config.max_swaps,
    )?);

    // Initial full pricing pass so the first snapshots are populated
    for chain in &chains {
        let chain_id = registry
            .chain_id(chain)
            .context("chain disappeared from registry")?;
        for symbol in &config.trading_symbols {
            graph.update_price(chain_id, symbol)?;
        }
    }

    let sim_contracts: HashMap<String, alloy::primitives::Address> = config
        .simulator
        .iter()
        .map(|(chain, sim)| (chain.clone(), sim.contract))
        .collect();
    let sim_handlers: HashMap<String, HashMap<String, alloy::primitives::Address>> = config
        .simulator
        .iter()
        .map(|(chain, sim)| {
            (
                chain.clone(),
                sim.handlers.clone().into_iter().collect(),
            )
        })
        .collect();

    let oracle: Arc<dyn QuoteOracle> =
        Arc::new(OnlineQuoter::new(providers.clone(), sim_contracts));
    let detector = ArbDetector::new(
        Arc::clone(&registry),
        DetectorSettings {
            target_spread: config.target_spread,
            max_bet_size: config.max_bet_size,
            gas_costs: config.gas_costs,
            order_retry: config.order_retry,
            debug: config.debug,
        },
        sim_handlers,
        oracle,
        Arc::new(NoopSubmitter),
    );

    let source = Arc::new(WsEventSource::new(
        config.ws_endpoints.clone().into_iter().collect(),
    ));
    let gas_oracle = Arc::new(GasOracle::new(config.blocknative_api_key.clone()));

    let mut pipeline = Pipeline::new(
        registry,
        store,
        graph,
        detector,
        source,
        gas_oracle,
        config.chain_ids.clone().into_iter().collect(),
        chains,
    );
    if let Some(url) = &config.notify_webhook_url {
        pipeline.add_sink(Arc::new(WebhookNotifier::new(url.clone())));
    }

    tokio::select! {
        result = pipeline.run() => {
            result?;
            warn!("pipeline drained — no live subscriptions left");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    Ok(())
}
