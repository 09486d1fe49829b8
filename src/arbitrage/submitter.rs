//! Order submission interface
//!
//! The engine hands finalized opportunities to an `OrderSubmitter`; building
//! and relaying the actual transaction (private relay, bundle retries) lives
//! behind the trait. `NoopSubmitter` is wired in debug mode: it logs the
//! order and drops it.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::error::Result;
use crate::types::OrderRequest;
use async_trait::async_trait;
use tracing::info;

/// Sends one cyclic arbitrage order. Returns transaction receipt hashes, or
/// an empty list when the relay dropped the bundle. `SubmitError` aborts the
/// retry loop of the implementation.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    async fn send_order(&self, order: OrderRequest) -> Result<Vec<String>>;
}

/// Logs and drops every order. Used in debug mode and whenever no live
/// relay is configured.
#[derive(Debug, Default)]
pub struct NoopSubmitter;

#[async_trait]
impl OrderSubmitter for NoopSubmitter {
    async fn send_order(&self, order: OrderRequest) -> Result<Vec<String>> {
        info!(
            "[dry-run] order on {} for block {}: {} legs, min out {}, max fee {} wei",
            order.chain,
            order.target_block,
            order.params.len(),
            order.min_amount_out,
            order.max_fee_per_gas
        );
        Ok(Vec::new())
    }
}
