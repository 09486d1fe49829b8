//! Engine error taxonomy
//!
//! Recoverability policy:
//! - `TransportClosed` is absorbed by the reconnecting stream supervisors.
//! - `Decode` is logged and the offending event skipped.
//! - `OracleUnavailable` degrades to zero gas estimates (pending opportunities
//!   are then discarded as un-fundable, which is the conservative outcome).
//! - `Simulation` and `Submit` terminate the affected pending opportunity only.
//! - `Config`, `NoSuchSymbol` and `NoSuchPool` are fatal.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::types::PoolRef;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid or incomplete startup configuration. Aborts startup.
    #[error("config error: {0}")]
    Config(String),

    /// A trading symbol was referenced that the engine was not built with.
    #[error("unknown trading symbol: {0}")]
    NoSuchSymbol(String),

    /// A pool state read against a key with no populated cell.
    #[error("no pool state for {0}")]
    NoSuchPool(PoolRef),

    /// Websocket subscription ended (clean close, error close, or read
    /// timeout). Recoverable: the supervisor reconnects after a fixed backoff.
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// Malformed event payload. The event is skipped, the stream continues.
    #[error("decode error: {0}")]
    Decode(String),

    /// Gas price oracle fetch failed. Degrades to zero estimates.
    #[error("gas oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Quote oracle simulation reverted or could not be issued.
    #[error("simulation failed: {0}")]
    Simulation(String),

    /// Order relay rejected the submission.
    #[error("order submission failed: {0}")]
    Submit(String),

    /// RPC failure outside the subscription paths (bulk load, eth_call).
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The ingestion → detector queue closed underneath a producer. Fatal:
    /// the pipeline is unwinding.
    #[error("internal channel closed: {0}")]
    ChannelClosed(String),
}

impl EngineError {
    /// True for faults the stream supervisors recover from by reconnecting.
    pub fn is_transport(&self) -> bool {
        matches!(self, EngineError::TransportClosed(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PoolRef, PoolVersion};

    #[test]
    fn test_transport_classification() {
        assert!(EngineError::TransportClosed("eof".into()).is_transport());
        assert!(!EngineError::Decode("short data".into()).is_transport());
        assert!(!EngineError::Config("missing endpoint".into()).is_transport());
    }

    #[test]
    fn test_no_such_pool_display() {
        let key = PoolRef {
            chain: 0,
            exchange: 1,
            token_in: 2,
            token_out: 3,
            version: PoolVersion::V3,
        };
        let msg = EngineError::NoSuchPool(key).to_string();
        assert!(msg.contains("no pool state"));
    }
}
