//! Arbitrage layer
//!
//! Edge precompute, spread detection, pending lifecycle, quote-oracle
//! parameter construction, and the order submission interface.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

pub mod detector;
pub mod quoter;
pub mod submitter;

pub use detector::{build_compare_paths, cycle_name, ArbDetector, DetectorSettings};
pub use quoter::{make_params, OnlineQuoter, QuoteOracle};
pub use submitter::{NoopSubmitter, OrderSubmitter};
