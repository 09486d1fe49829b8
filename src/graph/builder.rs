//! Swap path enumeration
//!
//! Offline enumerator of all 1..max_swaps-hop paths per trading symbol per
//! chain. Runs once at startup; the per-event hot path only re-prices the
//! enumerated paths.
//!
//! Two phases:
//! 1. Hop sampling — per target hop count, collect the candidate directional
//!    pools admissible at each position under the token-flow constraints.
//! 2. Assembly — depth-first enumeration over the samples, enforcing the
//!    hop-chaining invariant. Implemented with an explicit cursor stack so
//!    allocation stays predictable regardless of pool count.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::error::Result;
use crate::pool::PoolRegistry;
use crate::types::{PoolRef, SwapPath};
use std::collections::BTreeSet;

pub struct PathBuilder<'a> {
    registry: &'a PoolRegistry,
    max_swaps: usize,
}

impl<'a> PathBuilder<'a> {
    pub fn new(registry: &'a PoolRegistry, max_swaps: usize) -> Self {
        PathBuilder {
            registry,
            max_swaps,
        }
    }

    /// All viable paths for `symbol`, concatenated across chains in chain-ID
    /// order. Every path is zero-padded to `max_swaps` slots. Output is
    /// deterministic: candidates are visited in registration order.
    pub fn build(&self, symbol: &str) -> Result<Vec<SwapPath>> {
        let (token_in, token_out) = self.registry.symbol_in_out(symbol)?;

        let mut paths = Vec::new();
        for chain in self.registry.chains() {
            let keys = self.registry.directional_keys(chain);
            for n in 1..=self.max_swaps {
                if let Some(samples) = sample_pools(keys, token_in, token_out, n) {
                    for hops in assemble(&samples) {
                        paths.push(SwapPath::padded(hops, self.max_swaps));
                    }
                }
            }
        }

        Ok(paths)
    }
}

/// Phase 1: candidate pools per hop position for an `n`-hop path.
///
/// Position 0 must consume the symbol input token; the last position must
/// produce the symbol output; intermediate positions must not produce the
/// output (no premature termination) and must consume a token reachable from
/// the previous position. Returns None when any position has no candidates.
fn sample_pools(keys: &[PoolRef], token_in: u16, token_out: u16, n: usize) -> Option<Vec<Vec<PoolRef>>> {
    let mut samples: Vec<Vec<PoolRef>> = Vec::with_capacity(n);
    let mut reachable: BTreeSet<u16> = BTreeSet::new();

    for position in 0..n {
        let filtered: Vec<PoolRef> = keys
            .iter()
            .filter(|k| {
                let in_ok = if position == 0 {
                    k.token_in == token_in
                } else {
                    reachable.contains(&k.token_in)
                };
                let out_ok = if position == n - 1 {
                    k.token_out == token_out
                } else {
                    k.token_out != token_out
                };
                in_ok && out_ok
            })
            .copied()
            .collect();

        if filtered.is_empty() {
            return None;
        }

        reachable = filtered.iter().map(|k| k.token_out).collect();
        samples.push(filtered);
    }

    Some(samples)
}

/// A hop that undoes the previous one on the same venue. Pools compare equal
/// when exchange and version match and the token pair matches in reverse;
/// direction is ignored. Distinct V3 fee tiers of one pair would be exempt,
/// but the registry's unique-key contract already keeps them apart.
fn is_uturn(prev: &PoolRef, curr: &PoolRef) -> bool {
    prev.exchange == curr.exchange
        && prev.version == curr.version
        && prev.token_in == curr.token_out
        && prev.token_out == curr.token_in
}

/// Phase 2: depth-first assembly over the sampled candidates.
///
/// Explicit cursor-per-depth backtracking instead of recursion. At each
/// depth the next candidate must chain from the previous hop and must not
/// U-turn through the same pool.
fn assemble(samples: &[Vec<PoolRef>]) -> Vec<Vec<PoolRef>> {
    let n = samples.len();
    let mut paths = Vec::new();
    let mut chosen: Vec<PoolRef> = vec![PoolRef::SENTINEL; n];
    let mut cursors: Vec<usize> = vec![0; n];
    let mut depth = 0usize;

    'outer: loop {
        while cursors[depth] < samples[depth].len() {
            let candidate = samples[depth][cursors[depth]];
            cursors[depth] += 1;

            if depth > 0 {
                let prev = &chosen[depth - 1];
                if prev.token_out != candidate.token_in {
                    continue;
                }
                if is_uturn(prev, &candidate) {
                    continue;
                }
            }

            chosen[depth] = candidate;
            if depth == n - 1 {
                paths.push(chosen.clone());
            } else {
                depth += 1;
                cursors[depth] = 0;
            }
            continue 'outer;
        }

        if depth == 0 {
            break;
        }
        depth -= 1;
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolEntry, TokenInfo};
    use crate::pool::registry::test_fixtures::{pool, s2_market, token};
    use std::collections::BTreeMap;

    fn registry(
        tokens: BTreeMap<String, BTreeMap<String, TokenInfo>>,
        pools: &[PoolEntry],
    ) -> PoolRegistry {
        PoolRegistry::new(tokens, pools).unwrap()
    }

    fn hop_names(registry: &PoolRegistry, path: &SwapPath) -> Vec<String> {
        path.real_hops()
            .map(|h| {
                let token_in = registry.token_name(h.token_in).unwrap();
                let token_out = registry.token_name(h.token_out).unwrap();
                let desc = registry
                    .descriptor(registry.ordinal_of(h).unwrap())
                    .unwrap();
                format!("{}:{token_in}->{token_out}", desc.exchange)
            })
            .collect()
    }

    #[test]
    fn test_s2_enumeration() {
        // Pools: uni ETH/USDT, sushi ETH/USDT, uni USDC/ETH, uni USDC/USDT.
        // Symbol ETH/USDT with two hops allowed yields exactly three paths.
        let (tokens, pools) = s2_market();
        let registry = registry(tokens, &pools);
        let paths = PathBuilder::new(&registry, 2).build("ETH/USDT").unwrap();

        let names: Vec<Vec<String>> = paths.iter().map(|p| hop_names(&registry, p)).collect();
        assert_eq!(
            names,
            vec![
                vec!["uniswap:USDT->ETH".to_string()],
                vec!["sushiswap:USDT->ETH".to_string()],
                vec![
                    "uniswap:USDT->USDC".to_string(),
                    "uniswap:USDC->ETH".to_string()
                ],
            ]
        );

        // All padded to the same width
        assert!(paths.iter().all(|p| p.hops.len() == 2));
    }

    #[test]
    fn test_hop_chaining_invariant() {
        let (tokens, pools) = s2_market();
        let registry = registry(tokens, &pools);
        let paths = PathBuilder::new(&registry, 3).build("ETH/USDT").unwrap();

        for path in &paths {
            let hops: Vec<&PoolRef> = path.real_hops().collect();
            for pair in hops.windows(2) {
                assert_eq!(pair[0].token_out, pair[1].token_in);
            }
        }
    }

    #[test]
    fn test_no_uturn_paths() {
        // uni ETH/USDT both directions would allow USDT->ETH->USDT->... only
        // through a different venue; add a sushi pool so 3-hop paths exist.
        let (tokens, pools) = s2_market();
        let registry = registry(tokens, &pools);
        let paths = PathBuilder::new(&registry, 3).build("ETH/USDT").unwrap();

        assert!(!paths.is_empty());
        for path in &paths {
            let hops: Vec<&PoolRef> = path.real_hops().collect();
            for pair in hops.windows(2) {
                assert!(
                    !is_uturn(pair[0], pair[1]),
                    "u-turn in path: {:?}",
                    hop_names(&registry, path)
                );
            }
        }
    }

    #[test]
    fn test_cross_venue_bounce_allowed() {
        // Buying on uniswap and immediately selling on sushiswap is not a
        // U-turn: the venues differ.
        let (tokens, pools) = s2_market();
        let registry = registry(tokens, &pools);
        let paths = PathBuilder::new(&registry, 3).build("USDC/USDT").unwrap();

        // USDT->ETH (uni), ETH->USDT... is blocked mid-path (premature
        // output), but USDT->ETH (uni) then ETH->USDC (none) etc. What must
        // exist: the direct USDT->USDC hop and USDT->ETH->USDC via uniswap.
        let names: Vec<Vec<String>> = paths.iter().map(|p| hop_names(&registry, p)).collect();
        assert!(names.contains(&vec!["uniswap:USDT->USDC".to_string()]));
        assert!(names.contains(&vec![
            "uniswap:USDT->ETH".to_string(),
            "uniswap:ETH->USDC".to_string()
        ]));
    }

    #[test]
    fn test_max_swaps_one_limits_to_single_hop() {
        let (tokens, pools) = s2_market();
        let registry = registry(tokens, &pools);
        let paths = PathBuilder::new(&registry, 1).build("ETH/USDT").unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.hop_count() == 1));
    }

    #[test]
    fn test_unreachable_symbol_yields_no_paths() {
        let mut eth_tokens = BTreeMap::new();
        eth_tokens.insert("ETH".to_string(), token(18, 0xaa));
        eth_tokens.insert("USDT".to_string(), token(6, 0xbb));
        eth_tokens.insert("WBTC".to_string(), token(8, 0xcc));
        let mut tokens = BTreeMap::new();
        tokens.insert("ethereum".to_string(), eth_tokens);

        let pools = vec![pool(
            "ethereum", "uniswap", 3, "ETH/USDT", 500, "ETH", "USDT", 0x01,
        )];
        let registry = registry(tokens, &pools);

        let paths = PathBuilder::new(&registry, 3).build("WBTC/USDT").unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn test_paths_never_cross_chains() {
        let mut eth_tokens = BTreeMap::new();
        eth_tokens.insert("ETH".to_string(), token(18, 0xaa));
        eth_tokens.insert("USDT".to_string(), token(6, 0xbb));
        let mut poly_tokens = BTreeMap::new();
        poly_tokens.insert("ETH".to_string(), token(18, 0xa1));
        poly_tokens.insert("USDT".to_string(), token(6, 0xb1));

        let mut tokens = BTreeMap::new();
        tokens.insert("ethereum".to_string(), eth_tokens);
        tokens.insert("polygon".to_string(), poly_tokens);

        let pools = vec![
            pool("ethereum", "uniswap", 3, "ETH/USDT", 500, "ETH", "USDT", 0x01),
            pool("polygon", "uniswap", 3, "ETH/USDT", 500, "ETH", "USDT", 0x02),
        ];
        let registry = registry(tokens, &pools);
        let paths = PathBuilder::new(&registry, 2).build("ETH/USDT").unwrap();

        // One path per chain, concatenated in chain-ID order, and every hop
        // of a path stays on its first hop's chain.
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].first_hop().unwrap().chain, 0);
        assert_eq!(paths[1].first_hop().unwrap().chain, 1);
        for path in &paths {
            let chain = path.first_hop().unwrap().chain;
            assert!(path.real_hops().all(|h| h.chain == chain));
        }
    }

    #[test]
    fn test_deterministic_rebuild() {
        let (tokens, pools) = s2_market();
        let registry = registry(tokens, &pools);
        let builder = PathBuilder::new(&registry, 3);
        let first = builder.build("ETH/USDT").unwrap();
        let second = builder.build("ETH/USDT").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_intermediate_hop_never_emits_output_token() {
        let (tokens, pools) = s2_market();
        let registry = registry(tokens, &pools);
        let eth = registry.token_id("ETH").unwrap();
        let paths = PathBuilder::new(&registry, 3).build("ETH/USDT").unwrap();

        for path in &paths {
            let hops: Vec<&PoolRef> = path.real_hops().collect();
            for hop in &hops[..hops.len() - 1] {
                assert_ne!(hop.token_out, eth);
            }
        }
    }
}
