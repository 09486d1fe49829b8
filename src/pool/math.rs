//! AMM price math
//!
//! Pure conversions between pool storage values and directional mid-prices,
//! plus the V2 constant-product amount formulas. V3 math is single-tick on
//! purpose: mid-price quotes ignore tick crossings, which bounds accuracy for
//! large trades but is exact for the spread filtering done here.
//!
//! Reference: https://blog.uniswap.org/uniswap-v3-math-primer
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use alloy::primitives::U256;

/// 2^96 as f64, the Q64.96 scale factor of sqrtPriceX96.
const Q96: f64 = 79228162514264337593543950336.0;

/// Widening conversion for values that may exceed u128 (sqrtPriceX96 is a
/// 160-bit integer). Loses precision past 53 bits, which is acceptable for
/// f64 price quotes.
pub fn u256_to_f64(x: U256) -> f64 {
    x.as_limbs()
        .iter()
        .enumerate()
        .fold(0.0, |acc, (i, &limb)| {
            acc + (limb as f64) * 2f64.powi(64 * i as i32)
        })
}

/// Decimal adjustment factor 10^(decimals0 - decimals1).
fn decimal_adjustment(decimals0: u8, decimals1: u8) -> f64 {
    10f64.powi(decimals0 as i32 - decimals1 as i32)
}

/// V2 directional mid-price from reserves.
///
/// `mid = (reserve1 / reserve0) * 10^(decimals0 - decimals1)` is the quote
/// for buying token1 with 1 token0; the inverse is returned when token1 is
/// the input side. Zero reserves yield 0.0 (unpriceable, not an error).
pub fn reserves_to_price(
    reserve0: U256,
    reserve1: U256,
    decimals0: u8,
    decimals1: u8,
    token0_in: bool,
) -> f64 {
    let r0 = u256_to_f64(reserve0);
    let r1 = u256_to_f64(reserve1);
    if r0 == 0.0 || r1 == 0.0 {
        return 0.0;
    }

    let mid = (r1 / r0) * decimal_adjustment(decimals0, decimals1);
    if token0_in {
        mid
    } else {
        1.0 / mid
    }
}

/// V3 directional mid-price from the current sqrtPriceX96.
///
/// `mid = (sqrtPriceX96 / 2^96)^2 * 10^(decimals0 - decimals1)`, direction
/// rule as in [`reserves_to_price`].
pub fn sqrtx96_to_price(
    sqrt_price_x96: U256,
    decimals0: u8,
    decimals1: u8,
    token0_in: bool,
) -> f64 {
    let s = u256_to_f64(sqrt_price_x96) / Q96;
    if s == 0.0 {
        return 0.0;
    }

    let mid = s * s * decimal_adjustment(decimals0, decimals1);
    if token0_in {
        mid
    } else {
        1.0 / mid
    }
}

/// V3 decimal-adjusted price at a tick: `1.0001^tick * 10^(d0 - d1)`.
pub fn tick_to_price(tick: i32, decimals0: u8, decimals1: u8, token0_in: bool) -> f64 {
    let mid = 1.0001f64.powi(tick) * decimal_adjustment(decimals0, decimals1);
    if token0_in {
        mid
    } else {
        1.0 / mid
    }
}

/// Inverse of [`tick_to_price`] for the token0-input direction: the tick
/// whose price floor contains `price` (decimal-adjusted input).
pub fn price_to_tick(price: f64, decimals0: u8, decimals1: u8) -> i32 {
    let raw = price / decimal_adjustment(decimals0, decimals1);
    (raw.ln() / 1.0001f64.ln()).floor() as i32
}

/// Price bounds of the single tick-spacing-aligned range containing
/// `current_tick`. For the token1-input direction the bounds are inverted
/// and swapped so that `(low, high)` ordering is preserved.
pub fn tick_to_price_range(
    current_tick: i32,
    tick_spacing: i32,
    decimals0: u8,
    decimals1: u8,
    token0_in: bool,
) -> (f64, f64) {
    let lower = tick_spacing * current_tick.div_euclid(tick_spacing);
    let upper = lower + tick_spacing;
    let adj = decimal_adjustment(decimals0, decimals1);
    let low = 1.0001f64.powi(lower) * adj;
    let high = 1.0001f64.powi(upper) * adj;
    if token0_in {
        (low, high)
    } else {
        (1.0 / high, 1.0 / low)
    }
}

/// V2 constant-product output amount, fee in parts-per-thousand (3 = 0.3%).
///
/// `amountOut = (amountIn * (1000 - fee) * reserveOut)
///            / (reserveIn * 1000 + amountIn * (1000 - fee))`
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256, fee_ppt: u32) -> U256 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::ZERO;
    }

    let amount_in_with_fee = amount_in * U256::from(1000 - fee_ppt);
    let numerator = amount_in_with_fee * reserve_out;
    let denominator = reserve_in * U256::from(1000) + amount_in_with_fee;

    numerator / denominator
}

/// V2 constant-product input amount for a desired output. Returns U256::MAX
/// when the pool cannot produce `amount_out`.
pub fn get_amount_in(amount_out: U256, reserve_in: U256, reserve_out: U256, fee_ppt: u32) -> U256 {
    if amount_out.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::ZERO;
    }
    if amount_out >= reserve_out {
        return U256::MAX;
    }

    let numerator = reserve_in * amount_out * U256::from(1000);
    let denominator = (reserve_out - amount_out) * U256::from(1000 - fee_ppt);

    numerator / denominator + U256::from(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_to_f64_widening() {
        assert_eq!(u256_to_f64(U256::ZERO), 0.0);
        assert_eq!(u256_to_f64(U256::from(1_000_000u64)), 1e6);
        // Above u128: 2^160
        let big = U256::from(1u8) << 160;
        assert!((u256_to_f64(big) - 2f64.powi(160)).abs() / 2f64.powi(160) < 1e-12);
    }

    #[test]
    fn test_v2_price_decimal_adjusted() {
        // 100 USDC (6 dec) vs 0.042 WETH (18 dec): 0.00042 WETH per USDC
        let price = reserves_to_price(
            U256::from(100_000_000u64),
            U256::from(42_000_000_000_000_000u64),
            6,
            18,
            true,
        );
        assert!((price - 0.00042).abs() < 1e-10);
    }

    #[test]
    fn test_v2_price_reciprocal() {
        let r0 = U256::from(1_000u64);
        let r1 = U256::from(2_000u64);
        let forward = reserves_to_price(r0, r1, 18, 18, true);
        let backward = reserves_to_price(r0, r1, 18, 18, false);
        assert!((forward * backward - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_v3_price_eth_usdt() {
        // ETH(18)/USDT(6) at ~1843 USDT per ETH:
        // sqrtPriceX96 = sqrt(1843e-12) * 2^96 ≈ 3.4014e24
        let sqrt = U256::from(3_401_400_000_000_000_000_000_000u128);
        let eth_in = sqrtx96_to_price(sqrt, 18, 6, true);
        assert!((eth_in - 1843.4).abs() < 1.0, "got {eth_in}");

        let usdt_in = sqrtx96_to_price(sqrt, 18, 6, false);
        assert!((eth_in * usdt_in - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_v3_zero_sqrt_price() {
        assert_eq!(sqrtx96_to_price(U256::ZERO, 18, 6, true), 0.0);
        assert_eq!(sqrtx96_to_price(U256::ZERO, 18, 6, false), 0.0);
    }

    #[test]
    fn test_tick_price_round_trip() {
        // Probe strictly inside the tick so floating error around the
        // boundary cannot flip the floor.
        let tick = 202_500;
        let price = tick_to_price(tick, 18, 18, true) * 1.00005;
        assert_eq!(price_to_tick(price, 18, 18), tick);
    }

    #[test]
    fn test_tick_price_range_direction() {
        let (low, high) = tick_to_price_range(202_517, 10, 18, 18, true);
        assert!(low < high);
        assert!((low - 1.0001f64.powi(202_510)).abs() / low < 1e-12);

        // token1-input direction: inverted and swapped, ordering preserved
        let (ilow, ihigh) = tick_to_price_range(202_517, 10, 18, 18, false);
        assert!(ilow < ihigh);
        assert!((ilow - 1.0 / high).abs() / ilow < 1e-12);
    }

    #[test]
    fn test_get_amount_out() {
        // 1 ETH into a 100 ETH / 200,000 USDC pool ≈ 1976 USDC after fee
        let out = get_amount_out(
            U256::from(1_000_000_000_000_000_000u128),
            U256::from(100_000_000_000_000_000_000u128),
            U256::from(200_000_000_000u64),
            3,
        );
        assert!(out > U256::from(1_970_000_000u64));
        assert!(out < U256::from(2_000_000_000u64));
    }

    #[test]
    fn test_get_amount_out_zero_inputs() {
        let hundred = U256::from(100u64);
        assert_eq!(get_amount_out(U256::ZERO, hundred, hundred, 3), U256::ZERO);
        assert_eq!(get_amount_out(hundred, U256::ZERO, hundred, 3), U256::ZERO);
        assert_eq!(get_amount_out(hundred, hundred, U256::ZERO, 3), U256::ZERO);
    }

    #[test]
    fn test_get_amount_in_round_trip() {
        let reserve_in = U256::from(100_000_000_000_000_000_000u128);
        let reserve_out = U256::from(200_000_000_000u64);
        let amount_out = U256::from(1_000_000_000u64);

        let amount_in = get_amount_in(amount_out, reserve_in, reserve_out, 3);
        let verified = get_amount_out(amount_in, reserve_in, reserve_out, 3);
        assert!(verified >= amount_out);
    }

    #[test]
    fn test_get_amount_in_exhausted_pool() {
        let reserve = U256::from(1_000u64);
        assert_eq!(get_amount_in(reserve, reserve, reserve, 3), U256::MAX);
    }
}
