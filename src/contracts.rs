//! Centralized Contract Definitions
//!
//! All Solidity interfaces used by the engine, defined with alloy's `sol!`
//! macro. Read-side interfaces (pool storage getters, Multicall3) are used
//! for ABI encoding/decoding only; the swap simulator carries `#[sol(rpc)]`
//! so a contract instance can be bound to any alloy provider.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use alloy::primitives::{address, Address};
use alloy::sol;

/// Multicall3 is deployed at the same address on every EVM chain.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
    #[derive(Debug)]
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    #[derive(Debug)]
    struct Result3 {
        bool success;
        bytes returnData;
    }

    function aggregate3(Call3[] calldata calls) external payable returns (Result3[] memory returnData);
}

sol! {
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }
}

sol! {
    interface IUniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
    }
}

sol! {
    /// Deployed swap simulator. Each element of the params list is one swap
    /// leg; protocol selects the handler kind (0 = V2 Factory, 1 = V3
    /// QuoterV2) and only the first leg carries a non-zero amount.
    #[sol(rpc)]
    interface ISwapSimulator {
        struct SwapParams {
            uint8 protocol;
            address handler;
            address tokenIn;
            address tokenOut;
            uint24 fee;
            uint256 amount;
        }

        function simulateSwapIn(SwapParams[] calldata paramsList) external returns (uint256 amountOut);
    }
}
