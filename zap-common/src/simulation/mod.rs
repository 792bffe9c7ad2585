//! Pure AMM math, one adapter per pool family. All amounts are base-unit integers.
pub mod balancer;
pub mod concentrated;
pub mod curve;
pub mod errors;
pub mod pool;
pub mod uniswap_v2;

pub use pool::{AddLiquidityResult, LiquidityPool, PoolSwap, SingleSidedLiquidity};
