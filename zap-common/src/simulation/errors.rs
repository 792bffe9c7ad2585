use thiserror::Error;

/// Failures of pool math.
///
/// - `InvalidInput`: the request cannot be served by this pool, e.g. an unknown token.
/// - `InsufficientLiquidity`: the pool is empty or the trade exceeds what it can absorb.
/// - `Math`: an iteration did not converge or an intermediate value left its domain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),
    #[error("Math error: {0}")]
    Math(String),
}
