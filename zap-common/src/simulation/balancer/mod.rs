//! Balancer V2 pool math: weighted pools and stable pools (meta-stable and composable-stable).
pub mod fixed_point;
pub mod log_exp_math;
pub mod stable;
pub mod weighted;

use num_bigint::BigUint;

use crate::{models::token::Token, simulation::errors::SimulationError};

/// Factor upscaling base units of `token` to 18 decimals, times the token rate.
///
/// `rate` is in 18 decimals; applied with `mul_down`.
pub(crate) fn scaling_factor(token: &Token, rate: &BigUint) -> Result<BigUint, SimulationError> {
    if token.decimals > 18 {
        return Err(SimulationError::InvalidInput(format!(
            "unsupported decimals {} of {}",
            token.decimals, token.symbol
        )));
    }
    Ok(BigUint::from(10u32).pow(18 - token.decimals) * rate)
}
