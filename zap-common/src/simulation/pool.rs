use std::fmt::{self, Debug};

use num_bigint::BigUint;

use crate::{
    models::{token::Token, Address},
    simulation::errors::SimulationError,
};

/// Result of a simulated swap.
///
/// `new_state` is the pool after the swap, so chained swaps through the same pool see the
/// moved reserves.
pub struct PoolSwap {
    pub amount_out: BigUint,
    pub new_state: Box<dyn LiquidityPool>,
}

impl PoolSwap {
    pub fn new(amount_out: BigUint, new_state: Box<dyn LiquidityPool>) -> Self {
        Self { amount_out, new_state }
    }
}

impl Debug for PoolSwap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSwap")
            .field("amount_out", &self.amount_out)
            .finish_non_exhaustive()
    }
}

/// Liquidity minted by an add, with the per-token amounts the pool took and left over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddLiquidityResult {
    pub liquidity: BigUint,
    pub used: Vec<BigUint>,
    pub unused: Vec<BigUint>,
}

/// State of one pool instance. Must be read fresh per quote.
pub trait LiquidityPool: Debug + Send + Sync {
    fn address(&self) -> &Address;

    /// Pool tokens, in pool order. Amount vectors follow this order.
    fn tokens(&self) -> &[Token];

    fn swap(
        &self,
        amount_in: &BigUint,
        token_in: &Token,
        token_out: &Token,
    ) -> Result<PoolSwap, SimulationError>;

    fn add_liquidity(&self, amounts: &[BigUint]) -> Result<AddLiquidityResult, SimulationError>;

    fn remove_liquidity(&self, liquidity: &BigUint) -> Result<Vec<BigUint>, SimulationError>;

    fn total_supply(&self) -> BigUint;

    /// Pools that can add or remove liquidity with a single token.
    fn as_single_sided(&self) -> Option<&dyn SingleSidedLiquidity> {
        None
    }

    fn token_index(&self, token: &Token) -> Result<usize, SimulationError> {
        self.tokens()
            .iter()
            .position(|t| t == token)
            .ok_or_else(|| {
                SimulationError::InvalidInput(format!(
                    "token {} not in pool {}",
                    token,
                    self.address()
                ))
            })
    }
}

pub trait SingleSidedLiquidity {
    fn add_liquidity_single(
        &self,
        amount: &BigUint,
        token_in: &Token,
    ) -> Result<BigUint, SimulationError>;

    fn remove_liquidity_single(
        &self,
        liquidity: &BigUint,
        token_out: &Token,
    ) -> Result<BigUint, SimulationError>;
}

/// Checks that `amounts` has one entry per pool token.
pub(crate) fn check_amounts(
    pool: &dyn LiquidityPool,
    amounts: &[BigUint],
) -> Result<(), SimulationError> {
    if amounts.len() != pool.tokens().len() {
        return Err(SimulationError::InvalidInput(format!(
            "expected {} amounts, got {}",
            pool.tokens().len(),
            amounts.len()
        )));
    }
    Ok(())
}
