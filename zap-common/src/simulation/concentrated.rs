//! Concentrated liquidity managers: a fungible share wrapper around one position in a
//! concentrated liquidity pool.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::{
    models::{token::Token, Address},
    simulation::{
        errors::SimulationError,
        pool::{check_amounts, AddLiquidityResult, LiquidityPool, PoolSwap},
    },
};

const FEE_PIPS_DENOMINATOR: u32 = 1_000_000;

fn q96() -> BigUint {
    BigUint::one() << 96
}

/// Liquidity position over a sqrt price range, both bounds in Q64.96.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub liquidity: BigUint,
    pub sqrt_price_lower_x96: BigUint,
    pub sqrt_price_upper_x96: BigUint,
}

impl Position {
    /// Token amounts held by the position at `sqrt_price_x96`.
    pub fn amounts(&self, sqrt_price_x96: &BigUint) -> [BigUint; 2] {
        let (lower, upper) = (&self.sqrt_price_lower_x96, &self.sqrt_price_upper_x96);
        let l = &self.liquidity;
        if sqrt_price_x96 <= lower {
            [l * q96() * (upper - lower) / (upper * lower), BigUint::zero()]
        } else if sqrt_price_x96 >= upper {
            [BigUint::zero(), l * (upper - lower) / q96()]
        } else {
            [
                l * q96() * (upper - sqrt_price_x96) / (upper * sqrt_price_x96),
                l * (sqrt_price_x96 - lower) / q96(),
            ]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcentratedPool {
    /// The manager contract, which is also the share token.
    address: Address,
    pool_address: Address,
    tokens: Vec<Token>,
    sqrt_price_x96: BigUint,
    /// Active liquidity of the underlying pool at the current tick.
    pool_liquidity: BigUint,
    position: Position,
    idle: [BigUint; 2],
    total_supply: BigUint,
    fee_pips: u32,
    calm: bool,
}

impl ConcentratedPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Address,
        pool_address: Address,
        tokens: [Token; 2],
        sqrt_price_x96: BigUint,
        pool_liquidity: BigUint,
        position: Position,
        idle: [BigUint; 2],
        total_supply: BigUint,
        fee_pips: u32,
        calm: bool,
    ) -> Result<Self, SimulationError> {
        if position.sqrt_price_lower_x96 >= position.sqrt_price_upper_x96 ||
            position.sqrt_price_lower_x96.is_zero()
        {
            return Err(SimulationError::InvalidInput(format!("invalid position range in {address}")));
        }
        if fee_pips >= FEE_PIPS_DENOMINATOR {
            return Err(SimulationError::InvalidInput(format!("invalid fee {fee_pips}")));
        }
        Ok(Self {
            address,
            pool_address,
            tokens: tokens.to_vec(),
            sqrt_price_x96,
            pool_liquidity,
            position,
            idle,
            total_supply,
            fee_pips,
            calm,
        })
    }

    pub fn pool_address(&self) -> &Address {
        &self.pool_address
    }

    /// Whether the pool price is close enough to its time weighted average for the manager to
    /// accept deposits and withdrawals.
    pub fn is_calm(&self) -> bool {
        self.calm
    }

    /// Total token amounts backing all shares.
    pub fn balances(&self) -> [BigUint; 2] {
        let [p0, p1] = self.position.amounts(&self.sqrt_price_x96);
        [p0 + &self.idle[0], p1 + &self.idle[1]]
    }

    /// Share of the deposit value that must be held in the token other than `index_in`,
    /// as `(numerator, denominator)`. Valued in token1 at the pool price.
    pub fn swap_fraction(&self, index_in: usize) -> (BigUint, BigUint) {
        let [b0, b1] = self.balances();
        let value0 = b0 * &self.sqrt_price_x96 * &self.sqrt_price_x96 / (q96() * q96());
        let value1 = b1;
        let total = &value0 + &value1;
        if index_in == 0 {
            (value1, total)
        } else {
            (value0, total)
        }
    }

    fn price_in_range(&self, sqrt_price_x96: &BigUint) -> bool {
        sqrt_price_x96 >= &self.position.sqrt_price_lower_x96 &&
            sqrt_price_x96 <= &self.position.sqrt_price_upper_x96
    }
}

impl LiquidityPool for ConcentratedPool {
    fn address(&self) -> &Address {
        &self.address
    }

    fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Swap on the underlying pool, assuming the price stays within the current range.
    fn swap(
        &self,
        amount_in: &BigUint,
        token_in: &Token,
        token_out: &Token,
    ) -> Result<PoolSwap, SimulationError> {
        let index_in = self.token_index(token_in)?;
        if self.token_index(token_out)? == index_in {
            return Err(SimulationError::InvalidInput("cannot swap a token to itself".to_string()));
        }
        let l = &self.pool_liquidity;
        if l.is_zero() {
            return Err(SimulationError::InsufficientLiquidity("no active liquidity".to_string()));
        }
        let amount = amount_in * (FEE_PIPS_DENOMINATOR - self.fee_pips) / FEE_PIPS_DENOMINATOR;
        let price = &self.sqrt_price_x96;

        let (new_price, amount_out) = if index_in == 0 {
            let numerator = l * price * q96();
            let denominator = l * q96() + &amount * price;
            // Rounded up so the output is never overstated.
            let new_price = (&numerator + &denominator - BigUint::one()) / &denominator;
            let out = l * (price - &new_price) / q96();
            (new_price, out)
        } else {
            let new_price = price + &amount * q96() / l;
            let out = l * q96() * (&new_price - price) / (&new_price * price);
            (new_price, out)
        };

        if !self.price_in_range(&new_price) {
            return Err(SimulationError::InsufficientLiquidity(
                "swap crosses the position range".to_string(),
            ));
        }
        let new_state = Self { sqrt_price_x96: new_price, ..self.clone() };
        Ok(PoolSwap::new(amount_out, Box::new(new_state)))
    }

    /// Mints shares for the largest part of `amounts` matching the current balance ratio.
    fn add_liquidity(&self, amounts: &[BigUint]) -> Result<AddLiquidityResult, SimulationError> {
        check_amounts(self, amounts)?;
        let [b0, b1] = self.balances();
        if self.total_supply.is_zero() || (b0.is_zero() && b1.is_zero()) {
            return Err(SimulationError::InsufficientLiquidity(format!(
                "manager {} has no shares",
                self.address
            )));
        }
        let ts = &self.total_supply;
        let (a0, a1) = (&amounts[0], &amounts[1]);
        let (used0, used1, liquidity) = if b0.is_zero() {
            (BigUint::zero(), a1.clone(), a1 * ts / &b1)
        } else if b1.is_zero() {
            (a0.clone(), BigUint::zero(), a0 * ts / &b0)
        } else {
            let needed1 = a0 * &b1 / &b0;
            let (used0, used1) =
                if &needed1 <= a1 { (a0.clone(), needed1) } else { (a1 * &b0 / &b1, a1.clone()) };
            let liquidity = (&used0 * ts / &b0).min(&used1 * ts / &b1);
            (used0, used1, liquidity)
        };
        Ok(AddLiquidityResult {
            liquidity,
            unused: vec![a0 - &used0, a1 - &used1],
            used: vec![used0, used1],
        })
    }

    fn remove_liquidity(&self, liquidity: &BigUint) -> Result<Vec<BigUint>, SimulationError> {
        if liquidity > &self.total_supply || self.total_supply.is_zero() {
            return Err(SimulationError::InsufficientLiquidity(format!(
                "cannot burn {liquidity} of {}",
                self.total_supply
            )));
        }
        Ok(self
            .balances()
            .iter()
            .map(|b| b * liquidity / &self.total_supply)
            .collect())
    }

    fn total_supply(&self) -> BigUint {
        self.total_supply.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::{models::Chain, Bytes};

    fn tokens() -> [Token; 2] {
        [
            Token::new(
                &Bytes::from_str("0x00000000000000000000000000000000000000a0").unwrap(),
                "A",
                18,
                Chain::Arbitrum,
            ),
            Token::new(
                &Bytes::from_str("0x00000000000000000000000000000000000000b0").unwrap(),
                "B",
                18,
                Chain::Arbitrum,
            ),
        ]
    }

    /// Price 1:1 with a symmetric range around it.
    fn pool(calm: bool) -> ConcentratedPool {
        let e18 = BigUint::from(10u64).pow(18);
        ConcentratedPool::new(
            Bytes::from_str("0x00000000000000000000000000000000000000cc").unwrap(),
            Bytes::from_str("0x00000000000000000000000000000000000000dd").unwrap(),
            tokens(),
            q96(),
            &e18 * 1000u32,
            Position {
                liquidity: &e18 * 100u32,
                sqrt_price_lower_x96: q96() * 9u32 / 10u32,
                sqrt_price_upper_x96: q96() * 10u32 / 9u32,
            },
            [BigUint::zero(), BigUint::zero()],
            &e18 * 10u32,
            500,
            calm,
        )
        .unwrap()
    }

    #[test]
    fn test_balances_symmetric_at_center() {
        let [b0, b1] = pool(true).balances();
        let diff = if b0 > b1 { &b0 - &b1 } else { &b1 - &b0 };

        assert!(b0 > BigUint::zero());
        assert!(diff * 1_000_000_000u32 < b0);
    }

    #[test]
    fn test_swap_fraction_half_at_center() {
        let (numerator, denominator) = pool(true).swap_fraction(0);
        let doubled = numerator * 2u32;
        let diff = if doubled > denominator { &doubled - &denominator } else { &denominator - &doubled };

        assert!(diff * 1_000_000_000u32 < denominator);
    }

    #[test]
    fn test_add_and_remove_proportional() {
        let pool = pool(true);
        let [b0, _] = pool.balances();
        let amount = &b0 / 10u32;

        let added = pool
            .add_liquidity(&[amount.clone(), &amount * 2u32])
            .unwrap();
        let removed = pool
            .remove_liquidity(&added.liquidity)
            .unwrap();

        assert_eq!(added.used[0], amount);
        assert!(added.unused[1] > &amount * 99u32 / 100u32);
        assert!(removed[0] <= amount && &removed[0] + 5u32 >= amount);
    }

    #[test]
    fn test_swap_moves_price() {
        let [a, b] = tokens();
        let pool = pool(false);
        let amount = BigUint::from(10u64).pow(18);

        let swap = pool.swap(&amount, &a, &b).unwrap();

        assert!(swap.amount_out < amount);
        assert!(swap.amount_out > &amount * 99u32 / 100u32);
        assert!(!pool.is_calm());
        assert!(pool
            .swap(&(&amount * 1_000_000u32), &a, &b)
            .is_err());
    }
}
