//! Constant product pairs (Uniswap V2 and volatile Solidly forks).

use num_bigint::BigUint;
use num_traits::Zero;

use crate::{
    models::{token::Token, Address},
    simulation::{
        errors::SimulationError,
        pool::{check_amounts, AddLiquidityResult, LiquidityPool, PoolSwap, SingleSidedLiquidity},
    },
};

/// Liquidity burned on the first mint.
const MINIMUM_LIQUIDITY: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantProductPool {
    address: Address,
    tokens: Vec<Token>,
    reserves: [BigUint; 2],
    total_supply: BigUint,
    /// Amount kept after fee is `amount * fee_numerator / fee_denominator`.
    fee_numerator: u32,
    fee_denominator: u32,
}

impl ConstantProductPool {
    pub fn new(
        address: Address,
        tokens: [Token; 2],
        reserves: [BigUint; 2],
        total_supply: BigUint,
        fee_numerator: u32,
        fee_denominator: u32,
    ) -> Result<Self, SimulationError> {
        if fee_numerator == 0 || fee_numerator > fee_denominator {
            return Err(SimulationError::InvalidInput(format!(
                "invalid fee {fee_numerator}/{fee_denominator}"
            )));
        }
        Ok(Self {
            address,
            tokens: tokens.to_vec(),
            reserves,
            total_supply,
            fee_numerator,
            fee_denominator,
        })
    }

    pub fn reserves(&self) -> &[BigUint; 2] {
        &self.reserves
    }

    /// Swap fee as `(numerator, denominator)` of the input taken by the pool.
    pub fn fee(&self) -> (u32, u32) {
        (self.fee_denominator - self.fee_numerator, self.fee_denominator)
    }

    pub fn get_amount_out(
        &self,
        amount_in: &BigUint,
        index_in: usize,
    ) -> Result<BigUint, SimulationError> {
        let (reserve_in, reserve_out) = self.ordered_reserves(index_in);
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(SimulationError::InsufficientLiquidity(format!(
                "pool {} has no reserves",
                self.address
            )));
        }
        let amount_in_with_fee = amount_in * self.fee_numerator;
        let numerator = &amount_in_with_fee * reserve_out;
        let denominator = reserve_in * self.fee_denominator + amount_in_with_fee;
        Ok(numerator / denominator)
    }

    /// Amount of `index_in` to swap so the remainder and the swap output can be added to the
    /// pool in its current ratio.
    ///
    /// s = (sqrt(((d + n) r)^2 + 4 n d a r) - (d + n) r) / (2 n), with the fee kept ratio
    /// n / d, reserve in r and amount a.
    pub fn optimal_swap_amount(&self, amount_in: &BigUint, index_in: usize) -> BigUint {
        let (reserve_in, _) = self.ordered_reserves(index_in);
        let n = BigUint::from(self.fee_numerator);
        let d = BigUint::from(self.fee_denominator);
        let dn_r = (&d + &n) * reserve_in;
        let discriminant = &dn_r * &dn_r + BigUint::from(4u32) * &n * &d * amount_in * reserve_in;
        let root = discriminant.sqrt();
        if root <= dn_r {
            return BigUint::zero();
        }
        (root - dn_r) / (BigUint::from(2u32) * n)
    }

    /// Router `quote`: amount of the other token matching `amount` at the current ratio.
    pub fn quote(&self, amount: &BigUint, index: usize) -> Result<BigUint, SimulationError> {
        let (reserve_a, reserve_b) = self.ordered_reserves(index);
        if reserve_a.is_zero() {
            return Err(SimulationError::InsufficientLiquidity("empty reserves".to_string()));
        }
        Ok(amount * reserve_b / reserve_a)
    }

    /// Amounts paid out for burning `liquidity`, together with the pool after the burn.
    pub fn burn(&self, liquidity: &BigUint) -> Result<(Vec<BigUint>, Self), SimulationError> {
        let removed = self.remove_liquidity(liquidity)?;
        let reserves = [&self.reserves[0] - &removed[0], &self.reserves[1] - &removed[1]];
        let after = self.with_changes(reserves, &self.total_supply - liquidity);
        Ok((removed, after))
    }

    fn ordered_reserves(&self, index_in: usize) -> (&BigUint, &BigUint) {
        if index_in == 0 {
            (&self.reserves[0], &self.reserves[1])
        } else {
            (&self.reserves[1], &self.reserves[0])
        }
    }

    fn with_changes(&self, reserves: [BigUint; 2], total_supply: BigUint) -> Self {
        Self { reserves, total_supply, ..self.clone() }
    }
}

impl LiquidityPool for ConstantProductPool {
    fn address(&self) -> &Address {
        &self.address
    }

    fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    fn swap(
        &self,
        amount_in: &BigUint,
        token_in: &Token,
        token_out: &Token,
    ) -> Result<PoolSwap, SimulationError> {
        let index_in = self.token_index(token_in)?;
        let index_out = self.token_index(token_out)?;
        if index_in == index_out {
            return Err(SimulationError::InvalidInput("cannot swap a token to itself".to_string()));
        }
        let amount_out = self.get_amount_out(amount_in, index_in)?;
        let mut reserves = self.reserves.clone();
        reserves[index_in] += amount_in;
        reserves[index_out] -= &amount_out;
        let new_state = self.with_changes(reserves, self.total_supply.clone());
        Ok(PoolSwap::new(amount_out, Box::new(new_state)))
    }

    fn add_liquidity(&self, amounts: &[BigUint]) -> Result<AddLiquidityResult, SimulationError> {
        check_amounts(self, amounts)?;
        let (a0, a1) = (&amounts[0], &amounts[1]);
        let [r0, r1] = &self.reserves;

        let (used0, used1, liquidity) = if self.total_supply.is_zero() {
            let liquidity = (a0 * a1).sqrt();
            let minimum = BigUint::from(MINIMUM_LIQUIDITY);
            if liquidity <= minimum {
                return Err(SimulationError::InsufficientLiquidity(
                    "initial liquidity below minimum".to_string(),
                ));
            }
            (a0.clone(), a1.clone(), liquidity - minimum)
        } else {
            let optimal1 = self.quote(a0, 0)?;
            let (used0, used1) = if &optimal1 <= a1 {
                (a0.clone(), optimal1)
            } else {
                (self.quote(a1, 1)?, a1.clone())
            };
            let liquidity = (&used0 * &self.total_supply / r0).min(&used1 * &self.total_supply / r1);
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
            .reserves
            .iter()
            .map(|r| liquidity * r / &self.total_supply)
            .collect())
    }

    fn total_supply(&self) -> BigUint {
        self.total_supply.clone()
    }

    fn as_single_sided(&self) -> Option<&dyn SingleSidedLiquidity> {
        Some(self)
    }
}

impl SingleSidedLiquidity for ConstantProductPool {
    fn add_liquidity_single(
        &self,
        amount: &BigUint,
        token_in: &Token,
    ) -> Result<BigUint, SimulationError> {
        let index_in = self.token_index(token_in)?;
        let index_out = 1 - index_in;
        let swap_amount = self.optimal_swap_amount(amount, index_in);
        let swap = self.swap(&swap_amount, token_in, &self.tokens[index_out])?;
        let mut amounts = vec![BigUint::zero(), BigUint::zero()];
        amounts[index_in] = amount - &swap_amount;
        amounts[index_out] = swap.amount_out;
        Ok(swap
            .new_state
            .add_liquidity(&amounts)?
            .liquidity)
    }

    fn remove_liquidity_single(
        &self,
        liquidity: &BigUint,
        token_out: &Token,
    ) -> Result<BigUint, SimulationError> {
        let index_out = self.token_index(token_out)?;
        let index_in = 1 - index_out;
        let (removed, after) = self.burn(liquidity)?;
        let swapped = after.swap(&removed[index_in], &self.tokens[index_in], token_out)?;
        Ok(&removed[index_out] + swapped.amount_out)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use num_bigint::BigUint;
    use rstest::rstest;

    use super::*;
    use crate::{models::Chain, Bytes};

    fn tokens() -> [Token; 2] {
        [
            Token::new(
                &Bytes::from_str("0x00000000000000000000000000000000000000a0").unwrap(),
                "A",
                18,
                Chain::Ethereum,
            ),
            Token::new(
                &Bytes::from_str("0x00000000000000000000000000000000000000b0").unwrap(),
                "B",
                6,
                Chain::Ethereum,
            ),
        ]
    }

    fn pool() -> ConstantProductPool {
        ConstantProductPool::new(
            Bytes::zero(20),
            tokens(),
            [BigUint::from(1_000_000u64), BigUint::from(2_000_000u64)],
            BigUint::from(1_000_000u64),
            997,
            1000,
        )
        .unwrap()
    }

    #[rstest]
    #[case::a_to_b(0, 1000, 1992)]
    #[case::b_to_a(1, 1000, 498)]
    fn test_get_amount_out(#[case] index_in: usize, #[case] amount: u64, #[case] expected: u64) {
        assert_eq!(
            pool()
                .get_amount_out(&BigUint::from(amount), index_in)
                .unwrap(),
            BigUint::from(expected)
        );
    }

    #[test]
    fn test_swap_moves_reserves() {
        let [a, b] = tokens();
        let swap = pool()
            .swap(&BigUint::from(1000u32), &a, &b)
            .unwrap();
        let second = swap
            .new_state
            .swap(&BigUint::from(1000u32), &a, &b)
            .unwrap();

        assert_eq!(swap.amount_out, BigUint::from(1992u32));
        assert!(second.amount_out < swap.amount_out);
    }

    #[test]
    fn test_add_liquidity_keeps_ratio() {
        let result = pool()
            .add_liquidity(&[BigUint::from(1000u32), BigUint::from(5000u32)])
            .unwrap();

        assert_eq!(result.used, vec![BigUint::from(1000u32), BigUint::from(2000u32)]);
        assert_eq!(result.unused, vec![BigUint::zero(), BigUint::from(3000u32)]);
        assert_eq!(result.liquidity, BigUint::from(1000u32));
    }

    #[test]
    fn test_optimal_swap_leaves_little_unused() {
        let pool = pool();
        let [a, b] = tokens();
        let amount = BigUint::from(100_000u32);

        let swap_amount = pool.optimal_swap_amount(&amount, 0);
        let swap = pool.swap(&swap_amount, &a, &b).unwrap();
        let added = swap
            .new_state
            .add_liquidity(&[&amount - &swap_amount, swap.amount_out])
            .unwrap();

        // A bit less than half is swapped, only rounding dust stays unused.
        assert!(swap_amount > BigUint::from(48_000u32) && swap_amount < BigUint::from(50_000u32));
        assert!(added.unused.iter().all(|u| u <= &BigUint::from(10u32)));
        assert_eq!(
            pool.add_liquidity_single(&amount, &a)
                .unwrap(),
            added.liquidity
        );
    }

    #[test]
    fn test_remove_liquidity_single() {
        let pool = pool();
        let [a, _] = tokens();
        let liquidity = BigUint::from(10_000u32);

        let removed = pool.remove_liquidity(&liquidity).unwrap();
        let single = pool
            .remove_liquidity_single(&liquidity, &a)
            .unwrap();

        assert_eq!(removed, vec![BigUint::from(10_000u32), BigUint::from(20_000u32)]);
        assert!(single > removed[0] && single < BigUint::from(20_000u32));
    }

    #[test]
    fn test_rejects_unknown_token() {
        let [a, _] = tokens();
        let other = Chain::Ethereum.wrapped_native_token();

        assert!(pool()
            .swap(&BigUint::from(1u8), &a, &other)
            .is_err());
    }
}
