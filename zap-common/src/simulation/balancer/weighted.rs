use num_bigint::BigUint;
use num_traits::Zero;

use super::{
    fixed_point::{complement, div_down, div_up, mul_down, mul_up, one, pow_down, pow_up},
    scaling_factor,
};
use crate::{
    models::{token::Token, Address},
    simulation::{
        errors::SimulationError,
        pool::{check_amounts, AddLiquidityResult, LiquidityPool, PoolSwap, SingleSidedLiquidity},
    },
    Bytes,
};

/// Swaps may not take in more than 30% of the in balance.
const MAX_IN_RATIO: u64 = 300_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedPool {
    address: Address,
    pool_id: Bytes,
    tokens: Vec<Token>,
    balances: Vec<BigUint>,
    /// Normalized weights, summing to one in 18 decimals.
    weights: Vec<BigUint>,
    swap_fee: BigUint,
    total_supply: BigUint,
    scaling_factors: Vec<BigUint>,
}

impl WeightedPool {
    pub fn new(
        address: Address,
        pool_id: Bytes,
        tokens: Vec<Token>,
        balances: Vec<BigUint>,
        weights: Vec<BigUint>,
        swap_fee: BigUint,
        total_supply: BigUint,
    ) -> Result<Self, SimulationError> {
        if tokens.len() < 2 || tokens.len() != balances.len() || tokens.len() != weights.len() {
            return Err(SimulationError::InvalidInput(format!(
                "weighted pool {address} needs matching tokens, balances and weights"
            )));
        }
        let scaling_factors = tokens
            .iter()
            .map(|t| scaling_factor(t, &one()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            address,
            pool_id,
            tokens,
            balances,
            weights,
            swap_fee,
            total_supply,
            scaling_factors,
        })
    }

    pub fn pool_id(&self) -> &Bytes {
        &self.pool_id
    }

    fn upscaled(&self, amounts: &[BigUint]) -> Vec<BigUint> {
        amounts
            .iter()
            .zip(&self.scaling_factors)
            .map(|(a, f)| mul_down(a, f))
            .collect()
    }

    fn downscale_down(&self, amount: &BigUint, index: usize) -> Result<BigUint, SimulationError> {
        div_down(amount, &self.scaling_factors[index])
    }

    pub fn calc_out_given_in(
        balance_in: &BigUint,
        weight_in: &BigUint,
        balance_out: &BigUint,
        weight_out: &BigUint,
        amount_in: &BigUint,
    ) -> Result<BigUint, SimulationError> {
        if amount_in > &mul_down(balance_in, &BigUint::from(MAX_IN_RATIO)) {
            return Err(SimulationError::InsufficientLiquidity("max in ratio exceeded".to_string()));
        }
        let denominator = balance_in + amount_in;
        let base = div_up(balance_in, &denominator)?;
        let exponent = div_down(weight_in, weight_out)?;
        let power = pow_up(&base, &exponent)?;
        Ok(mul_down(balance_out, &complement(&power)))
    }

    /// BPT minted for `amounts_in`, charging the swap fee on the part exceeding a
    /// proportional join.
    pub fn calc_bpt_out_given_exact_tokens_in(
        &self,
        balances: &[BigUint],
        amounts_in: &[BigUint],
    ) -> Result<BigUint, SimulationError> {
        let one = one();
        let mut ratios_with_fee = Vec::with_capacity(balances.len());
        let mut invariant_ratio_with_fees = BigUint::zero();
        for ((balance, amount), weight) in balances.iter().zip(amounts_in).zip(&self.weights) {
            let ratio = div_down(&(balance + amount), balance)?;
            invariant_ratio_with_fees += mul_down(&ratio, weight);
            ratios_with_fee.push(ratio);
        }

        let mut invariant_ratio = one.clone();
        for (i, (balance, amount)) in balances.iter().zip(amounts_in).enumerate() {
            let amount_without_fee = if ratios_with_fee[i] > invariant_ratio_with_fees {
                let non_taxable = mul_down(balance, &(&invariant_ratio_with_fees - &one));
                let taxable = amount - &non_taxable;
                non_taxable + mul_down(&taxable, &complement(&self.swap_fee))
            } else {
                amount.clone()
            };
            let balance_ratio = div_down(&(balance + amount_without_fee), balance)?;
            invariant_ratio = mul_down(&invariant_ratio, &pow_down(&balance_ratio, &self.weights[i])?);
        }

        if invariant_ratio > one {
            Ok(mul_down(&self.total_supply, &(invariant_ratio - one)))
        } else {
            Ok(BigUint::zero())
        }
    }

    pub fn calc_token_out_given_exact_bpt_in(
        &self,
        balance: &BigUint,
        weight: &BigUint,
        bpt_in: &BigUint,
    ) -> Result<BigUint, SimulationError> {
        let invariant_ratio = div_up(&(&self.total_supply - bpt_in), &self.total_supply)?;
        let balance_ratio = pow_up(&invariant_ratio, &div_down(&one(), weight)?)?;
        let amount_out_without_fee = mul_down(balance, &complement(&balance_ratio));
        let taxable = mul_up(&amount_out_without_fee, &complement(weight));
        let non_taxable = &amount_out_without_fee - &taxable;
        Ok(non_taxable + mul_down(&taxable, &complement(&self.swap_fee)))
    }

    fn check_bpt_in(&self, bpt_in: &BigUint) -> Result<(), SimulationError> {
        if bpt_in > &self.total_supply || self.total_supply.is_zero() {
            return Err(SimulationError::InsufficientLiquidity(format!(
                "cannot burn {bpt_in} of {}",
                self.total_supply
            )));
        }
        Ok(())
    }
}

impl LiquidityPool for WeightedPool {
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
        let i = self.token_index(token_in)?;
        let j = self.token_index(token_out)?;
        if i == j {
            return Err(SimulationError::InvalidInput("cannot swap a token to itself".to_string()));
        }
        let balances = self.upscaled(&self.balances);
        let scaled_in = mul_down(amount_in, &self.scaling_factors[i]);
        let scaled_in = &scaled_in - mul_up(&scaled_in, &self.swap_fee);
        let scaled_out = Self::calc_out_given_in(
            &balances[i],
            &self.weights[i],
            &balances[j],
            &self.weights[j],
            &scaled_in,
        )?;
        let amount_out = self.downscale_down(&scaled_out, j)?;

        let mut new_state = self.clone();
        new_state.balances[i] += amount_in;
        new_state.balances[j] -= &amount_out;
        Ok(PoolSwap::new(amount_out, Box::new(new_state)))
    }

    fn add_liquidity(&self, amounts: &[BigUint]) -> Result<AddLiquidityResult, SimulationError> {
        check_amounts(self, amounts)?;
        let liquidity = self.calc_bpt_out_given_exact_tokens_in(
            &self.upscaled(&self.balances),
            &self.upscaled(amounts),
        )?;
        Ok(AddLiquidityResult {
            liquidity,
            used: amounts.to_vec(),
            unused: vec![BigUint::zero(); amounts.len()],
        })
    }

    fn remove_liquidity(&self, liquidity: &BigUint) -> Result<Vec<BigUint>, SimulationError> {
        self.check_bpt_in(liquidity)?;
        let ratio = div_down(liquidity, &self.total_supply)?;
        Ok(self
            .balances
            .iter()
            .map(|b| mul_down(b, &ratio))
            .collect())
    }

    fn total_supply(&self) -> BigUint {
        self.total_supply.clone()
    }

    fn as_single_sided(&self) -> Option<&dyn SingleSidedLiquidity> {
        Some(self)
    }
}

impl SingleSidedLiquidity for WeightedPool {
    fn add_liquidity_single(
        &self,
        amount: &BigUint,
        token_in: &Token,
    ) -> Result<BigUint, SimulationError> {
        let index = self.token_index(token_in)?;
        let mut amounts = vec![BigUint::zero(); self.tokens.len()];
        amounts[index] = amount.clone();
        Ok(self.add_liquidity(&amounts)?.liquidity)
    }

    fn remove_liquidity_single(
        &self,
        liquidity: &BigUint,
        token_out: &Token,
    ) -> Result<BigUint, SimulationError> {
        self.check_bpt_in(liquidity)?;
        let index = self.token_index(token_out)?;
        let balance = mul_down(&self.balances[index], &self.scaling_factors[index]);
        let scaled_out =
            self.calc_token_out_given_exact_bpt_in(&balance, &self.weights[index], liquidity)?;
        self.downscale_down(&scaled_out, index)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::models::Chain;

    fn e18(v: u64) -> BigUint {
        BigUint::from(v) * one()
    }

    fn tokens() -> Vec<Token> {
        vec![
            Token::new(
                &Bytes::from_str("0xba100000625a3754423978a60c9317c58a424e3d").unwrap(),
                "BAL",
                18,
                Chain::Ethereum,
            ),
            Chain::Ethereum.wrapped_native_token(),
        ]
    }

    /// 80/20 BAL/WETH pool at 0.25 WETH per BAL with a 1% fee.
    fn pool() -> WeightedPool {
        WeightedPool::new(
            Bytes::zero(20),
            Bytes::zero(32),
            tokens(),
            vec![e18(800_000), e18(50_000)],
            vec![one() * 8u32 / 10u32, one() * 2u32 / 10u32],
            one() / 100u32,
            e18(1_000_000),
        )
        .unwrap()
    }

    #[test]
    fn test_swap_close_to_spot_for_small_amounts() {
        let tokens = tokens();
        // Spot price: (50_000 / 0.2) / (800_000 / 0.8) = 0.25 WETH per BAL
        let swap = pool()
            .swap(&e18(100), &tokens[0], &tokens[1])
            .unwrap();

        assert!(swap.amount_out < e18(25) * 99u32 / 100u32);
        assert!(swap.amount_out > e18(24) * 98u32 / 100u32);
    }

    #[test]
    fn test_proportional_join_and_exit() {
        let pool = pool();
        let minted = pool
            .add_liquidity(&[e18(800), e18(50)])
            .unwrap()
            .liquidity;

        // A proportional join pays no fee: 0.1% of supply minus pow rounding.
        assert!(minted <= e18(1_000));
        assert!(minted > e18(999));

        let outputs = pool.remove_liquidity(&e18(1_000)).unwrap();
        assert_eq!(outputs, vec![e18(800), e18(50)]);
    }

    #[test]
    fn test_single_sided_exit_pays_fee() {
        let pool = pool();
        let tokens = tokens();

        let out = pool
            .remove_liquidity_single(&e18(1_000), &tokens[1])
            .unwrap();

        // Proportional value is 250 WETH (50 WETH + 800 BAL at 0.25).
        assert!(out < e18(250));
        assert!(out > e18(245));
        assert!(pool
            .remove_liquidity_single(&e18(2_000_000), &tokens[1])
            .is_err());
    }
}
