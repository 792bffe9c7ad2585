use num_bigint::BigUint;
use num_traits::{One, Zero};

use super::{
    fixed_point::{complement, div_down, div_up, mul_down, mul_up, one},
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

const AMP_PRECISION: u64 = 1000;
const MAX_ITERATIONS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StablePoolKind {
    /// Joins and exits through `joinPool`/`exitPool`.
    MetaStable,
    /// BPT is one of the pool tokens; single token joins and exits are vault swaps.
    ComposableStable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StablePool {
    address: Address,
    pool_id: Bytes,
    kind: StablePoolKind,
    /// Pool tokens without the BPT.
    tokens: Vec<Token>,
    balances: Vec<BigUint>,
    /// Amplification multiplied by `AMP_PRECISION`.
    amp: BigUint,
    swap_fee: BigUint,
    /// Actual supply, or virtual supply for composable pools.
    total_supply: BigUint,
    scaling_factors: Vec<BigUint>,
}

impl StablePool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Address,
        pool_id: Bytes,
        kind: StablePoolKind,
        tokens: Vec<Token>,
        balances: Vec<BigUint>,
        rates: Vec<BigUint>,
        amp: BigUint,
        swap_fee: BigUint,
        total_supply: BigUint,
    ) -> Result<Self, SimulationError> {
        if tokens.len() < 2 || tokens.len() != balances.len() || tokens.len() != rates.len() {
            return Err(SimulationError::InvalidInput(format!(
                "stable pool {address} needs matching tokens, balances and rates"
            )));
        }
        let scaling_factors = tokens
            .iter()
            .zip(&rates)
            .map(|(t, rate)| scaling_factor(t, rate))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            address,
            pool_id,
            kind,
            tokens,
            balances,
            amp,
            swap_fee,
            total_supply,
            scaling_factors,
        })
    }

    pub fn pool_id(&self) -> &Bytes {
        &self.pool_id
    }

    pub fn kind(&self) -> StablePoolKind {
        self.kind
    }

    fn n(&self) -> BigUint {
        BigUint::from(self.tokens.len())
    }

    fn upscaled(&self, amounts: &[BigUint]) -> Vec<BigUint> {
        amounts
            .iter()
            .zip(&self.scaling_factors)
            .map(|(a, f)| mul_down(a, f))
            .collect()
    }

    pub fn calculate_invariant(&self, balances: &[BigUint]) -> Result<BigUint, SimulationError> {
        let sum: BigUint = balances.iter().sum();
        if sum.is_zero() {
            return Ok(BigUint::zero());
        }
        let n = self.n();
        let amp_precision = BigUint::from(AMP_PRECISION);
        let amp_times_total = &self.amp * &n;
        let mut invariant = sum.clone();
        for _ in 0..MAX_ITERATIONS {
            let mut d_p = invariant.clone();
            for balance in balances {
                if balance.is_zero() {
                    return Err(SimulationError::InsufficientLiquidity(
                        "empty token balance".to_string(),
                    ));
                }
                d_p = d_p * &invariant / (balance * &n);
            }
            let previous = invariant.clone();
            let numerator = (&amp_times_total * &sum / &amp_precision + &d_p * &n) * &invariant;
            let denominator = (&amp_times_total - &amp_precision) * &invariant / &amp_precision +
                (&n + BigUint::one()) * &d_p;
            invariant = numerator / denominator;
            if abs_diff(&invariant, &previous) <= BigUint::one() {
                return Ok(invariant);
            }
        }
        Err(SimulationError::Math("stable invariant did not converge".to_string()))
    }

    /// Balance of `index` such that the pool keeps `invariant` with all other balances fixed.
    pub fn token_balance_given_invariant(
        &self,
        balances: &[BigUint],
        invariant: &BigUint,
        index: usize,
    ) -> Result<BigUint, SimulationError> {
        let n = self.n();
        let amp_precision = BigUint::from(AMP_PRECISION);
        let amp_times_total = &self.amp * &n;
        let mut sum = balances[0].clone();
        let mut p_d = &balances[0] * &n;
        for balance in balances.iter().skip(1) {
            p_d = &p_d * balance * &n / invariant;
            sum += balance;
        }
        sum -= &balances[index];
        let invariant_squared = invariant * invariant;
        if p_d.is_zero() {
            return Err(SimulationError::InsufficientLiquidity("empty token balance".to_string()));
        }
        let c = ceil_div(&invariant_squared, &(&amp_times_total * &p_d)) *
            &amp_precision *
            &balances[index];
        let b = sum + invariant / &amp_times_total * &amp_precision;
        let mut balance = ceil_div(&(&invariant_squared + &c), &(invariant + &b));
        for _ in 0..MAX_ITERATIONS {
            let previous = balance.clone();
            let denominator = &balance * 2u32 + &b;
            if &denominator <= invariant {
                return Err(SimulationError::Math("stable balance left its domain".to_string()));
            }
            balance = ceil_div(&(&balance * &balance + &c), &(denominator - invariant));
            if abs_diff(&balance, &previous) <= BigUint::one() {
                return Ok(balance);
            }
        }
        Err(SimulationError::Math("stable balance did not converge".to_string()))
    }

    fn calc_out_given_in(
        &self,
        balances: &[BigUint],
        i: usize,
        j: usize,
        amount_in: &BigUint,
    ) -> Result<BigUint, SimulationError> {
        let invariant = self.calculate_invariant(balances)?;
        let mut balances = balances.to_vec();
        balances[i] += amount_in;
        let final_out = self.token_balance_given_invariant(&balances, &invariant, j)?;
        if balances[j] <= &final_out + BigUint::one() {
            return Err(SimulationError::InsufficientLiquidity("swap drains pool".to_string()));
        }
        Ok(&balances[j] - final_out - BigUint::one())
    }

    /// BPT out for upscaled `amounts_in`, charging the swap fee on the non proportional part.
    pub fn calc_bpt_out_given_exact_tokens_in(
        &self,
        balances: &[BigUint],
        amounts_in: &[BigUint],
    ) -> Result<BigUint, SimulationError> {
        let one = one();
        let sum: BigUint = balances.iter().sum();
        let mut ratios_with_fee = Vec::with_capacity(balances.len());
        let mut invariant_ratio_with_fees = BigUint::zero();
        for (balance, amount) in balances.iter().zip(amounts_in) {
            let weight = div_down(balance, &sum)?;
            let ratio = div_down(&(balance + amount), balance)?;
            invariant_ratio_with_fees += mul_down(&ratio, &weight);
            ratios_with_fee.push(ratio);
        }

        let new_balances = balances
            .iter()
            .zip(amounts_in)
            .enumerate()
            .map(|(i, (balance, amount))| {
                let amount_without_fee = if ratios_with_fee[i] > invariant_ratio_with_fees {
                    let non_taxable = mul_down(balance, &(&invariant_ratio_with_fees - &one));
                    let taxable = amount - &non_taxable;
                    non_taxable + mul_down(&taxable, &complement(&self.swap_fee))
                } else {
                    amount.clone()
                };
                balance + amount_without_fee
            })
            .collect::<Vec<_>>();

        let current_invariant = self.calculate_invariant(balances)?;
        let new_invariant = self.calculate_invariant(&new_balances)?;
        let invariant_ratio = div_down(&new_invariant, &current_invariant)?;
        if invariant_ratio > one {
            Ok(mul_down(&self.total_supply, &(invariant_ratio - one)))
        } else {
            Ok(BigUint::zero())
        }
    }

    pub fn calc_token_out_given_exact_bpt_in(
        &self,
        balances: &[BigUint],
        index: usize,
        bpt_in: &BigUint,
    ) -> Result<BigUint, SimulationError> {
        let current_invariant = self.calculate_invariant(balances)?;
        let new_invariant = mul_up(
            &div_up(&(&self.total_supply - bpt_in), &self.total_supply)?,
            &current_invariant,
        );
        let new_balance = self.token_balance_given_invariant(balances, &new_invariant, index)?;
        let amount_out_without_fee = &balances[index] - new_balance;
        let sum: BigUint = balances.iter().sum();
        let weight = div_down(&balances[index], &sum)?;
        let taxable = mul_up(&amount_out_without_fee, &complement(&weight));
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

fn abs_diff(a: &BigUint, b: &BigUint) -> BigUint {
    if a > b {
        a - b
    } else {
        b - a
    }
}

fn ceil_div(a: &BigUint, b: &BigUint) -> BigUint {
    if a.is_zero() {
        return BigUint::zero();
    }
    (a - BigUint::one()) / b + BigUint::one()
}

impl LiquidityPool for StablePool {
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
        let scaled_in = mul_down(amount_in, &self.scaling_factors[i]);
        let scaled_in = &scaled_in - mul_up(&scaled_in, &self.swap_fee);
        let scaled_out = self.calc_out_given_in(&self.upscaled(&self.balances), i, j, &scaled_in)?;
        let amount_out = div_down(&scaled_out, &self.scaling_factors[j])?;

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

impl SingleSidedLiquidity for StablePool {
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
        let scaled_out = self.calc_token_out_given_exact_bpt_in(
            &self.upscaled(&self.balances),
            index,
            liquidity,
        )?;
        div_down(&scaled_out, &self.scaling_factors[index])
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

    fn e6(v: u64) -> BigUint {
        BigUint::from(v) * BigUint::from(1_000_000u32)
    }

    fn tokens() -> Vec<Token> {
        vec![
            Token::new(
                &Bytes::from_str("0x6b175474e89094c44da98b954eedeac495271d0f").unwrap(),
                "DAI",
                18,
                Chain::Ethereum,
            ),
            Token::new(
                &Bytes::from_str("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap(),
                "USDC",
                6,
                Chain::Ethereum,
            ),
        ]
    }

    fn pool() -> StablePool {
        StablePool::new(
            Bytes::zero(20),
            Bytes::zero(32),
            StablePoolKind::ComposableStable,
            tokens(),
            vec![e18(1_000_000), e6(1_000_000)],
            vec![one(), one()],
            BigUint::from(200u32 * AMP_PRECISION as u32),
            one() / 10_000u32,
            e18(2_000_000),
        )
        .unwrap()
    }

    #[test]
    fn test_balanced_invariant_is_sum() {
        let pool = pool();
        let invariant = pool
            .calculate_invariant(&pool.upscaled(&pool.balances))
            .unwrap();

        assert_eq!(invariant, e18(2_000_000));
    }

    #[test]
    fn test_swap_near_peg() {
        let tokens = tokens();
        let swap = pool()
            .swap(&e6(1_000), &tokens[1], &tokens[0])
            .unwrap();

        assert!(swap.amount_out < e18(1_000));
        assert!(swap.amount_out > e18(999));
    }

    #[test]
    fn test_single_token_join_then_exit() {
        let pool = pool();
        let tokens = tokens();

        let minted = pool
            .add_liquidity_single(&e18(10_000), &tokens[0])
            .unwrap();
        let out = pool
            .remove_liquidity_single(&minted, &tokens[0])
            .unwrap();

        assert!(minted < e18(10_000) && minted > e18(9_990));
        assert!(out < e18(10_000) && out > e18(9_980));
    }
}
