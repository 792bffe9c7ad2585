//! Curve StableSwap pools (plain pools, any number of coins).

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::{
    models::{token::Token, Address},
    simulation::{
        errors::SimulationError,
        pool::{check_amounts, AddLiquidityResult, LiquidityPool, PoolSwap, SingleSidedLiquidity},
    },
};

const A_PRECISION: u64 = 100;
const FEE_DENOMINATOR: u64 = 10_000_000_000;
const MAX_ITERATIONS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurvePool {
    address: Address,
    tokens: Vec<Token>,
    balances: Vec<BigUint>,
    /// Multipliers bringing each coin to 18 decimals.
    precision_multipliers: Vec<BigUint>,
    /// Amplification, already multiplied by `A_PRECISION`.
    amp: BigUint,
    /// Swap fee over `FEE_DENOMINATOR`.
    fee: BigUint,
    total_supply: BigUint,
}

impl CurvePool {
    pub fn new(
        address: Address,
        tokens: Vec<Token>,
        balances: Vec<BigUint>,
        amp: BigUint,
        fee: BigUint,
        total_supply: BigUint,
    ) -> Result<Self, SimulationError> {
        if tokens.len() < 2 || tokens.len() != balances.len() {
            return Err(SimulationError::InvalidInput(format!(
                "curve pool {address} needs matching tokens and balances"
            )));
        }
        let precision_multipliers = tokens
            .iter()
            .map(|t| {
                if t.decimals > 18 {
                    return Err(SimulationError::InvalidInput(format!(
                        "unsupported decimals {}",
                        t.decimals
                    )));
                }
                Ok(BigUint::from(10u32).pow(18 - t.decimals))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { address, tokens, balances, precision_multipliers, amp, fee, total_supply })
    }

    pub fn balances(&self) -> &[BigUint] {
        &self.balances
    }

    fn n_coins(&self) -> BigUint {
        BigUint::from(self.tokens.len())
    }

    fn xp(&self, balances: &[BigUint]) -> Vec<BigUint> {
        balances
            .iter()
            .zip(&self.precision_multipliers)
            .map(|(b, m)| b * m)
            .collect()
    }

    pub fn get_d(&self, xp: &[BigUint]) -> Result<BigUint, SimulationError> {
        let s: BigUint = xp.iter().sum();
        if s.is_zero() {
            return Ok(BigUint::zero());
        }
        let n = self.n_coins();
        let a_precision = BigUint::from(A_PRECISION);
        let ann = &self.amp * &n;
        let mut d = s.clone();
        for _ in 0..MAX_ITERATIONS {
            let mut d_p = d.clone();
            for x in xp {
                if x.is_zero() {
                    return Err(SimulationError::InsufficientLiquidity(
                        "empty coin balance".to_string(),
                    ));
                }
                d_p = d_p * &d / (x * &n);
            }
            let d_prev = d.clone();
            let numerator = (&ann * &s / &a_precision + &d_p * &n) * &d;
            let denominator =
                (&ann - &a_precision) * &d / &a_precision + (&n + BigUint::one()) * &d_p;
            d = numerator / denominator;
            if abs_diff(&d, &d_prev) <= BigUint::one() {
                return Ok(d);
            }
        }
        Err(SimulationError::Math("get_D did not converge".to_string()))
    }

    /// New balance of coin `j` when coin `i` is set to `x`, keeping D.
    pub fn get_y(
        &self,
        i: usize,
        j: usize,
        x: &BigUint,
        xp: &[BigUint],
    ) -> Result<BigUint, SimulationError> {
        let d = self.get_d(xp)?;
        let others = xp
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != j)
            .map(|(k, v)| if k == i { x.clone() } else { v.clone() })
            .collect::<Vec<_>>();
        self.solve_y(&others, &d)
    }

    /// Balance of coin `i` keeping every other coin fixed for invariant `d`.
    pub fn get_y_d(&self, i: usize, xp: &[BigUint], d: &BigUint) -> Result<BigUint, SimulationError> {
        let others = xp
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != i)
            .map(|(_, v)| v.clone())
            .collect::<Vec<_>>();
        self.solve_y(&others, d)
    }

    fn solve_y(&self, others: &[BigUint], d: &BigUint) -> Result<BigUint, SimulationError> {
        let n = self.n_coins();
        let a_precision = BigUint::from(A_PRECISION);
        let ann = &self.amp * &n;
        let mut c = d.clone();
        let mut s = BigUint::zero();
        for x in others {
            if x.is_zero() {
                return Err(SimulationError::InsufficientLiquidity("empty coin balance".to_string()));
            }
            s += x;
            c = c * d / (x * &n);
        }
        c = c * d * &a_precision / (&ann * &n);
        let b = s + d * &a_precision / &ann;
        let mut y = d.clone();
        for _ in 0..MAX_ITERATIONS {
            let y_prev = y.clone();
            let denominator = BigUint::from(2u32) * &y + &b;
            if &denominator <= d {
                return Err(SimulationError::Math("get_y left its domain".to_string()));
            }
            y = (&y * &y + &c) / (denominator - d);
            if abs_diff(&y, &y_prev) <= BigUint::one() {
                return Ok(y);
            }
        }
        Err(SimulationError::Math("get_y did not converge".to_string()))
    }

    pub fn get_dy(&self, i: usize, j: usize, dx: &BigUint) -> Result<BigUint, SimulationError> {
        let xp = self.xp(&self.balances);
        let x = &xp[i] + dx * &self.precision_multipliers[i];
        let y = self.get_y(i, j, &x, &xp)?;
        if xp[j] <= &y + BigUint::one() {
            return Err(SimulationError::InsufficientLiquidity("swap drains pool".to_string()));
        }
        let dy = &xp[j] - y - BigUint::one();
        let fee = &self.fee * &dy / BigUint::from(FEE_DENOMINATOR);
        Ok((dy - fee) / &self.precision_multipliers[j])
    }

    /// Fee charged on the imbalanced part of an add or one-coin remove.
    fn imbalance_fee(&self) -> BigUint {
        let n = self.tokens.len();
        &self.fee * BigUint::from(n) / BigUint::from(4 * (n - 1))
    }

    pub fn calc_token_amount(&self, amounts: &[BigUint]) -> Result<BigUint, SimulationError> {
        let old_balances = &self.balances;
        let d0 = self.get_d(&self.xp(old_balances))?;
        let new_balances: Vec<BigUint> = old_balances
            .iter()
            .zip(amounts)
            .map(|(b, a)| b + a)
            .collect();
        let d1 = self.get_d(&self.xp(&new_balances))?;
        if d1 <= d0 {
            return Err(SimulationError::InvalidInput("deposit does not increase D".to_string()));
        }
        if self.total_supply.is_zero() {
            return Ok(d1);
        }
        let fee = self.imbalance_fee();
        let fee_denominator = BigUint::from(FEE_DENOMINATOR);
        let balances_after_fee: Vec<BigUint> = old_balances
            .iter()
            .zip(&new_balances)
            .map(|(old, new)| {
                let ideal = &d1 * old / &d0;
                let difference = abs_diff(&ideal, new);
                new - &fee * difference / &fee_denominator
            })
            .collect();
        let d2 = self.get_d(&self.xp(&balances_after_fee))?;
        Ok(&self.total_supply * (d2 - &d0) / d0)
    }

    pub fn calc_withdraw_one_coin(
        &self,
        token_amount: &BigUint,
        i: usize,
    ) -> Result<BigUint, SimulationError> {
        if token_amount > &self.total_supply || self.total_supply.is_zero() {
            return Err(SimulationError::InsufficientLiquidity(format!(
                "cannot burn {token_amount} of {}",
                self.total_supply
            )));
        }
        let xp = self.xp(&self.balances);
        let d0 = self.get_d(&xp)?;
        let d1 = &d0 - token_amount * &d0 / &self.total_supply;
        let new_y = self.get_y_d(i, &xp, &d1)?;
        let fee = self.imbalance_fee();
        let fee_denominator = BigUint::from(FEE_DENOMINATOR);
        let xp_reduced: Vec<BigUint> = xp
            .iter()
            .enumerate()
            .map(|(j, x)| {
                let scaled = x * &d1 / &d0;
                let expected = if j == i { abs_diff(&scaled, &new_y) } else { x - &scaled };
                x - &fee * expected / &fee_denominator
            })
            .collect();
        let y = self.get_y_d(i, &xp_reduced, &d1)?;
        if xp_reduced[i] <= &y + BigUint::one() {
            return Ok(BigUint::zero());
        }
        let dy = &xp_reduced[i] - y - BigUint::one();
        Ok(dy / &self.precision_multipliers[i])
    }
}

fn abs_diff(a: &BigUint, b: &BigUint) -> BigUint {
    if a > b {
        a - b
    } else {
        b - a
    }
}

impl LiquidityPool for CurvePool {
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
            return Err(SimulationError::InvalidInput("cannot swap a coin to itself".to_string()));
        }
        let amount_out = self.get_dy(i, j, amount_in)?;
        let mut new_state = self.clone();
        new_state.balances[i] += amount_in;
        new_state.balances[j] -= &amount_out;
        Ok(PoolSwap::new(amount_out, Box::new(new_state)))
    }

    fn add_liquidity(&self, amounts: &[BigUint]) -> Result<AddLiquidityResult, SimulationError> {
        check_amounts(self, amounts)?;
        Ok(AddLiquidityResult {
            liquidity: self.calc_token_amount(amounts)?,
            used: amounts.to_vec(),
            unused: vec![BigUint::zero(); amounts.len()],
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
            .balances
            .iter()
            .map(|b| b * liquidity / &self.total_supply)
            .collect())
    }

    fn total_supply(&self) -> BigUint {
        self.total_supply.clone()
    }

    fn as_single_sided(&self) -> Option<&dyn SingleSidedLiquidity> {
        Some(self)
    }
}

impl SingleSidedLiquidity for CurvePool {
    fn add_liquidity_single(
        &self,
        amount: &BigUint,
        token_in: &Token,
    ) -> Result<BigUint, SimulationError> {
        let index = self.token_index(token_in)?;
        let mut amounts = vec![BigUint::zero(); self.tokens.len()];
        amounts[index] = amount.clone();
        self.calc_token_amount(&amounts)
    }

    fn remove_liquidity_single(
        &self,
        liquidity: &BigUint,
        token_out: &Token,
    ) -> Result<BigUint, SimulationError> {
        self.calc_withdraw_one_coin(liquidity, self.token_index(token_out)?)
    }
}
