//! Vaults over Balancer V2 pools.
//!
//! Weighted and meta-stable pools join and exit through the Balancer vault. Composable stable
//! pools hold their own BPT, so single token joins and exits are vault swaps into or out of the
//! BPT and there is no proportional exit.

use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;
use zap_common::{
    errors::ZapError,
    models::{quote::StrategyId, token::Token, vault::Vault, zap::ZapStep, Address, Chain},
    simulation::{
        balancer::{
            stable::{StablePool, StablePoolKind},
            weighted::WeightedPool,
        },
        LiquidityPool,
    },
    traits::PoolStateReader,
    Bytes,
};
use zap_ethereum::calls::{
    balancer::{
        exit_pool_proportional_step, exit_pool_single_step, join_pool_step, swap_step, PoolCall,
        EXIT_EXACT_BPT_IN_FOR_TOKENS_OUT,
    },
    deadline_after,
};

use super::{
    helpers::ZapHelpers,
    pool::{LiquidityPoolStrategy, PoolCallContext, PoolProtocol},
};
use crate::config::BalancerPoolType;

#[derive(Debug, Clone)]
pub enum BalancerPool {
    Weighted(WeightedPool),
    Stable(StablePool),
}

impl BalancerPool {
    pub fn pool_id(&self) -> &Bytes {
        match self {
            BalancerPool::Weighted(pool) => pool.pool_id(),
            BalancerPool::Stable(pool) => pool.pool_id(),
        }
    }

    fn as_liquidity(&self) -> &dyn LiquidityPool {
        match self {
            BalancerPool::Weighted(pool) => pool,
            BalancerPool::Stable(pool) => pool,
        }
    }

    fn assets(&self) -> Vec<Address> {
        self.as_liquidity()
            .tokens()
            .iter()
            .map(|t| t.address.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct BalancerProtocol {
    /// The pool contract, also the BPT.
    pool: Address,
    balancer_vault: Address,
    pool_type: BalancerPoolType,
}

impl BalancerProtocol {
    fn is_composable(&self) -> bool {
        self.pool_type == BalancerPoolType::ComposableStable
    }

    fn call<'a>(&'a self, pool: &'a BalancerPool, call: &'a PoolCallContext<'_>) -> PoolCall<'a> {
        PoolCall { vault: &self.balancer_vault, pool_id: pool.pool_id(), account: call.router }
    }
}

#[async_trait]
impl PoolProtocol for BalancerProtocol {
    type Pool = BalancerPool;

    const STRATEGY_ID: StrategyId = StrategyId::Balancer;

    async fn load_pool(
        &self,
        pools: &dyn PoolStateReader,
        chain: Chain,
    ) -> Result<BalancerPool, ZapError> {
        let pool = match self.pool_type {
            BalancerPoolType::Weighted => {
                BalancerPool::Weighted(pools.weighted_pool(chain, &self.pool).await?)
            }
            BalancerPoolType::MetaStable | BalancerPoolType::ComposableStable => {
                let pool = pools.stable_pool(chain, &self.pool).await?;
                let composable = pool.kind() == StablePoolKind::ComposableStable;
                if composable != self.is_composable() {
                    return Err(ZapError::Config(format!(
                        "pool {} is {:?}, configured as {:?}",
                        self.pool,
                        pool.kind(),
                        self.pool_type
                    )));
                }
                BalancerPool::Stable(pool)
            }
        };
        Ok(pool)
    }

    fn liquidity(pool: &BalancerPool) -> &dyn LiquidityPool {
        pool.as_liquidity()
    }

    fn supports_proportional_exit(&self) -> bool {
        !self.is_composable()
    }

    fn add_single_step(
        &self,
        pool: &BalancerPool,
        call: &PoolCallContext<'_>,
        token_in: &Token,
        amount: &BigUint,
        min_liquidity: &BigUint,
    ) -> Result<ZapStep, ZapError> {
        let pool_call = self.call(pool, call);
        if self.is_composable() {
            return Ok(swap_step(
                &pool_call,
                &token_in.address,
                &self.pool,
                amount,
                min_liquidity,
                deadline_after(call.deadline_secs),
            )?);
        }
        let index = pool.as_liquidity().token_index(token_in)?;
        let mut amounts = vec![BigUint::zero(); pool.as_liquidity().tokens().len()];
        amounts[index] = amount.clone();
        Ok(join_pool_step(&pool_call, &pool.assets(), &amounts, min_liquidity)?)
    }

    fn remove_single_step(
        &self,
        pool: &BalancerPool,
        call: &PoolCallContext<'_>,
        token_out: &Token,
        liquidity: &BigUint,
        min_amount: &BigUint,
    ) -> Result<ZapStep, ZapError> {
        let pool_call = self.call(pool, call);
        if self.is_composable() {
            return Ok(swap_step(
                &pool_call,
                &self.pool,
                &token_out.address,
                liquidity,
                min_amount,
                deadline_after(call.deadline_secs),
            )?);
        }
        let index = pool.as_liquidity().token_index(token_out)?;
        Ok(exit_pool_single_step(
            &pool_call,
            &self.pool,
            &pool.assets(),
            liquidity,
            index,
            min_amount,
        )?)
    }

    fn remove_proportional_step(
        &self,
        pool: &BalancerPool,
        call: &PoolCallContext<'_>,
        liquidity: &BigUint,
        min_amounts: &[BigUint],
    ) -> Result<ZapStep, ZapError> {
        if self.is_composable() {
            return Err(ZapError::route_not_found(format!(
                "composable stable pool {} has no proportional exit",
                self.pool
            )));
        }
        Ok(exit_pool_proportional_step(
            &self.call(pool, call),
            &self.pool,
            &pool.assets(),
            liquidity,
            min_amounts,
            EXIT_EXACT_BPT_IN_FOR_TOKENS_OUT,
        )?)
    }
}

pub type BalancerStrategy = LiquidityPoolStrategy<BalancerProtocol>;

impl LiquidityPoolStrategy<BalancerProtocol> {
    pub fn new(
        vault: Vault,
        pool: &Address,
        balancer_vault: &Address,
        pool_type: BalancerPoolType,
        helpers: Arc<ZapHelpers>,
    ) -> Result<Self, ZapError> {
        let protocol = BalancerProtocol {
            pool: pool.clone(),
            balancer_vault: balancer_vault.clone(),
            pool_type,
        };
        Self::with_protocol(vault, protocol, helpers)
    }
}
