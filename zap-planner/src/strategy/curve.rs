//! Vaults over Curve stable swap pools.

use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;
use zap_common::{
    errors::ZapError,
    models::{quote::StrategyId, token::Token, vault::Vault, zap::ZapStep, Address, Chain},
    simulation::{curve::CurvePool, LiquidityPool},
    traits::PoolStateReader,
};
use zap_ethereum::calls::curve::{
    add_liquidity_step, remove_liquidity_one_coin_step, remove_liquidity_step,
};

use super::{
    helpers::ZapHelpers,
    pool::{LiquidityPoolStrategy, PoolCallContext, PoolProtocol},
};

#[derive(Debug, Clone)]
pub struct CurveProtocol {
    pool: Address,
}

fn coins(pool: &CurvePool) -> Vec<Address> {
    pool.tokens()
        .iter()
        .map(|t| t.address.clone())
        .collect()
}

#[async_trait]
impl PoolProtocol for CurveProtocol {
    type Pool = CurvePool;

    const STRATEGY_ID: StrategyId = StrategyId::Curve;

    async fn load_pool(
        &self,
        pools: &dyn PoolStateReader,
        chain: Chain,
    ) -> Result<CurvePool, ZapError> {
        Ok(pools.curve_pool(chain, &self.pool).await?)
    }

    fn liquidity(pool: &CurvePool) -> &dyn LiquidityPool {
        pool
    }

    fn supports_proportional_exit(&self) -> bool {
        true
    }

    fn add_single_step(
        &self,
        pool: &CurvePool,
        _call: &PoolCallContext<'_>,
        token_in: &Token,
        amount: &BigUint,
        min_liquidity: &BigUint,
    ) -> Result<ZapStep, ZapError> {
        let index = pool.token_index(token_in)?;
        let mut amounts = vec![BigUint::zero(); pool.tokens().len()];
        amounts[index] = amount.clone();
        Ok(add_liquidity_step(&self.pool, &coins(pool), &amounts, min_liquidity)?)
    }

    fn remove_single_step(
        &self,
        pool: &CurvePool,
        call: &PoolCallContext<'_>,
        token_out: &Token,
        liquidity: &BigUint,
        min_amount: &BigUint,
    ) -> Result<ZapStep, ZapError> {
        Ok(remove_liquidity_one_coin_step(
            &self.pool,
            &call.lp_token.address,
            liquidity,
            pool.token_index(token_out)?,
            min_amount,
        )?)
    }

    fn remove_proportional_step(
        &self,
        _pool: &CurvePool,
        call: &PoolCallContext<'_>,
        liquidity: &BigUint,
        min_amounts: &[BigUint],
    ) -> Result<ZapStep, ZapError> {
        Ok(remove_liquidity_step(&self.pool, &call.lp_token.address, liquidity, min_amounts)?)
    }
}

pub type CurveStrategy = LiquidityPoolStrategy<CurveProtocol>;

impl LiquidityPoolStrategy<CurveProtocol> {
    pub fn new(vault: Vault, pool: &Address, helpers: Arc<ZapHelpers>) -> Result<Self, ZapError> {
        Self::with_protocol(vault, CurveProtocol { pool: pool.clone() }, helpers)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use zap_common::{
        models::{
            quote::{OptionRoute, SelectionOrder, SwapProvider, ZapOption, ZapQuoteStep},
            token::{InputTokenAmount, TokenAmount},
            zap::ZapAction,
        },
        simulation::SingleSidedLiquidity,
        traits::{MockPoolStateReader, MockSwapAggregator},
        Bytes,
    };

    use super::*;
    use crate::{
        strategy::ZapStrategy,
        test_fixtures::{helpers_with_pools, standard_vault, step_context, token, usdc},
    };

    fn e18(v: u64) -> BigUint {
        BigUint::from(v) * BigUint::from(10u64).pow(18)
    }

    fn e6(v: u64) -> BigUint {
        BigUint::from(v) * BigUint::from(10u64).pow(6)
    }

    fn pool_address() -> Address {
        Bytes::from_str("0x00000000000000000000000000000000000000c0").unwrap()
    }

    fn lp_token() -> Token {
        token("c1", "crvUSD-LP", 18)
    }

    fn curve_pool(usdc_balance: BigUint) -> CurvePool {
        CurvePool::new(
            pool_address(),
            vec![token("dd", "DAI", 18), usdc()],
            vec![e18(1_000_000), usdc_balance],
            BigUint::from(200_000u32),
            BigUint::from(4_000_000u32),
            e18(2_000_000),
        )
        .unwrap()
    }

    fn strategy(pools: MockPoolStateReader) -> CurveStrategy {
        let helpers = helpers_with_pools(MockSwapAggregator::new(), pools);
        let vault = standard_vault("curve-usd", lp_token(), dec!(1));
        CurveStrategy::new(vault, &pool_address(), Arc::new(helpers)).unwrap()
    }

    fn usdc_option(strategy: &CurveStrategy) -> ZapOption {
        ZapOption::new(
            StrategyId::Curve,
            &strategy.vault().id,
            Chain::Base,
            ZapAction::Deposit,
            vec![usdc()],
            vec![strategy.vault().share_token.clone()],
            SelectionOrder::TokenOfPool,
            OptionRoute::Swap { via: SwapProvider::Pool, via_token: usdc() },
        )
    }

    #[tokio::test]
    async fn test_pool_token_deposit_mints_simulated_liquidity() {
        let mut pools = MockPoolStateReader::new();
        pools
            .expect_curve_pool()
            .returning(|_, _| Ok(curve_pool(e6(1_000_000))));
        let strategy = strategy(pools);
        let option = usdc_option(&strategy);
        let inputs = vec![InputTokenAmount::new(usdc(), dec!(1000), false)];

        let quote = strategy
            .fetch_deposit_quote(&inputs, &option)
            .await
            .unwrap();

        let pool = curve_pool(e6(1_000_000));
        let single = pool
            .add_liquidity_single(&e6(1000), &usdc())
            .unwrap();
        let balanced = pool
            .add_liquidity(&[BigUint::zero(), e6(1000)])
            .unwrap()
            .liquidity;
        let ZapQuoteStep::Build { output, .. } = &quote.steps[0] else {
            panic!("expected a build step, got {:?}", quote.steps[0]);
        };
        assert_eq!(output, &TokenAmount::from_wei(lp_token(), &single).unwrap());
        assert!(output.to_wei().unwrap() <= balanced);
        assert_eq!(quote.outputs[0].amount, output.amount);
    }

    #[tokio::test]
    async fn test_deposit_order_adds_then_deposits() {
        let mut pools = MockPoolStateReader::new();
        pools
            .expect_curve_pool()
            .returning(|_, _| Ok(curve_pool(e6(1_000_000))));
        let strategy = strategy(pools);
        let option = usdc_option(&strategy);
        let inputs = vec![InputTokenAmount::new(usdc(), dec!(1000), false)];
        let quote = strategy
            .fetch_deposit_quote(&inputs, &option)
            .await
            .unwrap();

        let order = strategy
            .fetch_deposit_step(&quote, &step_context(dec!(0.01)))
            .await
            .unwrap();

        assert_eq!(order.steps.len(), 2);
        assert_eq!(order.steps[0].target, pool_address());
        assert_eq!(order.steps[1].target, strategy.vault().address);
        assert_eq!(order.outputs[0].token, strategy.vault().share_token.address);
    }

    #[tokio::test]
    async fn test_moved_pool_fails_build_with_quote_changed() {
        let mut pools = MockPoolStateReader::new();
        let mut seq = mockall::Sequence::new();
        pools
            .expect_curve_pool()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(curve_pool(e6(1_000_000))));
        // USDC flooded the pool between quote and build
        pools
            .expect_curve_pool()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(curve_pool(e6(4_000_000))));
        let strategy = strategy(pools);
        let option = usdc_option(&strategy);
        let inputs = vec![InputTokenAmount::new(usdc(), dec!(1000), false)];
        let quote = strategy
            .fetch_deposit_quote(&inputs, &option)
            .await
            .unwrap();

        let err = strategy
            .fetch_deposit_step(&quote, &step_context(dec!(0.01)))
            .await
            .unwrap_err();

        assert!(err.is_stale_quote(), "{err}");
    }

    #[tokio::test]
    async fn test_proportional_withdraw_splits_into_every_coin() {
        let mut pools = MockPoolStateReader::new();
        pools
            .expect_curve_pool()
            .returning(|_, _| Ok(curve_pool(e6(1_000_000))));
        let strategy = strategy(pools);
        let option = ZapOption::new(
            StrategyId::Curve,
            &strategy.vault().id,
            Chain::Base,
            ZapAction::Withdraw,
            vec![strategy.vault().share_token.clone()],
            vec![token("dd", "DAI", 18), usdc()],
            SelectionOrder::AllTokensInPool,
            OptionRoute::AllTokens,
        );
        let share = strategy.vault().share_token.clone();
        let inputs = vec![InputTokenAmount::new(share, dec!(20000), false)];

        let quote = strategy
            .fetch_withdraw_quote(&inputs, &option)
            .await
            .unwrap();
        let order = strategy
            .fetch_withdraw_step(&quote, &step_context(dec!(0.01)))
            .await
            .unwrap();

        // 1% of the pool's supply
        assert_eq!(
            quote.outputs,
            vec![
                TokenAmount::new(token("dd", "DAI", 18), dec!(10000)),
                TokenAmount::new(usdc(), dec!(10000)),
            ]
        );
        assert_eq!(order.steps.len(), 2);
        assert_eq!(order.steps[1].target, pool_address());
        assert_eq!(order.outputs.len(), 4);
    }
}
