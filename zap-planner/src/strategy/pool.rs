//! Vaults over multi token pools that accept and release liquidity in any single pool token.
//!
//! The route logic is shared; a [`PoolProtocol`] supplies the pool state and the calls of one
//! pool family.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use num_bigint::BigUint;
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use zap_common::{
    errors::ZapError,
    models::{
        quote::{OptionRoute, SelectionOrder, StrategyId, SwapProvider, ZapOption, ZapQuote, ZapQuoteStep},
        token::{InputTokenAmount, Token, TokenAmount},
        vault::{Vault, VaultKind},
        zap::{ZapAction, ZapOrder, ZapStep},
        Address, Chain,
    },
    simulation::{LiquidityPool, SingleSidedLiquidity},
    traits::{PoolStateReader, VaultAdapter},
    zap::{math::slip_amount, Balances},
};

use super::{
    helpers::{
        build_order, check_min_output, finalize_quote, input_ratio, unsupported_route,
        validate_inputs, vault_deposit_leg, vault_deposit_quote, vault_withdraw_leg,
        vault_withdraw_quote, ZapHelpers,
    },
    swap::{
        aggregator_options, aggregator_quote_step, fetch_best_quotes, fetch_quoted_swap_leg,
        fetch_supported_tokens,
    },
    ComposableStrategy, StepContext, UserlessZapBreakdown, ZapStrategy,
};

/// Accounts and timing shared by every pool call of one build.
#[derive(Debug, Clone)]
pub struct PoolCallContext<'a> {
    pub router: &'a Address,
    pub lp_token: &'a Token,
    pub deadline_secs: u64,
}

#[async_trait]
pub trait PoolProtocol: Send + Sync + fmt::Debug + 'static {
    type Pool: Send + Sync;

    const STRATEGY_ID: StrategyId;

    /// Reads the pool again; never cached between calls.
    async fn load_pool(
        &self,
        pools: &dyn PoolStateReader,
        chain: Chain,
    ) -> Result<Self::Pool, ZapError>;

    fn liquidity(pool: &Self::Pool) -> &dyn LiquidityPool;

    fn supports_proportional_exit(&self) -> bool;

    fn add_single_step(
        &self,
        pool: &Self::Pool,
        call: &PoolCallContext<'_>,
        token_in: &Token,
        amount: &BigUint,
        min_liquidity: &BigUint,
    ) -> Result<ZapStep, ZapError>;

    fn remove_single_step(
        &self,
        pool: &Self::Pool,
        call: &PoolCallContext<'_>,
        token_out: &Token,
        liquidity: &BigUint,
        min_amount: &BigUint,
    ) -> Result<ZapStep, ZapError>;

    fn remove_proportional_step(
        &self,
        pool: &Self::Pool,
        call: &PoolCallContext<'_>,
        liquidity: &BigUint,
        min_amounts: &[BigUint],
    ) -> Result<ZapStep, ZapError>;
}

fn single_sided(pool: &dyn LiquidityPool) -> Result<&dyn SingleSidedLiquidity, ZapError> {
    pool.as_single_sided()
        .ok_or_else(|| {
            ZapError::route_not_found(format!("pool {} has no single sided liquidity", pool.address()))
        })
}

#[derive(Debug)]
pub struct LiquidityPoolStrategy<P> {
    vault: Vault,
    protocol: P,
    adapter: Arc<dyn VaultAdapter>,
    helpers: Arc<ZapHelpers>,
}

impl<P: PoolProtocol> LiquidityPoolStrategy<P> {
    pub(super) fn with_protocol(
        vault: Vault,
        protocol: P,
        helpers: Arc<ZapHelpers>,
    ) -> Result<Self, ZapError> {
        if vault.kind == VaultKind::Cowcentrated {
            return Err(ZapError::Config(format!("{} is not a pool token vault", vault.id)));
        }
        let adapter = helpers.vault_adapter(&vault)?;
        Ok(Self { vault, protocol, adapter, helpers })
    }

    fn lp_token(&self) -> &Token {
        self.adapter.deposit_token()
    }

    async fn load(&self) -> Result<P::Pool, ZapError> {
        self.protocol
            .load_pool(self.helpers.pools.as_ref(), self.vault.chain)
            .await
    }

    fn option(
        &self,
        action: ZapAction,
        tokens: Vec<Token>,
        selection_order: SelectionOrder,
        route: OptionRoute,
    ) -> ZapOption {
        let share = self.adapter.share_token().clone();
        let (inputs, outputs) = match action {
            ZapAction::Deposit => (tokens, vec![share]),
            ZapAction::Withdraw => (vec![share], tokens),
        };
        ZapOption::new(
            P::STRATEGY_ID,
            &self.vault.id,
            self.vault.chain,
            action,
            inputs,
            outputs,
            selection_order,
            route,
        )
    }

    async fn options(&self, action: ZapAction) -> Result<Vec<ZapOption>, ZapError> {
        let pool = self.load().await?;
        let tokens = P::liquidity(&pool).tokens().to_vec();
        let mut options = vec![self.option(
            action,
            vec![self.lp_token().clone()],
            SelectionOrder::VaultToken,
            OptionRoute::Direct,
        )];
        if action == ZapAction::Withdraw && self.protocol.supports_proportional_exit() {
            options.push(self.option(
                action,
                tokens.clone(),
                SelectionOrder::AllTokensInPool,
                OptionRoute::AllTokens,
            ));
        }
        options.extend(tokens.iter().map(|token| {
            self.option(
                action,
                vec![token.clone()],
                SelectionOrder::TokenOfPool,
                OptionRoute::Swap { via: SwapProvider::Pool, via_token: token.clone() },
            )
        }));
        let supported =
            fetch_supported_tokens(&self.helpers, &tokens, &self.vault.id, self.vault.chain).await;
        let mut exclude = tokens;
        exclude.push(self.lp_token().clone());
        options.extend(aggregator_options(
            P::STRATEGY_ID,
            &self.vault.id,
            action,
            self.adapter.share_token(),
            supported,
            &exclude,
        ));
        Ok(options)
    }

    fn quote_add(
        &self,
        pool: &dyn LiquidityPool,
        amount: &TokenAmount,
    ) -> Result<(ZapQuoteStep, TokenAmount), ZapError> {
        let minted = single_sided(pool)?.add_liquidity_single(&amount.to_wei()?, &amount.token)?;
        let liquidity = TokenAmount::from_wei(self.lp_token().clone(), &minted)?;
        Ok((ZapQuoteStep::Build { inputs: vec![amount.clone()], output: liquidity.clone() }, liquidity))
    }

    fn quote_remove(
        &self,
        pool: &dyn LiquidityPool,
        liquidity: &TokenAmount,
        token_out: &Token,
    ) -> Result<(ZapQuoteStep, TokenAmount), ZapError> {
        let amount = single_sided(pool)?.remove_liquidity_single(&liquidity.to_wei()?, token_out)?;
        let output = TokenAmount::from_wei(token_out.clone(), &amount)?;
        Ok((ZapQuoteStep::Split { input: liquidity.clone(), outputs: vec![output.clone()] }, output))
    }

    fn quote_remove_all(
        &self,
        pool: &dyn LiquidityPool,
        liquidity: &TokenAmount,
    ) -> Result<(ZapQuoteStep, Vec<TokenAmount>), ZapError> {
        let amounts = pool.remove_liquidity(&liquidity.to_wei()?)?;
        let outputs = pool
            .tokens()
            .iter()
            .zip(&amounts)
            .map(|(token, amount)| TokenAmount::from_wei(token.clone(), amount))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((ZapQuoteStep::Split { input: liquidity.clone(), outputs: outputs.clone() }, outputs))
    }

    /// Adds the ledger's balance of the built token, rechecked against the quoted mint.
    async fn build_add(
        &self,
        call: &PoolCallContext<'_>,
        inputs: &[TokenAmount],
        quoted: &TokenAmount,
        slippage: Decimal,
        balances: &mut Balances,
    ) -> Result<ZapStep, ZapError> {
        let [quoted_input] = inputs else {
            return Err(ZapError::route_not_found("pool builds take a single token"));
        };
        let pool = self.load().await?;
        let amount = balances.get_amount(&quoted_input.token);
        let amount_wei = amount.to_wei()?;
        let minted = single_sided(P::liquidity(&pool))?.add_liquidity_single(&amount_wei, &amount.token)?;
        let actual = TokenAmount::from_wei(self.lp_token().clone(), &minted)?;
        check_min_output(quoted, input_ratio(inputs, balances), &actual, slippage)?;
        let min = slip_amount(&actual, slippage);
        let step = self
            .protocol
            .add_single_step(&pool, call, &amount.token, &amount_wei, &min.to_wei()?)?;
        balances.subtract(&amount)?;
        balances.add(&min)?;
        Ok(step)
    }

    /// Removes the ledger's liquidity into the quoted split. Proportional splits are
    /// revalidated with a fraction of the slippage only.
    async fn build_split(
        &self,
        call: &PoolCallContext<'_>,
        input: &TokenAmount,
        outputs: &[TokenAmount],
        slippage: Decimal,
        balances: &mut Balances,
    ) -> Result<ZapStep, ZapError> {
        let pool = self.load().await?;
        let liquidity = balances.get_amount(&input.token);
        let liquidity_wei = liquidity.to_wei()?;
        let ratio = input_ratio(std::slice::from_ref(input), balances);
        let step = match outputs {
            [output] => {
                let amount = single_sided(P::liquidity(&pool))?
                    .remove_liquidity_single(&liquidity_wei, &output.token)?;
                let actual = TokenAmount::from_wei(output.token.clone(), &amount)?;
                check_min_output(output, ratio, &actual, slippage)?;
                let min = slip_amount(&actual, slippage);
                let step = self.protocol.remove_single_step(
                    &pool,
                    call,
                    &output.token,
                    &liquidity_wei,
                    &min.to_wei()?,
                )?;
                balances.add(&min)?;
                step
            }
            _ => {
                let pool_state = P::liquidity(&pool);
                let amounts = pool_state.remove_liquidity(&liquidity_wei)?;
                let tolerance = slippage * self.helpers.settings.split_revalidation_leeway;
                let mut mins = Vec::with_capacity(amounts.len());
                for (token, amount) in pool_state.tokens().iter().zip(&amounts) {
                    let actual = TokenAmount::from_wei(token.clone(), amount)?;
                    if let Some(quoted) = outputs.iter().find(|o| &o.token == token) {
                        check_min_output(quoted, ratio, &actual, tolerance)?;
                    }
                    let min = slip_amount(&actual, slippage);
                    mins.push(min.to_wei()?);
                    balances.add(&min)?;
                }
                self.protocol
                    .remove_proportional_step(&pool, call, &liquidity_wei, &mins)?
            }
        };
        balances.subtract(&liquidity)?;
        Ok(step)
    }

    async fn breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        mut balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError> {
        let router = self.helpers.router(self.vault.chain)?;
        let call = PoolCallContext {
            router: &router,
            lp_token: self.lp_token(),
            deadline_secs: self.helpers.settings.swap_deadline_secs,
        };
        let mut steps = Vec::with_capacity(quote.steps.len());
        for step in &quote.steps {
            let built = match step {
                ZapQuoteStep::Swap { .. } => {
                    fetch_quoted_swap_leg(&self.helpers, step, &balances, slippage)
                        .await?
                        .apply(&mut balances)?
                }
                ZapQuoteStep::Build { inputs, output } => {
                    self.build_add(&call, inputs, output, slippage, &mut balances)
                        .await?
                }
                ZapQuoteStep::Split { input, outputs } => {
                    self.build_split(&call, input, outputs, slippage, &mut balances)
                        .await?
                }
                ZapQuoteStep::Deposit { .. } => {
                    vault_deposit_leg(self.adapter.as_ref(), &mut balances, &router, slippage)
                        .await?
                }
                ZapQuoteStep::Withdraw { .. } => {
                    vault_withdraw_leg(self.adapter.as_ref(), &mut balances, &router, slippage)
                        .await?
                }
                ZapQuoteStep::Unused { .. } => continue,
                other => {
                    return Err(ZapError::route_not_found(format!(
                        "{} strategy cannot build {other:?}",
                        P::STRATEGY_ID
                    )))
                }
            };
            steps.push(built);
        }
        Ok(UserlessZapBreakdown {
            inputs: quote.inputs.clone(),
            steps,
            balances,
            expected_tokens: quote
                .outputs
                .iter()
                .map(|o| o.token.clone())
                .collect(),
        })
    }
}

#[async_trait]
impl<P: PoolProtocol> ZapStrategy for LiquidityPoolStrategy<P> {
    fn id(&self) -> StrategyId {
        P::STRATEGY_ID
    }

    fn vault(&self) -> &Vault {
        &self.vault
    }

    async fn fetch_deposit_options(&self) -> Result<Vec<ZapOption>, ZapError> {
        self.options(ZapAction::Deposit).await
    }

    #[instrument(skip_all, fields(vault = %self.vault.id, option = %option.id))]
    async fn fetch_deposit_quote(
        &self,
        inputs: &[InputTokenAmount],
        option: &ZapOption,
    ) -> Result<ZapQuote, ZapError> {
        validate_inputs(inputs, &option.input_tokens)?;
        let input = inputs[0].as_token_amount();
        let mut quote = ZapQuote::new(option.clone(), inputs.to_vec());
        let liquidity = match &option.route {
            OptionRoute::Direct => input,
            OptionRoute::Swap { via: SwapProvider::Pool, .. } => {
                let pool = self.load().await?;
                let (step, liquidity) = self.quote_add(P::liquidity(&pool), &input)?;
                quote.steps.push(step);
                liquidity
            }
            OptionRoute::Swap { via: SwapProvider::Aggregator, .. } => {
                let pool = self.load().await?;
                let pool_state = P::liquidity(&pool);
                let legs: Vec<_> = pool_state
                    .tokens()
                    .iter()
                    .map(|token| (input.clone(), token.clone()))
                    .collect();
                let quotes = fetch_best_quotes(&self.helpers, &legs, &self.vault.id).await;
                let (swap, build, liquidity) = quotes
                    .into_iter()
                    .flatten()
                    .filter_map(|swap| {
                        let (build, liquidity) = self
                            .quote_add(pool_state, &swap.to())
                            .map_err(|err| debug!(error = %err, "Pool token leg dropped"))
                            .ok()?;
                        Some((swap, build, liquidity))
                    })
                    .max_by(|a, b| a.2.amount.cmp(&b.2.amount))
                    .ok_or_else(|| {
                        ZapError::route_not_found(format!("no pool token reachable from {input}"))
                    })?;
                quote
                    .steps
                    .extend([aggregator_quote_step(&swap), build]);
                liquidity
            }
            _ => return Err(unsupported_route(option)),
        };
        let (step, shares) = vault_deposit_quote(self.adapter.as_ref(), &liquidity)?;
        quote.steps.push(step);
        quote.outputs = vec![shares];
        finalize_quote(quote, &self.helpers)
    }

    async fn fetch_deposit_step(
        &self,
        quote: &ZapQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError> {
        build_order(self, ZapAction::Deposit, quote, ctx).await
    }

    async fn fetch_withdraw_options(&self) -> Result<Vec<ZapOption>, ZapError> {
        self.options(ZapAction::Withdraw).await
    }

    #[instrument(skip_all, fields(vault = %self.vault.id, option = %option.id))]
    async fn fetch_withdraw_quote(
        &self,
        inputs: &[InputTokenAmount],
        option: &ZapOption,
    ) -> Result<ZapQuote, ZapError> {
        validate_inputs(inputs, &option.input_tokens)?;
        let shares = inputs[0].as_token_amount();
        let mut quote = ZapQuote::new(option.clone(), inputs.to_vec());
        let (step, liquidity) = vault_withdraw_quote(self.adapter.as_ref(), &shares)?;
        quote.steps.push(step);
        quote.outputs = match &option.route {
            OptionRoute::Direct => vec![liquidity],
            OptionRoute::AllTokens => {
                let pool = self.load().await?;
                let (split, outputs) = self.quote_remove_all(P::liquidity(&pool), &liquidity)?;
                quote.steps.push(split);
                outputs
            }
            OptionRoute::Swap { via: SwapProvider::Pool, via_token } => {
                let pool = self.load().await?;
                let (split, output) = self.quote_remove(P::liquidity(&pool), &liquidity, via_token)?;
                quote.steps.push(split);
                vec![output]
            }
            OptionRoute::Swap { via: SwapProvider::Aggregator, .. } => {
                let wanted = option
                    .user_token()
                    .ok_or_else(|| unsupported_route(option))?;
                let pool = self.load().await?;
                let pool_state = P::liquidity(&pool);
                let splits: Vec<_> = pool_state
                    .tokens()
                    .iter()
                    .filter_map(|token| self.quote_remove(pool_state, &liquidity, token).ok())
                    .collect();
                let legs: Vec<_> = splits
                    .iter()
                    .map(|(_, output)| (output.clone(), wanted.clone()))
                    .collect();
                let quotes = fetch_best_quotes(&self.helpers, &legs, &self.vault.id).await;
                let (split, swap) = splits
                    .into_iter()
                    .zip(quotes)
                    .filter_map(|((split, _), swap)| Some((split, swap?)))
                    .max_by(|a, b| a.1.to_amount.cmp(&b.1.to_amount))
                    .ok_or_else(|| {
                        ZapError::route_not_found(format!("no pool token converts to {wanted}"))
                    })?;
                quote
                    .steps
                    .extend([split, aggregator_quote_step(&swap)]);
                vec![swap.to()]
            }
            _ => return Err(unsupported_route(option)),
        };
        finalize_quote(quote, &self.helpers)
    }

    async fn fetch_withdraw_step(
        &self,
        quote: &ZapQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError> {
        build_order(self, ZapAction::Withdraw, quote, ctx).await
    }
}

#[async_trait]
impl<P: PoolProtocol> ComposableStrategy for LiquidityPoolStrategy<P> {
    async fn fetch_deposit_userless_breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError> {
        self.breakdown(quote, slippage, balances)
            .await
    }

    async fn fetch_withdraw_userless_breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError> {
        self.breakdown(quote, slippage, balances)
            .await
    }
}
