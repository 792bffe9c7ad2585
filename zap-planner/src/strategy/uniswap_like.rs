//! Vaults over constant product pairs (Uniswap V2 and its forks).
//!
//! Single token deposits swap the optimal share of the input inside the pair, then add both
//! tokens. Withdrawals remove liquidity and swap one side into the wanted token.

use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use zap_common::{
    errors::ZapError,
    models::{
        quote::{
            OptionRoute, SelectionOrder, StrategyId, SwapProvider, SwapVia, ZapFee, ZapOption,
            ZapQuote, ZapQuoteStep,
        },
        token::{InputTokenAmount, Token, TokenAmount},
        vault::{Vault, VaultKind},
        zap::{BalanceInsert, ZapAction, ZapOrder, ZapStep},
        Address,
    },
    simulation::{uniswap_v2::ConstantProductPool, LiquidityPool, SingleSidedLiquidity},
    traits::VaultAdapter,
    zap::{math::slip_amount, Balances},
};
use zap_ethereum::calls::{
    deadline_after,
    uniswap::{add_liquidity_step, remove_liquidity_step, swap_step, RouterCall},
};

use super::{
    helpers::{
        build_order, check_min_output, finalize_quote, input_ratio, unsupported_route,
        validate_inputs, vault_deposit_leg, vault_deposit_quote, vault_withdraw_leg,
        vault_withdraw_quote, ZapHelpers,
    },
    swap::{
        aggregator_options, aggregator_quote_step, fetch_best_quotes, fetch_quoted_swap_leg,
        fetch_supported_tokens, wrap_quote_step,
    },
    ComposableStrategy, StepContext, UserlessZapBreakdown, ZapStrategy,
};

fn amounts_of(tokens: &[Token], amounts: &[BigUint]) -> Result<Vec<TokenAmount>, ZapError> {
    tokens
        .iter()
        .zip(amounts)
        .map(|(token, amount)| TokenAmount::from_wei(token.clone(), amount))
        .collect()
}

fn pool_fee(pool: &ConstantProductPool) -> ZapFee {
    let (numerator, denominator) = pool.fee();
    ZapFee::new(Decimal::from(numerator) / Decimal::from(denominator))
}

/// Quote of a single token add: the in-pair swap, the add and what the router keeps.
struct SingleAdd {
    swap: Option<ZapQuoteStep>,
    build: ZapQuoteStep,
    liquidity: TokenAmount,
    unused: Vec<TokenAmount>,
}

#[derive(Debug)]
pub struct UniswapLikeStrategy {
    vault: Vault,
    /// The pair, which is also the LP token.
    pool: Address,
    router: Address,
    adapter: Arc<dyn VaultAdapter>,
    helpers: Arc<ZapHelpers>,
}

impl UniswapLikeStrategy {
    pub fn new(
        vault: Vault,
        pool: &Address,
        router: &Address,
        helpers: Arc<ZapHelpers>,
    ) -> Result<Self, ZapError> {
        if vault.kind == VaultKind::Cowcentrated {
            return Err(ZapError::Config(format!("{} is not a pair token vault", vault.id)));
        }
        if &vault.deposit_token.address != pool {
            return Err(ZapError::Config(format!(
                "{} deposits {}, not the pair {pool}",
                vault.id, vault.deposit_token
            )));
        }
        let adapter = helpers.vault_adapter(&vault)?;
        Ok(Self { vault, pool: pool.clone(), router: router.clone(), adapter, helpers })
    }

    fn lp_token(&self) -> &Token {
        self.adapter.deposit_token()
    }

    async fn load(&self) -> Result<ConstantProductPool, ZapError> {
        Ok(self
            .helpers
            .pools
            .constant_product_pool(self.vault.chain, &self.pool)
            .await?)
    }

    fn router_call<'a>(&'a self, to: &'a Address) -> RouterCall<'a> {
        RouterCall {
            router: &self.router,
            to,
            deadline: deadline_after(self.helpers.settings.swap_deadline_secs),
        }
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
            StrategyId::UniswapLike,
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
        let tokens = pool.tokens().to_vec();
        let mut options = vec![
            self.option(
                action,
                vec![self.lp_token().clone()],
                SelectionOrder::VaultToken,
                OptionRoute::Direct,
            ),
            self.option(
                action,
                tokens.clone(),
                SelectionOrder::AllTokensInPool,
                OptionRoute::AllTokens,
            ),
        ];
        for token in &tokens {
            options.push(self.option(
                action,
                vec![token.clone()],
                SelectionOrder::TokenOfPool,
                OptionRoute::Swap { via: SwapProvider::Pool, via_token: token.clone() },
            ));
            if token.is_wrapped_native() {
                options.push(self.option(
                    action,
                    vec![token.chain.native_token()],
                    SelectionOrder::TokenOfPool,
                    OptionRoute::Swap { via: SwapProvider::Wrap, via_token: token.clone() },
                ));
            }
        }
        let supported =
            fetch_supported_tokens(&self.helpers, &tokens, &self.vault.id, self.vault.chain).await;
        let mut exclude = tokens;
        exclude.push(self.lp_token().clone());
        exclude.push(self.vault.chain.native_token());
        options.extend(aggregator_options(
            StrategyId::UniswapLike,
            &self.vault.id,
            action,
            self.adapter.share_token(),
            supported,
            &exclude,
        ));
        Ok(options)
    }

    fn quote_single_add(
        &self,
        pool: &ConstantProductPool,
        amount: &TokenAmount,
    ) -> Result<SingleAdd, ZapError> {
        let index_in = pool.token_index(&amount.token)?;
        let index_out = 1 - index_in;
        let token_out = &pool.tokens()[index_out];
        let amount_wei = amount.to_wei()?;
        let swap_wei = pool.optimal_swap_amount(&amount_wei, index_in);
        let swapped = pool.swap(&swap_wei, &amount.token, token_out)?;

        let mut amounts = vec![BigUint::zero(), BigUint::zero()];
        amounts[index_in] = &amount_wei - &swap_wei;
        amounts[index_out] = swapped.amount_out.clone();
        let added = swapped
            .new_state
            .add_liquidity(&amounts)?;

        let swap = (!swap_wei.is_zero())
            .then(|| -> Result<_, ZapError> {
                Ok(ZapQuoteStep::Swap {
                    via: SwapVia::Pool { address: self.pool.clone() },
                    from: TokenAmount::from_wei(amount.token.clone(), &swap_wei)?,
                    to: TokenAmount::from_wei(token_out.clone(), &swapped.amount_out)?,
                    fee: pool_fee(pool),
                })
            })
            .transpose()?;
        let liquidity = TokenAmount::from_wei(self.lp_token().clone(), &added.liquidity)?;
        Ok(SingleAdd {
            swap,
            build: ZapQuoteStep::Build {
                inputs: amounts_of(pool.tokens(), &added.used)?,
                output: liquidity.clone(),
            },
            liquidity,
            unused: amounts_of(pool.tokens(), &added.unused)?,
        })
    }

    /// Removes `liquidity` and swaps the other side into `token_out` inside the pair.
    fn quote_single_remove(
        &self,
        pool: &ConstantProductPool,
        liquidity: &TokenAmount,
        token_out: &Token,
    ) -> Result<(Vec<ZapQuoteStep>, TokenAmount), ZapError> {
        let index_out = pool.token_index(token_out)?;
        let index_in = 1 - index_out;
        let liquidity_wei = liquidity.to_wei()?;
        let (removed, _) = pool.burn(&liquidity_wei)?;
        let total = pool.remove_liquidity_single(&liquidity_wei, token_out)?;
        let output = TokenAmount::from_wei(token_out.clone(), &total)?;
        let split = ZapQuoteStep::Split {
            input: liquidity.clone(),
            outputs: amounts_of(pool.tokens(), &removed)?,
        };
        let swap = ZapQuoteStep::Swap {
            via: SwapVia::Pool { address: self.pool.clone() },
            from: TokenAmount::from_wei(pool.tokens()[index_in].clone(), &removed[index_in])?,
            to: TokenAmount::from_wei(token_out.clone(), &(total - &removed[index_out]))?,
            fee: pool_fee(pool),
        };
        Ok((vec![split, swap], output))
    }

    /// Deposit side of a quote, from the pool token reached by the optional first leg.
    fn push_single_add(
        &self,
        quote: &mut ZapQuote,
        add: SingleAdd,
    ) -> TokenAmount {
        quote.steps.extend(add.swap);
        quote.steps.push(add.build);
        quote.returned.extend(add.unused);
        add.liquidity
    }

    async fn deposit_liquidity(
        &self,
        quote: &mut ZapQuote,
        option: &ZapOption,
    ) -> Result<TokenAmount, ZapError> {
        let inputs: Vec<TokenAmount> = quote
            .inputs
            .iter()
            .map(InputTokenAmount::as_token_amount)
            .collect();
        let liquidity = match &option.route {
            OptionRoute::Direct => inputs[0].clone(),
            OptionRoute::AllTokens => {
                let pool = self.load().await?;
                let mut amounts = vec![BigUint::zero(), BigUint::zero()];
                for input in &inputs {
                    amounts[pool.token_index(&input.token)?] = input.to_wei()?;
                }
                let added = pool.add_liquidity(&amounts)?;
                let liquidity = TokenAmount::from_wei(self.lp_token().clone(), &added.liquidity)?;
                quote.steps.push(ZapQuoteStep::Build {
                    inputs: amounts_of(pool.tokens(), &added.used)?,
                    output: liquidity.clone(),
                });
                quote
                    .returned
                    .extend(amounts_of(pool.tokens(), &added.unused)?);
                liquidity
            }
            OptionRoute::Swap { via: SwapProvider::Pool, .. } => {
                let pool = self.load().await?;
                let add = self.quote_single_add(&pool, &inputs[0])?;
                self.push_single_add(quote, add)
            }
            OptionRoute::Swap { via: SwapProvider::Wrap, via_token } => {
                quote
                    .steps
                    .push(wrap_quote_step(&inputs[0], via_token));
                let pool = self.load().await?;
                let wrapped = TokenAmount::new(via_token.clone(), inputs[0].amount);
                let add = self.quote_single_add(&pool, &wrapped)?;
                self.push_single_add(quote, add)
            }
            OptionRoute::Swap { via: SwapProvider::Aggregator, .. } => {
                let pool = self.load().await?;
                let legs: Vec<_> = pool
                    .tokens()
                    .iter()
                    .map(|token| (inputs[0].clone(), token.clone()))
                    .collect();
                let quotes = fetch_best_quotes(&self.helpers, &legs, &self.vault.id).await;
                let (swap, add) = quotes
                    .into_iter()
                    .flatten()
                    .filter_map(|swap| {
                        let add = self
                            .quote_single_add(&pool, &swap.to())
                            .map_err(|err| debug!(error = %err, "Pair token leg dropped"))
                            .ok()?;
                        Some((swap, add))
                    })
                    .max_by(|a, b| a.1.liquidity.amount.cmp(&b.1.liquidity.amount))
                    .ok_or_else(|| {
                        ZapError::route_not_found(format!("no pair token reachable from {}", inputs[0]))
                    })?;
                quote
                    .steps
                    .push(aggregator_quote_step(&swap));
                self.push_single_add(quote, add)
            }
            _ => return Err(unsupported_route(option)),
        };
        Ok(liquidity)
    }

    async fn withdraw_outputs(
        &self,
        quote: &mut ZapQuote,
        option: &ZapOption,
        liquidity: TokenAmount,
    ) -> Result<Vec<TokenAmount>, ZapError> {
        let outputs = match &option.route {
            OptionRoute::Direct => vec![liquidity],
            OptionRoute::AllTokens => {
                let pool = self.load().await?;
                let removed = pool.remove_liquidity(&liquidity.to_wei()?)?;
                let outputs = amounts_of(pool.tokens(), &removed)?;
                quote.steps.push(ZapQuoteStep::Split {
                    input: liquidity,
                    outputs: outputs.clone(),
                });
                outputs
            }
            OptionRoute::Swap { via: SwapProvider::Pool, via_token } => {
                let pool = self.load().await?;
                let (steps, output) = self.quote_single_remove(&pool, &liquidity, via_token)?;
                quote.steps.extend(steps);
                vec![output]
            }
            OptionRoute::Swap { via: SwapProvider::Wrap, via_token } => {
                let pool = self.load().await?;
                let (steps, wrapped) = self.quote_single_remove(&pool, &liquidity, via_token)?;
                let native = via_token.chain.native_token();
                quote.steps.extend(steps);
                quote
                    .steps
                    .push(wrap_quote_step(&wrapped, &native));
                vec![TokenAmount::new(native, wrapped.amount)]
            }
            OptionRoute::Swap { via: SwapProvider::Aggregator, .. } => {
                let wanted = option
                    .user_token()
                    .ok_or_else(|| unsupported_route(option))?;
                let pool = self.load().await?;
                let removed = amounts_of(pool.tokens(), &pool.remove_liquidity(&liquidity.to_wei()?)?)?;
                let legs: Vec<_> = removed
                    .iter()
                    .map(|amount| (amount.clone(), wanted.clone()))
                    .collect();
                let swaps = fetch_best_quotes(&self.helpers, &legs, &self.vault.id)
                    .await
                    .into_iter()
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        ZapError::route_not_found(format!("both pair tokens must convert to {wanted}"))
                    })?;
                quote
                    .steps
                    .push(ZapQuoteStep::Split { input: liquidity, outputs: removed });
                quote
                    .steps
                    .extend(swaps.iter().map(aggregator_quote_step));
                let total = swaps
                    .iter()
                    .map(|swap| swap.to_amount)
                    .sum();
                vec![TokenAmount::new(wanted.clone(), total)]
            }
            _ => return Err(unsupported_route(option)),
        };
        Ok(outputs)
    }

    /// Swaps the optimal share of the ledger's input inside the pair, leaving the rest for the
    /// add. The swapped amount is fixed in the call data.
    async fn build_deposit_swap(
        &self,
        from: &TokenAmount,
        to: &TokenAmount,
        slippage: Decimal,
        balances: &mut Balances,
    ) -> Result<(ZapStep, Box<dyn LiquidityPool>), ZapError> {
        let pool = self.load().await?;
        let router = self.helpers.router(self.vault.chain)?;
        let index_in = pool.token_index(&from.token)?;
        let available = balances.get_amount(&from.token).to_wei()?;
        let swap_wei = pool.optimal_swap_amount(&available, index_in);
        let swapped = pool.swap(&swap_wei, &from.token, &to.token)?;
        let swap_amount = TokenAmount::from_wei(from.token.clone(), &swap_wei)?;
        let actual = TokenAmount::from_wei(to.token.clone(), &swapped.amount_out)?;
        let ratio = if from.is_positive() { swap_amount.amount / from.amount } else { Decimal::ONE };
        check_min_output(to, ratio, &actual, slippage)?;

        let min = slip_amount(&actual, slippage);
        let mut step = swap_step(
            &self.router_call(&router),
            &from.token.address,
            &to.token.address,
            &swap_wei,
            &min.to_wei()?,
        )?;
        for token in &mut step.tokens {
            token.index = BalanceInsert::NotDynamic;
        }
        balances.subtract(&swap_amount)?;
        balances.add(&min)?;
        Ok((step, swapped.new_state))
    }

    /// Adds the ledger's balances of both pair tokens.
    async fn build_add(
        &self,
        pool: Option<Box<dyn LiquidityPool>>,
        inputs: &[TokenAmount],
        output: &TokenAmount,
        slippage: Decimal,
        balances: &mut Balances,
    ) -> Result<ZapStep, ZapError> {
        let pool: Box<dyn LiquidityPool> = match pool {
            Some(pool) => pool,
            None => Box::new(self.load().await?),
        };
        let router = self.helpers.router(self.vault.chain)?;
        let tokens = pool.tokens().to_vec();
        let available: Vec<TokenAmount> = tokens
            .iter()
            .map(|token| balances.get_amount(token))
            .collect();
        let amounts = available
            .iter()
            .map(TokenAmount::to_wei)
            .collect::<Result<Vec<_>, _>>()?;
        let added = pool.add_liquidity(&amounts)?;
        let actual = TokenAmount::from_wei(self.lp_token().clone(), &added.liquidity)?;
        check_min_output(output, input_ratio(inputs, balances), &actual, slippage)?;

        let mins = amounts_of(&tokens, &added.used)?
            .iter()
            .map(|used| slip_amount(used, slippage).to_wei())
            .collect::<Result<Vec<_>, _>>()?;
        let step = add_liquidity_step(
            &self.router_call(&router),
            [&tokens[0].address, &tokens[1].address],
            [&amounts[0], &amounts[1]],
            [&mins[0], &mins[1]],
        )?;
        balances.subtract_many(&available)?;
        balances.add(&slip_amount(&actual, slippage))?;
        Ok(step)
    }

    /// Burns the ledger's LP balance. The split is revalidated with a fraction of the slippage.
    async fn build_split(
        &self,
        input: &TokenAmount,
        outputs: &[TokenAmount],
        slippage: Decimal,
        balances: &mut Balances,
    ) -> Result<(ZapStep, ConstantProductPool), ZapError> {
        let pool = self.load().await?;
        let router = self.helpers.router(self.vault.chain)?;
        let liquidity = balances.get_amount(&input.token);
        let liquidity_wei = liquidity.to_wei()?;
        let ratio = input_ratio(std::slice::from_ref(input), balances);
        let (removed, after) = pool.burn(&liquidity_wei)?;
        let actual = amounts_of(pool.tokens(), &removed)?;
        let tolerance = slippage * self.helpers.settings.split_revalidation_leeway;
        for (quoted, actual) in outputs.iter().zip(&actual) {
            check_min_output(quoted, ratio, actual, tolerance)?;
        }

        let mins: Vec<TokenAmount> = actual
            .iter()
            .map(|amount| slip_amount(amount, slippage))
            .collect();
        let min_wei = mins
            .iter()
            .map(TokenAmount::to_wei)
            .collect::<Result<Vec<_>, _>>()?;
        let tokens = pool.tokens();
        let step = remove_liquidity_step(
            &self.router_call(&router),
            &self.pool,
            [&tokens[0].address, &tokens[1].address],
            &liquidity_wei,
            [&min_wei[0], &min_wei[1]],
        )?;
        balances.subtract(&liquidity)?;
        balances.add_many(&mins)?;
        Ok((step, after))
    }

    /// Swaps the ledger's whole balance of one pair token into the other.
    async fn build_withdraw_swap(
        &self,
        pool: Option<ConstantProductPool>,
        from: &TokenAmount,
        to: &TokenAmount,
        slippage: Decimal,
        balances: &mut Balances,
    ) -> Result<ZapStep, ZapError> {
        let pool = match pool {
            Some(pool) => pool,
            None => self.load().await?,
        };
        let router = self.helpers.router(self.vault.chain)?;
        let input = balances.get_amount(&from.token);
        let input_wei = input.to_wei()?;
        let swapped = pool.swap(&input_wei, &from.token, &to.token)?;
        let actual = TokenAmount::from_wei(to.token.clone(), &swapped.amount_out)?;
        check_min_output(to, input_ratio(std::slice::from_ref(from), balances), &actual, slippage)?;

        let min = slip_amount(&actual, slippage);
        let step = swap_step(
            &self.router_call(&router),
            &from.token.address,
            &to.token.address,
            &input_wei,
            &min.to_wei()?,
        )?;
        balances.subtract(&input)?;
        balances.add(&min)?;
        Ok(step)
    }

    async fn deposit_breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        mut balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError> {
        let router = self.helpers.router(self.vault.chain)?;
        let mut after_swap = None;
        let mut steps = Vec::with_capacity(quote.steps.len());
        for step in &quote.steps {
            let built = match step {
                ZapQuoteStep::Swap { via: SwapVia::Pool { .. }, from, to, .. } => {
                    let (step, pool) =
                        self.build_deposit_swap(from, to, slippage, &mut balances).await?;
                    after_swap = Some(pool);
                    step
                }
                ZapQuoteStep::Swap { .. } => {
                    fetch_quoted_swap_leg(&self.helpers, step, &balances, slippage)
                        .await?
                        .apply(&mut balances)?
                }
                ZapQuoteStep::Build { inputs, output } => {
                    self.build_add(after_swap.take(), inputs, output, slippage, &mut balances)
                        .await?
                }
                ZapQuoteStep::Deposit { .. } => {
                    vault_deposit_leg(self.adapter.as_ref(), &mut balances, &router, slippage)
                        .await?
                }
                ZapQuoteStep::Unused { .. } => continue,
                other => {
                    return Err(ZapError::route_not_found(format!(
                        "pair deposit cannot build {other:?}"
                    )))
                }
            };
            steps.push(built);
        }
        Ok(self.finish(quote, steps, balances))
    }

    async fn withdraw_breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        mut balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError> {
        let router = self.helpers.router(self.vault.chain)?;
        let mut after_burn = None;
        let mut steps = Vec::with_capacity(quote.steps.len());
        for step in &quote.steps {
            let built = match step {
                ZapQuoteStep::Withdraw { .. } => {
                    vault_withdraw_leg(self.adapter.as_ref(), &mut balances, &router, slippage)
                        .await?
                }
                ZapQuoteStep::Split { input, outputs } => {
                    let (step, pool) =
                        self.build_split(input, outputs, slippage, &mut balances).await?;
                    after_burn = Some(pool);
                    step
                }
                ZapQuoteStep::Swap { via: SwapVia::Pool { .. }, from, to, .. } => {
                    self.build_withdraw_swap(after_burn.take(), from, to, slippage, &mut balances)
                        .await?
                }
                ZapQuoteStep::Swap { .. } => {
                    fetch_quoted_swap_leg(&self.helpers, step, &balances, slippage)
                        .await?
                        .apply(&mut balances)?
                }
                ZapQuoteStep::Unused { .. } => continue,
                other => {
                    return Err(ZapError::route_not_found(format!(
                        "pair withdrawal cannot build {other:?}"
                    )))
                }
            };
            steps.push(built);
        }
        Ok(self.finish(quote, steps, balances))
    }

    fn finish(&self, quote: &ZapQuote, steps: Vec<ZapStep>, balances: Balances) -> UserlessZapBreakdown {
        UserlessZapBreakdown {
            inputs: quote.inputs.clone(),
            steps,
            balances,
            expected_tokens: quote
                .outputs
                .iter()
                .chain(&quote.returned)
                .map(|o| o.token.clone())
                .collect(),
        }
    }
}

#[async_trait]
impl ZapStrategy for UniswapLikeStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::UniswapLike
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
        let mut quote = ZapQuote::new(option.clone(), inputs.to_vec());
        let liquidity = self
            .deposit_liquidity(&mut quote, option)
            .await?;
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
        let mut quote = ZapQuote::new(option.clone(), inputs.to_vec());
        let (step, liquidity) =
            vault_withdraw_quote(self.adapter.as_ref(), &inputs[0].as_token_amount())?;
        quote.steps.push(step);
        quote.outputs = self
            .withdraw_outputs(&mut quote, option, liquidity)
            .await?;
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
impl ComposableStrategy for UniswapLikeStrategy {
    async fn fetch_deposit_userless_breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError> {
        self.deposit_breakdown(quote, slippage, balances)
            .await
    }

    async fn fetch_withdraw_userless_breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError> {
        self.withdraw_breakdown(quote, slippage, balances)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use zap_common::{
        errors::InputError,
        models::Chain,
        traits::{MockPoolStateReader, MockSwapAggregator},
        Bytes,
    };

    use super::*;
    use crate::test_fixtures::{helpers_with_pools, standard_vault, step_context, usdc, weth};

    fn e18(v: u64) -> BigUint {
        BigUint::from(v) * BigUint::from(10u64).pow(18)
    }

    fn e6(v: u64) -> BigUint {
        BigUint::from(v) * BigUint::from(10u64).pow(6)
    }

    fn pair() -> Address {
        Bytes::from_str("0x00000000000000000000000000000000000000e0").unwrap()
    }

    fn uniswap_router() -> Address {
        Bytes::from_str("0x00000000000000000000000000000000000000e1").unwrap()
    }

    fn lp_token() -> Token {
        Token::new(&pair(), "UNI-V2", 18, Chain::Base)
    }

    fn pair_state(usdc_reserve: BigUint) -> ConstantProductPool {
        ConstantProductPool::new(
            pair(),
            [usdc(), weth()],
            [usdc_reserve, e18(1_000)],
            e18(1),
            997,
            1000,
        )
        .unwrap()
    }

    fn strategy(pools: MockPoolStateReader) -> UniswapLikeStrategy {
        let helpers = helpers_with_pools(MockSwapAggregator::new(), pools);
        let vault = standard_vault("uni-usdc-weth", lp_token(), dec!(1));
        UniswapLikeStrategy::new(vault, &pair(), &uniswap_router(), Arc::new(helpers)).unwrap()
    }

    fn steady_pools() -> MockPoolStateReader {
        let mut pools = MockPoolStateReader::new();
        pools
            .expect_constant_product_pool()
            .returning(|_, _| Ok(pair_state(e6(2_000_000))));
        pools
    }

    fn usdc_deposit(strategy: &UniswapLikeStrategy) -> ZapOption {
        strategy.option(
            ZapAction::Deposit,
            vec![usdc()],
            SelectionOrder::TokenOfPool,
            OptionRoute::Swap { via: SwapProvider::Pool, via_token: usdc() },
        )
    }

    #[test_log::test(tokio::test)]
    async fn test_single_token_deposit_mints_less_than_balanced_add() {
        let strategy = strategy(steady_pools());
        let option = usdc_deposit(&strategy);
        let inputs = vec![InputTokenAmount::new(usdc(), dec!(10000), false)];

        let quote = strategy
            .fetch_deposit_quote(&inputs, &option)
            .await
            .unwrap();

        let pool = pair_state(e6(2_000_000));
        let half = e6(5_000);
        let balanced = pool
            .add_liquidity(&[half.clone(), pool.quote(&half, 0).unwrap()])
            .unwrap()
            .liquidity;
        let ZapQuoteStep::Build { output, .. } = &quote.steps[1] else {
            panic!("expected a build step, got {:?}", quote.steps[1]);
        };
        assert!(matches!(quote.steps[0], ZapQuoteStep::Swap { via: SwapVia::Pool { .. }, .. }));
        assert!(output.is_positive());
        assert!(output.to_wei().unwrap() <= balanced);
        assert!(matches!(quote.steps[2], ZapQuoteStep::Deposit { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn test_single_token_deposit_order() {
        let strategy = strategy(steady_pools());
        let option = usdc_deposit(&strategy);
        let inputs = vec![InputTokenAmount::new(usdc(), dec!(10000), false)];
        let quote = strategy
            .fetch_deposit_quote(&inputs, &option)
            .await
            .unwrap();

        let order = strategy
            .fetch_deposit_step(&quote, &step_context(dec!(0.01)))
            .await
            .unwrap();

        assert_eq!(order.steps.len(), 3);
        // the in-pair swap moves a fixed amount, the add takes whatever the router holds
        assert_eq!(order.steps[0].tokens[0].index, BalanceInsert::NotDynamic);
        assert!(order.steps[1]
            .tokens
            .iter()
            .all(|t| matches!(t.index, BalanceInsert::At(_))));
        assert_eq!(order.steps[2].target, strategy.vault().address);
    }

    #[test_log::test(tokio::test)]
    async fn test_moved_reserves_fail_build_with_quote_changed() {
        let mut pools = MockPoolStateReader::new();
        let mut seq = mockall::Sequence::new();
        pools
            .expect_constant_product_pool()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(pair_state(e6(2_000_000))));
        // WETH doubled in price between quote and build
        pools
            .expect_constant_product_pool()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(pair_state(e6(4_000_000))));
        let strategy = strategy(pools);
        let option = usdc_deposit(&strategy);
        let inputs = vec![InputTokenAmount::new(usdc(), dec!(10000), false)];
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

    #[rstest::rstest]
    #[case::negative(dec!(-0.05))]
    #[case::above_one(dec!(1.5))]
    #[tokio::test]
    async fn test_out_of_range_slippage_fails_build_as_input_error(#[case] slippage: Decimal) {
        let strategy = strategy(steady_pools());
        let option = usdc_deposit(&strategy);
        let inputs = vec![InputTokenAmount::new(usdc(), dec!(10000), false)];
        let quote = strategy
            .fetch_deposit_quote(&inputs, &option)
            .await
            .unwrap();

        let err = strategy
            .fetch_deposit_step(&quote, &step_context(slippage))
            .await
            .unwrap_err();

        assert!(!err.is_stale_quote(), "{err}");
        assert!(
            matches!(err, ZapError::InvalidInput(InputError::InvalidSlippage { .. })),
            "{err}"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_duplicate_pool_token_inputs_are_rejected() {
        // no pool reads: validation fails first
        let strategy = strategy(MockPoolStateReader::new());
        let option = strategy.option(
            ZapAction::Deposit,
            vec![usdc(), weth()],
            SelectionOrder::AllTokensInPool,
            OptionRoute::AllTokens,
        );
        let inputs = vec![
            InputTokenAmount::new(usdc(), dec!(2000), false),
            InputTokenAmount::new(usdc(), dec!(2000), false),
        ];

        let err = strategy
            .fetch_deposit_quote(&inputs, &option)
            .await
            .unwrap_err();

        assert!(
            matches!(err, ZapError::InvalidInput(InputError::TokenMismatch { .. })),
            "{err}"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_withdraw_to_pair_token_splits_then_swaps_once() {
        let strategy = strategy(steady_pools());
        let option = strategy.option(
            ZapAction::Withdraw,
            vec![usdc()],
            SelectionOrder::TokenOfPool,
            OptionRoute::Swap { via: SwapProvider::Pool, via_token: usdc() },
        );
        let share = strategy.vault().share_token.clone();
        let inputs = vec![InputTokenAmount::new(share, dec!(0.01), false)];

        let quote = strategy
            .fetch_withdraw_quote(&inputs, &option)
            .await
            .unwrap();
        let order = strategy
            .fetch_withdraw_step(&quote, &step_context(dec!(0.01)))
            .await
            .unwrap();

        let kinds: Vec<_> = quote
            .steps
            .iter()
            .map(|step| match step {
                ZapQuoteStep::Withdraw { .. } => "withdraw",
                ZapQuoteStep::Split { .. } => "split",
                ZapQuoteStep::Swap { .. } => "swap",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["withdraw", "split", "swap"]);
        // 1% of the pair is 20k USDC and 10 WETH, the WETH sells for a bit under 20k
        assert!(quote.outputs[0].amount > dec!(39000) && quote.outputs[0].amount < dec!(40000));
        assert_eq!(order.steps.len(), 3);
        assert_eq!(order.steps[1].target, uniswap_router());
        assert_eq!(order.outputs[0].token, usdc().address);
    }

    #[test_log::test(tokio::test)]
    async fn test_all_tokens_deposit_returns_unused() {
        let strategy = strategy(steady_pools());
        let option = strategy.option(
            ZapAction::Deposit,
            vec![usdc(), weth()],
            SelectionOrder::AllTokensInPool,
            OptionRoute::AllTokens,
        );
        let inputs = vec![
            InputTokenAmount::new(usdc(), dec!(2000), false),
            InputTokenAmount::new(weth(), dec!(2), false),
        ];

        let quote = strategy
            .fetch_deposit_quote(&inputs, &option)
            .await
            .unwrap();

        // the pair prices WETH at 2000 USDC, so one WETH is left over
        assert_eq!(quote.returned, vec![TokenAmount::new(weth(), dec!(1))]);
        assert!(matches!(quote.steps.last(), Some(ZapQuoteStep::Unused { .. })));
        assert_eq!(quote.outputs[0].amount, dec!(0.001));
    }
}
