//! Vaults that are concentrated liquidity managers.
//!
//! The manager mints shares for both pool tokens in its current balance ratio, so single token
//! deposits first swap the right fraction of the input through the aggregator. Deposits and
//! withdrawals are refused while the pool price is outside the calm zone.

use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use zap_common::{
    errors::{ZapError, ZapUiError},
    models::{
        quote::{
            OptionRoute, SelectionOrder, StrategyId, SwapProvider, SwapVia, ZapOption, ZapQuote,
            ZapQuoteStep,
        },
        token::{InputTokenAmount, Token, TokenAmount},
        vault::{Vault, VaultKind},
        zap::{ZapAction, ZapOrder, ZapStep},
    },
    simulation::{concentrated::ConcentratedPool, LiquidityPool},
    zap::{
        math::{mul_div, slip_amount},
        Balances,
    },
};
use zap_ethereum::calls::vault::{clm_deposit_step, clm_withdraw_step};

use super::{
    helpers::{
        build_order, check_min_output, finalize_quote, input_ratio, unsupported_route,
        validate_inputs, ZapHelpers,
    },
    swap::{
        aggregator_options, aggregator_quote_step, fetch_best_quotes, fetch_quoted_swap_leg,
        fetch_supported_tokens, fetch_swap_leg, wrap_quote_step,
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

fn ensure_calm(pool: &ConcentratedPool, action: ZapAction) -> Result<(), ZapError> {
    if !pool.is_calm() {
        return Err(ZapUiError::PriceOutsideCalmZone { action }.into());
    }
    Ok(())
}

#[derive(Debug)]
pub struct CowcentratedStrategy {
    vault: Vault,
    helpers: Arc<ZapHelpers>,
}

impl CowcentratedStrategy {
    pub fn new(vault: Vault, helpers: Arc<ZapHelpers>) -> Result<Self, ZapError> {
        if vault.kind != VaultKind::Cowcentrated {
            return Err(ZapError::Config(format!("{} is not a liquidity manager", vault.id)));
        }
        Ok(Self { vault, helpers })
    }

    /// The manager, which is also the share token.
    fn shares(&self) -> &Token {
        &self.vault.share_token
    }

    async fn load(&self, action: ZapAction) -> Result<ConcentratedPool, ZapError> {
        let pool = self
            .helpers
            .pools
            .concentrated_pool(self.vault.chain, &self.vault.address)
            .await?;
        ensure_calm(&pool, action)?;
        Ok(pool)
    }

    fn option(
        &self,
        action: ZapAction,
        tokens: Vec<Token>,
        selection_order: SelectionOrder,
        route: OptionRoute,
    ) -> ZapOption {
        let (inputs, outputs) = match action {
            ZapAction::Deposit => (tokens, vec![self.shares().clone()]),
            ZapAction::Withdraw => (vec![self.shares().clone()], tokens),
        };
        ZapOption::new(
            StrategyId::Cowcentrated,
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
        let pool = self
            .helpers
            .pools
            .concentrated_pool(self.vault.chain, &self.vault.address)
            .await?;
        let tokens = pool.tokens().to_vec();
        let mut options = vec![self.option(
            action,
            tokens.clone(),
            SelectionOrder::AllTokensInPool,
            OptionRoute::AllTokens,
        )];
        for token in &tokens {
            options.push(self.option(
                action,
                vec![token.clone()],
                SelectionOrder::TokenOfPool,
                OptionRoute::Swap { via: SwapProvider::Aggregator, via_token: token.clone() },
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
        exclude.push(self.shares().clone());
        exclude.push(self.vault.chain.native_token());
        options.extend(aggregator_options(
            StrategyId::Cowcentrated,
            &self.vault.id,
            action,
            self.shares(),
            supported,
            &exclude,
        ));
        Ok(options)
    }

    /// Splits `amount` into the parts to hold in each pool token, valued at the pool price.
    fn split_by_value(
        &self,
        pool: &ConcentratedPool,
        amount: &TokenAmount,
    ) -> Result<[TokenAmount; 2], ZapError> {
        let index = pool.token_index(&amount.token).unwrap_or(0);
        let (numerator, denominator) = pool.swap_fraction(index);
        if denominator.is_zero() {
            return Err(ZapUiError::NoSingleSidedDeposit { token: amount.token.to_string() }.into());
        }
        let wei = amount.to_wei()?;
        let other = TokenAmount::from_wei(amount.token.clone(), &mul_div(&wei, &numerator, &denominator))?;
        let same = TokenAmount::new(amount.token.clone(), amount.amount - other.amount);
        Ok(if index == 0 { [same, other] } else { [other, same] })
    }

    /// Converts `amount` into both pool tokens through the aggregator and quotes the deposit.
    async fn quote_balanced_deposit(
        &self,
        quote: &mut ZapQuote,
        pool: &ConcentratedPool,
        amount: &TokenAmount,
    ) -> Result<TokenAmount, ZapError> {
        let tokens = pool.tokens();
        let parts = self.split_by_value(pool, amount)?;
        let legs: Vec<(TokenAmount, Token)> = parts
            .iter()
            .zip(tokens)
            .filter(|(part, token)| part.is_positive() && part.token != **token)
            .map(|(part, token)| (part.clone(), token.clone()))
            .collect();
        let swaps = fetch_best_quotes(&self.helpers, &legs, &self.vault.id)
            .await
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ZapError::route_not_found(format!("{} does not convert into both pool tokens", amount.token))
            })?;

        let mut amounts = vec![BigUint::zero(), BigUint::zero()];
        for (part, token) in parts.iter().zip(tokens) {
            if part.token == *token {
                amounts[pool.token_index(token)?] += part.to_wei()?;
            }
        }
        for swap in &swaps {
            amounts[pool.token_index(&swap.to_token)?] += swap.to().to_wei()?;
            quote
                .steps
                .push(aggregator_quote_step(swap));
        }
        self.quote_add(quote, pool, &amounts)
    }

    fn quote_add(
        &self,
        quote: &mut ZapQuote,
        pool: &ConcentratedPool,
        amounts: &[BigUint],
    ) -> Result<TokenAmount, ZapError> {
        let added = pool.add_liquidity(amounts)?;
        let shares = TokenAmount::from_wei(self.shares().clone(), &added.liquidity)?;
        quote.steps.push(ZapQuoteStep::Deposit {
            inputs: amounts_of(pool.tokens(), &added.used)?,
            output: shares.clone(),
        });
        quote
            .returned
            .extend(amounts_of(pool.tokens(), &added.unused)?);
        Ok(shares)
    }

    /// Swaps every removed pool token other than `wanted` into it.
    async fn quote_swaps_into(
        &self,
        quote: &mut ZapQuote,
        removed: &[TokenAmount],
        wanted: &Token,
    ) -> Result<TokenAmount, ZapError> {
        let legs: Vec<(TokenAmount, Token)> = removed
            .iter()
            .filter(|amount| amount.is_positive() && &amount.token != wanted)
            .map(|amount| (amount.clone(), wanted.clone()))
            .collect();
        let swaps = fetch_best_quotes(&self.helpers, &legs, &self.vault.id)
            .await
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ZapError::route_not_found(format!("pool tokens do not all convert to {wanted}"))
            })?;
        quote
            .steps
            .extend(swaps.iter().map(aggregator_quote_step));
        let kept: Decimal = removed
            .iter()
            .filter(|amount| &amount.token == wanted)
            .map(|amount| amount.amount)
            .sum();
        let swapped: Decimal = swaps
            .iter()
            .map(|swap| swap.to_amount)
            .sum();
        Ok(TokenAmount::new(wanted.clone(), kept + swapped))
    }

    async fn build_deposit(
        &self,
        inputs: &[TokenAmount],
        output: &TokenAmount,
        slippage: Decimal,
        balances: &mut Balances,
    ) -> Result<ZapStep, ZapError> {
        let pool = self.load(ZapAction::Deposit).await?;
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
        let actual = TokenAmount::from_wei(self.shares().clone(), &added.liquidity)?;
        check_min_output(output, input_ratio(inputs, balances), &actual, slippage)?;

        let min = slip_amount(&actual, slippage);
        let step = clm_deposit_step(
            &self.vault.address,
            [&tokens[0].address, &tokens[1].address],
            [&amounts[0], &amounts[1]],
            &min.to_wei()?,
        )?;
        balances.subtract_many(&available)?;
        balances.add(&min)?;
        Ok(step)
    }

    async fn build_withdraw(
        &self,
        input: &TokenAmount,
        outputs: &[TokenAmount],
        slippage: Decimal,
        balances: &mut Balances,
    ) -> Result<ZapStep, ZapError> {
        let pool = self.load(ZapAction::Withdraw).await?;
        let shares = balances.get_amount(&input.token);
        let shares_wei = shares.to_wei()?;
        let ratio = input_ratio(std::slice::from_ref(input), balances);
        let actual = amounts_of(pool.tokens(), &pool.remove_liquidity(&shares_wei)?)?;
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
        let step = clm_withdraw_step(&self.vault.address, &shares_wei, [&min_wei[0], &min_wei[1]])?;
        balances.subtract(&shares)?;
        balances.add_many(&mins)?;
        Ok(step)
    }

    async fn breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        mut balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError> {
        let mut steps = Vec::with_capacity(quote.steps.len());
        for step in &quote.steps {
            let built = match step {
                // deposit legs each swap a fixed part of the input
                ZapQuoteStep::Swap { via: SwapVia::Aggregator(swap), .. }
                    if quote.option.action == ZapAction::Deposit =>
                {
                    fetch_swap_leg(&self.helpers, swap, &balances, slippage, true)
                        .await?
                        .apply(&mut balances)?
                }
                ZapQuoteStep::Swap { .. } => {
                    fetch_quoted_swap_leg(&self.helpers, step, &balances, slippage)
                        .await?
                        .apply(&mut balances)?
                }
                ZapQuoteStep::Deposit { inputs, output } => {
                    self.build_deposit(inputs, output, slippage, &mut balances)
                        .await?
                }
                ZapQuoteStep::Withdraw { input, outputs } => {
                    self.build_withdraw(input, outputs, slippage, &mut balances)
                        .await?
                }
                ZapQuoteStep::Unused { .. } => continue,
                other => {
                    return Err(ZapError::route_not_found(format!(
                        "liquidity manager cannot build {other:?}"
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
                .chain(&quote.returned)
                .map(|o| o.token.clone())
                .collect(),
        })
    }
}

#[async_trait]
impl ZapStrategy for CowcentratedStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Cowcentrated
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
        let pool = self.load(ZapAction::Deposit).await?;
        let mut quote = ZapQuote::new(option.clone(), inputs.to_vec());
        let shares = match &option.route {
            OptionRoute::AllTokens => {
                let mut amounts = vec![BigUint::zero(), BigUint::zero()];
                for input in inputs {
                    amounts[pool.token_index(&input.token)?] = input.as_token_amount().to_wei()?;
                }
                self.quote_add(&mut quote, &pool, &amounts)?
            }
            OptionRoute::Swap { via: SwapProvider::Wrap, via_token } => {
                let input = inputs[0].as_token_amount();
                quote
                    .steps
                    .push(wrap_quote_step(&input, via_token));
                let wrapped = TokenAmount::new(via_token.clone(), input.amount);
                self.quote_balanced_deposit(&mut quote, &pool, &wrapped)
                    .await?
            }
            OptionRoute::Swap { via: SwapProvider::Aggregator, .. } => {
                let input = inputs[0].as_token_amount();
                debug!(token = %input.token, "Splitting single token deposit by pool value");
                self.quote_balanced_deposit(&mut quote, &pool, &input)
                    .await?
            }
            _ => return Err(unsupported_route(option)),
        };
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
        let pool = self.load(ZapAction::Withdraw).await?;
        let shares = inputs[0].as_token_amount();
        let removed = amounts_of(pool.tokens(), &pool.remove_liquidity(&shares.to_wei()?)?)?;
        let mut quote = ZapQuote::new(option.clone(), inputs.to_vec());
        quote.steps.push(ZapQuoteStep::Withdraw {
            input: shares,
            outputs: removed.clone(),
        });
        quote.outputs = match &option.route {
            OptionRoute::AllTokens => removed,
            OptionRoute::Swap { via: SwapProvider::Wrap, via_token } => {
                let wrapped = self
                    .quote_swaps_into(&mut quote, &removed, via_token)
                    .await?;
                let native = via_token.chain.native_token();
                quote
                    .steps
                    .push(wrap_quote_step(&wrapped, &native));
                vec![TokenAmount::new(native, wrapped.amount)]
            }
            OptionRoute::Swap { via: SwapProvider::Aggregator, .. } => {
                let wanted = option
                    .user_token()
                    .ok_or_else(|| unsupported_route(option))?
                    .clone();
                vec![self
                    .quote_swaps_into(&mut quote, &removed, &wanted)
                    .await?]
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
impl ComposableStrategy for CowcentratedStrategy {
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
