//! Aggregator and wrap legs shared by every strategy.

use futures03::future::join_all;
use itertools::Itertools;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, warn};
use zap_common::{
    errors::ZapError,
    models::{
        quote::{OptionRoute, SelectionOrder, StrategyId, SwapProvider, SwapVia, ZapOption, ZapQuoteStep},
        swap::{QuoteRequest, QuoteResponse, SwapRequest},
        token::{Token, TokenAmount},
        zap::{BalanceInsert, StepToken, ZapAction, ZapStep},
        Chain,
    },
    zap::Balances,
};
use zap_ethereum::calls::token::{unwrap_step, wrap_step};

use super::helpers::{check_min_output, ZapHelpers};

/// A planned step with what it takes from and adds to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapLeg {
    pub step: ZapStep,
    pub input: TokenAmount,
    pub min_output: TokenAmount,
}

impl SwapLeg {
    /// Moves the leg's input out of the ledger and its minimum output in.
    pub fn apply(self, balances: &mut Balances) -> Result<ZapStep, ZapError> {
        balances.subtract(&self.input)?;
        balances.add(&self.min_output)?;
        Ok(self.step)
    }
}

/// Tokens the aggregator can convert into each of `tokens`, keyed by the first token that
/// accepts them. An unreachable aggregator yields no tokens.
pub async fn fetch_supported_tokens(
    helpers: &ZapHelpers,
    tokens: &[Token],
    vault_id: &str,
    chain: Chain,
) -> Vec<(Token, Token)> {
    let support = match helpers
        .aggregator
        .fetch_token_support(tokens, vault_id, chain)
        .await
    {
        Ok(support) => support,
        Err(err) => {
            warn!(%vault_id, %chain, error = %err, "Aggregator token support unavailable");
            return Vec::new();
        }
    };
    let Some(first) = tokens.first() else {
        return Vec::new();
    };
    support
        .any
        .into_iter()
        .map(|token| (token, first.clone()))
        .chain(
            support
                .per_token
                .into_iter()
                .zip(tokens)
                .flat_map(|(supported, via)| {
                    supported
                        .into_iter()
                        .map(move |token| (token, via.clone()))
                }),
        )
        .filter(|(token, _)| token.chain == chain && !tokens.contains(token))
        .unique_by(|(token, _)| token.clone())
        .collect()
}

/// One option per aggregator token, routed through the pool or vault token accepting it.
pub fn aggregator_options(
    strategy_id: StrategyId,
    vault_id: &str,
    action: ZapAction,
    vault_token: &Token,
    supported: Vec<(Token, Token)>,
    exclude: &[Token],
) -> Vec<ZapOption> {
    supported
        .into_iter()
        .filter(|(token, _)| !exclude.contains(token))
        .map(|(token, via_token)| {
            let (inputs, outputs) = match action {
                ZapAction::Deposit => (vec![token], vec![vault_token.clone()]),
                ZapAction::Withdraw => (vec![vault_token.clone()], vec![token]),
            };
            ZapOption::new(
                strategy_id,
                vault_id,
                vault_token.chain,
                action,
                inputs,
                outputs,
                SelectionOrder::Other,
                OptionRoute::Swap { via: SwapProvider::Aggregator, via_token },
            )
        })
        .collect()
}

/// Best accepted aggregator quote for converting `from` into `to`.
pub async fn fetch_best_quote(
    helpers: &ZapHelpers,
    from: &TokenAmount,
    to: &Token,
    vault_id: &str,
) -> Result<QuoteResponse, ZapError> {
    let request = QuoteRequest::new(from, to, vault_id);
    let quotes = helpers
        .aggregator
        .fetch_quotes(&request)
        .await?;
    let filter = &helpers.settings.aggregator_filter;
    quotes
        .into_iter()
        .filter(|quote| filter.accepts(&quote.provider_id))
        .max_by(|a, b| a.to_amount.cmp(&b.to_amount))
        .ok_or_else(|| ZapError::route_not_found(format!("no aggregator quote for {from} to {to}")))
}

/// Best quotes for several legs at once; a failing leg yields `None`.
pub async fn fetch_best_quotes(
    helpers: &ZapHelpers,
    legs: &[(TokenAmount, Token)],
    vault_id: &str,
) -> Vec<Option<QuoteResponse>> {
    join_all(
        legs.iter()
            .map(|(from, to)| fetch_best_quote(helpers, from, to, vault_id)),
    )
    .await
    .into_iter()
    .zip(legs)
    .map(|(result, (from, to))| match result {
        Ok(quote) => Some(quote),
        Err(err) => {
            debug!(%from, %to, error = %err, "Aggregator leg dropped");
            None
        }
    })
    .collect()
}

pub fn aggregator_quote_step(quote: &QuoteResponse) -> ZapQuoteStep {
    ZapQuoteStep::Swap {
        via: SwapVia::Aggregator(quote.clone()),
        from: quote.from(),
        to: quote.to(),
        fee: quote.fee,
    }
}

/// Native to wrapped native or back, always 1:1.
pub fn wrap_quote_step(from: &TokenAmount, to: &Token) -> ZapQuoteStep {
    ZapQuoteStep::Swap {
        via: SwapVia::Wrap,
        from: from.clone(),
        to: TokenAmount::new(to.clone(), from.amount),
        fee: Default::default(),
    }
}

/// Builds the swap of a quoted aggregator leg.
///
/// A full leg consumes the router's whole balance of the input token and lets the router
/// insert it into the call. A partial leg swaps exactly the quoted amount and leaves the
/// remainder for later steps.
pub async fn fetch_swap_leg(
    helpers: &ZapHelpers,
    quote: &QuoteResponse,
    balances: &Balances,
    slippage: Decimal,
    partial: bool,
) -> Result<SwapLeg, ZapError> {
    let quoted = quote.from();
    if !quoted.is_positive() {
        return Err(ZapError::route_not_found(format!("empty aggregator leg from {quoted}")));
    }
    let input = if partial { quoted.clone() } else { balances.get_amount(&quoted.token) };
    let ratio = input.amount / quoted.amount;
    let router = helpers.router(quoted.token.chain)?;
    let request = SwapRequest { quote: quote.clone(), from_address: router, slippage };
    let swap = helpers
        .aggregator
        .fetch_swap(&quote.provider_id, &request)
        .await?;

    check_min_output(&quote.to(), Decimal::ONE, &TokenAmount::new(quote.to_token.clone(), swap.to_amount), slippage)?;

    let min_output = (swap.to_amount_min * ratio.min(Decimal::ONE))
        .round_dp_with_strategy(quote.to_token.decimals, RoundingStrategy::ToZero);
    let index = match swap.tx.input_position {
        Some(position) if !partial => BalanceInsert::At(position),
        _ => BalanceInsert::NotDynamic,
    };
    Ok(SwapLeg {
        step: ZapStep {
            target: swap.tx.target,
            value: swap.tx.value,
            data: swap.tx.data,
            tokens: vec![StepToken::new(quoted.token.address.clone(), index)],
        },
        input,
        min_output: TokenAmount::new(quote.to_token.clone(), min_output),
    })
}

/// Wraps the ledger's whole native balance.
pub fn wrap_leg(native: &Token, balances: &Balances) -> Result<SwapLeg, ZapError> {
    let input = balances.get_amount(native);
    let wrapped = native.chain.wrapped_native_token();
    let step = wrap_step(&wrapped, &input.to_wei()?)?;
    let min_output = TokenAmount::new(wrapped, input.amount);
    Ok(SwapLeg { step, input, min_output })
}

/// Unwraps the ledger's whole wrapped native balance.
pub fn unwrap_leg(wrapped: &Token, balances: &Balances) -> Result<SwapLeg, ZapError> {
    let input = balances.get_amount(wrapped);
    let step = unwrap_step(wrapped, &input.to_wei()?)?;
    let min_output = TokenAmount::new(wrapped.chain.native_token(), input.amount);
    Ok(SwapLeg { step, input, min_output })
}

/// Builds whichever kind of swap the quote step describes. Pool swaps are protocol specific
/// and are rejected here.
pub async fn fetch_quoted_swap_leg(
    helpers: &ZapHelpers,
    step: &ZapQuoteStep,
    balances: &Balances,
    slippage: Decimal,
) -> Result<SwapLeg, ZapError> {
    match step {
        ZapQuoteStep::Swap { via: SwapVia::Aggregator(quote), .. } => {
            fetch_swap_leg(helpers, quote, balances, slippage, false).await
        }
        ZapQuoteStep::Swap { via: SwapVia::Wrap, from, .. } if from.token.is_native() => {
            wrap_leg(&from.token, balances)
        }
        ZapQuoteStep::Swap { via: SwapVia::Wrap, from, .. } => unwrap_leg(&from.token, balances),
        other => Err(ZapError::route_not_found(format!("not an external swap: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};
    use num_bigint::BigUint;
    use rust_decimal_macros::dec;
    use zap_common::{
        errors::ProviderError,
        models::swap::{QuoteFilter, TokenSupport},
        traits::MockSwapAggregator,
    };

    use super::*;
    use crate::test_fixtures::{helpers_with, quote_response, swap_response, token, usdc, weth};

    #[tokio::test]
    async fn test_best_quote_respects_filter() {
        let mut aggregator = MockSwapAggregator::new();
        aggregator
            .expect_fetch_quotes()
            .returning(|_| {
                Ok(vec![
                    quote_response("odos", &usdc(), dec!(100), &weth(), dec!(0.05)),
                    quote_response("kyber", &usdc(), dec!(100), &weth(), dec!(0.04)),
                ])
            });
        let mut helpers = helpers_with(aggregator);
        helpers.settings.aggregator_filter =
            QuoteFilter { allow: None, block: vec!["odos".to_string()] };

        let best = fetch_best_quote(&helpers, &TokenAmount::new(usdc(), dec!(100)), &weth(), "v")
            .await
            .unwrap();

        assert_eq!(best.provider_id, "kyber");
    }

    #[tokio::test]
    async fn test_failed_legs_become_none() {
        let mut aggregator = MockSwapAggregator::new();
        aggregator
            .expect_fetch_quotes()
            .returning(|request| {
                if request.to_token == weth() {
                    Err(ProviderError::Aggregator("timeout".to_string()))
                } else {
                    Ok(vec![quote_response("kyber", &request.from_token, request.from_amount, &request.to_token, dec!(3))])
                }
            });
        let helpers = helpers_with(aggregator);
        let from = TokenAmount::new(usdc(), dec!(10));

        let quotes = fetch_best_quotes(
            &helpers,
            &[(from.clone(), weth()), (from, token("dd", "DAI", 18))],
            "v",
        )
        .await;

        assert!(quotes[0].is_none());
        assert_eq!(quotes[1].as_ref().unwrap().to_amount, dec!(3));
    }

    #[tokio::test]
    async fn test_supported_tokens_dedup_and_exclude_targets() {
        let mut aggregator = MockSwapAggregator::new();
        aggregator
            .expect_fetch_token_support()
            .returning(|_, _, _| {
                Ok(TokenSupport {
                    any: vec![token("dd", "DAI", 18)],
                    per_token: vec![vec![token("dd", "DAI", 18), weth()], vec![token("ee", "OP", 18)]],
                })
            });
        let helpers = helpers_with(aggregator);

        let supported =
            fetch_supported_tokens(&helpers, &[usdc(), weth()], "v", usdc().chain).await;

        assert_eq!(
            supported,
            vec![(token("dd", "DAI", 18), usdc()), (token("ee", "OP", 18), weth())]
        );
    }

    #[tokio::test]
    async fn test_swap_leg_scales_minimum_to_ledger() {
        let mut aggregator = MockSwapAggregator::new();
        aggregator
            .expect_fetch_swap()
            .with(eq("kyber"), always())
            .times(1)
            .returning(|_, request| Ok(swap_response(request.quote.to_amount, request.slippage)));
        let helpers = helpers_with(aggregator);
        let quote = quote_response("kyber", &usdc(), dec!(100), &weth(), dec!(0.04));
        let balances = Balances::from_amounts(&[TokenAmount::new(usdc(), dec!(50))]).unwrap();

        let leg = fetch_swap_leg(&helpers, &quote, &balances, dec!(0.01), false)
            .await
            .unwrap();

        assert_eq!(leg.input, TokenAmount::new(usdc(), dec!(50)));
        assert_eq!(leg.min_output, TokenAmount::new(weth(), dec!(0.0198)));
        assert_eq!(leg.step.tokens, vec![StepToken::new(usdc().address, BalanceInsert::At(4))]);
    }

    #[tokio::test]
    async fn test_partial_swap_leg_is_not_dynamic() {
        let mut aggregator = MockSwapAggregator::new();
        aggregator
            .expect_fetch_swap()
            .returning(|_, request| Ok(swap_response(request.quote.to_amount, request.slippage)));
        let helpers = helpers_with(aggregator);
        let quote = quote_response("kyber", &usdc(), dec!(40), &weth(), dec!(0.016));
        let balances = Balances::from_amounts(&[TokenAmount::new(usdc(), dec!(100))]).unwrap();

        let leg = fetch_swap_leg(&helpers, &quote, &balances, dec!(0.01), true)
            .await
            .unwrap();

        assert_eq!(leg.input, TokenAmount::new(usdc(), dec!(40)));
        assert_eq!(leg.step.tokens[0].index, BalanceInsert::NotDynamic);
    }

    #[tokio::test]
    async fn test_swap_leg_fails_when_price_moved() {
        let mut aggregator = MockSwapAggregator::new();
        aggregator
            .expect_fetch_swap()
            .returning(|_, request| {
                Ok(swap_response(request.quote.to_amount * dec!(0.9), request.slippage))
            });
        let helpers = helpers_with(aggregator);
        let quote = quote_response("kyber", &usdc(), dec!(100), &weth(), dec!(0.04));
        let balances = Balances::from_amounts(&[TokenAmount::new(usdc(), dec!(100))]).unwrap();

        let err = fetch_swap_leg(&helpers, &quote, &balances, dec!(0.01), false)
            .await
            .unwrap_err();

        assert!(err.is_stale_quote());
    }

    #[test]
    fn test_wrap_leg_moves_whole_native_balance() {
        let native = usdc().chain.native_token();
        let mut balances = Balances::from_amounts(&[TokenAmount::new(native.clone(), dec!(1.5))]).unwrap();

        let step = wrap_leg(&native, &balances)
            .unwrap()
            .apply(&mut balances)
            .unwrap();

        assert_eq!(balances.get(&native), Decimal::ZERO);
        assert_eq!(balances.get(&weth()), dec!(1.5));
        assert_eq!(step.value, BigUint::from(1_500_000_000_000_000_000u64));
    }
}
