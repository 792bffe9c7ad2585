//! Vaults whose deposit token is a single ERC-20.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::instrument;
use zap_common::{
    errors::ZapError,
    models::{
        quote::{OptionRoute, SelectionOrder, StrategyId, SwapProvider, ZapOption, ZapQuote, ZapQuoteStep},
        token::{InputTokenAmount, Token, TokenAmount},
        vault::{Vault, VaultKind},
        zap::{ZapAction, ZapOrder},
    },
    traits::VaultAdapter,
    zap::Balances,
};

use super::{
    helpers::{
        build_order, finalize_quote, unsupported_route, validate_inputs, vault_deposit_leg,
        vault_deposit_quote, vault_withdraw_leg, vault_withdraw_quote, ZapHelpers,
    },
    swap::{
        aggregator_options, aggregator_quote_step, fetch_best_quote, fetch_quoted_swap_leg,
        fetch_supported_tokens, wrap_quote_step,
    },
    ComposableStrategy, StepContext, UserlessZapBreakdown, ZapStrategy,
};

#[derive(Debug)]
pub struct SingleStrategy {
    vault: Vault,
    adapter: Arc<dyn VaultAdapter>,
    helpers: Arc<ZapHelpers>,
}

impl SingleStrategy {
    pub fn new(vault: Vault, helpers: Arc<ZapHelpers>) -> Result<Self, ZapError> {
        if vault.kind == VaultKind::Cowcentrated {
            return Err(ZapError::Config(format!("{} is not a single token vault", vault.id)));
        }
        let adapter = helpers.vault_adapter(&vault)?;
        Ok(Self { vault, adapter, helpers })
    }

    fn option(
        &self,
        action: ZapAction,
        token: Token,
        selection_order: SelectionOrder,
        route: OptionRoute,
    ) -> ZapOption {
        let share = self.adapter.share_token().clone();
        let (inputs, outputs) = match action {
            ZapAction::Deposit => (vec![token], vec![share]),
            ZapAction::Withdraw => (vec![share], vec![token]),
        };
        ZapOption::new(
            StrategyId::Single,
            &self.vault.id,
            self.vault.chain,
            action,
            inputs,
            outputs,
            selection_order,
            route,
        )
    }

    async fn options(&self, action: ZapAction) -> Vec<ZapOption> {
        let deposit_token = self.adapter.deposit_token().clone();
        let mut options = vec![self.option(
            action,
            deposit_token.clone(),
            SelectionOrder::VaultToken,
            OptionRoute::Direct,
        )];
        let mut exclude = vec![deposit_token.clone()];
        if deposit_token.is_wrapped_native() {
            let native = self.vault.chain.native_token();
            options.push(self.option(
                action,
                native.clone(),
                SelectionOrder::VaultToken,
                OptionRoute::Swap { via: SwapProvider::Wrap, via_token: deposit_token.clone() },
            ));
            exclude.push(native);
        }
        let supported = fetch_supported_tokens(
            &self.helpers,
            std::slice::from_ref(&deposit_token),
            &self.vault.id,
            self.vault.chain,
        )
        .await;
        options.extend(aggregator_options(
            StrategyId::Single,
            &self.vault.id,
            action,
            self.adapter.share_token(),
            supported,
            &exclude,
        ));
        options
    }

    /// Replays the quoted steps against the ledger.
    async fn breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        mut balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError> {
        let router = self.helpers.router(self.vault.chain)?;
        let mut steps = Vec::with_capacity(quote.steps.len());
        for step in &quote.steps {
            match step {
                ZapQuoteStep::Swap { .. } => {
                    let leg = fetch_quoted_swap_leg(&self.helpers, step, &balances, slippage).await?;
                    steps.push(leg.apply(&mut balances)?);
                }
                ZapQuoteStep::Deposit { .. } => steps.push(
                    vault_deposit_leg(self.adapter.as_ref(), &mut balances, &router, slippage).await?,
                ),
                ZapQuoteStep::Withdraw { .. } => steps.push(
                    vault_withdraw_leg(self.adapter.as_ref(), &mut balances, &router, slippage)
                        .await?,
                ),
                ZapQuoteStep::Unused { .. } => {}
                other => {
                    return Err(ZapError::route_not_found(format!(
                        "single strategy cannot build {other:?}"
                    )))
                }
            }
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
impl ZapStrategy for SingleStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Single
    }

    fn vault(&self) -> &Vault {
        &self.vault
    }

    async fn fetch_deposit_options(&self) -> Result<Vec<ZapOption>, ZapError> {
        Ok(self.options(ZapAction::Deposit).await)
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
        let assets = match &option.route {
            OptionRoute::Direct => input,
            OptionRoute::Swap { via: SwapProvider::Wrap, via_token } => {
                quote
                    .steps
                    .push(wrap_quote_step(&input, via_token));
                TokenAmount::new(via_token.clone(), input.amount)
            }
            OptionRoute::Swap { via: SwapProvider::Aggregator, via_token } => {
                let swap = fetch_best_quote(&self.helpers, &input, via_token, &self.vault.id).await?;
                quote
                    .steps
                    .push(aggregator_quote_step(&swap));
                swap.to()
            }
            _ => return Err(unsupported_route(option)),
        };
        let (step, shares) = vault_deposit_quote(self.adapter.as_ref(), &assets)?;
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
        Ok(self.options(ZapAction::Withdraw).await)
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
        let (step, assets) = vault_withdraw_quote(self.adapter.as_ref(), &shares)?;
        quote.steps.push(step);
        let wanted = option
            .user_token()
            .ok_or_else(|| unsupported_route(option))?;
        let output = match &option.route {
            OptionRoute::Direct => assets,
            OptionRoute::Swap { via: SwapProvider::Wrap, .. } => {
                quote
                    .steps
                    .push(wrap_quote_step(&assets, wanted));
                TokenAmount::new(wanted.clone(), assets.amount)
            }
            OptionRoute::Swap { via: SwapProvider::Aggregator, .. } => {
                let swap = fetch_best_quote(&self.helpers, &assets, wanted, &self.vault.id).await?;
                quote
                    .steps
                    .push(aggregator_quote_step(&swap));
                swap.to()
            }
            _ => return Err(unsupported_route(option)),
        };
        quote.outputs = vec![output];
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
impl ComposableStrategy for SingleStrategy {
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
