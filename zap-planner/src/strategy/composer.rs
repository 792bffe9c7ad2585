//! Strategies that put another vault's shares to work.
//!
//! A gov composer stakes the shares minted by an underlying strategy into a reward pool; a
//! vault composer deposits them into a second vault. Withdrawals unstake or redeem first and
//! hand the released shares to the underlying strategy.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use zap_common::{
    errors::ZapError,
    models::{
        quote::{OptionRoute, SelectionOrder, StrategyId, ZapOption, ZapQuote, ZapQuoteStep},
        token::{InputTokenAmount, Token, TokenAmount},
        vault::{Vault, VaultKind},
        zap::{ZapAction, ZapOrder, ZapStep},
        VaultId,
    },
    traits::VaultAdapter,
    zap::Balances,
};

use super::{
    helpers::{
        close_order, finalize_quote, inner_steps, seed_balances, unsupported_route,
        validate_inputs, vault_deposit_leg, vault_deposit_quote, vault_withdraw_leg,
        vault_withdraw_quote, ZapHelpers,
    },
    ComposableStrategy, StepContext, Strategy, StrategyLink, StrategyResolver,
    UserlessZapBreakdown, ZapStrategy,
};

#[derive(Debug)]
pub struct ComposerStrategy {
    id: StrategyId,
    vault: Vault,
    underlying_vault_id: VaultId,
    adapter: Arc<dyn VaultAdapter>,
    helpers: Arc<ZapHelpers>,
    underlying: StrategyLink<Arc<Strategy>>,
}

impl ComposerStrategy {
    pub fn new(
        id: StrategyId,
        vault: Vault,
        underlying_vault_id: &str,
        helpers: Arc<ZapHelpers>,
        resolver: Weak<dyn StrategyResolver>,
    ) -> Result<Self, ZapError> {
        let kind_matches = match id {
            StrategyId::GovComposer => vault.kind == VaultKind::Gov,
            StrategyId::VaultComposer => {
                matches!(vault.kind, VaultKind::Standard | VaultKind::Erc4626)
            }
            _ => false,
        };
        if !kind_matches {
            return Err(ZapError::Config(format!(
                "{id} cannot wrap {:?} vault {}",
                vault.kind, vault.id
            )));
        }
        if underlying_vault_id == vault.id {
            return Err(ZapError::Config(format!("{} cannot compose itself", vault.id)));
        }
        let adapter = helpers.vault_adapter(&vault)?;
        Ok(Self {
            id,
            vault,
            underlying_vault_id: underlying_vault_id.to_string(),
            adapter,
            helpers,
            underlying: StrategyLink::new(resolver),
        })
    }

    /// The first composable strategy of the underlying vault whose shares this vault takes.
    async fn underlying(&self) -> Result<&dyn ComposableStrategy, ZapError> {
        let strategy = self
            .underlying
            .ensure_linked(|resolver| {
                let strategy = resolver
                    .strategies(&self.underlying_vault_id)?
                    .into_iter()
                    .find(|s| s.as_composable().is_some())
                    .ok_or_else(|| {
                        ZapError::Config(format!(
                            "vault {} has no composable strategy",
                            self.underlying_vault_id
                        ))
                    })?;
                let shares = &strategy.as_strategy().vault().share_token;
                if shares != self.adapter.deposit_token() {
                    return Err(ZapError::Config(format!(
                        "{} takes {}, {} mints {shares}",
                        self.vault.id,
                        self.adapter.deposit_token(),
                        self.underlying_vault_id
                    )));
                }
                debug!(vault = %self.vault.id, underlying = %self.underlying_vault_id, "Linked composer");
                Ok(strategy)
            })
            .await?;
        strategy
            .as_composable()
            .ok_or_else(|| ZapError::Config(format!("{} is not composable", strategy.id())))
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
            self.id,
            &self.vault.id,
            self.vault.chain,
            action,
            inputs,
            outputs,
            selection_order,
            route,
        )
    }

    /// The underlying option presented as one of this vault's options.
    fn relabel(&self, underlying: ZapOption) -> ZapOption {
        let share = self.adapter.share_token().clone();
        let (inputs, outputs) = match underlying.action {
            ZapAction::Deposit => (underlying.input_tokens.clone(), vec![share]),
            ZapAction::Withdraw => (vec![share], underlying.output_tokens.clone()),
        };
        ZapOption::new(
            self.id,
            &self.vault.id,
            self.vault.chain,
            underlying.action,
            inputs,
            outputs,
            underlying.selection_order,
            underlying.route.clone(),
        )
        .with_underlying(underlying)
    }

    async fn options(&self, action: ZapAction) -> Result<Vec<ZapOption>, ZapError> {
        let underlying = self.underlying().await?;
        let forwarded = match action {
            ZapAction::Deposit => underlying.fetch_deposit_options().await?,
            ZapAction::Withdraw => underlying.fetch_withdraw_options().await?,
        };
        let mut options = vec![self.option(
            action,
            self.adapter.deposit_token().clone(),
            SelectionOrder::VaultToken,
            OptionRoute::Direct,
        )];
        options.extend(
            forwarded
                .into_iter()
                .map(|option| self.relabel(option)),
        );
        Ok(options)
    }

    fn quote_enter(&self, assets: &TokenAmount) -> Result<(ZapQuoteStep, TokenAmount), ZapError> {
        let (step, shares) = vault_deposit_quote(self.adapter.as_ref(), assets)?;
        if self.id == StrategyId::GovComposer {
            return Ok((ZapQuoteStep::Stake { input: assets.clone(), output: shares.clone() }, shares));
        }
        Ok((step, shares))
    }

    fn quote_exit(&self, shares: &TokenAmount) -> Result<(ZapQuoteStep, TokenAmount), ZapError> {
        let (step, assets) = vault_withdraw_quote(self.adapter.as_ref(), shares)?;
        if self.id == StrategyId::GovComposer {
            return Ok((ZapQuoteStep::Unstake { input: shares.clone(), output: assets.clone() }, assets));
        }
        Ok((step, assets))
    }

    async fn enter_leg(&self, balances: &mut Balances, slippage: Decimal) -> Result<ZapStep, ZapError> {
        let router = self.helpers.router(self.vault.chain)?;
        vault_deposit_leg(self.adapter.as_ref(), balances, &router, slippage).await
    }

    async fn exit_leg(&self, balances: &mut Balances, slippage: Decimal) -> Result<ZapStep, ZapError> {
        let router = self.helpers.router(self.vault.chain)?;
        vault_withdraw_leg(self.adapter.as_ref(), balances, &router, slippage).await
    }
}

#[async_trait]
impl ZapStrategy for ComposerStrategy {
    fn id(&self) -> StrategyId {
        self.id
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
        let assets = match (&option.route, &option.underlying) {
            (OptionRoute::Direct, None) => inputs[0].as_token_amount(),
            (_, Some(underlying_option)) => {
                let underlying_quote = self
                    .underlying()
                    .await?
                    .fetch_deposit_quote(inputs, underlying_option)
                    .await?;
                let assets = underlying_quote
                    .outputs
                    .iter()
                    .find(|o| &o.token == self.adapter.deposit_token())
                    .cloned()
                    .ok_or_else(|| unsupported_route(option))?;
                quote
                    .steps
                    .extend(inner_steps(&underlying_quote));
                quote.returned = underlying_quote.returned.clone();
                quote.underlying = Some(Box::new(underlying_quote));
                assets
            }
            _ => return Err(unsupported_route(option)),
        };
        let (step, shares) = self.quote_enter(&assets)?;
        quote.steps.push(step);
        quote.outputs = vec![shares];
        finalize_quote(quote, &self.helpers)
    }

    async fn fetch_deposit_step(
        &self,
        quote: &ZapQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError> {
        ctx.validate()?;
        let balances = seed_balances(&quote.inputs)?;
        let mut breakdown = match &quote.underlying {
            Some(underlying_quote) => {
                self.underlying()
                    .await?
                    .fetch_deposit_userless_breakdown(underlying_quote, ctx.slippage, balances)
                    .await?
            }
            None => UserlessZapBreakdown {
                inputs: quote.inputs.clone(),
                steps: Vec::new(),
                balances,
                expected_tokens: Vec::new(),
            },
        };
        let step = self
            .enter_leg(&mut breakdown.balances, ctx.slippage)
            .await?;
        breakdown.steps.push(step);
        breakdown.inputs = quote.inputs.clone();
        breakdown
            .expected_tokens
            .push(self.adapter.share_token().clone());
        close_order(quote, &quote.outputs, ctx, breakdown)
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
        let (step, assets) = self.quote_exit(&inputs[0].as_token_amount())?;
        quote.steps.push(step);
        quote.outputs = match (&option.route, &option.underlying) {
            (OptionRoute::Direct, None) => vec![assets],
            (_, Some(underlying_option)) => {
                let released = InputTokenAmount::new(assets.token.clone(), assets.amount, false);
                let underlying_quote = self
                    .underlying()
                    .await?
                    .fetch_withdraw_quote(&[released], underlying_option)
                    .await?;
                quote
                    .steps
                    .extend(inner_steps(&underlying_quote));
                quote.returned = underlying_quote.returned.clone();
                let outputs = underlying_quote.outputs.clone();
                quote.underlying = Some(Box::new(underlying_quote));
                outputs
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
        ctx.validate()?;
        let mut balances = seed_balances(&quote.inputs)?;
        let exit = self
            .exit_leg(&mut balances, ctx.slippage)
            .await?;
        let mut breakdown = match &quote.underlying {
            Some(underlying_quote) => {
                self.underlying()
                    .await?
                    .fetch_withdraw_userless_breakdown(underlying_quote, ctx.slippage, balances)
                    .await?
            }
            None => UserlessZapBreakdown {
                inputs: quote.inputs.clone(),
                steps: Vec::new(),
                balances,
                expected_tokens: vec![self.adapter.deposit_token().clone()],
            },
        };
        breakdown.steps.insert(0, exit);
        breakdown.inputs = quote.inputs.clone();
        close_order(quote, &quote.outputs, ctx, breakdown)
    }
}
