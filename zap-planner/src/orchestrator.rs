//! Entry point: fans requests out over a vault's strategies and merges what comes back.

use std::{cmp::Reverse, sync::Arc};

use futures03::future::join_all;
use tracing::{debug, instrument, warn};
use zap_common::{
    errors::ZapError,
    models::{
        quote::{ZapOption, ZapQuote},
        token::InputTokenAmount,
        zap::{ZapAction, ZapOrder},
    },
    traits::{BridgeProvider, PoolStateReader, StateSnapshot, SwapAggregator},
    zap::math::total_value,
};

use crate::{
    bridge::CctpBridge,
    config::ZapConfig,
    registry::StrategyRegistry,
    strategy::{helpers::ZapHelpers, StepContext, Strategy, StrategyResolver},
};

/// Keeps the successes of a fan-out, or returns the first failure when nothing succeeded.
fn merge<T>(results: Vec<Result<T, ZapError>>, what: &str) -> Result<Vec<T>, ZapError> {
    let mut first_error = None;
    let mut merged = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(value) => merged.push(value),
            Err(err) => {
                warn!(error = %err, "{what} failed");
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) if merged.is_empty() => Err(err),
        _ => Ok(merged),
    }
}

/// Orders quotes best first: highest output value, then lowest price impact.
pub fn rank_quotes(mut quotes: Vec<ZapQuote>, state: &dyn StateSnapshot) -> Vec<ZapQuote> {
    quotes.sort_by_cached_key(|quote| {
        (Reverse(total_value(&quote.outputs, state)), quote.price_impact)
    });
    quotes
}

pub struct ZapOrchestrator {
    registry: Arc<StrategyRegistry>,
    helpers: Arc<ZapHelpers>,
}

impl ZapOrchestrator {
    /// Builds the bridge from the configuration, then every configured strategy.
    pub fn new(
        config: &ZapConfig,
        state: Arc<dyn StateSnapshot>,
        aggregator: Arc<dyn SwapAggregator>,
        pools: Arc<dyn PoolStateReader>,
    ) -> Result<Self, ZapError> {
        let bridge = match &config.bridge {
            Some(bridge) => Some(Arc::new(CctpBridge::new(bridge.clone())?) as Arc<dyn BridgeProvider>),
            None => None,
        };
        let helpers = ZapHelpers { state, aggregator, pools, bridge, settings: config.settings.clone() };
        Self::with_helpers(config, Arc::new(helpers))
    }

    pub fn with_helpers(config: &ZapConfig, helpers: Arc<ZapHelpers>) -> Result<Self, ZapError> {
        let registry = StrategyRegistry::build(config, helpers.clone())?;
        Ok(Self { registry, helpers })
    }

    fn strategy_for(&self, option: &ZapOption) -> Result<Arc<Strategy>, ZapError> {
        self.registry
            .strategies(&option.vault_id)?
            .into_iter()
            .find(|s| s.id() == option.strategy_id)
            .ok_or_else(|| {
                ZapError::route_not_found(format!(
                    "vault {} has no {} strategy",
                    option.vault_id, option.strategy_id
                ))
            })
    }

    async fn options(&self, vault_id: &str, action: ZapAction) -> Result<Vec<ZapOption>, ZapError> {
        let strategies = self.registry.strategies(vault_id)?;
        let results = join_all(strategies.iter().map(|strategy| async move {
            let strategy = strategy.as_strategy();
            match action {
                ZapAction::Deposit => strategy.fetch_deposit_options().await,
                ZapAction::Withdraw => strategy.fetch_withdraw_options().await,
            }
        }))
        .await;
        let mut options: Vec<ZapOption> = merge(results, "Option discovery")?
            .into_iter()
            .flatten()
            .collect();
        options.sort_by_key(|o| o.selection_order);
        debug!(vault = %vault_id, %action, count = options.len(), "Collected options");
        Ok(options)
    }

    async fn quotes(
        &self,
        inputs: &[InputTokenAmount],
        options: &[ZapOption],
        action: ZapAction,
    ) -> Result<Vec<ZapQuote>, ZapError> {
        if options.is_empty() {
            return Err(ZapError::route_not_found("no options to quote"));
        }
        let results = join_all(options.iter().map(|option| async move {
            if option.action != action {
                return Err(ZapError::route_not_found(format!("{} is not a {action} option", option.id)));
            }
            let strategy = self.strategy_for(option)?;
            let strategy = strategy.as_strategy();
            match action {
                ZapAction::Deposit => strategy.fetch_deposit_quote(inputs, option).await,
                ZapAction::Withdraw => strategy.fetch_withdraw_quote(inputs, option).await,
            }
        }))
        .await;
        let quotes = merge(results, "Quote")?;
        Ok(rank_quotes(quotes, self.helpers.state.as_ref()))
    }

    #[instrument(skip(self))]
    pub async fn fetch_deposit_options(&self, vault_id: &str) -> Result<Vec<ZapOption>, ZapError> {
        self.options(vault_id, ZapAction::Deposit)
            .await
    }

    #[instrument(skip(self))]
    pub async fn fetch_withdraw_options(&self, vault_id: &str) -> Result<Vec<ZapOption>, ZapError> {
        self.options(vault_id, ZapAction::Withdraw)
            .await
    }

    /// Quotes every option for the same inputs, best quote first.
    #[instrument(skip_all, fields(options = options.len()))]
    pub async fn fetch_deposit_quotes(
        &self,
        inputs: &[InputTokenAmount],
        options: &[ZapOption],
    ) -> Result<Vec<ZapQuote>, ZapError> {
        self.quotes(inputs, options, ZapAction::Deposit)
            .await
    }

    #[instrument(skip_all, fields(options = options.len()))]
    pub async fn fetch_withdraw_quotes(
        &self,
        inputs: &[InputTokenAmount],
        options: &[ZapOption],
    ) -> Result<Vec<ZapQuote>, ZapError> {
        self.quotes(inputs, options, ZapAction::Withdraw)
            .await
    }

    #[instrument(skip_all, fields(quote = %quote.id, option = %quote.option.id))]
    pub async fn fetch_deposit_step(
        &self,
        quote: &ZapQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError> {
        self.strategy_for(&quote.option)?
            .as_strategy()
            .fetch_deposit_step(quote, ctx)
            .await
    }

    #[instrument(skip_all, fields(quote = %quote.id, option = %quote.option.id))]
    pub async fn fetch_withdraw_step(
        &self,
        quote: &ZapQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError> {
        self.strategy_for(&quote.option)?
            .as_strategy()
            .fetch_withdraw_step(quote, ctx)
            .await
    }
}
