//! Zap strategies: per protocol route discovery, quoting and step building.
//!
//! A strategy is built once per vault from configuration. Strategies that wrap other
//! strategies (composers, cross-chain) resolve them lazily through a [`StrategyLink`] the
//! first time they are used, since the strategies they depend on may be built later.

pub mod balancer;
pub mod composer;
pub mod cowcentrated;
pub mod cross_chain;
pub mod curve;
pub mod helpers;
pub mod pool;
pub mod single;
pub mod swap;
pub mod uniswap_like;

use std::{
    fmt,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::OnceCell;
use zap_common::{
    errors::ZapError,
    models::{
        quote::{StrategyId, ZapOption, ZapQuote},
        token::{InputTokenAmount, Token},
        vault::Vault,
        zap::{ZapOrder, ZapStep},
        Address,
    },
    zap::Balances,
};

use self::{
    balancer::BalancerStrategy, composer::ComposerStrategy, cowcentrated::CowcentratedStrategy,
    cross_chain::CrossChainStrategy, curve::CurveStrategy, helpers::ZapHelpers,
    single::SingleStrategy, uniswap_like::UniswapLikeStrategy,
};
use crate::config::StrategyConfig;

/// Who receives the order and how much slippage it tolerates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    pub user: Address,
    pub recipient: Address,
    pub slippage: Decimal,
}

impl StepContext {
    /// Rejects slippage outside `[0, 1)` before any build work.
    pub fn validate(&self) -> Result<(), ZapError> {
        helpers::validate_slippage(self.slippage)
    }
}

/// Steps of a route without its final outputs, so another strategy can continue from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserlessZapBreakdown {
    pub inputs: Vec<InputTokenAmount>,
    pub steps: Vec<ZapStep>,
    /// Worst case ledger after the last step.
    pub balances: Balances,
    /// Tokens the route is expected to end with.
    pub expected_tokens: Vec<Token>,
}

#[async_trait]
pub trait ZapStrategy: Send + Sync + fmt::Debug {
    fn id(&self) -> StrategyId;

    fn vault(&self) -> &Vault;

    async fn fetch_deposit_options(&self) -> Result<Vec<ZapOption>, ZapError>;

    async fn fetch_deposit_quote(
        &self,
        inputs: &[InputTokenAmount],
        option: &ZapOption,
    ) -> Result<ZapQuote, ZapError>;

    async fn fetch_deposit_step(
        &self,
        quote: &ZapQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError>;

    async fn fetch_withdraw_options(&self) -> Result<Vec<ZapOption>, ZapError>;

    async fn fetch_withdraw_quote(
        &self,
        inputs: &[InputTokenAmount],
        option: &ZapOption,
    ) -> Result<ZapQuote, ZapError>;

    async fn fetch_withdraw_step(
        &self,
        quote: &ZapQuote,
        ctx: &StepContext,
    ) -> Result<ZapOrder, ZapError>;
}

/// A strategy whose steps can run inside another strategy's order.
///
/// The ledger is passed in by value, updated with every step's consumed inputs and minimum
/// outputs, and handed back in the breakdown.
#[async_trait]
pub trait ComposableStrategy: ZapStrategy {
    async fn fetch_deposit_userless_breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError>;

    async fn fetch_withdraw_userless_breakdown(
        &self,
        quote: &ZapQuote,
        slippage: Decimal,
        balances: Balances,
    ) -> Result<UserlessZapBreakdown, ZapError>;
}

/// Looks up strategies of other vaults.
pub trait StrategyResolver: Send + Sync {
    fn strategies(&self, vault_id: &str) -> Result<Vec<Arc<Strategy>>, ZapError>;
}

/// A dependency on other strategies, resolved once on first use.
pub struct StrategyLink<T> {
    cell: OnceCell<T>,
    resolver: Weak<dyn StrategyResolver>,
}

impl<T> StrategyLink<T> {
    pub fn new(resolver: Weak<dyn StrategyResolver>) -> Self {
        Self { cell: OnceCell::new(), resolver }
    }

    pub fn is_linked(&self) -> bool {
        self.cell.initialized()
    }

    /// Resolves the link with `link` unless already resolved. A failed resolution is retried
    /// on the next call.
    pub async fn ensure_linked<F>(&self, link: F) -> Result<&T, ZapError>
    where
        F: FnOnce(&dyn StrategyResolver) -> Result<T, ZapError>,
    {
        self.cell
            .get_or_try_init(|| async move {
                let resolver = self
                    .resolver
                    .upgrade()
                    .ok_or_else(|| ZapError::Config("strategy registry dropped".to_string()))?;
                link(resolver.as_ref())
            })
            .await
    }
}

impl<T> fmt::Debug for StrategyLink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyLink")
            .field("linked", &self.is_linked())
            .finish()
    }
}

/// Every supported strategy; dispatch is a closed match.
#[derive(Debug)]
pub enum Strategy {
    Single(SingleStrategy),
    UniswapLike(UniswapLikeStrategy),
    Curve(CurveStrategy),
    Balancer(BalancerStrategy),
    Cowcentrated(CowcentratedStrategy),
    Composer(ComposerStrategy),
    CrossChain(CrossChainStrategy),
}

impl Strategy {
    /// Builds and validates the strategy configured for `vault`.
    pub fn build(
        config: &StrategyConfig,
        vault: Vault,
        helpers: Arc<ZapHelpers>,
        resolver: Weak<dyn StrategyResolver>,
    ) -> Result<Self, ZapError> {
        let strategy = match config {
            StrategyConfig::Single => Strategy::Single(SingleStrategy::new(vault, helpers)?),
            StrategyConfig::UniswapLike { pool, router } => {
                Strategy::UniswapLike(UniswapLikeStrategy::new(vault, pool, router, helpers)?)
            }
            StrategyConfig::Curve { pool } => {
                Strategy::Curve(CurveStrategy::new(vault, pool, helpers)?)
            }
            StrategyConfig::Balancer { pool, balancer_vault, pool_type } => Strategy::Balancer(
                BalancerStrategy::new(vault, pool, balancer_vault, *pool_type, helpers)?,
            ),
            StrategyConfig::Cowcentrated => {
                Strategy::Cowcentrated(CowcentratedStrategy::new(vault, helpers)?)
            }
            StrategyConfig::GovComposer { underlying_vault_id } |
            StrategyConfig::VaultComposer { underlying_vault_id } => {
                Strategy::Composer(ComposerStrategy::new(
                    config.id(),
                    vault,
                    underlying_vault_id,
                    helpers,
                    resolver,
                )?)
            }
            StrategyConfig::CrossChain { source_chains } => Strategy::CrossChain(
                CrossChainStrategy::new(vault, source_chains, helpers, resolver)?,
            ),
        };
        Ok(strategy)
    }

    pub fn as_strategy(&self) -> &dyn ZapStrategy {
        match self {
            Strategy::Single(s) => s,
            Strategy::UniswapLike(s) => s,
            Strategy::Curve(s) => s,
            Strategy::Balancer(s) => s,
            Strategy::Cowcentrated(s) => s,
            Strategy::Composer(s) => s,
            Strategy::CrossChain(s) => s,
        }
    }

    pub fn as_composable(&self) -> Option<&dyn ComposableStrategy> {
        match self {
            Strategy::Single(s) => Some(s),
            Strategy::UniswapLike(s) => Some(s),
            Strategy::Curve(s) => Some(s),
            Strategy::Balancer(s) => Some(s),
            Strategy::Cowcentrated(s) => Some(s),
            Strategy::Composer(_) | Strategy::CrossChain(_) => None,
        }
    }

    pub fn id(&self) -> StrategyId {
        self.as_strategy().id()
    }
}
