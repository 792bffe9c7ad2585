use std::fmt::Debug;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    errors::{ProviderError, ZapError},
    models::{
        quote::BridgeQuote,
        swap::{QuoteRequest, QuoteResponse, SwapRequest, SwapResponse, TokenSupport},
        token::{InputTokenAmount, Token, TokenAmount},
        vault::Vault,
        zap::ZapStep,
        Address, Chain, ChainConfig,
    },
    simulation::{
        balancer::{stable::StablePool, weighted::WeightedPool},
        concentrated::ConcentratedPool,
        curve::CurvePool,
        uniswap_v2::ConstantProductPool,
    },
    Bytes,
};

/// Client of an external swap-quote aggregator.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    /// Tokens that can be swapped into `tokens` for the given vault.
    async fn fetch_token_support(
        &self,
        tokens: &[Token],
        vault_id: &str,
        chain: Chain,
    ) -> Result<TokenSupport, ProviderError>;

    /// Quotes from every eligible provider, sorted by output amount descending.
    async fn fetch_quotes(&self, request: &QuoteRequest)
        -> Result<Vec<QuoteResponse>, ProviderError>;

    /// Builds the swap transaction for a previously fetched quote.
    async fn fetch_swap(
        &self,
        provider_id: &str,
        request: &SwapRequest,
    ) -> Result<SwapResponse, ProviderError>;
}

/// A request to move tokens in or out of a vault from the zap router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultZapRequest {
    pub inputs: Vec<InputTokenAmount>,
    /// Address holding the tokens when the call executes.
    pub from: Address,
    pub slippage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultZap {
    pub min_outputs: Vec<TokenAmount>,
    pub zap: ZapStep,
}

/// Hides the mechanics of a vault (share based, ERC-4626, staking) behind one shape.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait VaultAdapter: Send + Sync + Debug {
    fn vault(&self) -> &Vault;

    fn deposit_token(&self) -> &Token;

    fn share_token(&self) -> &Token;

    /// Shares expected for depositing `assets`.
    fn convert_to_shares(&self, assets: &TokenAmount) -> Result<TokenAmount, ZapError>;

    /// Assets expected for redeeming `shares`.
    fn convert_to_assets(&self, shares: &TokenAmount) -> Result<TokenAmount, ZapError>;

    async fn fetch_zap_deposit(&self, request: &VaultZapRequest) -> Result<VaultZap, ZapError>;

    async fn fetch_zap_withdraw(&self, request: &VaultZapRequest) -> Result<VaultZap, ZapError>;
}

/// Read-only lookup of token metadata, prices, vaults and chain addresses.
#[cfg_attr(feature = "test-utils", mockall::automock)]
pub trait StateSnapshot: Send + Sync {
    fn token(&self, chain: Chain, address: &Address) -> Option<Token>;

    /// USD price of one whole token.
    fn price(&self, token: &Token) -> Option<Decimal>;

    fn vault(&self, id: &str) -> Option<Vault>;

    fn chain_config(&self, chain: Chain) -> Option<ChainConfig>;
}

/// A burn on source, mint on destination bridge.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait BridgeProvider: Send + Sync {
    fn id(&self) -> &str;

    /// The bridged asset on `chain`, if the chain is supported.
    fn bridge_token(&self, chain: Chain) -> Option<Token>;

    async fn fetch_bridge_quote(
        &self,
        from: &TokenAmount,
        to_chain: Chain,
    ) -> Result<BridgeQuote, ZapError>;

    /// Burns `from` on its chain, minting to the hook receiver on `to_chain` which then runs
    /// `hook_data`. The burn amount is inserted from the router's live balance.
    fn build_burn_step(
        &self,
        from: &TokenAmount,
        to_chain: Chain,
        hook_data: &Bytes,
    ) -> Result<ZapStep, ZapError>;

    /// Wraps a destination payload into hook data understood by the hook receiver.
    fn build_hook_data(&self, to_chain: Chain, payload: &Bytes) -> Result<Bytes, ZapError>;
}

/// Fresh pool state; every call reads the pool again.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait PoolStateReader: Send + Sync {
    async fn constant_product_pool(
        &self,
        chain: Chain,
        address: &Address,
    ) -> Result<ConstantProductPool, ProviderError>;

    async fn curve_pool(&self, chain: Chain, address: &Address)
        -> Result<CurvePool, ProviderError>;

    async fn weighted_pool(
        &self,
        chain: Chain,
        address: &Address,
    ) -> Result<WeightedPool, ProviderError>;

    async fn stable_pool(&self, chain: Chain, address: &Address)
        -> Result<StablePool, ProviderError>;

    async fn concentrated_pool(
        &self,
        chain: Chain,
        address: &Address,
    ) -> Result<ConcentratedPool, ProviderError>;
}
