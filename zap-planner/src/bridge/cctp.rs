//! Circle CCTP v2 burn and mint bridge for USDC.

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zap_common::{
    errors::{InputError, ZapError},
    models::{
        quote::{BridgeQuote, BridgeTimeEstimate},
        token::{Token, TokenAmount},
        zap::ZapStep,
        Address, Chain,
    },
    traits::BridgeProvider,
    Bytes,
};
use zap_ethereum::calls::cctp::{burn_step, hook_data, BurnCall, FAST_FINALITY_THRESHOLD};

use crate::config::ConfigError;

const USDC_DECIMALS: u32 = 6;
const BPS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CctpChainConfig {
    pub chain: Chain,
    /// CCTP domain id, not the EVM chain id.
    pub domain: u32,
    pub token_messenger: Address,
    pub usdc: Address,
    /// Receives minted USDC on this chain and executes the hook payload.
    pub hook_receiver: Address,
    /// Time to attest and mint a message sent from this chain.
    pub time_estimate: BridgeTimeEstimate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CctpConfig {
    /// Relayer fee charged on the burnt amount.
    pub fee_bps: u32,
    #[serde(default = "CctpConfig::default_min_finality_threshold")]
    pub min_finality_threshold: u32,
    pub chains: Vec<CctpChainConfig>,
}

impl CctpConfig {
    fn default_min_finality_threshold() -> u32 {
        FAST_FINALITY_THRESHOLD
    }
}

#[derive(Debug, Clone)]
pub struct CctpBridge {
    config: CctpConfig,
}

impl CctpBridge {
    pub fn new(config: CctpConfig) -> Result<Self, ConfigError> {
        if config.fee_bps >= BPS {
            return Err(ConfigError::Invalid(format!("cctp fee of {} bps", config.fee_bps)));
        }
        for (i, chain) in config.chains.iter().enumerate() {
            if config.chains[..i]
                .iter()
                .any(|c| c.chain == chain.chain)
            {
                return Err(ConfigError::Invalid(format!("cctp chain {} listed twice", chain.chain)));
            }
        }
        Ok(Self { config })
    }

    fn chain(&self, chain: Chain) -> Result<&CctpChainConfig, ZapError> {
        self.config
            .chains
            .iter()
            .find(|c| c.chain == chain)
            .ok_or_else(|| ZapError::route_not_found(format!("cctp does not support {chain}")))
    }

    fn usdc(config: &CctpChainConfig) -> Token {
        Token::new(&config.usdc, "USDC", USDC_DECIMALS, config.chain)
    }

    fn fee(&self, amount: Decimal) -> Decimal {
        (amount * Decimal::from(self.config.fee_bps) / Decimal::from(BPS))
            .round_dp_with_strategy(USDC_DECIMALS, RoundingStrategy::AwayFromZero)
    }

    fn route(&self, from: &TokenAmount, to_chain: Chain) -> Result<(&CctpChainConfig, &CctpChainConfig), ZapError> {
        let source = self.chain(from.token.chain)?;
        let destination = self.chain(to_chain)?;
        if source.chain == destination.chain {
            return Err(ZapError::route_not_found(format!("cannot bridge {} to itself", to_chain)));
        }
        let usdc = Self::usdc(source);
        if from.token != usdc {
            return Err(InputError::TokenMismatch {
                expected: usdc.to_string(),
                actual: from.token.to_string(),
            }
            .into());
        }
        Ok((source, destination))
    }
}

#[async_trait]
impl BridgeProvider for CctpBridge {
    fn id(&self) -> &str {
        "cctp"
    }

    fn bridge_token(&self, chain: Chain) -> Option<Token> {
        self.chain(chain).ok().map(Self::usdc)
    }

    async fn fetch_bridge_quote(
        &self,
        from: &TokenAmount,
        to_chain: Chain,
    ) -> Result<BridgeQuote, ZapError> {
        if !from.is_positive() {
            return Err(InputError::ZeroAmount { token: from.token.to_string() }.into());
        }
        let (source, destination) = self.route(from, to_chain)?;
        let fee = self.fee(from.amount);
        if fee >= from.amount {
            return Err(ZapError::route_not_found(format!("{from} does not cover the bridge fee")));
        }
        debug!(from = %from, to_chain = %to_chain, fee = %fee, "Quoted CCTP transfer");
        Ok(BridgeQuote {
            provider: self.id().to_string(),
            from: from.clone(),
            to: TokenAmount::new(Self::usdc(destination), from.amount - fee),
            fee: TokenAmount::new(Self::usdc(source), fee),
            time_estimate: source.time_estimate,
        })
    }

    fn build_burn_step(
        &self,
        from: &TokenAmount,
        to_chain: Chain,
        hook_data: &Bytes,
    ) -> Result<ZapStep, ZapError> {
        let (source, destination) = self.route(from, to_chain)?;
        let max_fee = TokenAmount::new(Self::usdc(source), self.fee(from.amount)).to_wei()?;
        let call = BurnCall {
            token_messenger: &source.token_messenger,
            burn_token: &source.usdc,
            destination_domain: destination.domain,
            mint_recipient: &destination.hook_receiver,
            max_fee: &max_fee,
            min_finality_threshold: self.config.min_finality_threshold,
        };
        Ok(burn_step(&call, &from.to_wei()?, hook_data)?)
    }

    fn build_hook_data(&self, to_chain: Chain, payload: &Bytes) -> Result<Bytes, ZapError> {
        self.chain(to_chain)?;
        Ok(hook_data(to_chain.id(), payload))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal_macros::dec;
    use zap_common::models::zap::BalanceInsert;

    use super::*;

    fn config() -> CctpConfig {
        let chain = |chain: Chain, domain: u32, usdc: &str| CctpChainConfig {
            chain,
            domain,
            token_messenger: Bytes::from_str("0x28b5a0e9c621a5badaa536219b3a228c8168cf5d").unwrap(),
            usdc: Bytes::from_str(usdc).unwrap(),
            hook_receiver: Bytes::from_str("0x00000000000000000000000000000000000000fe").unwrap(),
            time_estimate: BridgeTimeEstimate { low_secs: 20, high_secs: 60 },
        };
        CctpConfig {
            fee_bps: 1,
            min_finality_threshold: FAST_FINALITY_THRESHOLD,
            chains: vec![
                chain(Chain::Arbitrum, 3, "0xaf88d065e77c8cc2239327c5edb3a432268e5831"),
                chain(Chain::Base, 6, "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"),
            ],
        }
    }

    #[tokio::test]
    async fn test_quote_charges_fee() {
        let bridge = CctpBridge::new(config()).unwrap();
        let usdc = bridge.bridge_token(Chain::Arbitrum).unwrap();

        let quote = bridge
            .fetch_bridge_quote(&TokenAmount::new(usdc, dec!(1000)), Chain::Base)
            .await
            .unwrap();

        assert_eq!(quote.fee.amount, dec!(0.1));
        assert_eq!(quote.to.amount, dec!(999.9));
        assert_eq!(quote.to.token.chain, Chain::Base);
    }

    #[tokio::test]
    async fn test_quote_rejects_unsupported_routes() {
        let bridge = CctpBridge::new(config()).unwrap();
        let usdc = bridge.bridge_token(Chain::Arbitrum).unwrap();

        let same_chain = bridge
            .fetch_bridge_quote(&TokenAmount::new(usdc.clone(), dec!(10)), Chain::Arbitrum)
            .await;
        let unknown = bridge
            .fetch_bridge_quote(&TokenAmount::new(usdc.clone(), dec!(10)), Chain::Sonic)
            .await;
        let zero = bridge
            .fetch_bridge_quote(&TokenAmount::new(usdc, dec!(0)), Chain::Base)
            .await;

        assert!(matches!(same_chain, Err(ZapError::RouteNotFound(_))));
        assert!(matches!(unknown, Err(ZapError::RouteNotFound(_))));
        assert!(matches!(zero, Err(ZapError::InvalidInput(InputError::ZeroAmount { .. }))));
    }

    #[test]
    fn test_burn_step() {
        let bridge = CctpBridge::new(config()).unwrap();
        let usdc = bridge.bridge_token(Chain::Base).unwrap();

        let step = bridge
            .build_burn_step(&TokenAmount::new(usdc.clone(), dec!(5)), Chain::Arbitrum, &Bytes::new())
            .unwrap();

        assert_eq!(step.tokens[0].token, usdc.address);
        assert_eq!(step.tokens[0].index, BalanceInsert::At(4));
    }

    #[test]
    fn test_rejects_duplicate_chains() {
        let mut config = config();
        config.chains.push(config.chains[0].clone());

        assert!(CctpBridge::new(config).is_err());
    }
}
