//! Plans zaps into and out of yield vaults.
//!
//! A zap turns the tokens a user holds into vault shares, or shares back into tokens, in a single
//! transaction executed by an on-chain router. This crate discovers the routes (options) each
//! vault supports, prices them (quotes) and turns a chosen quote into a router order.
//!
//! Entry point is [`orchestrator::ZapOrchestrator`], built from a [`config::ZapConfig`] and the
//! external collaborators in [`strategy::helpers::ZapHelpers`].
pub mod bridge;
pub mod config;
pub mod orchestrator;
pub mod registry;
pub mod strategy;
pub mod vault;

#[cfg(test)]
pub(crate) mod test_fixtures {
    use std::{collections::HashMap, str::FromStr, sync::Arc};

    use num_bigint::BigUint;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use zap_common::{
        models::{
            quote::ZapFee,
            swap::{QuoteResponse, SwapResponse, SwapTx},
            token::Token,
            vault::{Vault, VaultKind},
            Address, Chain, ChainConfig,
        },
        errors::ZapError,
        snapshot::MemorySnapshot,
        traits::{BridgeProvider, MockPoolStateReader, MockSwapAggregator},
        Bytes,
    };

    use crate::{
        config::ZapSettings,
        strategy::{helpers::ZapHelpers, StepContext, Strategy, StrategyResolver},
    };

    /// Resolves vault ids from a fixed map.
    pub struct StaticResolver(pub HashMap<String, Vec<Arc<Strategy>>>);

    impl StrategyResolver for StaticResolver {
        fn strategies(&self, vault_id: &str) -> Result<Vec<Arc<Strategy>>, ZapError> {
            Ok(self
                .0
                .get(vault_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn address(last: &str) -> Address {
        Bytes::from_str(&format!("0x{:0>40}", last)).unwrap()
    }

    /// A token on Base whose address ends in `last`.
    pub fn token(last: &str, symbol: &str, decimals: u32) -> Token {
        Token::new(&address(last), symbol, decimals, Chain::Base)
    }

    pub fn usdc() -> Token {
        token("0c", "USDC", 6)
    }

    pub fn weth() -> Token {
        Chain::Base.wrapped_native_token()
    }

    pub fn router() -> Address {
        address("2a")
    }

    pub fn token_manager() -> Address {
        address("7a")
    }

    pub fn user() -> Address {
        address("05e5")
    }

    pub fn snapshot() -> MemorySnapshot {
        let mut snapshot = MemorySnapshot::new()
            .with_token(usdc(), Some(dec!(1)))
            .with_token(weth(), Some(dec!(2000)))
            .with_token(Chain::Base.native_token(), Some(dec!(2000)));
        for chain in Chain::ALL {
            snapshot = snapshot.with_chain(ChainConfig {
                chain,
                zap_router: router(),
                token_manager: token_manager(),
            });
        }
        snapshot
    }

    pub fn helpers(
        snapshot: MemorySnapshot,
        aggregator: MockSwapAggregator,
        pools: MockPoolStateReader,
        bridge: Option<Arc<dyn BridgeProvider>>,
    ) -> ZapHelpers {
        ZapHelpers {
            state: Arc::new(snapshot),
            aggregator: Arc::new(aggregator),
            pools: Arc::new(pools),
            bridge,
            settings: ZapSettings::default(),
        }
    }

    pub fn helpers_with(aggregator: MockSwapAggregator) -> ZapHelpers {
        helpers_with_pools(aggregator, MockPoolStateReader::new())
    }

    pub fn helpers_with_pools(
        aggregator: MockSwapAggregator,
        pools: MockPoolStateReader,
    ) -> ZapHelpers {
        helpers(snapshot(), aggregator, pools, None)
    }

    pub fn quote_response(
        provider: &str,
        from: &Token,
        from_amount: Decimal,
        to: &Token,
        to_amount: Decimal,
    ) -> QuoteResponse {
        QuoteResponse {
            provider_id: provider.to_string(),
            from_token: from.clone(),
            from_amount,
            to_token: to.clone(),
            to_amount,
            fee: ZapFee::zero(),
        }
    }

    /// An aggregator swap paying exactly the quote, with the input amount at byte 4.
    pub fn swap_response(to_amount: Decimal, slippage: Decimal) -> SwapResponse {
        SwapResponse {
            to_amount,
            to_amount_min: to_amount * (Decimal::ONE - slippage),
            tx: SwapTx {
                target: address("ac"),
                data: Bytes::from(vec![0u8; 68]),
                value: BigUint::default(),
                input_position: Some(4),
            },
        }
    }

    fn vault_address(id: &str) -> Address {
        let mut bytes = [0u8; 20];
        for (slot, byte) in bytes.iter_mut().zip(id.bytes()) {
            *slot = byte;
        }
        Bytes::from(bytes.to_vec())
    }

    fn vault(id: &str, kind: VaultKind, deposit_token: Token, decimals: u32, pps: Decimal) -> Vault {
        let address = vault_address(id);
        let share_token = Token::new(
            &address,
            &format!("moo{}", deposit_token.symbol),
            decimals,
            deposit_token.chain,
        );
        Vault {
            id: id.to_string(),
            chain: deposit_token.chain,
            kind,
            address,
            deposit_token,
            share_token,
            price_per_share: pps,
        }
    }

    /// A Beefy style vault with 18 decimal shares at `pps` deposit tokens per share.
    pub fn standard_vault(id: &str, deposit_token: Token, pps: Decimal) -> Vault {
        vault(id, VaultKind::Standard, deposit_token, 18, pps)
    }

    /// A reward pool staking `deposit_token` one to one.
    pub fn gov_vault(id: &str, deposit_token: Token) -> Vault {
        let decimals = deposit_token.decimals;
        vault(id, VaultKind::Gov, deposit_token, decimals, Decimal::ONE)
    }

    /// A concentrated liquidity vault; the vault is its own deposit and share token.
    pub fn cowcentrated_vault(id: &str) -> Vault {
        let address = vault_address(id);
        let share_token = Token::new(&address, "cowUSDC-WETH", 18, Chain::Base);
        Vault {
            id: id.to_string(),
            chain: Chain::Base,
            kind: VaultKind::Cowcentrated,
            address,
            deposit_token: share_token.clone(),
            share_token,
            price_per_share: Decimal::ONE,
        }
    }

    pub fn step_context(slippage: Decimal) -> StepContext {
        StepContext { user: user(), recipient: user(), slippage }
    }
}
