//! In-memory [`StateSnapshot`] used when state is loaded up front.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::{
    models::{token::Token, vault::Vault, Address, Chain, ChainConfig, VaultId},
    traits::StateSnapshot,
};

#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    tokens: HashMap<(Chain, Address), Token>,
    prices: HashMap<(Chain, Address), Decimal>,
    vaults: HashMap<VaultId, Vault>,
    chains: HashMap<Chain, ChainConfig>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: Token, price: Option<Decimal>) -> Self {
        let key = (token.chain, token.address.clone());
        if let Some(price) = price {
            self.prices.insert(key.clone(), price);
        }
        self.tokens.insert(key, token);
        self
    }

    pub fn with_vault(mut self, vault: Vault) -> Self {
        for token in [&vault.deposit_token, &vault.share_token] {
            self.tokens
                .entry((token.chain, token.address.clone()))
                .or_insert_with(|| token.clone());
        }
        self.vaults.insert(vault.id.clone(), vault);
        self
    }

    pub fn with_chain(mut self, config: ChainConfig) -> Self {
        self.chains.insert(config.chain, config);
        self
    }

    pub fn set_price(&mut self, token: &Token, price: Decimal) {
        self.prices
            .insert((token.chain, token.address.clone()), price);
    }
}

impl StateSnapshot for MemorySnapshot {
    fn token(&self, chain: Chain, address: &Address) -> Option<Token> {
        self.tokens
            .get(&(chain, address.clone()))
            .cloned()
    }

    fn price(&self, token: &Token) -> Option<Decimal> {
        self.prices
            .get(&(token.chain, token.address.clone()))
            .copied()
    }

    fn vault(&self, id: &str) -> Option<Vault> {
        self.vaults.get(id).cloned()
    }

    fn chain_config(&self, chain: Chain) -> Option<ChainConfig> {
        self.chains.get(&chain).cloned()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_lookup() {
        let weth = Chain::Base.wrapped_native_token();
        let snapshot = MemorySnapshot::new().with_token(weth.clone(), Some(dec!(2500)));

        assert_eq!(snapshot.price(&weth), Some(dec!(2500)));
        assert_eq!(snapshot.token(Chain::Base, &weth.address), Some(weth.clone()));
        assert_eq!(snapshot.token(Chain::Optimism, &weth.address), None);
        assert_eq!(snapshot.price(&Chain::Base.native_token()), None);
    }
}
