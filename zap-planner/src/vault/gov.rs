//! Reward pools staking another vault's shares 1:1.

use async_trait::async_trait;
use zap_common::{
    errors::ZapError,
    models::{
        token::{Token, TokenAmount},
        vault::Vault,
    },
    traits::{VaultAdapter, VaultZap, VaultZapRequest},
};
use zap_ethereum::calls::vault::{gov_stake_step, gov_withdraw_step};

use super::single_input;

#[derive(Debug, Clone)]
pub struct GovVaultAdapter {
    vault: Vault,
}

impl GovVaultAdapter {
    pub fn new(vault: Vault) -> Self {
        Self { vault }
    }

    fn exchange(amount: &TokenAmount, to: &Token) -> Result<TokenAmount, ZapError> {
        TokenAmount::from_wei(to.clone(), &amount.to_wei()?)
    }
}

#[async_trait]
impl VaultAdapter for GovVaultAdapter {
    fn vault(&self) -> &Vault {
        &self.vault
    }

    fn deposit_token(&self) -> &Token {
        &self.vault.deposit_token
    }

    fn share_token(&self) -> &Token {
        &self.vault.share_token
    }

    fn convert_to_shares(&self, assets: &TokenAmount) -> Result<TokenAmount, ZapError> {
        Self::exchange(assets, self.share_token())
    }

    fn convert_to_assets(&self, shares: &TokenAmount) -> Result<TokenAmount, ZapError> {
        Self::exchange(shares, self.deposit_token())
    }

    /// Staking is exact, no slippage applies.
    async fn fetch_zap_deposit(&self, request: &VaultZapRequest) -> Result<VaultZap, ZapError> {
        let input = single_input(&request.inputs, self.deposit_token())?;
        Ok(VaultZap {
            min_outputs: vec![self.convert_to_shares(&input.as_token_amount())?],
            zap: gov_stake_step(&self.vault.address, &input.token.address, &input.to_wei()?)?,
        })
    }

    async fn fetch_zap_withdraw(&self, request: &VaultZapRequest) -> Result<VaultZap, ZapError> {
        let input = single_input(&request.inputs, self.share_token())?;
        Ok(VaultZap {
            min_outputs: vec![self.convert_to_assets(&input.as_token_amount())?],
            zap: gov_withdraw_step(&self.vault.address, &input.to_wei()?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use zap_common::models::token::InputTokenAmount;

    use super::*;
    use crate::test_fixtures::{gov_vault, router, usdc};

    #[tokio::test]
    async fn test_stake_is_one_to_one() {
        let vault = gov_vault("beefy-usdc-rp", usdc());
        let adapter = GovVaultAdapter::new(vault.clone());

        let zap = adapter
            .fetch_zap_deposit(&VaultZapRequest {
                inputs: vec![InputTokenAmount::new(usdc(), dec!(12.5), true)],
                from: router(),
                slippage: dec!(0.05),
            })
            .await
            .unwrap();

        assert_eq!(zap.min_outputs, vec![TokenAmount::new(vault.share_token, dec!(12.5))]);
        assert_eq!(zap.zap.target, vault.address);
    }
}
