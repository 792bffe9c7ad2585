//! Share vaults priced by `getPricePerFullShare`.

use async_trait::async_trait;
use tracing::debug;
use zap_common::{
    errors::ZapError,
    models::{
        token::{Token, TokenAmount},
        vault::Vault,
    },
    traits::{VaultAdapter, VaultZap, VaultZapRequest},
    zap::math::slip_amount,
};
use zap_ethereum::calls::vault::{standard_deposit_step, standard_withdraw_step};

use super::{assets_for, check_price_per_share, shares_for, single_input};

#[derive(Debug, Clone)]
pub struct StandardVaultAdapter {
    vault: Vault,
}

impl StandardVaultAdapter {
    pub fn new(vault: Vault) -> Result<Self, ZapError> {
        check_price_per_share(&vault)?;
        Ok(Self { vault })
    }
}

#[async_trait]
impl VaultAdapter for StandardVaultAdapter {
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
        Ok(shares_for(&self.vault, assets))
    }

    fn convert_to_assets(&self, shares: &TokenAmount) -> Result<TokenAmount, ZapError> {
        Ok(assets_for(&self.vault, shares))
    }

    async fn fetch_zap_deposit(&self, request: &VaultZapRequest) -> Result<VaultZap, ZapError> {
        let input = single_input(&request.inputs, self.deposit_token())?;
        let shares = self.convert_to_shares(&input.as_token_amount())?;
        debug!(vault = %self.vault.id, assets = %input.amount, %shares, "Standard vault deposit");
        Ok(VaultZap {
            min_outputs: vec![slip_amount(&shares, request.slippage)],
            zap: standard_deposit_step(&self.vault.address, &input.token.address),
        })
    }

    async fn fetch_zap_withdraw(&self, request: &VaultZapRequest) -> Result<VaultZap, ZapError> {
        let input = single_input(&request.inputs, self.share_token())?;
        let assets = self.convert_to_assets(&input.as_token_amount())?;
        Ok(VaultZap {
            min_outputs: vec![slip_amount(&assets, request.slippage)],
            zap: standard_withdraw_step(&self.vault.address, &input.to_wei()?)?,
        })
    }
}
