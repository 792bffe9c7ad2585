use async_trait::async_trait;
use zap_common::{
    errors::ZapError,
    models::{
        token::{Token, TokenAmount},
        vault::Vault,
    },
    traits::{VaultAdapter, VaultZap, VaultZapRequest},
    zap::math::slip_amount,
};
use zap_ethereum::calls::vault::{erc4626_deposit_step, erc4626_redeem_step};

use super::{assets_for, check_price_per_share, shares_for, single_input};

/// Tokenized vaults; assets go in and come out for the router itself.
#[derive(Debug, Clone)]
pub struct Erc4626VaultAdapter {
    vault: Vault,
}

impl Erc4626VaultAdapter {
    pub fn new(vault: Vault) -> Result<Self, ZapError> {
        check_price_per_share(&vault)?;
        Ok(Self { vault })
    }
}

#[async_trait]
impl VaultAdapter for Erc4626VaultAdapter {
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
        Ok(VaultZap {
            min_outputs: vec![slip_amount(&shares, request.slippage)],
            zap: erc4626_deposit_step(
                &self.vault.address,
                &input.token.address,
                &input.to_wei()?,
                &request.from,
            )?,
        })
    }

    async fn fetch_zap_withdraw(&self, request: &VaultZapRequest) -> Result<VaultZap, ZapError> {
        let input = single_input(&request.inputs, self.share_token())?;
        let assets = self.convert_to_assets(&input.as_token_amount())?;
        Ok(VaultZap {
            min_outputs: vec![slip_amount(&assets, request.slippage)],
            zap: erc4626_redeem_step(&self.vault.address, &input.to_wei()?, &request.from)?,
        })
    }
}
