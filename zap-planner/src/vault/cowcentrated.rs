use async_trait::async_trait;
use zap_common::{
    errors::ZapError,
    models::{
        token::{Token, TokenAmount},
        vault::Vault,
    },
    traits::{VaultAdapter, VaultZap, VaultZapRequest},
};

/// Concentrated liquidity managers mint their own shares from both pool tokens; the
/// cowcentrated strategy talks to them directly, so this adapter only describes the vault.
#[derive(Debug, Clone)]
pub struct CowcentratedVaultAdapter {
    vault: Vault,
}

impl CowcentratedVaultAdapter {
    pub fn new(vault: Vault) -> Self {
        Self { vault }
    }

    fn unsupported(&self) -> ZapError {
        ZapError::Config(format!(
            "vault {} mints shares from its pool tokens, use its cowcentrated strategy",
            self.vault.id
        ))
    }
}

#[async_trait]
impl VaultAdapter for CowcentratedVaultAdapter {
    fn vault(&self) -> &Vault {
        &self.vault
    }

    fn deposit_token(&self) -> &Token {
        &self.vault.deposit_token
    }

    fn share_token(&self) -> &Token {
        &self.vault.share_token
    }

    fn convert_to_shares(&self, _assets: &TokenAmount) -> Result<TokenAmount, ZapError> {
        Err(self.unsupported())
    }

    fn convert_to_assets(&self, _shares: &TokenAmount) -> Result<TokenAmount, ZapError> {
        Err(self.unsupported())
    }

    async fn fetch_zap_deposit(&self, _request: &VaultZapRequest) -> Result<VaultZap, ZapError> {
        Err(self.unsupported())
    }

    async fn fetch_zap_withdraw(&self, _request: &VaultZapRequest) -> Result<VaultZap, ZapError> {
        Err(self.unsupported())
    }
}
