//! Vault adapters, one per vault contract family.

pub mod cowcentrated;
pub mod erc4626;
pub mod gov;
pub mod standard;

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use zap_common::{
    errors::{InputError, ZapError},
    models::{
        token::{InputTokenAmount, Token, TokenAmount},
        vault::{Vault, VaultKind},
    },
    traits::VaultAdapter,
};

pub use self::{
    cowcentrated::CowcentratedVaultAdapter, erc4626::Erc4626VaultAdapter, gov::GovVaultAdapter,
    standard::StandardVaultAdapter,
};

pub fn adapter_for(vault: &Vault) -> Result<Arc<dyn VaultAdapter>, ZapError> {
    let adapter: Arc<dyn VaultAdapter> = match vault.kind {
        VaultKind::Standard => Arc::new(StandardVaultAdapter::new(vault.clone())?),
        VaultKind::Erc4626 => Arc::new(Erc4626VaultAdapter::new(vault.clone())?),
        VaultKind::Gov => Arc::new(GovVaultAdapter::new(vault.clone())),
        VaultKind::Cowcentrated => Arc::new(CowcentratedVaultAdapter::new(vault.clone())),
    };
    Ok(adapter)
}

/// The single input of a vault call, which must be `expected`.
fn single_input<'a>(
    inputs: &'a [InputTokenAmount],
    expected: &Token,
) -> Result<&'a InputTokenAmount, ZapError> {
    match inputs {
        [input] if &input.token == expected => Ok(input),
        [input] => Err(InputError::TokenMismatch {
            expected: expected.to_string(),
            actual: input.token.to_string(),
        }
        .into()),
        _ => Err(InputError::WrongInputCount { expected: 1, actual: inputs.len() }.into()),
    }
}

fn check_price_per_share(vault: &Vault) -> Result<(), ZapError> {
    if vault.price_per_share <= Decimal::ZERO {
        return Err(ZapError::Config(format!("vault {} has no price per share", vault.id)));
    }
    Ok(())
}

/// Shares for `assets` at the vault's price per share, floored.
fn shares_for(vault: &Vault, assets: &TokenAmount) -> TokenAmount {
    let shares = (assets.amount / vault.price_per_share)
        .round_dp_with_strategy(vault.share_token.decimals, RoundingStrategy::ToZero);
    TokenAmount::new(vault.share_token.clone(), shares)
}

/// Assets for `shares` at the vault's price per share, floored.
fn assets_for(vault: &Vault, shares: &TokenAmount) -> TokenAmount {
    let assets = (shares.amount * vault.price_per_share)
        .round_dp_with_strategy(vault.deposit_token.decimals, RoundingStrategy::ToZero);
    TokenAmount::new(vault.deposit_token.clone(), assets)
}
