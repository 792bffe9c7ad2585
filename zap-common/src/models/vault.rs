use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::{token::Token, Address, Chain, VaultId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VaultKind {
    /// Share vault priced by `getPricePerFullShare`.
    Standard,
    Erc4626,
    /// Reward pool staking another vault's shares 1:1.
    Gov,
    /// Concentrated liquidity manager; the vault contract is the LP position itself.
    Cowcentrated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    pub chain: Chain,
    pub kind: VaultKind,
    pub address: Address,
    /// Token accepted by the vault on deposit.
    pub deposit_token: Token,
    /// Receipt token minted by the vault.
    pub share_token: Token,
    /// Deposit tokens per share, scaled to human units. 1 for gov pools.
    #[serde(default = "Vault::default_price_per_share")]
    pub price_per_share: Decimal,
}

impl Vault {
    fn default_price_per_share() -> Decimal {
        Decimal::ONE
    }
}
